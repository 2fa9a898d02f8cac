use marketlens_core::ToolResponse;
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(response: &ToolResponse, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(response, pretty),
        OutputFormat::Table => render_table(response),
    }
}

pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{payload}");
    Ok(())
}

fn render_table(response: &ToolResponse) -> Result<(), CliError> {
    let meta = response.meta();
    println!("request_id  : {}", meta.request_id);
    println!("tool        : {}", meta.tool);
    println!("generated_at: {}", meta.generated_at);
    println!(
        "sources     : {}",
        meta.source_chain
            .iter()
            .map(|source| source.as_str())
            .collect::<Vec<_>>()
            .join(",")
    );
    println!("latency_ms  : {}", meta.latency_ms);

    if !meta.warnings.is_empty() {
        println!("warnings:");
        for warning in &meta.warnings {
            println!("  - {warning}");
        }
    }

    let rendered = serde_json::to_value(response)?;
    if let Some(data) = rendered.get("data").filter(|data| !data.is_null()) {
        println!("data:");
        print_indented(data)?;
    }

    let errors = response.errors();
    if !errors.is_empty() {
        println!("errors:");
        for error in errors {
            match error.source {
                Some(source) => println!("  - {} [{source}]: {}", error.code, error.message),
                None => println!("  - {}: {}", error.code, error.message),
            }
        }
    }

    Ok(())
}

fn print_indented(value: &Value) -> Result<(), CliError> {
    let pretty = serde_json::to_string_pretty(value)?;
    for line in pretty.lines() {
        println!("  {line}");
    }
    Ok(())
}
