mod serve;
mod sources;

use std::process::ExitCode;

use marketlens_core::tools::{AnalysisArgs, FundamentalsArgs, NewsArgs, QuoteArgs};
use marketlens_core::{ToolCall, ToolResponse, Toolbox};

use crate::cli::{Cli, Command};
use crate::error::{CliError, ENVELOPE_ERRORS_EXIT};
use crate::output;

pub async fn run(cli: &Cli, toolbox: &Toolbox) -> Result<ExitCode, CliError> {
    let call = match &cli.command {
        Command::Quote(args) => ToolCall::GetStockQuote(QuoteArgs {
            symbol: args.symbol.clone(),
        }),
        Command::Fundamentals(args) => ToolCall::GetStockFundamentals(FundamentalsArgs {
            ticker: args.ticker.clone(),
        }),
        Command::News(args) => ToolCall::GetStockNews(NewsArgs {
            ticker: args.ticker.clone(),
            stock_name: args.stock_name.clone(),
            query: args.query.clone(),
            max_items: args.max_items,
        }),
        Command::Analysis(args) => ToolCall::GetStockAnalysis(AnalysisArgs {
            ticker: args.ticker.clone(),
            stock_name: args.stock_name.clone(),
            include_news: !args.no_news,
            max_news: args.max_news,
        }),
        Command::Sources => {
            output::print_json(&sources::report(toolbox.service()), cli.pretty)?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Serve => {
            serve::run(toolbox).await?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    let response = toolbox.call(call).await;
    output::render(&response, cli.format, cli.pretty)?;
    exit_code(&response, cli.strict)
}

fn exit_code(response: &ToolResponse, strict: bool) -> Result<ExitCode, CliError> {
    if response.is_invalid_request() {
        return Ok(ExitCode::from(2));
    }

    let errors = response.errors();
    if strict && !errors.is_empty() {
        return Err(CliError::StrictModeViolation {
            warning_count: response.meta().warnings.len(),
            error_count: errors.len(),
        });
    }

    if !errors.is_empty() {
        return Ok(ExitCode::from(ENVELOPE_ERRORS_EXIT));
    }
    Ok(ExitCode::SUCCESS)
}
