use marketlens_core::{Envelope, EnvelopeError, EnvelopeMeta, ToolCall, Toolbox};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::error::CliError;

const MALFORMED_CALL_CODE: &str = "request.malformed";

/// Answers one envelope per input line until stdin closes. A line that is
/// not a valid tool call gets a failure envelope; the loop keeps going.
pub async fn run(toolbox: &Toolbox) -> Result<(), CliError> {
    info!("serving tool calls on stdin");
    let served = serve_lines(
        toolbox.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    info!(served, "stdin closed");
    Ok(())
}

/// Runs every call on its own task and writes envelopes in completion order,
/// so a slow call never holds back the lines read after it.
async fn serve_lines<R, W>(toolbox: Toolbox, reader: R, writer: W) -> Result<u64, CliError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sender, receiver) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(write_lines(writer, receiver));
    let mut calls = JoinSet::new();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<ToolCall>(line) {
            Ok(call) => {
                debug!(tool = call.name(), "tool call received");
                let toolbox = toolbox.clone();
                let sender = sender.clone();
                calls.spawn(async move {
                    let payload = serde_json::to_string(&toolbox.call(call).await)?;
                    // A closed channel means the writer already failed; its error is reported below.
                    let _ = sender.send(payload);
                    Ok::<(), serde_json::Error>(())
                });
            }
            Err(error) => {
                let payload = serde_json::to_string(&malformed_call(&error))?;
                if sender.send(payload).is_err() {
                    break;
                }
            }
        }

        while let Some(finished) = calls.try_join_next() {
            report_call(finished);
        }
    }

    while let Some(finished) = calls.join_next().await {
        report_call(finished);
    }
    drop(sender);

    let written = writer.await.map_err(std::io::Error::other)??;
    Ok(written)
}

async fn write_lines<W>(mut writer: W, mut receiver: mpsc::UnboundedReceiver<String>) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0_u64;
    while let Some(payload) = receiver.recv().await {
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        written += 1;
    }
    writer.shutdown().await?;
    Ok(written)
}

fn report_call(finished: Result<Result<(), serde_json::Error>, JoinError>) {
    match finished {
        Ok(Ok(())) => {}
        Ok(Err(error)) => warn!(%error, "tool response could not be serialized"),
        Err(error) => warn!(%error, "tool call task failed"),
    }
}

fn malformed_call(error: &serde_json::Error) -> Envelope<Value> {
    let meta = EnvelopeMeta::new("unknown", Vec::new(), 0);
    Envelope::failure(
        meta,
        EnvelopeError {
            code: String::from(MALFORMED_CALL_CODE),
            message: format!("invalid tool call: {error}"),
            retryable: Some(false),
            source: None,
        },
    )
}
