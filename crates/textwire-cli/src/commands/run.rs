use anyhow::{Context, Result};
use console::style;
use futures::StreamExt;
use std::io::Write;
use textwire::models::chunk::ApiStreamChunk;
use textwire::models::message::Message;
use textwire::providers::base::ApiHandler;
use tokio_util::sync::CancellationToken;

/// Send one user turn and write the reply to `out` as it arrives
pub async fn execute<W: Write>(
    handler: &dyn ApiHandler,
    system: &str,
    prompt: &str,
    cancel: CancellationToken,
    out: &mut W,
) -> Result<()> {
    let messages = vec![Message::user().with_text(prompt)];
    let mut stream = handler
        .stream(system, &messages, cancel.clone())
        .context("Could not start the request")?;

    while let Some(chunk) = stream.next().await {
        write!(out, "{}", render(&chunk?))?;
        out.flush()?;
    }

    if cancel.is_cancelled() {
        writeln!(out, "\n{}", style("cancelled").yellow())?;
    } else {
        writeln!(out)?;
    }
    Ok(())
}

fn render(chunk: &ApiStreamChunk) -> String {
    match chunk {
        ApiStreamChunk::Text { text } => text.clone(),
        ApiStreamChunk::Reasoning { reasoning } => style(reasoning).dim().to_string(),
        ApiStreamChunk::ToolCode { tool_code } => {
            format!("{} {}\n", style("tool_code").cyan().bold(), tool_code)
        }
        ApiStreamChunk::ToolUse { name, content, id } => format!(
            "{} {} {}\n",
            style(format!("[{}]", id)).dim(),
            style(name).cyan().bold(),
            content
        ),
        ApiStreamChunk::Usage(usage) => style(format!(
            "\n{} input / {} output tokens\n",
            usage.input_tokens, usage.output_tokens
        ))
        .dim()
        .to_string(),
    }
}
