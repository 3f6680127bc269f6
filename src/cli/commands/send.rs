//! Send Command
//!
//! One-shot turn, optionally with a file attached first.
//!
//! Usage:
//!   chatroute send "Wie viele Wörter hat dieser Text?" --file notes.md

use std::path::Path;

use crate::ai::timeout::with_timeout;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

pub async fn run(ctx: CommandContext, message: &str, file: Option<&Path>) -> Result<()> {
    let out = Output::new();
    let mut orchestrator = ctx.orchestrator();

    if let Some(path) = file {
        let confirmation = orchestrator.try_attach_file(path).await?;
        out.success(&confirmation);
    }

    let reply = with_timeout(
        ctx.timeouts.turn,
        orchestrator.try_send_message(message),
        "chat turn",
    )
    .await;
    orchestrator.shutdown();

    let reply = reply?;
    out.reply(reply.role, &reply.text);
    Ok(())
}
