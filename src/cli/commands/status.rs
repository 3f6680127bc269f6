//! Status Command
//!
//! Backend reachability and transcript statistics.

use crate::ai::timeout::with_timeout_map;
use crate::chat::Role;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

pub async fn run(ctx: CommandContext, format: &str) -> Result<()> {
    let mut orchestrator = ctx.orchestrator();
    orchestrator.initialize()?;

    let mut backends = Vec::new();
    for role in Role::ALL {
        let Some(client) = orchestrator.backend(role) else {
            continue;
        };
        let healthy = with_timeout_map(
            ctx.timeouts.health_check,
            client.health_check(),
            "health check",
        )
        .await
        .unwrap_or(false);
        backends.push((
            role,
            client.provider().name().to_string(),
            client.provider().model().to_string(),
            healthy,
        ));
    }
    orchestrator.shutdown();

    let conversations = match &ctx.db {
        Some(db) => Some(db.list_conversations()?),
        None => None,
    };

    if format == "json" {
        let status = serde_json::json!({
            "backends": backends.iter().map(|(role, provider, model, healthy)| serde_json::json!({
                "role": role.key(),
                "provider": provider,
                "model": model,
                "healthy": healthy,
            })).collect::<Vec<_>>(),
            "storage": {
                "enabled": ctx.config.storage.enabled,
                "path": ctx.config.storage.path.display().to_string(),
                "conversations": conversations.as_ref().map(|c| c.len()),
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let out = Output::new();
    out.section("Backends");
    for (role, provider, model, healthy) in &backends {
        let line = format!("{:<15} {} / {}", role, provider, model);
        if *healthy {
            out.success(&line);
        } else {
            out.error(&format!("{} (unreachable)", line));
        }
    }

    out.section("Transcripts");
    match conversations {
        Some(list) => {
            let messages: usize = list.iter().map(|c| c.message_count).sum();
            println!("Database:      {}", ctx.config.storage.path.display());
            println!("Conversations: {}", list.len());
            println!("Messages:      {}", messages);
        }
        None => println!("Recording disabled"),
    }

    Ok(())
}
