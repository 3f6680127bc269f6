//! History Command
//!
//! Browse recorded conversations.
//!
//! Usage:
//!   chatroute history                    list conversations
//!   chatroute history 3                  show conversation 3
//!   chatroute history 3 --delete         remove conversation 3
//!   chatroute history --format json

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::storage::Database;
use crate::types::{ChatError, ConversationId, Result};

pub fn run(ctx: &CommandContext, conversation: Option<i64>, delete: bool, format: &str) -> Result<()> {
    let db = ctx.require_db()?;

    match (conversation.map(ConversationId::new), delete) {
        (None, true) => Err(ChatError::Config(
            "--delete needs a conversation id".to_string(),
        )),
        (None, false) => list(db, format),
        (Some(id), true) => {
            if db.delete_conversation(id)? {
                Output::new().success(&format!("Deleted conversation {}", id));
                Ok(())
            } else {
                Err(ChatError::Storage(format!("No conversation {}", id)))
            }
        }
        (Some(id), false) => show(db, id, format),
    }
}

fn list(db: &Database, format: &str) -> Result<()> {
    let conversations = db.list_conversations()?;

    if format == "json" {
        let entries: Vec<_> = conversations
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id.get(),
                    "title": c.title,
                    "created_at": c.created_at.to_rfc3339(),
                    "messages": c.message_count,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let out = Output::new();
    if conversations.is_empty() {
        out.info("No conversations recorded yet.");
        return Ok(());
    }

    out.section("Conversations");
    for c in &conversations {
        println!(
            "{:>4}  {}  {:>3} msgs  {}",
            c.id,
            c.created_at.format("%Y-%m-%d %H:%M"),
            c.message_count,
            c.title
        );
    }
    Ok(())
}

fn show(db: &Database, id: ConversationId, format: &str) -> Result<()> {
    let messages = db.load_messages(id)?;
    let uploads = db.load_uploads(id)?;

    if format == "json" {
        let value = serde_json::json!({
            "id": id.get(),
            "uploads": uploads.iter().map(|u| serde_json::json!({
                "file_name": u.file_name,
                "uploaded_at": u.uploaded_at.to_rfc3339(),
            })).collect::<Vec<_>>(),
            "messages": messages.iter().map(|m| serde_json::json!({
                "is_user": m.is_user,
                "backend": m.backend.map(|r| r.key()),
                "text": m.text,
                "timestamp": m.timestamp.to_rfc3339(),
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let out = Output::new();
    if messages.is_empty() && uploads.is_empty() {
        out.info(&format!("Conversation {} is empty or does not exist.", id));
        return Ok(());
    }

    out.section(&format!("Conversation {}", id));
    for upload in &uploads {
        out.dim(&format!("[file] {}", upload.file_name));
    }
    for message in &messages {
        out.transcript_line(message.is_user, message.backend, &message.text);
    }
    Ok(())
}
