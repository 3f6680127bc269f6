//! Chat Command
//!
//! Interactive conversation. Plain lines are sent to the orchestrator;
//! lines starting with `/` control the session.
//!
//! Usage:
//!   chatroute chat
//!
//! REPL commands:
//!   /attach <path>   attach a pdf, txt, md or json file
//!   /file            show the attached file
//!   /clear           drop the attachment
//!   /new             start a new conversation
//!   /quit            leave

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::ai::timeout::with_timeout;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand<'a> {
    Message(&'a str),
    Attach(&'a str),
    ShowFile,
    ClearFile,
    New,
    Help,
    Quit,
    Unknown(&'a str),
    /// Command given without its required argument
    Usage(&'static str),
}

impl<'a> ReplCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return ReplCommand::Message(line);
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name {
            "attach" if arg.is_empty() => ReplCommand::Usage("/attach <path>"),
            "attach" => ReplCommand::Attach(arg),
            "file" => ReplCommand::ShowFile,
            "clear" => ReplCommand::ClearFile,
            "new" => ReplCommand::New,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            _ => ReplCommand::Unknown(name),
        }
    }
}

const HELP: &str = "/attach <path>  attach a file
/file           show the attached file
/clear          drop the attachment
/new            start a new conversation
/quit           leave";

pub async fn run(ctx: CommandContext) -> Result<()> {
    let out = Output::new();
    let mut orchestrator = ctx.orchestrator();

    if let Err(e) = orchestrator.initialize() {
        out.error(&e.user_message());
        return Err(e);
    }

    out.header("chatroute");
    out.dim("Type a message, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", out.prompt());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Message("") => continue,
            ReplCommand::Message(text) => {
                let turn = with_timeout(
                    ctx.timeouts.turn,
                    orchestrator.try_send_message(text),
                    "chat turn",
                )
                .await;
                match turn {
                    Ok(reply) => {
                        debug!(
                            "{} answered within {} units",
                            reply.role, reply.budget.max_response_units
                        );
                        out.reply(reply.role, &reply.text);
                    }
                    Err(e) => out.error(&e.user_message()),
                }
            }
            ReplCommand::Attach(path) => {
                match orchestrator.try_attach_file(std::path::Path::new(path)).await {
                    Ok(confirmation) => out.success(&confirmation),
                    Err(e) => out.error(&e.user_message()),
                }
            }
            ReplCommand::ShowFile => match orchestrator.current_file_name() {
                "" => out.info("No file attached."),
                name => out.info(&format!("Attached: {}", name)),
            },
            ReplCommand::ClearFile => {
                orchestrator.clear_file();
                out.info("Attachment cleared.");
            }
            ReplCommand::New => {
                orchestrator.reset();
                out.info("Started a new conversation.");
            }
            ReplCommand::Help => println!("{}", HELP),
            ReplCommand::Quit => break,
            ReplCommand::Unknown(name) => {
                out.warning(&format!("Unknown command '/{}'. Try /help.", name));
            }
            ReplCommand::Usage(usage) => out.warning(&format!("Usage: {}", usage)),
        }
    }

    orchestrator.shutdown();
    if let Some(id) = orchestrator.conversation_id() {
        out.dim(&format!("Saved as conversation {}.", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_lines_are_messages() {
        assert_eq!(
            ReplCommand::parse("  Wie geht's?  "),
            ReplCommand::Message("Wie geht's?")
        );
        assert_eq!(ReplCommand::parse(""), ReplCommand::Message(""));
    }

    #[test]
    fn test_attach_takes_rest_of_line() {
        assert_eq!(
            ReplCommand::parse("/attach  ./my notes.md "),
            ReplCommand::Attach("./my notes.md")
        );
        assert_eq!(
            ReplCommand::parse("/attach"),
            ReplCommand::Usage("/attach <path>")
        );
    }

    #[test]
    fn test_control_commands() {
        assert_eq!(ReplCommand::parse("/file"), ReplCommand::ShowFile);
        assert_eq!(ReplCommand::parse("/clear"), ReplCommand::ClearFile);
        assert_eq!(ReplCommand::parse("/new"), ReplCommand::New);
        assert_eq!(ReplCommand::parse("/quit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/exit"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/?"), ReplCommand::Help);
        assert_eq!(ReplCommand::parse("/zähle"), ReplCommand::Unknown("zähle"));
    }
}
