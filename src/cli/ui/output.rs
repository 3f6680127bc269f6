use console::style;

use crate::chat::Role;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Prompt shown before each user line
    pub fn prompt(&self) -> String {
        format!("{} ", style("you ›").cyan().bold())
    }

    /// Assistant answer tagged with the backend that produced it
    pub fn reply(&self, role: Role, text: &str) {
        let tag = match role {
            Role::Conversational => style(format!("{} ›", role)).green(),
            Role::Analytical => style(format!("{} ›", role)).magenta(),
        };
        println!("{} {}", tag.bold(), text);
    }

    /// One stored transcript line
    pub fn transcript_line(&self, is_user: bool, backend: Option<Role>, text: &str) {
        let who = if is_user {
            style("you".to_string()).cyan()
        } else {
            match backend {
                Some(role) => style(role.to_string()).green(),
                None => style("assistant".to_string()).green(),
            }
        };
        println!("{} {}", who.bold(), text);
    }

    pub fn dim(&self, message: &str) {
        println!("{}", style(message).dim());
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
