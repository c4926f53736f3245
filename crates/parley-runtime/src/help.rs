//! The built-in `!help` plugin.
//!
//! `!help` lists every topic registered through
//! [`HelpProvider`](crate::plugin::HelpProvider); `!help <topic>` shows the
//! topic's commands.

use std::fmt::Write;
use std::sync::Arc;

use parley_core::Listener;
use tracing::warn;

use crate::error::RuntimeResult;
use crate::plugin::{ChatPlugin, HelpTopic, PluginContext};

/// Answers `!help`.
#[derive(Debug, Default)]
pub struct HelpPlugin;

impl ChatPlugin for HelpPlugin {
    fn name(&self) -> &str {
        "help"
    }

    fn init(&self, ctx: &PluginContext) -> RuntimeResult<()> {
        let topics: Arc<[HelpTopic]> = ctx.help_topics().into();

        ctx.bot().register(
            Listener::new()
                .name("help")
                .description("Lists plugins and their commands")
                .matches(r"^!help(?:\s+(\S+))?")
                .on_message(move |_, msg| {
                    let topics = Arc::clone(&topics);
                    async move {
                        msg.add_reaction("+1");
                        let text = match msg.capture(1).filter(|t| !t.is_empty()) {
                            Some(name) => render_topic(&topics, name),
                            None => render_index(&topics),
                        };
                        if let Err(e) = msg.reply(text).await {
                            warn!(error = %e, "Failed to send help");
                        }
                    }
                }),
        )?;
        Ok(())
    }
}

fn render_index(topics: &[HelpTopic]) -> String {
    if topics.is_empty() {
        return "No help topics available.".to_string();
    }
    let mut out = String::from("Available topics:\n");
    for topic in topics {
        let _ = writeln!(out, "• *{}*: {}", topic.name, topic.description);
    }
    out.push_str("Use `!help <topic>` for details.");
    out
}

fn render_topic(topics: &[HelpTopic], name: &str) -> String {
    let Some(topic) = topics.iter().find(|t| t.name.eq_ignore_ascii_case(name)) else {
        return format!("No help topic named `{name}`.");
    };
    let mut out = format!("*{}*: {}", topic.name, topic.description);
    for command in &topic.commands {
        let _ = write!(out, "\n`{}`: {}", command.usage, command.help_text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Command;

    fn topics() -> Vec<HelpTopic> {
        vec![HelpTopic {
            name: "meeting".into(),
            description: "Runs meetings".into(),
            commands: vec![
                Command::new("!meeting <goal>", "Starts a meeting"),
                Command::new("!conclude", "Ends it"),
            ],
        }]
    }

    #[test]
    fn test_render_index() {
        assert_eq!(render_index(&[]), "No help topics available.");
        assert_eq!(
            render_index(&topics()),
            "Available topics:\n• *meeting*: Runs meetings\nUse `!help <topic>` for details."
        );
    }

    #[test]
    fn test_render_topic() {
        assert_eq!(
            render_topic(&topics(), "Meeting"),
            "*meeting*: Runs meetings\n`!meeting <goal>`: Starts a meeting\n`!conclude`: Ends it"
        );
        assert_eq!(render_topic(&topics(), "todo"), "No help topic named `todo`.");
    }
}
