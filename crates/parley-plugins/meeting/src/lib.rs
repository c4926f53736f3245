//! Meeting tracker plugin.
//!
//! Runs meetings in a fixed set of conference rooms. `!meeting <goal>` picks
//! a free room (the caller's own when possible) and marks it running in the
//! channel topic; inside the room, propositions, references and `D<n>++`
//! votes are recorded until `!conclude` posts a summary.
//!
//! # Configuration
//!
//! ```toml
//! [plugins.meeting]
//! conf_rooms = ["meeting-1", "meeting-2"]
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let meeting = Arc::new(MeetingPlugin::new());
//! runtime.register_chat(meeting.clone()).register_help(meeting);
//! ```

pub mod book;
pub mod meeting;

use std::sync::Arc;

use parking_lot::Mutex;
use parley_core::{Listener, Message};
use parley_runtime::{
    ChatPlugin, Command, HelpProvider, HelpTopic, PluginContext, RuntimeResult,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use book::{Action, Incoming, MeetingBook, select_room};
pub use meeting::{Decision, LogEntry, Meeting, Reference};

/// The `[plugins.meeting]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingConfig {
    /// Channel names usable as conference rooms, in order of preference.
    pub conf_rooms: Vec<String>,
}

/// The meeting tracker.
#[derive(Debug, Default)]
pub struct MeetingPlugin {
    book: Arc<Mutex<MeetingBook>>,
}

impl MeetingPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against the current bookkeeping.
    pub fn with_book<R>(&self, f: impl FnOnce(&MeetingBook) -> R) -> R {
        f(&self.book.lock())
    }
}

impl ChatPlugin for MeetingPlugin {
    fn name(&self) -> &str {
        "meeting"
    }

    fn init(&self, ctx: &PluginContext) -> RuntimeResult<()> {
        let config: MeetingConfig = ctx.plugin_config(self.name())?;
        if config.conf_rooms.is_empty() {
            warn!("No conference rooms configured, every `!meeting` will be refused");
        }
        *self.book.lock() = MeetingBook::new(&config.conf_rooms);

        let book = Arc::clone(&self.book);
        ctx.bot().register(
            Listener::new()
                .name("meeting")
                .description("Records meetings held in conference rooms")
                .predicate(|msg| !msg.from_me)
                .on_message(move |_, msg| {
                    let book = Arc::clone(&book);
                    async move {
                        let Some(sender) = &msg.from_user else {
                            debug!(user = ?msg.user_id(), "Ignoring message from an unknown sender");
                            return;
                        };
                        let actions = {
                            let incoming = Incoming {
                                user_id: &sender.id,
                                user_name: &sender.name,
                                room: msg.from_channel.as_ref().map(|c| c.name.as_str()),
                                ts: msg.ts(),
                                text: &msg.text,
                            };
                            book.lock().handle(&incoming)
                        };
                        for action in actions {
                            perform(&msg, action).await;
                        }
                    }
                }),
        )?;
        Ok(())
    }
}

impl HelpProvider for MeetingPlugin {
    fn help(&self) -> HelpTopic {
        HelpTopic {
            name: "meeting".into(),
            description: "Runs meetings in conference rooms".into(),
            commands: vec![
                Command::new("!meeting <goal>", "Starts a meeting in a free conference room"),
                Command::new("!join M<n>", "Asks to be let into a running meeting"),
                Command::new("!proposition <text>", "Records a proposition as D<n>"),
                Command::new("!ref <text>", "Records a reference"),
                Command::new("D<n>++", "Supports proposition D<n>"),
                Command::new("!conclude", "Ends the meeting and posts a summary"),
            ],
        }
    }
}

async fn perform(msg: &Message, action: Action) {
    debug!(?action, "Meeting action");
    let bot = msg.bot();
    let result = match action {
        Action::Reply(text) => msg.reply(text).await.map(drop),
        Action::ReplyMention(text) => msg.reply_mention(text).await.map(drop),
        Action::SendToRoom { room, text } => bot.send_to_channel(&room, text).await.map(drop),
        Action::SetTopic { room, topic } => bot.set_topic(&room, topic),
    };
    if let Err(e) = result {
        warn!(error = %e, "Meeting action failed");
    }
}
