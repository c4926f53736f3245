//! Console Bot Example
//!
//! Runs a Parley bot with the meeting plugin against the terminal: every
//! line typed on stdin becomes a chat message, and everything the bot sends
//! is printed to stdout.
//!
//! Lines go to `#general` unless they start with a channel, e.g.
//! `#room1 !proposition ship on friday`. Conference rooms come from
//! `[plugins.meeting] conf_rooms` and appear as channels.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --config parley.toml --user alice
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use parley::core::{
    AckEvent, ApiError, ApiResult, Channel, ChatApi, ChatEvent, DirectorySnapshot, LocalId,
    MessageEvent, ReactionItem, SelfInfo, User,
};
use parley::runtime::ParleyRuntime;
use parley_plugin_meeting::{MeetingConfig, MeetingPlugin};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

const BOT_ID: &str = "UBOT";
const USER_ID: &str = "U1";

#[derive(Parser, Debug)]
#[command(name = "console-bot", version, about = "Chat with a Parley bot in the terminal")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration profile
    #[arg(long, env = "PARLEY_PROFILE", default_value = "development")]
    profile: String,

    /// Your user name in the conversation
    #[arg(long, default_value = "console")]
    user: String,

    /// Channel for lines without a `#channel` prefix
    #[arg(long, default_value = "general")]
    channel: String,
}

// ============================================================================
// Console chat service
// ============================================================================

/// A chat service made of the terminal.
///
/// Holds only a weak handle on the event stream so that the stream ends
/// when stdin does.
struct ConsoleApi {
    events: mpsc::WeakSender<ChatEvent>,
    directory: DirectorySnapshot,
    next_ts: AtomicU64,
}

impl ConsoleApi {
    fn next_ts(&self) -> String {
        format!(
            "1700000000.{:06}",
            self.next_ts.fetch_add(1, Ordering::Relaxed) + 1
        )
    }

    fn channel_name(&self, id: &str) -> String {
        self.directory
            .channels
            .iter()
            .find(|c| c.id == id)
            .map_or_else(|| id.to_string(), |c| c.name.clone())
    }
}

#[async_trait]
impl ChatApi for ConsoleApi {
    async fn send_message(&self, id: LocalId, channel: &str, text: &str) -> ApiResult<()> {
        println!("[#{}] parley: {text}", self.channel_name(channel));
        let events = self.events.upgrade().ok_or(ApiError::NotConnected)?;
        events
            .send(ChatEvent::Ack(AckEvent {
                reply_to: id,
                ts: self.next_ts(),
                text: text.to_string(),
            }))
            .await
            .map_err(|_| ApiError::NotConnected)
    }

    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> ApiResult<()> {
        println!("[#{}] parley (edited {ts}): {text}", self.channel_name(channel));
        Ok(())
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> ApiResult<()> {
        println!("[#{}] parley deleted {ts}", self.channel_name(channel));
        Ok(())
    }

    async fn add_reaction(&self, emoji: &str, item: &ReactionItem) -> ApiResult<()> {
        let channel = item.channel.as_deref().unwrap_or_default();
        println!("[#{}] parley reacted :{emoji}:", self.channel_name(channel));
        Ok(())
    }

    async fn fetch_directory(&self) -> ApiResult<DirectorySnapshot> {
        Ok(self.directory.clone())
    }

    async fn join_channel(&self, name: &str) -> ApiResult<Channel> {
        self.directory
            .channels
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| ApiError::Other(format!("no channel named {name}")))
    }

    async fn open_direct(&self, user_id: &str) -> ApiResult<Channel> {
        Ok(Channel::direct(format!("D{user_id}"), user_id))
    }

    async fn set_topic(&self, channel: &str, topic: &str) -> ApiResult<()> {
        println!("[#{}] topic: {topic}", self.channel_name(channel));
        Ok(())
    }
}

/// `general`, the configured channels and every conference room.
fn directory(user: &str, channels: &[String]) -> DirectorySnapshot {
    let mut names: Vec<&str> = vec!["general"];
    for name in channels {
        let name = name.trim_start_matches('#');
        if !names.contains(&name) {
            names.push(name);
        }
    }

    DirectorySnapshot {
        users: vec![User::new(USER_ID, user), User::new(BOT_ID, "parley")],
        channels: names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Channel::new(format!("C{}", i + 1), name))
            .collect(),
    }
}

/// Splits an optional leading `#channel` off a line.
fn route<'a>(line: &'a str, default: &'a str) -> (&'a str, &'a str) {
    match line.strip_prefix('#').and_then(|rest| rest.split_once(' ')) {
        Some((channel, text)) => (channel, text.trim_start()),
        None => (default, line),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = ParleyRuntime::builder().profile(&args.profile);
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let mut runtime = builder.build()?;

    let rooms: MeetingConfig = match runtime.config().plugin_section("meeting") {
        Some(section) => MeetingConfig::deserialize(section)?,
        None => MeetingConfig::default(),
    };
    let mut channels = runtime.config().chat.join_channels.clone();
    channels.extend(rooms.conf_rooms);
    let snapshot = directory(&args.user, &channels);

    let meeting = Arc::new(MeetingPlugin::new());
    runtime
        .register_chat(meeting.clone())
        .register_help(meeting);

    let (events_tx, events_rx) = mpsc::channel(64);
    let api = Arc::new(ConsoleApi {
        events: events_tx.downgrade(),
        directory: snapshot.clone(),
        next_ts: AtomicU64::new(0),
    });

    events_tx
        .send(ChatEvent::Connected {
            myself: SelfInfo {
                id: BOT_ID.into(),
                name: "parley".into(),
            },
            connection_count: 1,
        })
        .await?;

    let default_channel = args.channel;
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut seq = 0u64;
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let (name, text) = route(&line, &default_channel);
            let Some(channel) = snapshot.channels.iter().find(|c| c.name == name) else {
                println!("(no channel named #{name})");
                continue;
            };

            seq += 1;
            let event = MessageEvent::new(
                channel.id.as_str(),
                USER_ID,
                text,
                format!("1600000000.{seq:06}"),
            );
            if events_tx.send(ChatEvent::Message(event)).await.is_err() {
                break;
            }
        }
        info!("Input closed");
    });

    runtime.run(api, events_rx).await?;
    Ok(())
}
