//! Shared harness: a bot on a [`LoopbackApi`] with its loop running.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::ready;
use parley_core::{
    AckEvent, ApiCall, Bot, Channel, ChatEvent, DirectorySnapshot, EngineConfig, EngineError,
    Listener, LocalId, LoopbackApi, MessageEvent, SelfInfo, User,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const BOT_ID: &str = "UBOT";

pub fn snapshot() -> DirectorySnapshot {
    let mut alice = User::new("U1", "alice");
    alice.email = Some("alice@example.com".into());
    DirectorySnapshot {
        users: vec![
            alice,
            User::new("U2", "bob"),
            User::new(BOT_ID, "parley"),
        ],
        channels: vec![
            Channel::new("C1", "general"),
            Channel::new("C2", "random"),
            Channel::direct("D1", "U1"),
        ],
    }
}

pub fn myself() -> SelfInfo {
    SelfInfo {
        id: BOT_ID.into(),
        name: "parley".into(),
    }
}

pub struct Harness {
    pub bot: Bot,
    pub api: LoopbackApi,
    pub events: mpsc::Sender<ChatEvent>,
    pub calls: mpsc::UnboundedReceiver<ApiCall>,
    pub task: JoinHandle<Result<(), EngineError>>,
    seq: AtomicU64,
}

impl Harness {
    /// Starts a loop with default config and auto-acknowledged sends.
    pub async fn start() -> Self {
        Self::start_with(EngineConfig::default(), true).await
    }

    /// Starts a loop and delivers the connect event.
    pub async fn connected() -> Self {
        let harness = Self::start().await;
        harness.connect().await;
        harness
    }

    /// Connected loop where the test acknowledges sends itself.
    pub async fn manual_ack() -> Self {
        let harness = Self::start_with(EngineConfig::default(), false).await;
        harness.connect().await;
        harness
    }

    /// Acknowledges the message queued under `reply_to`.
    pub async fn ack(&self, reply_to: LocalId, ts: &str) {
        self.send(ChatEvent::Ack(AckEvent {
            reply_to,
            ts: ts.into(),
            text: String::new(),
        }))
        .await;
    }

    pub async fn start_with(config: EngineConfig, auto_ack: bool) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        let mut api = LoopbackApi::new().with_directory(snapshot());
        if auto_ack {
            api = api.with_auto_ack(events_tx.clone());
        }
        let calls = api.observe();

        let (bot, event_loop) = Bot::builder(Arc::new(api.clone()))
            .config(config)
            .join_channels(["general"])
            .build();
        let task = tokio::spawn(event_loop.run(events_rx));

        Self {
            bot,
            api,
            events: events_tx,
            calls,
            task,
            seq: AtomicU64::new(0),
        }
    }

    pub async fn connect(&self) {
        self.send(ChatEvent::Connected {
            myself: myself(),
            connection_count: 1,
        })
        .await;
        self.sync().await;
    }

    pub async fn send(&self, event: ChatEvent) {
        self.events.send(event).await.expect("loop is running");
    }

    /// Delivers a plain message and returns its timestamp.
    pub async fn message(&self, channel: &str, user: &str, text: &str) -> String {
        let ts = format!("1600000000.{:06}", self.seq.fetch_add(1, Ordering::Relaxed));
        self.send(ChatEvent::Message(MessageEvent::new(
            channel,
            user,
            text,
            ts.clone(),
        )))
        .await;
        ts
    }

    /// Returns once every event sent so far has been dispatched.
    pub async fn sync(&self) {
        let kind = format!("sync-{}", self.seq.fetch_add(1, Ordering::Relaxed));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let expected = kind.clone();
        self.bot
            .register(Listener::new().name("sync").on_event(move |handle, delivery| {
                if matches!(delivery.event(), Some(ChatEvent::Other { kind }) if *kind == expected)
                {
                    let _ = tx.send(());
                    handle.close();
                }
                ready(())
            }))
            .expect("valid listener");
        self.send(ChatEvent::Other { kind }).await;
        recv(&mut rx).await;
    }

    /// Waits for the next API call matching `pred`.
    pub async fn next_call(&mut self, pred: impl Fn(&ApiCall) -> bool) -> ApiCall {
        loop {
            let call = recv(&mut self.calls).await;
            if pred(&call) {
                return call;
            }
        }
    }

    /// Closes the event stream and waits for the loop to stop.
    ///
    /// Only meaningful without auto-ack, which keeps a sender of its own.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        drop(self.events);
        self.task.await.expect("loop did not panic")
    }
}

/// Receives with a generous bound so a broken test fails instead of hanging.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(300), rx.recv())
        .await
        .expect("timed out waiting")
        .expect("channel closed")
}
