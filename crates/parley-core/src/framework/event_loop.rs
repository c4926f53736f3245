//! The event loop: the single consumer that owns the registry.
//!
//! # Processing Model
//!
//! Each pass selects exactly one item among:
//!
//! - a listener add request
//! - a listener removal request
//! - a timer re-arm request
//! - the earliest due listener deadline
//! - the next provider event
//!
//! After that item, every queued removal is drained, so a listener closed
//! while event N is handled never sees event N+1. Queued add requests are
//! drained before a provider event is dispatched, so a listener registered
//! before the event reached the loop sees it.
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────┐   ┌───────────┐
//! │ provider │──▶│ directory  │──▶│ normalize │──▶│ listeners │
//! │  events  │   │  effects   │   │  message  │   │ (ordered) │
//! └──────────┘   └────────────┘   └───────────┘   └───────────┘
//! ```
//!
//! Handlers are awaited one after another on the loop. They should queue
//! sends and spawn other I/O rather than wait on it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, error, info, trace, warn};

use crate::foundation::error::EngineError;
use crate::foundation::event::{ChatEvent, DirectoryChange, MessageEvent, MessageSubtype};
use crate::foundation::message::{Delivery, Message};
use crate::foundation::model::{SelfInfo, Topic};
use crate::framework::config::UnknownSenderPolicy;
use crate::framework::listener::ListenerId;
use crate::framework::registry::{
    AddRequest, ListenerHandler, Registry, RegistryReceiver, TimerRequest,
};
use crate::framework::timer::TimerQueue;
use crate::integration::api::BoxedChatApi;
use crate::integration::bot::{Bot, OutgoingMessage};
use crate::status::{Component, Health};

/// Drives listener dispatch for one [`Bot`].
pub struct EventLoop {
    bot: Bot,
    requests: RegistryReceiver,
    outgoing: Option<mpsc::Receiver<OutgoingMessage>>,
    registry: Registry,
    timers: TimerQueue,
}

impl EventLoop {
    pub(crate) fn new(
        bot: Bot,
        requests: RegistryReceiver,
        outgoing: mpsc::Receiver<OutgoingMessage>,
    ) -> Self {
        Self {
            bot,
            requests,
            outgoing: Some(outgoing),
            registry: Registry::default(),
            timers: TimerQueue::default(),
        }
    }

    /// The bot this loop serves.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Runs until `events` is closed.
    ///
    /// Also drives the outgoing queue for as long as it runs. Fails only when
    /// the directory cannot be fetched after a (re)connect.
    pub async fn run(mut self, mut events: mpsc::Receiver<ChatEvent>) -> Result<(), EngineError> {
        let shutdown = CancellationToken::new();
        let _shutdown_guard = shutdown.clone().drop_guard();

        if let Some(outgoing) = self.outgoing.take() {
            tokio::spawn(drain_outgoing(
                Arc::clone(self.bot.api()),
                outgoing,
                self.bot.config().send_interval(),
                shutdown.clone(),
            ));
        }

        info!("Event loop started");

        loop {
            let next_deadline = self.timers.next_deadline();

            tokio::select! {
                Some(request) = self.requests.add.recv() => {
                    self.add(request);
                }
                Some(id) = self.requests.remove.recv() => {
                    self.remove(id);
                }
                Some(timer) = self.requests.rearm.recv() => {
                    self.drain_adds();
                    self.timers.push(timer);
                }
                _ = tokio::time::sleep_until(next_deadline.unwrap_or_else(Instant::now)),
                    if next_deadline.is_some() =>
                {
                    self.fire_timers();
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.drain_adds();
                        self.handle_event(event).await?;
                    }
                    None => {
                        info!("Event stream closed, stopping event loop");
                        break;
                    }
                }
            }

            self.drain_removals();
        }

        Ok(())
    }

    // =========================================================================
    // Registry maintenance
    // =========================================================================

    fn add(&mut self, request: AddRequest) {
        let id = request.listener.handle.id();
        if self.registry.insert(request.listener) {
            if let Some(timer) = request.timer {
                self.timers.push(timer);
            }
            trace!(listener = %id, total = self.registry.len(), "Listener added");
        } else {
            trace!(listener = %id, "Listener closed before it was added");
        }
        self.bot.set_active_listeners(self.registry.len());
    }

    fn remove(&mut self, id: ListenerId) {
        self.timers.forget(id);
        if self.registry.remove(id) {
            trace!(listener = %id, total = self.registry.len(), "Listener removed");
        }
        self.bot.set_active_listeners(self.registry.len());
    }

    fn drain_adds(&mut self) {
        while let Ok(request) = self.requests.add.try_recv() {
            self.add(request);
        }
    }

    fn drain_removals(&mut self) {
        while let Ok(id) = self.requests.remove.try_recv() {
            self.remove(id);
        }
    }

    fn fire_timers(&mut self) {
        for timer in self.timers.pop_due(Instant::now()) {
            self.fire(timer);
        }
        trace!(pending = self.timers.len(), "Timers fired");
    }

    fn fire(&self, timer: TimerRequest) {
        let Some(listener) = self.registry.get(timer.id).cloned() else {
            return;
        };
        let handle = &listener.handle;
        if handle.is_closed() || handle.generation() != timer.generation {
            trace!(listener = %timer.id, generation = timer.generation, "Stale timer");
            return;
        }

        debug!(
            listener = %timer.id,
            name = handle.name().unwrap_or("unnamed"),
            "Listener timed out"
        );
        if let Some(on_timeout) = &listener.on_timeout {
            on_timeout(handle.clone());
        }
        // The continuation may have re-armed the timer to keep listening.
        if handle.generation() == timer.generation {
            handle.close();
        }
    }

    // =========================================================================
    // Provider events
    // =========================================================================

    async fn handle_event(&self, event: ChatEvent) -> Result<(), EngineError> {
        trace!(event = event.name(), "Processing event");
        let directory = self.bot.directory();

        let message = match &event {
            ChatEvent::Connecting {
                attempt,
                connection_count,
            } => {
                info!(attempt, connection_count, "Connecting to chat service");
                None
            }
            ChatEvent::Connected {
                myself,
                connection_count,
            } => {
                self.on_connected(myself, *connection_count).await?;
                None
            }
            ChatEvent::Disconnected { reason } => {
                warn!(
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "Disconnected from chat service"
                );
                self.bot.status().set(Component::Chat, Health::NotOk);
                None
            }
            ChatEvent::Message(raw) => {
                self.apply_message_effects(raw);
                Some(Message::normalize(raw, directory, self.bot.clone()))
            }
            ChatEvent::Presence { user, presence } => {
                if directory.set_presence(user, presence) {
                    debug!(user = %user, presence = %presence, "Presence changed");
                } else {
                    debug!(user = %user, "Presence change for unknown user");
                }
                None
            }
            ChatEvent::UserChange(user) => {
                directory.upsert_user(user.clone());
                None
            }
            ChatEvent::Directory(change) => {
                if !directory.apply(change) {
                    warn!(change = ?change, "Directory change for an unknown channel");
                }
                None
            }
            ChatEvent::Reaction(_) | ChatEvent::Ack(_) => None,
            ChatEvent::AckError {
                reply_to,
                code,
                message,
            } => {
                warn!(local_id = %reply_to, code = %code, message = %message, "Message rejected");
                None
            }
            ChatEvent::Error { code, message } => {
                error!(code = %code, message = %message, "Chat service error");
                None
            }
            ChatEvent::Other { kind } => {
                trace!(kind = %kind, "Unhandled event");
                None
            }
        };

        if let Some(msg) = &message {
            let unknown_sender =
                msg.from_user.is_none() && msg.event.subtype != MessageSubtype::BotMessage;
            if unknown_sender && self.bot.config().unknown_sender == UnknownSenderPolicy::Drop {
                debug!(
                    channel = %msg.event.channel,
                    ts = %msg.event.ts,
                    "Dropping message from unknown sender"
                );
                return Ok(());
            }
        }

        self.dispatch(event, message).await;
        Ok(())
    }

    async fn on_connected(&self, myself: &SelfInfo, connection_count: u32) -> Result<(), EngineError> {
        info!(
            user = %myself.id,
            name = %myself.name,
            connection_count,
            "Connected, fetching directory"
        );

        let snapshot = self.bot.api().fetch_directory().await.map_err(|e| {
            error!(error = %e, "Failed to fetch directory snapshot");
            EngineError::Transport(e)
        })?;

        let directory = self.bot.directory();
        directory.replace(snapshot);
        directory.set_myself(myself.clone());
        info!(
            users = directory.user_count(),
            channels = directory.channel_count(),
            "Directory loaded"
        );

        for name in self.bot.join_channel_names() {
            match directory.channel_by_name(name) {
                Some(channel) if channel.is_member => {
                    trace!(name = %name, "Already a member, not joining");
                    continue;
                }
                Some(_) => {}
                None => {
                    warn!(name = %name, "Configured channel is not in the directory, not joining");
                    continue;
                }
            }
            let bot = self.bot.clone();
            let name = name.clone();
            tokio::spawn(async move {
                match bot.api().join_channel(&name).await {
                    Ok(channel) => {
                        debug!(channel = %channel.id, name = %name, "Joined channel");
                        bot.directory().apply(&DirectoryChange::Joined(channel));
                    }
                    Err(e) => warn!(name = %name, error = %e, "Failed to join channel"),
                }
            });
        }

        self.bot.status().set(Component::Chat, Health::Ok);
        Ok(())
    }

    fn apply_message_effects(&self, raw: &MessageEvent) {
        let directory = self.bot.directory();
        let changed = |value: &str| Topic {
            value: value.to_string(),
            creator: raw.user.clone().unwrap_or_default(),
            last_set: unix_from_ts(&raw.ts),
        };

        let patched = match &raw.subtype {
            MessageSubtype::ChannelTopic { topic } => {
                let topic = changed(topic);
                directory.patch_channel(&raw.channel, |c| c.topic = topic)
            }
            MessageSubtype::ChannelPurpose { purpose } => {
                let purpose = changed(purpose);
                directory.patch_channel(&raw.channel, |c| c.purpose = purpose)
            }
            _ => true,
        };

        if !patched {
            warn!(channel = %raw.channel, "Topic change for an unknown channel");
        }
    }

    async fn dispatch(&self, event: ChatEvent, message: Option<Message>) {
        let event = Arc::new(event);
        let message = message.map(Arc::new);
        let span = debug_span!("dispatch", event = event.name());

        async {
            for listener in self.registry.snapshot() {
                let handle = listener.handle.clone();
                if handle.is_closed() {
                    continue;
                }

                match &listener.handler {
                    ListenerHandler::Message(handler) => {
                        let Some(msg) = &message else {
                            continue;
                        };
                        let Some(msg) = listener.filter.apply(msg, self.bot.groups().as_ref())
                        else {
                            continue;
                        };
                        trace!(listener = %handle.id(), "Filter passed");
                        handler(handle, msg).await;
                    }
                    ListenerHandler::Event(handler) => {
                        let delivery = match &message {
                            Some(msg) => Delivery::Message(Arc::clone(msg)),
                            None => Delivery::Event(Arc::clone(&event)),
                        };
                        handler(handle, delivery).await;
                    }
                }
            }
        }
        .instrument(span)
        .await;
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("listeners", &self.registry.len())
            .field("timers", &self.timers.len())
            .finish()
    }
}

/// Seconds part of a provider timestamp (`"1700000000.000100"`).
fn unix_from_ts(ts: &str) -> i64 {
    ts.split('.')
        .next()
        .and_then(|secs| secs.parse().ok())
        .unwrap_or_default()
}

/// Sends queued messages one at a time, pausing `interval` between sends.
async fn drain_outgoing(
    api: BoxedChatApi,
    mut outgoing: mpsc::Receiver<OutgoingMessage>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => break,
            message = outgoing.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        trace!(local_id = %message.id, channel = %message.channel, "Sending message");
        if let Err(e) = api
            .send_message(message.id, &message.channel, &message.text)
            .await
        {
            warn!(
                local_id = %message.id,
                channel = %message.channel,
                error = %e,
                "Failed to send message"
            );
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("Outgoing queue stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_from_ts() {
        assert_eq!(unix_from_ts("1700000000.000100"), 1_700_000_000);
        assert_eq!(unix_from_ts("42"), 42);
        assert_eq!(unix_from_ts("garbage"), 0);
    }
}
