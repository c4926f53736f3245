//! The bot handle shared by plugins and handlers.
//!
//! A [`Bot`] is a cheap, cloneable handle over the engine's shared state:
//! the directory cache, the registry request channels, the outgoing queue,
//! group lookup and status. Building one also yields the [`EventLoop`] that
//! owns the registry; the loop must be run for anything to be dispatched.
//!
//! # Example
//!
//! ```rust,ignore
//! let (bot, event_loop) = Bot::builder(Arc::new(api))
//!     .config(EngineConfig::default())
//!     .join_channels(["general"])
//!     .build();
//!
//! bot.register(Listener::new().contains("hello").on_message(|_, msg| async move {
//!     let _ = msg.reply("hi there").await;
//! }))?;
//!
//! event_loop.run(events).await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::correlation::reaction::{ReactionListener, ReactionOrigin};
use crate::correlation::reply::Reply;
use crate::directory::Directory;
use crate::foundation::error::{ApiError, ApiResult, ListenerResult};
use crate::foundation::event::{LocalId, ReactionItem};
use crate::foundation::model::{Channel, SelfInfo, User};
use crate::framework::config::EngineConfig;
use crate::framework::event_loop::EventLoop;
use crate::framework::listener::{Listener, ListenerHandle};
use crate::framework::registry::{self, RegistrySender};
use crate::groups::{GroupMembership, MemoryGroups};
use crate::integration::api::BoxedChatApi;
use crate::status::Status;

/// A message waiting in the outgoing queue.
#[derive(Debug, Clone)]
pub(crate) struct OutgoingMessage {
    pub id: LocalId,
    pub channel: String,
    pub text: String,
}

pub(crate) struct BotInner {
    api: BoxedChatApi,
    directory: Directory,
    groups: Arc<dyn GroupMembership>,
    status: Status,
    config: EngineConfig,
    join_channels: Vec<String>,
    requests: RegistrySender,
    outgoing: mpsc::Sender<OutgoingMessage>,
    next_local_id: AtomicU64,
    active_listeners: AtomicUsize,
}

/// Handle to a running bot.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for a [`Bot`] and its [`EventLoop`].
pub struct BotBuilder {
    api: BoxedChatApi,
    config: EngineConfig,
    groups: Option<Arc<dyn GroupMembership>>,
    join_channels: Vec<String>,
}

impl BotBuilder {
    /// Sets the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the group membership lookup. Defaults to an empty [`MemoryGroups`].
    pub fn groups(mut self, groups: Arc<dyn GroupMembership>) -> Self {
        self.groups = Some(groups);
        self
    }

    /// Channels to join every time the connection comes up.
    pub fn join_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.join_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the bot handle and the loop that drives it.
    pub fn build(self) -> (Bot, EventLoop) {
        let (requests, receiver) = registry::channel();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(self.config.outgoing_buffer.max(1));

        let bot = Bot {
            inner: Arc::new(BotInner {
                api: self.api,
                directory: Directory::new(),
                groups: self
                    .groups
                    .unwrap_or_else(|| Arc::new(MemoryGroups::new())),
                status: Status::new(),
                config: self.config,
                join_channels: self.join_channels,
                requests,
                outgoing: outgoing_tx,
                next_local_id: AtomicU64::new(1),
                active_listeners: AtomicUsize::new(0),
            }),
        };

        let event_loop = EventLoop::new(bot.clone(), receiver, outgoing_rx);
        (bot, event_loop)
    }
}

// ============================================================================
// Bot
// ============================================================================

impl Bot {
    /// Starts building a bot on top of `api`.
    pub fn builder(api: BoxedChatApi) -> BotBuilder {
        BotBuilder {
            api,
            config: EngineConfig::default(),
            groups: None,
            join_channels: Vec::new(),
        }
    }

    /// The chat API.
    pub fn api(&self) -> &BoxedChatApi {
        &self.inner.api
    }

    /// The directory cache.
    pub fn directory(&self) -> &Directory {
        &self.inner.directory
    }

    /// The group membership lookup.
    pub fn groups(&self) -> &Arc<dyn GroupMembership> {
        &self.inner.groups
    }

    /// Component health.
    pub fn status(&self) -> &Status {
        &self.inner.status
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub(crate) fn join_channel_names(&self) -> &[String] {
        &self.inner.join_channels
    }

    /// The bot's own identity, once connected.
    pub fn myself(&self) -> Option<SelfInfo> {
        self.inner.directory.myself()
    }

    /// Finds a user by id, name, real name or email.
    pub fn find_user(&self, query: &str) -> Option<User> {
        self.inner.directory.find_user(query)
    }

    /// Looks up a channel by name.
    pub fn channel_by_name(&self, name: &str) -> Option<Channel> {
        self.inner.directory.channel_by_name(name)
    }

    /// The cached direct conversation with `user_id`.
    pub fn direct_channel_with(&self, user_id: &str) -> Option<Channel> {
        self.inner.directory.direct_channel_with(user_id)
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Registers a listener.
    ///
    /// Fails with [`InvalidListenerConfig`](crate::ListenerError::InvalidListenerConfig)
    /// when the listener has no handler, two handlers or two lifetimes; the
    /// registry is left untouched in that case. The listener sees every
    /// event the loop processes after it drains the request.
    pub fn register(&self, listener: Listener) -> ListenerResult<ListenerHandle> {
        self.inner.requests.register(listener)
    }

    /// Removes a listener. Idempotent.
    pub fn remove(&self, handle: &ListenerHandle) {
        handle.close();
    }

    /// Number of listeners in the registry, as of the loop's last pass.
    pub fn active_listeners(&self) -> usize {
        self.inner.active_listeners.load(Ordering::Acquire)
    }

    pub(crate) fn set_active_listeners(&self, count: usize) {
        self.inner.active_listeners.store(count, Ordering::Release);
    }

    /// Listens for reactions on a message timestamp or file id.
    pub fn listen_reaction(
        &self,
        item: impl Into<String>,
        listener: ReactionListener,
    ) -> ListenerResult<ListenerHandle> {
        self.register_reaction(item.into(), ReactionOrigin::default(), listener)
    }

    pub(crate) fn register_reaction(
        &self,
        target: String,
        origin: ReactionOrigin,
        listener: ReactionListener,
    ) -> ListenerResult<ListenerHandle> {
        let listener = listener.into_listener(self.clone(), target, origin)?;
        self.register(listener)
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Queues a message for `channel` (a channel id).
    ///
    /// Returns as soon as the message is queued; a full queue makes this wait.
    /// Attach acknowledgement continuations to the returned [`Reply`] before
    /// yielding to the runtime again.
    pub async fn send(&self, channel: &str, text: impl Into<String>) -> ApiResult<Reply> {
        let reply = self.prepare(channel, text.into());
        self.enqueue(&reply).await?;
        Ok(reply)
    }

    /// Queues a message for the channel called `name`.
    pub async fn send_to_channel(&self, name: &str, text: impl Into<String>) -> ApiResult<Reply> {
        let channel = self
            .channel_by_name(name)
            .ok_or_else(|| ApiError::Other(format!("unknown channel: {name}")))?;
        self.send(&channel.id, text).await
    }

    /// Sends a direct message to the user matching `query` in the background.
    ///
    /// Opening the conversation may need the provider, so nothing here waits
    /// on it. `then` receives the [`Reply`] before the message is queued, so
    /// continuations attached inside `then` cannot miss the acknowledgement.
    /// If the conversation cannot be opened, `then` receives the error.
    pub fn send_private<F>(&self, query: &str, text: impl Into<String>, then: F)
    where
        F: FnOnce(ApiResult<Reply>) + Send + 'static,
    {
        let user_id = self
            .find_user(query)
            .map_or_else(|| query.to_string(), |u| u.id);
        let text = text.into();
        let bot = self.clone();

        tokio::spawn(async move {
            match bot.direct_channel(&user_id).await {
                Ok(channel) => bot.send_then(&channel.id, text, then).await,
                Err(e) => {
                    warn!(user = %user_id, error = %e, "Failed to open direct conversation");
                    then(Err(e));
                }
            }
        });
    }

    /// The direct conversation with `user_id`, opened and cached on a miss.
    async fn direct_channel(&self, user_id: &str) -> ApiResult<Channel> {
        if let Some(channel) = self.direct_channel_with(user_id) {
            return Ok(channel);
        }
        let channel = self.inner.api.open_direct(user_id).await?;
        self.inner.directory.update_channel(channel.clone());
        Ok(channel)
    }

    /// Hands the reply to `then`, then queues the message.
    pub(crate) async fn send_then<F>(&self, channel: &str, text: String, then: F)
    where
        F: FnOnce(ApiResult<Reply>),
    {
        let reply = self.prepare(channel, text);
        then(Ok(reply.clone()));
        if let Err(e) = self.enqueue(&reply).await {
            warn!(local_id = %reply.local_id(), error = %e, "Dropped outgoing message");
        }
    }

    fn prepare(&self, channel: &str, text: String) -> Reply {
        let id = LocalId(self.inner.next_local_id.fetch_add(1, Ordering::Relaxed));
        Reply::new(self.clone(), id, channel.to_string(), text)
    }

    async fn enqueue(&self, reply: &Reply) -> ApiResult<()> {
        self.inner
            .outgoing
            .send(OutgoingMessage {
                id: reply.local_id(),
                channel: reply.channel().to_string(),
                text: reply.text().to_string(),
            })
            .await
            .map_err(|_| ApiError::QueueClosed)?;
        debug!(local_id = %reply.local_id(), channel = %reply.channel(), "Queued outgoing message");
        Ok(())
    }

    /// Adds a reaction in the background, logging failures.
    pub(crate) fn spawn_add_reaction(&self, emoji: String, item: ReactionItem) {
        let api = Arc::clone(&self.inner.api);
        tokio::spawn(async move {
            if let Err(e) = api.add_reaction(&emoji, &item).await {
                warn!(emoji = %emoji, error = %e, "Failed to add reaction");
            }
        });
    }

    /// Sets the topic of the channel called `name` in the background.
    pub fn set_topic(&self, name: &str, topic: impl Into<String>) -> ApiResult<()> {
        let channel = self
            .channel_by_name(name)
            .ok_or_else(|| ApiError::Other(format!("unknown channel: {name}")))?;
        let api = Arc::clone(&self.inner.api);
        let topic = topic.into();
        tokio::spawn(async move {
            if let Err(e) = api.set_topic(&channel.id, &topic).await {
                warn!(channel = %channel.id, error = %e, "Failed to set topic");
            }
        });
        Ok(())
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("myself", &self.myself())
            .field("active_listeners", &self.active_listeners())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
