//! Acknowledgement correlation, reactions and edits.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{Harness, recv};
use futures::future::ready;
use async_trait::async_trait;
use parley_core::{
    AckFailure, ApiCall, ApiResult, Bot, Channel, ChatApi, ChatEvent, DirectorySnapshot,
    Listener, LocalId, LoopbackApi, MessageEvent, ReactionEvent, ReactionItem, ReactionKind,
    ReactionListener, Reply,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

fn reaction(user: &str, emoji: &str, ts: &str) -> ChatEvent {
    ChatEvent::Reaction(ReactionEvent {
        kind: ReactionKind::Added,
        user: user.into(),
        emoji: emoji.into(),
        item: ReactionItem::message("C1", ts),
        event_ts: "2.0".into(),
    })
}

#[tokio::test]
async fn test_ack_continuation_runs_once() {
    let h = Harness::manual_ack().await;
    let reply = h.bot.send("C1", "hello").await.unwrap();
    let other = h.bot.send("C1", "unrelated").await.unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let seen = Arc::clone(&count);
    let handle = reply
        .on_ack(move |ack| {
            seen.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(ack.ts);
        })
        .unwrap();

    h.ack(other.local_id(), "10.0").await;
    h.sync().await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    h.ack(reply.local_id(), "11.0").await;
    h.ack(reply.local_id(), "11.0").await;
    h.sync().await;

    assert_eq!(recv(&mut rx).await, "11.0");
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(handle.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_missing_ack_times_out() {
    let h = Harness::manual_ack().await;
    let reply = h.bot.send("C1", "hello").await.unwrap();

    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();
    let start = Instant::now();
    reply
        .on_ack_or_else(
            move |ack| {
                let _ = ack_tx.send(ack);
            },
            move |failure| {
                let _ = fail_tx.send(failure);
            },
        )
        .unwrap();

    assert_eq!(recv(&mut fail_rx).await, AckFailure::TimedOut);
    assert!(start.elapsed() >= Duration::from_secs(20));

    // A late ack finds nobody waiting.
    h.ack(reply.local_id(), "12.0").await;
    h.sync().await;
    assert!(ack_rx.try_recv().is_err());
    assert!(fail_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_rejected_message_fails() {
    let h = Harness::manual_ack().await;
    let reply = h.bot.send("C1", "way too long").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    reply
        .on_ack_or_else(|_| panic!("rejected message acknowledged"), move |failure| {
            let _ = tx.send(failure);
        })
        .unwrap();

    h.send(ChatEvent::AckError {
        reply_to: reply.local_id(),
        code: "2".into(),
        message: "msg_too_long".into(),
    })
    .await;

    assert_eq!(
        recv(&mut rx).await,
        AckFailure::Rejected {
            code: "2".into(),
            message: "msg_too_long".into(),
        }
    );
}

#[tokio::test]
async fn test_reaction_added_after_ack() {
    let mut h = Harness::connected().await;
    let reply = h.bot.send("C1", "vote here").await.unwrap();
    reply.add_reaction("thumbsup").unwrap();

    let call = h
        .next_call(|c| matches!(c, ApiCall::AddReaction { .. }))
        .await;
    let ApiCall::AddReaction { emoji, item } = call else {
        unreachable!();
    };
    assert_eq!(emoji, "thumbsup");
    assert_eq!(item.channel.as_deref(), Some("C1"));
    assert_eq!(item.ts.as_deref(), Some("1700000000.000001"));
}

#[tokio::test]
async fn test_reply_mention_in_channel() {
    let mut h = Harness::connected().await;
    h.bot
        .register(Listener::new().contains("ping").on_message(|_, msg| async move {
            let _ = msg.reply_mention("pong").await;
        }))
        .unwrap();

    h.message("C1", "U1", "ping").await;
    let call = h
        .next_call(|c| matches!(c, ApiCall::SendMessage { .. }))
        .await;
    let ApiCall::SendMessage { channel, text, .. } = call else {
        unreachable!();
    };
    assert_eq!(channel, "C1");
    assert_eq!(text, "<@U1> pong");
}

#[tokio::test]
async fn test_updates_before_ack_collapse_to_latest() {
    let mut h = Harness::manual_ack().await;
    let reply = h.bot.send("C1", "working").await.unwrap();
    let updateable = reply.updateable().unwrap();

    updateable.update("ignored");
    updateable.update_prefix("also ignored ");
    updateable.update_suffix("... done");
    assert!(updateable.ts().is_none());

    h.ack(reply.local_id(), "13.0").await;
    let call = h
        .next_call(|c| matches!(c, ApiCall::UpdateMessage { .. }))
        .await;
    assert_eq!(
        call,
        ApiCall::UpdateMessage {
            channel: "C1".into(),
            ts: "13.0".into(),
            text: "working... done".into(),
        }
    );
    assert_eq!(updateable.ts().as_deref(), Some("13.0"));

    updateable.update(":+1:");
    let call = h
        .next_call(|c| matches!(c, ApiCall::UpdateMessage { .. }))
        .await;
    let ApiCall::UpdateMessage { text, .. } = call else {
        unreachable!();
    };
    assert_eq!(text, ":+1:");

    let updates = h
        .api
        .calls()
        .iter()
        .filter(|c| matches!(c, ApiCall::UpdateMessage { .. }))
        .count();
    assert_eq!(updates, 2);
}

#[tokio::test]
async fn test_reaction_listener_on_reply() {
    let h = Harness::manual_ack().await;
    let reply = h.bot.send("C1", "react to me").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    reply
        .listen_reaction(ReactionListener::new().emoji(":+1:").on_reaction(
            move |_, reaction| {
                let local_id = reaction.origin.reply.as_ref().map(|r| r.local_id());
                let _ = tx.send((reaction.user().to_string(), local_id));
                ready(())
            },
        ))
        .unwrap();

    h.ack(reply.local_id(), "14.0").await;
    h.sync().await;

    h.send(reaction(common::BOT_ID, "+1", "14.0")).await;
    h.send(reaction("U1", "+1", "99.0")).await;
    h.send(reaction("U1", "tada", "14.0")).await;
    h.send(reaction("U2", "+1", "14.0")).await;
    h.sync().await;

    assert_eq!(recv(&mut rx).await, ("U2".to_string(), Some(reply.local_id())));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_reaction_listener_on_file() {
    let h = Harness::connected().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.bot
        .listen_reaction(
            "F1",
            ReactionListener::new()
                .kind(ReactionKind::Removed)
                .on_reaction(move |handle, reaction| {
                    let _ = tx.send(reaction.emoji().to_string());
                    handle.close();
                    ready(())
                }),
        )
        .unwrap();

    let file_reaction = |kind, emoji: &str| {
        ChatEvent::Reaction(ReactionEvent {
            kind,
            user: "U1".into(),
            emoji: emoji.into(),
            item: ReactionItem {
                kind: "file".into(),
                file: Some("F1".into()),
                ..Default::default()
            },
            event_ts: "3.0".into(),
        })
    };
    h.send(file_reaction(ReactionKind::Added, "eyes")).await;
    h.send(file_reaction(ReactionKind::Removed, "heart")).await;
    h.send(file_reaction(ReactionKind::Removed, "fire")).await;
    h.sync().await;

    assert_eq!(recv(&mut rx).await, "heart");
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_delete_after_waits_for_ack_and_delay() {
    let mut h = Harness::manual_ack().await;
    let reply = h.bot.send("C1", "self destruct").await.unwrap();
    reply.delete_after(Duration::from_secs(30)).unwrap();

    h.ack(reply.local_id(), "15.0").await;
    let acked = Instant::now();
    let call = h
        .next_call(|c| matches!(c, ApiCall::DeleteMessage { .. }))
        .await;

    assert!(acked.elapsed() >= Duration::from_secs(30));
    assert_eq!(
        call,
        ApiCall::DeleteMessage {
            channel: "C1".into(),
            ts: "15.0".into(),
        }
    );
}

#[tokio::test]
async fn test_reply_listener_carries_ack() {
    let h = Harness::manual_ack().await;
    let reply = h.bot.send("C1", "continue? (yes/no)").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    reply
        .listen(Listener::new().contains("yes").on_message(move |handle, _| {
            let _ = tx.send(handle.reply_ack().map(|ack| ack.ts.clone()));
            handle.close();
            ready(())
        }))
        .unwrap();

    // Not registered until the ack arrives.
    h.message("C1", "U1", "yes").await;
    h.ack(reply.local_id(), "16.0").await;
    h.message("C1", "U1", "yes please").await;

    assert_eq!(recv(&mut rx).await, Some("16.0".to_string()));
    h.sync().await;
    assert!(rx.try_recv().is_err());
}

/// Forwards the channel of a private reply, or its error.
fn channel_of(
    tx: &mpsc::UnboundedSender<ApiResult<String>>,
) -> impl FnOnce(ApiResult<Reply>) + Send + 'static {
    let tx = tx.clone();
    move |reply| {
        let _ = tx.send(reply.map(|r| r.channel().to_string()));
    }
}

#[tokio::test]
async fn test_send_private_opens_conversation_once() {
    let mut h = Harness::connected().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    h.bot.send_private("bob", "psst", channel_of(&tx));
    assert_eq!(recv(&mut rx).await.unwrap(), "DU2");
    assert_eq!(
        h.next_call(|c| matches!(c, ApiCall::OpenDirect { .. })).await,
        ApiCall::OpenDirect { user: "U2".into() }
    );

    h.bot.send_private("U2", "again", channel_of(&tx));
    assert_eq!(recv(&mut rx).await.unwrap(), "DU2");
    h.bot.send_private("alice@example.com", "hi", channel_of(&tx));
    assert_eq!(recv(&mut rx).await.unwrap(), "D1");

    let mut sent = Vec::new();
    while sent.len() < 3 {
        if let ApiCall::SendMessage { channel, text, .. } = h
            .next_call(|c| matches!(c, ApiCall::SendMessage { .. }))
            .await
        {
            sent.push((channel, text));
        }
    }
    sent.sort();
    assert_eq!(
        sent,
        [
            ("D1".to_string(), "hi".to_string()),
            ("DU2".to_string(), "again".to_string()),
            ("DU2".to_string(), "psst".to_string()),
        ]
    );

    let opened = h
        .api
        .calls()
        .iter()
        .filter(|c| matches!(c, ApiCall::OpenDirect { .. }))
        .count();
    assert_eq!(opened, 1);
}

/// A [`LoopbackApi`] that takes ten seconds to open a direct conversation.
struct SlowDirectApi(LoopbackApi);

#[async_trait]
impl ChatApi for SlowDirectApi {
    async fn send_message(&self, id: LocalId, channel: &str, text: &str) -> ApiResult<()> {
        self.0.send_message(id, channel, text).await
    }

    async fn update_message(&self, channel: &str, ts: &str, text: &str) -> ApiResult<()> {
        self.0.update_message(channel, ts, text).await
    }

    async fn delete_message(&self, channel: &str, ts: &str) -> ApiResult<()> {
        self.0.delete_message(channel, ts).await
    }

    async fn add_reaction(&self, emoji: &str, item: &ReactionItem) -> ApiResult<()> {
        self.0.add_reaction(emoji, item).await
    }

    async fn fetch_directory(&self) -> ApiResult<DirectorySnapshot> {
        self.0.fetch_directory().await
    }

    async fn join_channel(&self, name: &str) -> ApiResult<Channel> {
        self.0.join_channel(name).await
    }

    async fn open_direct(&self, user_id: &str) -> ApiResult<Channel> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        self.0.open_direct(user_id).await
    }

    async fn set_topic(&self, channel: &str, topic: &str) -> ApiResult<()> {
        self.0.set_topic(channel, topic).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_private_reply_does_not_hold_up_dispatch() {
    let (events_tx, events_rx) = mpsc::channel(16);
    let api = LoopbackApi::new().with_directory(common::snapshot());
    let (bot, event_loop) = Bot::builder(Arc::new(SlowDirectApi(api))).build();
    tokio::spawn(event_loop.run(events_rx));
    events_tx
        .send(ChatEvent::Connected {
            myself: common::myself(),
            connection_count: 1,
        })
        .await
        .unwrap();

    let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
    bot.register(Listener::new().contains("dm me").on_message(move |_, msg| {
        msg.reply_privately("hi", channel_of(&sent_tx));
        ready(())
    }))
    .unwrap();
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    bot.register(Listener::new().name("witness").on_message(move |_, msg| {
        let _ = seen_tx.send((msg.text.clone(), Instant::now()));
        ready(())
    }))
    .unwrap();

    let start = Instant::now();
    for (text, ts) in [("dm me", "1.0"), ("next", "2.0")] {
        events_tx
            .send(ChatEvent::Message(MessageEvent::new("C1", "U2", text, ts)))
            .await
            .unwrap();
    }

    for expected in ["dm me", "next"] {
        let (text, at) = recv(&mut seen_rx).await;
        assert_eq!(text, expected);
        assert!(at - start < Duration::from_secs(1));
    }
    assert_eq!(recv(&mut sent_rx).await.unwrap(), "DU2");
    assert!(start.elapsed() >= Duration::from_secs(10));
}
