//! Meeting bookkeeping.
//!
//! [`MeetingBook`] turns one incoming chat line into a list of [`Action`]s
//! without touching the chat connection, so every command can be exercised
//! without a running bot.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::meeting::Meeting;

static JOIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^!join\s+M(\d+)").expect("valid join pattern"));
static DECISION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bD(\d+)\+\+").expect("valid decision pattern"));

/// Picks a conference room for a new meeting.
///
/// Rooms are tried in declared order, skipping occupied ones. The caller's
/// own room wins when it is a free conference room.
pub fn select_room<'a>(
    rooms: &'a [String],
    occupied: impl Fn(&str) -> bool,
    from_room: Option<&str>,
) -> Option<&'a str> {
    let mut first_free = None;
    for room in rooms.iter().map(String::as_str) {
        if occupied(room) {
            continue;
        }
        if from_room == Some(room) {
            return Some(room);
        }
        first_free.get_or_insert(room);
    }
    first_free
}

/// One chat line, as the book needs it.
#[derive(Debug, Clone, Copy)]
pub struct Incoming<'a> {
    pub user_id: &'a str,
    pub user_name: &'a str,
    /// Name of the channel it was said in, if known.
    pub room: Option<&'a str>,
    pub ts: &'a str,
    pub text: &'a str,
}

/// Something the plugin has to say or do in response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply(String),
    ReplyMention(String),
    SendToRoom { room: String, text: String },
    SetTopic { room: String, topic: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalCommand<'a> {
    Start(&'a str),
    Join(Option<u32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoomCommand<'a> {
    Proposition(&'a str),
    Reference(&'a str),
    Conclude,
    PlusPlus(u32),
}

/// Returns the trimmed arguments when `text` invokes `name`.
fn command<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

fn parse_global(text: &str) -> Option<GlobalCommand<'_>> {
    if let Some(goal) = command(text, "!meeting") {
        return Some(GlobalCommand::Start(goal));
    }
    command(text, "!join").map(|_| {
        GlobalCommand::Join(
            JOIN_RE
                .captures(text)
                .and_then(|caps| caps[1].parse().ok()),
        )
    })
}

fn parse_room(text: &str) -> Option<RoomCommand<'_>> {
    if let Some(text) = command(text, "!proposition") {
        return Some(RoomCommand::Proposition(text));
    }
    if let Some(text) = command(text, "!ref") {
        return Some(RoomCommand::Reference(text));
    }
    if command(text, "!conclude").is_some() {
        return Some(RoomCommand::Conclude);
    }
    DECISION_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .map(RoomCommand::PlusPlus)
}

/// Running and past meetings of one bot.
#[derive(Debug, Default)]
pub struct MeetingBook {
    rooms: Vec<String>,
    /// Running meetings by room name.
    running: HashMap<String, Meeting>,
    past: Vec<Meeting>,
}

impl MeetingBook {
    /// Creates a book over the given conference rooms.
    pub fn new<I, S>(rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rooms: rooms
                .into_iter()
                .map(|r| r.as_ref().trim_start_matches('#').to_string())
                .collect(),
            running: HashMap::new(),
            past: Vec::new(),
        }
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }

    /// The meeting running in `room`, if any.
    pub fn running(&self, room: &str) -> Option<&Meeting> {
        self.running.get(room)
    }

    /// Concluded meetings, oldest first.
    pub fn past(&self) -> &[Meeting] {
        &self.past
    }

    /// Lowest id not used by a running or past meeting.
    pub fn next_meeting_id(&self) -> u32 {
        let used: BTreeSet<u32> = self
            .running
            .values()
            .chain(&self.past)
            .map(|m| m.id)
            .collect();
        let mut id = 1;
        while used.contains(&id) {
            id += 1;
        }
        id
    }

    /// Handles one chat line.
    pub fn handle(&mut self, msg: &Incoming<'_>) -> Vec<Action> {
        let mut actions = Vec::new();

        match parse_global(msg.text) {
            Some(GlobalCommand::Start(goal)) => self.start(msg, goal, &mut actions),
            Some(GlobalCommand::Join(id)) => self.join(msg, id, &mut actions),
            None => {}
        }

        let Some(room) = msg.room else {
            return actions;
        };
        let Some(meeting) = self.running.get_mut(room) else {
            return actions;
        };

        let command = parse_room(msg.text);
        meeting.import_user(msg.user_name);
        meeting.log(msg.user_name, msg.ts, msg.text);

        match command {
            Some(RoomCommand::Proposition("")) => {
                actions.push(Action::Reply("Whoops, wrong syntax for !proposition".into()));
            }
            Some(RoomCommand::Proposition(text)) => {
                let decision = meeting.add_decision(msg.user_name, text);
                actions.push(Action::Reply(format!(
                    "Proposition added, ref: D{}",
                    decision.id
                )));
            }
            Some(RoomCommand::Reference("")) => {
                actions.push(Action::Reply("Whoops, wrong syntax for !ref".into()));
            }
            Some(RoomCommand::Reference(text)) => {
                meeting.add_reference(msg.user_name, text);
                actions.push(Action::Reply("Ref. added".into()));
            }
            Some(RoomCommand::PlusPlus(id)) => {
                if let Some(decision) = meeting.decision_mut(id) {
                    decision.record_plusplus(msg.user_name);
                    actions.push(Action::ReplyMention("noted".into()));
                }
            }
            Some(RoomCommand::Conclude) | None => {}
        }

        if command == Some(RoomCommand::Conclude) {
            self.conclude(room, &mut actions);
        }
        actions
    }

    fn start(&mut self, msg: &Incoming<'_>, goal: &str, actions: &mut Vec<Action>) {
        if goal.is_empty() {
            actions.push(Action::ReplyMention("usage: `!meeting <goal>`".into()));
            return;
        }

        let running = &self.running;
        let Some(room) = select_room(&self.rooms, |r| running.contains_key(r), msg.room) else {
            actions.push(Action::Reply(
                "No conference room is free for a meeting. Add more rooms to `conf_rooms`."
                    .into(),
            ));
            return;
        };
        let room = room.to_string();

        let meeting = Meeting::new(self.next_meeting_id(), goal, &room, msg.user_name);
        let tag = meeting.tag();

        if msg.room == Some(room.as_str()) {
            actions.push(Action::SendToRoom {
                room: room.clone(),
                text: format!("Starting meeting {tag} in here."),
            });
        } else {
            actions.push(Action::Reply(format!(
                "Starting meeting {tag} in #{room}. Join with `!join {tag}`"
            )));
            let from = msg.room.map(|r| format!(" in #{r}")).unwrap_or_default();
            actions.push(Action::SendToRoom {
                room: room.clone(),
                text: format!(
                    "*** Meeting initiated by @{}{from}. Goal: {goal}",
                    msg.user_name
                ),
            });
        }
        actions.push(Action::SetTopic {
            room: room.clone(),
            topic: format!("[Running] {tag} goal: {goal}"),
        });

        self.running.insert(room, meeting);
    }

    fn join(&self, msg: &Incoming<'_>, id: Option<u32>, actions: &mut Vec<Action>) {
        let Some(id) = id else {
            actions.push(Action::ReplyMention(
                "invalid !join syntax. Use something like `!join M12`".into(),
            ));
            return;
        };

        match self.running.values().find(|m| m.id == id) {
            Some(meeting) => actions.push(Action::SendToRoom {
                room: meeting.room.clone(),
                text: format!("<@{}> asked to join", msg.user_id),
            }),
            None => actions.push(Action::ReplyMention(format!("no meeting M{id} is running"))),
        }
    }

    fn conclude(&mut self, room: &str, actions: &mut Vec<Action>) {
        let Some(mut meeting) = self.running.remove(room) else {
            return;
        };
        meeting.conclude();

        actions.push(Action::SendToRoom {
            room: room.to_string(),
            text: format!(
                "Concluding meeting {}, that's all folks!\n{}",
                meeting.tag(),
                meeting.summary()
            ),
        });
        actions.push(Action::SetTopic {
            room: room.to_string(),
            topic: format!("[Concluded] {} goal: {}", meeting.tag(), meeting.goal),
        });
        self.past.push(meeting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooms(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn line<'a>(room: Option<&'a str>, text: &'a str) -> Incoming<'a> {
        Incoming {
            user_id: "U1",
            user_name: "alice",
            room,
            ts: "1600000000.000001",
            text,
        }
    }

    // ========================================================================
    // Room selection
    // ========================================================================

    #[test]
    fn test_select_first_free_room() {
        let rooms = rooms(&["room1", "room2", "room3"]);
        let occupied = |r: &str| r == "room1";
        assert_eq!(select_room(&rooms, occupied, Some("other")), Some("room2"));
    }

    #[test]
    fn test_select_prefers_callers_room() {
        let rooms = rooms(&["room1", "room2", "room3"]);
        let occupied = |r: &str| r == "room1";
        assert_eq!(select_room(&rooms, occupied, Some("room3")), Some("room3"));
    }

    #[test]
    fn test_select_without_caller_room() {
        let rooms = rooms(&["room1"]);
        assert_eq!(select_room(&rooms, |_| false, None), Some("room1"));
    }

    #[test]
    fn test_select_all_taken() {
        let rooms = rooms(&["room1"]);
        assert_eq!(select_room(&rooms, |r| r == "room1", Some("other")), None);
        assert_eq!(select_room(&[], |_| false, Some("other")), None);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_global("!meeting  plan Q3 "), Some(GlobalCommand::Start("plan Q3")));
        assert_eq!(parse_global("!meetings"), None);
        assert_eq!(parse_global("!join m12"), Some(GlobalCommand::Join(Some(12))));
        assert_eq!(parse_global("!join 12"), Some(GlobalCommand::Join(None)));

        assert_eq!(parse_room("!proposition"), Some(RoomCommand::Proposition("")));
        assert_eq!(parse_room("!ref http://x"), Some(RoomCommand::Reference("http://x")));
        assert_eq!(parse_room("!conclude now"), Some(RoomCommand::Conclude));
        assert_eq!(parse_room("agreed, D2++"), Some(RoomCommand::PlusPlus(2)));
        assert_eq!(parse_room("ND2++"), None);
        assert_eq!(parse_room("hello"), None);
    }

    #[test]
    fn test_start_from_another_channel() {
        let mut book = MeetingBook::new(["room1", "#room2"]);
        let actions = book.handle(&line(Some("general"), "!meeting plan Q3"));

        assert_eq!(
            actions,
            [
                Action::Reply("Starting meeting M1 in #room1. Join with `!join M1`".into()),
                Action::SendToRoom {
                    room: "room1".into(),
                    text: "*** Meeting initiated by @alice in #general. Goal: plan Q3".into(),
                },
                Action::SetTopic {
                    room: "room1".into(),
                    topic: "[Running] M1 goal: plan Q3".into(),
                },
            ]
        );
        assert_eq!(book.running("room1").unwrap().creator, "alice");

        let actions = book.handle(&line(None, "!meeting retro"));
        assert_eq!(actions[0], Action::Reply("Starting meeting M2 in #room2. Join with `!join M2`".into()));
        assert!(matches!(&actions[1], Action::SendToRoom { text, .. } if text == "*** Meeting initiated by @alice. Goal: retro"));

        let actions = book.handle(&line(None, "!meeting third"));
        assert_eq!(
            actions,
            [Action::Reply(
                "No conference room is free for a meeting. Add more rooms to `conf_rooms`.".into()
            )]
        );
    }

    #[test]
    fn test_start_in_conference_room() {
        let mut book = MeetingBook::new(["room1", "room2"]);
        let actions = book.handle(&line(Some("room2"), "!meeting standup"));

        assert_eq!(
            actions[0],
            Action::SendToRoom {
                room: "room2".into(),
                text: "Starting meeting M1 in here.".into(),
            }
        );
        // The opening line is the first entry of the log.
        let meeting = book.running("room2").unwrap();
        assert_eq!(meeting.logs.len(), 1);
        assert_eq!(meeting.participants, ["alice"]);
    }

    #[test]
    fn test_join() {
        let mut book = MeetingBook::new(["room1"]);
        book.handle(&line(Some("general"), "!meeting plan"));

        assert_eq!(
            book.handle(&line(Some("general"), "!join M1")),
            [Action::SendToRoom {
                room: "room1".into(),
                text: "<@U1> asked to join".into(),
            }]
        );
        assert_eq!(
            book.handle(&line(Some("general"), "!join M7")),
            [Action::ReplyMention("no meeting M7 is running".into())]
        );
        assert!(matches!(
            &book.handle(&line(Some("general"), "!join please"))[..],
            [Action::ReplyMention(text)] if text.starts_with("invalid !join syntax")
        ));
    }

    #[test]
    fn test_meeting_lifecycle() {
        let mut book = MeetingBook::new(["room1"]);
        book.handle(&line(Some("room1"), "!meeting ship it"));

        assert_eq!(
            book.handle(&line(Some("room1"), "!proposition release on friday")),
            [Action::Reply("Proposition added, ref: D1".into())]
        );
        assert_eq!(
            book.handle(&line(Some("room1"), "!proposition")),
            [Action::Reply("Whoops, wrong syntax for !proposition".into())]
        );
        assert_eq!(
            book.handle(&line(Some("room1"), "!ref https://example.com/plan")),
            [Action::Reply("Ref. added".into())]
        );
        assert_eq!(
            book.handle(&line(Some("room1"), "D1++")),
            [Action::ReplyMention("noted".into())]
        );
        assert!(book.handle(&line(Some("room1"), "D9++")).is_empty());
        // Commands outside the meeting room are not recorded.
        assert!(book.handle(&line(Some("general"), "!proposition nope")).is_empty());

        let actions = book.handle(&line(Some("room1"), "!conclude"));
        assert_eq!(
            actions[1],
            Action::SetTopic {
                room: "room1".into(),
                topic: "[Concluded] M1 goal: ship it".into(),
            }
        );
        assert!(matches!(
            &actions[0],
            Action::SendToRoom { text, .. }
                if text.starts_with("Concluding meeting M1, that's all folks!")
                    && text.contains("D1 (1 ++): release on friday")
        ));

        assert!(book.running("room1").is_none());
        let past = &book.past()[0];
        assert!(past.concluded);
        assert_eq!(past.logs.len(), 7);
        assert_eq!(past.references[0].text, "https://example.com/plan");

        // Ids are never reused, the room is free again.
        book.handle(&line(Some("general"), "!meeting again"));
        assert_eq!(book.running("room1").unwrap().id, 2);
    }
}
