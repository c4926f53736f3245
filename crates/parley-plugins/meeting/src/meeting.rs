//! The record of one meeting.

use std::collections::BTreeSet;
use std::fmt::Write;

/// A proposition raised during a meeting, referenced as `D<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub id: u32,
    pub author: String,
    pub text: String,
    /// Users who `D<id>++`'d it.
    pub plusplus: BTreeSet<String>,
}

impl Decision {
    /// Records support from `user`. Returns false if already recorded.
    pub fn record_plusplus(&mut self, user: impl Into<String>) -> bool {
        self.plusplus.insert(user.into())
    }
}

/// A link or document shared with `!ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub author: String,
    pub text: String,
}

/// A message said in the meeting room while the meeting ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub user: String,
    pub ts: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    pub id: u32,
    pub goal: String,
    /// Name of the conference room it runs in.
    pub room: String,
    pub creator: String,
    pub decisions: Vec<Decision>,
    pub references: Vec<Reference>,
    pub logs: Vec<LogEntry>,
    /// Users who spoke, in order of first appearance.
    pub participants: Vec<String>,
    pub concluded: bool,
}

impl Meeting {
    pub fn new(
        id: u32,
        goal: impl Into<String>,
        room: impl Into<String>,
        creator: impl Into<String>,
    ) -> Self {
        Self {
            id,
            goal: goal.into(),
            room: room.into(),
            creator: creator.into(),
            decisions: Vec::new(),
            references: Vec::new(),
            logs: Vec::new(),
            participants: Vec::new(),
            concluded: false,
        }
    }

    /// Adds a participant the first time they speak.
    pub fn import_user(&mut self, user: &str) {
        if !self.participants.iter().any(|p| p == user) {
            self.participants.push(user.to_string());
        }
    }

    /// Adds a proposition, numbered from 1 within the meeting.
    pub fn add_decision(&mut self, author: &str, text: &str) -> &Decision {
        let id = self.decisions.len() as u32 + 1;
        self.decisions.push(Decision {
            id,
            author: author.to_string(),
            text: text.to_string(),
            plusplus: BTreeSet::new(),
        });
        &self.decisions[self.decisions.len() - 1]
    }

    pub fn decision_mut(&mut self, id: u32) -> Option<&mut Decision> {
        self.decisions.iter_mut().find(|d| d.id == id)
    }

    pub fn add_reference(&mut self, author: &str, text: &str) {
        self.references.push(Reference {
            author: author.to_string(),
            text: text.to_string(),
        });
    }

    pub fn log(&mut self, user: &str, ts: &str, text: &str) {
        self.logs.push(LogEntry {
            user: user.to_string(),
            ts: ts.to_string(),
            text: text.to_string(),
        });
    }

    pub fn conclude(&mut self) {
        self.concluded = true;
    }

    pub fn tag(&self) -> String {
        format!("M{}", self.id)
    }

    /// Plain-text summary posted when the meeting concludes.
    pub fn summary(&self) -> String {
        let mut out = format!("*{}* goal: {}", self.tag(), self.goal);
        if !self.participants.is_empty() {
            let _ = write!(out, "\nParticipants: {}", self.participants.join(", "));
        }
        for decision in &self.decisions {
            let _ = write!(
                out,
                "\nD{} ({} ++): {}",
                decision.id,
                decision.plusplus.len(),
                decision.text
            );
        }
        for reference in &self.references {
            let _ = write!(out, "\nRef: {}", reference.text);
        }
        out
    }
}
