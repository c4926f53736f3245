//! The bot's mood, which flavors some responses.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Happy,
    Hyper,
}

impl Mood {
    /// Picks the response matching this mood.
    pub fn pick<'a>(self, happy: &'a str, hyper: &'a str) -> &'a str {
        match self {
            Self::Happy => happy,
            Self::Hyper => hyper,
        }
    }
}

/// The current mood, shared through the plugin context.
#[derive(Debug, Default)]
pub struct MoodState {
    current: RwLock<Mood>,
}

impl MoodState {
    pub fn new(mood: Mood) -> Self {
        Self {
            current: RwLock::new(mood),
        }
    }

    pub fn get(&self) -> Mood {
        *self.current.read()
    }

    pub fn set(&self, mood: Mood) {
        *self.current.write() = mood;
    }

    /// Returns `happy` or `hyper` depending on the current mood.
    pub fn with_mood<'a>(&self, happy: &'a str, hyper: &'a str) -> &'a str {
        self.get().pick(happy, hyper)
    }
}
