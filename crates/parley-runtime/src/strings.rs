//! Named lists of canned responses.
//!
//! Plugins register lists under a category ("greetings", "acks", ...) and
//! pick a random entry when replying, so the bot does not repeat itself.

use std::collections::HashMap;

use parking_lot::RwLock;
use rand::seq::IndexedRandom;
use tracing::debug;

/// Category → strings, shared through the plugin context.
#[derive(Debug, Default)]
pub struct StringRegistry {
    lists: RwLock<HashMap<String, Vec<String>>>,
}

impl StringRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `list` under `category`, replacing any previous list.
    pub fn register<I, S>(&self, category: impl Into<String>, list: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let category = category.into();
        let list: Vec<String> = list.into_iter().map(Into::into).collect();
        debug!(category = %category, entries = list.len(), "Registered string list");
        self.lists.write().insert(category, list);
    }

    /// A random entry of `category`; `None` for unknown or empty categories.
    pub fn random(&self, category: &str) -> Option<String> {
        self.lists
            .read()
            .get(category)
            .and_then(|list| list.choose(&mut rand::rng()).cloned())
    }

    /// Like [`random`](Self::random), falling back to `default`.
    pub fn random_or(&self, category: &str, default: &str) -> String {
        self.random(category).unwrap_or_else(|| default.to_string())
    }

    /// Registered category names, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lists.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_picks_from_category() {
        let strings = StringRegistry::new();
        strings.register("acks", ["ok", "done", "on it"]);

        for _ in 0..20 {
            let pick = strings.random("acks").unwrap();
            assert!(["ok", "done", "on it"].contains(&pick.as_str()));
        }
    }

    #[test]
    fn test_unknown_or_empty_category() {
        let strings = StringRegistry::new();
        strings.register("empty", Vec::<String>::new());

        assert_eq!(strings.random("missing"), None);
        assert_eq!(strings.random("empty"), None);
        assert_eq!(strings.random_or("missing", "hmm"), "hmm");
    }

    #[test]
    fn test_register_replaces_list() {
        let strings = StringRegistry::new();
        strings.register("greetings", ["hi"]);
        strings.register("greetings", ["hello"]);
        strings.register("acks", ["ok"]);

        assert_eq!(strings.random("greetings").as_deref(), Some("hello"));
        assert_eq!(strings.categories(), ["acks", "greetings"]);
    }
}
