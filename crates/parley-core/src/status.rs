//! Health status of the bot's components.

use std::fmt;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::Serialize;

use crate::foundation::error::StatusError;

/// Health of a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Health {
    /// Working.
    Ok,
    /// Not working (yet).
    NotOk,
    /// Not used by this deployment.
    NotApplicable,
}

impl FromStr for Health {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ok" => Ok(Self::Ok),
            "not ok" => Ok(Self::NotOk),
            "n/a" => Ok(Self::NotApplicable),
            _ => Err(StatusError::InvalidValue(s.to_string())),
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "Ok",
            Self::NotOk => "Not ok",
            Self::NotApplicable => "N/A",
        })
    }
}

/// A component whose health is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Component {
    /// Storage backend.
    Db,
    /// Chat connection.
    Chat,
    /// HTTP server.
    Http,
}

impl FromStr for Component {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "db" => Ok(Self::Db),
            "chat" => Ok(Self::Chat),
            "http" => Ok(Self::Http),
            _ => Err(StatusError::InvalidComponent(s.to_string())),
        }
    }
}

/// A point-in-time copy of every component's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Storage backend.
    pub db: Health,
    /// Chat connection.
    pub chat: Health,
    /// HTTP server.
    pub http: Health,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            db: Health::NotOk,
            chat: Health::NotOk,
            http: Health::NotApplicable,
        }
    }
}

/// Shared, updatable component status.
#[derive(Debug, Default)]
pub struct Status {
    inner: RwLock<StatusSnapshot>,
}

impl Status {
    /// Creates a status with the defaults: db and chat not ok, http n/a.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates `component` (`db`, `chat` or `http`) to `value`
    /// (`ok`, `not ok` or `n/a`), both case-insensitive.
    pub fn update(&self, component: &str, value: &str) -> Result<(), StatusError> {
        let component = component.parse::<Component>()?;
        let health = value.parse::<Health>()?;
        self.set(component, health);
        Ok(())
    }

    /// Sets the health of `component`.
    pub fn set(&self, component: Component, health: Health) {
        let mut inner = self.inner.write();
        match component {
            Component::Db => inner.db = health,
            Component::Chat => inner.chat = health,
            Component::Http => inner.http = health,
        }
    }

    /// Returns the current status.
    pub fn snapshot(&self) -> StatusSnapshot {
        *self.inner.read()
    }
}
