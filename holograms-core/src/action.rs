//! Side-effect actions attached to conditions and clicks.
//!
//! The engine only decides *when* a list of actions runs. What a `MESSAGE` or
//! `COMMAND` action does is up to the host's [`ActionExecutor`].

use holograms_io::ViewerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One action, e.g. `MESSAGE:Welcome!`. The kind is opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

impl Action {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    /// `KIND:value`; a bare `KIND` has an empty value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.split_once(':') {
            Some((kind, value)) => Self::new(kind.trim().to_ascii_uppercase(), value.trim()),
            None => Self::new(s.to_ascii_uppercase(), ""),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}:{}", self.kind, self.value)
        }
    }
}

/// Ordered list of actions, executed front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionList(Vec<Action>);

impl ActionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.0.push(action);
    }

    pub fn with(mut self, action: Action) -> Self {
        self.0.push(action);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<Vec<Action>> for ActionList {
    fn from(actions: Vec<Action>) -> Self {
        Self(actions)
    }
}

impl FromIterator<Action> for ActionList {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Runs action lists on behalf of a viewer. Implementations must not block the tick.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, viewer: ViewerId, actions: &ActionList);
}

/// Default executor: logs what would run.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingActionExecutor;

impl ActionExecutor for TracingActionExecutor {
    fn execute(&self, viewer: ViewerId, actions: &ActionList) {
        for action in actions.iter() {
            tracing::info!(%viewer, %action, "action");
        }
    }
}
