use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionFlag {
    /// Every required slot holds a real value.
    SlotsComplete,
    /// The user asked to see the best match.
    ReadyToShow,
}

impl SessionFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SlotsComplete => "slots_complete",
            Self::ReadyToShow => "ready_to_show",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFlags {
    pub slots_complete: bool,
    pub ready_to_show: bool,
}

impl SessionFlags {
    pub fn get(&self, flag: SessionFlag) -> bool {
        match flag {
            SessionFlag::SlotsComplete => self.slots_complete,
            SessionFlag::ReadyToShow => self.ready_to_show,
        }
    }

    pub fn set(&mut self, flag: SessionFlag, value: bool) {
        match flag {
            SessionFlag::SlotsComplete => self.slots_complete = value,
            SessionFlag::ReadyToShow => self.ready_to_show = value,
        }
    }
}
