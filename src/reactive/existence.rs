//! Tri-state freshness marker for values that arrive asynchronously.

use serde::{Deserialize, Serialize};

/// Whether an asynchronously produced value has arrived.
///
/// `Unknown` is the loading state, `Absent` a confirmed negative result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Existence {
    #[default]
    Unknown,
    Absent,
    Present,
}

impl Existence {
    /// True once the source has answered, positively or negatively.
    pub fn is_resolved(self) -> bool {
        !matches!(self, Existence::Unknown)
    }

    pub fn is_present(self) -> bool {
        matches!(self, Existence::Present)
    }
}

/// A value paired with its [`Existence`].
///
/// The payload is only reachable through [`Tracked::present`] so callers
/// cannot interpret a value that has not arrived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tracked<T> {
    existence: Existence,
    value: Option<T>,
}

impl<T> Tracked<T> {
    pub fn unknown() -> Self {
        Self {
            existence: Existence::Unknown,
            value: None,
        }
    }

    pub fn absent() -> Self {
        Self {
            existence: Existence::Absent,
            value: None,
        }
    }

    pub fn present(value: T) -> Self {
        Self {
            existence: Existence::Present,
            value: Some(value),
        }
    }

    pub fn existence(&self) -> Existence {
        self.existence
    }

    /// The payload, if and only if the existence is `Present`.
    pub fn get(&self) -> Option<&T> {
        match self.existence {
            Existence::Present => self.value.as_ref(),
            _ => None,
        }
    }

    pub fn into_present(self) -> Option<T> {
        match self.existence {
            Existence::Present => self.value,
            _ => None,
        }
    }
}

impl<T: Clone> Tracked<T> {
    pub fn cloned(&self) -> Option<T> {
        self.get().cloned()
    }
}
