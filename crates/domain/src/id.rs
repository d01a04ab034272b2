//! Identifiers — string item names and uuid request correlation ids.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reserved identifier that always resolves to the controller itself.
pub const CONTROLLER_ID: &str = "controller";

/// Unique identifier of a registered item (device, channel, group, rule,
/// timer, or the controller).
///
/// Identifiers come from configuration and are immutable once assigned.
/// An *unregistered* item is represented by the absence of an `ItemId`
/// (see `ItemRef` in the app crate), never by an empty string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap an identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The reserved controller identifier.
    #[must_use]
    pub fn controller() -> Self {
        Self(CONTROLLER_ID.to_string())
    }

    /// Whether this is the reserved controller identifier.
    #[must_use]
    pub fn is_controller(&self) -> bool {
        self.0 == CONTROLLER_ID
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Unique identifier for a [`Request`](../request) flowing through the
/// pipeline. Used only for trace correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(uuid::Uuid);

impl Default for RequestId {
    fn default() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl RequestId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the inner UUID.
    #[must_use]
    pub fn as_uuid(self) -> uuid::Uuid {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s).map(Self)
    }
}
