// Core ID types for the hub protocol.
//
// `ClientId` is the hub-assigned identity of one connected session. It is
// generated by the gateway (see `tempo_hub::ids`) from a nanosecond
// timestamp and travels as a plain JSON string, so it is a transparent
// newtype rather than a compact integer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hub-assigned session ID, unique among all sessions of one hub process.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
