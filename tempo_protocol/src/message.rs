// Protocol messages for client-hub communication.
//
// A single `RelayMessage` enum covers both directions. Each variant carries
// only the fields that matter for its `type`, and serde's internal tagging
// maps it onto the flat JSON object browsers exchange:
//
//   {"type":"command","command":"play","time":1700000000100000000,"clientId":"..."}
//
// Field names are camelCase on the wire. `main_status` encodes "no main" as
// an empty `mainId` string; on the Rust side that is `None`.
//
// Inbound records are decoded leniently: unknown fields are ignored, missing
// or null fields take their defaults, since clients tend to send the full
// flat object with zero values. A `type` the hub does not know decodes as
// `Unknown` so the session can skip it. A record without `type` is still a
// decode error.

use serde::{Deserialize, Serialize};

use crate::types::ClientId;

/// Messages exchanged between clients and the hub.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RelayMessage {
    /// Sent by the hub to a new session: its assigned ID.
    Init { client_id: ClientId },
    /// Current holder of the main role (`None` when vacant).
    MainStatus {
        #[serde(default, with = "empty_as_none")]
        main_id: Option<ClientId>,
    },
    /// Sent by a client to claim the main role.
    BecomeMain {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<ClientId>,
    },
    /// Opaque command from the main session, relayed with a scheduled time.
    Command {
        #[serde(default, deserialize_with = "null_as_empty")]
        command: String,
        /// Scheduled execution time, nanoseconds since the Unix epoch.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<ClientId>,
    },
    /// Any other `type`. Never sent by the hub.
    #[serde(other)]
    Unknown,
}

impl RelayMessage {
    pub fn init(client_id: ClientId) -> Self {
        Self::Init { client_id }
    }

    pub fn main_status(main_id: Option<ClientId>) -> Self {
        Self::MainStatus { main_id }
    }

    /// An unstamped, unscheduled command, as a client would send it.
    pub fn command(command: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            time: None,
            client_id: None,
        }
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::MainStatus { .. } => "main_status",
            Self::BecomeMain { .. } => "become_main",
            Self::Command { .. } => "command",
            Self::Unknown => "unknown",
        }
    }

    /// Overwrite the originating client on messages that carry one. Whatever
    /// the client put in `clientId` is discarded.
    pub fn stamp(&mut self, id: &ClientId) {
        match self {
            Self::BecomeMain { client_id } | Self::Command { client_id, .. } => {
                *client_id = Some(id.clone());
            }
            Self::Init { .. } | Self::MainStatus { .. } | Self::Unknown => {}
        }
    }

    /// Attach a scheduled execution time. No-op for non-command messages.
    pub fn schedule(&mut self, at_nanos: i64) {
        if let Self::Command { time, .. } = self {
            *time = Some(at_nanos);
        }
    }
}

/// Browsers may send `"command": null`; treat it like an absent command.
fn null_as_empty<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `mainId` is always present on the wire; the empty string means vacant.
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::ClientId;

    pub fn serialize<S: Serializer>(
        value: &Option<ClientId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_ref().map_or("", ClientId::as_str))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ClientId>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|s| !s.is_empty()).map(ClientId))
    }
}
