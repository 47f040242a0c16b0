//! Wire protocol between the gateway and its observer instances.
//!
//! Observers (companion browser tabs) send small JSON objects tagged by an
//! `action` field; the gateway answers with targeted or broadcast messages
//! using the same convention. Inbound messages are only ever parsed and
//! outbound messages only ever emitted, so the types derive exactly one
//! serde direction each.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapping::SanitizedMapping;

/// Reserved location name reported while the observer cannot tell where the
/// player is. It never maps to a track, so lookups are skipped for it.
pub const UNKNOWN_LOCATION: &str = "UNKNOWN";

/// Identifier of one attached observer instance.
///
/// Minted by the transport (one per connection) or reported by the host
/// enumeration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObserverId(u64);

impl ObserverId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A reported in-game location.
///
/// The reserved `UNKNOWN` name is carried as its own variant so the rest of
/// the code matches on it instead of comparing magic strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Location {
    /// The observer cannot determine the current place.
    Unknown,
    /// A concrete place name, used as the primary resolution key.
    Named(String),
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        if value == UNKNOWN_LOCATION {
            Location::Unknown
        } else {
            Location::Named(value)
        }
    }
}

impl From<Location> for String {
    fn from(value: Location) -> Self {
        match value {
            Location::Unknown => UNKNOWN_LOCATION.to_string(),
            Location::Named(name) => name,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Unknown => f.write_str(UNKNOWN_LOCATION),
            Location::Named(name) => f.write_str(name),
        }
    }
}

/// Messages observers send to the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Handshake: the observer wants to be attached and brought up to date.
    Hello,
    /// Flip the shared mute state.
    ToggleMute,
    /// The coarse-grained region changed. Acknowledged once stored.
    Setting { setting: String },
    /// The fine-grained place changed; may trigger resolution and playback.
    Location { location: Location },
}

/// Messages the gateway sends to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Current mute state, sent on handshake and after every change.
    #[serde(rename_all = "camelCase")]
    MuteStatus { is_muted: bool },
    /// The sanitized mapping table, delivered once the load completes.
    SetMapping { mapping: SanitizedMapping },
    /// The track the session resolved to; `None` when playback stopped.
    Track { track: Option<String> },
}
