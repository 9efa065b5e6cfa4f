//! Registry mutation events (protobuf wire contract).
//!
//! Field numbers and enum values are part of the wire format and must not change:
//! `repository=1, digest=2, mediatype=3, payload=4, action=5`.

use bytes::Bytes;
use prost::Message;

use crate::error::{OcigateError, Result};

/// Kind of registry mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Action {
    Unspecified = 0,
    Put = 1,
    Delete = 2,
    Start = 3,
    Stop = 4,
}

impl Action {
    /// Protobuf enum value name.
    pub fn as_str_name(self) -> &'static str {
        match self {
            Action::Unspecified => "ACTION_UNSPECIFIED",
            Action::Put => "ACTION_PUT",
            Action::Delete => "ACTION_DELETE",
            Action::Start => "ACTION_START",
            Action::Stop => "ACTION_STOP",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "ACTION_UNSPECIFIED" => Some(Action::Unspecified),
            "ACTION_PUT" => Some(Action::Put),
            "ACTION_DELETE" => Some(Action::Delete),
            "ACTION_START" => Some(Action::Start),
            "ACTION_STOP" => Some(Action::Stop),
            _ => None,
        }
    }
}

/// Event payload describing one registry mutation.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EventPayload {
    /// Required for all actions.
    #[prost(string, tag = "1")]
    pub repository: String,
    #[prost(string, tag = "2")]
    pub digest: String,
    #[prost(string, tag = "3")]
    pub mediatype: String,
    #[prost(bytes = "bytes", tag = "4")]
    pub payload: Bytes,
    #[prost(enumeration = "Action", tag = "5")]
    pub action: i32,
}

impl EventPayload {
    pub fn new(
        action: Action,
        repository: impl Into<String>,
        digest: impl Into<String>,
        mediatype: impl Into<String>,
        payload: Bytes,
    ) -> Self {
        Self {
            repository: repository.into(),
            digest: digest.into(),
            mediatype: mediatype.into(),
            payload,
            action: action as i32,
        }
    }

    /// Decode and validate an event from its wire form.
    pub fn decode_event(buf: &[u8]) -> Result<Self> {
        let ev = EventPayload::decode(buf).map_err(|e| OcigateError::InvalidEvent(e.to_string()))?;
        if Action::try_from(ev.action).is_err() {
            return Err(OcigateError::InvalidEvent(format!(
                "unknown action {}",
                ev.action
            )));
        }
        if ev.repository.is_empty() {
            return Err(OcigateError::InvalidEvent("repository is required".into()));
        }
        Ok(ev)
    }

    pub fn encode_event(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }
}
