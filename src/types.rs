//! Core data types for agrolink
//!
//! # Main Types
//!
//! - [`ConnectionState`] - Link state machine states and their legal edges
//! - [`RawFrame`] - One text payload received from the peripheral
//! - [`SavedMessage`] - A frame committed to the saved log
//!
//! # Message Identity
//!
//! A [`SavedMessage`] id is derived from the arrival time (unix millis) and
//! the frame text. Two byte-identical frames that arrive within the same
//! millisecond therefore share an id, and toggling the second one unsaves
//! the first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of the wireless link
///
/// Exactly one value at any instant, owned by the link session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No scan or connection in progress
    #[default]
    Disconnected,
    /// Scanning for the configured peripheral
    Scanning,
    /// Connecting to a matched peripheral and discovering services
    Connecting,
    /// Subscribed and receiving notifications
    Connected,
    /// Scan, connect or subscription error; needs a manual rescan
    Failed,
}

impl ConnectionState {
    /// Whether the state machine permits moving from `self` to `next`
    ///
    /// Teardown to [`ConnectionState::Disconnected`] is allowed from every
    /// state.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Scanning)
                | (Failed, Scanning)
                | (Scanning, Connecting)
                | (Scanning, Failed)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Failed)
                | (_, Disconnected)
        )
    }

    /// Scanning or connecting; a new scan request is a no-op in these states
    pub fn is_pending(self) -> bool {
        matches!(self, ConnectionState::Scanning | ConnectionState::Connecting)
    }

    /// Whether a scan may be started from this state
    pub fn can_start_scan(self) -> bool {
        self.can_transition_to(ConnectionState::Scanning)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Scanning => write!(f, "Scanning..."),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Connection Failed"),
        }
    }
}

/// A single text frame pushed by the peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Monotonic arrival order within a link session
    pub seq: u64,
    /// Decoded frame text
    pub text: String,
    /// Arrival time
    pub received_at: DateTime<Utc>,
}

impl RawFrame {
    /// Create a frame stamped with the current time
    pub fn new(seq: u64, text: impl Into<String>) -> Self {
        Self::with_timestamp(seq, text, Utc::now())
    }

    /// Create a frame with an explicit arrival time
    pub fn with_timestamp(seq: u64, text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            seq,
            text: text.into(),
            received_at,
        }
    }

    /// Decode a notification payload into frame text
    ///
    /// Bytes are read as ASCII; anything outside the ASCII range becomes
    /// U+FFFD. Trailing NUL, CR and LF bytes are dropped.
    pub fn decode_payload(payload: &[u8]) -> String {
        let end = payload
            .iter()
            .rposition(|b| !matches!(b, 0 | b'\r' | b'\n'))
            .map_or(0, |i| i + 1);
        payload[..end]
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
            .collect()
    }

    /// Saved-log identifier for this frame
    pub fn message_id(&self) -> String {
        SavedMessage::derive_id(&self.received_at, &self.text)
    }
}

/// A frame the user chose to keep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMessage {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl SavedMessage {
    /// Create a message, deriving its id from `timestamp` and `text`
    pub fn new(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let text = text.into();
        Self {
            id: Self::derive_id(&timestamp, &text),
            text,
            timestamp,
        }
    }

    /// `"<unix millis>-<text>"`
    pub fn derive_id(timestamp: &DateTime<Utc>, text: &str) -> String {
        format!("{}-{}", timestamp.timestamp_millis(), text)
    }

    /// Rebuild a message from an id made by [`SavedMessage::derive_id`]
    ///
    /// Returns `None` when the id has no millisecond prefix.
    pub fn from_id(id: &str) -> Option<Self> {
        let (millis, text) = id.split_once('-')?;
        let timestamp = DateTime::from_timestamp_millis(millis.parse().ok()?)?;
        Some(Self {
            id: id.to_string(),
            text: text.to_string(),
            timestamp,
        })
    }
}

impl From<&RawFrame> for SavedMessage {
    fn from(frame: &RawFrame) -> Self {
        SavedMessage::new(frame.text.clone(), frame.received_at)
    }
}
