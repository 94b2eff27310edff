//! LinkTransport trait for the wireless link
//!
//! This module provides the interface the link session drives: scan,
//! stop scan, connect, discover services and subscribe. Real radio stacks
//! and the mock transport both implement it.
//!
//! Scan results and notifications are delivered through crossbeam channels
//! rather than callbacks; the session polls them from its event loop.

use crate::error::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;

/// One scan result, or a scan error reported by the transport
pub type ScanEvent = std::result::Result<Peripheral, String>;

/// One notification payload, or a subscription error
pub type Notification = std::result::Result<Vec<u8>, String>;

/// A peripheral seen while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peripheral {
    /// Transport-specific address or identifier
    pub id: String,
    /// Advertised local name, if any
    pub name: Option<String>,
}

impl Peripheral {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }

    /// Whether the advertised name equals `name` exactly
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

impl std::fmt::Display for Peripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// An open connection to one peripheral
///
/// Owned by the link session for exactly as long as the connection is in
/// use; dropping it ends the session's claim on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralSession {
    pub peripheral: Peripheral,
    /// Transport-assigned connection handle
    pub handle: u64,
}

/// Counters for link activity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkStats {
    /// Scans started
    pub scans_started: u64,
    /// Connection attempts made
    pub connect_attempts: u64,
    /// Frames delivered
    pub frames_received: u64,
    /// Payload bytes delivered
    pub bytes_received: u64,
    /// Transitions into the failed state
    pub failures: u64,
    /// Arrival time of the latest frame
    pub last_frame_at: Option<DateTime<Utc>>,
}

impl LinkStats {
    /// Record a delivered frame
    pub fn record_frame(&mut self, bytes: usize, at: DateTime<Utc>) {
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
        self.last_frame_at = Some(at);
    }
}

/// Wireless transport primitives
///
/// The link session consumes exactly this surface. Implementations must be
/// `Send` so the session can run on its own thread.
///
/// # Example
///
/// ```ignore
/// fn first_match(transport: &mut dyn LinkTransport, name: &str) -> Result<Option<Peripheral>> {
///     let results = transport.scan()?;
///     let found = results.try_iter().filter_map(|r| r.ok()).find(|p| p.name_matches(name));
///     transport.stop_scan();
///     Ok(found)
/// }
/// ```
pub trait LinkTransport: Send {
    /// Start scanning for every advertising peripheral
    ///
    /// Results arrive on the returned channel until [`stop_scan`] is called.
    ///
    /// [`stop_scan`]: LinkTransport::stop_scan
    fn scan(&mut self) -> Result<Receiver<ScanEvent>>;

    /// Stop an active scan; a no-op when not scanning
    fn stop_scan(&mut self);

    /// Connect to a peripheral found while scanning
    fn connect(&mut self, peripheral: &Peripheral) -> Result<PeripheralSession>;

    /// Discover services and characteristics of a connected peripheral
    fn discover_services(&mut self, session: &PeripheralSession) -> Result<()>;

    /// Subscribe to notifications of one characteristic
    ///
    /// Dropping the returned receiver cancels the subscription.
    fn subscribe(
        &mut self,
        session: &PeripheralSession,
        service_id: &str,
        characteristic_id: &str,
    ) -> Result<Receiver<Notification>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matches_exactly() {
        let p = Peripheral::new("AA:BB", Some("MyESP32"));
        assert!(p.name_matches("MyESP32"));
        assert!(!p.name_matches("myesp32"));
        assert!(!Peripheral::new("CC:DD", None).name_matches("MyESP32"));
    }

    #[test]
    fn test_peripheral_display() {
        assert_eq!(
            Peripheral::new("AA:BB", Some("MyESP32")).to_string(),
            "MyESP32 (AA:BB)"
        );
        assert_eq!(Peripheral::new("AA:BB", None).to_string(), "AA:BB");
    }

    #[test]
    fn test_stats_record_frame() {
        let mut stats = LinkStats::default();
        let now = Utc::now();
        stats.record_frame(7, now);
        stats.record_frame(3, now);
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.bytes_received, 10);
        assert_eq!(stats.last_frame_at, Some(now));
    }
}
