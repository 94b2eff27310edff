//! Wireless link to the sensor peripheral
//!
//! This module owns the connection to the single peripheral: discovery,
//! connection, notification subscription and teardown. The session runs its
//! own event loop and communicates with the caller through crossbeam
//! channels.
//!
//! # Architecture
//!
//! - [`LinkCommand`] - Messages sent from the caller to the session (scan, cancel, ...)
//! - [`LinkEvent`] - Messages sent from the session to the caller (state, frames, errors)
//! - [`LinkHandle`] - Caller-side handle for sending commands and receiving events
//! - [`LinkService`] - Entry point that pairs a session with its handle
//!
//! # Components
//!
//! - [`LinkTransport`] - Radio primitives the session drives
//! - [`LinkSession`] - Connection state machine and event loop
//! - [`FrameSubscription`] - Notification channel as a sequence of [`RawFrame`]s
//! - [`MockTransport`] - Scripted transport (feature-gated)
//!
//! # Example
//!
//! ```ignore
//! use agrolink_rs::config::LinkConfig;
//! use agrolink_rs::link::{LinkEvent, LinkService, MockTransport};
//!
//! let config = LinkConfig::default();
//! let transport = MockTransport::demo(&config.device_name);
//! let (service, handle) = LinkService::new(config, Box::new(transport));
//!
//! std::thread::spawn(move || service.run());
//! handle.start_scan();
//!
//! for event in handle.drain() {
//!     if let LinkEvent::Frame(frame) = event {
//!         println!("{}", frame.text);
//!     }
//! }
//! ```

#[cfg(feature = "mock-link")]
pub mod mock_transport;
pub mod session;
pub mod subscription;
pub mod transport_trait;

#[cfg(feature = "mock-link")]
pub use mock_transport::{MockCallCounts, MockController, MockTransport};
pub use session::LinkSession;
pub use subscription::FrameSubscription;
pub use transport_trait::{
    LinkStats, LinkTransport, Notification, Peripheral, PeripheralSession, ScanEvent,
};

use crate::config::LinkConfig;
use crate::types::{ConnectionState, RawFrame};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// Message sent from the caller to the link session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCommand {
    /// Start scanning (no-op while scanning, connecting or connected)
    StartScan,
    /// Tear down scan, subscription and connection
    Cancel,
    /// Request current statistics
    RequestStats,
    /// Stop the event loop
    Shutdown,
}

/// Message sent from the link session to the caller
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Connection state changed
    StateChanged(ConnectionState),
    /// A scan started; previously received frames should be cleared
    FeedCleared,
    /// A frame arrived
    Frame(RawFrame),
    /// Scan, connect or subscription failed
    ConnectionError(String),
    /// Statistics update (response to RequestStats)
    Stats(LinkStats),
    /// The session is shutting down
    Shutdown,
}

/// Caller-side handle of a running link session
pub struct LinkHandle {
    /// Receiver for session events
    pub receiver: Receiver<LinkEvent>,
    /// Sender for commands to the session
    pub command_sender: Sender<LinkCommand>,
}

impl LinkHandle {
    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<LinkEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    ///
    /// Returns `None` on timeout or once the session has gone away.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LinkEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Receive all pending events
    pub fn drain(&self) -> Vec<LinkEvent> {
        self.receiver.try_iter().collect()
    }

    /// Send a command to the session
    pub fn send_command(&self, cmd: LinkCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    /// Request a scan
    pub fn start_scan(&self) {
        let _ = self.command_sender.send(LinkCommand::StartScan);
    }

    /// Request teardown
    pub fn cancel(&self) {
        let _ = self.command_sender.send(LinkCommand::Cancel);
    }

    /// Request statistics
    pub fn request_stats(&self) {
        let _ = self.command_sender.send(LinkCommand::RequestStats);
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(LinkCommand::Shutdown);
    }
}

/// A link session paired with its channels, ready to run
pub struct LinkService {
    session: LinkSession,
    running: Arc<AtomicBool>,
}

impl LinkService {
    /// Create a new link service with communication channels
    pub fn new(config: LinkConfig, transport: Box<dyn LinkTransport>) -> (Self, LinkHandle) {
        let (cmd_tx, cmd_rx) = bounded(64);
        // Frames are never dropped here; back-pressure belongs to the transport.
        let (event_tx, event_rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let session = LinkSession::new(config, transport, cmd_rx, event_tx, Arc::clone(&running));
        let handle = LinkHandle {
            receiver: event_rx,
            command_sender: cmd_tx,
        };

        (Self { session, running }, handle)
    }

    /// Run the session loop on the current thread
    pub fn run(mut self) {
        self.session.run();
    }

    /// Get a handle to stop the loop
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[cfg(feature = "mock-link")]
    #[test]
    fn test_service_creation() {
        let (service, handle) =
            LinkService::new(LinkConfig::default(), Box::new(MockTransport::new()));

        assert!(service.stop_handle().load(Ordering::SeqCst));
        assert!(handle.send_command(LinkCommand::Shutdown));
    }

    #[cfg(feature = "mock-link")]
    #[test]
    fn test_service_runs_until_shutdown() {
        let (service, handle) =
            LinkService::new(LinkConfig::default(), Box::new(MockTransport::new()));
        let worker = std::thread::spawn(move || service.run());

        handle.shutdown();
        worker.join().unwrap();

        let events = handle.drain();
        assert!(matches!(events.last(), Some(LinkEvent::Shutdown)));
    }

    #[test]
    fn test_handle_reports_closed_session() {
        let (event_tx, event_rx) = unbounded::<LinkEvent>();
        let (cmd_tx, cmd_rx) = bounded(1);
        let handle = LinkHandle {
            receiver: event_rx,
            command_sender: cmd_tx,
        };

        drop(event_tx);
        drop(cmd_rx);
        assert!(handle.recv_timeout(Duration::from_millis(1)).is_none());
        assert!(!handle.send_command(LinkCommand::StartScan));
    }
}
