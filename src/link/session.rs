//! Link session state machine
//!
//! This module contains the event loop that owns the wireless connection.
//! It runs on a single thread and talks to the caller through crossbeam
//! channels.
//!
//! # State Machine
//!
//! ```text
//! Disconnected --start_scan--> Scanning --name match--> Connecting
//! Connecting --connected + services discovered + subscribed--> Connected
//! Connecting --error--> Failed        Connected --subscription error--> Failed
//! Scanning --scan error--> Failed     Failed --start_scan--> Scanning
//! any --cancel / shutdown--> Disconnected
//! ```
//!
//! # Responsibilities
//!
//! - **Scanning**: accepts the first peripheral whose advertised name matches
//!   and stops the transport scan immediately; later results are ignored
//! - **Connecting**: connect, discover services, subscribe, in that order
//! - **Streaming**: every notification becomes a [`RawFrame`] event
//! - **Failure**: any transport error moves to `Failed` and is reported as
//!   status text; nothing is retried automatically

use crate::config::LinkConfig;
use crate::error::AgrolinkError;
use crate::link::{LinkCommand, LinkEvent};
use crate::types::{ConnectionState, RawFrame};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::subscription::FrameSubscription;
use super::transport_trait::{LinkStats, LinkTransport, Peripheral, PeripheralSession, ScanEvent};

/// Result of draining the scan channel once
enum ScanOutcome {
    Pending,
    Matched(Peripheral),
    Failed(String),
}

/// The link session that runs the event loop
pub struct LinkSession {
    /// Link configuration
    config: LinkConfig,
    /// Command receiver from the caller
    command_rx: Receiver<LinkCommand>,
    /// Event sender to the caller
    event_tx: Sender<LinkEvent>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Radio primitives
    transport: Box<dyn LinkTransport>,
    /// Current connection state
    state: ConnectionState,
    /// Scan results while scanning
    scan_rx: Option<Receiver<ScanEvent>>,
    /// Open connection while connected
    peripheral: Option<PeripheralSession>,
    /// Notification subscription while connected
    subscription: Option<FrameSubscription>,
    /// Sequence number for the next frame, kept across reconnects
    next_seq: u64,
    /// Statistics
    stats: LinkStats,
}

impl LinkSession {
    /// Create a new link session
    pub fn new(
        config: LinkConfig,
        transport: Box<dyn LinkTransport>,
        command_rx: Receiver<LinkCommand>,
        event_tx: Sender<LinkEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            command_rx,
            event_tx,
            running,
            transport,
            state: ConnectionState::Disconnected,
            scan_rx: None,
            peripheral: None,
            subscription: None,
            next_seq: 1,
            stats: LinkStats::default(),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Link statistics
    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Peripheral of the open connection, if any
    pub fn connected_peripheral(&self) -> Option<&Peripheral> {
        self.peripheral.as_ref().map(|s| &s.peripheral)
    }

    /// Run the event loop until shutdown
    pub fn run(&mut self) {
        tracing::info!("Link session started");
        let idle = Duration::from_millis(self.config.tick_interval_ms.max(1));

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            if self.pump() == 0 {
                std::thread::sleep(idle);
            }
        }

        self.cancel();
        self.emit(LinkEvent::Shutdown);
        tracing::info!("Link session stopped");
    }

    /// Begin scanning for the configured peripheral
    ///
    /// A no-op while already scanning, connecting or connected.
    pub fn start_scan(&mut self) {
        if !self.state.can_start_scan() {
            tracing::debug!("Ignoring scan request while {}", self.state);
            return;
        }

        self.transition(ConnectionState::Scanning);
        self.emit(LinkEvent::FeedCleared);
        self.stats.scans_started += 1;
        tracing::info!("Scanning for '{}'", self.config.device_name);

        match self.transport.scan() {
            Ok(results) => self.scan_rx = Some(results),
            Err(e) => self.fail(e),
        }
    }

    /// Tear down any scan, subscription and connection
    pub fn cancel(&mut self) {
        self.teardown();
        if self.state != ConnectionState::Disconnected {
            self.transition(ConnectionState::Disconnected);
            tracing::info!("Link torn down");
        }
    }

    /// Handle all transport events that are ready
    ///
    /// Returns the number of events handled; zero means the loop was idle.
    pub fn pump(&mut self) -> usize {
        match self.state {
            ConnectionState::Scanning => self.poll_scan(),
            ConnectionState::Connected => self.poll_notifications(),
            _ => 0,
        }
    }

    /// Process pending commands from the caller
    pub fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::StartScan => self.start_scan(),
            LinkCommand::Cancel => self.cancel(),
            LinkCommand::RequestStats => self.emit(LinkEvent::Stats(self.stats.clone())),
            LinkCommand::Shutdown => self.running.store(false, Ordering::SeqCst),
        }
    }

    fn poll_scan(&mut self) -> usize {
        let Some(results) = self.scan_rx.as_ref() else {
            return 0;
        };

        let mut handled = 0;
        let mut outcome = ScanOutcome::Pending;
        loop {
            match results.try_recv() {
                Ok(Ok(peripheral)) => {
                    handled += 1;
                    if peripheral.name_matches(&self.config.device_name) {
                        outcome = ScanOutcome::Matched(peripheral);
                        break;
                    }
                    tracing::trace!("Skipping peripheral {}", peripheral);
                }
                Ok(Err(message)) => {
                    handled += 1;
                    outcome = ScanOutcome::Failed(format!("Scan error: {}", message));
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    handled += 1;
                    outcome = ScanOutcome::Failed(format!(
                        "Scan ended before '{}' was found",
                        self.config.device_name
                    ));
                    break;
                }
            }
        }

        match outcome {
            ScanOutcome::Pending => {}
            ScanOutcome::Matched(peripheral) => {
                // Stop before connecting so no second match can race us.
                self.transport.stop_scan();
                self.scan_rx = None;
                self.connect_to(peripheral);
            }
            ScanOutcome::Failed(message) => self.fail(AgrolinkError::ConnectionFailed(message)),
        }
        handled
    }

    fn connect_to(&mut self, peripheral: Peripheral) {
        self.transition(ConnectionState::Connecting);
        self.stats.connect_attempts += 1;
        tracing::info!("Connecting to {}", peripheral);

        let session = match self.transport.connect(&peripheral) {
            Ok(session) => session,
            Err(e) => return self.fail(e),
        };

        if let Err(e) = self.transport.discover_services(&session) {
            return self.fail(e);
        }

        match self.transport.subscribe(
            &session,
            &self.config.service_uuid,
            &self.config.characteristic_uuid,
        ) {
            Ok(notifications) => {
                self.subscription = Some(FrameSubscription::new(notifications, self.next_seq));
                self.peripheral = Some(session);
                self.transition(ConnectionState::Connected);
                tracing::info!("Connected to {}", peripheral);
            }
            Err(e) => self.fail(e),
        }
    }

    fn poll_notifications(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };

        let mut frames: Vec<RawFrame> = Vec::new();
        let mut failure = None;
        while let Some(item) = subscription.try_next() {
            match item {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.next_seq = subscription.next_seq();

        let handled = frames.len() + usize::from(failure.is_some());
        for frame in frames {
            tracing::debug!("Received frame #{}: {}", frame.seq, frame.text);
            self.stats.record_frame(frame.text.len(), frame.received_at);
            self.emit(LinkEvent::Frame(frame));
        }

        if let Some(e) = failure {
            self.fail(e);
        }
        handled
    }

    /// Move to `Failed` and report the error
    fn fail(&mut self, err: AgrolinkError) {
        let message = err.to_string();
        tracing::error!("{}", message);
        self.teardown();
        self.stats.failures += 1;
        self.transition(ConnectionState::Failed);
        self.emit(LinkEvent::ConnectionError(message));
    }

    fn teardown(&mut self) {
        if self.scan_rx.take().is_some() {
            self.transport.stop_scan();
        }
        if let Some(subscription) = self.subscription.take() {
            self.next_seq = subscription.next_seq();
            subscription.cancel();
        }
        self.peripheral = None;
    }

    /// Apply a state change if the state machine allows it
    fn transition(&mut self, next: ConnectionState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::warn!("Rejected link transition {:?} -> {:?}", self.state, next);
            return false;
        }
        tracing::debug!("Link state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.emit(LinkEvent::StateChanged(next));
        true
    }

    fn emit(&self, event: LinkEvent) {
        // Receiver gone means nobody is listening; the loop stops on its own.
        let _ = self.event_tx.send(event);
    }
}
