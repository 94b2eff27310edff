//! Mock Transport Implementation for Testing
//!
//! This module provides a scripted [`LinkTransport`] that can be used to run
//! the link session without a radio. Advertisements and frames are queued up
//! front or pushed later through a [`MockController`].
//!
//! # Features
//!
//! - **Scripted scan results**: every `scan` call replays the configured
//!   advertisements
//! - **Scripted frames**: every `subscribe` call replays the configured frames
//! - **Failure injection**: scan, connect, discovery and subscribe errors
//! - **Call counting**: tests can assert how the session drove the transport
//!
//! # Example
//!
//! ```ignore
//! use agrolink_rs::link::mock_transport::MockTransport;
//!
//! let transport = MockTransport::new()
//!     .with_peripheral("AA:02", Some("MyESP32"))
//!     .with_frames(["12.0N 4.0P 6.0K NPK"]);
//! let controller = transport.controller();
//!
//! // ... hand `transport` to a LinkService, then later:
//! controller.push_frame("8.10 ph");
//! ```
//!
//! # Enabling
//!
//! The mock transport is only available when the `mock-link` feature is
//! enabled (it is part of the default feature set).

use crate::error::{AgrolinkError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::transport_trait::{LinkTransport, Notification, Peripheral, PeripheralSession, ScanEvent};

/// How many times each transport primitive was invoked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCallCounts {
    pub scan: u32,
    pub stop_scan: u32,
    pub connect: u32,
    pub discover_services: u32,
    pub subscribe: u32,
}

#[derive(Debug, Default)]
struct MockLinkState {
    advertisements: Vec<ScanEvent>,
    frames: Vec<Notification>,
    scan_failure: Option<String>,
    connect_failure: Option<String>,
    discovery_failure: Option<String>,
    subscribe_failure: Option<String>,
    scan_tx: Option<Sender<ScanEvent>>,
    notify_tx: Option<Sender<Notification>>,
    connected: Option<Peripheral>,
    next_handle: u64,
    calls: MockCallCounts,
}

fn lock(state: &Mutex<MockLinkState>) -> MutexGuard<'_, MockLinkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted link transport
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockLinkState>>,
}

impl MockTransport {
    /// Create a transport that finds nothing and sends nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport for demos: a few neighbours, the sensor, and one frame of
    /// each reading shape
    pub fn demo(device_name: &str) -> Self {
        Self::new()
            .with_peripheral("3C:71:BF:00:00:01", Some("Living Room TV"))
            .with_peripheral("3C:71:BF:00:00:02", None)
            .with_peripheral("24:0A:C4:12:34:56", Some(device_name))
            .with_frames([
                "12.0N 4.0P 6.0K NPK",
                "189H 21.8T Hum&Temp",
                "8.10 ph",
                "sensor warming up",
            ])
    }

    /// Queue an advertisement replayed on every scan
    pub fn with_peripheral(self, id: &str, name: Option<&str>) -> Self {
        lock(&self.state)
            .advertisements
            .push(Ok(Peripheral::new(id, name)));
        self
    }

    /// Queue frames replayed on every subscribe
    pub fn with_frames<I, S>(self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        {
            let mut state = lock(&self.state);
            for frame in frames {
                state.frames.push(Ok(frame.as_ref().as_bytes().to_vec()));
            }
        }
        self
    }

    /// Make `scan` fail
    pub fn fail_scan(self, message: &str) -> Self {
        lock(&self.state).scan_failure = Some(message.to_string());
        self
    }

    /// Make `connect` fail
    pub fn fail_connect(self, message: &str) -> Self {
        lock(&self.state).connect_failure = Some(message.to_string());
        self
    }

    /// Make `discover_services` fail
    pub fn fail_discovery(self, message: &str) -> Self {
        lock(&self.state).discovery_failure = Some(message.to_string());
        self
    }

    /// Make `subscribe` fail
    pub fn fail_subscribe(self, message: &str) -> Self {
        lock(&self.state).subscribe_failure = Some(message.to_string());
        self
    }

    /// Handle for driving the transport after it has been boxed
    pub fn controller(&self) -> MockController {
        MockController {
            state: Arc::clone(&self.state),
        }
    }
}

impl LinkTransport for MockTransport {
    fn scan(&mut self) -> Result<Receiver<ScanEvent>> {
        let mut state = lock(&self.state);
        state.calls.scan += 1;
        if let Some(message) = state.scan_failure.clone() {
            return Err(AgrolinkError::ConnectionFailed(message));
        }

        let (tx, rx) = unbounded();
        for advertisement in &state.advertisements {
            let _ = tx.send(advertisement.clone());
        }
        state.scan_tx = Some(tx);
        Ok(rx)
    }

    fn stop_scan(&mut self) {
        let mut state = lock(&self.state);
        state.calls.stop_scan += 1;
        state.scan_tx = None;
    }

    fn connect(&mut self, peripheral: &Peripheral) -> Result<PeripheralSession> {
        let mut state = lock(&self.state);
        state.calls.connect += 1;
        if let Some(message) = state.connect_failure.clone() {
            return Err(AgrolinkError::ConnectionFailed(message));
        }

        state.next_handle += 1;
        state.connected = Some(peripheral.clone());
        Ok(PeripheralSession {
            peripheral: peripheral.clone(),
            handle: state.next_handle,
        })
    }

    fn discover_services(&mut self, _session: &PeripheralSession) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.discover_services += 1;
        match state.discovery_failure.clone() {
            Some(message) => Err(AgrolinkError::ConnectionFailed(message)),
            None => Ok(()),
        }
    }

    fn subscribe(
        &mut self,
        _session: &PeripheralSession,
        _service_id: &str,
        _characteristic_id: &str,
    ) -> Result<Receiver<Notification>> {
        let mut state = lock(&self.state);
        state.calls.subscribe += 1;
        if let Some(message) = state.subscribe_failure.clone() {
            return Err(AgrolinkError::ConnectionFailed(message));
        }

        let (tx, rx) = unbounded();
        for frame in &state.frames {
            let _ = tx.send(frame.clone());
        }
        state.notify_tx = Some(tx);
        Ok(rx)
    }
}

/// Drives a [`MockTransport`] from outside the session
#[derive(Debug, Clone)]
pub struct MockController {
    state: Arc<Mutex<MockLinkState>>,
}

impl MockController {
    /// Deliver an advertisement to an active scan
    ///
    /// Returns `false` when no scan is listening.
    pub fn advertise(&self, peripheral: Peripheral) -> bool {
        lock(&self.state)
            .scan_tx
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(peripheral)).is_ok())
    }

    /// Deliver a text frame to the active subscription
    ///
    /// Returns `false` when no subscription is listening.
    pub fn push_frame(&self, text: &str) -> bool {
        self.push_bytes(text.as_bytes())
    }

    /// Deliver a raw payload to the active subscription
    pub fn push_bytes(&self, payload: &[u8]) -> bool {
        self.notify(Ok(payload.to_vec()))
    }

    /// Deliver a subscription error
    pub fn push_error(&self, message: &str) -> bool {
        self.notify(Err(message.to_string()))
    }

    /// Close the notification channel from the transport side
    pub fn end_stream(&self) {
        lock(&self.state).notify_tx = None;
    }

    /// Change the connect failure for subsequent attempts
    pub fn set_connect_failure(&self, message: Option<&str>) {
        lock(&self.state).connect_failure = message.map(str::to_string);
    }

    /// Calls made so far
    pub fn calls(&self) -> MockCallCounts {
        lock(&self.state).calls
    }

    /// Peripheral of the most recent successful connect
    pub fn connected_peripheral(&self) -> Option<Peripheral> {
        lock(&self.state).connected.clone()
    }

    fn notify(&self, notification: Notification) -> bool {
        lock(&self.state)
            .notify_tx
            .as_ref()
            .is_some_and(|tx| tx.send(notification).is_ok())
    }
}
