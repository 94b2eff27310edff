//! Mock construction helpers

use agrolink_rs::config::LinkConfig;
use agrolink_rs::link::{LinkEvent, LinkHandle, LinkService, LinkTransport};
use agrolink_rs::types::ConnectionState;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[cfg(feature = "mock-link")]
use agrolink_rs::link::MockTransport;

/// Link config with a short idle tick
pub fn test_link_config() -> LinkConfig {
    LinkConfig {
        tick_interval_ms: 1,
        ..LinkConfig::default()
    }
}

/// Spawn a link service on its own thread
pub fn spawn_link(transport: Box<dyn LinkTransport>) -> (LinkHandle, JoinHandle<()>) {
    let (service, handle) = LinkService::new(test_link_config(), transport);
    let worker = std::thread::spawn(move || service.run());
    (handle, worker)
}

/// Collect events until `done` returns true for one of them or `timeout`
/// passes; the matching event is included
pub fn collect_until<F>(handle: &LinkHandle, timeout: Duration, mut done: F) -> Vec<LinkEvent>
where
    F: FnMut(&LinkEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        let Some(event) = handle.recv_timeout(remaining) else {
            break;
        };
        let finished = done(&event);
        events.push(event);
        if finished {
            break;
        }
    }
    events
}

/// Collect events until the session reports `state`
pub fn wait_for_state(handle: &LinkHandle, state: ConnectionState) -> Vec<LinkEvent> {
    collect_until(handle, super::test_timeout(), |event| {
        matches!(event, LinkEvent::StateChanged(s) if *s == state)
    })
}

/// States reported in `events`, in order
pub fn states(events: &[LinkEvent]) -> Vec<ConnectionState> {
    events
        .iter()
        .filter_map(|event| match event {
            LinkEvent::StateChanged(state) => Some(*state),
            _ => None,
        })
        .collect()
}

/// Frame texts in `events`, in order
pub fn frame_texts(events: &[LinkEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            LinkEvent::Frame(frame) => Some(frame.text.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(feature = "mock-link")]
pub fn create_test_mock_transport() -> MockTransport {
    MockTransport::new()
        .with_peripheral("3C:71:BF:00:00:01", Some("Other Device"))
        .with_peripheral("24:0A:C4:12:34:56", Some("MyESP32"))
}
