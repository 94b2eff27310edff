//! Notification subscription as a sequence of frames
//!
//! A [`FrameSubscription`] wraps the notification channel returned by
//! [`LinkTransport::subscribe`](super::LinkTransport::subscribe). Each payload
//! is decoded to text, stamped with the arrival time and numbered.
//!
//! The sequence is lazy and cannot be restarted. It ends after the first
//! subscription error or when the transport closes the channel; that final
//! item is an `Err`. Cancelling (or dropping) the subscription tears it down.
//! Nothing is acknowledged back to the peripheral.

use crate::error::{AgrolinkError, Result};
use crate::types::RawFrame;
use crossbeam_channel::{Receiver, TryRecvError};

use super::transport_trait::Notification;

/// Active notification subscription
#[derive(Debug)]
pub struct FrameSubscription {
    notifications: Receiver<Notification>,
    next_seq: u64,
    finished: bool,
}

impl FrameSubscription {
    /// Wrap a notification channel; the first frame gets `first_seq`
    pub fn new(notifications: Receiver<Notification>, first_seq: u64) -> Self {
        Self {
            notifications,
            next_seq: first_seq,
            finished: false,
        }
    }

    /// Sequence number the next frame will carry
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Whether the sequence has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Take the next pending frame without blocking
    ///
    /// Returns `None` when nothing is pending or the sequence has ended.
    pub fn try_next(&mut self) -> Option<Result<RawFrame>> {
        if self.finished {
            return None;
        }
        match self.notifications.try_recv() {
            Ok(notification) => Some(self.accept(notification)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.closed()),
        }
    }

    /// Tear down the subscription
    pub fn cancel(self) {
        tracing::debug!("Notification subscription cancelled at seq {}", self.next_seq);
    }

    fn accept(&mut self, notification: Notification) -> Result<RawFrame> {
        match notification {
            Ok(payload) => {
                let frame = RawFrame::new(self.next_seq, RawFrame::decode_payload(&payload));
                self.next_seq += 1;
                Ok(frame)
            }
            Err(message) => {
                self.finished = true;
                Err(AgrolinkError::ConnectionFailed(format!(
                    "Subscription error: {}",
                    message
                )))
            }
        }
    }

    fn closed(&mut self) -> Result<RawFrame> {
        self.finished = true;
        Err(AgrolinkError::ConnectionFailed(
            "Notification stream closed by transport".to_string(),
        ))
    }
}

impl Iterator for FrameSubscription {
    type Item = Result<RawFrame>;

    /// Block until the next frame arrives
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.notifications.recv() {
            Ok(notification) => Some(self.accept(notification)),
            Err(_) => Some(self.closed()),
        }
    }
}

impl std::iter::FusedIterator for FrameSubscription {}
