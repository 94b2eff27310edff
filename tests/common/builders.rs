//! Test data builders for creating test objects

use agrolink_rs::types::{RawFrame, SavedMessage};
use chrono::{DateTime, TimeZone, Utc};

/// Fixed instant used by builders unless overridden
pub fn at_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

/// Builder for creating test frames and saved messages
pub struct FrameBuilder {
    seq: u64,
    text: String,
    received_at: DateTime<Utc>,
}

impl FrameBuilder {
    pub fn new(text: &str) -> Self {
        Self {
            seq: 1,
            text: text.to_string(),
            received_at: at_millis(1_700_000_000_000),
        }
    }

    pub fn seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn at(mut self, millis: i64) -> Self {
        self.received_at = at_millis(millis);
        self
    }

    pub fn build(self) -> RawFrame {
        RawFrame::with_timestamp(self.seq, self.text, self.received_at)
    }

    pub fn saved(self) -> SavedMessage {
        SavedMessage::from(&self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_builder() {
        let frame = FrameBuilder::new("8.10 ph").seq(3).at(42).build();

        assert_eq!(frame.seq, 3);
        assert_eq!(frame.text, "8.10 ph");
        assert_eq!(frame.message_id(), "42-8.10 ph");
    }
}
