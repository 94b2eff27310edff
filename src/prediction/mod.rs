//! Staging readings and requesting crop predictions
//!
//! The bridge carries readings from the saved log into a prediction call:
//!
//! 1. [`PredictionBridge::stage_from_saved_message`] re-classifies a saved
//!    message and stores its reading in the matching [`PendingPrediction`]
//!    slot. Slots accumulate across calls until cleared.
//! 2. [`PredictionForm::pull_from`] copies the staged slots into the six form
//!    fields, which the user may then edit.
//! 3. [`PredictionForm::build_prediction_request`] validates the form.
//! 4. [`PredictionBridge::submit_prediction`] sends the request to a
//!    [`ScoringService`] and returns the crop label.
//!
//! Nothing here is persisted. Overlapping submissions are not guarded
//! against; the caller decides which response wins.

pub mod client;
pub mod form;

pub use client::{HttpScoringClient, PredictionResponse, ScoringService};
pub use form::{parse_float, PredictionForm, PredictionRequest};

use crate::error::{AgrolinkError, Result};
use crate::parser::{classify, ClassifiedReading};
use crate::types::SavedMessage;
use serde::{Deserialize, Serialize};

/// Readings staged for the next prediction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPrediction {
    /// `"<n>, <p>, <k>"`
    pub npk: Option<String>,
    /// pH value
    pub ph: Option<String>,
    /// `"<t>C, <h>%"`
    pub temp_humidity: Option<String>,
}

impl PendingPrediction {
    pub fn is_empty(&self) -> bool {
        self.npk.is_none() && self.ph.is_none() && self.temp_humidity.is_none()
    }

    /// Store `reading` in its slot; returns `false` for unrecognized readings
    pub fn stage(&mut self, reading: &ClassifiedReading) -> bool {
        let slot = match reading {
            ClassifiedReading::Npk { .. } => &mut self.npk,
            ClassifiedReading::TempHumidity { .. } => &mut self.temp_humidity,
            ClassifiedReading::Ph { .. } => &mut self.ph,
            ClassifiedReading::Unrecognized => return false,
        };
        *slot = Some(reading.to_string());
        true
    }
}

/// Stages readings and submits predictions through a scoring service
#[derive(Debug)]
pub struct PredictionBridge<S> {
    scoring: S,
    pending: PendingPrediction,
}

impl<S: ScoringService> PredictionBridge<S> {
    pub fn new(scoring: S) -> Self {
        Self {
            scoring,
            pending: PendingPrediction::default(),
        }
    }

    /// Classify `message` and stage its reading
    ///
    /// The other two slots keep their values. An unrecognized message fails
    /// with [`AgrolinkError::ParsingFailed`] and leaves the staged readings
    /// unchanged.
    pub fn stage_from_saved_message(&mut self, message: &SavedMessage) -> Result<ClassifiedReading> {
        let reading = classify(&message.text);
        if !self.pending.stage(&reading) {
            tracing::warn!("Cannot stage unrecognized message {}", message.id);
            return Err(AgrolinkError::ParsingFailed(format!(
                "Unrecognized frame: {}",
                message.text
            )));
        }
        tracing::info!("Staged {} reading '{}' from {}", reading.label(), reading, message.id);
        Ok(reading)
    }

    pub fn pending(&self) -> &PendingPrediction {
        &self.pending
    }

    /// Forget all staged readings
    pub fn clear_pending(&mut self) {
        self.pending = PendingPrediction::default();
        tracing::debug!("Cleared staged readings");
    }

    /// Validate `form`; see [`PredictionForm::build_prediction_request`]
    pub fn build_prediction_request(&self, form: &PredictionForm) -> Result<PredictionRequest> {
        form.build_prediction_request()
    }

    /// Send `request` and return the suggested crop
    pub async fn submit_prediction(&self, request: &PredictionRequest) -> Result<String> {
        self.scoring.predict(request).await
    }

    pub fn scoring(&self) -> &S {
        &self.scoring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scoring service that answers from a fixed script
    #[derive(Default)]
    struct ScriptedScoring {
        calls: AtomicUsize,
        seen: Mutex<Vec<PredictionRequest>>,
        reject: bool,
    }

    impl ScoringService for ScriptedScoring {
        async fn predict(&self, request: &PredictionRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(*request);
            if self.reject {
                Err(AgrolinkError::ServiceRejected {
                    status: 500,
                    message: "Internal Server Error".into(),
                })
            } else {
                Ok("rice".to_string())
            }
        }
    }

    fn saved(text: &str) -> SavedMessage {
        SavedMessage::new(text, Utc.timestamp_millis_opt(1_000).unwrap())
    }

    #[test]
    fn test_stage_each_shape() {
        let mut bridge = PredictionBridge::new(ScriptedScoring::default());

        bridge.stage_from_saved_message(&saved("12.0N 4.0P 6.0K NPK")).unwrap();
        bridge.stage_from_saved_message(&saved("189H 21.8T Hum&Temp")).unwrap();
        bridge.stage_from_saved_message(&saved("8.10 ph")).unwrap();

        assert_eq!(
            bridge.pending(),
            &PendingPrediction {
                npk: Some("12.0, 4.0, 6.0".into()),
                ph: Some("8.10".into()),
                temp_humidity: Some("21.8C, 189%".into()),
            }
        );
    }

    #[test]
    fn test_stage_overwrites_own_slot_only() {
        let mut bridge = PredictionBridge::new(ScriptedScoring::default());
        bridge.stage_from_saved_message(&saved("ph 6.5")).unwrap();
        bridge.stage_from_saved_message(&saved("1N 2P 3K")).unwrap();
        bridge.stage_from_saved_message(&saved("ph 7.2")).unwrap();

        assert_eq!(bridge.pending().ph.as_deref(), Some("7.2"));
        assert_eq!(bridge.pending().npk.as_deref(), Some("1, 2, 3"));
        assert!(bridge.pending().temp_humidity.is_none());
    }

    #[test]
    fn test_stage_unrecognized_leaves_pending() {
        let mut bridge = PredictionBridge::new(ScriptedScoring::default());
        bridge.stage_from_saved_message(&saved("ph 6.5")).unwrap();
        let before = bridge.pending().clone();

        let err = bridge
            .stage_from_saved_message(&saved("sensor warming up"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParsingFailed);
        assert_eq!(bridge.pending(), &before);
    }

    #[test]
    fn test_clear_pending() {
        let mut bridge = PredictionBridge::new(ScriptedScoring::default());
        bridge.stage_from_saved_message(&saved("ph 6.5")).unwrap();
        bridge.clear_pending();
        assert!(bridge.pending().is_empty());
    }

    #[tokio::test]
    async fn test_submit_returns_label() {
        let bridge = PredictionBridge::new(ScriptedScoring::default());
        let request = PredictionRequest {
            nitrogen: 1.0,
            phosphorus: 2.0,
            potassium: 3.0,
            ph: 6.5,
            temperature: 25.0,
            humidity: 60.0,
        };

        assert_eq!(bridge.submit_prediction(&request).await.unwrap(), "rice");
        assert_eq!(bridge.scoring().seen.lock().unwrap().as_slice(), &[request]);
    }

    #[tokio::test]
    async fn test_submit_surfaces_rejection() {
        let bridge = PredictionBridge::new(ScriptedScoring {
            reject: true,
            ..Default::default()
        });
        let request = PredictionForm {
            nitrogen: "1".into(),
            phosphorus: "2".into(),
            potassium: "3".into(),
            ph: "7".into(),
            temperature: "20".into(),
            humidity: "50".into(),
        }
        .build_prediction_request()
        .unwrap();

        let err = bridge.submit_prediction(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceRejected);
        assert_eq!(err.user_message(), "Failed to get a prediction. Please try again.");
    }

    #[test]
    fn test_validation_failure_makes_no_call() {
        let bridge = PredictionBridge::new(ScriptedScoring::default());
        let form = PredictionForm {
            nitrogen: "1".into(),
            ..Default::default()
        };

        let err = bridge.build_prediction_request(&form).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
        assert_eq!(bridge.scoring().calls.load(Ordering::SeqCst), 0);
    }
}
