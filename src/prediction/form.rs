//! Prediction form and request body
//!
//! [`PredictionForm`] holds the six user-editable inputs as text. It can be
//! pre-filled from staged readings with [`PredictionForm::pull_from`] and
//! turned into a [`PredictionRequest`] once every field is filled.

use crate::error::{AgrolinkError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::PendingPrediction;

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)")
        .expect("float regex")
});

static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+\.?[0-9]*").expect("leading number regex"));

/// Lenient number conversion
///
/// Skips leading whitespace and converts the longest numeric prefix, so
/// `"21.8C"` is `21.8` and `" 7"` is `7.0`. Input with no numeric prefix
/// yields `NaN` instead of an error.
pub fn parse_float(input: &str) -> f64 {
    FLOAT_PREFIX
        .find(input.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Body of a prediction call
///
/// Field names are fixed by the scoring service. Humidity travels as
/// `MOISTURIZER`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(rename = "N")]
    pub nitrogen: f64,
    #[serde(rename = "P")]
    pub phosphorus: f64,
    #[serde(rename = "K")]
    pub potassium: f64,
    #[serde(rename = "PH")]
    pub ph: f64,
    #[serde(rename = "TEMPERATURE")]
    pub temperature: f64,
    #[serde(rename = "MOISTURIZER")]
    pub humidity: f64,
}

impl PredictionRequest {
    /// Whether any value failed numeric conversion
    pub fn has_nan(&self) -> bool {
        [
            self.nitrogen,
            self.phosphorus,
            self.potassium,
            self.ph,
            self.temperature,
            self.humidity,
        ]
        .iter()
        .any(|v| v.is_nan())
    }
}

/// The six prediction inputs, as entered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionForm {
    pub nitrogen: String,
    pub phosphorus: String,
    pub potassium: String,
    pub ph: String,
    pub temperature: String,
    pub humidity: String,
}

impl PredictionForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy staged readings into the form
    ///
    /// `npk` fills nitrogen, phosphorus and potassium only when it splits
    /// into exactly three comma-separated parts. `temp_humidity` fills
    /// temperature and humidity only when it splits into two parts; each
    /// keeps just its leading number. `ph` is copied as is. Empty slots
    /// leave their fields untouched.
    pub fn pull_from(&mut self, pending: &PendingPrediction) {
        if let Some(npk) = &pending.npk {
            let parts: Vec<&str> = npk.split(',').map(str::trim).collect();
            if let [n, p, k] = parts.as_slice() {
                self.nitrogen = n.to_string();
                self.phosphorus = p.to_string();
                self.potassium = k.to_string();
            } else {
                tracing::debug!("Staged NPK '{}' does not have three parts", npk);
            }
        }

        if let Some(th) = &pending.temp_humidity {
            let parts: Vec<&str> = th.split(',').collect();
            if let [temperature, humidity] = parts.as_slice() {
                if let Some(t) = LEADING_NUMBER.find(temperature) {
                    self.temperature = t.as_str().to_string();
                }
                if let Some(h) = LEADING_NUMBER.find(humidity) {
                    self.humidity = h.as_str().to_string();
                }
            } else {
                tracing::debug!("Staged temperature/humidity '{}' does not have two parts", th);
            }
        }

        if let Some(ph) = &pending.ph {
            self.ph = ph.clone();
        }
    }

    /// Field names that are still empty, in form order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Validate and convert to a request
    ///
    /// Fails with [`AgrolinkError::ValidationFailed`] naming the first empty
    /// field. Values that do not parse become `NaN` rather than failing.
    pub fn build_prediction_request(&self) -> Result<PredictionRequest> {
        if let Some(name) = self.missing_fields().first() {
            return Err(AgrolinkError::ValidationFailed(format!("{} is required", name)));
        }

        let request = PredictionRequest {
            nitrogen: parse_float(&self.nitrogen),
            phosphorus: parse_float(&self.phosphorus),
            potassium: parse_float(&self.potassium),
            ph: parse_float(&self.ph),
            temperature: parse_float(&self.temperature),
            humidity: parse_float(&self.humidity),
        };
        if request.has_nan() {
            tracing::warn!("Prediction request contains non-numeric input: {:?}", self);
        }
        Ok(request)
    }

    fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("nitrogen", self.nitrogen.as_str()),
            ("phosphorus", self.phosphorus.as_str()),
            ("potassium", self.potassium.as_str()),
            ("ph", self.ph.as_str()),
            ("temperature", self.temperature.as_str()),
            ("humidity", self.humidity.as_str()),
        ]
    }
}
