//! Frame classification
//!
//! Turns a frame's text into one [`ClassifiedReading`]. Classification is a
//! priority chain: the rules in [`RULES`] are tried in order and the first
//! match wins, even when a later rule would also match.
//!
//! | Order | Shape | Example |
//! |---|---|---|
//! | 1 | NPK triple | `12.0N 4.0P 6.0K NPK` |
//! | 2 | Humidity / temperature | `189H 21.8T Hum&Temp` |
//! | 3 | pH | `8.10 ph`, `ph 8.10`, `PH7` |
//!
//! Anything else is [`ClassifiedReading::Unrecognized`], which is not an
//! error.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Structured interpretation of a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedReading {
    /// Nitrogen, phosphorus and potassium as sent
    Npk {
        nitrogen: String,
        phosphorus: String,
        potassium: String,
    },
    /// Temperature (Celsius) and relative humidity (percent)
    TempHumidity {
        temperature_c: String,
        humidity_pct: String,
    },
    /// Soil pH
    Ph { value: String },
    /// Frame matched no known shape
    Unrecognized,
}

impl ClassifiedReading {
    pub fn is_recognized(&self) -> bool {
        !matches!(self, ClassifiedReading::Unrecognized)
    }

    /// Short label for the reading shape
    pub fn label(&self) -> &'static str {
        match self {
            ClassifiedReading::Npk { .. } => "NPK",
            ClassifiedReading::TempHumidity { .. } => "Temp/Humidity",
            ClassifiedReading::Ph { .. } => "pH",
            ClassifiedReading::Unrecognized => "Unrecognized",
        }
    }
}

impl std::fmt::Display for ClassifiedReading {
    /// Renders the staged form: `12.0, 4.0, 6.0`, `21.8C, 189%`, `8.10`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifiedReading::Npk {
                nitrogen,
                phosphorus,
                potassium,
            } => write!(f, "{}, {}, {}", nitrogen, phosphorus, potassium),
            ClassifiedReading::TempHumidity {
                temperature_c,
                humidity_pct,
            } => write!(f, "{}C, {}%", temperature_c, humidity_pct),
            ClassifiedReading::Ph { value } => write!(f, "{}", value),
            ClassifiedReading::Unrecognized => Ok(()),
        }
    }
}

/// One entry of the priority chain
struct Rule {
    pattern: Lazy<Regex>,
    build: fn(&Captures<'_>) -> ClassifiedReading,
}

fn group(caps: &Captures<'_>, idx: usize) -> String {
    caps.get(idx).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn build_npk(caps: &Captures<'_>) -> ClassifiedReading {
    ClassifiedReading::Npk {
        nitrogen: group(caps, 1),
        phosphorus: group(caps, 2),
        potassium: group(caps, 3),
    }
}

// Wire order is humidity then temperature.
fn build_temp_humidity(caps: &Captures<'_>) -> ClassifiedReading {
    ClassifiedReading::TempHumidity {
        temperature_c: group(caps, 2),
        humidity_pct: group(caps, 1),
    }
}

fn build_ph(caps: &Captures<'_>) -> ClassifiedReading {
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    ClassifiedReading::Ph { value }
}

// ASCII digits only, matching what `parse_float` converts.
static RULES: [Rule; 3] = [
    Rule {
        pattern: Lazy::new(|| {
            Regex::new(r"([0-9]+\.?[0-9]*)N\s*([0-9]+\.?[0-9]*)P\s*([0-9]+\.?[0-9]*)K")
                .expect("npk regex")
        }),
        build: build_npk,
    },
    Rule {
        pattern: Lazy::new(|| {
            Regex::new(r"([0-9]+\.?[0-9]*)H\s*([0-9]+\.?[0-9]*)T").expect("hum/temp regex")
        }),
        build: build_temp_humidity,
    },
    Rule {
        pattern: Lazy::new(|| {
            Regex::new(r"(?i)(?:ph\s*([0-9]+\.?[0-9]*)|([0-9]+\.?[0-9]*)\s*ph)")
                .expect("ph regex")
        }),
        build: build_ph,
    },
];

/// Classify a frame's text
///
/// Total: every input yields exactly one reading.
pub fn classify(text: &str) -> ClassifiedReading {
    RULES
        .iter()
        .find_map(|rule| rule.pattern.captures(text).map(|caps| (rule.build)(&caps)))
        .unwrap_or(ClassifiedReading::Unrecognized)
}
