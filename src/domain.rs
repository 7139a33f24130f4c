use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One normalized sensor observation, as stored and as served.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// RFC 3339 UTC instant assigned by the hub when the reading was accepted
    pub timestamp: String,
    /// tank fill level in percent, always within [0, 100]
    pub water_level: f64,
    /// true while the rain sensor reports precipitation
    pub rain_status: bool,
    /// true while the drain valve is open
    pub valve_status: bool,
}

/// Water level as it arrived: a number, or whatever the sender managed
/// to emit. Non-numbers are kept raw so a rejection can echo them back.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum LevelField {
    Number(f64),
    Other(Value),
}

impl Default for LevelField {
    /// A payload that never mentions a level reads as an empty tank.
    fn default() -> Self {
        Self::Number(0.0)
    }
}

/// Rain flag in device vocabulary: `1`/`0` from older firmware, a bool
/// from newer builds. Anything else means "not raining".
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RainField {
    Flag(bool),
    Level(f64),
    Other(Value),
}

impl RainField {
    fn is_raining(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::Level(level) => *level == 1.0,
            Self::Other(_) => false,
        }
    }
}

/// Valve state in device vocabulary: the literal string `"OPEN"`, or a
/// bool from newer firmware. Anything else means closed.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ValveField {
    Flag(bool),
    State(String),
    Other(Value),
}

impl ValveField {
    fn is_open(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            Self::State(state) => state == "OPEN",
            Self::Other(_) => false,
        }
    }
}

/// Canonical-shape boolean: set only by a literal JSON `true`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum BoolField {
    Flag(bool),
    Other(Value),
}

impl BoolField {
    fn is_set(&self) -> bool {
        matches!(self, Self::Flag(true))
    }
}

/// Field naming used by the reporting firmware. `waterLevel` doubles as
/// a fallback because some firmware builds mix vocabularies. Unknown
/// keys (e.g. the device's `buzzer` state) are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct DevicePayload {
    pub water_level: Option<LevelField>,
    #[serde(rename = "waterLevel")]
    pub water_level_fallback: Option<LevelField>,
    pub rain: Option<RainField>,
    pub valve: Option<ValveField>,
}

/// The hub's own field naming, as replayed by dashboards or tooling.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPayload {
    pub water_level: Option<LevelField>,
    pub rain_status: Option<BoolField>,
    pub valve_status: Option<BoolField>,
}

/// A POST body classified into one of the two recognized shapes.
#[derive(Debug)]
pub enum IncomingPayload {
    Device(DevicePayload),
    Canonical(CanonicalPayload),
}

/// Keys whose presence selects the device shape.
const DEVICE_KEYS: [&str; 3] = ["water_level", "rain", "valve"];

impl IncomingPayload {
    /// Classify a decoded JSON body by key presence and decode it into
    /// the matching shape. Device keys win even when canonical keys are
    /// present alongside them; whether that precedence is intended is an
    /// open question with the firmware team, so it is preserved as-is.
    ///
    /// A non-object body carries no recognized keys and decodes as an
    /// empty canonical payload.
    pub fn detect(raw: &Value) -> Self {
        let device = DEVICE_KEYS.iter().any(|key| raw.get(key).is_some());
        if device {
            Self::Device(serde_json::from_value(raw.clone()).unwrap_or_default())
        } else {
            Self::Canonical(serde_json::from_value(raw.clone()).unwrap_or_default())
        }
    }

    /// Map the shape-specific fields onto a draft reading. Missing
    /// fields fall back to an empty tank / no rain / closed valve.
    pub fn normalize(self) -> ReadingDraft {
        match self {
            Self::Device(payload) => ReadingDraft {
                level: payload
                    .water_level
                    .or(payload.water_level_fallback)
                    .unwrap_or_default(),
                rain: payload.rain.map_or(false, |field| field.is_raining()),
                valve: payload.valve.map_or(false, |field| field.is_open()),
            },
            Self::Canonical(payload) => ReadingDraft {
                level: payload.water_level.unwrap_or_default(),
                rain: payload.rain_status.map_or(false, |field| field.is_set()),
                valve: payload.valve_status.map_or(false, |field| field.is_set()),
            },
        }
    }
}

/// Normalized but not yet validated reading; no timestamp assigned and
/// the level may still be garbage.
#[derive(Debug)]
pub struct ReadingDraft {
    pub level: LevelField,
    pub rain: bool,
    pub valve: bool,
}

/// Rejected water level. Carries the raw value so the error response
/// can show the sender what arrived.
#[derive(Debug, Error)]
#[error("Invalid waterLevel (0-100)")]
pub struct InvalidLevel {
    pub received: Value,
}

impl ReadingDraft {
    /// Validate the level and stamp the draft with the server clock.
    /// Nothing has touched storage yet when this fails.
    pub fn finalize(self) -> Result<Reading, InvalidLevel> {
        let water_level = match self.level {
            LevelField::Number(level) if level.is_finite() && (0.0..=100.0).contains(&level) => {
                level
            }
            LevelField::Number(level) => {
                return Err(InvalidLevel {
                    received: Value::from(level),
                })
            }
            LevelField::Other(raw) => return Err(InvalidLevel { received: raw }),
        };
        Ok(Reading {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            water_level,
            rain_status: self.rain,
            valve_status: self.valve,
        })
    }
}
