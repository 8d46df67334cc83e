use serde::{Deserialize, Serialize};

use super::lenient::{list, text};

/// Encounter identifier assigned by the EMR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EncounterId(pub u64);

impl std::fmt::Display for EncounterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_reason() -> String {
    "Office Visit".to_string()
}

/// A clinical visit, with the vitals and lab results taken during it.
#[derive(Debug, Clone, Deserialize)]
pub struct Encounter {
    /// Visit date (YYYY-MM-DD).
    #[serde(default, deserialize_with = "text")]
    pub date: String,
    #[serde(default = "default_reason", deserialize_with = "text")]
    pub reason: String,
    #[serde(default)]
    pub vitals: Option<Vitals>,
    #[serde(default, deserialize_with = "list")]
    pub labs: Vec<LabResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Vitals {
    #[serde(default, deserialize_with = "text")]
    pub weight: String,
    #[serde(default, deserialize_with = "text")]
    pub height: String,
    /// Systolic blood pressure.
    #[serde(default, deserialize_with = "text")]
    pub bps: String,
    /// Diastolic blood pressure.
    #[serde(default, deserialize_with = "text")]
    pub bpd: String,
    #[serde(default, deserialize_with = "text")]
    pub pulse: String,
    #[serde(default, deserialize_with = "text")]
    pub respiration: String,
    #[serde(default, deserialize_with = "text")]
    pub temperature: String,
    #[serde(default, deserialize_with = "text")]
    pub oxygen_saturation: String,
    #[serde(default, deserialize_with = "text")]
    pub note: String,
}

impl Vitals {
    /// Short "BP 120/80, HR 72, Temp 36.8" line for progress output.
    pub fn summary(&self) -> String {
        let bp = if self.bps.is_empty() {
            "N/A".to_string()
        } else {
            format!("{}/{}", self.bps, or_unknown(&self.bpd))
        };
        format!(
            "BP {}, HR {}, Temp {}",
            bp,
            or_unknown(&self.pulse),
            or_unknown(&self.temperature)
        )
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "?"
    } else {
        value
    }
}

/// A single observation, usually identified by a LOINC code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabResult {
    #[serde(default, deserialize_with = "text")]
    pub code: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "text")]
    pub value: String,
    #[serde(default, deserialize_with = "text")]
    pub unit: String,
    #[serde(default, deserialize_with = "text")]
    pub date: String,
    #[serde(default, deserialize_with = "text")]
    pub comments: String,
    #[serde(default, deserialize_with = "text")]
    pub reference_range: String,
}

impl LabResult {
    /// Comment text to submit. The observation form has no reference-range
    /// input, so the range rides along in the comments.
    pub fn comment_text(&self) -> String {
        match (self.comments.trim(), self.reference_range.trim()) {
            (c, "") => c.to_string(),
            ("", r) => format!("Reference range: {r}"),
            (c, r) => format!("{c} (Reference range: {r})"),
        }
    }
}
