use serde::{Deserialize, Serialize};

use super::encounter::Encounter;
use super::history::History;
use super::insurance::{Insurance, InsuranceField};
use super::issue::{Allergy, Medication, Problem};
use super::lenient::{list, text};

/// Patient identifier assigned by the EMR when the patient is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Pid(pub u64);

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_sex() -> String {
    "Female".to_string()
}

/// Demographic fields submitted on the new-patient form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Demographics {
    #[serde(default, deserialize_with = "text")]
    pub fname: String,
    #[serde(default, deserialize_with = "text")]
    pub mname: String,
    #[serde(default, deserialize_with = "text")]
    pub lname: String,
    #[serde(rename = "DOB", default, deserialize_with = "text")]
    pub dob: String,
    #[serde(default = "default_sex", deserialize_with = "text")]
    pub sex: String,
    #[serde(default, deserialize_with = "text")]
    pub street: String,
    #[serde(default, deserialize_with = "text")]
    pub city: String,
    #[serde(default, deserialize_with = "text")]
    pub postal_code: String,
    #[serde(default, deserialize_with = "text")]
    pub country_code: String,
    #[serde(default, deserialize_with = "text")]
    pub phone_cell: String,
    #[serde(default, deserialize_with = "text")]
    pub email: String,
    #[serde(default, deserialize_with = "text")]
    pub language: String,
    /// Marital status.
    #[serde(default, deserialize_with = "text")]
    pub status: String,
    #[serde(default, deserialize_with = "text")]
    pub ssn: String,
    /// Identifier from the source system, stored as the EMR's public id.
    #[serde(default, deserialize_with = "text")]
    pub external_id: String,
}

impl Demographics {
    /// First, middle and last name, skipping blank parts.
    pub fn full_name(&self) -> String {
        join_names(&[&self.fname, &self.mname, &self.lname])
    }

    /// First and last name, used in the import summary.
    pub fn short_name(&self) -> String {
        join_names(&[&self.fname, &self.lname])
    }
}

fn join_names(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line of the input file: a patient plus everything to attach to them.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientRecord {
    #[serde(flatten)]
    pub demographics: Demographics,
    #[serde(default, deserialize_with = "list")]
    pub problems: Vec<Problem>,
    #[serde(default, deserialize_with = "list")]
    pub medications: Vec<Medication>,
    #[serde(default, deserialize_with = "list")]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub history: Option<History>,
    #[serde(default)]
    pub insurance: Option<InsuranceField>,
    #[serde(default, deserialize_with = "list")]
    pub encounters: Vec<Encounter>,
}

impl PatientRecord {
    /// History to submit, if the record carries any non-blank field.
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref().filter(|h| !h.is_empty())
    }

    /// Non-empty insurance policies with their position in the record.
    ///
    /// The position picks the coverage rank, so an empty entry still holds
    /// its slot.
    pub fn policies(&self) -> Vec<(usize, &Insurance)> {
        match &self.insurance {
            Some(field) => field
                .policies()
                .iter()
                .enumerate()
                .filter(|(_, p)| !p.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }
}
