use serde::Deserialize;

use super::lenient::{optional_text, text};

/// Kind of entry on the EMR's issue list (`add_edit_issue.php`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    MedicalProblem,
    Medication,
    Allergy,
}

impl IssueKind {
    /// Value of the `thistype` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::MedicalProblem => "medical_problem",
            IssueKind::Medication => "medication",
            IssueKind::Allergy => "allergy",
        }
    }

    /// Value of the `form_type` field.
    pub fn form_type(self) -> &'static str {
        match self {
            IssueKind::MedicalProblem => "0",
            IssueKind::Medication => "2",
            IssueKind::Allergy => "3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            IssueKind::MedicalProblem => "Problem",
            IssueKind::Medication => "Medication",
            IssueKind::Allergy => "Allergy",
        }
    }
}

/// A medical problem or diagnosis.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Problem {
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "text")]
    pub icd10: String,
    /// Onset date; the importer fills in a default when absent.
    #[serde(default, deserialize_with = "optional_text")]
    pub begin: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub comments: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Medication {
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    /// Free-text dosage instructions.
    #[serde(default, deserialize_with = "text")]
    pub dosage: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub begin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Allergy {
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "text")]
    pub reaction: String,
    #[serde(default, deserialize_with = "text")]
    pub severity: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub begin: Option<String>,
}
