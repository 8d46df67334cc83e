use serde::Deserialize;

use super::lenient::text;

fn default_relationship() -> String {
    "self".to_string()
}

/// One insurance policy.
#[derive(Debug, Clone, Deserialize)]
pub struct Insurance {
    /// Payer name.
    #[serde(default, deserialize_with = "text")]
    pub provider: String,
    #[serde(default, deserialize_with = "text")]
    pub plan_name: String,
    #[serde(default, deserialize_with = "text")]
    pub policy_number: String,
    #[serde(default, deserialize_with = "text")]
    pub group_number: String,
    #[serde(default, deserialize_with = "text")]
    pub subscriber_fname: String,
    #[serde(default, deserialize_with = "text")]
    pub subscriber_lname: String,
    #[serde(default = "default_relationship", deserialize_with = "text")]
    pub subscriber_relationship: String,
    #[serde(rename = "subscriber_DOB", default, deserialize_with = "text")]
    pub subscriber_dob: String,
    #[serde(default, deserialize_with = "text")]
    pub subscriber_employer: String,
    #[serde(default, deserialize_with = "text")]
    pub copay: String,
}

impl Default for Insurance {
    fn default() -> Self {
        Self {
            provider: String::new(),
            plan_name: String::new(),
            policy_number: String::new(),
            group_number: String::new(),
            subscriber_fname: String::new(),
            subscriber_lname: String::new(),
            subscriber_relationship: default_relationship(),
            subscriber_dob: String::new(),
            subscriber_employer: String::new(),
            copay: String::new(),
        }
    }
}

impl Insurance {
    /// True when nothing but the defaulted relationship is set.
    pub fn is_empty(&self) -> bool {
        [
            &self.provider,
            &self.plan_name,
            &self.policy_number,
            &self.group_number,
            &self.subscriber_fname,
            &self.subscriber_lname,
            &self.subscriber_dob,
            &self.subscriber_employer,
            &self.copay,
        ]
        .iter()
        .all(|v| v.trim().is_empty())
    }
}

/// The `insurance` key accepts a single policy or a list in coverage order.
///
/// `Multiple` is tried first: with every field defaulted, `Insurance` would
/// also accept an array positionally.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InsuranceField {
    Multiple(Vec<Insurance>),
    Single(Insurance),
}

impl InsuranceField {
    pub fn policies(&self) -> &[Insurance] {
        match self {
            InsuranceField::Single(policy) => std::slice::from_ref(policy),
            InsuranceField::Multiple(policies) => policies,
        }
    }
}

/// Coverage slot on the demographics form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageRank {
    Primary,
    Secondary,
    Tertiary,
}

impl CoverageRank {
    /// Rank for the n-th policy in a record (0-based); the form has three slots.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(CoverageRank::Primary),
            1 => Some(CoverageRank::Secondary),
            2 => Some(CoverageRank::Tertiary),
            _ => None,
        }
    }

    /// Field-name prefix used by the demographics form.
    pub fn prefix(self) -> &'static str {
        match self {
            CoverageRank::Primary => "i1",
            CoverageRank::Secondary => "i2",
            CoverageRank::Tertiary => "i3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CoverageRank::Primary => "Primary",
            CoverageRank::Secondary => "Secondary",
            CoverageRank::Tertiary => "Tertiary",
        }
    }
}
