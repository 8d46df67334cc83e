//! Form payload builders, one per OpenEMR form.
//!
//! Each builder is a pure function from a record (plus the page's CSRF token
//! and any ids the form needs) to the ordered field list the form posts.
//! Fixed values mirror what the browser form submits for a new entry.

use crate::models::{
    Allergy, CoverageRank, Demographics, Encounter, History, Insurance, IssueKind, LabResult,
    Medication, Pid, Problem, Vitals,
};

/// Name of the hidden anti-forgery input on every OpenEMR form.
pub const CSRF_FIELD: &str = "csrf_token_form";

/// Ordered urlencoded form fields. Keys may repeat (`code[]`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload(Vec<(String, String)>);

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a payload with the CSRF token field.
    pub fn with_token(token: &str) -> Self {
        let mut payload = Self::new();
        payload.push(CSRF_FIELD, token);
        payload
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a repeated key, in order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Ids the new-encounter form needs that records do not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncounterSettings {
    /// Visit category (`pc_catid`); 5 is "Office Visit".
    pub category_id: String,
    pub provider_id: String,
    pub facility_id: String,
}

impl Default for EncounterSettings {
    fn default() -> Self {
        Self {
            category_id: "5".to_string(),
            provider_id: "1".to_string(),
            facility_id: "3".to_string(),
        }
    }
}

/// Hidden inputs scraped from the vitals form before posting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VitalsFormState {
    pub id: String,
    pub uuid: String,
}

// ═══════════════════════════════════════════════════════════
// Patient
// ═══════════════════════════════════════════════════════════

pub fn patient_payload(token: &str, d: &Demographics) -> FormPayload {
    let mut p = FormPayload::with_token(token);
    p.push("form_fname", &d.fname);
    p.push("form_lname", &d.lname);
    p.push("form_mname", &d.mname);
    p.push("form_DOB", &d.dob);
    p.push("form_sex", &d.sex);
    p.push("form_street", &d.street);
    p.push("form_city", &d.city);
    p.push("form_postal_code", &d.postal_code);
    p.push("form_country_code", &d.country_code);
    p.push("form_phone_cell", &d.phone_cell);
    p.push("form_email", &d.email);
    p.push("form_language", &d.language);
    p.push("form_status", &d.status);
    p.push("form_ss", &d.ssn);
    p.push("form_pubpid", &d.external_id);
    for blank in [
        "form_phone_home",
        "form_phone_biz",
        "form_state",
        "form_street_line_2",
        "form_title",
        "form_birth_fname",
        "form_birth_lname",
    ] {
        p.push(blank, "");
    }
    for consent in [
        "form_hipaa_notice",
        "form_hipaa_voice",
        "form_hipaa_mail",
        "form_hipaa_allowsms",
        "form_hipaa_allowemail",
    ] {
        p.push(consent, "YES");
    }
    // The save script only creates the patient when the submit button is present.
    p.push("create", "Create New Patient");
    p
}

// ═══════════════════════════════════════════════════════════
// Issues: problems, medications, allergies
// ═══════════════════════════════════════════════════════════

fn issue_header(token: &str, kind: IssueKind, pid: Pid, title: &str) -> FormPayload {
    let mut p = FormPayload::with_token(token);
    p.push("issue", "0");
    p.push("thispid", pid.to_string());
    p.push("thisenc", "0");
    p.push("form_type", kind.form_type());
    p.push("form_active", "1");
    p.push("form_title", title);
    p.push("form_title_id", "");
    p
}

pub fn problem_payload(token: &str, pid: Pid, problem: &Problem, begin: &str) -> FormPayload {
    let mut p = issue_header(token, IssueKind::MedicalProblem, pid, &problem.title);
    p.push("form_begin", begin);
    p.push("form_end", "");
    p.push("form_diagnosis", &problem.icd10);
    p.push("form_occur", "0");
    p.push("form_outcome", "0");
    p.push("form_classification", "0");
    p.push("form_verification", "unconfirmed");
    p.push("form_comments", &problem.comments);
    p.push("form_referredby", "");
    p.push("form_destination", "");
    p.push("form_return", "");
    p.push("form_save", "Save");
    p
}

pub fn medication_payload(
    token: &str,
    pid: Pid,
    medication: &Medication,
    begin: &str,
) -> FormPayload {
    let mut p = issue_header(token, IssueKind::Medication, pid, &medication.title);
    p.push("form_begin", begin);
    p.push("form_end", "");
    p.push("form_reaction", "unassigned");
    p.push("form_severity_id", "unassigned");
    p.push("form_medication[usage_category]", "community");
    p.push("form_medication[request_intent]", "order");
    p.push("form_medication[drug_dosage_instructions]", &medication.dosage);
    p.push("form_comments", "");
    p.push("form_diagnosis", "");
    p.push("form_occur", "0");
    p.push("form_outcome", "0");
    p.push("form_subtype", "");
    p.push("form_classification", "0");
    p.push("form_verification", "unconfirmed");
    p.push("form_referredby", "");
    p.push("form_destination", "");
    p.push("form_return", "");
    p.push("row_reinjury_id", "");
    p.push("form_save", "Save");
    p
}

pub fn allergy_payload(token: &str, pid: Pid, allergy: &Allergy, begin: &str) -> FormPayload {
    let mut p = issue_header(token, IssueKind::Allergy, pid, &allergy.title);
    p.push("form_begin", begin);
    p.push("form_end", "");
    p.push("form_reaction", or_unassigned(&allergy.reaction));
    p.push("form_severity_id", or_unassigned(&allergy.severity));
    p.push("form_occur", "0");
    p.push("form_outcome", "0");
    p.push("form_verification", "unconfirmed");
    p.push("form_comments", "");
    p.push("form_save", "Save");
    p
}

fn or_unassigned(value: &str) -> &str {
    if value.trim().is_empty() {
        "unassigned"
    } else {
        value
    }
}

// ═══════════════════════════════════════════════════════════
// History & insurance
// ═══════════════════════════════════════════════════════════

pub fn history_payload(token: &str, history: &History) -> FormPayload {
    let mut p = FormPayload::with_token(token);
    for (key, value) in history.fields() {
        p.push(format!("form_{key}"), value);
    }
    p
}

/// Insurance fields on the demographics form. Select inputs carry a `form_`
/// prefix, text inputs only the coverage prefix.
pub fn insurance_payload(token: &str, insurance: &Insurance, rank: CoverageRank) -> FormPayload {
    let i = rank.prefix();
    let mut p = FormPayload::with_token(token);
    p.push(
        format!("form_{i}subscriber_relationship"),
        &insurance.subscriber_relationship,
    );
    p.push(format!("{i}subscriber_fname"), &insurance.subscriber_fname);
    p.push(format!("{i}subscriber_lname"), &insurance.subscriber_lname);
    p.push(format!("{i}subscriber_DOB"), &insurance.subscriber_dob);
    p.push(format!("form_{i}provider"), &insurance.provider);
    p.push(format!("{i}plan_name"), &insurance.plan_name);
    p.push(format!("{i}policy_number"), &insurance.policy_number);
    p.push(format!("{i}group_number"), &insurance.group_number);
    p.push(format!("{i}subscriber_employer"), &insurance.subscriber_employer);
    p.push("form_copay", &insurance.copay);
    p
}

// ═══════════════════════════════════════════════════════════
// Encounters, vitals, labs
// ═══════════════════════════════════════════════════════════

pub fn encounter_payload(
    token: &str,
    encounter: &Encounter,
    settings: &EncounterSettings,
) -> FormPayload {
    let mut p = FormPayload::with_token(token);
    p.push("mode", "new");
    p.push("form_date", &encounter.date);
    p.push("reason", &encounter.reason);
    p.push("facility_id", &settings.facility_id);
    p.push("pc_catid", &settings.category_id);
    p.push("provider_id", &settings.provider_id);
    p.push("pos_code", "11"); // office
    p.push("class_code", "AMB");
    p
}

pub fn vitals_payload(
    token: &str,
    state: &VitalsFormState,
    pid: Pid,
    vitals: &Vitals,
) -> FormPayload {
    let mut p = FormPayload::with_token(token);
    p.push("id", &state.id);
    p.push("uuid", &state.uuid);
    p.push("pid", pid.to_string());
    p.push("process", "true");
    p.push("activity", "1");
    p.push("weight", &vitals.weight);
    p.push("height", &vitals.height);
    p.push("bps", &vitals.bps);
    p.push("bpd", &vitals.bpd);
    p.push("pulse", &vitals.pulse);
    p.push("respiration", &vitals.respiration);
    p.push("temperature", &vitals.temperature);
    p.push("oxygen_saturation", &vitals.oxygen_saturation);
    p.push("note", &vitals.note);
    // Derived and rarely-captured measures are left for the EMR to compute.
    for blank in [
        "BMI",
        "BMI_status",
        "head_circ",
        "waist_circ",
        "oxygen_flow_rate",
        "inhaled_oxygen_concentration",
    ] {
        p.push(blank, "");
    }
    p
}

/// One observation form holding every lab result, one `[]` group per result.
pub fn labs_payload(token: &str, labs: &[LabResult]) -> FormPayload {
    let mut p = FormPayload::with_token(token);
    for lab in labs {
        p.push("ob_type[]", "procedure_diagnostic");
        p.push("code_type[]", "LOINC");
        p.push("table_code[]", "");
        p.push("code[]", &lab.code);
        p.push("description[]", &lab.description);
        p.push("ob_value[]", &lab.value);
        p.push("ob_unit[]", &lab.unit);
        p.push("ob_value_phin[]", "");
        p.push("code_date[]", &lab.date);
        p.push("code_date_end[]", "");
        p.push("comments[]", lab.comment_text());
        p.push("reasonCode[]", "");
        p.push("reasonCodeStatus[]", "completed");
        p.push("reasonCodeText[]", "");
    }
    p
}
