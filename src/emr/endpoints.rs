//! Paths of the OpenEMR pages this client drives, relative to the base URL.

use crate::models::IssueKind;

pub const LOGIN_PAGE: &str = "/interface/login/login.php";
pub const LOGIN_SUBMIT: &str = "/interface/main/main_screen.php?auth=login&site=default";

pub const NEW_PATIENT_FORM: &str = "/interface/new/new_comprehensive.php";
pub const NEW_PATIENT_SAVE: &str = "/interface/new/new_comprehensive_save.php";
pub const PATIENT_SEARCH: &str = "/interface/patient_file/find_interface/find_interface.php";
pub const PATIENT_SUMMARY: &str = "/interface/patient_file/summary/demographics.php";
pub const DEMOGRAPHICS_FULL: &str = "/interface/patient_file/summary/demographics_full.php";
pub const HISTORY_FULL: &str = "/interface/patient_file/history/history_full.php";

const ISSUE_FORM: &str = "/interface/patient_file/summary/add_edit_issue.php";

pub const ENCOUNTER_FORM: &str = "/interface/forms/newpatient/new.php?autoloaded=1&calenc=";
pub const ENCOUNTER_SAVE: &str = "/interface/forms/newpatient/save.php";
pub const ENCOUNTER_TOP: &str = "/interface/patient_file/encounter/encounter_top.php";

pub const VITALS_FORM: &str = "/interface/forms/vitals/new.php";
pub const VITALS_SAVE: &str = "/interface/forms/vitals/save.php";

pub const OBSERVATION_FORM: &str = "/interface/forms/observation/new.php";
pub const OBSERVATION_SAVE: &str = "/interface/forms/observation/save.php?id=0";

/// New-issue page for a kind; the form posts back to the same URL.
pub fn issue_form(kind: IssueKind) -> String {
    format!("{ISSUE_FORM}?issue=0&thistype={}", kind.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_form_carries_type() {
        assert_eq!(
            issue_form(IssueKind::Medication),
            "/interface/patient_file/summary/add_edit_issue.php?issue=0&thistype=medication"
        );
        assert!(issue_form(IssueKind::MedicalProblem).ends_with("thistype=medical_problem"));
    }
}
