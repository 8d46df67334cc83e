use crate::diagnostic::DumpDir;
use crate::models::{
    Allergy, CoverageRank, Demographics, Encounter, EncounterId, History, Insurance, IssueKind,
    LabResult, Medication, Pid, Problem, Vitals,
};

use super::endpoints;
use super::forms::{self, EncounterSettings, FormPayload, VitalsFormState};
use super::scrape;
use super::transport::{EmrTransport, PageResponse};
use super::EmrError;

/// Session cookie set by OpenEMR after a successful login.
pub const SESSION_COOKIE: &str = "OpenEMR";

/// Login credentials. `Debug` never prints the password.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Outcome of a login that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    /// The session cookie was set.
    Authenticated,
    /// The login POST went through but no session cookie came back;
    /// carries the cookie names that were set instead.
    CookieMissing(Vec<String>),
}

/// How a form save page answered a 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAck {
    Acknowledged,
    /// 200 without the usual success markers. Treated as success.
    Unclear,
}

/// A form page fetched for submission: its CSRF token and raw markup.
struct FormPage {
    token: String,
    html: String,
}

/// Authenticated browser-style session against one OpenEMR instance.
///
/// Every operation runs synchronously over the shared cookie jar held by the
/// transport. The EMR tracks the "current" patient and encounter server-side,
/// so submitters select them before loading a form.
pub struct EmrSession<T: EmrTransport> {
    transport: T,
    base_url: String,
    credentials: Credentials,
    encounter_settings: EncounterSettings,
    dump: Option<DumpDir>,
}

impl<T: EmrTransport> EmrSession<T> {
    pub fn new(transport: T, base_url: &str, credentials: Credentials) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            encounter_settings: EncounterSettings::default(),
            dump: None,
        }
    }

    pub fn with_encounter_settings(mut self, settings: EncounterSettings) -> Self {
        self.encounter_settings = settings;
        self
    }

    pub fn with_dump_dir(mut self, dump: Option<DumpDir>) -> Self {
        self.dump = dump;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn dump(&self, label: &str, html: &str) {
        if let Some(dump) = &self.dump {
            dump.dump_html(label, html);
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Session plumbing
    // ═══════════════════════════════════════════════════════════

    /// Log in through the web form.
    ///
    /// Transport failures abort. A missing session cookie is only reported,
    /// since some deployments rename it.
    pub fn login(&self) -> Result<LoginState, EmrError> {
        let login_page = self.url(endpoints::LOGIN_PAGE);
        self.transport
            .get(&login_page, &[])
            .map_err(|e| EmrError::LoginFailed(e.to_string()))?;

        let mut fields = FormPayload::new();
        fields.push("new_login_session_management", "1");
        fields.push("authProvider", "Default");
        fields.push("authUser", &self.credentials.username);
        fields.push("clearPass", &self.credentials.password);
        fields.push("languageChoice", "1");

        self.transport
            .post_form(&self.url(endpoints::LOGIN_SUBMIT), &fields, &login_page)
            .map_err(|e| EmrError::LoginFailed(e.to_string()))?;

        let cookies = self.transport.cookie_names();
        if cookies.iter().any(|c| c == SESSION_COOKIE) {
            tracing::info!(user = %self.credentials.username, "Web login successful");
            Ok(LoginState::Authenticated)
        } else {
            tracing::warn!(cookies = ?cookies, "Login may have failed: no session cookie");
            Ok(LoginState::CookieMissing(cookies))
        }
    }

    /// GET a form page and scrape its CSRF token.
    pub fn fetch_csrf_token(&self, page: &str) -> Result<String, EmrError> {
        self.fetch_form(page).map(|form| form.token)
    }

    fn fetch_form(&self, page: &str) -> Result<FormPage, EmrError> {
        let response = self.transport.get(&self.url(page), &[])?;
        if !response.is_ok() {
            return Err(EmrError::HttpStatus {
                status: response.status,
                page: page.to_string(),
            });
        }
        let token = scrape::extract_csrf_token(&response.body)
            .ok_or_else(|| EmrError::MissingCsrfToken(page.to_string()))?;
        tracing::debug!(page, "CSRF token scraped");
        Ok(FormPage {
            token,
            html: response.body,
        })
    }

    /// POST a payload, requiring a 200 reply.
    fn submit(
        &self,
        target: &str,
        payload: &FormPayload,
        referer_page: &str,
    ) -> Result<PageResponse, EmrError> {
        let response =
            self.transport
                .post_form(&self.url(target), payload, &self.url(referer_page))?;
        if !response.is_ok() {
            return Err(EmrError::HttpStatus {
                status: response.status,
                page: target.to_string(),
            });
        }
        Ok(response)
    }

    /// Make `pid` the EMR's current patient. Failures are logged only.
    pub fn set_active_patient(&self, pid: Pid) {
        let pid_text = pid.to_string();
        match self.transport.get(
            &self.url(endpoints::PATIENT_SUMMARY),
            &[("set_pid", pid_text.as_str())],
        ) {
            Ok(response) if response.is_ok() => {}
            Ok(response) => {
                tracing::warn!(pid = %pid, status = response.status, "Could not set active patient")
            }
            Err(e) => tracing::warn!(pid = %pid, error = %e, "Could not set active patient"),
        }
    }

    /// Make `encounter` the EMR's current encounter. Failures are logged only.
    pub fn set_active_encounter(&self, encounter: EncounterId) {
        let id = encounter.to_string();
        if let Err(e) = self.transport.get(
            &self.url(endpoints::ENCOUNTER_TOP),
            &[("set_encounter", id.as_str())],
        ) {
            tracing::warn!(encounter = %encounter, error = %e, "Could not set active encounter");
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Patients
    // ═══════════════════════════════════════════════════════════

    /// Create a patient and return the pid the EMR assigned.
    ///
    /// The pid is scraped from the save response; if that fails the patient
    /// is looked up by name, since the save may have succeeded anyway.
    pub fn create_patient(&self, demographics: &Demographics) -> Result<Pid, EmrError> {
        let form = self.fetch_form(endpoints::NEW_PATIENT_FORM)?;
        self.dump("new-patient-form", &form.html);

        let payload = forms::patient_payload(&form.token, demographics);
        let response = self.submit(
            endpoints::NEW_PATIENT_SAVE,
            &payload,
            endpoints::NEW_PATIENT_FORM,
        )?;
        self.dump("new-patient-save", &response.body);
        tracing::debug!(final_url = %response.url, "Patient form saved");

        if let Some(excerpt) = scrape::server_error(&response.body) {
            return Err(EmrError::ServerError(excerpt));
        }

        if let Some(pid) = scrape::extract_pid(&response.url, &response.body) {
            return Ok(pid);
        }

        match self.find_patient_by_name(&demographics.fname, &demographics.lname) {
            Ok(Some(pid)) => {
                tracing::debug!(pid = %pid, "Patient pid found by name search");
                Ok(pid)
            }
            Ok(None) => Err(EmrError::IdentifierNotFound("patient")),
            Err(e) => {
                tracing::debug!(error = %e, "Patient name search failed");
                Err(EmrError::IdentifierNotFound("patient"))
            }
        }
    }

    /// Search patients by name and return the first pid on the results page.
    pub fn find_patient_by_name(&self, fname: &str, lname: &str) -> Result<Option<Pid>, EmrError> {
        let response = self.transport.get(
            &self.url(endpoints::PATIENT_SEARCH),
            &[("fname", fname), ("lname", lname)],
        )?;
        if !response.is_ok() {
            return Ok(None);
        }
        Ok(scrape::extract_search_pid(&response.body))
    }

    // ═══════════════════════════════════════════════════════════
    // Issues
    // ═══════════════════════════════════════════════════════════

    fn add_issue(
        &self,
        pid: Pid,
        kind: IssueKind,
        build: impl FnOnce(&str) -> FormPayload,
    ) -> Result<(), EmrError> {
        self.set_active_patient(pid);
        let page = endpoints::issue_form(kind);
        let token = self.fetch_csrf_token(&page)?;
        self.submit(&page, &build(&token), &page)?;
        Ok(())
    }

    pub fn add_problem(&self, pid: Pid, problem: &Problem, begin: &str) -> Result<(), EmrError> {
        self.add_issue(pid, IssueKind::MedicalProblem, |token| {
            forms::problem_payload(token, pid, problem, begin)
        })
    }

    pub fn add_medication(
        &self,
        pid: Pid,
        medication: &Medication,
        begin: &str,
    ) -> Result<(), EmrError> {
        self.add_issue(pid, IssueKind::Medication, |token| {
            forms::medication_payload(token, pid, medication, begin)
        })
    }

    pub fn add_allergy(&self, pid: Pid, allergy: &Allergy, begin: &str) -> Result<(), EmrError> {
        self.add_issue(pid, IssueKind::Allergy, |token| {
            forms::allergy_payload(token, pid, allergy, begin)
        })
    }

    // ═══════════════════════════════════════════════════════════
    // History & insurance
    // ═══════════════════════════════════════════════════════════

    pub fn update_history(&self, pid: Pid, history: &History) -> Result<(), EmrError> {
        self.set_active_patient(pid);
        let token = self.fetch_csrf_token(endpoints::HISTORY_FULL)?;
        let payload = forms::history_payload(&token, history);
        self.submit(endpoints::HISTORY_FULL, &payload, endpoints::HISTORY_FULL)?;
        Ok(())
    }

    pub fn add_insurance(
        &self,
        pid: Pid,
        insurance: &Insurance,
        rank: CoverageRank,
    ) -> Result<(), EmrError> {
        self.set_active_patient(pid);
        let token = self.fetch_csrf_token(endpoints::DEMOGRAPHICS_FULL)?;
        let payload = forms::insurance_payload(&token, insurance, rank);
        self.submit(endpoints::DEMOGRAPHICS_FULL, &payload, endpoints::DEMOGRAPHICS_FULL)?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Encounters
    // ═══════════════════════════════════════════════════════════

    /// Create an encounter and return the id the EMR assigned.
    pub fn create_encounter(
        &self,
        pid: Pid,
        encounter: &Encounter,
    ) -> Result<EncounterId, EmrError> {
        self.set_active_patient(pid);
        let token = self.fetch_csrf_token(endpoints::ENCOUNTER_FORM)?;
        let payload = forms::encounter_payload(&token, encounter, &self.encounter_settings);
        let response = self.submit(endpoints::ENCOUNTER_SAVE, &payload, endpoints::ENCOUNTER_FORM)?;

        scrape::extract_encounter_id(&response.body).ok_or(EmrError::IdentifierNotFound("encounter"))
    }

    pub fn add_vitals(
        &self,
        pid: Pid,
        encounter: EncounterId,
        vitals: &Vitals,
    ) -> Result<SaveAck, EmrError> {
        self.set_active_patient(pid);
        self.set_active_encounter(encounter);

        let form = self.fetch_form(endpoints::VITALS_FORM)?;
        let state = VitalsFormState {
            id: scrape::extract_hidden_field(&form.html, "id").unwrap_or_default(),
            uuid: scrape::extract_hidden_field(&form.html, "uuid").unwrap_or_default(),
        };
        let payload = forms::vitals_payload(&form.token, &state, pid, vitals);
        let response = self.submit(endpoints::VITALS_SAVE, &payload, endpoints::VITALS_FORM)?;
        Ok(acknowledgement(&response))
    }

    /// Post every lab result of an encounter in one observation form.
    pub fn add_lab_results(
        &self,
        pid: Pid,
        encounter: EncounterId,
        labs: &[LabResult],
    ) -> Result<SaveAck, EmrError> {
        self.set_active_patient(pid);
        self.set_active_encounter(encounter);

        let token = self.fetch_csrf_token(endpoints::OBSERVATION_FORM)?;
        let payload = forms::labs_payload(&token, labs);
        let response =
            self.submit(endpoints::OBSERVATION_SAVE, &payload, endpoints::OBSERVATION_FORM)?;
        Ok(acknowledgement(&response))
    }
}

fn acknowledgement(response: &PageResponse) -> SaveAck {
    if scrape::is_save_acknowledged(&response.body) {
        SaveAck::Acknowledged
    } else {
        SaveAck::Unclear
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emr::transport::{Method, MockReply, MockTransport};

    const BASE: &str = "http://emr.test";
    const TOKEN_PAGE: &str = r#"<form><input type="hidden" name="csrf_token_form" value="tok-1"></form>"#;

    fn credentials() -> Credentials {
        Credentials {
            username: "admin".into(),
            password: "secret".into(),
        }
    }

    fn session(mock: MockTransport) -> EmrSession<MockTransport> {
        EmrSession::new(mock, "http://emr.test/", credentials())
    }

    fn patient() -> Demographics {
        Demographics {
            fname: "Hoa".into(),
            lname: "Le".into(),
            sex: "Female".into(),
            ..Default::default()
        }
    }

    #[test]
    fn credentials_debug_hides_password() {
        let text = format!("{:?}", credentials());
        assert!(text.contains("admin"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn login_posts_credentials_and_confirms_cookie() {
        let s = session(MockTransport::new().with_cookie("OpenEMR"));
        assert_eq!(s.login().unwrap(), LoginState::Authenticated);

        let posts = s.transport().posts_to(endpoints::LOGIN_SUBMIT);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].fields.get("authUser"), Some("admin"));
        assert_eq!(posts[0].fields.get("clearPass"), Some("secret"));
        assert_eq!(posts[0].url, format!("{BASE}{}", endpoints::LOGIN_SUBMIT));
    }

    #[test]
    fn login_without_cookie_is_reported_not_failed() {
        let s = session(MockTransport::new().with_cookie("PHPSESSID"));
        assert_eq!(
            s.login().unwrap(),
            LoginState::CookieMissing(vec!["PHPSESSID".to_string()])
        );
    }

    #[test]
    fn login_connection_failure_aborts() {
        let s = session(MockTransport::new().failing(Method::Get, endpoints::LOGIN_PAGE));
        assert!(matches!(s.login(), Err(EmrError::LoginFailed(_))));
    }

    #[test]
    fn fetch_csrf_token_errors() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::HISTORY_FULL, MockReply::ok("<form></form>"))
                .on(Method::Get, endpoints::DEMOGRAPHICS_FULL, MockReply::status(403)),
        );
        assert!(matches!(
            s.fetch_csrf_token(endpoints::HISTORY_FULL),
            Err(EmrError::MissingCsrfToken(_))
        ));
        assert!(matches!(
            s.fetch_csrf_token(endpoints::DEMOGRAPHICS_FULL),
            Err(EmrError::HttpStatus { status: 403, .. })
        ));
    }

    #[test]
    fn create_patient_reads_pid_from_redirect() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::NEW_PATIENT_FORM, MockReply::ok(TOKEN_PAGE))
                .on(
                    Method::Post,
                    endpoints::NEW_PATIENT_SAVE,
                    MockReply::ok("<html></html>")
                        .redirected_to("http://emr.test/interface/patient_file/summary/demographics.php?set_pid=88"),
                ),
        );
        assert_eq!(s.create_patient(&patient()).unwrap(), Pid(88));

        let posts = s.transport().posts_to(endpoints::NEW_PATIENT_SAVE);
        assert_eq!(posts[0].fields.get("csrf_token_form"), Some("tok-1"));
        assert_eq!(posts[0].fields.get("form_fname"), Some("Hoa"));
    }

    #[test]
    fn create_patient_falls_back_to_name_search() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::NEW_PATIENT_FORM, MockReply::ok(TOKEN_PAGE))
                .on(Method::Post, endpoints::NEW_PATIENT_SAVE, MockReply::ok("<p>done</p>"))
                .on(Method::Get, endpoints::PATIENT_SEARCH, MockReply::ok("<a href='x.php?pid=12'>")),
        );
        assert_eq!(s.create_patient(&patient()).unwrap(), Pid(12));

        let search = s
            .transport()
            .requests()
            .into_iter()
            .find(|r| r.path() == endpoints::PATIENT_SEARCH)
            .unwrap();
        assert!(search.query.contains(&("lname".to_string(), "Le".to_string())));
    }

    #[test]
    fn create_patient_without_any_pid_fails() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::NEW_PATIENT_FORM, MockReply::ok(TOKEN_PAGE))
                .on(Method::Post, endpoints::NEW_PATIENT_SAVE, MockReply::ok("<p>done</p>")),
        );
        assert!(matches!(
            s.create_patient(&patient()),
            Err(EmrError::IdentifierNotFound("patient"))
        ));
    }

    #[test]
    fn create_patient_rejects_server_error_page() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::NEW_PATIENT_FORM, MockReply::ok(TOKEN_PAGE))
                .on(
                    Method::Post,
                    endpoints::NEW_PATIENT_SAVE,
                    MockReply::ok("ERROR: query failed; pid: 5"),
                ),
        );
        assert!(matches!(s.create_patient(&patient()), Err(EmrError::ServerError(_))));
    }

    #[test]
    fn create_patient_rejects_non_200() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::NEW_PATIENT_FORM, MockReply::ok(TOKEN_PAGE))
                .on(Method::Post, endpoints::NEW_PATIENT_SAVE, MockReply::status(500)),
        );
        assert!(matches!(
            s.create_patient(&patient()),
            Err(EmrError::HttpStatus { status: 500, .. })
        ));
    }

    #[test]
    fn issue_submission_selects_patient_first() {
        let s = session(MockTransport::new().on(
            Method::Get,
            "/interface/patient_file/summary/add_edit_issue.php",
            MockReply::ok(TOKEN_PAGE),
        ));
        let problem = Problem {
            title: "Asthma".into(),
            ..Default::default()
        };
        s.add_problem(Pid(3), &problem, "2024-01-01").unwrap();

        let requests = s.transport().requests();
        assert_eq!(requests[0].path(), endpoints::PATIENT_SUMMARY);
        assert_eq!(requests[0].query, vec![("set_pid".to_string(), "3".to_string())]);
        let post = requests.last().unwrap();
        assert_eq!(post.method, Method::Post);
        assert!(post.url.ends_with("thistype=medical_problem"));
        assert_eq!(post.fields.get("form_title"), Some("Asthma"));
    }

    #[test]
    fn create_encounter_scrapes_id() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, "/interface/forms/newpatient/new.php", MockReply::ok(TOKEN_PAGE))
                .on(
                    Method::Post,
                    endpoints::ENCOUNTER_SAVE,
                    MockReply::ok("EncounterIdArray[Count] = 77;"),
                ),
        );
        let encounter: Encounter = serde_json::from_str(r#"{"date": "2024-05-01"}"#).unwrap();
        assert_eq!(s.create_encounter(Pid(1), &encounter).unwrap(), EncounterId(77));
    }

    #[test]
    fn create_encounter_without_id_fails() {
        let s = session(MockTransport::new().on(
            Method::Get,
            "/interface/forms/newpatient/new.php",
            MockReply::ok(TOKEN_PAGE),
        ));
        let encounter: Encounter = serde_json::from_str(r#"{"date": "2024-05-01"}"#).unwrap();
        assert!(matches!(
            s.create_encounter(Pid(1), &encounter),
            Err(EmrError::IdentifierNotFound("encounter"))
        ));
    }

    #[test]
    fn vitals_scrape_hidden_fields_and_report_unclear_save() {
        let form = r#"<input type="hidden" name="csrf_token_form" value="tok-v">
            <input type="hidden" name="id" value="">
            <input type="hidden" name="uuid" value="9f-uuid">"#;
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::VITALS_FORM, MockReply::ok(form))
                .on(Method::Post, endpoints::VITALS_SAVE, MockReply::ok("<html></html>")),
        );
        let vitals = Vitals {
            pulse: "64".into(),
            ..Default::default()
        };
        assert_eq!(
            s.add_vitals(Pid(2), EncounterId(10), &vitals).unwrap(),
            SaveAck::Unclear
        );

        let post = &s.transport().posts_to(endpoints::VITALS_SAVE)[0];
        assert_eq!(post.fields.get("csrf_token_form"), Some("tok-v"));
        assert_eq!(post.fields.get("uuid"), Some("9f-uuid"));
        assert_eq!(post.fields.get("pulse"), Some("64"));

        let encounter_select = s
            .transport()
            .requests()
            .into_iter()
            .find(|r| r.path() == endpoints::ENCOUNTER_TOP)
            .unwrap();
        assert_eq!(
            encounter_select.query,
            vec![("set_encounter".to_string(), "10".to_string())]
        );
    }

    #[test]
    fn labs_acknowledged_by_close_tab() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::OBSERVATION_FORM, MockReply::ok(TOKEN_PAGE))
                .on(
                    Method::Post,
                    endpoints::OBSERVATION_SAVE,
                    MockReply::ok("<script>closeTab();</script>"),
                ),
        );
        let labs = vec![LabResult {
            code: "718-7".into(),
            ..Default::default()
        }];
        assert_eq!(
            s.add_lab_results(Pid(2), EncounterId(10), &labs).unwrap(),
            SaveAck::Acknowledged
        );
        let post = &s.transport().posts_to(endpoints::OBSERVATION_SAVE)[0];
        assert!(post.url.ends_with("save.php?id=0"));
    }

    #[test]
    fn insurance_posts_to_demographics_form() {
        let s = session(MockTransport::new().on(
            Method::Get,
            endpoints::DEMOGRAPHICS_FULL,
            MockReply::ok(TOKEN_PAGE),
        ));
        let insurance = Insurance {
            provider: "Acme".into(),
            ..Default::default()
        };
        s.add_insurance(Pid(4), &insurance, CoverageRank::Primary).unwrap();
        let post = &s.transport().posts_to(endpoints::DEMOGRAPHICS_FULL)[0];
        assert_eq!(post.fields.get("form_i1provider"), Some("Acme"));
    }

    #[test]
    fn history_non_200_is_error() {
        let s = session(
            MockTransport::new()
                .on(Method::Get, endpoints::HISTORY_FULL, MockReply::ok(TOKEN_PAGE))
                .on(Method::Post, endpoints::HISTORY_FULL, MockReply::status(500)),
        );
        let history = History {
            alcohol: "Social".into(),
            ..Default::default()
        };
        assert!(matches!(
            s.update_history(Pid(4), &history),
            Err(EmrError::HttpStatus { status: 500, .. })
        ));
    }
}
