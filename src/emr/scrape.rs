//! Regex scraping of served OpenEMR pages.
//!
//! Everything here depends on the EMR's current markup. Patterns accept
//! either quote style and any attributes between `name` and `value`.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{EncounterId, Pid};

static CSRF_NAME_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name=["']csrf_token_form["'][^>]*value=["']([^"']+)["']"#).unwrap()
});

static CSRF_VALUE_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"value=["']([a-f0-9]{64})["'][^>]*name=["']csrf_token_form["']"#).unwrap()
});

static PID_IN_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"pid=(\d+)").unwrap());

static PID_IN_BODY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r#"set_pid\s*=\s*["']?(\d+)["']?"#).unwrap(),
        Regex::new(r#"pid["']?\s*:\s*["']?(\d+)["']?"#).unwrap(),
        Regex::new(r#"patient_id["']?\s*=\s*["']?(\d+)["']?"#).unwrap(),
    ]
});

static PID_IN_SEARCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"pid["']?\s*[:=]\s*["']?(\d+)["']?"#).unwrap());

static ENCOUNTER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"EncounterIdArray\[Count\]\s*=\s*(\d+)").unwrap());

/// Longest excerpt of an error page kept for logs.
const ERROR_EXCERPT_CHARS: usize = 200;

/// Anti-forgery token embedded in a form page.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    CSRF_NAME_FIRST
        .captures(html)
        .or_else(|| CSRF_VALUE_FIRST.captures(html))
        .map(|c| c[1].to_string())
}

/// Value of a named input (`name="id" ... value=""`). Empty values are returned as-is.
pub fn extract_hidden_field(html: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r#"name=["']{}["'][^>]*value=["']([^"']*)["']"#,
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(html).map(|c| c[1].to_string())
}

/// Patient id of a freshly created patient: the redirect URL first, then the page script.
pub fn extract_pid(final_url: &str, html: &str) -> Option<Pid> {
    if let Some(pid) = first_number(&PID_IN_URL, final_url) {
        return Some(Pid(pid));
    }
    PID_IN_BODY
        .iter()
        .find_map(|re| first_number(re, html))
        .map(Pid)
}

/// First patient id on a search results page.
pub fn extract_search_pid(html: &str) -> Option<Pid> {
    first_number(&PID_IN_SEARCH, html).map(Pid)
}

/// Encounter id assigned by the new-encounter save script.
pub fn extract_encounter_id(html: &str) -> Option<EncounterId> {
    first_number(&ENCOUNTER_ID, html).map(EncounterId)
}

/// Whether a form save page reports success (tab close script or a "saved" notice).
pub fn is_save_acknowledged(html: &str) -> bool {
    html.contains("closeTab") || html.to_lowercase().contains("saved")
}

/// Leading excerpt of a page that reports `ERROR:`, if it does.
pub fn server_error(html: &str) -> Option<String> {
    if html.contains("ERROR:") {
        Some(html.chars().take(ERROR_EXCERPT_CHARS).collect())
    } else {
        None
    }
}

fn first_number(re: &Regex, haystack: &str) -> Option<u64> {
    re.captures(haystack).and_then(|c| c[1].parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "3f1c0b6a9e7d4c2b8a5f0e1d2c3b4a5968778695a4b3c2d1e0f9a8b7c6d5e4f3";

    #[test]
    fn csrf_name_before_value() {
        let html = r#"<input type="hidden" name="csrf_token_form" value="abc123">"#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("abc123"));
    }

    #[test]
    fn csrf_single_quotes() {
        let html = "<input type='hidden' name='csrf_token_form' value='xyz'/>";
        assert_eq!(extract_csrf_token(html).as_deref(), Some("xyz"));
    }

    #[test]
    fn csrf_value_before_name() {
        let html = format!(r#"<input type="hidden" value="{TOKEN}" name="csrf_token_form">"#);
        assert_eq!(extract_csrf_token(&html).as_deref(), Some(TOKEN));
    }

    #[test]
    fn csrf_value_before_name_requires_hex_token() {
        let html = r#"<input value="short" name="csrf_token_form">"#;
        assert_eq!(extract_csrf_token(html), None);
    }

    #[test]
    fn csrf_missing() {
        assert_eq!(extract_csrf_token("<form><input name='other' value='x'></form>"), None);
    }

    #[test]
    fn hidden_field_allows_empty_value() {
        let html = r#"<input type="hidden" name="id" value=""><input type="hidden" name="uuid" value="u-1">"#;
        assert_eq!(extract_hidden_field(html, "id").as_deref(), Some(""));
        assert_eq!(extract_hidden_field(html, "uuid").as_deref(), Some("u-1"));
        assert_eq!(extract_hidden_field(html, "missing"), None);
    }

    #[test]
    fn pid_from_redirect_url() {
        let pid = extract_pid(
            "http://emr/interface/patient_file/summary/demographics.php?set_pid=17&pid=17",
            "",
        );
        assert_eq!(pid, Some(Pid(17)));
    }

    #[test]
    fn pid_from_body_patterns() {
        assert_eq!(extract_pid("http://emr/x.php", "top.set_pid = '23';"), Some(Pid(23)));
        assert_eq!(extract_pid("http://emr/x.php", r#"{"pid": "31"}"#), Some(Pid(31)));
        assert_eq!(extract_pid("http://emr/x.php", "patient_id = 44"), Some(Pid(44)));
        assert_eq!(extract_pid("http://emr/x.php", "<p>nothing</p>"), None);
    }

    #[test]
    fn search_pid() {
        assert_eq!(extract_search_pid("<tr id='pid=12'>"), Some(Pid(12)));
        assert_eq!(extract_search_pid("no results"), None);
    }

    #[test]
    fn encounter_id() {
        let html = "EncounterIdArray[Count] = 1005;\nCount++;";
        assert_eq!(extract_encounter_id(html), Some(EncounterId(1005)));
        assert_eq!(extract_encounter_id("<html></html>"), None);
    }

    #[test]
    fn save_acknowledgement() {
        assert!(is_save_acknowledged("<script>dlgclose(); closeTab();</script>"));
        assert!(is_save_acknowledged("Vitals SAVED"));
        assert!(!is_save_acknowledged("<html>form</html>"));
    }

    #[test]
    fn server_error_excerpt_is_bounded() {
        let page = format!("ERROR: duplicate entry {}", "é".repeat(500));
        let excerpt = server_error(&page).unwrap();
        assert!(excerpt.starts_with("ERROR:"));
        assert_eq!(excerpt.chars().count(), ERROR_EXCERPT_CHARS);
        assert_eq!(server_error("ok"), None);
    }
}
