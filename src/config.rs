use std::path::PathBuf;

use reqwest::Url;
use thiserror::Error;

use crate::emr::{Credentials, EncounterSettings};

/// Application-level constants
pub const APP_NAME: &str = "openemr-import";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BASE_URL: &str = "http://localhost";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "pass";
pub const DEFAULT_INPUT_FILE: &str = "patients.jsonl";

/// Tracing filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "openemr_import_lib=info,openemr_import=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid OpenEMR URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Run configuration, resolved once at startup and passed into the session.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub credentials: Credentials,
    pub input_path: PathBuf,
    /// Local installs usually serve a self-signed certificate.
    pub accept_invalid_certs: bool,
    pub dump_dir: Option<PathBuf>,
    pub encounter: EncounterSettings,
}

impl ImportConfig {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        input_path: PathBuf,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            credentials,
            input_path,
            accept_invalid_certs: true,
            dump_dir: None,
            encounter: EncounterSettings::default(),
        })
    }
}

/// Validate an http(s) base URL and drop any trailing slash.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.query().is_some() {
        return Err(invalid("base URL must not carry a query".to_string()));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials {
            username: DEFAULT_USERNAME.into(),
            password: DEFAULT_PASSWORD.into(),
        }
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(normalize_base_url("http://localhost/").unwrap(), "http://localhost");
        assert_eq!(
            normalize_base_url("https://emr.example.org/openemr/").unwrap(),
            "https://emr.example.org/openemr"
        );
    }

    #[test]
    fn non_http_scheme_rejected() {
        assert!(matches!(
            normalize_base_url("ftp://emr.example.org"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(normalize_base_url("localhost without scheme").is_err());
        assert!(normalize_base_url("http://emr/?site=default").is_err());
    }

    #[test]
    fn new_config_defaults() {
        let config =
            ImportConfig::new(DEFAULT_BASE_URL, creds(), PathBuf::from(DEFAULT_INPUT_FILE)).unwrap();
        assert_eq!(config.base_url, "http://localhost");
        assert!(config.accept_invalid_certs);
        assert!(config.dump_dir.is_none());
        assert_eq!(config.encounter, EncounterSettings::default());
    }

    #[test]
    fn debug_output_hides_password() {
        let credentials = Credentials {
            username: "clerk".into(),
            password: "s3cr3t-value".into(),
        };
        let config =
            ImportConfig::new(DEFAULT_BASE_URL, credentials, PathBuf::from(DEFAULT_INPUT_FILE))
                .unwrap();
        assert!(!format!("{config:?}").contains("s3cr3t-value"));
    }

    #[test]
    fn app_name() {
        assert_eq!(APP_NAME, "openemr-import");
    }
}
