use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use openemr_import_lib::config::{self, ImportConfig};
use openemr_import_lib::diagnostic::DumpDir;
use openemr_import_lib::emr::{Credentials, EmrSession, EncounterSettings, HttpTransport, LoginState};
use openemr_import_lib::importer::Importer;
use openemr_import_lib::loader::{self, LoaderError};

const RULE: &str = "============================================================";

#[derive(Parser)]
#[command(name = "openemr-import", version)]
#[command(about = "Import JSON-lines patient records into OpenEMR through its web forms")]
struct Cli {
    /// Patient file, one JSON object per line (default: patients.jsonl next to the binary)
    input: Option<PathBuf>,

    /// OpenEMR base URL
    #[arg(long, env = "OPENEMR_URL", default_value = config::DEFAULT_BASE_URL)]
    url: String,

    /// Login user
    #[arg(long, env = "OPENEMR_USER", default_value = config::DEFAULT_USERNAME)]
    user: String,

    /// Login password
    #[arg(long, env = "OPENEMR_PASSWORD", default_value = config::DEFAULT_PASSWORD, hide_env_values = true)]
    password: String,

    /// Verify the server's TLS certificate
    #[arg(long)]
    verify_tls: bool,

    /// Write fetched form pages here for debugging
    #[arg(long, env = "OPENEMR_DUMP_DIR")]
    dump_dir: Option<PathBuf>,

    /// Encounter visit category id
    #[arg(long, default_value_t = 5)]
    category_id: u32,

    /// Encounter provider id
    #[arg(long, default_value_t = 1)]
    provider_id: u32,

    /// Encounter facility id
    #[arg(long, default_value_t = 3)]
    facility_id: u32,
}

impl Cli {
    fn into_config(self) -> Result<ImportConfig, config::ConfigError> {
        let credentials = Credentials {
            username: self.user,
            password: self.password,
        };
        let input_path = self.input.unwrap_or_else(loader::default_input_path);

        let mut config = ImportConfig::new(&self.url, credentials, input_path)?;
        config.accept_invalid_certs = !self.verify_tls;
        config.dump_dir = self.dump_dir;
        config.encounter = EncounterSettings {
            category_id: self.category_id.to_string(),
            provider_id: self.provider_id.to_string(),
            facility_id: self.facility_id.to_string(),
        };
        Ok(config)
    }
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let config = Cli::parse().into_config()?;
    openemr_import_lib::init_tracing();

    println!("{RULE}");
    println!("  OpenEMR Patient Import & Enrichment");
    println!("  With Longitudinal Data Support");
    println!("{RULE}");

    println!("\nLoading patient data from JSONL file...");
    let loaded = match loader::load_patients(&config.input_path) {
        Ok(loaded) => loaded,
        Err(LoaderError::NotFound(path)) => {
            println!("  ✗ Patient file not found: {}", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };
    for rejected in &loaded.rejected {
        println!("  ✗ Error parsing line {}: {}", rejected.line, rejected.message);
    }
    if loaded.records.is_empty() {
        println!("No patients to import. Check {}.", config.input_path.display());
        return Ok(ExitCode::FAILURE);
    }
    println!(
        "  ✓ Loaded {} patient(s) from {}",
        loaded.records.len(),
        config
            .input_path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| config.input_path.to_string_lossy())
    );

    println!("\nInitializing Web Session...");
    let transport = HttpTransport::new(&config.base_url, config.accept_invalid_certs)?;
    let dump = config.dump_dir.as_deref().and_then(DumpDir::create);
    let session = EmrSession::new(transport, &config.base_url, config.credentials.clone())
        .with_encounter_settings(config.encounter.clone())
        .with_dump_dir(dump);

    println!("Logging in...");
    match session.login() {
        Ok(LoginState::Authenticated) => println!("  ✓ Web login successful"),
        Ok(LoginState::CookieMissing(cookies)) => {
            println!("  ! Login may have failed. Cookies: {cookies:?}")
        }
        Err(e) => {
            println!("  ✗ {e}");
            println!("Failed to login!");
            return Ok(ExitCode::FAILURE);
        }
    }

    println!("\nStarting import of {} patient(s)...", loaded.records.len());
    println!("Each patient includes: demographics, problems, medications,");
    println!("allergies, history, insurance, and longitudinal encounters.\n");

    let importer = Importer::new(&session, chrono::Local::now().naive_local());
    let summary = importer.import_all(&loaded.records);
    summary.print();

    Ok(ExitCode::SUCCESS)
}
