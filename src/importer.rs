//! Import orchestrator: replays the form sequence for each patient record.
//!
//! Patient creation gates everything else for a record. Every later step
//! is independent: a failure is reported and the import moves on.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::emr::{EmrError, EmrSession, EmrTransport, SaveAck};
use crate::models::{CoverageRank, Encounter, LabResult, PatientRecord, Pid};

const RULE: &str = "============================================================";

/// Default begin dates for issues whose record leaves them out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDates {
    /// 90 days before the run, `YYYY-MM-DD`.
    pub problem_begin: String,
    /// 7 days before the run, `YYYY-MM-DD HH:MM`.
    pub medication_begin: String,
    /// Day of the run, `YYYY-MM-DD`.
    pub allergy_begin: String,
}

impl IssueDates {
    pub fn from_now(now: NaiveDateTime) -> Self {
        Self {
            problem_begin: (now - Duration::days(90)).format("%Y-%m-%d").to_string(),
            medication_begin: (now - Duration::days(7)).format("%Y-%m-%d %H:%M").to_string(),
            allergy_begin: now.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Sub-step counts for one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepTally {
    pub submitted: u32,
    pub failed: u32,
}

impl StepTally {
    fn record<T>(&mut self, result: &Result<T, EmrError>) {
        match result {
            Ok(_) => self.submitted += 1,
            Err(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientOutcome {
    pub name: String,
    /// `None` when patient creation failed and the record was skipped.
    pub pid: Option<Pid>,
    pub steps: StepTally,
}

/// Final tally of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub succeeded: Vec<(String, Pid)>,
    pub failed: Vec<String>,
    pub total_problems: usize,
    pub total_medications: usize,
    pub total_encounters: usize,
}

impl ImportSummary {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\n{RULE}\n  IMPORT SUMMARY\n{RULE}\n"));
        out.push_str(&format!("  Successful: {}\n", self.succeeded.len()));
        for (name, pid) in &self.succeeded {
            out.push_str(&format!("    - {name} (PID: {pid})\n"));
        }
        if !self.failed.is_empty() {
            out.push_str(&format!("  Failed: {}\n", self.failed.len()));
            for name in &self.failed {
                out.push_str(&format!("    - {name}\n"));
            }
        }
        out.push_str("\n  Data imported:\n");
        out.push_str(&format!("    - {} medical problems\n", self.total_problems));
        out.push_str(&format!("    - {} medications\n", self.total_medications));
        out.push_str(&format!("    - {} encounters with vitals\n", self.total_encounters));
        out
    }

    pub fn print(&self) {
        println!("{}", self.render());
        println!("  Import Complete!");
    }
}

/// Drives one authenticated session through a list of records.
pub struct Importer<'a, T: EmrTransport> {
    session: &'a EmrSession<T>,
    dates: IssueDates,
}

impl<'a, T: EmrTransport> Importer<'a, T> {
    pub fn new(session: &'a EmrSession<T>, now: NaiveDateTime) -> Self {
        Self {
            session,
            dates: IssueDates::from_now(now),
        }
    }

    /// Import every record in order and tally the results.
    pub fn import_all(&self, records: &[PatientRecord]) -> ImportSummary {
        let mut summary = ImportSummary::default();

        for record in records {
            let outcome = self.import_patient(record);
            let name = record.demographics.short_name();
            match outcome.pid {
                Some(pid) => summary.succeeded.push((name, pid)),
                None => summary.failed.push(name),
            }
            summary.total_problems += record.problems.len();
            summary.total_medications += record.medications.len();
            summary.total_encounters += record.encounters.len();
        }

        tracing::info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "Import finished"
        );
        summary
    }

    /// Create one patient and attach everything in their record.
    pub fn import_patient(&self, record: &PatientRecord) -> PatientOutcome {
        let full_name = record.demographics.full_name();
        println!("\n{RULE}\nProcessing: {full_name}\n{RULE}");

        let mut steps = StepTally::default();

        println!("  Creating patient record...");
        let pid = match self.session.create_patient(&record.demographics) {
            Ok(pid) => {
                println!("    ✓ Created Patient: {} (PID: {pid})", record.demographics.short_name());
                pid
            }
            Err(e) => {
                tracing::warn!(patient = %full_name, error = %e, "Patient creation failed");
                println!("    ✗ {e}");
                println!("  ✗ Failed to create patient, skipping medical history");
                return PatientOutcome {
                    name: full_name,
                    pid: None,
                    steps,
                };
            }
        };

        self.add_problems(pid, record, &mut steps);
        self.add_medications(pid, record, &mut steps);
        self.add_allergies(pid, record, &mut steps);
        self.update_history(pid, record, &mut steps);
        self.add_insurance(pid, record, &mut steps);
        self.add_encounters(pid, record, &mut steps);

        println!(
            "  ✓ Completed: {full_name} (PID: {pid}, {} step(s) submitted, {} failed)",
            steps.submitted, steps.failed
        );
        PatientOutcome {
            name: full_name,
            pid: Some(pid),
            steps,
        }
    }

    fn add_problems(&self, pid: Pid, record: &PatientRecord, steps: &mut StepTally) {
        if record.problems.is_empty() {
            return;
        }
        println!("  Adding {} problem(s)...", record.problems.len());
        for problem in &record.problems {
            let begin = problem.begin.as_deref().unwrap_or(&self.dates.problem_begin);
            let result = self.session.add_problem(pid, problem, begin);
            report(&result, || format!("Added Problem: {}", problem.title), "Problem");
            steps.record(&result);
        }
    }

    fn add_medications(&self, pid: Pid, record: &PatientRecord, steps: &mut StepTally) {
        if record.medications.is_empty() {
            return;
        }
        println!("  Adding {} medication(s)...", record.medications.len());
        for medication in &record.medications {
            let begin = medication
                .begin
                .as_deref()
                .unwrap_or(&self.dates.medication_begin);
            let result = self.session.add_medication(pid, medication, begin);
            report(&result, || format!("Added Medication: {}", medication.title), "Medication");
            steps.record(&result);
        }
    }

    fn add_allergies(&self, pid: Pid, record: &PatientRecord, steps: &mut StepTally) {
        if record.allergies.is_empty() {
            return;
        }
        println!("  Adding {} allergy(ies)...", record.allergies.len());
        for allergy in &record.allergies {
            let begin = allergy.begin.as_deref().unwrap_or(&self.dates.allergy_begin);
            let result = self.session.add_allergy(pid, allergy, begin);
            report(&result, || format!("Added Allergy: {}", allergy.title), "Allergy");
            steps.record(&result);
        }
    }

    fn update_history(&self, pid: Pid, record: &PatientRecord, steps: &mut StepTally) {
        let Some(history) = record.history() else {
            return;
        };
        println!("  Updating medical/social history...");
        let result = self.session.update_history(pid, history);
        report(&result, || "Updated Medical/Social History".to_string(), "History");
        steps.record(&result);
    }

    fn add_insurance(&self, pid: Pid, record: &PatientRecord, steps: &mut StepTally) {
        let policies = record.policies();
        if policies.is_empty() {
            return;
        }
        println!("  Adding insurance information...");
        for (index, insurance) in policies {
            let Some(rank) = CoverageRank::from_index(index) else {
                tracing::warn!(pid = %pid, index, "Only three insurance policies fit; ignoring the rest");
                break;
            };
            let result = self.session.add_insurance(pid, insurance, rank);
            report(
                &result,
                || format!("Added {} Insurance: {}", rank.label(), insurance.provider),
                "Insurance",
            );
            steps.record(&result);
        }
    }

    fn add_encounters(&self, pid: Pid, record: &PatientRecord, steps: &mut StepTally) {
        if record.encounters.is_empty() {
            return;
        }
        println!(
            "  Creating {} encounter(s) with vitals/labs...",
            record.encounters.len()
        );
        for encounter in &record.encounters {
            self.add_encounter(pid, encounter, steps);
        }
    }

    /// Vitals and labs attach to the encounter, so both need its id.
    fn add_encounter(&self, pid: Pid, encounter: &Encounter, steps: &mut StepTally) {
        let result = self.session.create_encounter(pid, encounter);
        steps.record(&result);
        let encounter_id = match result {
            Ok(id) => {
                println!(
                    "      ✓ Created Encounter: {} - {} (ID: {id})",
                    encounter.date, encounter.reason
                );
                id
            }
            Err(EmrError::IdentifierNotFound(_)) => {
                println!("      ? Encounter may have been created but couldn't confirm ID");
                return;
            }
            Err(e) => {
                tracing::warn!(pid = %pid, date = %encounter.date, error = %e, "Encounter failed");
                println!("      ✗ Encounter error: {e}");
                return;
            }
        };

        if let Some(vitals) = &encounter.vitals {
            let result = self.session.add_vitals(pid, encounter_id, vitals);
            match &result {
                Ok(SaveAck::Acknowledged) => {
                    println!("        ✓ Added Vitals: {}", vitals.summary())
                }
                Ok(SaveAck::Unclear) => println!("        ? Vitals submitted but response unclear"),
                Err(e) => println!("        ✗ Failed Vitals: {e}"),
            }
            steps.record(&result);
        }

        if !encounter.labs.is_empty() {
            let result = self.session.add_lab_results(pid, encounter_id, &encounter.labs);
            match &result {
                Ok(SaveAck::Acknowledged) => println!(
                    "        ✓ Added {} Lab Result(s): {}...",
                    encounter.labs.len(),
                    lab_names(&encounter.labs)
                ),
                Ok(SaveAck::Unclear) => {
                    println!("        ? Lab results submitted but response unclear")
                }
                Err(e) => println!("        ✗ Failed Lab Results: {e}"),
            }
            steps.record(&result);
        }
    }
}

/// Print the progress line for an issue-level step.
fn report(result: &Result<(), EmrError>, success: impl FnOnce() -> String, label: &str) {
    match result {
        Ok(()) => println!("      ✓ {}", success()),
        Err(e) => {
            tracing::warn!(step = label, error = %e, "Submission failed");
            println!("      ✗ Failed {label}: {e}");
        }
    }
}

/// First three lab descriptions, each cut to 20 characters.
fn lab_names(labs: &[LabResult]) -> String {
    labs.iter()
        .take(3)
        .map(|lab| {
            if lab.description.is_empty() {
                "Unknown".to_string()
            } else {
                lab.description.chars().take(20).collect()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
