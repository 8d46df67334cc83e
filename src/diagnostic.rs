//! Diagnostic dump: writes served pages to disk for markup debugging.
//!
//! Scraping breaks silently when the EMR's markup changes, so the raw form
//! and save pages can be kept for inspection.
//!
//! **Activation**: disabled unless `--dump-dir` / `OPENEMR_DUMP_DIR` is set.
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{run_id}/
//!   001-new-patient-form.html
//!   002-new-patient-save.html
//!   ...
//! ```

use std::cell::Cell;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Per-run dump directory with a sequence counter so pages never overwrite.
#[derive(Debug)]
pub struct DumpDir {
    dir: PathBuf,
    seq: Cell<u32>,
}

impl DumpDir {
    /// Create `{base}/{run_id}/`.
    ///
    /// Returns `None` (with a warning) if the directory cannot be created;
    /// a broken dump location never stops an import.
    pub fn create(base: &Path) -> Option<Self> {
        let dir = base.join(Uuid::new_v4().to_string());

        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Diagnostic dump: failed to create directory"
            );
            return None;
        }

        tracing::info!(path = %dir.display(), "Diagnostic dump enabled");
        Some(Self {
            dir,
            seq: Cell::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write a page under the next sequence number. Never panics.
    pub fn dump_html(&self, label: &str, html: &str) {
        let seq = self.seq.get() + 1;
        self.seq.set(seq);

        let path = self.dir.join(format!("{seq:03}-{label}.html"));
        match std::fs::write(&path, html.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = html.len(),
                "Diagnostic dump: page written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to write page"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_run_directory_under_base() {
        let base = tempfile::tempdir().unwrap();
        let dump = DumpDir::create(base.path()).unwrap();
        assert!(dump.path().starts_with(base.path()));
        assert!(dump.path().is_dir());
    }

    #[test]
    fn pages_are_numbered_in_order() {
        let base = tempfile::tempdir().unwrap();
        let dump = DumpDir::create(base.path()).unwrap();
        dump.dump_html("new-patient-form", "<form></form>");
        dump.dump_html("new-patient-save", "<p>ok</p>");

        let first = dump.path().join("001-new-patient-form.html");
        let second = dump.path().join("002-new-patient-save.html");
        assert_eq!(std::fs::read_to_string(first).unwrap(), "<form></form>");
        assert_eq!(std::fs::read_to_string(second).unwrap(), "<p>ok</p>");
    }

    #[test]
    fn unwritable_base_disables_dump() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        assert!(DumpDir::create(&file).is_none());
    }
}
