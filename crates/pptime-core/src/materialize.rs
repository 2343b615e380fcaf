//! Turning a [`ReportBook`] into a stored report
//!
//! The materializer names the file after the current local time, hands the
//! book to a [`DocumentWriter`] and records the result in a [`ReportStore`].
//! Nothing is recorded unless the document was written, and an existing
//! file is never overwritten.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use crate::{DocumentWriter, ReportArtifact, ReportBook, ReportComment, ReportError, ReportStore};

pub const DEFAULT_FILE_PREFIX: &str = "time_report";
pub const DEFAULT_EXTENSION: &str = "xlsx";

/// `{prefix}_{YYYY-MM-DD-HH-MM-SS}.{extension}`
pub fn report_file_name(prefix: &str, extension: &str, at: NaiveDateTime) -> String {
    format!("{}_{}.{}", prefix, at.format("%Y-%m-%d-%H-%M-%S"), extension)
}

/// Writes report documents into one directory and records them
#[derive(Debug)]
pub struct ReportMaterializer<W, S> {
    writer: W,
    store: S,
    output_dir: PathBuf,
    prefix: String,
    extension: String,
}

impl<W: DocumentWriter, S: ReportStore> ReportMaterializer<W, S> {
    pub fn new(writer: W, store: S, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            store,
            output_dir: output_dir.into(),
            prefix: DEFAULT_FILE_PREFIX.into(),
            extension: DEFAULT_EXTENSION.into(),
        }
    }

    /// Set the file-name prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the file extension (without dot)
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Write `book` stamped with the current local time and record it
    pub fn materialize(
        &mut self,
        book: &ReportBook,
        comment: &ReportComment,
    ) -> Result<ReportArtifact, ReportError> {
        self.materialize_at(book, comment, Local::now().naive_local())
    }

    /// Write `book` stamped with `at` and record it
    pub fn materialize_at(
        &mut self,
        book: &ReportBook,
        comment: &ReportComment,
        at: NaiveDateTime,
    ) -> Result<ReportArtifact, ReportError> {
        book.validate()?;
        fs::create_dir_all(&self.output_dir)?;

        let path = self
            .output_dir
            .join(report_file_name(&self.prefix, &self.extension, at));
        if path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )
            .into());
        }
        self.writer.write(book, &path)?;

        let file_path = path.to_string_lossy();
        match self.store.record(&file_path, comment.as_str()) {
            Ok(artifact) => {
                info!(
                    report_id = artifact.id,
                    path = %artifact.file_path,
                    sheets = book.views.len(),
                    "report materialized"
                );
                Ok(artifact)
            }
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&path) {
                    warn!(path = %file_path, error = %remove_err, "could not remove unrecorded report");
                }
                Err(err.into())
            }
        }
    }
}
