//! Document-to-text conversion.
//!
//! The pipeline only needs `path -> text`; [`CommandConverter`] provides that
//! by running an external tool such as `pdftotext` and reading its stdout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{LaqError, Result};

/// Placeholder in [`CommandConverter`] arguments replaced by the input path.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Converts a document on disk to plain text or markdown.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Convert the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LaqError::Conversion`] for unreadable or corrupt input.
    async fn convert(&self, path: &Path) -> Result<String>;
}

/// Check that `path` names a readable, non-empty PDF no larger than
/// `max_bytes`.
///
/// # Errors
///
/// Returns [`LaqError::FileValidation`] describing the first problem found.
pub async fn validate_document_file(path: &Path, max_bytes: u64) -> Result<()> {
    let reject = |reason: String| LaqError::FileValidation { path: path.to_path_buf(), reason };

    let meta = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => reject("file not found".to_string()),
        _ => reject(format!("cannot read file: {e}")),
    })?;

    if !meta.is_file() {
        return Err(reject("not a regular file".to_string()));
    }

    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(reject("expected a .pdf file".to_string()));
    }

    if meta.len() == 0 {
        return Err(reject("file is empty".to_string()));
    }
    if meta.len() > max_bytes {
        return Err(reject(format!(
            "file is {} bytes, larger than the {max_bytes} byte limit",
            meta.len()
        )));
    }
    Ok(())
}

/// A [`DocumentConverter`] that shells out to an external program.
///
/// The default is `pdftotext -layout {input} -`, which writes the text of
/// the PDF to stdout.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl Default for CommandConverter {
    fn default() -> Self {
        Self::pdftotext("pdftotext")
    }
}

impl CommandConverter {
    /// Run `program` with `args`; any argument equal to [`INPUT_PLACEHOLDER`]
    /// is replaced by the document path.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    /// A `pdftotext`-compatible invocation of `program`.
    pub fn pdftotext(program: impl Into<String>) -> Self {
        Self::new(
            program,
            vec!["-layout".to_string(), INPUT_PLACEHOLDER.to_string(), "-".to_string()],
        )
    }

    fn command_args(&self, path: &Path) -> Vec<PathBuf> {
        self.args
            .iter()
            .map(|arg| if arg == INPUT_PLACEHOLDER { path.to_path_buf() } else { PathBuf::from(arg) })
            .collect()
    }
}

#[async_trait]
impl DocumentConverter for CommandConverter {
    async fn convert(&self, path: &Path) -> Result<String> {
        let conversion = |message: String| LaqError::Conversion { path: path.to_path_buf(), message };

        debug!(program = %self.program, path = %path.display(), "converting document");
        let output =
            Command::new(&self.program).args(self.command_args(path)).output().await.map_err(
                |e| {
                    error!(program = %self.program, error = %e, "failed to start converter");
                    conversion(format!("cannot run '{}': {e}", self.program))
                },
            )?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(program = %self.program, status = %output.status, "converter failed");
            return Err(conversion(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(conversion("no text could be extracted".to_string()));
        }

        info!(path = %path.display(), chars = text.chars().count(), "converted document");
        Ok(text)
    }
}
