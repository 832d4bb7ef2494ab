//! Blendshape export

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::endpoints::ExportBlendshapes;
use crate::error::{A2fError, IoErrorExt, Result};
use crate::gateway::Gateway;

/// File formats the exporter can write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Usd,
    Json,
}

impl ExportFormat {
    /// `Json` for a `.json` extension (any case), `Usd` otherwise
    pub fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Usd,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the server said about an export request.
///
/// The path is always the file the server was asked to write, whether or not
/// it confirmed the export. It is `<dir>/<stem>.usd` or `<dir>/<stem>.json`,
/// which differs from the requested output when that has another extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub confirmed: bool,
    pub message: Option<String>,
}

impl ExportOutcome {
    /// Fail unless the server confirmed the export
    pub fn into_result(self) -> Result<PathBuf> {
        if self.confirmed {
            Ok(self.path)
        } else {
            Err(A2fError::ExportReportedFailure {
                message: self
                    .message
                    .unwrap_or_else(|| "no status reported".to_string()),
                path: self.path,
            })
        }
    }
}

/// Export the solver's blendshape animation to `output`.
///
/// The output directory is created if needed. The format follows the
/// extension of `output`, and the server appends it to the file stem, so
/// `take.anim` and `take` are both written as `take.usd`. The outcome carries
/// that rewritten path. A rejected or unanswered export is logged and
/// reported through the outcome.
///
/// # Errors
/// Only local filesystem failures.
pub async fn export_blendshapes<G: Gateway>(
    gateway: &G,
    solver: &str,
    output: &Path,
    fps: u32,
) -> Result<ExportOutcome> {
    let output = std::path::absolute(output).with_path(output)?;
    let directory = output.parent().map(Path::to_path_buf).unwrap_or_default();
    tokio::fs::create_dir_all(&directory)
        .await
        .with_path(&directory)?;

    let format = ExportFormat::from_path(&output);
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = directory.join(format!("{stem}.{format}"));

    info!(path = %path.display(), fps, "export blendshapes");
    let result = gateway
        .send(&ExportBlendshapes {
            solver,
            export_directory: &directory.to_string_lossy(),
            file_name: &stem,
            format: format.as_str(),
            fps,
        })
        .await;

    let status_ok = result
        .status()
        .is_some_and(|status| !status.eq_ignore_ascii_case("ERROR"));
    let outcome = ExportOutcome {
        path,
        confirmed: status_ok,
        message: (!status_ok).then(|| result.failure_reason()),
    };

    if !outcome.confirmed {
        warn!(
            path = %outcome.path.display(),
            reason = outcome.message.as_deref().unwrap_or_default(),
            "export failed"
        );
    }
    Ok(outcome)
}
