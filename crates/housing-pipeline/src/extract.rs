//! Extractor stage: materialize the raw dataset as a local table.
//!
//! The source bytes are checked to parse as a table and then written out
//! verbatim; no values are transformed here.

use crate::error::{PipelineError, Result, ResultExt};
use crate::table::{ensure_parent_dir, read_table_from_bytes};
use crate::tracking::RunContext;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Where the raw dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// A file on the local filesystem.
    File(PathBuf),
    /// An `http://` or `https://` URL fetched with a blocking GET.
    Url(String),
}

impl DatasetSource {
    /// Identifier used in logs and errors.
    pub fn id(&self) -> String {
        match self {
            DatasetSource::File(path) => path.display().to_string(),
            DatasetSource::Url(url) => url.clone(),
        }
    }

    /// Read the full byte stream of the source.
    pub fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            DatasetSource::File(path) => {
                std::fs::read(path).map_err(|e| PipelineError::SourceUnavailable {
                    source_id: self.id(),
                    reason: e.to_string(),
                })
            }
            DatasetSource::Url(url) => fetch_url(url),
        }
    }
}

impl FromStr for DatasetSource {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "dataset source must not be empty".to_string(),
            ));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(DatasetSource::Url(s.to_string()));
        }
        let path = s.strip_prefix("file://").unwrap_or(s);
        Ok(DatasetSource::File(PathBuf::from(path)))
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

#[cfg(feature = "remote")]
fn fetch_url(url: &str) -> Result<Vec<u8>> {
    let unavailable = |reason: String| PipelineError::SourceUnavailable {
        source_id: url.to_string(),
        reason,
    };

    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| unavailable(e.to_string()))?;
    let bytes = response.bytes().map_err(|e| unavailable(e.to_string()))?;
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "remote"))]
fn fetch_url(url: &str) -> Result<Vec<u8>> {
    Err(PipelineError::SourceUnavailable {
        source_id: url.to_string(),
        reason: "built without the `remote` feature".to_string(),
    })
}

/// Summary of an extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractReport {
    pub rows: usize,
    pub columns: usize,
    pub bytes: usize,
}

/// Fetch `source` and write it to `output`, registering the file as an
/// artifact.
///
/// # Errors
///
/// - [`PipelineError::SourceUnavailable`] if the source cannot be read
/// - [`PipelineError::Schema`] if the bytes are not a table with a header
pub fn extract(source: &DatasetSource, output: &Path, ctx: &mut RunContext) -> Result<ExtractReport> {
    info!("Extracting dataset from {}", source);

    // Read everything before writing, so `output` may be the source itself.
    let bytes = source.fetch()?;
    debug!("Fetched {} bytes from {}", bytes.len(), source);

    let df = read_table_from_bytes(&bytes).map_err(|e| {
        PipelineError::Schema(format!("source '{}' is not a readable table: {}", source, e))
    })?;
    if df.width() == 0 {
        return Err(PipelineError::Schema(format!(
            "source '{}' has no columns",
            source
        )));
    }

    ensure_parent_dir(output)?;
    std::fs::write(output, &bytes).context(format!("Writing '{}'", output.display()))?;
    ctx.log_artifact(output);

    let report = ExtractReport {
        rows: df.height(),
        columns: df.width(),
        bytes: bytes.len(),
    };
    info!(
        "Dataset saved to {} ({} rows, {} columns)",
        output.display(),
        report.rows,
        report.columns
    );
    Ok(report)
}
