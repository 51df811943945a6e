//! Report sink
//!
//! Writes the aggregate as one JSON array, pretty-printed with tab
//! indentation. Write failures are reported, not retried; the caller still
//! holds the in-memory result and can surface it in diagnostics.

use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::info;

use crate::error::ReportError;
use crate::model::ScanResult;

/// Serializes `result` to tab-indented JSON.
pub fn to_pretty_json(result: &ScanResult) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    result.serialize(&mut ser)?;
    Ok(buf)
}

/// Persists the final aggregate to `path`.
pub async fn write_report(path: &Path, result: &ScanResult) -> Result<(), ReportError> {
    let body = to_pretty_json(result)?;

    tokio::fs::write(path, body)
        .await
        .map_err(|source| ReportError::Write {
            path: path.display().to_string(),
            source,
        })?;

    info!("wrote {} records to {}", result.len(), path.display());
    Ok(())
}
