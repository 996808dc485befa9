// Export documents and report files

use crate::models::{TestResult, Verdict};
use crate::results::{ResultFilter, ResultStore};
use chrono::Local;
use serde::Serialize;
use std::fs::File;
use std::io::Write;

/// Tool tag embedded in every export.
pub const TOOL_TAG: &str = concat!("AuthMatrix ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportScope {
    All,
    Filtered,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedResult {
    pub endpoint: String,
    pub method: String,
    pub role: String,
    pub status: u16,
    pub verdict: Verdict,
    pub details: String,
}

impl From<&TestResult> for ExportedResult {
    fn from(result: &TestResult) -> Self {
        Self {
            endpoint: result.endpoint.clone(),
            method: result.method.clone(),
            role: result.role.clone(),
            status: result.status,
            verdict: result.verdict,
            details: result.details.clone(),
        }
    }
}

/// The single structured record exposed to the surrounding application.
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub tool: String,
    pub baseline_role: Option<String>,
    pub export_type: ExportScope,
    pub total: usize,
    pub vulnerabilities: usize,
    pub results: Vec<ExportedResult>,
}

/// Build an export over `results` (already in production order).
pub fn build_export(
    results: &[TestResult],
    baseline_role: Option<String>,
    export_type: ExportScope,
) -> ExportDocument {
    let exported: Vec<ExportedResult> = results.iter().map(ExportedResult::from).collect();
    let vulnerabilities = exported
        .iter()
        .filter(|r| r.verdict == Verdict::Vulnerable)
        .count();
    ExportDocument {
        tool: TOOL_TAG.to_string(),
        baseline_role,
        export_type,
        total: exported.len(),
        vulnerabilities,
        results: exported,
    }
}

/// Export everything, or just the subset matching `filter`.
pub fn export_results(
    store: &ResultStore,
    baseline_role: Option<String>,
    filter: Option<&ResultFilter>,
) -> ExportDocument {
    match filter {
        Some(filter) => build_export(&store.filtered(filter), baseline_role, ExportScope::Filtered),
        None => build_export(&store.all(), baseline_role, ExportScope::All),
    }
}

/// Write the export as pretty JSON to a timestamped file, returning the name.
pub fn write_json_report(document: &ExportDocument) -> std::io::Result<String> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!("authmatrix_report_{}.json", timestamp);
    write_json_report_to(document, &filename)?;
    Ok(filename)
}

/// Write the export as pretty JSON to `path`.
pub fn write_json_report_to(document: &ExportDocument, path: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    let json = serde_json::to_string_pretty(document)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}
