//! Report rendering
//!
//! Four renderers over one immutable `AssessmentResult`: a multi-sheet
//! spreadsheet, a flat delimited export, an 80-column text summary and
//! a structured JSON dump. Renderers are pure functions of the result,
//! and the result carries its own generation timestamp, so rendering
//! the same result twice yields identical bytes in every format.

pub mod delimited;
pub mod spreadsheet;
pub mod structured;
pub mod summary;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::models::AssessmentResult;

/// Report output format
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Multi-sheet workbook with sales and technical views (`.xlsx`)
    Spreadsheet,
    /// Flat cost-line export for analysis tooling (`.csv`)
    DelimitedText,
    /// Human-readable 80-column text report (`.txt`)
    Summary,
    /// Full assessment result as pretty-printed JSON (`.json`)
    StructuredData,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 4] = [
        ReportFormat::Spreadsheet,
        ReportFormat::DelimitedText,
        ReportFormat::Summary,
        ReportFormat::StructuredData,
    ];

    /// Artifact file name for this format
    pub fn file_name(&self) -> &'static str {
        match self {
            ReportFormat::Spreadsheet => "assessment_report.xlsx",
            ReportFormat::DelimitedText => "assessment_report.csv",
            ReportFormat::Summary => "assessment_report.txt",
            ReportFormat::StructuredData => "assessment_report.json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReportFormat::Spreadsheet => "spreadsheet",
            ReportFormat::DelimitedText => "delimited_text",
            ReportFormat::Summary => "summary",
            ReportFormat::StructuredData => "structured_data",
        };
        write!(f, "{name}")
    }
}

/// Render one report format from an assessment result
pub fn render(result: &AssessmentResult, format: ReportFormat) -> Result<Vec<u8>, ReportError> {
    match format {
        ReportFormat::Spreadsheet => spreadsheet::render(result),
        ReportFormat::DelimitedText => delimited::render(result),
        ReportFormat::Summary => summary::render(result),
        ReportFormat::StructuredData => structured::render(result),
    }
}
