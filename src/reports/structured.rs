//! Structured-data report: the full result as pretty-printed JSON
//!
//! Nothing is summarized or dropped; this is the machine-readable twin of
//! the other formats and the one integrations should parse.

use crate::error::ReportError;
use crate::models::AssessmentResult;

pub fn render(result: &AssessmentResult) -> Result<Vec<u8>, ReportError> {
    let mut bytes = serde_json::to_vec_pretty(result)?;
    bytes.push(b'\n');
    Ok(bytes)
}
