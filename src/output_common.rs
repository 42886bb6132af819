//! Shared CLI rendering helpers.

use crate::output::OutputFormat;
use serde::Serialize;

/// Render any serialisable value as compact or pretty JSON per `format`.
/// `format` being `Human` still renders JSON here; callers decide whether a
/// human-readable rendering applies before reaching for this helper.
pub fn render_json(data: &impl Serialize, format: OutputFormat) -> Result<String, serde_json::Error> {
    if matches!(format, OutputFormat::Pretty) {
        serde_json::to_string_pretty(data)
    } else {
        serde_json::to_string(data)
    }
}
