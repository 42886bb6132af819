//! Output transformer: normalises raw ast-grep JSON matches into the
//! tool-facing `PatternMatch` shape (spec §4.8).

use crate::error::PatternError;
use crate::pattern::types::PatternMatch;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct RawPosition {
    line: u64,
    #[allow(dead_code)]
    column: u64,
}

#[derive(Debug, Deserialize)]
struct RawRange {
    start: RawPosition,
    end: RawPosition,
}

#[derive(Debug, Deserialize)]
struct RawMetaVariable {
    text: String,
    #[allow(dead_code)]
    range: RawRange,
}

#[derive(Debug, Deserialize, Default)]
struct RawMetaVariables {
    #[serde(default)]
    single: HashMap<String, RawMetaVariable>,
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    file: String,
    text: String,
    range: RawRange,
    #[serde(default, rename = "metaVariables")]
    meta_variables: Option<RawMetaVariables>,
}

/// Parse the child's raw stdout and normalise it.
///
/// Empty stdout is zero matches, not an error. `total` reflects the full
/// parsed count; `matches` is truncated to `limit` while `total` is left
/// unchanged (spec §8 invariant 8).
pub fn transform(stdout: &[u8], limit: u32) -> Result<(Vec<PatternMatch>, usize), PatternError> {
    let trimmed = trim_slice(stdout);
    if trimmed.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let raw: Vec<RawMatch> = serde_json::from_slice(trimmed)?;
    let total = raw.len();

    let limit = limit as usize;
    let matches = raw
        .into_iter()
        .take(limit)
        .map(|m| {
            let metavars = m
                .meta_variables
                .map(|mv| mv.single.into_iter().map(|(k, v)| (k, v.text)).collect())
                .unwrap_or_default();
            PatternMatch {
                file_path: m.file,
                start_line: m.range.start.line,
                end_line: m.range.end.line,
                match_text: m.text.clone(),
                context: m.text,
                metavars,
            }
        })
        .collect();

    Ok((matches, total))
}

fn trim_slice(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !b.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &data[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stdout_is_zero_matches_not_an_error() {
        let (matches, total) = transform(b"", 50).unwrap();
        assert!(matches.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn whitespace_only_stdout_is_zero_matches() {
        let (matches, total) = transform(b"  \n \t", 50).unwrap();
        assert!(matches.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn parses_single_match_with_metavars() {
        let raw = br#"[{
            "file": "main.go",
            "text": "defer conn.Close()",
            "range": {"start": {"line": 10, "column": 1}, "end": {"line": 10, "column": 20}},
            "metaVariables": {"single": {"FUNC": {"text": "conn.Close", "range": {"start": {"line": 10, "column": 7}, "end": {"line": 10, "column": 17}}}}}
        }]"#;
        let (matches, total) = transform(raw, 50).unwrap();
        assert_eq!(total, 1);
        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(m.file_path, "main.go");
        assert_eq!(m.start_line, 10);
        assert_eq!(m.end_line, 10);
        assert_eq!(m.match_text, "defer conn.Close()");
        assert_eq!(m.context, "defer conn.Close()");
        assert_eq!(m.metavars.get("FUNC").unwrap(), "conn.Close");
    }

    #[test]
    fn truncates_matches_but_preserves_total() {
        let mut entries = Vec::new();
        for i in 0..5 {
            entries.push(format!(
                r#"{{"file":"f{i}.go","text":"x","range":{{"start":{{"line":{i},"column":1}},"end":{{"line":{i},"column":2}}}}}}"#
            ));
        }
        let raw = format!("[{}]", entries.join(","));
        let (matches, total) = transform(raw.as_bytes(), 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn missing_metavariables_is_empty_map() {
        let raw = br#"[{"file":"f.go","text":"x","range":{"start":{"line":1,"column":1},"end":{"line":1,"column":2}}}]"#;
        let (matches, _total) = transform(raw, 50).unwrap();
        assert!(matches[0].metavars.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(transform(b"not json", 50).is_err());
    }
}
