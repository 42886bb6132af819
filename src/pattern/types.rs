//! Request/response types for the Pattern core (spec §3.4).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Matching discipline for the external pattern-matching tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Cst,
    Smart,
    Ast,
    Relaxed,
    Signature,
}

impl Default for Strictness {
    fn default() -> Self {
        Strictness::Smart
    }
}

impl Strictness {
    pub fn as_str(self) -> &'static str {
        match self {
            Strictness::Cst => "cst",
            Strictness::Smart => "smart",
            Strictness::Ast => "ast",
            Strictness::Relaxed => "relaxed",
            Strictness::Signature => "signature",
        }
    }
}

/// The closed set of target languages (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Typescript,
    Javascript,
    Tsx,
    Jsx,
    Python,
    Rust,
    C,
    Cpp,
    Java,
    Php,
    Ruby,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Typescript => "typescript",
            Language::Javascript => "javascript",
            Language::Tsx => "tsx",
            Language::Jsx => "jsx",
            Language::Python => "python",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Php => "php",
            Language::Ruby => "ruby",
        }
    }
}

/// A caller's pattern search request.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternRequest {
    pub pattern: String,
    pub language: Language,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub context_lines: Option<u32>,
    #[serde(default)]
    pub strictness: Option<Strictness>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// One match produced by the pattern-matching binary, normalised.
#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    pub file_path: String,
    pub start_line: u64,
    pub end_line: u64,
    pub match_text: String,
    pub context: String,
    pub metavars: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternResponseMetadata {
    pub took_ms: u64,
    pub pattern: String,
    pub language: String,
    pub strictness: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternResponse {
    pub matches: Vec<PatternMatch>,
    pub total: usize,
    pub metadata: PatternResponseMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_request() {
        let req: PatternRequest = serde_json::from_str(
            r#"{"pattern":"defer $FUNC()","language":"go"}"#,
        )
        .unwrap();
        assert_eq!(req.pattern, "defer $FUNC()");
        assert_eq!(req.language, Language::Go);
        assert!(req.file_paths.is_empty());
    }
}
