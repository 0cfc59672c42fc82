// src/services/transform.rs

//! Content extraction and normalization before comparison.

use regex::bytes::{NoExpand, Regex};
use thiserror::Error;

use crate::models::{Replace, Watch};

/// Pattern failures. All of them are fatal for the watch being processed.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("could not compile pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("pattern {pattern} has no capture group")]
    MissingCaptureGroup { pattern: String },

    #[error("pattern {pattern} did not match the response body")]
    NoMatch { pattern: String },

    #[error("could not compile replace pattern {pattern}: {source}")]
    InvalidReplacePattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Compiled extraction and replacement rules of one watch.
#[derive(Debug, Clone)]
pub struct Transformer {
    extract: Option<Regex>,
    replaces: Vec<(Regex, Vec<u8>)>,
}

impl Transformer {
    /// Compile the rules, rejecting invalid patterns up front.
    pub fn new(pattern: Option<&str>, replaces: &[Replace]) -> Result<Self, TransformError> {
        let extract = pattern
            .map(|pattern| {
                let regex = Regex::new(pattern).map_err(|source| {
                    TransformError::InvalidPattern {
                        pattern: pattern.to_string(),
                        source,
                    }
                })?;
                // Group 0 is the whole match, so a usable pattern has at least two.
                if regex.captures_len() < 2 {
                    return Err(TransformError::MissingCaptureGroup {
                        pattern: pattern.to_string(),
                    });
                }
                Ok(regex)
            })
            .transpose()?;

        let replaces = replaces
            .iter()
            .map(|replace| {
                Regex::new(&replace.pattern)
                    .map(|regex| (regex, replace.replace_with.as_bytes().to_vec()))
                    .map_err(|source| TransformError::InvalidReplacePattern {
                        pattern: replace.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { extract, replaces })
    }

    /// Compile the rules configured on a watch.
    pub fn for_watch(watch: &Watch) -> Result<Self, TransformError> {
        Self::new(watch.extraction_pattern(), &watch.replaces)
    }

    /// Apply extraction, then every replacement in order.
    pub fn apply(&self, body: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut content = match &self.extract {
            Some(regex) => {
                let captures =
                    regex
                        .captures(body)
                        .ok_or_else(|| TransformError::NoMatch {
                            pattern: regex.as_str().to_string(),
                        })?;
                // A group that did not participate in the match extracts nothing.
                captures
                    .get(1)
                    .map(|m| m.as_bytes().to_vec())
                    .unwrap_or_default()
            }
            None => body.to_vec(),
        };

        for (regex, replacement) in &self.replaces {
            log::debug!("replacing {}", regex.as_str());
            content = regex
                .replace_all(&content, NoExpand(replacement))
                .into_owned();
            log::trace!(
                "after {}:\n{}\n",
                regex.as_str(),
                String::from_utf8_lossy(&content)
            );
        }

        Ok(content)
    }
}

/// Compile and apply extraction and replacement rules in one step.
pub fn transform(
    body: &[u8],
    pattern: Option<&str>,
    replaces: &[Replace],
) -> Result<Vec<u8>, TransformError> {
    Transformer::new(pattern, replaces)?.apply(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(pattern: &str, with: &str) -> Replace {
        Replace {
            pattern: pattern.to_string(),
            replace_with: with.to_string(),
        }
    }

    #[test]
    fn test_passthrough_without_rules() {
        let out = transform(b"<p>hello</p>", None, &[]).unwrap();
        assert_eq!(out, b"<p>hello</p>");
    }

    #[test]
    fn test_extracts_first_capture_group() {
        let body = b"<html><main>news: 42</main><footer>x</footer></html>";
        let out = transform(body, Some(r"<main>(.*?)</main>"), &[]).unwrap();
        assert_eq!(out, b"news: 42");
    }

    #[test]
    fn test_extraction_without_match_fails() {
        let err = transform(b"<div>nothing</div>", Some(r"<main>(.*)</main>"), &[]).unwrap_err();
        assert!(matches!(err, TransformError::NoMatch { .. }));
    }

    #[test]
    fn test_pattern_without_group_fails() {
        let err = transform(b"<main>x</main>", Some(r"<main>.*</main>"), &[]).unwrap_err();
        assert!(matches!(err, TransformError::MissingCaptureGroup { .. }));
    }

    #[test]
    fn test_invalid_pattern_fails() {
        let err = transform(b"x", Some(r"(unclosed"), &[]).unwrap_err();
        assert!(matches!(err, TransformError::InvalidPattern { .. }));
    }

    #[test]
    fn test_invalid_replace_pattern_fails() {
        let err = transform(b"x", None, &[replace(r"[", "")]).unwrap_err();
        assert!(matches!(err, TransformError::InvalidReplacePattern { .. }));
    }

    #[test]
    fn test_replacements_apply_in_order() {
        let rules = [replace("a", "b"), replace("b", "c")];
        let out = transform(b"aab", None, &rules).unwrap();
        assert_eq!(out, b"ccc");
    }

    #[test]
    fn test_replacement_is_literal() {
        let rules = [replace(r"id=(\d+)", "$1")];
        let out = transform(b"id=12 id=34", None, &rules).unwrap();
        assert_eq!(out, b"$1 $1");
    }

    #[test]
    fn test_extract_then_replace() {
        let body = br#"<main>token="abc" text</main>"#;
        let rules = [replace(r#"token="[^"]+""#, "")];
        let out = transform(body, Some(r"<main>(.*)</main>"), &rules).unwrap();
        assert_eq!(out, b" text");
    }

    #[test]
    fn test_transform_is_deterministic() {
        let transformer =
            Transformer::new(Some(r"<b>(.*)</b>"), &[replace(r"\d", "#")]).unwrap();
        let first = transformer.apply(b"<b>v1.2</b>").unwrap();
        let second = transformer.apply(b"<b>v1.2</b>").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, b"v#.#");
    }
}
