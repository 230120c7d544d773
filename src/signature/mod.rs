//! Message fingerprinting for pattern grouping.
//!
//! A signature is a stable digest of a normalized log message. Variable
//! fragments (numbers, UUIDs, timestamps, IPs, emails, URLs) are replaced
//! with placeholders before hashing, so structurally identical messages
//! collapse to one signature.
//!
//! Normalization is applied in a strict order: broader substitutions run
//! after the narrower ones they would otherwise clobber (a date inside an
//! ISO timestamp, digits inside an IPv4 address).

use crate::core::{Severity, Signature};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Sentinel hashed in place of an empty message.
const EMPTY_SENTINEL: &str = "empty";

/// Substitution table, applied top to bottom.
static SUBSTITUTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(
                r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
            )
            .unwrap(),
            "UUID",
        ),
        (Regex::new(r"(?i)\b[0-9a-f]{32,}\b").unwrap(), "HEXID"),
        (
            Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
                .unwrap(),
            "TIMESTAMP",
        ),
        (Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap(), "DATE"),
        (Regex::new(r"\b\d{2}:\d{2}:\d{2}\b").unwrap(), "TIME"),
        (
            Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap(),
            "IP",
        ),
        (
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            "EMAIL",
        ),
        (Regex::new(r"https?://\S+").unwrap(), "URL"),
        (Regex::new(r"\b\d+\b").unwrap(), "N"),
        (Regex::new(r"\s+").unwrap(), " "),
    ]
});

static ERROR_TYPE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(\w+Error):").unwrap(),
        Regex::new(r"(\w+Exception):").unwrap(),
        Regex::new(r"Exception:\s+(\w+)").unwrap(),
        Regex::new(r"Error:\s+(\w+)").unwrap(),
    ]
});

fn digest(input: &str) -> Signature {
    let hash = Sha256::digest(input.as_bytes());
    // 128 bits is plenty for pattern identity; 32 hex chars on the wire.
    Signature::from_digest(hex::encode(&hash[..16]))
}

/// Normalize a message without hashing it. Exposed for tests and debugging.
pub fn normalize(message: &str) -> String {
    let mut normalized = message.to_owned();
    for (pattern, replacement) in SUBSTITUTIONS.iter() {
        if let std::borrow::Cow::Owned(replaced) = pattern.replace_all(&normalized, *replacement) {
            normalized = replaced;
        }
    }
    normalized.to_lowercase().trim().to_owned()
}

/// Compute the pattern signature of a log message.
///
/// Pure and total: identical input always yields the identical signature,
/// and an empty message maps to a fixed sentinel signature.
pub fn compute_signature(message: &str) -> Signature {
    if message.is_empty() {
        return digest(EMPTY_SENTINEL);
    }
    digest(&normalize(message))
}

/// Compute a signature that also distinguishes severity and error type.
///
/// Identical text logged at different severities (or carrying different
/// exception types) gets distinct signatures.
pub fn compute_signature_with_context(
    message: &str,
    severity: Option<Severity>,
    error_type: Option<&str>,
) -> Signature {
    let base = compute_signature(message);

    let mut combined = base.into_inner();
    if let Some(severity) = severity {
        combined.push(':');
        combined.push_str(severity.as_str());
    }
    if let Some(error_type) = error_type {
        combined.push(':');
        combined.push_str(error_type);
    }

    digest(&combined)
}

/// Best-effort extraction of an exception-like token from a message.
///
/// Auxiliary signal only; absence of a match means nothing.
pub fn extract_error_type(message: &str) -> Option<String> {
    for pattern in ERROR_TYPE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(message) {
            if let Some(m) = captures.get(1) {
                return Some(m.as_str().to_owned());
            }
        }
    }
    None
}
