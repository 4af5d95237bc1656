use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

use crate::config::RedactionConfig;

#[allow(clippy::expect_used)]
mod patterns {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        /// National identifiers written as `12.345.678-9`, `12345678-K` and similar
        pub static ref NATIONAL_ID_REGEX: Regex =
            Regex::new(r"\b\d{1,2}\.?\d{3}\.?\d{3}-[0-9kK]\b").expect("static pattern compiles");
        pub static ref EMAIL_REGEX: Regex =
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("static pattern compiles");
        pub static ref PHONE_REGEX: Regex =
            Regex::new(r"\+\d{2}[\s-]?\d[\s-]?\d{4}[\s-]?\d{4}\b").expect("static pattern compiles");
    }
}

use patterns::{EMAIL_REGEX, NATIONAL_ID_REGEX, PHONE_REGEX};

static GLOBAL: OnceLock<PiiRedactor> = OnceLock::new();

/// PII redactor for log messages
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    /// Install the process-wide redactor. The first call wins; later calls
    /// return `false` and leave the installed configuration untouched.
    pub fn install(config: RedactionConfig) -> bool {
        GLOBAL.set(Self::new(config)).is_ok()
    }

    /// The installed redactor, or a default (fully enabled) one.
    pub fn global() -> &'static PiiRedactor {
        GLOBAL.get_or_init(PiiRedactor::default)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Scrub identifiers found inside free text.
    pub fn redact(&self, text: &str) -> String {
        if !self.config.enabled {
            return text.to_string();
        }

        let mut result = text.to_string();

        if self.config.redact_national_ids {
            result = NATIONAL_ID_REGEX
                .replace_all(&result, |caps: &regex::Captures| format!("ID[{}]", hash_value(&caps[0])))
                .into_owned();
        }

        if self.config.redact_emails {
            result = EMAIL_REGEX
                .replace_all(&result, |caps: &regex::Captures| format!("EMAIL[{}]", hash_value(&caps[0])))
                .into_owned();
        }

        if self.config.redact_phones {
            result = PHONE_REGEX
                .replace_all(&result, |caps: &regex::Captures| format!("PHONE[{}]", hash_value(&caps[0])))
                .into_owned();
        }

        result
    }

    /// Replace a whole value known to identify a patient (national id or name).
    /// Values are trimmed and upper-cased first so that the same patient
    /// hashes identically regardless of how the value was typed.
    pub fn identity(&self, value: &str) -> String {
        let normalized = value.trim().to_uppercase();
        if !self.config.enabled {
            return normalized;
        }
        if normalized.is_empty() {
            return "ID[-]".to_string();
        }
        format!("ID[{}]", hash_value(&normalized))
    }
}

/// Short, stable correlation hash: base64 of the first 8 bytes of SHA-256.
pub fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    general_purpose::STANDARD.encode(&result[..8])
}

/// Display adapter for logging patient identifiers through `tracing` fields:
/// `info!(patient = %redact_id(&national_id), "...")`.
pub struct Redacted<'a>(&'a str);

pub fn redact_id(value: &str) -> Redacted<'_> {
    Redacted(value)
}

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&PiiRedactor::global().identity(self.0))
    }
}

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_national_id_redaction() {
        let redactor = PiiRedactor::default();
        let redacted = redactor.redact("upsert failed for 12.345.678-9 and 9876543-K");
        assert!(!redacted.contains("12.345.678-9"));
        assert!(!redacted.contains("9876543-K"));
        assert_eq!(redacted.matches("ID[").count(), 2);
    }

    #[test]
    fn test_email_and_phone_redaction() {
        let redactor = PiiRedactor::default();
        let redacted = redactor.redact("contact qf.jefe@hospital.cl or +56 9 1234 5678");
        assert!(redacted.contains("EMAIL["));
        assert!(redacted.contains("PHONE["));
        assert!(!redacted.contains("hospital.cl"));
    }

    #[test]
    fn test_identity_is_case_and_space_insensitive() {
        let redactor = PiiRedactor::default();
        assert_eq!(redactor.identity(" 12345678-k "), redactor.identity("12345678-K"));
        assert!(redactor.identity("JUAN PEREZ").starts_with("ID["));
        assert_eq!(redactor.identity("   "), "ID[-]");
    }

    #[test]
    fn test_disabled_redactor_passes_through() {
        let redactor = PiiRedactor::new(RedactionConfig::disabled());
        assert_eq!(redactor.redact("12.345.678-9"), "12.345.678-9");
        assert_eq!(redactor.identity("juan"), "JUAN");
    }

    #[test]
    fn test_medication_codes_are_not_mistaken_for_ids() {
        let redactor = PiiRedactor::default();
        let text = "medication 1-01-02-0003 dose 2 MG";
        assert_eq!(redactor.redact(text), text);
    }

    #[test]
    fn test_hash_is_stable_and_short() {
        assert_eq!(hash_value("abc"), hash_value("abc"));
        assert_ne!(hash_value("abc"), hash_value("abd"));
        assert_eq!(hash_value("abc").len(), 12);
    }
}
