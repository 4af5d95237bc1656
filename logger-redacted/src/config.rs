// Redaction configuration
use serde::{Deserialize, Serialize};

/// Which kinds of personal data are scrubbed from log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Master switch. When off, values are logged as-is (local development only).
    pub enabled: bool,
    pub redact_national_ids: bool,
    pub redact_emails: bool,
    pub redact_phones: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_national_ids: true,
            redact_emails: true,
            redact_phones: true,
        }
    }
}

impl RedactionConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default_to_redacting() {
        let config: RedactionConfig = serde_json::from_str(r#"{"redact_emails": false}"#).unwrap();
        assert!(config.enabled);
        assert!(config.redact_national_ids);
        assert!(!config.redact_emails);
        assert!(config.redact_phones);
    }
}
