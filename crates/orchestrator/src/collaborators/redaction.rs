//! PII redaction collaborator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CollaboratorError;

pub const REDACTED_EMAIL: &str = "[REDACTED_EMAIL]";
pub const REDACTED_NUMBER: &str = "[REDACTED_NUMBER]";

/// Minimum digits in a token treated as a card or account number.
const MIN_SENSITIVE_DIGITS: usize = 12;

#[async_trait]
pub trait PiiRedactor: Send + Sync {
    /// Returns `payload` with personal data masked.
    async fn redact(&self, payload: &Value) -> Result<Value, CollaboratorError>;
}

/// Masks e-mail addresses and long digit runs in every string of a payload.
#[derive(Debug, Clone, Default)]
pub struct BasicPiiRedactor {
    fail: Arc<AtomicBool>,
}

impl BasicPiiRedactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PiiRedactor for BasicPiiRedactor {
    async fn redact(&self, payload: &Value) -> Result<Value, CollaboratorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::unavailable(
                "redaction",
                "Redaction service unavailable",
            ));
        }
        Ok(redact_value(payload))
    }
}

fn redact_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_text(s)),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Masks whitespace-separated tokens, keeping the separators as they were.
fn redact_text(text: &str) -> String {
    let mut redacted = String::with_capacity(text.len());
    for piece in text.split_inclusive(char::is_whitespace) {
        let token = piece.trim_end_matches(char::is_whitespace);
        redacted.push_str(redact_token(token));
        redacted.push_str(&piece[token.len()..]);
    }
    redacted
}

fn redact_token(token: &str) -> &str {
    if looks_like_email(token) {
        REDACTED_EMAIL
    } else if token.chars().filter(char::is_ascii_digit).count() >= MIN_SENSITIVE_DIGITS
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || c == '.')
    {
        REDACTED_NUMBER
    } else {
        token
    }
}

fn looks_like_email(token: &str) -> bool {
    match token.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_redacts_nested_strings() {
        let redactor = BasicPiiRedactor::new();
        let payload = json!({
            "message": "mail me at jane.doe@example.com about card 4111-1111-1111-1111",
            "items": [{ "quantity": 2, "note": "order 42" }]
        });

        let redacted = redactor.redact(&payload).await.unwrap();
        assert_eq!(
            redacted["message"],
            "mail me at [REDACTED_EMAIL] about card [REDACTED_NUMBER]"
        );
        assert_eq!(redacted["items"][0]["note"], "order 42");
        assert_eq!(redacted["items"][0]["quantity"], 2);
    }

    #[tokio::test]
    async fn test_redacts_across_line_breaks_and_tabs() {
        let redactor = BasicPiiRedactor::new();
        let payload = json!({
            "message": "contact:\njane@example.com\tcard\t4111111111111111\n"
        });

        let redacted = redactor.redact(&payload).await.unwrap();
        assert_eq!(
            redacted["message"],
            "contact:\n[REDACTED_EMAIL]\tcard\t[REDACTED_NUMBER]\n"
        );
    }

    #[tokio::test]
    async fn test_failure_toggle() {
        let redactor = BasicPiiRedactor::new();
        redactor.set_fail(true);
        assert!(redactor.redact(&json!({})).await.is_err());
    }
}
