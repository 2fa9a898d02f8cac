use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{FetchFailure, ProviderId, UtcDateTime, ValidationError};

/// Standard response envelope for every tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: EnvelopeMeta,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

impl<T> Envelope<T> {
    pub fn success(meta: EnvelopeMeta, data: T) -> Self {
        Self {
            meta,
            success: true,
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Envelope with data and errors; `success` is false when any error is
    /// present.
    pub fn with_errors(
        meta: EnvelopeMeta,
        data: Option<T>,
        errors: Vec<EnvelopeError>,
    ) -> Result<Self, ValidationError> {
        for error in &errors {
            error.validate()?;
        }

        Ok(Self {
            meta,
            success: errors.is_empty(),
            data,
            errors,
        })
    }

    pub fn failure(meta: EnvelopeMeta, error: EnvelopeError) -> Self {
        Self {
            meta,
            success: false,
            data: None,
            errors: vec![error],
        }
    }

    pub fn push_error(&mut self, error: EnvelopeError) -> Result<(), ValidationError> {
        error.validate()?;
        self.errors.push(error);
        self.success = false;
        Ok(())
    }
}

/// Metadata attached to every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    pub tool: String,
    pub generated_at: UtcDateTime,
    pub source_chain: Vec<ProviderId>,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnvelopeMeta {
    pub fn new(tool: impl Into<String>, source_chain: Vec<ProviderId>, latency_ms: u64) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            tool: tool.into(),
            generated_at: UtcDateTime::now(),
            source_chain,
            latency_ms,
            warnings: Vec::new(),
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

/// Structured error payload for partial or failed responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderId>,
}

impl EnvelopeError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let error = Self {
            code: code.into(),
            message: message.into(),
            retryable: None,
            source: None,
        };
        error.validate()?;
        Ok(error)
    }

    /// Rejected tool arguments.
    pub fn invalid_request(error: &ValidationError) -> Self {
        Self {
            code: String::from("request.invalid"),
            message: error.to_string(),
            retryable: Some(false),
            source: None,
        }
    }

    /// One section failure, prefixed with the section name.
    pub fn from_failure(section: &str, failure: &FetchFailure) -> Self {
        Self {
            code: failure.kind.code().to_owned(),
            message: format!("{section}: {}", failure.message),
            retryable: Some(failure.kind.retryable()),
            source: failure.source,
        }
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn with_source(mut self, source: ProviderId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::EmptyErrorCode);
        }

        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyErrorMessage);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    #[test]
    fn meta_gets_unique_request_ids() {
        let first = EnvelopeMeta::new("get_stock_quote", vec![ProviderId::Yahoo], 11);
        let second = EnvelopeMeta::new("get_stock_quote", vec![ProviderId::Yahoo], 11);

        assert_ne!(first.request_id, second.request_id);
        assert!(Uuid::parse_str(&first.request_id).is_ok());
    }

    #[test]
    fn rejects_empty_error_code() {
        let err = EnvelopeError::new("", "message").expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptyErrorCode));
    }

    #[test]
    fn errors_clear_success_flag() {
        let meta = EnvelopeMeta::new("get_stock_news", Vec::new(), 0);
        let mut envelope = Envelope::success(meta, 1_u8);
        assert!(envelope.success);

        let failure = FetchFailure::new(FailureKind::Timeout, "deadline elapsed");
        envelope
            .push_error(EnvelopeError::from_failure("news", &failure))
            .expect("valid error");

        assert!(!envelope.success);
        assert_eq!(envelope.errors[0].code, "fetch.timeout");
        assert_eq!(envelope.errors[0].retryable, Some(true));
    }

    #[test]
    fn validation_failure_uses_request_invalid_code() {
        let error = EnvelopeError::invalid_request(&ValidationError::EmptySymbol);
        assert_eq!(error.code, "request.invalid");
        assert_eq!(error.message, "symbol cannot be empty");
    }
}
