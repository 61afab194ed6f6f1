use thiserror::Error;

/// Failures surfaced by the notification pipeline.
///
/// Normalization and classification never produce these; they are total and
/// degrade to "drop" or [`Category::Other`](crate::model::Category::Other).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Notification access has not been granted to this app.
    #[error("Notification access not granted")]
    PermissionDenied,
    /// A raw capture record could not be parsed into a notification.
    #[error("Malformed notification event: {reason}")]
    MalformedEvent { reason: String },
    /// The registered listener returned an error or panicked.
    #[error("Listener failed: {0}")]
    ListenerFailure(String),
    /// Any other fault on a control operation.
    #[error("{0}")]
    Generic(String),
}

impl PipelineError {
    /// String code reported across the control surface.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::PermissionDenied => "PERMISSION_DENIED",
            _ => "ERROR",
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        PipelineError::MalformedEvent {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_has_its_own_code() {
        assert_eq!(PipelineError::PermissionDenied.code(), "PERMISSION_DENIED");
    }

    #[test]
    fn everything_else_is_generic_error_code() {
        assert_eq!(PipelineError::malformed("bad json").code(), "ERROR");
        assert_eq!(PipelineError::ListenerFailure("boom".into()).code(), "ERROR");
        assert_eq!(PipelineError::Generic("no runtime".into()).code(), "ERROR");
    }

    #[test]
    fn display_includes_reason() {
        let e = PipelineError::malformed("missing packageName");
        assert_eq!(e.to_string(), "Malformed notification event: missing packageName");
    }
}
