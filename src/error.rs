use reqwest::StatusCode;

/// Failure of a single outbound generation call.
///
/// Nothing here escapes the engine: analysis failures abort the run, image
/// failures are isolated to the concept or edit that raised them.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("analysis response did not match the declared schema: {0}")]
    MalformedAnalysisResponse(String),

    #[error("no image part in the response from {model}")]
    NoImageProduced { model: String },

    #[error("request rejected with status {status}: {detail}")]
    Api { status: StatusCode, detail: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid image payload: {0}")]
    InvalidImage(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl GenerationError {
    /// True when the service rejected the call for credential/access-tier
    /// reasons rather than input validity. The one place failure text is
    /// inspected; drives the credential-reselection action in the engine.
    pub fn is_entitlement_denied(&self) -> bool {
        match self {
            GenerationError::Api { status, detail } => {
                *status == StatusCode::FORBIDDEN
                    || detail.contains("Requested entity was not found")
                    || detail.contains("PERMISSION_DENIED")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_not_found_counts_as_entitlement_denied() {
        let err = GenerationError::Api {
            status: StatusCode::NOT_FOUND,
            detail: "Requested entity was not found.".to_string(),
        };
        assert!(err.is_entitlement_denied());
    }

    #[test]
    fn forbidden_status_counts_as_entitlement_denied() {
        let err = GenerationError::Api {
            status: StatusCode::FORBIDDEN,
            detail: "quota".to_string(),
        };
        assert!(err.is_entitlement_denied());
    }

    #[test]
    fn generic_failures_are_not_entitlement_denied() {
        let err = GenerationError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "boom".to_string(),
        };
        assert!(!err.is_entitlement_denied());
        assert!(!GenerationError::Transport("timeout".to_string()).is_entitlement_denied());
        assert!(!GenerationError::NoImageProduced {
            model: "gemini-2.5-flash-image".to_string()
        }
        .is_entitlement_denied());
    }
}
