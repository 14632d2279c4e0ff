use tracing::warn;

use crate::config::Config;

/// Host-provided credential selection capability. The engine queries it
/// before issuing a high-resolution-tier run and invokes the selection action
/// both proactively (no credential chosen) and reactively (a generation call
/// came back entitlement-denied). Injected so tests can substitute a fake.
#[allow(async_fn_in_trait)]
pub trait CredentialGate {
    async fn has_credential(&self) -> bool;
    async fn request_credential(&self);
}

/// Production gate backed by the configured API key. There is no interactive
/// dialog in a headless client, so the selection action is an actionable
/// operator warning.
#[derive(Debug, Clone)]
pub struct ApiKeyGate {
    configured: bool,
}

impl ApiKeyGate {
    pub fn from_config(config: &Config) -> Self {
        ApiKeyGate {
            configured: !config.gemini_api_key.trim().is_empty(),
        }
    }
}

impl CredentialGate for ApiKeyGate {
    async fn has_credential(&self) -> bool {
        self.configured
    }

    async fn request_credential(&self) {
        warn!(
            "A Gemini API key with access to the requested models is required; \
             set GEMINI_API_KEY to a key entitled to the configured model tier."
        );
    }
}
