use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SerializableSecretString;
use crate::shared::ValidationError;

/// Credentials and endpoint of the remote data access platform.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base url of the API gateway, e.g. `https://api-gateway.instructure.com`.
    pub base_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SerializableSecretString,
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::EmptyApiBaseUrl);
        }

        Ok(())
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"REDACTED")
            .finish()
    }
}
