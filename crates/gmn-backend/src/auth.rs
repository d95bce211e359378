//! Credential loading
//!
//! The core treats credentials as opaque: a bearer token plus the backend
//! project id. Refresh policy lives outside this crate.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

use crate::BackendError;

/// Source of the bearer token and project id attached to backend calls
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, BackendError>;

    fn project_id(&self) -> Option<String> {
        None
    }
}

/// Credentials loaded once at startup, from the environment or from
/// `~/.gmn/oauth_creds.json`
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    access_token: String,
    project_id: Option<String>,
}

#[derive(Deserialize)]
struct CredsFile {
    access_token: String,
    #[serde(default)]
    project_id: Option<String>,
}

impl StoredCredentials {
    pub fn new(access_token: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            project_id,
        }
    }

    /// Load from `GMN_ACCESS_TOKEN`/`GMN_PROJECT_ID`, falling back to the
    /// credentials file
    pub fn load() -> Result<Self, BackendError> {
        if let Ok(token) = std::env::var("GMN_ACCESS_TOKEN") {
            return Ok(Self {
                access_token: token,
                project_id: std::env::var("GMN_PROJECT_ID").ok(),
            });
        }

        let path = Self::creds_path()
            .ok_or_else(|| BackendError::Configuration("no home directory".to_string()))?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, BackendError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            BackendError::Auth(format!(
                "failed to read credentials at {}: {e}",
                path.display()
            ))
        })?;
        let file: CredsFile = serde_json::from_str(&data)
            .map_err(|e| BackendError::Auth(format!("malformed credentials file: {e}")))?;

        Ok(Self {
            access_token: file.access_token,
            project_id: file.project_id,
        })
    }

    fn creds_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".gmn").join("oauth_creds.json"))
    }
}

#[async_trait]
impl CredentialsProvider for StoredCredentials {
    async fn access_token(&self) -> Result<String, BackendError> {
        Ok(self.access_token.clone())
    }

    fn project_id(&self) -> Option<String> {
        self.project_id.clone()
    }
}
