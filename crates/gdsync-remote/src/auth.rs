//! Credential loading from the context metadata directory.

use std::path::Path;

use serde::{Deserialize, Serialize};

use gdsync_core::ports::RemoteError;

/// OAuth tokens stored by the auth bootstrap as a small JSON blob in the
/// context metadata directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Credentials {
    /// Reads credentials from the given path.
    pub fn load(path: &Path) -> Result<Self, RemoteError> {
        let data = std::fs::read(path).map_err(|err| {
            RemoteError::Auth(format!(
                "cannot read credentials at {}: {err}",
                path.display()
            ))
        })?;
        serde_json::from_slice(&data)
            .map_err(|err| RemoteError::Auth(format!("malformed credentials: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            br#"{"access_token":"tok-1","refresh_token":"ref-1"}"#,
        )
        .unwrap();

        let creds = Credentials::load(&path).unwrap();
        assert_eq!(creds.access_token, "tok-1");
        assert_eq!(creds.refresh_token.as_deref(), Some("ref-1"));
        assert!(creds.client_id.is_none());
    }

    #[test]
    fn missing_file_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Credentials::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, RemoteError::Auth(_)));
    }
}
