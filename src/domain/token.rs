//! Registry access tokens

use crate::config::{secret_string, SecretString};
use secrecy::ExposeSecret;
use std::fmt;

/// Username Azure Container Registry expects alongside a refresh token
pub const ACR_REFRESH_TOKEN_USERNAME: &str = "00000000-0000-0000-0000-000000000000";

/// Credential presented to a registry
#[derive(Clone)]
pub enum RegistryCredential {
    /// No credential; only public repositories can be pulled
    Anonymous,
    /// Username and password (or refresh token) for the registry token service
    Basic {
        /// Registry username
        username: String,
        /// Password or refresh token
        password: SecretString,
    },
    /// Bearer token accepted directly by the registry
    Bearer(SecretString),
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
        }
    }
}

/// Short-lived credential for one registry server
///
/// The token's lifetime is owned by whoever issued it; this type only carries it
/// from the token provider to the collection provider.
#[derive(Debug, Clone)]
pub struct AccessToken {
    server: String,
    credential: RegistryCredential,
}

impl AccessToken {
    /// Creates a token for `server`
    pub fn new(server: impl Into<String>, credential: RegistryCredential) -> Self {
        Self {
            server: server.into(),
            credential,
        }
    }

    /// Anonymous access to `server`
    pub fn anonymous(server: impl Into<String>) -> Self {
        Self::new(server, RegistryCredential::Anonymous)
    }

    /// Basic credentials for `server`
    pub fn basic(
        server: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(
            server,
            RegistryCredential::Basic {
                username: username.into(),
                password: secret_string(password.into()),
            },
        )
    }

    /// Server this token was issued for
    pub fn server(&self) -> &str {
        &self.server
    }

    /// The credential
    pub fn credential(&self) -> &RegistryCredential {
        &self.credential
    }

    /// `Authorization` header value, if the credential has one
    pub fn authorization_header(&self) -> Option<String> {
        use base64::{engine::general_purpose, Engine as _};

        match &self.credential {
            RegistryCredential::Anonymous => None,
            RegistryCredential::Basic { username, password } => {
                let raw = format!("{username}:{}", password.expose_secret());
                Some(format!("Basic {}", general_purpose::STANDARD.encode(raw)))
            }
            RegistryCredential::Bearer(token) => {
                Some(format!("Bearer {}", token.expose_secret()))
            }
        }
    }
}
