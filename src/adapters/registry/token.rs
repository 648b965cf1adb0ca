//! Token provider backed by the `[[registries]]` configuration
//!
//! - `anonymous`: an anonymous token
//! - `basic`: the configured username and password
//! - `azure_ad`: a service principal token from Azure AD, exchanged at the
//!   registry's `/oauth2/exchange` endpoint for an ACR refresh token

use super::oci::registry_base_url;
use super::traits::TokenProvider;
use crate::config::{RegistryAuthType, RegistryServerConfig};
use crate::core::cancel::{cancelled, CancelSignal};
use crate::domain::token::ACR_REFRESH_TOKEN_USERNAME;
use crate::domain::{AccessToken, RegistryError};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_identity::ClientSecretCredential;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;

/// Azure AD scope for Azure Container Registry
const ACR_SCOPE: &str = "https://containerregistry.azure.net/.default";

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    refresh_token: String,
}

/// Issues tokens from configured registry credentials
#[derive(Debug, Clone, Default)]
pub struct ConfiguredTokenProvider {
    registries: Vec<RegistryServerConfig>,
}

impl ConfiguredTokenProvider {
    pub fn new(registries: Vec<RegistryServerConfig>) -> Self {
        Self { registries }
    }

    fn registry(&self, server: &str) -> Option<&RegistryServerConfig> {
        self.registries
            .iter()
            .find(|r| r.server.eq_ignore_ascii_case(server))
    }

    async fn acquire(&self, config: &RegistryServerConfig) -> Result<AccessToken, RegistryError> {
        match config.auth_type {
            RegistryAuthType::Anonymous => Ok(AccessToken::anonymous(&config.server)),
            RegistryAuthType::Basic => {
                let username = config.username.clone().unwrap_or_default();
                let password = config
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret().to_string())
                    .unwrap_or_default();
                if username.is_empty() || password.is_empty() {
                    return Err(RegistryError::AuthenticationFailed(format!(
                        "Incomplete basic credentials for '{}'",
                        config.server
                    )));
                }
                Ok(AccessToken::basic(&config.server, username, password))
            }
            RegistryAuthType::AzureAd => {
                let refresh_token = self.exchange_azure_ad_token(config).await?;
                Ok(AccessToken::basic(
                    &config.server,
                    ACR_REFRESH_TOKEN_USERNAME,
                    refresh_token,
                ))
            }
        }
    }

    async fn exchange_azure_ad_token(
        &self,
        config: &RegistryServerConfig,
    ) -> Result<String, RegistryError> {
        let missing = |name: &str| {
            RegistryError::AuthenticationFailed(format!(
                "{name} is not configured for '{}'",
                config.server
            ))
        };
        let tenant_id = config.tenant_id.as_deref().ok_or_else(|| missing("tenant_id"))?;
        let client_id = config.client_id.clone().ok_or_else(|| missing("client_id"))?;
        let client_secret = config
            .client_secret
            .as_ref()
            .ok_or_else(|| missing("client_secret"))?;

        let secret = azure_core::credentials::Secret::new(client_secret.expose_secret().to_string());
        let credential = ClientSecretCredential::new(tenant_id, client_id, secret, None)
            .map_err(|e| {
                RegistryError::AuthenticationFailed(format!(
                    "Failed to create Azure AD credential: {e}"
                ))
            })?;

        let aad_token = TokenCredential::get_token(&*credential, &[ACR_SCOPE], None)
            .await
            .map_err(|e| {
                RegistryError::AuthenticationFailed(format!(
                    "Failed to acquire Azure AD token: {e}"
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| RegistryError::Unexpected(format!("Failed to build HTTP client: {e}")))?;

        let url = format!("{}/oauth2/exchange", registry_base_url(&config.server));
        let response = client
            .post(&url)
            .form(&[
                ("grant_type", "access_token"),
                ("service", config.server.as_str()),
                ("access_token", aad_token.token.secret()),
            ])
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::AuthenticationFailed(format!(
                "Refresh token exchange with '{}' failed with status {status}",
                config.server
            )));
        }

        let body: ExchangeResponse = response.json().await.map_err(|e| {
            RegistryError::AuthenticationFailed(format!("Invalid token exchange response: {e}"))
        })?;

        tracing::debug!(server = %config.server, "Exchanged Azure AD token for registry refresh token");
        Ok(body.refresh_token)
    }
}

#[async_trait]
impl TokenProvider for ConfiguredTokenProvider {
    async fn get_token(
        &self,
        server: &str,
        cancel: &CancelSignal,
    ) -> Result<AccessToken, RegistryError> {
        let config = self.registry(server).ok_or_else(|| {
            RegistryError::NotConfigured(format!("No credentials are configured for '{server}'"))
        })?;

        tracing::debug!(
            server = %server,
            auth_type = ?config.auth_type,
            "Acquiring registry token"
        );

        tokio::select! {
            biased;
            _ = cancelled(cancel) => Err(RegistryError::Cancelled),
            token = self.acquire(config) => token,
        }
    }
}
