//! OCI distribution transport for registry-hosted template collections
//!
//! Pulls `GET /v2/<repository>/manifests/<tag|digest>` followed by every
//! layer blob listed in the manifest. Each blob is size-checked, verified
//! against its SHA-256 digest and unpacked into a [`TemplateLayer`]; layers
//! keep manifest order.
//!
//! Authentication follows the registry token flow: when the registry answers
//! `401` with a `Bearer` challenge, a token is requested from the advertised
//! realm using the provider's credential and the request is repeated with it.

use super::archive::extract_layer;
use super::traits::{CollectionProvider, CollectionProviderFactory};
use crate::config::{secret_string, RegistryServerConfig, RetryConfig, SecretString};
use crate::core::cancel::{is_cancelled, CancelSignal};
use crate::domain::{
    AccessToken, ImageReference, ImageVersion, RegistryError, TemplateCollection, TemplateLayer,
};
use crate::log_retry_attempt;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Manifest media types accepted from the registry
pub const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
    application/vnd.docker.distribution.manifest.v2+json";

/// Upper bound on a manifest document
const MAX_MANIFEST_BYTES: u64 = 4 * 1024 * 1024;

/// Upper bound on unpacked templates relative to the compressed layer size
const MAX_EXPANSION_RATIO: u64 = 20;

/// Base URL for a registry host
///
/// Plain HTTP is only used for loopback registries.
pub fn registry_base_url(server: &str) -> String {
    let host = server.rsplit_once(':').map(|(h, _)| h).unwrap_or(server);
    let scheme = if host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" {
        "http"
    } else {
        "https"
    };
    format!("{scheme}://{server}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    layers: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    #[serde(default)]
    media_type: String,
    digest: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

/// Parses a `Bearer` challenge; other schemes yield `None`
pub fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let header = header.trim();
    let (scheme, params) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let mut realm = None;
    let mut service = None;
    let mut scope = None;

    let mut rest = params.trim();
    while !rest.is_empty() {
        let (key, after_key) = rest.split_once('=')?;
        let key = key.trim().trim_start_matches(',').trim();
        let after_key = after_key.trim_start();

        let (value, remainder) = if let Some(quoted) = after_key.strip_prefix('"') {
            let end = quoted.find('"')?;
            (&quoted[..end], &quoted[end + 1..])
        } else {
            match after_key.find(',') {
                Some(end) => (&after_key[..end], &after_key[end..]),
                None => (after_key, ""),
            }
        };

        match key.to_ascii_lowercase().as_str() {
            "realm" => realm = Some(value.to_string()),
            "service" => service = Some(value.to_string()),
            "scope" => scope = Some(value.to_string()),
            _ => {}
        }
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    Some(BearerChallenge {
        realm: realm?,
        service,
        scope,
    })
}

fn verify_digest(content: &[u8], expected: &str) -> Result<(), RegistryError> {
    let Some(expected_hex) = expected.strip_prefix("sha256:") else {
        return Err(RegistryError::ValidationFailed(format!(
            "Unsupported digest algorithm in '{expected}'"
        )));
    };

    let actual = format!("{:x}", Sha256::digest(content));
    if !actual.eq_ignore_ascii_case(expected_hex) {
        return Err(RegistryError::ValidationFailed(format!(
            "Digest mismatch: expected {expected}, got sha256:{actual}"
        )));
    }
    Ok(())
}

/// Runs `operation`, retrying transient failures with exponential backoff
async fn retry_request<F, T, Fut>(retry: &RetryConfig, operation: F) -> Result<T, RegistryError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RegistryError>>,
{
    let max_retries = retry.max_retries.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                attempt += 1;
                if attempt >= max_retries {
                    return Err(e);
                }

                let delay_ms = (retry.initial_delay_ms as f64
                    * retry.backoff_multiplier.powi(attempt as i32 - 1))
                    as u64;
                let delay_ms = delay_ms.min(retry.max_delay_ms);

                log_retry_attempt!(attempt, max_retries, e);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pulls one template collection from an OCI registry
pub struct OciCollectionProvider {
    image: ImageReference,
    token: AccessToken,
    config: RegistryServerConfig,
    client: Client,
    base_url: String,
    bearer: Mutex<Option<SecretString>>,
}

impl OciCollectionProvider {
    /// Creates a provider for `image` using `token`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        image: ImageReference,
        token: AccessToken,
        config: RegistryServerConfig,
    ) -> Result<Self, RegistryError> {
        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!(
                server = %image.registry,
                "TLS certificate verification is disabled for template registry"
            );
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| RegistryError::Unexpected(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: registry_base_url(&image.registry),
            image,
            token,
            config,
            client,
            bearer: Mutex::new(None),
        })
    }

    fn manifest_url(&self) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.base_url,
            self.image.repository,
            self.image.version.as_str()
        )
    }

    fn blob_url(&self, digest: &str) -> String {
        format!(
            "{}/v2/{}/blobs/{}",
            self.base_url, self.image.repository, digest
        )
    }

    async fn authorization(&self) -> Option<String> {
        if let Some(bearer) = self.bearer.lock().await.as_ref() {
            return Some(format!("Bearer {}", bearer.expose_secret()));
        }
        self.token.authorization_header()
    }

    async fn send(&self, url: &str, accept: Option<&str>) -> Result<reqwest::Response, RegistryError> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(auth) = self.authorization().await {
            request = request.header(AUTHORIZATION, auth);
        }

        request
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionFailed(e.to_string()))
    }

    /// Requests a bearer token from the challenge realm
    async fn authenticate(&self, challenge: &BearerChallenge) -> Result<(), RegistryError> {
        let scope = challenge
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{}:pull", self.image.repository));

        let mut query = vec![("scope", scope)];
        if let Some(service) = &challenge.service {
            query.push(("service", service.clone()));
        }

        // Credentials are only ever sent to an http(s) realm
        let realm = Url::parse_with_params(&challenge.realm, &query).map_err(|e| {
            RegistryError::Unexpected(format!("Invalid token realm '{}': {e}", challenge.realm))
        })?;
        if !matches!(realm.scheme(), "http" | "https") {
            return Err(RegistryError::Unexpected(format!(
                "Unsupported token realm scheme '{}'",
                realm.scheme()
            )));
        }

        let mut request = self.client.get(realm);
        if let Some(auth) = self.token.authorization_header() {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RegistryError::Unauthorized(format!(
                "Token service refused credentials for '{}' ({status})",
                self.image.registry
            )));
        }
        if !status.is_success() {
            return Err(status_error(status, &challenge.realm));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            RegistryError::Unexpected(format!("Invalid token service response: {e}"))
        })?;
        let token = body.token.or(body.access_token).ok_or_else(|| {
            RegistryError::Unexpected("Token service response carries no token".to_string())
        })?;

        *self.bearer.lock().await = Some(secret_string(token));
        tracing::debug!(registry = %self.image.registry, "Obtained registry bearer token");
        Ok(())
    }

    async fn get_once(
        &self,
        url: &str,
        accept: Option<&str>,
        max_bytes: u64,
    ) -> Result<Vec<u8>, RegistryError> {
        let mut response = self.send(url, accept).await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.bearer.lock().await.is_none() {
            let challenge = response
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_bearer_challenge);
            if let Some(challenge) = challenge {
                self.authenticate(&challenge).await?;
                response = self.send(url, accept).await?;
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, url));
        }

        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(RegistryError::ValidationFailed(format!(
                    "Response of {length} bytes exceeds the limit of {max_bytes} bytes"
                )));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::ConnectionFailed(e.to_string()))?;
        if body.len() as u64 > max_bytes {
            return Err(RegistryError::ValidationFailed(format!(
                "Response of {} bytes exceeds the limit of {max_bytes} bytes",
                body.len()
            )));
        }
        Ok(body.to_vec())
    }

    async fn get_bytes(
        &self,
        url: &str,
        accept: Option<&str>,
        max_bytes: u64,
    ) -> Result<Vec<u8>, RegistryError> {
        retry_request(&self.config.retry, || self.get_once(url, accept, max_bytes)).await
    }

    async fn fetch_layer(&self, descriptor: &Descriptor) -> Result<TemplateLayer, RegistryError> {
        let max_layer = self.config.max_layer_size_bytes;
        if descriptor.size > max_layer {
            return Err(RegistryError::ValidationFailed(format!(
                "Layer {} declares {} bytes, above the limit of {max_layer} bytes",
                descriptor.digest, descriptor.size
            )));
        }

        let blob = self
            .get_bytes(&self.blob_url(&descriptor.digest), None, max_layer)
            .await?;

        if blob.len() as u64 != descriptor.size {
            return Err(RegistryError::ValidationFailed(format!(
                "Layer {} is {} bytes but the manifest declares {}",
                descriptor.digest,
                blob.len(),
                descriptor.size
            )));
        }
        verify_digest(&blob, &descriptor.digest)?;

        extract_layer(&blob, max_layer.saturating_mul(MAX_EXPANSION_RATIO))
    }
}

fn status_error(status: StatusCode, url: &str) -> RegistryError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RegistryError::Unauthorized(format!("Registry denied access to {url} ({status})"))
        }
        StatusCode::NOT_FOUND => RegistryError::NotFound(url.to_string()),
        StatusCode::TOO_MANY_REQUESTS => {
            RegistryError::ConnectionFailed(format!("Registry throttled {url} ({status})"))
        }
        s if s.is_server_error() => {
            RegistryError::ConnectionFailed(format!("Registry error for {url} ({status})"))
        }
        _ => RegistryError::Unexpected(format!("Unexpected status {status} for {url}")),
    }
}

#[async_trait]
impl CollectionProvider for OciCollectionProvider {
    async fn get_collection(
        &self,
        cancel: &CancelSignal,
    ) -> Result<TemplateCollection, RegistryError> {
        tracing::info!(image = %self.image, "Pulling template collection");

        let manifest_bytes = self
            .get_bytes(&self.manifest_url(), Some(MANIFEST_ACCEPT), MAX_MANIFEST_BYTES)
            .await?;

        if let ImageVersion::Digest(expected) = &self.image.version {
            verify_digest(&manifest_bytes, expected)?;
        }

        let manifest: Manifest = serde_json::from_slice(&manifest_bytes).map_err(|e| {
            RegistryError::ValidationFailed(format!("Invalid image manifest: {e}"))
        })?;
        if manifest.layers.is_empty() {
            return Err(RegistryError::ValidationFailed(
                "Image manifest lists no layers".to_string(),
            ));
        }

        let mut layers = Vec::with_capacity(manifest.layers.len());
        for descriptor in &manifest.layers {
            if is_cancelled(cancel) {
                return Err(RegistryError::Cancelled);
            }

            let layer = self.fetch_layer(descriptor).await?;
            tracing::debug!(
                digest = %descriptor.digest,
                media_type = %descriptor.media_type,
                templates = layer.len(),
                "Template layer extracted"
            );
            layers.push(layer);
        }

        Ok(TemplateCollection::new(layers))
    }
}

/// Creates [`OciCollectionProvider`]s using per-registry transport settings
#[derive(Debug, Clone, Default)]
pub struct OciCollectionProviderFactory {
    registries: Vec<RegistryServerConfig>,
}

impl OciCollectionProviderFactory {
    pub fn new(registries: Vec<RegistryServerConfig>) -> Self {
        Self { registries }
    }
}

impl CollectionProviderFactory for OciCollectionProviderFactory {
    fn create_provider(
        &self,
        reference: &ImageReference,
        token: AccessToken,
    ) -> Result<Box<dyn CollectionProvider>, RegistryError> {
        let config = self
            .registries
            .iter()
            .find(|r| r.server.eq_ignore_ascii_case(&reference.registry))
            .cloned()
            .unwrap_or_else(|| RegistryServerConfig::anonymous(&reference.registry));

        Ok(Box::new(OciCollectionProvider::new(
            reference.clone(),
            token,
            config,
        )?))
    }
}
