//! Integration tests for template collection resolution
//!
//! Registry collaborators are replaced by counting fakes, or by a mockito
//! server speaking the OCI distribution protocol.

use async_trait::async_trait;
use fhir_bridge::adapters::embedded::EmbeddedCollectionProvider;
use fhir_bridge::adapters::registry::{
    CollectionProvider, CollectionProviderFactory, ConfiguredTokenProvider,
    OciCollectionProviderFactory, TokenProvider,
};
use fhir_bridge::config::{BridgeConfig, RegistryServerConfig};
use fhir_bridge::core::cancel::{never_cancelled, CancelSignal};
use fhir_bridge::core::resolve::TemplateCollectionResolver;
use fhir_bridge::domain::{
    AccessToken, ConversionErrorKind, ImageReference, RegistryError, Template,
    TemplateCollection, TemplateLayer, TemplateReference,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Token provider that counts calls and returns a scripted outcome
struct CountingTokenProvider {
    calls: AtomicUsize,
    outcome: Result<(), RegistryError>,
    delay: Duration,
}

impl CountingTokenProvider {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome: Ok(()),
            delay: Duration::ZERO,
        })
    }

    fn failing(err: RegistryError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome: Err(err),
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome: Ok(()),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for CountingTokenProvider {
    async fn get_token(
        &self,
        server: &str,
        _cancel: &CancelSignal,
    ) -> Result<AccessToken, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome
            .clone()
            .map(|_| AccessToken::basic(server, "user", "token"))
    }
}

/// Factory whose providers return a fixed outcome
struct StaticFactory {
    outcome: Result<TemplateCollection, RegistryError>,
    created: AtomicUsize,
}

impl StaticFactory {
    fn new(outcome: Result<TemplateCollection, RegistryError>) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            created: AtomicUsize::new(0),
        })
    }
}

struct StaticProvider(Result<TemplateCollection, RegistryError>);

#[async_trait]
impl CollectionProvider for StaticProvider {
    async fn get_collection(
        &self,
        _cancel: &CancelSignal,
    ) -> Result<TemplateCollection, RegistryError> {
        self.0.clone()
    }
}

impl CollectionProviderFactory for StaticFactory {
    fn create_provider(
        &self,
        _reference: &ImageReference,
        _token: AccessToken,
    ) -> Result<Box<dyn CollectionProvider>, RegistryError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticProvider(self.outcome.clone())))
    }
}

fn hosted_collection() -> TemplateCollection {
    TemplateCollection::new(vec![TemplateLayer::from_templates([Template::new(
        "ADT_A01",
        "{ \"resourceType\": \"Bundle\" }",
    )])])
}

fn resolver(
    tokens: Arc<CountingTokenProvider>,
    factory: Arc<StaticFactory>,
) -> TemplateCollectionResolver {
    TemplateCollectionResolver::new(tokens, Arc::new(EmbeddedCollectionProvider::new()), factory)
}

#[tokio::test]
async fn test_default_reference_never_requests_a_token() {
    let tokens = CountingTokenProvider::ok();
    let factory = StaticFactory::new(Ok(hosted_collection()));
    let resolver = resolver(tokens.clone(), factory.clone());

    let collection = resolver
        .resolve(
            &TemplateReference::default_collection(),
            "contoso.azurecr.io",
            &never_cancelled(),
        )
        .await
        .unwrap();

    assert!(collection.contains("ADT_A01"));
    assert_eq!(tokens.calls(), 0);
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hosted_reference_requests_exactly_one_token() {
    let tokens = CountingTokenProvider::ok();
    let factory = StaticFactory::new(Ok(hosted_collection()));
    let resolver = resolver(tokens.clone(), factory.clone());

    let collection = resolver
        .resolve(
            &TemplateReference::new("contoso.azurecr.io/templates/hl7v2:v1"),
            "contoso.azurecr.io",
            &never_cancelled(),
        )
        .await
        .unwrap();

    assert_eq!(collection.template_count(), 1);
    assert_eq!(tokens.calls(), 1);
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_token_failure_is_registry_auth_failure() {
    let tokens =
        CountingTokenProvider::failing(RegistryError::AuthenticationFailed("bad secret".into()));
    let factory = StaticFactory::new(Ok(hosted_collection()));
    let resolver = resolver(tokens.clone(), factory.clone());

    let err = resolver
        .resolve(
            &TemplateReference::new("contoso.azurecr.io/templates:v1"),
            "",
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::RegistryAuthFailed);
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fetch_failure_is_template_fetch_failure() {
    let tokens = CountingTokenProvider::ok();
    let factory = StaticFactory::new(Err(RegistryError::ConnectionFailed(
        "connection refused".into(),
    )));
    let resolver = resolver(tokens, factory);

    let err = resolver
        .resolve(
            &TemplateReference::new("test.azurecr.io/templates:v1"),
            "test.azurecr.io",
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::TemplateFetchFailed);
}

#[tokio::test]
async fn test_empty_hosted_collection_is_rejected() {
    let tokens = CountingTokenProvider::ok();
    let factory = StaticFactory::new(Ok(TemplateCollection::new(vec![TemplateLayer::default()])));
    let resolver = resolver(tokens, factory);

    let err = resolver
        .resolve(
            &TemplateReference::new("contoso.azurecr.io/empty:v1"),
            "",
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::TemplateFetchFailed);
}

#[tokio::test]
async fn test_malformed_reference_requests_no_token() {
    let tokens = CountingTokenProvider::ok();
    let factory = StaticFactory::new(Ok(hosted_collection()));
    let resolver = resolver(tokens.clone(), factory);

    let err = resolver
        .resolve(
            &TemplateReference::new("contoso.azurecr.io/Templates:v1 with spaces"),
            "",
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::TemplateFetchFailed);
    assert_eq!(tokens.calls(), 0);
}

#[tokio::test]
async fn test_reference_without_repository_is_template_fetch_failure() {
    let tokens = CountingTokenProvider::ok();
    let factory = StaticFactory::new(Ok(hosted_collection()));
    let resolver = resolver(tokens.clone(), factory.clone());

    let err = resolver
        .resolve(
            &TemplateReference::new("test.azurecr.io"),
            "test.azurecr.io",
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::TemplateFetchFailed);
    assert_eq!(tokens.calls(), 0);
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_default_sentinel_is_case_insensitive() {
    let tokens = CountingTokenProvider::ok();
    let factory = StaticFactory::new(Ok(hosted_collection()));
    let resolver = resolver(tokens.clone(), factory);

    let collection = resolver
        .resolve(
            &TemplateReference::new("MicrosoftHealth/FhirConverter:Default"),
            "",
            &never_cancelled(),
        )
        .await
        .unwrap();

    assert!(collection.contains("ADT_A04"));
    assert_eq!(tokens.calls(), 0);
}

#[tokio::test]
async fn test_cancellation_during_token_acquisition_returns_promptly() {
    let tokens = CountingTokenProvider::slow(Duration::from_secs(30));
    let factory = StaticFactory::new(Ok(hosted_collection()));
    let resolver = resolver(tokens.clone(), factory.clone());
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cancel_tx.send(true);
    });

    let started = std::time::Instant::now();
    let err = resolver
        .resolve(
            &TemplateReference::new("contoso.azurecr.io/templates:v1"),
            "",
            &cancel_rx,
        )
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.kind(), ConversionErrorKind::TemplateFetchFailed);
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unconfigured_registry_is_registry_auth_failure() {
    let resolver = TemplateCollectionResolver::from_config(&BridgeConfig::default());

    let err = resolver
        .resolve(
            &TemplateReference::new("unknown.azurecr.io/templates:v1"),
            "",
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::RegistryAuthFailed);
}

// OCI transport against a mock registry

fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn digest(content: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(content))
}

fn manifest(layers: &[(&[u8], String)]) -> String {
    let layers: Vec<serde_json::Value> = layers
        .iter()
        .map(|(blob, digest)| {
            serde_json::json!({
                "mediaType": "application/vnd.oci.image.layer.v1.tar+gzip",
                "digest": digest,
                "size": blob.len(),
            })
        })
        .collect();
    serde_json::json!({ "schemaVersion": 2, "layers": layers }).to_string()
}

fn mock_registry_resolver(server: &mockito::ServerGuard) -> TemplateCollectionResolver {
    let mut registry = RegistryServerConfig::anonymous(server.host_with_port());
    registry.retry.max_retries = 1;
    registry.retry.initial_delay_ms = 1;
    registry.retry.max_delay_ms = 1;

    TemplateCollectionResolver::new(
        Arc::new(ConfiguredTokenProvider::new(vec![registry.clone()])),
        Arc::new(EmbeddedCollectionProvider::new()),
        Arc::new(OciCollectionProviderFactory::new(vec![registry])),
    )
}

#[tokio::test]
async fn test_pull_from_mock_registry() {
    let mut server = mockito::Server::new_async().await;
    let blob = tarball(&[("ADT_A01.hbs", "{ \"resourceType\": \"Bundle\" }")]);

    let _manifest = server
        .mock("GET", "/v2/templates/manifests/v1")
        .with_status(200)
        .with_body(manifest(&[(&blob, digest(&blob))]))
        .create_async()
        .await;
    let _blob = server
        .mock("GET", format!("/v2/templates/blobs/{}", digest(&blob)).as_str())
        .with_status(200)
        .with_body(blob.clone())
        .create_async()
        .await;

    let reference = TemplateReference::new(format!("{}/templates:v1", server.host_with_port()));
    let collection = mock_registry_resolver(&server)
        .resolve(&reference, "", &never_cancelled())
        .await
        .unwrap();

    assert!(collection.contains("ADT_A01"));
}

#[tokio::test]
async fn test_digest_mismatch_is_template_fetch_failure() {
    let mut server = mockito::Server::new_async().await;
    let blob = tarball(&[("ADT_A01.hbs", "{}")]);
    let tampered = tarball(&[("ADT_A01.hbs", "{ \"tampered\": true }")]);
    let declared = digest(&blob);

    let _manifest = server
        .mock("GET", "/v2/templates/manifests/v1")
        .with_status(200)
        .with_body(manifest(&[(&tampered, declared.clone())]))
        .create_async()
        .await;
    let _blob = server
        .mock("GET", format!("/v2/templates/blobs/{declared}").as_str())
        .with_status(200)
        .with_body(tampered.clone())
        .create_async()
        .await;

    let reference = TemplateReference::new(format!("{}/templates:v1", server.host_with_port()));
    let err = mock_registry_resolver(&server)
        .resolve(&reference, "", &never_cancelled())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::TemplateFetchFailed);
}

#[tokio::test]
async fn test_registry_refusal_is_registry_auth_failure() {
    let mut server = mockito::Server::new_async().await;
    let _manifest = server
        .mock("GET", "/v2/templates/manifests/v1")
        .with_status(401)
        .create_async()
        .await;

    let reference = TemplateReference::new(format!("{}/templates:v1", server.host_with_port()));
    let err = mock_registry_resolver(&server)
        .resolve(&reference, "", &never_cancelled())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::RegistryAuthFailed);
}

#[tokio::test]
async fn test_unreachable_registry_is_template_fetch_failure() {
    let mut registry = RegistryServerConfig::anonymous("127.0.0.1:1");
    registry.retry.max_retries = 1;
    registry.retry.initial_delay_ms = 1;
    registry.retry.max_delay_ms = 1;
    let resolver = TemplateCollectionResolver::new(
        Arc::new(ConfiguredTokenProvider::new(vec![registry.clone()])),
        Arc::new(EmbeddedCollectionProvider::new()),
        Arc::new(OciCollectionProviderFactory::new(vec![registry])),
    );

    let err = resolver
        .resolve(
            &TemplateReference::new("127.0.0.1:1/templates:v1"),
            "",
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::TemplateFetchFailed);
}
