//! Template collection resolution
//!
//! Turns a [`TemplateReference`] into a [`TemplateCollection`]. The default
//! sentinel is served from the embedded collection without any credentials.
//! Every other reference is parsed as a registry image, a token is acquired
//! for its registry server and the collection is pulled by a provider bound to
//! that token.

use crate::adapters::embedded::EmbeddedCollectionProvider;
use crate::adapters::registry::{
    CollectionProviderFactory, ConfiguredTokenProvider, DefaultCollectionProvider,
    OciCollectionProviderFactory, TokenProvider,
};
use crate::config::BridgeConfig;
use crate::core::cancel::{cancelled, is_cancelled, CancelSignal};
use crate::domain::{
    ConversionError, ConversionErrorKind, RegistryError, TemplateCollection, TemplateReference,
};
use crate::log_resolution_path;
use std::sync::Arc;

/// Step of a registry-hosted resolution at which a failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    /// Acquiring the access token
    Token,
    /// Pulling and validating the collection
    Fetch,
}

/// Resolves template references to template collections
///
/// # Example
///
/// ```no_run
/// use fhir_bridge::config::BridgeConfig;
/// use fhir_bridge::core::cancel::never_cancelled;
/// use fhir_bridge::core::resolve::TemplateCollectionResolver;
/// use fhir_bridge::domain::TemplateReference;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let resolver = TemplateCollectionResolver::from_config(&BridgeConfig::default());
/// let templates = resolver
///     .resolve(&TemplateReference::default_collection(), "", &never_cancelled())
///     .await?;
/// println!("{} templates", templates.template_count());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TemplateCollectionResolver {
    token_provider: Arc<dyn TokenProvider>,
    default_provider: Arc<dyn DefaultCollectionProvider>,
    factory: Arc<dyn CollectionProviderFactory>,
}

impl TemplateCollectionResolver {
    pub fn new(
        token_provider: Arc<dyn TokenProvider>,
        default_provider: Arc<dyn DefaultCollectionProvider>,
        factory: Arc<dyn CollectionProviderFactory>,
    ) -> Self {
        Self {
            token_provider,
            default_provider,
            factory,
        }
    }

    /// Wires the embedded default collection, configured registry credentials
    /// and the OCI registry transport
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            Arc::new(ConfiguredTokenProvider::new(config.registries.clone())),
            Arc::new(EmbeddedCollectionProvider::new()),
            Arc::new(OciCollectionProviderFactory::new(config.registries.clone())),
        )
    }

    /// Resolves `reference` to a non-empty template collection
    ///
    /// `registry_server` names the server to authenticate against. When it is
    /// empty the registry host of the reference is used.
    ///
    /// # Errors
    ///
    /// - `RegistryAuthFailed` when no token can be obtained or the registry
    ///   refuses the pull
    /// - `TemplateFetchFailed` for malformed references, fetch and validation
    ///   failures, empty collections and cancellation
    pub async fn resolve(
        &self,
        reference: &TemplateReference,
        registry_server: &str,
        cancel: &CancelSignal,
    ) -> Result<TemplateCollection, ConversionError> {
        let result = if reference.is_default() {
            log_resolution_path!("default", reference, registry_server);
            self.default_provider
                .get_collection()
                .map_err(|e| map_registry_error(e, ResolutionStage::Fetch))
        } else {
            log_resolution_path!("custom", reference, registry_server);
            self.resolve_registry(reference, registry_server, cancel)
                .await
        };

        let result = result.and_then(|collection| {
            if collection.is_empty() {
                Err(ConversionError::new(
                    ConversionErrorKind::TemplateFetchFailed,
                    format!("Template collection '{reference}' contains no templates"),
                ))
            } else {
                Ok(collection)
            }
        });

        match result {
            Ok(collection) => {
                tracing::info!(
                    reference = %reference,
                    layers = collection.layers().len(),
                    templates = collection.template_count(),
                    "Template collection resolved"
                );
                Ok(collection)
            }
            Err(err) => {
                tracing::error!(
                    kind = %err.kind(),
                    error = %err,
                    reference = %reference,
                    registry_server = %registry_server,
                    "Template collection resolution failed"
                );
                Err(err)
            }
        }
    }

    async fn resolve_registry(
        &self,
        reference: &TemplateReference,
        registry_server: &str,
        cancel: &CancelSignal,
    ) -> Result<TemplateCollection, ConversionError> {
        let image = reference.to_image_reference().map_err(|e| {
            map_registry_error(RegistryError::InvalidReference(e), ResolutionStage::Fetch)
        })?;

        let server = if registry_server.trim().is_empty() {
            image.registry.clone()
        } else {
            registry_server.trim().to_string()
        };

        if is_cancelled(cancel) {
            return Err(map_registry_error(
                RegistryError::Cancelled,
                ResolutionStage::Token,
            ));
        }

        let token = tokio::select! {
            token = self.token_provider.get_token(&server, cancel) => token,
            _ = cancelled(cancel) => Err(RegistryError::Cancelled),
        }
        .map_err(|e| map_registry_error(e, ResolutionStage::Token))?;

        tracing::debug!(
            server = %server,
            image = %image,
            "Registry token acquired"
        );

        let provider = self
            .factory
            .create_provider(&image, token)
            .map_err(|e| map_registry_error(e, ResolutionStage::Fetch))?;

        let collection = tokio::select! {
            collection = provider.get_collection(cancel) => collection,
            _ = cancelled(cancel) => Err(RegistryError::Cancelled),
        };
        collection.map_err(|e| map_registry_error(e, ResolutionStage::Fetch))
    }
}

/// Maps a registry-side failure to the conversion error taxonomy
///
/// Any failure while acquiring a token, other than cancellation, is an
/// authentication failure. During the fetch only an explicit refusal by the
/// registry is one; everything else is a fetch failure.
pub fn map_registry_error(err: RegistryError, stage: ResolutionStage) -> ConversionError {
    let kind = match (&err, stage) {
        (RegistryError::Cancelled, _) => ConversionErrorKind::TemplateFetchFailed,
        (RegistryError::InvalidReference(_), _) => ConversionErrorKind::TemplateFetchFailed,
        (RegistryError::Unexpected(_), _) => ConversionErrorKind::TemplateFetchFailed,
        (_, ResolutionStage::Token) => ConversionErrorKind::RegistryAuthFailed,
        (RegistryError::AuthenticationFailed(_) | RegistryError::Unauthorized(_), _) => {
            ConversionErrorKind::RegistryAuthFailed
        }
        (_, ResolutionStage::Fetch) => ConversionErrorKind::TemplateFetchFailed,
    };

    let message = match kind {
        ConversionErrorKind::RegistryAuthFailed => {
            format!("Failed to authenticate with the template registry: {err}")
        }
        _ => format!("Failed to fetch template collection: {err}"),
    };

    ConversionError::new(kind, message).with_source(err)
}
