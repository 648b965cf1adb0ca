//! Registry collaborator traits
//!
//! The resolver depends only on these traits. The crate ships implementations
//! for configured credentials ([`super::ConfiguredTokenProvider`]), the
//! embedded default collection and OCI registries; tests substitute their own.

use crate::core::cancel::CancelSignal;
use crate::domain::{AccessToken, ImageReference, RegistryError, TemplateCollection};
use async_trait::async_trait;

/// Issues access tokens for registry servers
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquires a token for `server`
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotConfigured`] if nothing is known about `server`
    /// - [`RegistryError::AuthenticationFailed`] if credentials are rejected
    /// - [`RegistryError::Cancelled`] if the signal is raised first
    async fn get_token(
        &self,
        server: &str,
        cancel: &CancelSignal,
    ) -> Result<AccessToken, RegistryError>;
}

/// Supplies the built-in default collection without I/O
pub trait DefaultCollectionProvider: Send + Sync {
    fn get_collection(&self) -> Result<TemplateCollection, RegistryError>;
}

/// Fetches one registry-hosted collection
#[async_trait]
pub trait CollectionProvider: Send + Sync {
    /// Pulls and validates the collection
    async fn get_collection(
        &self,
        cancel: &CancelSignal,
    ) -> Result<TemplateCollection, RegistryError>;
}

/// Creates collection providers bound to a reference and a token
pub trait CollectionProviderFactory: Send + Sync {
    fn create_provider(
        &self,
        reference: &ImageReference,
        token: AccessToken,
    ) -> Result<Box<dyn CollectionProvider>, RegistryError>;
}
