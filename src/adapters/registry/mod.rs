//! Template registry integration
//!
//! - [`traits`] - collaborator traits consumed by the resolver
//! - [`token`] - token provider driven by `[[registries]]` configuration
//! - [`oci`] - OCI distribution transport
//! - [`archive`] - template layer extraction

pub mod archive;
pub mod oci;
pub mod token;
pub mod traits;

pub use oci::{OciCollectionProvider, OciCollectionProviderFactory};
pub use token::ConfiguredTokenProvider;
pub use traits::{
    CollectionProvider, CollectionProviderFactory, DefaultCollectionProvider, TokenProvider,
};
