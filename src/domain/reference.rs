//! Template collection references
//!
//! A [`TemplateReference`] is the opaque string a caller uses to pick a template
//! collection. It is either the built-in default sentinel or a registry-hosted
//! image reference, which parses into an [`ImageReference`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel identifying the embedded default template collection
pub const DEFAULT_TEMPLATE_REFERENCE: &str = "microsofthealth/fhirconverter:default";

/// Tag used when a registry reference names neither a tag nor a digest
pub const DEFAULT_TAG: &str = "latest";

/// How a reference is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// The embedded collection; no network access, no token
    Default,
    /// A collection hosted in an OCI registry
    Registry,
}

/// Opaque identifier of a template collection
///
/// # Examples
///
/// ```
/// use fhir_bridge::domain::reference::{ReferenceKind, TemplateReference};
///
/// let builtin = TemplateReference::new("MicrosoftHealth/FhirConverter:Default");
/// assert_eq!(builtin.kind(), ReferenceKind::Default);
///
/// let custom = TemplateReference::new("contoso.azurecr.io/hl7v2/templates:v2");
/// assert_eq!(custom.kind(), ReferenceKind::Registry);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateReference(String);

impl TemplateReference {
    /// Wraps a reference string
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The built-in default collection
    pub fn default_collection() -> Self {
        Self(DEFAULT_TEMPLATE_REFERENCE.to_string())
    }

    /// Classifies the reference by case-insensitive match against the sentinel
    pub fn kind(&self) -> ReferenceKind {
        if self.0.eq_ignore_ascii_case(DEFAULT_TEMPLATE_REFERENCE) {
            ReferenceKind::Default
        } else {
            ReferenceKind::Registry
        }
    }

    /// Whether this names the built-in collection
    pub fn is_default(&self) -> bool {
        self.kind() == ReferenceKind::Default
    }

    /// Returns the reference as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses a registry-hosted reference into its parts
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the reference is not a valid
    /// `registry/repository[:tag|@digest]` image reference.
    pub fn to_image_reference(&self) -> Result<ImageReference, String> {
        ImageReference::parse(&self.0)
    }
}

impl fmt::Display for TemplateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TemplateReference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl AsRef<str> for TemplateReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Tag or digest part of an image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageVersion {
    /// Mutable tag, e.g. `v1`
    Tag(String),
    /// Content digest, e.g. `sha256:...`
    Digest(String),
}

impl ImageVersion {
    /// The string used in the manifest URL
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tag(tag) => tag,
            Self::Digest(digest) => digest,
        }
    }
}

/// Parsed registry-hosted template reference
///
/// Format: `registry/repository[:tag|@sha256:<hex>]`. The registry must be an
/// explicit host (containing `.` or `:`, or `localhost`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Registry host, optionally with port
    pub registry: String,
    /// Repository path within the registry
    pub repository: String,
    /// Tag or digest
    pub version: ImageVersion,
}

impl ImageReference {
    /// Parses an image reference
    ///
    /// # Examples
    ///
    /// ```
    /// use fhir_bridge::domain::reference::{ImageReference, ImageVersion};
    ///
    /// let image = ImageReference::parse("localhost:5000/templates/hl7v2:v1").unwrap();
    /// assert_eq!(image.registry, "localhost:5000");
    /// assert_eq!(image.repository, "templates/hl7v2");
    /// assert_eq!(image.version, ImageVersion::Tag("v1".to_string()));
    ///
    /// assert!(ImageReference::parse("test.azurecr.io").is_err());
    /// ```
    pub fn parse(reference: &str) -> Result<Self, String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err("Template reference cannot be empty".to_string());
        }

        let (name, version) = match reference.split_once('@') {
            Some((name, digest)) => {
                validate_digest(digest)?;
                (name, ImageVersion::Digest(digest.to_string()))
            }
            None => {
                let last_slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
                match reference[last_slash..].rfind(':') {
                    Some(colon) => {
                        let split = last_slash + colon;
                        let tag = &reference[split + 1..];
                        validate_tag(tag)?;
                        (&reference[..split], ImageVersion::Tag(tag.to_string()))
                    }
                    None => (reference, ImageVersion::Tag(DEFAULT_TAG.to_string())),
                }
            }
        };

        let (registry, repository) = name.split_once('/').ok_or_else(|| {
            format!(
                "Template reference '{reference}' is missing a repository. \
                Expected format: <registry>/<repository>[:tag|@digest]"
            )
        })?;

        if !is_registry_host(registry) {
            return Err(format!(
                "Template reference '{reference}' does not start with a registry host"
            ));
        }

        validate_repository(repository)?;

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            version,
        })
    }

    /// Whether the reference pins content by digest
    pub fn is_digest(&self) -> bool {
        matches!(self.version, ImageVersion::Digest(_))
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            ImageVersion::Tag(tag) => write!(f, "{}/{}:{}", self.registry, self.repository, tag),
            ImageVersion::Digest(digest) => {
                write!(f, "{}/{}@{}", self.registry, self.repository, digest)
            }
        }
    }
}

fn is_registry_host(host: &str) -> bool {
    !host.is_empty() && (host.contains('.') || host.contains(':') || host == "localhost")
}

fn validate_repository(repository: &str) -> Result<(), String> {
    if repository.is_empty() {
        return Err("Repository cannot be empty".to_string());
    }

    for component in repository.split('/') {
        let valid = !component.is_empty()
            && component
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c))
            && component
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(format!(
                "Invalid repository '{repository}'. Components must be lower-case alphanumerics separated by '.', '_' or '-'"
            ));
        }
    }
    Ok(())
}

fn validate_tag(tag: &str) -> Result<(), String> {
    let valid = !tag.is_empty()
        && tag.len() <= 128
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_.-".contains(c))
        && !tag.starts_with(['.', '-']);
    if valid {
        Ok(())
    } else {
        Err(format!("Invalid image tag '{tag}'"))
    }
}

fn validate_digest(digest: &str) -> Result<(), String> {
    let hex = digest
        .strip_prefix("sha256:")
        .ok_or_else(|| format!("Unsupported digest '{digest}'. Only sha256 is supported"))?;
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return Err(format!("Invalid sha256 digest '{digest}'"));
    }
    Ok(())
}
