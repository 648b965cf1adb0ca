//! Template layer extraction
//!
//! A template layer is a gzip-compressed tarball. Files ending in `.hbs`,
//! `.handlebars` or `.liquid` become templates named by their path inside the
//! archive without the extension; everything else is ignored.

use crate::domain::{RegistryError, Template, TemplateLayer};
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use std::path::{Component, Path};
use tar::Archive;

/// File extensions recognised as templates
pub const TEMPLATE_EXTENSIONS: [&str; 3] = ["hbs", "handlebars", "liquid"];

/// Extracts the templates of one layer
///
/// `max_unpacked_bytes` bounds the total size of the extracted templates.
///
/// # Errors
///
/// [`RegistryError::ValidationFailed`] if the blob is not a gzip tarball,
/// contains an unsafe path or non UTF-8 template, or unpacks past the limit.
pub fn extract_layer(blob: &[u8], max_unpacked_bytes: u64) -> Result<TemplateLayer, RegistryError> {
    let invalid = |e: std::io::Error| {
        RegistryError::ValidationFailed(format!("Layer is not a valid gzip tarball: {e}"))
    };

    let mut archive = Archive::new(GzDecoder::new(Cursor::new(blob)));
    let mut templates = Vec::new();
    let mut unpacked: u64 = 0;

    for entry in archive.entries().map_err(invalid)? {
        let mut entry = entry.map_err(invalid)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path().map_err(invalid)?.into_owned();
        let Some(name) = template_name(&path)? else {
            continue;
        };

        unpacked += entry.size();
        if unpacked > max_unpacked_bytes {
            return Err(RegistryError::ValidationFailed(format!(
                "Layer unpacks to more than {max_unpacked_bytes} bytes"
            )));
        }

        let mut source = String::new();
        entry.read_to_string(&mut source).map_err(|e| {
            RegistryError::ValidationFailed(format!("Template '{name}' is not valid UTF-8: {e}"))
        })?;

        templates.push(Template::new(name, source));
    }

    Ok(TemplateLayer::from_templates(templates))
}

/// Template name for an archive path, or `None` if the file is not a template
fn template_name(path: &Path) -> Result<Option<String>, RegistryError> {
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(RegistryError::ValidationFailed(format!(
            "Layer contains unsafe path '{}'",
            path.display()
        )));
    }

    let normalized = path.to_string_lossy().replace('\\', "/");
    let normalized = normalized.trim_start_matches("./");

    let Some((stem, extension)) = normalized.rsplit_once('.') else {
        return Ok(None);
    };
    if stem.is_empty() || stem.ends_with('/') {
        return Ok(None);
    }

    let is_template = TEMPLATE_EXTENSIONS
        .iter()
        .any(|ext| extension.eq_ignore_ascii_case(ext));
    Ok(is_template.then(|| stem.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    /// Builds a gzip tarball from `(path, contents)` pairs
    pub(crate) fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
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

    #[test]
    fn test_extract_templates() {
        let blob = tarball(&[
            ("ADT_A01.hbs", "{}"),
            ("./Resources/Patient.handlebars", "{ \"resourceType\": \"Patient\" }"),
            ("Legacy/Observation.liquid", "{}"),
            ("README.md", "ignored"),
        ]);

        let layer = extract_layer(&blob, 1024).unwrap();
        assert_eq!(layer.len(), 3);
        assert!(layer.get("ADT_A01").is_some());
        assert!(layer.get("Resources/Patient").is_some());
        assert!(layer.get("Legacy/Observation").is_some());
        assert!(layer.get("README").is_none());
    }

    #[test]
    fn test_rejects_non_gzip() {
        let err = extract_layer(b"definitely not gzip", 1024).unwrap_err();
        assert!(matches!(err, RegistryError::ValidationFailed(_)));
    }

    #[test]
    fn test_rejects_oversized_layer() {
        let big = "x".repeat(2048);
        let blob = tarball(&[("Big.hbs", &big)]);
        let err = extract_layer(&blob, 1024).unwrap_err();
        assert!(matches!(err, RegistryError::ValidationFailed(_)));
    }

    #[test]
    fn test_template_name() {
        assert_eq!(
            template_name(Path::new("a/b.hbs")).unwrap().as_deref(),
            Some("a/b")
        );
        assert_eq!(template_name(Path::new("a/b.json")).unwrap(), None);
        assert_eq!(template_name(Path::new("noext")).unwrap(), None);
        assert!(template_name(Path::new("../escape.hbs")).is_err());
    }
}
