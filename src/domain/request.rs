//! Conversion request model
//!
//! A [`ConversionRequest`] describes one conversion job: the raw message, what
//! kind of message it is, which template collection to use and which template
//! to start rendering from.

use super::reference::TemplateReference;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of source message
///
/// This is a closed set. A tag being known does not imply a converter is
/// registered for it; the dispatcher reports
/// [`ConversionErrorKind::InvalidInputType`](super::ConversionErrorKind::InvalidInputType)
/// for tags without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputDataType {
    /// HL7 version 2 pipe-delimited messages
    Hl7v2,
    /// Arbitrary JSON documents
    Json,
    /// HL7 C-CDA XML documents
    Ccda,
}

impl InputDataType {
    /// All known tags
    pub const ALL: [InputDataType; 3] = [Self::Hl7v2, Self::Json, Self::Ccda];

    /// Lower-case tag used in configuration and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hl7v2 => "hl7v2",
            Self::Json => "json",
            Self::Ccda => "ccda",
        }
    }
}

impl fmt::Display for InputDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hl7v2" => Ok(Self::Hl7v2),
            "json" => Ok(Self::Json),
            "ccda" | "cda" => Ok(Self::Ccda),
            _ => Err(format!(
                "Unknown input data type '{s}'. Expected one of: hl7v2, json, ccda"
            )),
        }
    }
}

/// One conversion job
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    /// Raw input message. Never logged.
    pub input_data: String,

    /// Declared kind of the input
    pub input_type: InputDataType,

    /// Collection to render with
    pub template_reference: TemplateReference,

    /// Name of the template rendering starts from
    pub root_template: String,

    /// Registry server used to acquire a token; empty means "derive from the reference"
    pub registry_server: String,
}

impl ConversionRequest {
    /// Returns a builder for constructing a request
    pub fn builder() -> ConversionRequestBuilder {
        ConversionRequestBuilder::default()
    }
}

/// Builder for [`ConversionRequest`]
#[derive(Debug, Default)]
pub struct ConversionRequestBuilder {
    input_data: Option<String>,
    input_type: Option<InputDataType>,
    template_reference: Option<TemplateReference>,
    root_template: Option<String>,
    registry_server: Option<String>,
}

impl ConversionRequestBuilder {
    /// Sets the raw input
    pub fn input_data(mut self, input: impl Into<String>) -> Self {
        self.input_data = Some(input.into());
        self
    }

    /// Sets the input type
    pub fn input_type(mut self, input_type: InputDataType) -> Self {
        self.input_type = Some(input_type);
        self
    }

    /// Sets the template collection reference
    pub fn template_reference(mut self, reference: TemplateReference) -> Self {
        self.template_reference = Some(reference);
        self
    }

    /// Sets the entry template name
    pub fn root_template(mut self, name: impl Into<String>) -> Self {
        self.root_template = Some(name.into());
        self
    }

    /// Sets the registry server identifier
    pub fn registry_server(mut self, server: impl Into<String>) -> Self {
        self.registry_server = Some(server.into());
        self
    }

    /// Builds the request
    ///
    /// The template reference defaults to the built-in collection and the
    /// registry server to empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the input, the input type or the entry template is missing,
    /// or if the entry template name is blank.
    pub fn build(self) -> Result<ConversionRequest, String> {
        let input_data = self.input_data.ok_or("input_data is required")?;
        let input_type = self.input_type.ok_or("input_type is required")?;
        let root_template = self.root_template.ok_or("root_template is required")?;

        if root_template.trim().is_empty() {
            return Err("root_template cannot be empty".to_string());
        }

        Ok(ConversionRequest {
            input_data,
            input_type,
            template_reference: self
                .template_reference
                .unwrap_or_else(TemplateReference::default_collection),
            root_template,
            registry_server: self.registry_server.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("hl7v2", InputDataType::Hl7v2 ; "lower case")]
    #[test_case("Hl7v2", InputDataType::Hl7v2 ; "mixed case")]
    #[test_case("JSON", InputDataType::Json ; "upper case json")]
    #[test_case("cda", InputDataType::Ccda ; "cda alias")]
    fn test_input_type_from_str(input: &str, expected: InputDataType) {
        assert_eq!(InputDataType::from_str(input).unwrap(), expected);
    }

    #[test]
    fn test_input_type_unknown() {
        let err = InputDataType::from_str("x12").unwrap_err();
        assert!(err.contains("Unknown input data type"));
    }

    #[test]
    fn test_input_type_display_round_trips() {
        for tag in InputDataType::ALL {
            assert_eq!(InputDataType::from_str(&tag.to_string()).unwrap(), tag);
        }
    }

    #[test]
    fn test_builder_defaults_to_builtin_collection() {
        let request = ConversionRequest::builder()
            .input_data("MSH|^~\\&|")
            .input_type(InputDataType::Hl7v2)
            .root_template("ADT_A01")
            .build()
            .unwrap();

        assert!(request.template_reference.is_default());
        assert_eq!(request.registry_server, "");
    }

    #[test]
    fn test_builder_rejects_blank_root_template() {
        let result = ConversionRequest::builder()
            .input_data("{}")
            .input_type(InputDataType::Json)
            .root_template("   ")
            .build();

        assert_eq!(result.unwrap_err(), "root_template cannot be empty");
    }

    #[test]
    fn test_builder_requires_input_type() {
        let result = ConversionRequest::builder()
            .input_data("{}")
            .root_template("Root")
            .build();

        assert!(result.is_err());
    }
}
