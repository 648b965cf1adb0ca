//! End-to-end conversion tests against the embedded default collection

use async_trait::async_trait;
use fhir_bridge::config::BridgeConfig;
use fhir_bridge::core::cancel::{never_cancelled, CancelSignal};
use fhir_bridge::core::convert::{
    ConversionDispatcher, Converter, ConverterRegistry, ProcessorSettings,
};
use fhir_bridge::core::resolve::TemplateCollectionResolver;
use fhir_bridge::domain::{
    ConversionErrorKind, ConversionRequest, ConverterError, InputDataType, Template,
    TemplateCollection, TemplateLayer, TemplateReference,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const ADT_A01: &str = "MSH|^~\\&|SENDAPP|SENDFAC|RECVAPP|RECVFAC|20240115103045||ADT^A01^ADT_A01|MSG00001|P|2.5\r\
EVN|A01|20240115103045\r\
PID|1||MRN123^^^HOSP^MR||Smith^John^Q||19800314|M|||1 Main St^^Springfield^IL^62701\r\
PV1|1|I|WARD^101^A\r\
AL1|1|DA|PCN^Penicillin";

async fn default_templates() -> TemplateCollection {
    TemplateCollectionResolver::from_config(&BridgeConfig::default())
        .resolve(&TemplateReference::default_collection(), "", &never_cancelled())
        .await
        .unwrap()
}

fn default_dispatcher() -> ConversionDispatcher {
    let config = BridgeConfig::default();
    ConversionDispatcher::new(Arc::new(ConverterRegistry::from_config(&config.conversion)))
}

fn request(input: &str, input_type: InputDataType, entry: &str) -> ConversionRequest {
    ConversionRequest::builder()
        .input_data(input)
        .input_type(input_type)
        .root_template(entry)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_adt_a01_with_default_collection() {
    let templates = default_templates().await;
    let output = default_dispatcher()
        .convert(
            &request(ADT_A01, InputDataType::Hl7v2, "ADT_A01"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap();

    let bundle: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(bundle["resourceType"], "Bundle");

    let entries = bundle["entry"].as_array().unwrap();
    assert!(!entries.is_empty());
    let patient = entries
        .iter()
        .find(|e| e["resource"]["resourceType"] == "Patient")
        .expect("bundle contains a Patient");
    assert_eq!(patient["resource"]["name"][0]["family"], "Smith");
    assert_eq!(patient["resource"]["birthDate"], "1980-03-14");
}

#[tokio::test]
async fn test_conversion_is_deterministic() {
    let templates = default_templates().await;
    let dispatcher = default_dispatcher();
    let request = request(ADT_A01, InputDataType::Hl7v2, "ADT_A01");

    let first = dispatcher
        .convert(&request, &templates, &never_cancelled())
        .await
        .unwrap();
    let second = dispatcher
        .convert(&request, &templates, &never_cancelled())
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_json_patient_with_default_collection() {
    let templates = default_templates().await;
    let input = r#"{"id":"p-1","name":{"family":"Doe","given":["Jane"]},"birthDate":"1990-01-01","gender":"FEMALE"}"#;

    let output = default_dispatcher()
        .convert(
            &request(input, InputDataType::Json, "JsonPatient"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap();

    let patient: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(patient["resourceType"], "Patient");
    assert_eq!(patient["gender"], "female");
    assert_eq!(patient["name"][0]["given"][0], "Jane");
}

#[tokio::test]
async fn test_malformed_hl7v2_is_input_parse_error() {
    let templates = default_templates().await;
    let err = default_dispatcher()
        .convert(
            &request("PID|1||MRN123", InputDataType::Hl7v2, "ADT_A01"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::InputParseError);
}

#[tokio::test]
async fn test_malformed_json_is_input_parse_error() {
    let templates = default_templates().await;
    let err = default_dispatcher()
        .convert(
            &request("{ not json", InputDataType::Json, "JsonPatient"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::InputParseError);
}

#[tokio::test]
async fn test_unregistered_input_type_is_invalid_input_type() {
    let templates = default_templates().await;
    let err = default_dispatcher()
        .convert(
            &request("<ClinicalDocument/>", InputDataType::Ccda, "CCD"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::InvalidInputType);
}

#[tokio::test]
async fn test_template_compile_error_is_converter_init_error() {
    let templates = TemplateCollection::new(vec![TemplateLayer::from_templates([
        Template::new("Root", "{ \"id\": \"{{#if id}}\" }"),
    ])]);

    let err = default_dispatcher()
        .convert(
            &request("{\"id\":\"1\"}", InputDataType::Json, "Root"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::ConverterInitError);
}

#[tokio::test]
async fn test_missing_entry_template_is_convert_failed() {
    let templates = default_templates().await;
    let err = default_dispatcher()
        .convert(
            &request("{\"id\":\"1\"}", InputDataType::Json, "DoesNotExist"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::ConvertFailed);
}

#[tokio::test]
async fn test_upper_layer_overrides_lower_layer() {
    let templates = TemplateCollection::new(vec![
        TemplateLayer::from_templates([
            Template::new("Root", "{ \"layer\": \"base\", \"child\": {{> Child}} }"),
            Template::new("Child", "{ \"from\": \"base\" }"),
        ]),
        TemplateLayer::from_templates([Template::new("Child", "{ \"from\": \"overlay\" }")]),
    ]);

    let output = default_dispatcher()
        .convert(
            &request("{}", InputDataType::Json, "Root"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap();

    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["layer"], "base");
    assert_eq!(value["child"]["from"], "overlay");
}

/// Converter that never finishes before its budget
struct SlowConverter {
    settings: ProcessorSettings,
}

#[async_trait]
impl Converter for SlowConverter {
    fn input_type(&self) -> InputDataType {
        InputDataType::Json
    }

    fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    async fn render(
        &self,
        _raw_input: &str,
        _entry_template: &str,
        _templates: &TemplateCollection,
        _cancel: &CancelSignal,
    ) -> Result<String, ConverterError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("{}".to_string())
    }
}

fn slow_dispatcher() -> ConversionDispatcher {
    let registry = ConverterRegistry::builder()
        .register(Arc::new(SlowConverter {
            settings: ProcessorSettings::new(Duration::from_millis(50)),
        }))
        .build();
    ConversionDispatcher::new(Arc::new(registry))
}

#[tokio::test]
async fn test_slow_converter_is_convert_timeout() {
    let templates = default_templates().await;
    let started = std::time::Instant::now();

    let err = slow_dispatcher()
        .convert(
            &request("{}", InputDataType::Json, "JsonPatient"),
            &templates,
            &never_cancelled(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::ConvertTimeout);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancelled_conversion_is_convert_failed() {
    let templates = default_templates().await;
    let registry = ConverterRegistry::builder()
        .register(Arc::new(SlowConverter {
            settings: ProcessorSettings::new(Duration::from_secs(30)),
        }))
        .build();
    let dispatcher = ConversionDispatcher::new(Arc::new(registry));
    let (cancel_tx, cancel_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cancel_tx.send(true);
    });

    let err = dispatcher
        .convert(
            &request("{}", InputDataType::Json, "JsonPatient"),
            &templates,
            &cancel_rx,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ConversionErrorKind::ConvertFailed);
}
