//! Template helpers available to every collection

use chrono::NaiveDate;
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Registers all helpers on `handlebars`
pub fn register_helpers(handlebars: &mut Handlebars<'_>) {
    handlebars.register_helper("fhir_date", Box::new(fhir_date_helper));
    handlebars.register_helper("gen_id", Box::new(gen_id_helper));
    handlebars.register_helper("gender", Box::new(gender_helper));
    handlebars.register_helper("upper", Box::new(upper_helper));
    handlebars.register_helper("lower", Box::new(lower_helper));
    handlebars.register_helper("concat", Box::new(concat_helper));
}

/// Text of a helper parameter
///
/// HL7v2 fields are objects carrying their full text under `value`, so a
/// field can be passed as-is.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(map) => map.get("value").map(value_text).unwrap_or_default(),
        other => other.to_string(),
    }
}

fn param_text(h: &Helper, index: usize) -> String {
    h.param(index)
        .map(|p| value_text(p.value()))
        .unwrap_or_default()
}

fn fhir_date_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let formatted = format_hl7_datetime(&param_text(h, 0)).unwrap_or_default();
    out.write(&formatted)?;
    Ok(())
}

fn gen_id_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let parts: Vec<String> = h.params().iter().map(|p| value_text(p.value())).collect();
    out.write(&generate_id(&parts))?;
    Ok(())
}

fn gender_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(administrative_gender(&param_text(h, 0)))?;
    Ok(())
}

fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_text(h, 0).to_uppercase())?;
    Ok(())
}

fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_text(h, 0).to_lowercase())?;
    Ok(())
}

fn concat_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let joined: String = h.params().iter().map(|p| value_text(p.value())).collect();
    out.write(&joined)?;
    Ok(())
}

/// Converts an HL7v2 `DT`/`TS` value into a FHIR `date` or `dateTime`
///
/// Returns `None` for values that are not a valid date. Precision follows the
/// input: `YYYY`, `YYYY-MM`, `YYYY-MM-DD` or a full date-time. A UTC offset is
/// only emitted when the source carries one.
pub fn format_hl7_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (stamp, offset) = match raw.find(['+', '-']) {
        Some(idx) => (&raw[..idx], Some(&raw[idx..])),
        None => (raw, None),
    };
    let stamp = stamp.split('.').next().unwrap_or_default();

    if stamp.is_empty() || !stamp.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let num = |range: std::ops::Range<usize>| -> Option<u32> { stamp.get(range)?.parse().ok() };

    let year = num(0..4)?;
    match stamp.len() {
        4 => Some(format!("{year:04}")),
        6 => {
            let month = num(4..6)?;
            (1..=12)
                .contains(&month)
                .then(|| format!("{year:04}-{month:02}"))
        }
        8 => {
            let date = NaiveDate::from_ymd_opt(year as i32, num(4..6)?, num(6..8)?)?;
            Some(date.format("%Y-%m-%d").to_string())
        }
        10 | 12 | 14 => {
            let date = NaiveDate::from_ymd_opt(year as i32, num(4..6)?, num(6..8)?)?;
            let hour = num(8..10)?;
            let minute = if stamp.len() >= 12 { num(10..12)? } else { 0 };
            let second = if stamp.len() == 14 { num(12..14)? } else { 0 };
            let datetime = date.and_hms_opt(hour, minute, second)?;

            let mut formatted = datetime.format("%Y-%m-%dT%H:%M:%S").to_string();
            if let Some(offset) = offset {
                formatted.push_str(&format_utc_offset(offset)?);
            }
            Some(formatted)
        }
        _ => None,
    }
}

fn format_utc_offset(offset: &str) -> Option<String> {
    let (sign, digits) = offset.split_at(1);
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{sign}{}:{}", &digits[..2], &digits[2..]))
}

/// Deterministic UUID-shaped identifier for the given parts
pub fn generate_id(parts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).hyphenated().to_string()
}

/// HL7v2 administrative sex (table 0001) to FHIR administrative gender
pub fn administrative_gender(code: &str) -> &'static str {
    match code.trim().to_ascii_uppercase().as_str() {
        "" => "",
        "M" => "male",
        "F" => "female",
        "O" | "A" => "other",
        _ => "unknown",
    }
}
