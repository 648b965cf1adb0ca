//! HL7v2 pipe-and-hat message parser
//!
//! Produces the JSON data model templates are rendered against:
//!
//! ```text
//! {
//!   "message_type": "ADT", "trigger_event": "A01",
//!   "control_id": "...", "version": "2.5",
//!   "PID": { "f3": { "value": "...", "c1": "...", "reps": [...] }, ... },
//!   "segments": { "PID": [ ... ], "OBX": [ ... ] }
//! }
//! ```
//!
//! Every segment id also appears at the top level bound to its first
//! occurrence. Fields are numbered from 1 as in the HL7v2 standard, so for
//! `MSH` the field separator itself is `f1` and the encoding characters `f2`.

use serde_json::{Map, Value};

/// Delimiters declared by MSH-1 and MSH-2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

/// A parsed segment
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: String,
    /// Field values indexed from 1; index 0 is unused
    fields: Vec<String>,
}

impl Segment {
    /// Raw (undecoded) text of field `n`
    pub fn field(&self, n: usize) -> Option<&str> {
        self.fields.get(n).map(String::as_str)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len().saturating_sub(1)
    }
}

/// A parsed message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub delimiters: Delimiters,
    pub segments: Vec<Segment>,
}

/// Parses raw HL7v2 text into a [`Message`]
///
/// # Errors
///
/// Returns a description of the first structural problem found.
pub fn parse_message(raw: &str) -> Result<Message, String> {
    let mut lines = raw
        .split(['\r', '\n'])
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| "Message is empty".to_string())?
        .trim_start_matches('\u{feff}');

    if !header.starts_with("MSH") {
        return Err("Message must start with an MSH segment".to_string());
    }
    let delimiters = parse_delimiters(header)?;

    let mut segments = vec![parse_segment(header, &delimiters, true)?];
    for line in lines {
        segments.push(parse_segment(line, &delimiters, false)?);
    }

    let message = Message {
        delimiters,
        segments,
    };

    let msh9 = message.segments[0].field(9).unwrap_or_default();
    if msh9.trim().is_empty() {
        return Err("MSH-9 (message type) is missing".to_string());
    }

    Ok(message)
}

fn parse_delimiters(header: &str) -> Result<Delimiters, String> {
    let chars: Vec<char> = header.chars().collect();
    if chars.len() < 8 {
        return Err(format!(
            "MSH segment is too short ({} characters)",
            chars.len()
        ));
    }

    let field = chars[3];
    if field.is_alphanumeric() {
        return Err(format!("Invalid field separator '{field}'"));
    }

    let encoding: Vec<char> = chars[4..].iter().take_while(|c| **c != field).copied().collect();
    if encoding.len() < 2 || encoding.len() > 5 {
        return Err(format!(
            "MSH-2 must declare 2 to 5 encoding characters, found {}",
            encoding.len()
        ));
    }

    let defaults = Delimiters::default();
    let delimiters = Delimiters {
        field,
        component: encoding[0],
        repetition: encoding[1],
        escape: encoding.get(2).copied().unwrap_or(defaults.escape),
        subcomponent: encoding.get(3).copied().unwrap_or(defaults.subcomponent),
    };

    let all = [
        delimiters.field,
        delimiters.component,
        delimiters.repetition,
        delimiters.escape,
        delimiters.subcomponent,
    ];
    for (i, c) in all.iter().enumerate() {
        if all[i + 1..].contains(c) {
            return Err(format!("Delimiter '{c}' is declared more than once"));
        }
    }

    Ok(delimiters)
}

fn parse_segment(line: &str, delimiters: &Delimiters, is_header: bool) -> Result<Segment, String> {
    let parts: Vec<&str> = line.split(delimiters.field).collect();
    let id = parts[0].trim();

    if id.len() != 3
        || !id
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(format!("Invalid segment id '{id}'"));
    }
    if !is_header && id == "MSH" {
        return Err("Unexpected second MSH segment".to_string());
    }

    let mut fields = vec![String::new()];
    if is_header {
        fields.push(delimiters.field.to_string());
    }
    fields.extend(parts[1..].iter().map(|s| s.to_string()));

    Ok(Segment {
        id: id.to_string(),
        fields,
    })
}

/// Decodes HL7v2 escape sequences in `text`
///
/// Unknown sequences are kept verbatim.
pub fn decode_escapes(text: &str, delimiters: &Delimiters) -> String {
    let esc = delimiters.escape;
    if !text.contains(esc) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(esc) {
        out.push_str(&rest[..start]);
        let after = &rest[start + esc.len_utf8()..];
        match after.find(esc) {
            Some(end) => {
                let code = &after[..end];
                match code {
                    "F" => out.push(delimiters.field),
                    "S" => out.push(delimiters.component),
                    "T" => out.push(delimiters.subcomponent),
                    "R" => out.push(delimiters.repetition),
                    "E" => out.push(esc),
                    ".br" => out.push('\n'),
                    _ => {
                        out.push(esc);
                        out.push_str(code);
                        out.push(esc);
                    }
                }
                rest = &after[end + esc.len_utf8()..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn repetition_value(text: &str, delimiters: &Delimiters) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert(
        "value".to_string(),
        Value::String(decode_escapes(text, delimiters)),
    );
    for (i, component) in text.split(delimiters.component).enumerate() {
        obj.insert(
            format!("c{}", i + 1),
            Value::String(decode_escapes(component, delimiters)),
        );
    }
    obj
}

fn field_value(text: &str, delimiters: &Delimiters, literal: bool) -> Value {
    if literal {
        let mut obj = Map::new();
        obj.insert("value".to_string(), Value::String(text.to_string()));
        obj.insert("c1".to_string(), Value::String(text.to_string()));
        return Value::Object(obj);
    }

    let reps: Vec<Map<String, Value>> = text
        .split(delimiters.repetition)
        .map(|rep| repetition_value(rep, delimiters))
        .collect();

    let mut obj = reps.first().cloned().unwrap_or_default();
    obj.insert(
        "reps".to_string(),
        Value::Array(reps.into_iter().map(Value::Object).collect()),
    );
    Value::Object(obj)
}

fn segment_value(segment: &Segment, delimiters: &Delimiters) -> Value {
    let mut obj = Map::new();
    obj.insert("id".to_string(), Value::String(segment.id.clone()));
    for n in 1..segment.fields.len() {
        // MSH-1 and MSH-2 hold delimiters and are never split or decoded
        let literal = segment.id == "MSH" && n <= 2;
        obj.insert(
            format!("f{n}"),
            field_value(&segment.fields[n], delimiters, literal),
        );
    }
    Value::Object(obj)
}

impl Message {
    /// The first segment with the given id
    pub fn segment(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == id)
    }

    fn header_component(&self, field: usize, component: usize) -> String {
        let raw = self
            .segment("MSH")
            .and_then(|msh| msh.field(field))
            .unwrap_or_default();
        let first_rep = raw.split(self.delimiters.repetition).next().unwrap_or_default();
        let value = first_rep
            .split(self.delimiters.component)
            .nth(component)
            .unwrap_or_default();
        decode_escapes(value, &self.delimiters)
    }

    /// Message type (MSH-9.1), e.g. `ADT`
    pub fn message_type(&self) -> String {
        self.header_component(9, 0)
    }

    /// Trigger event (MSH-9.2), e.g. `A01`
    pub fn trigger_event(&self) -> String {
        self.header_component(9, 1)
    }

    /// Builds the template data model
    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "message_type".to_string(),
            Value::String(self.message_type()),
        );
        root.insert(
            "trigger_event".to_string(),
            Value::String(self.trigger_event()),
        );
        root.insert(
            "control_id".to_string(),
            Value::String(self.header_component(10, 0)),
        );
        root.insert("version".to_string(), Value::String(self.header_component(12, 0)));

        let mut grouped: Map<String, Value> = Map::new();
        for segment in &self.segments {
            let value = segment_value(segment, &self.delimiters);
            if !root.contains_key(&segment.id) {
                root.insert(segment.id.clone(), value.clone());
            }
            if let Value::Array(items) = grouped
                .entry(segment.id.clone())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                items.push(value);
            }
        }
        root.insert("segments".to_string(), Value::Object(grouped));

        Value::Object(root)
    }
}
