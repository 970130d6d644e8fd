use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

lazy_static! {
    static ref QUESTION_RE: Regex = Regex::new(r#""question":\s*"([^"]*)""#).unwrap();
    static ref TYPE_RE: Regex = Regex::new(r#""type":\s*"([^"]*)""#).unwrap();
    static ref SUBTYPE_RE: Regex = Regex::new(r#""subtype":\s*"([^"]*)""#).unwrap();
    static ref SUB_RE: Regex = Regex::new(r#""sub":\s*"([^"]*)""#).unwrap();
}

pub const CSV_HEADERS: [&str; 7] = ["id", "question", "answer", "created_at", "ip", "type", "subtype"];

/// One output row. Field order here is the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedRecord {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub created_at: String,
    pub ip: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub subtype: String,
}

/// How the question/type/subtype fields of a record were recovered from `arg1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadStrategy {
    Parsed,
    Repaired,
    RegexFallback,
    Absent,
}

impl PayloadStrategy {
    pub const ALL: [PayloadStrategy; 4] = [
        PayloadStrategy::Parsed,
        PayloadStrategy::Repaired,
        PayloadStrategy::RegexFallback,
        PayloadStrategy::Absent,
    ];
}

impl fmt::Display for PayloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PayloadStrategy::Parsed => "parsed",
            PayloadStrategy::Repaired => "repaired",
            PayloadStrategy::RegexFallback => "regex fallback",
            PayloadStrategy::Absent => "absent",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    NotAnObject(&'static str),
    PayloadNotAnObject(&'static str),
    UnsupportedPayload(&'static str),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::NotAnObject(kind) => write!(f, "record is a JSON {} rather than an object", kind),
            ExtractError::PayloadNotAnObject(kind) => write!(f, "arg1 decoded to a JSON {} rather than an object", kind),
            ExtractError::UnsupportedPayload(kind) => write!(f, "arg1 is a JSON {}, expected a string or object", kind),
        }
    }
}

impl std::error::Error for ExtractError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PayloadFields {
    question: String,
    kind: String,
    subtype: String,
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renders any JSON value as a CSV cell.
pub fn value_to_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // Compact JSON for nested values; serializing a Value cannot fail.
        _ => value.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn cell(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key).map(value_to_cell).unwrap_or_default()
}

/// Patches the two known truncation shapes of `arg1`. Text that already
/// ends with `}` is returned untouched.
pub fn repair_payload(raw: &str) -> String {
    if raw.ends_with('}') {
        return raw.to_string();
    }
    if raw.contains("\"sub\"") && !raw.contains("\"subtype\"") {
        raw.replace("\"sub\"}", "\"subtype\": \"\"}")
    } else if raw.contains("\"subtype\": \"") && !raw.ends_with("\"}") {
        format!("{}\"}}", raw)
    } else {
        raw.to_string()
    }
}

fn fields_from_object(obj: &Map<String, Value>) -> PayloadFields {
    let subtype = match obj.get("subtype") {
        Some(v) if is_truthy(v) => value_to_cell(v),
        _ => cell(obj, "subt"),
    };
    PayloadFields {
        question: cell(obj, "question"),
        kind: cell(obj, "type"),
        subtype,
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn fields_from_regex(raw: &str) -> PayloadFields {
    PayloadFields {
        question: capture(&QUESTION_RE, raw).unwrap_or_default(),
        kind: capture(&TYPE_RE, raw).unwrap_or_default(),
        subtype: capture(&SUBTYPE_RE, raw)
            .or_else(|| capture(&SUB_RE, raw))
            .unwrap_or_default(),
    }
}

fn fields_from_text(raw: &str) -> Result<(PayloadFields, PayloadStrategy), ExtractError> {
    let fixed = repair_payload(raw);
    match serde_json::from_str::<Value>(&fixed) {
        Ok(Value::Object(obj)) => {
            let strategy = if fixed == raw { PayloadStrategy::Parsed } else { PayloadStrategy::Repaired };
            Ok((fields_from_object(&obj), strategy))
        }
        Ok(other) => Err(ExtractError::PayloadNotAnObject(json_kind(&other))),
        // Regexes run against the text as received, not the patched copy.
        Err(_) => Ok((fields_from_regex(raw), PayloadStrategy::RegexFallback)),
    }
}

fn payload_fields(payload: Option<&Value>) -> Result<(PayloadFields, PayloadStrategy), ExtractError> {
    // Any falsy arg1 (null, "", 0, false, [], {}) carries no payload.
    let payload = match payload {
        Some(v) if is_truthy(v) => v,
        _ => return Ok((PayloadFields::default(), PayloadStrategy::Absent)),
    };
    match payload {
        Value::String(raw) => fields_from_text(raw),
        Value::Object(obj) => Ok((fields_from_object(obj), PayloadStrategy::Parsed)),
        other => Err(ExtractError::UnsupportedPayload(json_kind(other))),
    }
}

/// Pulls the seven output fields out of one raw record.
pub fn extract_record(record: &Value) -> Result<(ExtractedRecord, PayloadStrategy), ExtractError> {
    let obj = record
        .as_object()
        .ok_or_else(|| ExtractError::NotAnObject(json_kind(record)))?;

    let (payload, strategy) = payload_fields(obj.get("arg1"))?;

    Ok((
        ExtractedRecord {
            id: cell(obj, "id"),
            question: payload.question,
            answer: cell(obj, "answer"),
            created_at: cell(obj, "created_at"),
            ip: cell(obj, "ip"),
            kind: payload.kind,
            subtype: payload.subtype,
        },
        strategy,
    ))
}
