use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ErrorKind, VarError};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<VarValue>),
    Map(BTreeMap<String, VarValue>),
}

impl VarValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Map(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "object",
        }
    }

    /// Advisory type tag for a value; `Null` reads as a string slot.
    pub fn inferred_type(&self) -> VarType {
        match self {
            Self::Null | Self::String(_) => VarType::String,
            Self::Bool(_) => VarType::Boolean,
            Self::Number(_) => VarType::Number,
            Self::Array(_) => VarType::Array,
            Self::Map(_) => VarType::Object,
        }
    }

    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(value) => Self::Bool(value),
            JsonValue::Number(value) => Self::Number(value.as_f64().unwrap_or(0.0)),
            JsonValue::String(value) => Self::String(value),
            JsonValue::Array(values) => {
                Self::Array(values.into_iter().map(Self::from_json).collect())
            }
            JsonValue::Object(values) => Self::Map(
                values
                    .into_iter()
                    .map(|(key, value)| (key, Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Text substituted for a macro reference.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => number_to_text(*value),
            Self::String(value) => value.clone(),
            Self::Array(_) | Self::Map(_) => self.to_json().to_string(),
        }
    }

    /// JSON form with integral numbers written without a fraction.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(value) => JsonValue::Bool(*value),
            Self::Number(value) => {
                if value.fract().abs() < f64::EPSILON && value.abs() < i64::MAX as f64 {
                    JsonValue::from(*value as i64)
                } else {
                    serde_json::Number::from_f64(*value)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null)
                }
            }
            Self::String(value) => JsonValue::String(value.clone()),
            Self::Array(values) => JsonValue::Array(values.iter().map(Self::to_json).collect()),
            Self::Map(values) => JsonValue::Object(
                values
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for VarValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for VarValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

fn number_to_text(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON && value.abs() < i64::MAX as f64 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl VarType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    pub fn default_value(self) -> VarValue {
        match self {
            Self::String => VarValue::String(String::new()),
            Self::Number => VarValue::Number(0.0),
            Self::Boolean => VarValue::Bool(false),
            Self::Object => VarValue::Map(BTreeMap::new()),
            Self::Array => VarValue::Array(Vec::new()),
        }
    }

    pub fn matches(self, value: &VarValue) -> bool {
        matches!(
            (self, value),
            (Self::String, VarValue::String(_))
                | (Self::Number, VarValue::Number(_))
                | (Self::Boolean, VarValue::Bool(_))
                | (Self::Object, VarValue::Map(_))
                | (Self::Array, VarValue::Array(_))
        )
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VarType {
    type Err = VarError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Ok(Self::String),
            "number" | "int" | "float" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "object" | "map" => Ok(Self::Object),
            "array" | "list" => Ok(Self::Array),
            other => Err(VarError::new(
                ErrorKind::MalformedLiteral,
                format!("Unknown variable type \"{}\".", other),
            )),
        }
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let first = raw.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '.') {
        return None;
    }
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn looks_structured(raw: &str) -> bool {
    (raw.starts_with('{') && raw.ends_with('}'))
        || (raw.starts_with('[') && raw.ends_with(']'))
        || (raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"'))
}

fn parse_structured(raw: &str) -> Result<VarValue, VarError> {
    serde_json::from_str::<JsonValue>(raw)
        .map(VarValue::from_json)
        .map_err(|error| {
            VarError::new(
                ErrorKind::MalformedLiteral,
                format!("Cannot decode structured literal {}: {}", raw, error),
            )
        })
}

/// Best-effort decoding of an untyped literal by its shape.
pub fn sniff_literal(raw: &str) -> Result<VarValue, VarError> {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Ok(VarValue::Bool(true)),
        "false" => return Ok(VarValue::Bool(false)),
        "null" => return Ok(VarValue::Null),
        _ => {}
    }
    if let Some(number) = parse_number(trimmed) {
        return Ok(VarValue::Number(number));
    }
    if looks_structured(trimmed) {
        return parse_structured(trimmed);
    }
    Ok(VarValue::String(raw.to_string()))
}

/// Decodes a literal for a declared type. An empty literal yields the type default.
pub fn parse_typed_literal(raw: &str, ty: VarType) -> Result<VarValue, VarError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() && ty != VarType::String {
        return Ok(ty.default_value());
    }
    let mismatch = || {
        VarError::new(
            ErrorKind::MalformedLiteral,
            format!("Literal \"{}\" is not a valid {}.", raw, ty),
        )
    };
    match ty {
        VarType::String => Ok(VarValue::String(raw.to_string())),
        VarType::Number => parse_number(trimmed)
            .map(VarValue::Number)
            .ok_or_else(mismatch),
        VarType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Ok(VarValue::Bool(true)),
            "false" => Ok(VarValue::Bool(false)),
            _ => Err(mismatch()),
        },
        VarType::Object | VarType::Array => {
            let value = parse_structured(trimmed)?;
            if ty.matches(&value) {
                Ok(value)
            } else {
                Err(mismatch())
            }
        }
    }
}

/// Converts a value toward a declared type when the conversion is lossless enough to be
/// unsurprising. Returns `None` when the value cannot take that shape.
pub fn coerce_to_type(value: VarValue, ty: VarType) -> Option<VarValue> {
    if ty.matches(&value) {
        return Some(value);
    }
    match (ty, value) {
        (VarType::String, VarValue::Null) => Some(VarValue::String(String::new())),
        (VarType::String, other) => Some(VarValue::String(other.to_text())),
        (VarType::Number, VarValue::String(text)) => {
            parse_number(text.trim()).map(VarValue::Number)
        }
        (VarType::Number, VarValue::Bool(flag)) => Some(VarValue::Number(f64::from(u8::from(flag)))),
        (VarType::Boolean, VarValue::String(text)) => match text.trim() {
            "true" => Some(VarValue::Bool(true)),
            "false" => Some(VarValue::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}
