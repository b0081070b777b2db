use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VarError;
use crate::value::{parse_typed_literal, VarType, VarValue};

pub const SCOPE_SNAPSHOT_SCHEMA: &str = "scope-snapshot.v2";

/// Identity of an isolated variable namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum ScopeId {
    Global,
    Character(String),
}

impl ScopeId {
    pub fn character(id: impl Into<String>) -> Self {
        Self::Character(id.into())
    }

    /// Key naming the persisted resource behind this scope.
    pub fn lock_key(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Character(id) => format!("character:{}", id),
        }
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lock_key())
    }
}

/// Runtime condition deciding whether a hidden variable resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VisibilityRule {
    /// Boolean rhai expression over the variables of the same scope.
    Expr { expr: String },
    /// Visible while `variable` holds a number at or above `min`.
    Threshold { variable: String, min: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VarType,
    pub value: VarValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityRule>,
}

impl Variable {
    pub fn new(name: impl Into<String>, var_type: VarType, value: VarValue) -> Self {
        Self {
            name: name.into(),
            var_type,
            value,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, rule: VisibilityRule) -> Self {
        self.visibility = Some(rule);
        self
    }
}

/// Seed entry of a scope configuration. `value` may be omitted for the type default, and a
/// string value for a non-string type is decoded as a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VarType,
    #[serde(default)]
    pub value: Option<VarValue>,
    #[serde(default)]
    pub visibility: Option<VisibilityRule>,
}

impl VariableDecl {
    pub fn into_variable(self) -> Result<Variable, VarError> {
        let value = match self.value {
            None => self.var_type.default_value(),
            Some(VarValue::String(raw)) if self.var_type != VarType::String => {
                parse_typed_literal(&raw, self.var_type)?
            }
            Some(value) => value,
        };
        Ok(Variable {
            name: self.name,
            var_type: self.var_type,
            value,
            visibility: self.visibility,
        })
    }
}

/// Default shape instantiated when a mutation first touches `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureTemplate {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VarType,
    pub default: VarValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
    #[serde(default)]
    pub templates: Vec<StructureTemplate>,
}

/// Serialized form of a whole scope, exchanged with the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSnapshot {
    pub schema_version: String,
    pub variables: Vec<Variable>,
    /// Configured templates only; built-ins are implied.
    #[serde(default)]
    pub templates: Vec<StructureTemplate>,
}

#[cfg(test)]
mod types_tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn scope_lock_keys_are_distinct_per_resource() {
        assert_eq!(ScopeId::Global.lock_key(), "global");
        assert_eq!(ScopeId::character("alice").lock_key(), "character:alice");
        assert_ne!(
            ScopeId::character("global").lock_key(),
            ScopeId::Global.lock_key()
        );
    }

    #[test]
    fn scope_config_deserializes_from_json() {
        let config: ScopeConfig = serde_json::from_str(
            r#"{
              "variables": [
                {"name": "goodwill", "type": "number", "value": 10},
                {"name": "secret", "type": "string", "value": "hi",
                 "visibility": {"kind": "expr", "expr": "goodwill >= 80"}},
                {"name": "mood", "type": "string"},
                {"name": "level", "type": "number", "value": "3"}
              ]
            }"#,
        )
        .expect("config should parse");
        assert!(config.templates.is_empty());
        let variables = config
            .variables
            .into_iter()
            .map(VariableDecl::into_variable)
            .collect::<Result<Vec<_>, _>>()
            .expect("decls should convert");
        assert_eq!(variables[0].value, VarValue::Number(10.0));
        assert_eq!(
            variables[1].visibility,
            Some(VisibilityRule::Expr {
                expr: "goodwill >= 80".to_string()
            })
        );
        assert_eq!(variables[2].value, VarValue::from(""));
        assert_eq!(variables[3].value, VarValue::Number(3.0));
    }

    #[test]
    fn decl_with_bad_literal_is_rejected() {
        let decl = VariableDecl {
            name: "level".to_string(),
            var_type: VarType::Number,
            value: Some(VarValue::from("high")),
            visibility: None,
        };
        let error = decl.into_variable().expect_err("literal should fail");
        assert_eq!(error.kind, ErrorKind::MalformedLiteral);
    }
}
