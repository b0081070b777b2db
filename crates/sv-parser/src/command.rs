use std::collections::BTreeMap;
use std::ops::Range;

use sv_core::{
    parse_typed_literal, sniff_literal, ErrorKind, VarError, VarPath, VarType, VarValue,
};

use crate::attrs::parse_attributes;
use crate::tokenize::{tokenize_commands, CommandKind, TagSpan};

/// Store a command targets, relative to the scope the caller supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeTarget {
    #[default]
    Current,
    Global,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set {
        path: VarPath,
        /// Attribute text as written, for re-reading against a declared type.
        raw: String,
        value: VarValue,
        declared_type: Option<VarType>,
        target: ScopeTarget,
    },
    Register {
        name: String,
        var_type: VarType,
        value: VarValue,
        target: ScopeTarget,
    },
    Unregister {
        name: String,
        target: ScopeTarget,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Set { .. } => CommandKind::Set,
            Self::Register { .. } => CommandKind::Register,
            Self::Unregister { .. } => CommandKind::Unregister,
        }
    }

    pub fn target(&self) -> ScopeTarget {
        match self {
            Self::Set { target, .. }
            | Self::Register { target, .. }
            | Self::Unregister { target, .. } => *target,
        }
    }

    /// Top-level variable the command reads or writes.
    pub fn root(&self) -> &str {
        match self {
            Self::Set { path, .. } => path.root(),
            Self::Register { name, .. } | Self::Unregister { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub command: Command,
    pub range: Range<usize>,
    pub label: Option<String>,
}

fn required<'a>(
    attrs: &'a BTreeMap<String, String>,
    key: &str,
    kind: CommandKind,
) -> Result<&'a str, VarError> {
    let error_kind = if key == "value" {
        ErrorKind::MalformedLiteral
    } else {
        ErrorKind::MalformedCommand
    };
    attrs.get(key).map(String::as_str).ok_or_else(|| {
        VarError::new(
            error_kind,
            format!("<{}> requires attribute \"{}\".", kind.tag_name(), key),
        )
    })
}

fn parse_target(attrs: &BTreeMap<String, String>) -> Result<ScopeTarget, VarError> {
    match attrs.get("scope").map(|raw| raw.trim()) {
        None | Some("") | Some("character") | Some("current") => Ok(ScopeTarget::Current),
        Some("global") => Ok(ScopeTarget::Global),
        Some(other) => Err(VarError::new(
            ErrorKind::MalformedCommand,
            format!("Unknown scope \"{}\" on command tag.", other),
        )),
    }
}

fn top_level_name(raw: &str) -> Result<String, VarError> {
    let path = VarPath::parse(raw)?;
    if !path.is_root_only() {
        return Err(VarError::new(
            ErrorKind::MalformedPath,
            format!("\"{}\" is not a top-level variable name.", path),
        ));
    }
    Ok(path.root().to_string())
}

/// Phase two: strict parse of one located tag.
pub fn parse_command(span: &TagSpan) -> Result<ParsedCommand, VarError> {
    let attrs = parse_attributes(&span.attrs)?;
    let target = parse_target(&attrs)?;
    let declared_type = attrs
        .get("type")
        .map(|raw| raw.parse::<VarType>())
        .transpose()?;

    let command = match span.kind {
        CommandKind::Set => {
            let path = VarPath::parse(required(&attrs, "name", span.kind)?)?;
            let raw = required(&attrs, "value", span.kind)?;
            let value = match declared_type {
                Some(ty) => parse_typed_literal(raw, ty)?,
                None => sniff_literal(raw)?,
            };
            Command::Set {
                path,
                raw: raw.to_string(),
                value,
                declared_type,
                target,
            }
        }
        CommandKind::Register => {
            let name = top_level_name(required(&attrs, "name", span.kind)?)?;
            let raw = attrs.get("value").map(String::as_str);
            let (var_type, value) = match (declared_type, raw) {
                (Some(ty), Some(raw)) => (ty, parse_typed_literal(raw, ty)?),
                (Some(ty), None) => (ty, ty.default_value()),
                (None, Some(raw)) => {
                    let value = sniff_literal(raw)?;
                    (value.inferred_type(), value)
                }
                (None, None) => (VarType::String, VarType::String.default_value()),
            };
            Command::Register {
                name,
                var_type,
                value,
                target,
            }
        }
        CommandKind::Unregister => Command::Unregister {
            name: top_level_name(required(&attrs, "name", span.kind)?)?,
            target,
        },
    };

    Ok(ParsedCommand {
        command,
        range: span.range.clone(),
        label: span.label.clone(),
    })
}

/// Every command in `text`, in textual order. Each entry fails or succeeds on its own.
pub fn parse_commands(text: &str) -> Vec<Result<ParsedCommand, VarError>> {
    tokenize_commands(text)
        .into_iter()
        .map(|span| span.and_then(|span| parse_command(&span)))
        .collect()
}

#[cfg(test)]
mod command_tests {
    use super::*;

    #[test]
    fn set_command_sniffs_literal_shapes() {
        let parsed = parse_commands(
            r#"<setVar name="ToDoList.currentToDoList" value='[{"task":"打听消息","status":"pending"}]'>更新任务</setVar>"#,
        );
        let command = &parsed[0].as_ref().expect("set should parse").command;
        let Command::Set { path, value, .. } = command else {
            panic!("expected set command");
        };
        assert_eq!(path.to_string(), "ToDoList.currentToDoList");
        assert!(matches!(value, VarValue::Array(items) if items.len() == 1));
    }

    #[test]
    fn set_with_type_attribute_uses_typed_literal() {
        let parsed = parse_commands(r#"<setVar name="code" type="string" value="007"/>"#);
        let command = &parsed[0].as_ref().expect("set should parse").command;
        assert!(matches!(
            command,
            Command::Set { value: VarValue::String(text), declared_type: Some(VarType::String), .. }
                if text == "007"
        ));
    }

    #[test]
    fn malformed_value_is_reported_and_later_tags_still_parse() {
        let parsed = parse_commands(
            r#"<setVar name="x" value=>broken</setVar><setVar name="y" value="2">ok</setVar>"#,
        );
        assert_eq!(parsed.len(), 2);
        let error = parsed[0].as_ref().expect_err("first tag is malformed");
        assert_eq!(error.kind, ErrorKind::MalformedLiteral);
        let second = parsed[1].as_ref().expect("second tag parses");
        assert_eq!(second.label.as_deref(), Some("ok"));
    }

    #[test]
    fn register_and_unregister_require_top_level_names() {
        let parsed = parse_commands(
            r#"<registerVar name="newVar" type="number" value="5">新变量</registerVar>
               <registerVar name="a.b" type="number" value="5"/>
               <unregisterVar name="newVar" scope="global"/>"#,
        );
        assert!(matches!(
            &parsed[0].as_ref().expect("register").command,
            Command::Register { name, var_type: VarType::Number, value: VarValue::Number(n), .. }
                if name == "newVar" && *n == 5.0
        ));
        assert_eq!(
            parsed[1].as_ref().expect_err("dotted name").kind,
            ErrorKind::MalformedPath
        );
        let unregister = &parsed[2].as_ref().expect("unregister").command;
        assert_eq!(unregister.kind(), CommandKind::Unregister);
        assert_eq!(unregister.target(), ScopeTarget::Global);
    }

    #[test]
    fn register_without_type_infers_from_literal() {
        let parsed = parse_commands(r#"<registerVar name="flags" value='{"met":true}'/>"#);
        assert!(matches!(
            &parsed[0].as_ref().expect("register").command,
            Command::Register { var_type: VarType::Object, .. }
        ));
    }

    #[test]
    fn missing_attributes_and_bad_scope_are_errors() {
        let parsed = parse_commands(
            r#"<setVar value="1"/><setVar name="a"/><setVar name="a" value="1" scope="party"/><registerVar name="n" type="number" value="many"/>"#,
        );
        let kinds = parsed
            .iter()
            .map(|entry| entry.as_ref().expect_err("all malformed").kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::MalformedCommand,
                ErrorKind::MalformedLiteral,
                ErrorKind::MalformedCommand,
                ErrorKind::MalformedLiteral,
            ]
        );
    }
}
