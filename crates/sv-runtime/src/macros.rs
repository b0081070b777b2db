use std::ops::Range;

use sv_core::{ErrorKind, ScopeId, VarError, VarPath, VarValue};
use tracing::{debug, warn};

use crate::path::read;
use crate::registry::ScopeRegistry;
use crate::visibility::is_visible;

/// Passes granted to every expansion on top of one pass per input byte.
pub const DEFAULT_PASS_FLOOR: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MacroOptions {
    /// Upper bound on substitution passes; `None` scales with the input length.
    pub max_passes: Option<usize>,
}

impl MacroOptions {
    pub fn with_max_passes(max_passes: usize) -> Self {
        Self {
            max_passes: Some(max_passes),
        }
    }

    pub fn pass_budget(&self, text: &str) -> usize {
        self.max_passes
            .unwrap_or(DEFAULT_PASS_FLOOR + text.len())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroOutcome {
    pub text: String,
    pub passes: usize,
    pub errors: Vec<VarError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MacroSpan {
    range: Range<usize>,
    body: Range<usize>,
}

/// First `${...}` whose body holds no other macro opener or closing brace.
fn find_innermost(text: &str) -> Option<MacroSpan> {
    let bytes = text.as_bytes();
    let mut open: Option<usize> = None;
    let mut index = 0usize;
    while index < bytes.len() {
        match bytes[index] {
            b'$' if bytes.get(index + 1) == Some(&b'{') => {
                open = Some(index);
                index += 2;
                continue;
            }
            b'}' => {
                if let Some(start) = open {
                    return Some(MacroSpan {
                        range: start..index + 1,
                        body: start + 2..index,
                    });
                }
            }
            _ => {}
        }
        index += 1;
    }
    None
}

fn lookup_order(scope: Option<&ScopeId>) -> Vec<ScopeId> {
    match scope {
        Some(ScopeId::Character(id)) => vec![ScopeId::Character(id.clone()), ScopeId::Global],
        Some(ScopeId::Global) | None => vec![ScopeId::Global],
    }
}

fn push_unique(errors: &mut Vec<VarError>, error: VarError) {
    if !errors.contains(&error) {
        warn!(code = error.code(), message = %error.message, "macro resolution issue");
        errors.push(error);
    }
}

/// Value behind one macro body. Hidden or missing variables fall through to the next scope.
fn lookup(
    registry: &ScopeRegistry,
    body: &str,
    scope: Option<&ScopeId>,
    errors: &mut Vec<VarError>,
) -> Option<VarValue> {
    let path = match VarPath::parse(body) {
        Ok(path) => path,
        Err(error) => {
            push_unique(errors, error);
            return None;
        }
    };

    for candidate in lookup_order(scope) {
        let store = match registry.store(&candidate) {
            Ok(store) => store,
            Err(error) => {
                push_unique(errors, error);
                continue;
            }
        };
        let Some(variable) = store.get(path.root()) else {
            continue;
        };
        match is_visible(store, variable) {
            Ok(true) => {}
            Ok(false) => {
                debug!(scope = %candidate, path = %path, "variable hidden");
                continue;
            }
            Err(error) => {
                push_unique(errors, error);
                continue;
            }
        }
        if let Some(value) = read(&variable.value, path.rest()) {
            return Some(value.clone());
        }
    }

    debug!(path = %path, "macro path not found");
    None
}

/// Expands every `${...}` in `text`, innermost first, rescanning after each substitution.
/// Stops when no macro remains or the pass budget is spent; leftover macros stay literal.
pub fn resolve_with(
    registry: &ScopeRegistry,
    text: &str,
    scope: Option<&ScopeId>,
    options: MacroOptions,
) -> MacroOutcome {
    let budget = options.pass_budget(text);
    let mut current = text.to_string();
    let mut passes = 0usize;
    let mut errors = Vec::new();

    while let Some(span) = find_innermost(&current) {
        if passes >= budget {
            push_unique(
                &mut errors,
                VarError::new(
                    ErrorKind::CycleLimitExceeded,
                    format!("Macro expansion stopped after {} passes.", budget),
                ),
            );
            break;
        }
        passes += 1;

        let replacement = lookup(registry, &current[span.body.clone()], scope, &mut errors)
            .map(|value| value.to_text())
            .unwrap_or_default();
        current.replace_range(span.range, &replacement);
    }

    MacroOutcome {
        text: current,
        passes,
        errors,
    }
}

pub fn resolve(registry: &ScopeRegistry, text: &str, scope: Option<&ScopeId>) -> String {
    resolve_with(registry, text, scope, MacroOptions::default()).text
}

#[cfg(test)]
mod macros_tests {
    use std::collections::BTreeMap;

    use super::*;
    use sv_core::{ScopeConfig, VarType, Variable, VariableDecl, VisibilityRule};

    fn decl(name: &str, var_type: VarType, value: VarValue) -> VariableDecl {
        VariableDecl {
            name: name.to_string(),
            var_type,
            value: Some(value),
            visibility: None,
        }
    }

    fn score_registry(goodwill: f64) -> ScopeRegistry {
        let desc = VarValue::Map(BTreeMap::from([
            ("10".to_string(), VarValue::from("低")),
            ("80".to_string(), VarValue::from("高")),
        ]));
        let score_table = VarValue::Map(BTreeMap::from([("desc".to_string(), desc)]));
        let mut registry = ScopeRegistry::new();
        registry
            .init_scope(
                ScopeId::Global,
                ScopeConfig {
                    variables: vec![
                        decl("goodwill", VarType::Number, VarValue::Number(goodwill)),
                        decl("scoreTable", VarType::Object, score_table),
                    ],
                    templates: Vec::new(),
                },
            )
            .expect("init");
        registry
    }

    #[test]
    fn text_without_macros_is_unchanged() {
        let registry = score_registry(10.0);
        for text in ["", "plain", "price: $5 {ok}", "${ unterminated", "}{$"] {
            assert_eq!(resolve(&registry, text, None), text);
        }
    }

    #[test]
    fn nested_macro_resolves_inner_first() {
        let registry = score_registry(10.0);
        assert_eq!(
            resolve(&registry, "好感：${scoreTable.desc.${goodwill}}", None),
            "好感：低"
        );
        let registry = score_registry(80.0);
        assert_eq!(
            resolve(&registry, "${scoreTable.desc.${goodwill}}", None),
            "高"
        );
    }

    #[test]
    fn missing_paths_resolve_to_empty() {
        let registry = score_registry(50.0);
        let outcome = resolve_with(
            &registry,
            "[${scoreTable.desc.${goodwill}}][${nobody}]",
            None,
            MacroOptions::default(),
        );
        assert_eq!(outcome.text, "[][]");
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn empty_inner_result_reports_malformed_path() {
        let registry = score_registry(50.0);
        let outcome = resolve_with(
            &registry,
            "${scoreTable.${missing}}",
            None,
            MacroOptions::default(),
        );
        assert_eq!(outcome.text, "");
        assert_eq!(outcome.errors[0].kind, ErrorKind::MalformedPath);
    }

    #[test]
    fn hidden_variable_follows_current_gate_value() {
        for (goodwill, expected) in [(79.0, "秘密："), (80.0, "秘密：真心话"), (95.0, "秘密：真心话")] {
            let mut registry = score_registry(goodwill);
            registry
                .store_mut(&ScopeId::Global)
                .expect("global")
                .insert(
                    Variable::new("secret", VarType::String, VarValue::from("真心话"))
                        .with_visibility(VisibilityRule::Expr {
                            expr: "goodwill >= 80".to_string(),
                        }),
                );
            assert_eq!(resolve(&registry, "秘密：${secret}", None), expected);
        }
    }

    #[test]
    fn hidden_structured_variable_hides_sub_paths() {
        let mut registry = score_registry(10.0);
        registry
            .store_mut(&ScopeId::Global)
            .expect("global")
            .insert(
                Variable::new(
                    "diary",
                    VarType::Object,
                    VarValue::Map(BTreeMap::from([(
                        "day1".to_string(),
                        VarValue::from("entry"),
                    )])),
                )
                .with_visibility(VisibilityRule::Threshold {
                    variable: "goodwill".to_string(),
                    min: 80.0,
                }),
            );
        assert_eq!(resolve(&registry, "${diary}|${diary.day1}", None), "|");
        registry
            .set(&ScopeId::Global, "goodwill", VarValue::Number(80.0), VarType::Number)
            .expect("set");
        assert_eq!(
            resolve(&registry, "${diary.day1}", None),
            "entry"
        );
    }

    #[test]
    fn character_scope_falls_back_to_global() {
        let mut registry = score_registry(10.0);
        let alice = ScopeId::character("alice");
        registry
            .init_scope(
                alice.clone(),
                ScopeConfig {
                    variables: vec![decl("goodwill", VarType::Number, VarValue::Number(80.0))],
                    templates: Vec::new(),
                },
            )
            .expect("init");
        assert_eq!(
            resolve(&registry, "${scoreTable.desc.${goodwill}}", Some(&alice)),
            "高"
        );
        assert_eq!(resolve(&registry, "${goodwill}", None), "10");
    }

    #[test]
    fn unknown_scope_is_reported_and_global_still_used() {
        let registry = score_registry(10.0);
        let outcome = resolve_with(
            &registry,
            "${goodwill}",
            Some(&ScopeId::character("ghost")),
            MacroOptions::default(),
        );
        assert_eq!(outcome.text, "10");
        assert_eq!(outcome.errors[0].kind, ErrorKind::UnknownScope);
    }

    #[test]
    fn self_referencing_value_stops_at_pass_budget() {
        let mut registry = score_registry(10.0);
        registry
            .set(&ScopeId::Global, "loop", VarValue::from("again ${loop}"), VarType::String)
            .expect("set");
        let outcome = resolve_with(&registry, "${loop}", None, MacroOptions::with_max_passes(5));
        assert_eq!(outcome.passes, 5);
        assert!(outcome.text.ends_with("${loop}"));
        assert_eq!(outcome.errors[0].kind, ErrorKind::CycleLimitExceeded);

        // The default budget terminates as well.
        let outcome = resolve_with(&registry, "${loop}", None, MacroOptions::default());
        assert_eq!(outcome.passes, DEFAULT_PASS_FLOOR + "${loop}".len());
    }

    #[test]
    fn values_that_reference_other_variables_expand() {
        let mut registry = score_registry(10.0);
        registry
            .set(
                &ScopeId::Global,
                "greeting",
                VarValue::from("好感度${goodwill}"),
                VarType::String,
            )
            .expect("set");
        assert_eq!(resolve(&registry, "${greeting}!", None), "好感度10!");
    }

    #[test]
    fn structured_values_render_as_json() {
        let registry = score_registry(10.0);
        assert_eq!(
            resolve(&registry, "${scoreTable.desc}", None),
            r#"{"10":"低","80":"高"}"#
        );
    }

    #[test]
    fn find_innermost_skips_outer_spans() {
        let span = find_innermost("a ${b.${c}} d").expect("span");
        assert_eq!(span.range, 6..10);
        assert_eq!(span.body, 8..9);
        assert!(find_innermost("no macros } here").is_none());
    }
}
