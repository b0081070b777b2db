use std::sync::OnceLock;

use regex::Regex;
use rhai::{Array, Dynamic, Engine, Map, Scope, FLOAT, INT};
use sv_core::{ErrorKind, VarError, VarValue, Variable, VisibilityRule};

use crate::store::VariableStore;

const MAX_PREDICATE_OPERATIONS: u64 = 10_000;

fn identifier_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

pub(crate) fn value_to_dynamic(value: &VarValue) -> Dynamic {
    match value {
        VarValue::Null => Dynamic::UNIT,
        VarValue::Bool(value) => Dynamic::from_bool(*value),
        VarValue::Number(value) => {
            if value.fract().abs() < f64::EPSILON && value.abs() < INT::MAX as f64 {
                Dynamic::from_int(*value as INT)
            } else {
                Dynamic::from_float(*value as FLOAT)
            }
        }
        VarValue::String(value) => Dynamic::from(value.clone()),
        VarValue::Array(values) => {
            Dynamic::from_array(values.iter().map(value_to_dynamic).collect::<Array>())
        }
        VarValue::Map(values) => {
            let mut map = Map::new();
            for (key, value) in values {
                map.insert(key.as_str().into(), value_to_dynamic(value));
            }
            Dynamic::from_map(map)
        }
    }
}

thread_local! {
    static PREDICATE_ENGINE: Engine = predicate_engine();
    #[cfg(test)]
    static ENGINE_BUILDS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

fn predicate_engine() -> Engine {
    #[cfg(test)]
    ENGINE_BUILDS.with(|builds| builds.set(builds.get() + 1));
    let mut engine = Engine::new();
    engine.set_strict_variables(true);
    engine.set_max_operations(MAX_PREDICATE_OPERATIONS);
    engine
}

fn eval_expr(store: &VariableStore, expr: &str) -> Result<bool, VarError> {
    let mut scope = Scope::new();
    for variable in store.list_all() {
        if identifier_regex().is_match(&variable.name) {
            scope.push_dynamic(variable.name.clone(), value_to_dynamic(&variable.value));
        }
    }

    let result = PREDICATE_ENGINE
        .with(|engine| engine.eval_with_scope::<Dynamic>(&mut scope, expr))
        .map_err(|error| {
            VarError::new(
                ErrorKind::VisibilityEval,
                format!("Visibility rule \"{}\" failed: {}", expr, error),
            )
        })?;
    result.as_bool().map_err(|type_name| {
        VarError::new(
            ErrorKind::VisibilityEval,
            format!(
                "Visibility rule \"{}\" must yield a boolean, got {}.",
                expr, type_name
            ),
        )
    })
}

/// Evaluates `variable`'s rule against the current contents of its own store. Never cached.
pub fn is_visible(store: &VariableStore, variable: &Variable) -> Result<bool, VarError> {
    match &variable.visibility {
        None => Ok(true),
        Some(VisibilityRule::Threshold { variable, min }) => Ok(store
            .get(variable)
            .and_then(|gate| gate.value.as_number())
            .is_some_and(|value| value >= *min)),
        Some(VisibilityRule::Expr { expr }) => eval_expr(store, expr),
    }
}
