use std::collections::BTreeSet;

use sv_core::{
    coerce_to_type, parse_typed_literal, ErrorKind, ScopeId, VarError, VarPath, VarType, VarValue,
    Variable,
};
use sv_parser::{parse_commands, Command, ScopeTarget};
use tracing::{debug, info, warn};

use crate::path::write_variable_path;
use crate::registry::ScopeRegistry;

/// What `registerVar` does when the name already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegisterPolicy {
    #[default]
    KeepExisting,
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub register_policy: RegisterPolicy,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandReport {
    pub applied: usize,
    pub errors: Vec<VarError>,
    /// Scopes whose stores changed and need persisting.
    pub touched: BTreeSet<ScopeId>,
}

impl CommandReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

fn base_scope(scope: Option<&ScopeId>, target: ScopeTarget) -> ScopeId {
    match (target, scope) {
        (ScopeTarget::Global, _) | (ScopeTarget::Current, None) => ScopeId::Global,
        (ScopeTarget::Current, Some(scope)) => scope.clone(),
    }
}

/// A character scope that lacks `root` defers to global when global already has it.
fn owning_scope(
    registry: &ScopeRegistry,
    scope: Option<&ScopeId>,
    target: ScopeTarget,
    root: &str,
) -> Result<ScopeId, VarError> {
    let base = base_scope(scope, target);
    let store = registry.store(&base)?;
    if matches!(base, ScopeId::Character(_)) && !store.contains(root) {
        let in_global = registry
            .store(&ScopeId::Global)
            .map(|global| global.contains(root))
            .unwrap_or(false);
        if in_global {
            return Ok(ScopeId::Global);
        }
    }
    Ok(base)
}

/// Whole-variable write: the literal is re-read against the declared or existing type when
/// it fits, otherwise the sniffed value keeps its own type.
fn typed_root_value(
    raw: &str,
    sniffed: VarValue,
    declared: Option<VarType>,
    existing: Option<VarType>,
) -> (VarValue, VarType) {
    if let Some(ty) = declared.or(existing) {
        if let Ok(value) = parse_typed_literal(raw, ty) {
            return (value, ty);
        }
        if let Some(value) = coerce_to_type(sniffed.clone(), ty) {
            return (value, ty);
        }
        debug!(expected = %ty, actual = sniffed.type_name(), "type tag follows written value");
    }
    let ty = sniffed.inferred_type();
    (sniffed, ty)
}

fn apply_set(
    registry: &mut ScopeRegistry,
    scope: Option<&ScopeId>,
    path: &VarPath,
    raw: &str,
    value: &VarValue,
    declared_type: Option<VarType>,
    target: ScopeTarget,
) -> Result<ScopeId, VarError> {
    let owner = owning_scope(registry, scope, target, path.root())?;
    let state = registry.state_mut(&owner)?;

    if !state.store.contains(path.root()) {
        if let Some(template) = state.templates.get(path.root()) {
            info!(scope = %owner, name = path.root(), "auto-registered from template");
            state
                .store
                .set(path.root(), template.default.clone(), template.var_type);
        }
    }

    if path.is_root_only() {
        let existing = state.store.get(path.root()).map(|variable| variable.var_type);
        let (value, var_type) = typed_root_value(raw, value.clone(), declared_type, existing);
        state.store.set(path.root(), value, var_type);
    } else if write_variable_path(&mut state.store, path, value.clone()) {
        info!(scope = %owner, name = path.root(), "auto-registered from path");
    }
    Ok(owner)
}

fn apply_register(
    registry: &mut ScopeRegistry,
    scope: Option<&ScopeId>,
    name: &str,
    var_type: VarType,
    value: &VarValue,
    target: ScopeTarget,
    policy: RegisterPolicy,
) -> Result<Option<ScopeId>, VarError> {
    let owner = base_scope(scope, target);
    let store = registry.store_mut(&owner)?;
    if store.contains(name) && policy == RegisterPolicy::KeepExisting {
        debug!(scope = %owner, name, "register skipped, name exists");
        return Ok(None);
    }
    match store.get_mut(name) {
        Some(existing) => {
            existing.var_type = var_type;
            existing.value = value.clone();
        }
        None => {
            store.insert(Variable::new(name, var_type, value.clone()));
        }
    }
    Ok(Some(owner))
}

fn apply_unregister(
    registry: &mut ScopeRegistry,
    scope: Option<&ScopeId>,
    name: &str,
    target: ScopeTarget,
) -> Result<ScopeId, VarError> {
    let owner = owning_scope(registry, scope, target, name)?;
    match registry.store_mut(&owner)?.remove(name) {
        Some(_) => Ok(owner),
        None => Err(VarError::new(
            ErrorKind::PathNotFound,
            format!("Cannot unregister \"{}\": not defined in {}.", name, owner),
        )),
    }
}

/// Applies one parsed command. Returns the scope it changed, if any.
pub fn apply_command(
    registry: &mut ScopeRegistry,
    command: &Command,
    scope: Option<&ScopeId>,
    options: CommandOptions,
) -> Result<Option<ScopeId>, VarError> {
    match command {
        Command::Set {
            path,
            raw,
            value,
            declared_type,
            target,
        } => apply_set(registry, scope, path, raw, value, *declared_type, *target).map(Some),
        Command::Register {
            name,
            var_type,
            value,
            target,
        } => apply_register(
            registry,
            scope,
            name,
            *var_type,
            value,
            *target,
            options.register_policy,
        ),
        Command::Unregister { name, target } => {
            apply_unregister(registry, scope, name, *target).map(Some)
        }
    }
}

/// Whether applying `text` from `scope` could change the global store: no caller scope, an
/// explicit `scope="global"`, or a root global already holds (a character write may defer to
/// it). Roots only enter global through commands that already count, so the answer holds
/// for the whole batch as long as no other writer touches global meanwhile.
pub fn reaches_global(registry: &ScopeRegistry, text: &str, scope: Option<&ScopeId>) -> bool {
    if !matches!(scope, Some(ScopeId::Character(_))) {
        return true;
    }
    let global = registry.store(&ScopeId::Global).ok();
    parse_commands(text).into_iter().flatten().any(|parsed| {
        parsed.command.target() == ScopeTarget::Global
            || global.is_some_and(|store| store.contains(parsed.command.root()))
    })
}

/// Finds every command tag in `text` and applies them in order against live stores. A bad
/// tag is reported and skipped without touching any store.
pub fn apply_commands(
    registry: &mut ScopeRegistry,
    text: &str,
    scope: Option<&ScopeId>,
    options: CommandOptions,
) -> CommandReport {
    let mut report = CommandReport::default();
    for parsed in parse_commands(text) {
        let outcome = parsed.and_then(|parsed| {
            debug!(kind = ?parsed.command.kind(), label = ?parsed.label, "applying command");
            apply_command(registry, &parsed.command, scope, options)
        });
        match outcome {
            Ok(touched) => {
                report.applied += 1;
                report.touched.extend(touched);
            }
            Err(error) => {
                warn!(code = error.code(), message = %error.message, "command skipped");
                report.errors.push(error);
            }
        }
    }
    report
}
