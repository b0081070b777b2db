use std::collections::BTreeMap;

use sv_core::{
    ErrorKind, ScopeConfig, ScopeId, ScopeSnapshot, VarError, VarType, VarValue, Variable,
    VariableDecl, SCOPE_SNAPSHOT_SCHEMA,
};
use tracing::{debug, info};

use crate::store::VariableStore;
use crate::templates::TemplateSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeState {
    pub store: VariableStore,
    pub templates: TemplateSet,
}

impl ScopeState {
    pub fn from_config(config: ScopeConfig) -> Result<Self, VarError> {
        let variables = config
            .variables
            .into_iter()
            .map(|decl| {
                let name = decl.name.clone();
                VariableDecl::into_variable(decl).map_err(|error| {
                    VarError::new(
                        ErrorKind::Config,
                        format!("Variable \"{}\": {}", name, error),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            store: VariableStore::from_variables(variables),
            templates: TemplateSet::with(config.templates),
        })
    }

    pub fn to_snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            schema_version: SCOPE_SNAPSHOT_SCHEMA.to_string(),
            variables: self.store.list_all().to_vec(),
            templates: self.templates.configured(),
        }
    }

    pub fn from_snapshot(snapshot: ScopeSnapshot) -> Result<Self, VarError> {
        if snapshot.schema_version != SCOPE_SNAPSHOT_SCHEMA {
            return Err(VarError::new(
                ErrorKind::Persistence,
                format!(
                    "Unsupported scope snapshot schema: {}",
                    snapshot.schema_version
                ),
            ));
        }
        Ok(Self {
            store: VariableStore::from_variables(snapshot.variables),
            templates: TemplateSet::with(snapshot.templates),
        })
    }
}

/// Every live scope of the process: at most one global store and one store per character.
/// Scopes exist only between explicit init and teardown.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    global: Option<ScopeState>,
    characters: BTreeMap<String, ScopeState>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_scope(&mut self, scope: ScopeId, config: ScopeConfig) -> Result<(), VarError> {
        if self.is_initialized(&scope) {
            return Err(VarError::new(
                ErrorKind::ScopeExists,
                format!("Scope \"{}\" is already initialized.", scope),
            ));
        }
        let state = ScopeState::from_config(config)?;
        info!(scope = %scope, variables = state.store.len(), "scope initialized");
        self.install(scope, state);
        Ok(())
    }

    /// Installs `state` for `scope`, replacing whatever was there.
    pub fn install(&mut self, scope: ScopeId, state: ScopeState) {
        match scope {
            ScopeId::Global => self.global = Some(state),
            ScopeId::Character(id) => {
                self.characters.insert(id, state);
            }
        }
    }

    pub fn teardown_scope(&mut self, scope: &ScopeId) -> Option<ScopeState> {
        let removed = match scope {
            ScopeId::Global => self.global.take(),
            ScopeId::Character(id) => self.characters.remove(id),
        };
        if removed.is_some() {
            info!(scope = %scope, "scope torn down");
        }
        removed
    }

    pub fn is_initialized(&self, scope: &ScopeId) -> bool {
        self.state(scope).is_ok()
    }

    pub fn scopes(&self) -> Vec<ScopeId> {
        let mut out = Vec::new();
        if self.global.is_some() {
            out.push(ScopeId::Global);
        }
        out.extend(self.characters.keys().cloned().map(ScopeId::Character));
        out
    }

    pub fn state(&self, scope: &ScopeId) -> Result<&ScopeState, VarError> {
        let state = match scope {
            ScopeId::Global => self.global.as_ref(),
            ScopeId::Character(id) => self.characters.get(id),
        };
        state.ok_or_else(|| VarError::unknown_scope(scope))
    }

    pub fn state_mut(&mut self, scope: &ScopeId) -> Result<&mut ScopeState, VarError> {
        let state = match scope {
            ScopeId::Global => self.global.as_mut(),
            ScopeId::Character(id) => self.characters.get_mut(id),
        };
        state.ok_or_else(|| VarError::unknown_scope(scope))
    }

    pub fn store(&self, scope: &ScopeId) -> Result<&VariableStore, VarError> {
        self.state(scope).map(|state| &state.store)
    }

    pub fn store_mut(&mut self, scope: &ScopeId) -> Result<&mut VariableStore, VarError> {
        self.state_mut(scope).map(|state| &mut state.store)
    }

    pub fn get(&self, scope: &ScopeId, name: &str) -> Result<Option<&Variable>, VarError> {
        Ok(self.store(scope)?.get(name))
    }

    pub fn set(
        &mut self,
        scope: &ScopeId,
        name: &str,
        value: VarValue,
        var_type: VarType,
    ) -> Result<(), VarError> {
        let created = self.store_mut(scope)?.set(name, value, var_type);
        debug!(scope = %scope, name, created, "variable set");
        Ok(())
    }

    pub fn remove(&mut self, scope: &ScopeId, name: &str) -> Result<Option<Variable>, VarError> {
        Ok(self.store_mut(scope)?.remove(name))
    }

    pub fn list_all(&self, scope: &ScopeId) -> Result<&[Variable], VarError> {
        Ok(self.store(scope)?.list_all())
    }

    pub fn snapshot(&self, scope: &ScopeId) -> Result<ScopeSnapshot, VarError> {
        Ok(self.state(scope)?.to_snapshot())
    }

    /// Replaces the variables and templates of `scope` with a snapshot, creating the scope when
    /// it is not initialized.
    pub fn restore(&mut self, scope: ScopeId, snapshot: ScopeSnapshot) -> Result<(), VarError> {
        let state = ScopeState::from_snapshot(snapshot)?;
        self.install(scope, state);
        Ok(())
    }
}
