mod persistence;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sv_core::{
    ErrorKind, ScopeConfig, ScopeId, ScopeSnapshot, VarError, VarPath, VarValue, Variable,
};
use sv_runtime::{
    reaches_global, read_variable_path, resolve_with, write_variable_path, CommandOptions,
    CommandReport, LockManager, MacroOptions, MacroOutcome, ScopeRegistry,
};
use tracing::{info, warn};

pub use persistence::{MemoryPersistence, ScopePersistence};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableSystemOptions {
    pub macros: MacroOptions,
    pub commands: CommandOptions,
}

/// Scopes, locking and persistence behind one handle. Cloning shares all state.
#[derive(Clone)]
pub struct VariableSystem {
    registry: Arc<Mutex<ScopeRegistry>>,
    locks: LockManager,
    persistence: Arc<dyn ScopePersistence>,
    options: VariableSystemOptions,
}

fn map_snapshot_encode_error(scope: &ScopeId, error: serde_json::Error) -> VarError {
    VarError::new(
        ErrorKind::Persistence,
        format!("Cannot encode snapshot of {}: {}", scope, error),
    )
}

fn map_snapshot_decode_error(scope: &ScopeId, error: serde_json::Error) -> VarError {
    VarError::new(
        ErrorKind::Persistence,
        format!("Cannot decode snapshot of {}: {}", scope, error),
    )
}

fn map_locked_failure(scope: &ScopeId, error: VarError) -> VarError {
    VarError::new(
        ErrorKind::LockedOperationFailure,
        format!("Persisting {} failed: {}", scope, error),
    )
}

impl VariableSystem {
    pub fn new(persistence: Arc<dyn ScopePersistence>) -> Self {
        Self::with_options(persistence, VariableSystemOptions::default())
    }

    pub fn with_options(
        persistence: Arc<dyn ScopePersistence>,
        options: VariableSystemOptions,
    ) -> Self {
        Self {
            registry: Arc::new(Mutex::new(ScopeRegistry::new())),
            locks: LockManager::new(),
            persistence,
            options,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryPersistence::new()))
    }

    fn registry(&self) -> MutexGuard<'_, ScopeRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub fn init_scope(&self, scope: ScopeId, config: ScopeConfig) -> Result<(), VarError> {
        self.registry().init_scope(scope, config)
    }

    pub fn init_global(&self, config: ScopeConfig) -> Result<(), VarError> {
        self.init_scope(ScopeId::Global, config)
    }

    pub fn init_character(&self, id: &str, config: ScopeConfig) -> Result<(), VarError> {
        self.init_scope(ScopeId::character(id), config)
    }

    /// Drops the in-memory scope. Persisted state is left alone.
    pub fn teardown_scope(&self, scope: &ScopeId) -> bool {
        self.registry().teardown_scope(scope).is_some()
    }

    pub fn is_initialized(&self, scope: &ScopeId) -> bool {
        self.registry().is_initialized(scope)
    }

    pub fn scopes(&self) -> Vec<ScopeId> {
        self.registry().scopes()
    }

    pub fn resolve(&self, text: &str, scope: Option<&ScopeId>) -> String {
        self.resolve_with_report(text, scope).text
    }

    pub fn resolve_with_report(&self, text: &str, scope: Option<&ScopeId>) -> MacroOutcome {
        resolve_with(&self.registry(), text, scope, self.options.macros)
    }

    /// Raw read of a path, ignoring visibility rules.
    pub fn get_variable(&self, scope: &ScopeId, path: &str) -> Result<Option<VarValue>, VarError> {
        let path = VarPath::parse(path)?;
        let registry = self.registry();
        Ok(read_variable_path(registry.store(scope)?, &path).cloned())
    }

    pub fn list_variables(&self, scope: &ScopeId) -> Result<Vec<Variable>, VarError> {
        Ok(self.registry().list_all(scope)?.to_vec())
    }

    pub fn snapshot(&self, scope: &ScopeId) -> Result<ScopeSnapshot, VarError> {
        self.registry().snapshot(scope)
    }

    async fn save_snapshot(&self, scope: &ScopeId) -> Result<(), VarError> {
        let blob = {
            let snapshot = self.registry().snapshot(scope)?;
            serde_json::to_string(&snapshot)
                .map_err(|error| map_snapshot_encode_error(scope, error))?
        };
        self.persistence
            .save(&scope.lock_key(), &blob)
            .await
            .map_err(|error| map_locked_failure(scope, error))
    }

    async fn restore_unlocked(&self, scope: &ScopeId) -> Result<bool, VarError> {
        let Some(blob) = self.persistence.load(&scope.lock_key()).await? else {
            return Ok(false);
        };
        let snapshot = serde_json::from_str::<ScopeSnapshot>(&blob)
            .map_err(|error| map_snapshot_decode_error(scope, error))?;
        self.registry().restore(scope.clone(), snapshot)?;
        info!(scope = %scope, "scope restored");
        Ok(true)
    }

    async fn apply_unlocked(&self, text: &str, scope: Option<&ScopeId>) -> CommandReport {
        let report = {
            let mut registry = self.registry();
            sv_runtime::apply_commands(&mut registry, text, scope, self.options.commands)
        };
        self.persist_touched(report).await
    }

    /// Runs under the character's lock only. The global check and a purely local apply share
    /// one registry critical section; anything that can reach global retries under its lock.
    async fn apply_character_locked(&self, text: &str, scope: &ScopeId) -> CommandReport {
        let local = {
            let mut registry = self.registry();
            if reaches_global(&registry, text, Some(scope)) {
                None
            } else {
                let options = self.options.commands;
                Some(sv_runtime::apply_commands(&mut registry, text, Some(scope), options))
            }
        };
        match local {
            Some(report) => self.persist_touched(report).await,
            None => {
                let global_key = ScopeId::Global.lock_key();
                self.locks
                    .acquire(&global_key, || self.apply_unlocked(text, Some(scope)))
                    .await
            }
        }
    }

    async fn persist_touched(&self, mut report: CommandReport) -> CommandReport {
        for touched in report.touched.clone() {
            if let Err(error) = self.save_snapshot(&touched).await {
                warn!(code = error.code(), message = %error.message, "persist failed");
                report.errors.push(error);
            }
        }
        report
    }

    async fn set_unlocked(
        &self,
        scope: &ScopeId,
        path: &VarPath,
        value: VarValue,
    ) -> Result<(), VarError> {
        {
            let mut registry = self.registry();
            write_variable_path(registry.store_mut(scope)?, path, value);
        }
        self.save_snapshot(scope).await
    }

    async fn register_unlocked(&self, scope: &ScopeId, variable: Variable) -> Result<(), VarError> {
        self.registry().store_mut(scope)?.insert(variable);
        self.save_snapshot(scope).await
    }

    async fn unregister_unlocked(&self, scope: &ScopeId, name: &str) -> Result<Variable, VarError> {
        let removed = self
            .registry()
            .remove(scope, name)?
            .ok_or_else(|| VarError::path_not_found(name))?;
        self.save_snapshot(scope).await?;
        Ok(removed)
    }

    /// Loads the persisted snapshot of `scope` into memory, creating the scope when needed.
    /// Returns `false` when nothing was persisted.
    pub async fn restore_scope(&self, scope: &ScopeId) -> Result<bool, VarError> {
        self.locks
            .acquire(&scope.lock_key(), || self.restore_unlocked(scope))
            .await
    }

    pub async fn persist_scope(&self, scope: &ScopeId) -> Result<(), VarError> {
        self.locks
            .acquire(&scope.lock_key(), || self.save_snapshot(scope))
            .await
    }

    /// Applies the command tags in `text` and persists every scope they changed. Command and
    /// persistence failures both land in the report. A character caller holds its own key and
    /// adds `global` (second) only when a command can reach the global store.
    pub async fn apply_commands(&self, text: &str, scope: Option<&ScopeId>) -> CommandReport {
        match scope {
            Some(character @ ScopeId::Character(_)) => {
                self.locks
                    .acquire(&character.lock_key(), || {
                        self.apply_character_locked(text, character)
                    })
                    .await
            }
            _ => {
                let global_key = ScopeId::Global.lock_key();
                self.locks
                    .acquire(&global_key, || self.apply_unlocked(text, scope))
                    .await
            }
        }
    }

    /// Writes `value` at `path` and persists the scope. A missing root is created.
    pub async fn set_variable(
        &self,
        scope: &ScopeId,
        path: &str,
        value: VarValue,
    ) -> Result<(), VarError> {
        let path = VarPath::parse(path)?;
        self.locks
            .acquire(&scope.lock_key(), || self.set_unlocked(scope, &path, value))
            .await
    }

    /// Adds or replaces a whole variable and persists the scope.
    pub async fn register_variable(
        &self,
        scope: &ScopeId,
        variable: Variable,
    ) -> Result<(), VarError> {
        self.locks
            .acquire(&scope.lock_key(), || self.register_unlocked(scope, variable))
            .await
    }

    pub async fn unregister_variable(
        &self,
        scope: &ScopeId,
        name: &str,
    ) -> Result<Variable, VarError> {
        self.locks
            .acquire(&scope.lock_key(), || self.unregister_unlocked(scope, name))
            .await
    }
}
