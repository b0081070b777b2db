use sv_core::{VarType, VarValue, Variable};

/// Named variables of one scope, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableStore {
    variables: Vec<Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a list; a repeated name replaces the earlier entry in place.
    pub fn from_variables(variables: impl IntoIterator<Item = Variable>) -> Self {
        let mut store = Self::new();
        for variable in variables {
            store.insert(variable);
        }
        store
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .position(|variable| variable.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables
            .iter_mut()
            .find(|variable| variable.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Writes a whole variable. An existing entry keeps its position and visibility rule.
    /// Returns `true` when the name was new.
    pub fn set(&mut self, name: &str, value: VarValue, var_type: VarType) -> bool {
        if let Some(existing) = self.get_mut(name) {
            existing.value = value;
            existing.var_type = var_type;
            return false;
        }
        self.variables.push(Variable::new(name, var_type, value));
        true
    }

    /// Inserts or fully replaces a variable, visibility rule included.
    pub fn insert(&mut self, variable: Variable) -> bool {
        match self.position(&variable.name) {
            Some(index) => {
                self.variables[index] = variable;
                false
            }
            None => {
                self.variables.push(variable);
                true
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        let index = self.position(name)?;
        Some(self.variables.remove(index))
    }

    pub fn list_all(&self) -> &[Variable] {
        &self.variables
    }

    pub fn names(&self) -> Vec<&str> {
        self.variables
            .iter()
            .map(|variable| variable.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
