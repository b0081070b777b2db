use std::collections::BTreeMap;

use sv_core::{StructureTemplate, VarType, VarValue};

pub const TODO_LIST_TEMPLATE: &str = "ToDoList";

/// Task-tracking structure instantiated the first time a mutation touches `ToDoList`.
pub fn todo_list_template() -> StructureTemplate {
    let empty_list = || VarValue::Array(Vec::new());
    let default = BTreeMap::from([
        ("chapterList".to_string(), empty_list()),
        ("currentChapter".to_string(), VarValue::from("")),
        ("currentToDoList".to_string(), empty_list()),
        ("completed".to_string(), empty_list()),
        ("in_progress".to_string(), empty_list()),
        ("pending".to_string(), empty_list()),
    ]);
    StructureTemplate {
        name: TODO_LIST_TEMPLATE.to_string(),
        var_type: VarType::Object,
        default: VarValue::Map(default),
    }
}

/// Templates known to one scope: the built-ins plus any supplied by its configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSet {
    templates: BTreeMap<String, StructureTemplate>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateSet {
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut set = Self::empty();
        set.add(todo_list_template());
        set
    }

    /// Built-ins extended by `extra`; an entry with a built-in name replaces it.
    pub fn with(extra: impl IntoIterator<Item = StructureTemplate>) -> Self {
        let mut set = Self::builtin();
        for template in extra {
            set.add(template);
        }
        set
    }

    pub fn add(&mut self, template: StructureTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&StructureTemplate> {
        self.templates.get(name)
    }

    /// Entries that differ from the built-ins: everything `with` would need to rebuild this set.
    pub fn configured(&self) -> Vec<StructureTemplate> {
        let builtin = Self::builtin();
        self.templates
            .values()
            .filter(|template| builtin.get(&template.name) != Some(*template))
            .cloned()
            .collect()
    }
}
