use sv_core::{segment_index, VarPath, VarValue};

use crate::store::VariableStore;

/// Follows `segments` from `tree`. Objects take keys, arrays take integer indices; anything
/// else is a miss.
pub fn read<'a>(tree: &'a VarValue, segments: &[String]) -> Option<&'a VarValue> {
    segments
        .iter()
        .try_fold(tree, |node, segment| match node {
            VarValue::Map(entries) => entries.get(segment),
            VarValue::Array(items) => segment_index(segment).and_then(|index| items.get(index)),
            _ => None,
        })
}

/// Returns `tree` with `value` stored at `segments`, creating missing structure on the way.
pub fn write(mut tree: VarValue, segments: &[String], value: VarValue) -> VarValue {
    write_in_place(&mut tree, segments, value);
    tree
}

fn empty_container(for_index: bool) -> VarValue {
    if for_index {
        VarValue::Array(Vec::new())
    } else {
        VarValue::Map(Default::default())
    }
}

pub(crate) fn write_in_place(node: &mut VarValue, segments: &[String], value: VarValue) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    match (node, segment_index(head)) {
        (VarValue::Map(entries), _) => {
            let child = entries.entry(head.clone()).or_insert(VarValue::Null);
            write_in_place(child, rest, value);
        }
        (VarValue::Array(items), Some(index)) => {
            if items.len() <= index {
                items.resize(index + 1, VarValue::Null);
            }
            write_in_place(&mut items[index], rest, value);
        }
        // Scalars, nulls and arrays addressed by key are replaced by the container the
        // segment asks for.
        (other, index) => {
            *other = empty_container(index.is_some());
            write_in_place(other, segments, value);
        }
    }
}

/// Reads a full path whose root names a variable of `store`.
pub fn read_variable_path<'a>(store: &'a VariableStore, path: &VarPath) -> Option<&'a VarValue> {
    let variable = store.get(path.root())?;
    read(&variable.value, path.rest())
}

/// Writes a full path into `store`. A missing root variable is created from the path alone,
/// typed after the resulting value. Returns `true` when the root was created.
pub fn write_variable_path(store: &mut VariableStore, path: &VarPath, value: VarValue) -> bool {
    if let Some(variable) = store.get_mut(path.root()) {
        write_in_place(&mut variable.value, path.rest(), value);
        return false;
    }
    let tree = write(VarValue::Null, path.rest(), value);
    let var_type = tree.inferred_type();
    store.set(path.root(), tree, var_type)
}
