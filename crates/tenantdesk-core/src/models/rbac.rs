use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Module name for permissions that carry no grouping information
const GENERAL_MODULE: &str = "general";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Permission {
    pub id: i64,
    /// Machine name, e.g. `users:read` or `org.manage`
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
}

impl Permission {
    /// The module this permission belongs to: the explicit `module` field,
    /// else the prefix of `name` before the first `:` or `.`.
    pub fn module_name(&self) -> &str {
        if let Some(module) = self.module.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
            return module;
        }
        match self.name.split_once([':', '.']) {
            Some((prefix, _)) if !prefix.is_empty() => prefix,
            _ => GENERAL_MODULE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn permission_ids(&self) -> BTreeSet<i64> {
        self.permissions.iter().map(|p| p.id).collect()
    }
}

/// Permissions of one module, as shown in a checklist section
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PermissionGroup {
    pub module: String,
    pub permissions: Vec<Permission>,
}

impl PermissionGroup {
    pub fn ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.permissions.iter().map(|p| p.id)
    }

    pub fn all_selected(&self, selected: &BTreeSet<i64>) -> bool {
        !self.permissions.is_empty() && self.ids().all(|id| selected.contains(&id))
    }

    pub fn selected_count(&self, selected: &BTreeSet<i64>) -> usize {
        self.ids().filter(|id| selected.contains(id)).count()
    }
}

/// Group permissions by module. Groups come back sorted by module name and
/// each group's permissions sorted by name.
pub fn group_permissions(permissions: &[Permission]) -> Vec<PermissionGroup> {
    let mut groups: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
    for permission in permissions {
        groups
            .entry(permission.module_name().to_string())
            .or_default()
            .push(permission.clone());
    }

    groups
        .into_iter()
        .map(|(module, mut permissions)| {
            permissions.sort_by(|a, b| a.name.cmp(&b.name));
            PermissionGroup { module, permissions }
        })
        .collect()
}

/// Flip one permission in the selection
pub fn toggle_permission(selected: &mut BTreeSet<i64>, id: i64) {
    if !selected.remove(&id) {
        selected.insert(id);
    }
}

/// Select the whole group, or clear it if it was already fully selected
pub fn toggle_group(selected: &mut BTreeSet<i64>, group: &PermissionGroup) {
    if group.all_selected(selected) {
        for id in group.ids() {
            selected.remove(&id);
        }
    } else {
        selected.extend(group.ids());
    }
}
