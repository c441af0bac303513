//! Navigation menu (`core:config-menu`)
//!
//! Items are a sequence, so an extension's `items` replace the base list
//! as a whole.

use overlay_registry::{ConversionError, Implementation};
use serde::{Deserialize, Serialize};

/// One navigation entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    /// Stable identifier, conventionally the route
    pub key: String,
    /// Display text
    pub label: String,
    /// Route to navigate to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Icon name understood by the UI layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Nested entries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    /// Leaf entry routed to `path`, keyed by it
    #[must_use]
    pub fn route(path: &str, label: &str, icon: &str) -> Self {
        Self {
            key: path.to_string(),
            label: label.to_string(),
            path: Some(path.to_string()),
            icon: Some(icon.to_string()),
            children: Vec::new(),
        }
    }
}

/// Menu handed to the UI layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuConfig {
    /// Top-level entries, in display order
    pub items: Vec<MenuItem>,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            items: vec![
                MenuItem::route("/dashboard", "Dashboard", "DashboardOutlined"),
                MenuItem::route("/home", "Home", "HomeOutlined"),
                MenuItem::route("/extensions-demo", "Examples", "SettingOutlined"),
            ],
        }
    }
}

impl MenuConfig {
    /// Entry with the given key, searching nested entries depth first
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&MenuItem> {
        fn walk<'a>(items: &'a [MenuItem], key: &str) -> Option<&'a MenuItem> {
            items.iter().find_map(|item| {
                if item.key == key {
                    Some(item)
                } else {
                    walk(&item.children, key)
                }
            })
        }
        walk(&self.items, key)
    }

    /// Registry form
    ///
    /// # Errors
    /// [`ConversionError::Encode`] if serialization fails
    pub fn to_implementation(&self) -> Result<Implementation, ConversionError> {
        Implementation::from_typed(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_registry::resolve;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn base_menu_lists_default_routes() {
        let menu = MenuConfig::default();
        let keys: Vec<_> = menu.items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["/dashboard", "/home", "/extensions-demo"]);
        assert_eq!(menu.find("/home").and_then(|i| i.icon.as_deref()), Some("HomeOutlined"));
    }

    #[test]
    fn extension_items_replace_base_list() {
        let base = MenuConfig::default().to_implementation().unwrap();
        let ext = Implementation::data(json!({
            "items": [{
                "key": "admin",
                "label": "Admin",
                "children": [{"key": "/admin/users", "label": "Users", "path": "/admin/users"}]
            }]
        }));

        let menu: MenuConfig = resolve(&base, Some(&ext)).to_typed().unwrap();
        assert_eq!(menu.items.len(), 1);
        assert!(menu.find("/home").is_none());
        assert_eq!(
            menu.find("/admin/users").and_then(|i| i.path.as_deref()),
            Some("/admin/users")
        );
    }
}
