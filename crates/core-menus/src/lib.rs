//! Menu contribution registry.
//!
//! Contributions append [`MenuItem`]s to well-known surfaces identified by
//! [`MenuId`]. The registry stores declarations; rendering a surface is a
//! pure function of the declarations plus the current context — evaluated
//! per frame via [`MenuRegistry::snapshot`], which resolves each item's
//! `toggled` expression into a checked flag.

use core_context::{ContextExpr, ContextModel};
use tracing::debug;

// -------------------------------------------------------------------------------------------------
// Menu surfaces
// -------------------------------------------------------------------------------------------------

/// Well-known menu surfaces a contribution can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuId {
    /// Actions shown in the editor title bar.
    EditorTitle,
    /// Entries in the application View menu.
    ViewMenu,
}

impl MenuId {
    pub const fn as_str(self) -> &'static str {
        match self {
            MenuId::EditorTitle => "editor_title",
            MenuId::ViewMenu => "view_menu",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Items
// -------------------------------------------------------------------------------------------------

/// A declared menu entry. `group` then `order` decide placement within a
/// surface; `toggled` is the context expression that drives the checkmark.
#[derive(Debug, Clone)]
pub struct MenuItem {
    pub action: &'static str,
    pub title: &'static str,
    pub icon: Option<&'static str>,
    pub tooltip: Option<&'static str>,
    pub group: &'static str,
    pub order: u32,
    pub toggled: Option<ContextExpr>,
}

impl MenuItem {
    pub const fn new(
        action: &'static str,
        title: &'static str,
        group: &'static str,
        order: u32,
    ) -> Self {
        Self {
            action,
            title,
            icon: None,
            tooltip: None,
            group,
            order,
            toggled: None,
        }
    }

    pub const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub const fn tooltip(mut self, tooltip: &'static str) -> Self {
        self.tooltip = Some(tooltip);
        self
    }

    pub const fn toggled(mut self, expr: ContextExpr) -> Self {
        self.toggled = Some(expr);
        self
    }
}

/// A menu item resolved against a context snapshot, ready to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMenuItem {
    pub action: &'static str,
    pub title: &'static str,
    pub checked: bool,
    pub icon: Option<&'static str>,
    pub tooltip: Option<&'static str>,
}

// -------------------------------------------------------------------------------------------------
// Registry
// -------------------------------------------------------------------------------------------------

/// Declaration store for all menu surfaces.
#[derive(Debug, Default)]
pub struct MenuRegistry {
    editor_title: Vec<MenuItem>,
    view_menu: Vec<MenuItem>,
}

impl MenuRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item to a surface. Items are kept in sorted position so
    /// `items` and `snapshot` never re-sort on read.
    pub fn append(&mut self, menu: MenuId, item: MenuItem) {
        debug!(
            target: "menus",
            menu = menu.as_str(),
            action = item.action,
            group = item.group,
            order = item.order,
            "item_appended"
        );
        let bucket = self.bucket_mut(menu);
        let at = bucket
            .iter()
            .position(|existing| (existing.group, existing.order) > (item.group, item.order))
            .unwrap_or(bucket.len());
        bucket.insert(at, item);
    }

    /// Declared items for a surface, ordered by `(group, order)`.
    pub fn items(&self, menu: MenuId) -> &[MenuItem] {
        self.bucket(menu)
    }

    /// Resolve a surface against the current context. Each item's `toggled`
    /// expression is evaluated here, once per call; items without one render
    /// unchecked.
    pub fn snapshot(&self, menu: MenuId, context: &ContextModel) -> Vec<RenderedMenuItem> {
        self.bucket(menu)
            .iter()
            .map(|item| RenderedMenuItem {
                action: item.action,
                title: item.title,
                checked: item
                    .toggled
                    .as_ref()
                    .is_some_and(|expr| expr.eval(context)),
                icon: item.icon,
                tooltip: item.tooltip,
            })
            .collect()
    }

    fn bucket(&self, menu: MenuId) -> &[MenuItem] {
        match menu {
            MenuId::EditorTitle => &self.editor_title,
            MenuId::ViewMenu => &self.view_menu,
        }
    }

    fn bucket_mut(&mut self, menu: MenuId) -> &mut Vec<MenuItem> {
        match menu {
            MenuId::EditorTitle => &mut self.editor_title,
            MenuId::ViewMenu => &mut self.view_menu,
        }
    }
}
