//! Context keys and equality expressions for Quill.
//!
//! A [`ContextModel`] is a snapshot of named facts about the focused editor
//! (direction, read-only state, diff membership). Keybinding `when` clauses,
//! action preconditions, and menu `toggled` expressions all evaluate against
//! it through [`ContextExpr`]. Purely synchronous; no IO, no interior
//! mutability. Publishers rebuild the snapshot, consumers only read it.

use std::collections::HashMap;

/// Value of a single context key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextValue {
    Bool(bool),
    Str(String),
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        ContextValue::Bool(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::Str(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        ContextValue::Str(v)
    }
}

/// String-keyed snapshot of context facts.
#[derive(Debug, Clone, Default)]
pub struct ContextModel {
    entries: HashMap<String, ContextValue>,
}

impl ContextModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key)
    }

    /// String-form equality against a key's value. Booleans compare against
    /// the literals `"true"` / `"false"`; an absent key equals nothing.
    pub fn is_equal(&self, key: &str, expected: &str) -> bool {
        match self.entries.get(key) {
            Some(ContextValue::Str(s)) => s == expected,
            Some(ContextValue::Bool(b)) => expected == if *b { "true" } else { "false" },
            None => false,
        }
    }
}

/// Declarative expression over context keys. Declared in `const` descriptor
/// tables, so keys and expected values are static strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextExpr {
    Equals {
        key: &'static str,
        value: &'static str,
    },
    NotEquals {
        key: &'static str,
        value: &'static str,
    },
}

impl ContextExpr {
    pub const fn equals(key: &'static str, value: &'static str) -> Self {
        ContextExpr::Equals { key, value }
    }

    pub const fn not_equals(key: &'static str, value: &'static str) -> Self {
        ContextExpr::NotEquals { key, value }
    }

    /// Evaluate against a snapshot. An absent key makes `Equals` false and
    /// `NotEquals` true.
    pub fn eval(&self, ctx: &ContextModel) -> bool {
        match self {
            ContextExpr::Equals { key, value } => ctx.is_equal(key, value),
            ContextExpr::NotEquals { key, value } => !ctx.is_equal(key, value),
        }
    }
}
