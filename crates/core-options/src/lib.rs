//! Per-editor option surface for Quill.
//!
//! Options are plain typed fields read through [`EditorOptions`] and written
//! through a partial [`OptionsUpdate`]. Writers never mutate fields directly;
//! `apply` is the single write path so callers can observe whether anything
//! actually changed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Horizontal text direction of an editor.
///
/// Serialized as the lowercase strings `"ltr"` / `"rtl"` in config files and
/// on the telemetry wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

impl TextDirection {
    /// The other direction. Applying this twice restores the input.
    pub const fn toggled(self) -> Self {
        match self {
            TextDirection::Ltr => TextDirection::Rtl,
            TextDirection::Rtl => TextDirection::Ltr,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TextDirection::Ltr => "ltr",
            TextDirection::Rtl => "rtl",
        }
    }
}

impl fmt::Display for TextDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized text direction '{input}' (expected 'ltr' or 'rtl')")]
pub struct DirectionParseError {
    pub input: String,
}

impl FromStr for TextDirection {
    type Err = DirectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ltr" => Ok(TextDirection::Ltr),
            "rtl" => Ok(TextDirection::Rtl),
            other => Err(DirectionParseError {
                input: other.to_string(),
            }),
        }
    }
}

/// Effective options of one editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditorOptions {
    pub text_direction: TextDirection,
    pub read_only: bool,
}

impl EditorOptions {
    pub fn with_direction(direction: TextDirection) -> Self {
        Self {
            text_direction: direction,
            ..Self::default()
        }
    }

    /// Apply a partial update, returning whether any field changed. Unset
    /// fields are left untouched; an empty update never reports a change.
    pub fn apply(&mut self, update: OptionsUpdate) -> bool {
        let mut changed = false;
        if let Some(direction) = update.text_direction
            && self.text_direction != direction
        {
            self.text_direction = direction;
            changed = true;
        }
        if let Some(read_only) = update.read_only
            && self.read_only != read_only
        {
            self.read_only = read_only;
            changed = true;
        }
        changed
    }
}

/// Partial write set for [`EditorOptions::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionsUpdate {
    pub text_direction: Option<TextDirection>,
    pub read_only: Option<bool>,
}

impl OptionsUpdate {
    pub fn direction(direction: TextDirection) -> Self {
        Self {
            text_direction: Some(direction),
            ..Self::default()
        }
    }

    pub fn readonly(read_only: bool) -> Self {
        Self {
            read_only: Some(read_only),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text_direction.is_none() && self.read_only.is_none()
    }
}
