//! Chord parsing and weighted keybinding resolution.
//!
//! A [`Chord`] is one key plus a modifier mask, written in config files and
//! descriptor tables as `"alt+shift+r"`, `"ctrl+q"`, `"f6"`. Bindings carry a
//! [`BindingWeight`] tier and an optional `when` clause; [`KeybindingRegistry`]
//! resolves a normalized key press to at most one action id. Resolution is
//! pure and deterministic: it depends only on the registered bindings and the
//! context snapshot passed in, and never panics on unbound input.

use core_context::{ContextExpr, ContextModel};
use core_events::{Key, KeyInput, Mods};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, trace};

// -------------------------------------------------------------------------------------------------
// Chord
// -------------------------------------------------------------------------------------------------

/// A single key press pattern: one key plus a modifier mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub key: Key,
    pub mods: Mods,
}

impl Chord {
    pub const fn new(key: Key, mods: Mods) -> Self {
        Self { key, mods }
    }

    /// The chord a key press matches against. Inputs are already normalized
    /// by the time they reach the registry; this keeps the pairing explicit.
    pub fn from_input(input: KeyInput) -> Self {
        let norm = input.normalized();
        Self {
            key: norm.key,
            mods: norm.mods,
        }
    }

    /// Case-stable form mirroring [`KeyInput::normalized`], so a chord built
    /// from `Key::Char('R')` equals one parsed from `"shift+r"`.
    pub fn normalized(self) -> Self {
        let folded = KeyInput::new(self.key, self.mods).normalized();
        Self {
            key: folded.key,
            mods: folded.mods,
        }
    }

    /// Whether a (possibly unnormalized) input matches this chord.
    pub fn matches(self, input: KeyInput) -> bool {
        self.normalized() == Chord::from_input(input)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChordParseError {
    #[error("empty chord")]
    Empty,
    #[error("unrecognized modifier '{0}'")]
    UnknownModifier(String),
    #[error("unrecognized key '{0}'")]
    UnknownKey(String),
    #[error("chord names modifiers but no key")]
    MissingKey,
}

impl FromStr for Chord {
    type Err = ChordParseError;

    /// Parse `"alt+shift+r"` style chords: `+`-separated, case-insensitive,
    /// modifiers in any order, the final segment naming the key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ChordParseError::Empty);
        }
        let segments: Vec<&str> = trimmed.split('+').map(str::trim).collect();
        let (modifier_segments, key_segment) = segments.split_at(segments.len() - 1);

        let mut mods = Mods::empty();
        for segment in modifier_segments {
            let lower = segment.to_ascii_lowercase();
            match lower.as_str() {
                "ctrl" | "control" => mods |= Mods::CTRL,
                "alt" => mods |= Mods::ALT,
                "shift" => mods |= Mods::SHIFT,
                "super" | "cmd" | "meta" => mods |= Mods::SUPER,
                _ => return Err(ChordParseError::UnknownModifier(segment.to_string())),
            }
        }

        let key = parse_key(key_segment[0])?;
        Ok(Chord { key, mods }.normalized())
    }
}

fn parse_key(token: &str) -> Result<Key, ChordParseError> {
    if token.is_empty() {
        return Err(ChordParseError::MissingKey);
    }
    let lower = token.to_ascii_lowercase();

    // Single-character segments are literal keys; everything longer is a name.
    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(Key::Char(c));
    }

    if let Some(number) = lower.strip_prefix('f')
        && let Ok(n) = number.parse::<u8>()
        && (1..=24).contains(&n)
    {
        return Ok(Key::F(n));
    }

    let key = match lower.as_str() {
        "space" => Key::Char(' '),
        "enter" | "return" => Key::Enter,
        "escape" | "esc" => Key::Escape,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "insert" => Key::Insert,
        "up" => Key::Up,
        "down" => Key::Down,
        "left" => Key::Left,
        "right" => Key::Right,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        _ => return Err(ChordParseError::UnknownKey(token.to_string())),
    };
    Ok(key)
}

fn key_name(key: Key, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match key {
        Key::Char(' ') => f.write_str("space"),
        Key::Char(c) => write!(f, "{c}"),
        Key::F(n) => write!(f, "f{n}"),
        Key::Enter => f.write_str("enter"),
        Key::Escape => f.write_str("escape"),
        Key::Tab => f.write_str("tab"),
        Key::Backspace => f.write_str("backspace"),
        Key::Delete => f.write_str("delete"),
        Key::Insert => f.write_str("insert"),
        Key::Up => f.write_str("up"),
        Key::Down => f.write_str("down"),
        Key::Left => f.write_str("left"),
        Key::Right => f.write_str("right"),
        Key::Home => f.write_str("home"),
        Key::End => f.write_str("end"),
        Key::PageUp => f.write_str("pageup"),
        Key::PageDown => f.write_str("pagedown"),
    }
}

impl fmt::Display for Chord {
    /// Canonical rendering: `ctrl+alt+shift+super+<key>`, lowercase.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.contains(Mods::CTRL) {
            f.write_str("ctrl+")?;
        }
        if self.mods.contains(Mods::ALT) {
            f.write_str("alt+")?;
        }
        if self.mods.contains(Mods::SHIFT) {
            f.write_str("shift+")?;
        }
        if self.mods.contains(Mods::SUPER) {
            f.write_str("super+")?;
        }
        key_name(self.key, f)
    }
}

// -------------------------------------------------------------------------------------------------
// Keybindings
// -------------------------------------------------------------------------------------------------

/// Precedence tier of a binding, ascending: built-in defaults, contribution
/// defaults, user overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BindingWeight {
    Core,
    Contrib,
    User,
}

impl BindingWeight {
    pub const fn as_str(self) -> &'static str {
        match self {
            BindingWeight::Core => "core",
            BindingWeight::Contrib => "contrib",
            BindingWeight::User => "user",
        }
    }
}

/// One registered chord-to-action binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keybinding {
    pub chord: Chord,
    /// Action id the chord dispatches to.
    pub action: &'static str,
    pub weight: BindingWeight,
    /// Optional context gate; `None` means the binding always applies.
    pub when: Option<ContextExpr>,
}

impl Keybinding {
    pub const fn new(chord: Chord, action: &'static str, weight: BindingWeight) -> Self {
        Self {
            chord,
            action,
            weight,
            when: None,
        }
    }

    pub const fn when(mut self, expr: ContextExpr) -> Self {
        self.when = Some(expr);
        self
    }
}

/// Registry of chord bindings with weighted shadowing.
///
/// Resolution collects every binding whose normalized chord equals the
/// normalized input and whose `when` clause passes, then picks the highest
/// weight; within a weight the latest registration wins, so user overrides
/// registered after defaults shadow them.
#[derive(Default)]
pub struct KeybindingRegistry {
    bindings: Vec<Keybinding>,
}

impl KeybindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, binding: Keybinding) {
        debug!(
            target: "keymap",
            chord = %binding.chord,
            action = binding.action,
            weight = binding.weight.as_str(),
            "binding_registered"
        );
        self.bindings.push(binding);
    }

    pub fn bindings(&self) -> &[Keybinding] {
        &self.bindings
    }

    /// Resolve a key press to an action id, or `None` when nothing is bound.
    pub fn resolve(&self, input: KeyInput, ctx: &ContextModel) -> Option<&'static str> {
        let want = Chord::from_input(input);
        let mut candidates: SmallVec<[(BindingWeight, usize); 4]> = SmallVec::new();
        for (idx, binding) in self.bindings.iter().enumerate() {
            if binding.chord.normalized() != want {
                continue;
            }
            if let Some(when) = binding.when
                && !when.eval(ctx)
            {
                trace!(target: "keymap", action = binding.action, "candidate_gated_off");
                continue;
            }
            candidates.push((binding.weight, idx));
        }
        let (_, idx) = candidates
            .into_iter()
            .max_by_key(|&(weight, idx)| (weight, idx))?;
        let binding = &self.bindings[idx];
        debug!(
            target: "keymap",
            chord = %want,
            action = binding.action,
            weight = binding.weight.as_str(),
            "resolved"
        );
        Some(binding.action)
    }

    /// The effective (highest-precedence) binding for an action, for display
    /// in menus and the status line.
    pub fn binding_for(&self, action: &str) -> Option<&Keybinding> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.action == action)
            .max_by_key(|&(idx, b)| (b.weight, idx))
            .map(|(_, b)| b)
    }
}
