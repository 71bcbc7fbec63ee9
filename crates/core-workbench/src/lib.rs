//! Workbench model: documents, editors, diff pairs, and focus.
//!
//! The [`Workbench`] owns every editor instance. A standalone editor hosts an
//! optional [`Document`]; a [`DiffEditor`] is a registered pairing of two
//! editor ids (original left, modified right). Diff membership is never
//! stored on the editor itself: [`Workbench::enclosing_diff`] derives it by
//! scanning the registered pairs, and [`Workbench::surface_of`] folds the
//! result into a [`Surface`]. Context facts about an editor are published as
//! a snapshot through [`Workbench::context_for`]; consumers (keymap, menus,
//! action preconditions) evaluate against the snapshot and never reach back
//! into the workbench.

use core_context::ContextModel;
use core_options::{EditorOptions, OptionsUpdate, TextDirection};
use tracing::{debug, warn};

/// Context key names published by [`Workbench::context_for`].
pub mod context_keys {
    pub const TEXT_DIRECTION: &str = "editorTextDirection";
    pub const READ_ONLY: &str = "editorReadonly";
    pub const IN_DIFF_EDITOR: &str = "inDiffEditor";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiffId(pub u32);

/// A named piece of text an editor can host. Editors without a document are
/// legal (placeholder panes, failed loads) and reject document-bound actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// One editor instance: an optional document plus its effective options.
#[derive(Debug)]
pub struct Editor {
    id: EditorId,
    document: Option<Document>,
    options: EditorOptions,
}

impl Editor {
    fn new(id: EditorId, document: Option<Document>, options: EditorOptions) -> Self {
        Self {
            id,
            document,
            options,
        }
    }

    pub fn id(&self) -> EditorId {
        self.id
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    /// Single write path for options. Returns whether anything changed.
    pub fn update_options(&mut self, update: OptionsUpdate) -> bool {
        let changed = self.options.apply(update);
        if changed {
            debug!(
                target: "workbench.options",
                editor = self.id.0,
                direction = %self.options.text_direction,
                read_only = self.options.read_only,
                "options_updated"
            );
        }
        changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSide {
    Original,
    Modified,
}

/// A registered two-pane diff: original on the left, modified on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffEditor {
    id: DiffId,
    original: EditorId,
    modified: EditorId,
}

impl DiffEditor {
    pub fn id(&self) -> DiffId {
        self.id
    }

    pub fn original(&self) -> EditorId {
        self.original
    }

    pub fn modified(&self) -> EditorId {
        self.modified
    }

    /// Which pane of this diff the editor is, if either.
    pub fn side_of(&self, editor: EditorId) -> Option<DiffSide> {
        if editor == self.original {
            Some(DiffSide::Original)
        } else if editor == self.modified {
            Some(DiffSide::Modified)
        } else {
            None
        }
    }
}

/// Where an action ran, as reported on the telemetry wire. Derived at
/// emission time from [`Workbench::enclosing_diff`], never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Code,
    DiffOriginal,
    DiffModified,
}

impl Surface {
    /// Wire values; the camelCase forms are the published schema.
    pub const fn as_str(self) -> &'static str {
        match self {
            Surface::Code => "code",
            Surface::DiffOriginal => "diffOriginal",
            Surface::DiffModified => "diffModified",
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of all editors, diff registrations, and focus.
pub struct Workbench {
    editors: Vec<Editor>,
    diffs: Vec<DiffEditor>,
    focused: Option<EditorId>,
    next_editor: u32,
    next_diff: u32,
    default_direction: TextDirection,
}

impl Workbench {
    /// `default_direction` seeds the options of every newly opened editor.
    pub fn new(default_direction: TextDirection) -> Self {
        Self {
            editors: Vec::new(),
            diffs: Vec::new(),
            focused: None,
            next_editor: 0,
            next_diff: 0,
            default_direction,
        }
    }

    /// Open a standalone editor. The first opened editor receives focus.
    pub fn open_editor(&mut self, document: Option<Document>) -> EditorId {
        let id = EditorId(self.next_editor);
        self.next_editor += 1;
        debug!(
            target: "workbench",
            editor = id.0,
            document = document.as_ref().map(|d| d.name.as_str()).unwrap_or("<none>"),
            "editor_opened"
        );
        self.editors.push(Editor::new(
            id,
            document,
            EditorOptions::with_direction(self.default_direction),
        ));
        if self.focused.is_none() {
            self.focused = Some(id);
        }
        id
    }

    /// Open a diff pair. Both panes are fresh editors; the original pane is
    /// opened read-only.
    pub fn open_diff(&mut self, original: Document, modified: Document) -> DiffId {
        let original_id = self.open_editor(Some(original));
        let modified_id = self.open_editor(Some(modified));
        if let Some(pane) = self.editor_mut(original_id) {
            pane.update_options(OptionsUpdate::readonly(true));
        }
        let id = DiffId(self.next_diff);
        self.next_diff += 1;
        debug!(
            target: "workbench",
            diff = id.0,
            original = original_id.0,
            modified = modified_id.0,
            "diff_opened"
        );
        self.diffs.push(DiffEditor {
            id,
            original: original_id,
            modified: modified_id,
        });
        id
    }

    pub fn editor(&self, id: EditorId) -> Option<&Editor> {
        self.editors.iter().find(|e| e.id == id)
    }

    pub fn editor_mut(&mut self, id: EditorId) -> Option<&mut Editor> {
        self.editors.iter_mut().find(|e| e.id == id)
    }

    pub fn editors(&self) -> &[Editor] {
        &self.editors
    }

    pub fn diffs(&self) -> &[DiffEditor] {
        &self.diffs
    }

    pub fn focused(&self) -> Option<EditorId> {
        self.focused
    }

    /// Move focus to a known editor. Unknown ids are rejected.
    pub fn focus(&mut self, id: EditorId) -> bool {
        if self.editor(id).is_some() {
            self.focused = Some(id);
            true
        } else {
            warn!(target: "workbench", editor = id.0, "focus_rejected_unknown_editor");
            false
        }
    }

    /// Cycle focus through editors in opening order. Returns the newly
    /// focused id, or `None` when no editors exist.
    pub fn focus_next(&mut self) -> Option<EditorId> {
        if self.editors.is_empty() {
            return None;
        }
        let next = match self.focused {
            Some(current) => {
                let pos = self.editors.iter().position(|e| e.id == current);
                let idx = pos.map(|p| (p + 1) % self.editors.len()).unwrap_or(0);
                self.editors[idx].id
            }
            None => self.editors[0].id,
        };
        self.focused = Some(next);
        Some(next)
    }

    /// Pure lookup: the diff pair this editor is a pane of, if any. Editors
    /// are panes of at most one diff because panes are minted by `open_diff`
    /// itself.
    pub fn enclosing_diff(&self, editor: EditorId) -> Option<(DiffId, DiffSide)> {
        debug_assert!(
            self.diffs
                .iter()
                .filter(|d| d.side_of(editor).is_some())
                .count()
                <= 1,
            "an editor can be a pane of at most one diff editor"
        );
        self.diffs
            .iter()
            .find_map(|d| d.side_of(editor).map(|side| (d.id, side)))
    }

    /// Fold diff membership into the reported surface.
    pub fn surface_of(&self, editor: EditorId) -> Surface {
        match self.enclosing_diff(editor) {
            None => Surface::Code,
            Some((_, DiffSide::Original)) => Surface::DiffOriginal,
            Some((_, DiffSide::Modified)) => Surface::DiffModified,
        }
    }

    /// Snapshot of context facts about an editor. Unknown ids yield an empty
    /// snapshot (all keys absent).
    pub fn context_for(&self, editor: EditorId) -> ContextModel {
        let mut ctx = ContextModel::new();
        if let Some(e) = self.editor(editor) {
            ctx.set(
                context_keys::TEXT_DIRECTION,
                e.options().text_direction.as_str(),
            );
            ctx.set(context_keys::READ_ONLY, e.options().read_only);
            ctx.set(
                context_keys::IN_DIFF_EDITOR,
                self.enclosing_diff(editor).is_some(),
            );
        }
        ctx
    }
}
