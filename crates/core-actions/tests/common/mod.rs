#![allow(dead_code)] // Shared across many integration tests; each test binary uses a subset of helpers.

use core_actions::{ActionContext, ActionOutcome, ActionRegistry, builtin, dispatch};
use core_keymap::KeybindingRegistry;
use core_menus::MenuRegistry;
use core_options::TextDirection;
use core_telemetry::{MemorySink, TelemetryEvent};
use core_workbench::{Document, EditorId, Workbench};

/// A fully wired contribution surface over a scratch workbench: the same
/// registries and built-ins the binary assembles at startup, plus a
/// capturing telemetry sink.
pub struct Harness {
    pub workbench: Workbench,
    pub actions: ActionRegistry,
    pub menus: MenuRegistry,
    pub keymap: KeybindingRegistry,
    pub telemetry: MemorySink,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_direction(TextDirection::Ltr)
    }

    pub fn with_direction(direction: TextDirection) -> Self {
        let mut actions = ActionRegistry::new();
        let mut menus = MenuRegistry::new();
        builtin::register_all(&mut actions, &mut menus);
        let mut keymap = KeybindingRegistry::new();
        actions.install_default_bindings(&mut keymap);
        Self {
            workbench: Workbench::new(direction),
            actions,
            menus,
            keymap,
            telemetry: MemorySink::new(),
        }
    }

    pub fn open_document(&mut self, name: &str) -> EditorId {
        self.workbench
            .open_editor(Some(Document::new(name, "sample text")))
    }

    pub fn open_empty(&mut self) -> EditorId {
        self.workbench.open_editor(None)
    }

    /// Dispatch exactly as the event loop does: context snapshot first,
    /// then the handler against the live workbench.
    pub fn dispatch_on(&mut self, action: &str, target: EditorId) -> ActionOutcome {
        let context = self.workbench.context_for(target);
        let mut ctx = ActionContext {
            workbench: &mut self.workbench,
            target,
            telemetry: &self.telemetry,
        };
        dispatch(&self.actions, action, &mut ctx, &context)
    }

    pub fn direction_of(&self, editor: EditorId) -> TextDirection {
        self.workbench
            .editor(editor)
            .expect("editor must exist")
            .options()
            .text_direction
    }

    pub fn published(&self) -> Vec<TelemetryEvent> {
        self.telemetry.events()
    }
}
