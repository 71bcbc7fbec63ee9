//! Built-in actions and their menu contributions.
//!
//! `register_all` is the single wiring point: it registers every built-in
//! action descriptor and appends the matching menu items, so the binary and
//! the tests see the identical contribution surface.

use crate::{ActionContext, ActionDescriptor, ActionOutcome, ActionRegistry};
use core_context::ContextExpr;
use core_events::{Key, Mods};
use core_keymap::{BindingWeight, Chord};
use core_menus::{MenuId, MenuItem, MenuRegistry};
use core_options::OptionsUpdate;
use core_telemetry::{
    DataClass, EventClassification, FieldClassification, Purpose, TelemetryEvent,
};
use core_workbench::context_keys;
use tracing::debug;

/// Action ids, public so the keymap, config overrides, and tests refer to
/// the same strings.
pub const TOGGLE_TEXT_DIRECTION: &str = "toggle_text_direction";
pub const FOCUS_NEXT_EDITOR: &str = "focus_next_editor";
pub const QUIT: &str = "quit";

const TOGGLE_TEXT_DIRECTION_CLASSIFICATION: EventClassification = EventClassification {
    event: "editor.toggleTextDirection",
    owner: "quill",
    comment: "Emitted when the user toggles the editor text direction.",
    fields: &[
        FieldClassification {
            name: "newDirection",
            class: DataClass::SystemMetadata,
            purpose: Purpose::FeatureInsight,
            comment: "The direction after the toggle, ltr or rtl.",
        },
        FieldClassification {
            name: "surface",
            class: DataClass::SystemMetadata,
            purpose: Purpose::FeatureInsight,
            comment: "The editor surface the toggle ran in.",
        },
    ],
};

/// Register every built-in action and its menu items.
pub fn register_all(actions: &mut ActionRegistry, menus: &mut MenuRegistry) {
    actions.register(ActionDescriptor {
        id: TOGGLE_TEXT_DIRECTION,
        label: "Toggle Text Direction",
        category: Some("View"),
        precondition: None,
        default_chord: Some(Chord::new(Key::Char('r'), Mods::ALT | Mods::SHIFT)),
        chord_weight: BindingWeight::Contrib,
        handler: toggle_text_direction,
    });
    actions.register(ActionDescriptor {
        id: FOCUS_NEXT_EDITOR,
        label: "Focus Next Editor",
        category: Some("View"),
        precondition: None,
        default_chord: Some(Chord::new(Key::F(6), Mods::empty())),
        chord_weight: BindingWeight::Core,
        handler: focus_next_editor,
    });
    actions.register(ActionDescriptor {
        id: QUIT,
        label: "Quit",
        category: Some("Application"),
        precondition: None,
        default_chord: Some(Chord::new(Key::Char('q'), Mods::CTRL)),
        chord_weight: BindingWeight::Core,
        handler: quit,
    });

    // Both entries highlight whenever the focused editor renders
    // right-to-left, so menu state and editor state can never diverge.
    let rtl = ContextExpr::equals(context_keys::TEXT_DIRECTION, "rtl");
    menus.append(
        MenuId::EditorTitle,
        MenuItem::new(TOGGLE_TEXT_DIRECTION, "Toggle Text Direction", "navigation", 1)
            .icon("whole-word")
            .tooltip("Switch Text Direction")
            .toggled(rtl),
    );
    menus.append(
        MenuId::ViewMenu,
        MenuItem::new(TOGGLE_TEXT_DIRECTION, "Switch Text Direction", "6_editor", 2)
            .toggled(rtl),
    );
}

/// Flip the target editor between left-to-right and right-to-left.
///
/// Editors without a document have no direction to flip; the action ignores
/// them without writing options or publishing telemetry. One classified
/// `editor.toggleTextDirection` event is published per effective toggle.
fn toggle_text_direction(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    let target = ctx.target;
    let Some(editor) = ctx.workbench.editor_mut(target) else {
        debug!(target: "actions.dispatch", editor = target.0, "toggle_skipped_no_editor");
        return ActionOutcome::ignored();
    };
    if !editor.has_document() {
        debug!(target: "actions.dispatch", editor = target.0, "toggle_skipped_no_document");
        return ActionOutcome::ignored();
    }

    let next = editor.options().text_direction.toggled();
    editor.update_options(OptionsUpdate::direction(next));

    let surface = ctx.workbench.surface_of(target);
    ctx.telemetry.publish(TelemetryEvent::classified(
        &TOGGLE_TEXT_DIRECTION_CLASSIFICATION,
        vec![
            ("newDirection", next.as_str().to_string()),
            ("surface", surface.as_str().to_string()),
        ],
    ));
    ActionOutcome::options_changed()
}

/// Cycle focus to the next editor in id order.
fn focus_next_editor(ctx: &mut ActionContext<'_>) -> ActionOutcome {
    match ctx.workbench.focus_next() {
        Some(_) => ActionOutcome::handled(),
        None => ActionOutcome::ignored(),
    }
}

/// Request application shutdown.
fn quit(_ctx: &mut ActionContext<'_>) -> ActionOutcome {
    ActionOutcome::quit()
}
