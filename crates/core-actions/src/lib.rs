//! Action descriptors, registry, and dispatch.
//!
//! An action is a named command with an id, display metadata, an optional
//! precondition, and a handler function. Contributions register
//! [`ActionDescriptor`]s once at startup; the event loop turns resolved key
//! chords into [`dispatch`] calls. Handlers receive their collaborators
//! through [`ActionContext`] as explicit parameters, never through globals,
//! so tests can run any action against a scratch workbench and a capturing
//! telemetry sink.

pub mod builtin;

use core_context::{ContextExpr, ContextModel};
use core_keymap::{BindingWeight, Chord, Keybinding, KeybindingRegistry};
use core_telemetry::TelemetrySink;
use core_workbench::{EditorId, Workbench};
use tracing::{debug, warn};

// -------------------------------------------------------------------------------------------------
// Outcome
// -------------------------------------------------------------------------------------------------

/// What a dispatched action did, as flags the event loop folds into its
/// redraw and shutdown decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionOutcome {
    /// The handler ran and acted. False means the input fell through.
    pub handled: bool,
    /// Editor options changed; the frame must be redrawn.
    pub options_changed: bool,
    /// The action requests application shutdown.
    pub quit: bool,
}

impl ActionOutcome {
    /// Handled, nothing else to do.
    pub const fn handled() -> Self {
        Self {
            handled: true,
            options_changed: false,
            quit: false,
        }
    }

    /// Not handled; the key press had no effect.
    pub const fn ignored() -> Self {
        Self {
            handled: false,
            options_changed: false,
            quit: false,
        }
    }

    /// Handled and editor options changed.
    pub const fn options_changed() -> Self {
        Self {
            handled: true,
            options_changed: true,
            quit: false,
        }
    }

    /// Handled; shut the application down.
    pub const fn quit() -> Self {
        Self {
            handled: true,
            options_changed: false,
            quit: true,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Descriptors
// -------------------------------------------------------------------------------------------------

/// Handler signature. Handlers are plain functions: all state they touch
/// arrives via the context argument.
pub type ActionHandler = fn(&mut ActionContext<'_>) -> ActionOutcome;

/// Static description of one action: identity, display metadata, gating,
/// default keybinding, and the handler.
#[derive(Debug, Clone, Copy)]
pub struct ActionDescriptor {
    pub id: &'static str,
    pub label: &'static str,
    pub category: Option<&'static str>,
    /// Evaluated against the focused editor's context before the handler
    /// runs; a false result means the action does not fire.
    pub precondition: Option<ContextExpr>,
    pub default_chord: Option<Chord>,
    pub chord_weight: BindingWeight,
    pub handler: ActionHandler,
}

/// Collaborators available to a running handler.
pub struct ActionContext<'a> {
    pub workbench: &'a mut Workbench,
    /// The editor the action applies to, normally the focused one. The id
    /// may be stale; handlers treat a failed lookup as a no-op.
    pub target: EditorId,
    pub telemetry: &'a dyn TelemetrySink,
}

// -------------------------------------------------------------------------------------------------
// Registry
// -------------------------------------------------------------------------------------------------

/// All registered actions, looked up by id at dispatch time.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: Vec<ActionDescriptor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Ids are expected to be unique; a duplicate
    /// replaces the earlier registration.
    pub fn register(&mut self, descriptor: ActionDescriptor) {
        debug!(
            target: "actions",
            action = descriptor.id,
            weight = descriptor.chord_weight.as_str(),
            "action_registered"
        );
        if let Some(existing) = self.actions.iter_mut().find(|d| d.id == descriptor.id) {
            warn!(target: "actions", action = descriptor.id, "duplicate_action_replaced");
            *existing = descriptor;
        } else {
            self.actions.push(descriptor);
        }
    }

    pub fn get(&self, id: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|d| d.id == id)
    }

    pub fn descriptors(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    /// Install every registered default chord into the keymap at its
    /// declared weight. An action's precondition doubles as the binding's
    /// `when` clause, so gated actions never swallow the chord while gated.
    pub fn install_default_bindings(&self, keymap: &mut KeybindingRegistry) {
        for descriptor in &self.actions {
            let Some(chord) = descriptor.default_chord else {
                continue;
            };
            let mut binding = Keybinding::new(chord, descriptor.id, descriptor.chord_weight);
            if let Some(precondition) = descriptor.precondition {
                binding = binding.when(precondition);
            }
            keymap.register(binding);
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Dispatch
// -------------------------------------------------------------------------------------------------

/// Run one action by id. Unknown ids and failing preconditions return
/// [`ActionOutcome::ignored`] without touching the workbench or publishing
/// telemetry.
pub fn dispatch(
    registry: &ActionRegistry,
    id: &str,
    ctx: &mut ActionContext<'_>,
    context: &ContextModel,
) -> ActionOutcome {
    let Some(descriptor) = registry.get(id) else {
        warn!(target: "actions.dispatch", action = %id, "unknown_action");
        return ActionOutcome::ignored();
    };
    if let Some(precondition) = &descriptor.precondition
        && !precondition.eval(context)
    {
        debug!(target: "actions.dispatch", action = descriptor.id, "precondition_failed");
        return ActionOutcome::ignored();
    }
    let outcome = (descriptor.handler)(ctx);
    debug!(
        target: "actions.dispatch",
        action = descriptor.id,
        handled = outcome.handled,
        options_changed = outcome.options_changed,
        quit = outcome.quit,
        "dispatched"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{Key, Mods};
    use core_options::TextDirection;
    use core_telemetry::NullSink;

    fn noop(_ctx: &mut ActionContext<'_>) -> ActionOutcome {
        ActionOutcome::handled()
    }

    fn descriptor(id: &'static str) -> ActionDescriptor {
        ActionDescriptor {
            id,
            label: "Test Action",
            category: None,
            precondition: None,
            default_chord: None,
            chord_weight: BindingWeight::Core,
            handler: noop,
        }
    }

    #[test]
    fn outcome_constructors_set_expected_flags() {
        assert!(ActionOutcome::handled().handled);
        assert!(!ActionOutcome::handled().quit);
        assert!(!ActionOutcome::ignored().handled);
        assert!(ActionOutcome::options_changed().options_changed);
        assert!(ActionOutcome::quit().quit);
        assert!(ActionOutcome::quit().handled);
    }

    #[test]
    fn register_and_get_round_trip() {
        let mut registry = ActionRegistry::new();
        registry.register(descriptor("alpha"));
        registry.register(descriptor("beta"));
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("beta").is_some());
        assert!(registry.get("gamma").is_none());
        assert_eq!(registry.descriptors().len(), 2);
    }

    #[test]
    fn duplicate_registration_replaces_earlier() {
        let mut registry = ActionRegistry::new();
        registry.register(descriptor("alpha"));
        let mut replacement = descriptor("alpha");
        replacement.label = "Replacement";
        registry.register(replacement);
        assert_eq!(registry.descriptors().len(), 1);
        assert_eq!(registry.get("alpha").unwrap().label, "Replacement");
    }

    #[test]
    fn install_skips_actions_without_default_chord() {
        let mut registry = ActionRegistry::new();
        registry.register(descriptor("unbound"));
        let mut bound = descriptor("bound");
        bound.default_chord = Some(Chord::new(Key::F(2), Mods::empty()));
        registry.register(bound);

        let mut keymap = KeybindingRegistry::new();
        registry.install_default_bindings(&mut keymap);
        assert_eq!(keymap.bindings().len(), 1);
        assert_eq!(keymap.bindings()[0].action, "bound");
    }

    #[test]
    fn install_carries_precondition_as_when_clause() {
        let mut registry = ActionRegistry::new();
        let mut gated = descriptor("gated");
        gated.default_chord = Some(Chord::new(Key::F(3), Mods::empty()));
        gated.precondition = Some(ContextExpr::equals("mode", "ready"));
        registry.register(gated);

        let mut keymap = KeybindingRegistry::new();
        registry.install_default_bindings(&mut keymap);
        assert!(keymap.bindings()[0].when.is_some());
    }

    #[test]
    fn dispatch_unknown_id_is_ignored() {
        let registry = ActionRegistry::new();
        let mut workbench = Workbench::new(TextDirection::Ltr);
        let target = workbench.open_editor(None);
        let mut ctx = ActionContext {
            workbench: &mut workbench,
            target,
            telemetry: &NullSink,
        };
        let outcome = dispatch(&registry, "missing", &mut ctx, &ContextModel::new());
        assert_eq!(outcome, ActionOutcome::ignored());
    }

    #[test]
    fn dispatch_blocks_on_failing_precondition() {
        let mut registry = ActionRegistry::new();
        let mut gated = descriptor("gated");
        gated.precondition = Some(ContextExpr::equals("mode", "ready"));
        registry.register(gated);

        let mut workbench = Workbench::new(TextDirection::Ltr);
        let target = workbench.open_editor(None);
        let mut ctx = ActionContext {
            workbench: &mut workbench,
            target,
            telemetry: &NullSink,
        };

        let blocked = dispatch(&registry, "gated", &mut ctx, &ContextModel::new());
        assert_eq!(blocked, ActionOutcome::ignored());

        let mut context = ContextModel::new();
        context.set("mode", "ready");
        let allowed = dispatch(&registry, "gated", &mut ctx, &context);
        assert_eq!(allowed, ActionOutcome::handled());
    }
}
