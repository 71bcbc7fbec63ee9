use core_events::{Key, KeyInput, Mods};
use crossterm::event::{
    KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyModifiers as CKeyModifiers,
};

/// Map a crossterm key event into the logical [`KeyInput`] the keymap layer
/// consumes.
///
/// Returns `None` for key codes we do not support (media keys, lock keys,
/// bare modifiers). Press and repeat kinds map identically; the caller
/// filters releases before mapping.
pub(crate) fn map_key_input(event: &CKeyEvent) -> Option<KeyInput> {
    let key = map_key(&event.code)?;
    Some(KeyInput::new(key, map_mods(event.modifiers)))
}

fn map_key(code: &CKeyCode) -> Option<Key> {
    let key = match code {
        CKeyCode::Char(c) => Key::Char(*c),
        CKeyCode::Enter => Key::Enter,
        CKeyCode::Esc => Key::Escape,
        CKeyCode::Backspace => Key::Backspace,
        CKeyCode::Tab | CKeyCode::BackTab => Key::Tab,
        CKeyCode::Up => Key::Up,
        CKeyCode::Down => Key::Down,
        CKeyCode::Left => Key::Left,
        CKeyCode::Right => Key::Right,
        CKeyCode::Home => Key::Home,
        CKeyCode::End => Key::End,
        CKeyCode::PageUp => Key::PageUp,
        CKeyCode::PageDown => Key::PageDown,
        CKeyCode::Insert => Key::Insert,
        CKeyCode::Delete => Key::Delete,
        CKeyCode::F(n) => Key::F(*n),
        CKeyCode::Null
        | CKeyCode::CapsLock
        | CKeyCode::ScrollLock
        | CKeyCode::NumLock
        | CKeyCode::PrintScreen
        | CKeyCode::Pause
        | CKeyCode::Menu
        | CKeyCode::KeypadBegin
        | CKeyCode::Media(_)
        | CKeyCode::Modifier(_) => return None,
    };
    Some(key)
}

/// Convert crossterm modifier flags into the logical `Mods` bits.
pub(crate) fn map_mods(mods: CKeyModifiers) -> Mods {
    let mut out = Mods::empty();
    if mods.contains(CKeyModifiers::CONTROL) {
        out |= Mods::CTRL;
    }
    if mods.contains(CKeyModifiers::ALT) {
        out |= Mods::ALT;
    }
    if mods.contains(CKeyModifiers::SHIFT) {
        out |= Mods::SHIFT;
    }
    if mods.contains(CKeyModifiers::SUPER) || mods.contains(CKeyModifiers::META) {
        out |= Mods::SUPER;
    }
    out
}
