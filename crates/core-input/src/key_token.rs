use core_events::{KeyToken, ModMask, NamedKey};
use crossterm::event::{
    KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyModifiers as CKeyModifiers,
};

/// Result of translating a terminal key event into token components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyPressParts {
    pub token: KeyToken,
    pub mods: ModMask,
    pub repeat: bool,
}

impl KeyPressParts {
    /// Fold modifiers into a chord so consumers see e.g. Shift+Enter as one token.
    pub(crate) fn into_token(self) -> KeyToken {
        if self.mods.is_empty() {
            self.token
        } else {
            KeyToken::Chord {
                base: Box::new(self.token),
                mods: self.mods,
            }
        }
    }
}

/// Map a crossterm key event into a token + modifiers.
///
/// Returns `None` for keys the input surface has no use for.
pub(crate) fn map_key_event(event: &CKeyEvent) -> Option<KeyPressParts> {
    let token = map_key_token(&event.code)?;
    let mut mods = map_mod_mask(event.modifiers);
    // Uppercase chars already carry the shift.
    if matches!(token, KeyToken::Char(_)) {
        mods.remove(ModMask::SHIFT);
    }
    let repeat = matches!(event.kind, CKeyEventKind::Repeat);
    Some(KeyPressParts {
        token,
        mods,
        repeat,
    })
}

pub(crate) fn map_key_token(code: &CKeyCode) -> Option<KeyToken> {
    let token = match code {
        CKeyCode::Char(c) => KeyToken::Char(*c),
        CKeyCode::Enter => KeyToken::Named(NamedKey::Enter),
        CKeyCode::Esc => KeyToken::Named(NamedKey::Esc),
        CKeyCode::Backspace => KeyToken::Named(NamedKey::Backspace),
        CKeyCode::Tab | CKeyCode::BackTab => KeyToken::Named(NamedKey::Tab),
        CKeyCode::Up => KeyToken::Named(NamedKey::Up),
        CKeyCode::Down => KeyToken::Named(NamedKey::Down),
        CKeyCode::Left => KeyToken::Named(NamedKey::Left),
        CKeyCode::Right => KeyToken::Named(NamedKey::Right),
        CKeyCode::Home => KeyToken::Named(NamedKey::Home),
        CKeyCode::End => KeyToken::Named(NamedKey::End),
        CKeyCode::Delete => KeyToken::Named(NamedKey::Delete),
        _ => return None,
    };
    Some(token)
}

pub(crate) fn map_mod_mask(mods: CKeyModifiers) -> ModMask {
    let mut out = ModMask::empty();
    if mods.contains(CKeyModifiers::CONTROL) {
        out |= ModMask::CTRL;
    }
    if mods.contains(CKeyModifiers::ALT) {
        out |= ModMask::ALT;
    }
    if mods.contains(CKeyModifiers::SHIFT) {
        out |= ModMask::SHIFT;
    }
    if mods.contains(CKeyModifiers::SUPER) {
        out |= ModMask::SUPER;
    }
    if mods.contains(CKeyModifiers::META) {
        out |= ModMask::META;
    }
    out
}
