use std::time::Duration;

/// Key on the guest console keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Esc,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// Function key `F1`..`F12`.
    F(u8),
    LeftCtrl,
    LeftAlt,
    LeftShift,
    LeftSuper,
    RightCtrl,
    RightAlt,
    RightShift,
    RightSuper,
}

impl Key {
    /// Looks up a named key (case-insensitive), e.g. `enter`, `pageUp`, `f5`.
    pub fn named(name: &str) -> Option<Key> {
        let lower = name.to_ascii_lowercase();
        let key = match lower.as_str() {
            "enter" | "return" => Key::Enter,
            "tab" => Key::Tab,
            "esc" => Key::Esc,
            "bs" => Key::Backspace,
            "del" => Key::Delete,
            "insert" => Key::Insert,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            "spacebar" => Key::Char(' '),
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "leftctrl" => Key::LeftCtrl,
            "leftalt" => Key::LeftAlt,
            "leftshift" => Key::LeftShift,
            "leftsuper" => Key::LeftSuper,
            "rightctrl" => Key::RightCtrl,
            "rightalt" => Key::RightAlt,
            "rightshift" => Key::RightShift,
            "rightsuper" => Key::RightSuper,
            f if f.len() >= 2 && f.starts_with('f') => {
                let n: u8 = f[1..].parse().ok()?;
                if !(1..=12).contains(&n) {
                    return None;
                }
                Key::F(n)
            }
            _ => return None,
        };
        Some(key)
    }

    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            Key::LeftCtrl
                | Key::LeftAlt
                | Key::LeftShift
                | Key::LeftSuper
                | Key::RightCtrl
                | Key::RightAlt
                | Key::RightShift
                | Key::RightSuper
        )
    }
}

/// What to do with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Press and release.
    Press,
    /// Press and hold.
    Down,
    /// Release a held key.
    Up,
}

/// One entry of a parsed boot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootEvent {
    Key { key: Key, action: KeyAction },
    Wait(Duration),
}

impl BootEvent {
    pub fn press(key: Key) -> Self {
        BootEvent::Key {
            key,
            action: KeyAction::Press,
        }
    }
}
