//! Boot command scripts: literal text mixed with `<special>` tokens.
//!
//! Recognised tokens (names are case-insensitive):
//! - named keys such as `<enter>`, `<tab>`, `<esc>`, `<bs>`, `<del>`,
//!   `<spacebar>`, `<up>`, `<pageDown>`, `<f1>`..`<f12>`;
//! - modifiers as `<leftCtrl>` (press) or `<leftCtrlOn>` / `<leftCtrlOff>`
//!   (hold / release);
//! - `<wait>` (one second), `<wait10>` (seconds) and `<wait1m30s>`
//!   (`h`, `m`, `s`, `ms` units).
//!
//! A `<` that does not open a recognised token is typed literally.

mod key;
pub use key::{BootEvent, Key, KeyAction};

use std::time::Duration;

use crate::{ModelError, ModelResult};

/// Parses a boot command into key and wait events.
pub fn parse_boot_command(input: &str) -> ModelResult<Vec<BootEvent>> {
    let mut events = Vec::new();
    let mut rest = input;
    let mut offset = 0;

    while let Some(c) = rest.chars().next() {
        if c == '<' {
            if let Some(end) = rest.find('>') {
                let token = &rest[1..end];
                if let Some(ev) = parse_token(token, offset)? {
                    events.push(ev);
                    offset += end + 1;
                    rest = &rest[end + 1..];
                    continue;
                }
            }
        }
        let key = match c {
            '\n' => Key::Enter,
            '\t' => Key::Tab,
            other => Key::Char(other),
        };
        events.push(BootEvent::press(key));
        offset += c.len_utf8();
        rest = &rest[c.len_utf8()..];
    }

    Ok(events)
}

/// `Ok(None)` means the text is not a token and must be typed literally.
fn parse_token(token: &str, offset: usize) -> ModelResult<Option<BootEvent>> {
    let lower = token.to_ascii_lowercase();

    if let Some(spec) = lower.strip_prefix("wait") {
        let dur = parse_wait(spec).ok_or_else(|| ModelError::InvalidBootCommand {
            offset,
            reason: format!("bad wait duration in <{token}>"),
        })?;
        return Ok(Some(BootEvent::Wait(dur)));
    }

    if let Some(key) = Key::named(token) {
        return Ok(Some(BootEvent::press(key)));
    }

    for (suffix, action) in [("on", KeyAction::Down), ("off", KeyAction::Up)] {
        if let Some(name) = lower.strip_suffix(suffix)
            && let Some(key) = Key::named(name)
        {
            if !key.is_modifier() {
                return Err(ModelError::InvalidBootCommand {
                    offset,
                    reason: format!("<{token}>: only modifier keys can be held"),
                });
            }
            return Ok(Some(BootEvent::Key { key, action }));
        }
    }

    Ok(None)
}

fn parse_wait(spec: &str) -> Option<Duration> {
    if spec.is_empty() {
        return Some(Duration::from_secs(1));
    }
    if spec.bytes().all(|b| b.is_ascii_digit()) {
        return spec.parse().ok().map(Duration::from_secs);
    }

    let mut total = Duration::ZERO;
    let mut rest = spec;
    while !rest.is_empty() {
        let split = rest.find(|c: char| !c.is_ascii_digit())?;
        if split == 0 {
            return None;
        }
        let value: u64 = rest[..split].parse().ok()?;
        rest = &rest[split..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "h" => Duration::from_secs(value.checked_mul(3600)?),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "s" => Duration::from_secs(value),
            "ms" => Duration::from_millis(value),
            _ => return None,
        };
        total = total.checked_add(part)?;
        rest = &rest[unit_len..];
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(events: &[BootEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                BootEvent::Key {
                    key: Key::Char(c),
                    action: KeyAction::Press,
                } => Some(*c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn literal_text_and_named_keys() {
        let ev = parse_boot_command("linux ks=hd:LABEL=OEMDRV<enter>").unwrap();
        assert_eq!(keys(&ev), "linux ks=hd:LABEL=OEMDRV");
        assert_eq!(ev.last(), Some(&BootEvent::press(Key::Enter)));
    }

    #[test]
    fn waits_in_all_forms() {
        let ev = parse_boot_command("<wait><wait5><wait1m30s><wait250ms>").unwrap();
        assert_eq!(
            ev,
            vec![
                BootEvent::Wait(Duration::from_secs(1)),
                BootEvent::Wait(Duration::from_secs(5)),
                BootEvent::Wait(Duration::from_secs(90)),
                BootEvent::Wait(Duration::from_millis(250)),
            ]
        );
    }

    #[test]
    fn modifiers_can_be_held_and_released() {
        let ev = parse_boot_command("<leftCtrlOn>x<leftCtrlOff>").unwrap();
        assert_eq!(
            ev,
            vec![
                BootEvent::Key {
                    key: Key::LeftCtrl,
                    action: KeyAction::Down
                },
                BootEvent::press(Key::Char('x')),
                BootEvent::Key {
                    key: Key::LeftCtrl,
                    action: KeyAction::Up
                },
            ]
        );
    }

    #[test]
    fn unknown_tokens_are_typed_literally() {
        let ev = parse_boot_command("a<b>c").unwrap();
        assert_eq!(keys(&ev), "a<b>c");
        let ev = parse_boot_command("1 < 2").unwrap();
        assert_eq!(keys(&ev), "1 < 2");
    }

    #[test]
    fn function_keys_are_bounded() {
        assert_eq!(
            parse_boot_command("<F12>").unwrap(),
            vec![BootEvent::press(Key::F(12))]
        );
        assert_eq!(keys(&parse_boot_command("<f13>").unwrap()), "<f13>");
    }

    #[test]
    fn malformed_wait_reports_offset() {
        let err = parse_boot_command("abc<wait1x>").unwrap_err();
        match err {
            ModelError::InvalidBootCommand { offset, .. } => assert_eq!(offset, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn only_modifiers_can_be_held() {
        assert!(parse_boot_command("<enterOn>").is_err());
    }
}
