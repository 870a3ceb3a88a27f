//! Global hotkeys for pausing and killing the bot
//!
//! Both bindings work while the game has focus. The listener owns the
//! `GlobalHotKeyManager` on its own thread, polls for events until the stop
//! signal is set, then unregisters both keys.

use anyhow::{anyhow, bail, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use std::time::Duration;

use super::log::BotLog;
use super::signal::RunContext;

const EVENT_POLL: Duration = Duration::from_millis(100);

/// Parse a binding such as `"F9"`, `"ctrl+shift+P"` or `"alt+1"`
pub fn parse_hotkey(binding: &str) -> Result<HotKey> {
    let mut modifiers = Modifiers::empty();
    let mut key = None;

    for token in binding.split('+').map(str::trim) {
        if token.is_empty() {
            bail!("Empty key in hotkey '{}'", binding);
        }
        match token.to_ascii_uppercase().as_str() {
            "CTRL" | "CONTROL" => modifiers |= Modifiers::CONTROL,
            "SHIFT" => modifiers |= Modifiers::SHIFT,
            "ALT" | "OPTION" => modifiers |= Modifiers::ALT,
            "SUPER" | "CMD" | "COMMAND" | "WIN" | "META" => modifiers |= Modifiers::SUPER,
            other => {
                if key.is_some() {
                    bail!("Hotkey '{}' has more than one key", binding);
                }
                let code = key_code(other)
                    .ok_or_else(|| anyhow!("Unknown key '{}' in hotkey '{}'", token, binding))?;
                key = Some(code);
            }
        }
    }

    let key = key.ok_or_else(|| anyhow!("Hotkey '{}' has no key", binding))?;
    let modifiers = (!modifiers.is_empty()).then_some(modifiers);
    Ok(HotKey::new(modifiers, key))
}

fn key_code(name: &str) -> Option<Code> {
    let code = match name {
        "F1" => Code::F1,
        "F2" => Code::F2,
        "F3" => Code::F3,
        "F4" => Code::F4,
        "F5" => Code::F5,
        "F6" => Code::F6,
        "F7" => Code::F7,
        "F8" => Code::F8,
        "F9" => Code::F9,
        "F10" => Code::F10,
        "F11" => Code::F11,
        "F12" => Code::F12,
        "F13" => Code::F13,
        "F14" => Code::F14,
        "F15" => Code::F15,
        "F16" => Code::F16,
        "F17" => Code::F17,
        "F18" => Code::F18,
        "F19" => Code::F19,
        "F20" => Code::F20,
        "F21" => Code::F21,
        "F22" => Code::F22,
        "F23" => Code::F23,
        "F24" => Code::F24,
        "ESC" | "ESCAPE" => Code::Escape,
        "SPACE" => Code::Space,
        "TAB" => Code::Tab,
        "ENTER" | "RETURN" => Code::Enter,
        "PAUSE" => Code::Pause,
        "INSERT" => Code::Insert,
        "DELETE" => Code::Delete,
        "HOME" => Code::Home,
        "END" => Code::End,
        "PAGEUP" => Code::PageUp,
        "PAGEDOWN" => Code::PageDown,
        _ => return single_char_code(name),
    };
    Some(code)
}

fn single_char_code(name: &str) -> Option<Code> {
    let mut chars = name.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    const LETTERS: [Code; 26] = [
        Code::KeyA, Code::KeyB, Code::KeyC, Code::KeyD, Code::KeyE, Code::KeyF, Code::KeyG,
        Code::KeyH, Code::KeyI, Code::KeyJ, Code::KeyK, Code::KeyL, Code::KeyM, Code::KeyN,
        Code::KeyO, Code::KeyP, Code::KeyQ, Code::KeyR, Code::KeyS, Code::KeyT, Code::KeyU,
        Code::KeyV, Code::KeyW, Code::KeyX, Code::KeyY, Code::KeyZ,
    ];
    const DIGITS: [Code; 10] = [
        Code::Digit0, Code::Digit1, Code::Digit2, Code::Digit3, Code::Digit4,
        Code::Digit5, Code::Digit6, Code::Digit7, Code::Digit8, Code::Digit9,
    ];
    match c {
        'A'..='Z' => Some(LETTERS[(c as u8 - b'A') as usize]),
        '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
        _ => None,
    }
}

/// Register the pause and shutdown bindings and dispatch presses until stopped.
///
/// Registration failure is logged and ends the listener; scanning can still
/// be toggled from the console.
pub fn run_hotkey_listener(
    run: &RunContext,
    pause_binding: &str,
    shutdown_binding: &str,
    log: &BotLog,
    on_toggle: impl Fn(),
    on_shutdown: impl Fn(),
) {
    let registered = parse_hotkey(pause_binding)
        .and_then(|pause| parse_hotkey(shutdown_binding).map(|shutdown| (pause, shutdown)))
        .and_then(|(pause, shutdown)| {
            let manager = GlobalHotKeyManager::new()
                .map_err(|e| anyhow!("Failed to create global hotkey manager: {}", e))?;
            manager
                .register(pause)
                .map_err(|e| anyhow!("Failed to register '{}': {}", pause_binding, e))?;
            if let Err(e) = manager.register(shutdown) {
                let _ = manager.unregister(pause);
                bail!("Failed to register '{}': {}", shutdown_binding, e);
            }
            Ok((manager, pause, shutdown))
        });

    let (manager, pause, shutdown) = match registered {
        Ok(registered) => registered,
        Err(e) => {
            log.error(format!(
                "Could not register hotkey. It may be in use. Error: {:#}",
                e
            ));
            return;
        }
    };

    log.info(format!(
        "Hotkey listener started. Press '{}' to toggle scanning.",
        pause_binding
    ));
    log.info(format!(
        "Failsafe enabled. Press '{}' to force close the application immediately.",
        shutdown_binding
    ));

    let events = GlobalHotKeyEvent::receiver();
    while !run.stop.is_set() {
        pump_messages();

        let Ok(event) = events.recv_timeout(EVENT_POLL) else {
            continue;
        };
        if event.state != HotKeyState::Pressed {
            continue;
        }

        if event.id == pause.id() {
            on_toggle();
        } else if event.id == shutdown.id() {
            on_shutdown();
        }
    }

    for hotkey in [pause, shutdown] {
        if let Err(e) = manager.unregister(hotkey) {
            tracing::warn!("Failed to unregister hotkey: {}", e);
        }
    }
    tracing::info!("Hotkey listener stopped");
}

/// Hotkey messages are posted to this thread's queue on Windows
#[cfg(target_os = "windows")]
fn pump_messages() {
    use winapi::um::winuser::{DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE};

    // SAFETY: MSG is plain data and is only read after PeekMessageW fills it
    unsafe {
        let mut msg: MSG = std::mem::zeroed();
        while PeekMessageW(&mut msg, std::ptr::null_mut(), 0, 0, PM_REMOVE) != 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(not(target_os = "windows"))]
fn pump_messages() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_function_keys() {
        assert_eq!(parse_hotkey("F9").unwrap(), HotKey::new(None, Code::F9));
        assert_eq!(parse_hotkey("f12").unwrap(), HotKey::new(None, Code::F12));
    }

    #[test]
    fn test_parse_modifiers() {
        let hotkey = parse_hotkey("ctrl + shift + p").unwrap();
        assert_eq!(
            hotkey,
            HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::KeyP)
        );
        assert_eq!(
            parse_hotkey("Alt+1").unwrap(),
            HotKey::new(Some(Modifiers::ALT), Code::Digit1)
        );
    }

    #[test]
    fn test_parse_rejects_bad_bindings() {
        assert!(parse_hotkey("").is_err());
        assert!(parse_hotkey("ctrl+").is_err());
        assert!(parse_hotkey("shift").is_err());
        assert!(parse_hotkey("F9+F10").is_err());
        assert!(parse_hotkey("ctrl+banana").is_err());
    }
}
