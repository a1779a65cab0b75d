//! Local "media play/pause" key press, fire and forget

use crate::error::Error;

pub trait MediaKeys {
    fn play_pause(&self);
}

impl<T: MediaKeys + ?Sized> MediaKeys for &T {
    fn play_pause(&self) {
        (**self).play_pause()
    }
}

/// Presses the key through the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMediaKeys;

impl MediaKeys for SystemMediaKeys {
    fn play_pause(&self) {
        if let Err(err) = send_play_pause() {
            log::warn!("Failed to press media play/pause: {err}");
        }
    }
}

#[cfg(windows)]
fn send_play_pause() -> Result<(), Error> {
    use std::mem::size_of;

    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP,
        VK_MEDIA_PLAY_PAUSE,
    };

    let key = |flags: KEYBD_EVENT_FLAGS| INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VK_MEDIA_PLAY_PAUSE,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    };
    let inputs = [key(KEYBD_EVENT_FLAGS(0)), key(KEYEVENTF_KEYUP)];

    let sent = unsafe { SendInput(&inputs, size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(Error::custom(format!(
            "SendInput injected {sent} of {} key events",
            inputs.len()
        )));
    }
    Ok(())
}

/// MPRIS players are driven through `playerctl`
#[cfg(target_os = "linux")]
fn send_play_pause() -> Result<(), Error> {
    use std::process::Stdio;

    let mut child = tokio::process::Command::new("playerctl")
        .arg("play-pause")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if !status.success() => log::warn!("playerctl exited with {status}"),
            Err(err) => log::warn!("Failed to wait for playerctl: {err}"),
            _ => {}
        }
    });
    Ok(())
}

#[cfg(not(any(windows, target_os = "linux")))]
fn send_play_pause() -> Result<(), Error> {
    Err(Error::custom(
        "media key injection is not supported on this platform",
    ))
}
