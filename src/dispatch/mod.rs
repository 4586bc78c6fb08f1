#[cfg(feature = "os-input")]
mod os_input;

use std::time::Duration;

use anyhow::Result;

#[cfg(feature = "os-input")]
pub use self::os_input::EnigoEffector;
use crate::{config::ControlConfig, types::Gesture};

const DEFAULT_SCREEN_SIZE: (u32, u32) = (1920, 1080);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Idle,
    Stop,
    Confirm,
    Play,
    VolumeUp,
    VolumeDown,
    Drag,
    MoveMouse { x: i32, y: i32 },
}

impl Action {
    /// Action fired when a debounced gesture event arrives. Pointer movement
    /// is driven every frame elsewhere, so `point` maps to nothing here.
    pub fn for_gesture(gesture: Gesture) -> Option<Action> {
        match gesture {
            Gesture::OpenPalm => Some(Action::Idle),
            Gesture::Fist => Some(Action::Stop),
            Gesture::ThumbsUp => Some(Action::Confirm),
            Gesture::TwoFingers => Some(Action::Play),
            Gesture::ThreeFingers => Some(Action::VolumeUp),
            Gesture::FourFingers => Some(Action::VolumeDown),
            Gesture::Pinch => Some(Action::Drag),
            Gesture::Point => None,
            Gesture::None => None,
        }
    }

    /// Label shown in the gesture guide and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Idle => "Idle",
            Action::Stop => "Stop",
            Action::Confirm => "Confirm",
            Action::Play => "Play",
            Action::VolumeUp => "Volume Up",
            Action::VolumeDown => "Volume Down",
            Action::Drag => "Drag",
            Action::MoveMouse { .. } => "Move Mouse",
        }
    }
}

/// Label of what a gesture does, including the continuous pointer path.
pub fn gesture_action_label(gesture: Gesture) -> &'static str {
    match gesture {
        Gesture::Point => "Move Mouse",
        other => Action::for_gesture(other)
            .map(|action| action.label())
            .unwrap_or("None"),
    }
}

/// OS-facing side of the dispatcher.
pub trait Effector {
    fn screen_size(&mut self) -> Result<(u32, u32)>;
    fn press_key(&mut self, key: Key) -> Result<()>;
    fn click(&mut self) -> Result<()>;
    fn mouse_down(&mut self) -> Result<()>;
    fn mouse_up(&mut self) -> Result<()>;
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Space,
    VolumeUp,
    VolumeDown,
}

/// Effector for dry runs: records nothing, touches nothing.
#[derive(Debug, Default)]
pub struct LogEffector;

impl Effector for LogEffector {
    fn screen_size(&mut self) -> Result<(u32, u32)> {
        Ok(DEFAULT_SCREEN_SIZE)
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        log::debug!("[dry-run] press {key:?}");
        Ok(())
    }

    fn click(&mut self) -> Result<()> {
        log::debug!("[dry-run] click");
        Ok(())
    }

    fn mouse_down(&mut self) -> Result<()> {
        log::debug!("[dry-run] mouse down");
        Ok(())
    }

    fn mouse_up(&mut self) -> Result<()> {
        log::debug!("[dry-run] mouse up");
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        log::trace!("[dry-run] move to ({x}, {y})");
        Ok(())
    }
}

impl<E: Effector + ?Sized> Effector for Box<E> {
    fn screen_size(&mut self) -> Result<(u32, u32)> {
        (**self).screen_size()
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        (**self).press_key(key)
    }

    fn click(&mut self) -> Result<()> {
        (**self).click()
    }

    fn mouse_down(&mut self) -> Result<()> {
        (**self).mouse_down()
    }

    fn mouse_up(&mut self) -> Result<()> {
        (**self).mouse_up()
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        (**self).move_to(x, y)
    }
}

/// Maps actions onto effector calls.
pub struct Dispatcher<E> {
    effector: E,
    drag_hold: Duration,
    announce: bool,
    screen: Option<(u32, u32)>,
}

impl<E: Effector> Dispatcher<E> {
    pub fn new(effector: E, config: &ControlConfig) -> Self {
        Self {
            effector,
            drag_hold: Duration::from_millis(config.drag_hold_ms),
            announce: config.announce_actions,
            screen: None,
        }
    }

    /// Screen size, queried once and cached.
    pub fn screen_size(&mut self) -> (u32, u32) {
        if let Some(size) = self.screen {
            return size;
        }
        let size = self.effector.screen_size().unwrap_or_else(|err| {
            log::warn!("failed to query screen size, assuming {DEFAULT_SCREEN_SIZE:?}: {err:?}");
            DEFAULT_SCREEN_SIZE
        });
        self.screen = Some(size);
        size
    }

    /// Effector failures are logged and swallowed so the loop keeps running.
    pub fn dispatch(&mut self, action: Action) {
        if !matches!(action, Action::MoveMouse { .. } | Action::Idle) {
            log::info!("action: {}", action.label());
            if self.announce {
                log::info!("[announce] {}", action.label());
            }
        }

        if let Err(err) = self.perform(action) {
            log::warn!("action {} failed: {err:?}", action.label());
        }
    }

    fn perform(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Idle => Ok(()),
            Action::Stop | Action::Play => self.effector.press_key(Key::Space),
            Action::Confirm => self.effector.click(),
            Action::VolumeUp => self.effector.press_key(Key::VolumeUp),
            Action::VolumeDown => self.effector.press_key(Key::VolumeDown),
            Action::Drag => {
                self.effector.mouse_down()?;
                if !self.drag_hold.is_zero() {
                    std::thread::sleep(self.drag_hold);
                }
                self.effector.mouse_up()
            }
            Action::MoveMouse { x, y } => self.effector.move_to(x, y),
        }
    }

    #[cfg(test)]
    pub fn effector(&self) -> &E {
        &self.effector
    }
}
