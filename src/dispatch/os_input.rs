use anyhow::{Context, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};

use super::{Effector, Key};

/// Injects real mouse and keyboard input.
pub struct EnigoEffector {
    enigo: Enigo,
}

impl EnigoEffector {
    pub fn new() -> Result<Self> {
        let enigo =
            Enigo::new(&Settings::default()).context("failed to connect to the input system")?;
        Ok(Self { enigo })
    }
}

fn enigo_key(key: Key) -> enigo::Key {
    match key {
        Key::Space => enigo::Key::Space,
        Key::VolumeUp => enigo::Key::VolumeUp,
        Key::VolumeDown => enigo::Key::VolumeDown,
    }
}

impl Effector for EnigoEffector {
    fn screen_size(&mut self) -> Result<(u32, u32)> {
        let (w, h) = self
            .enigo
            .main_display()
            .context("failed to query main display size")?;
        Ok((w.max(1) as u32, h.max(1) as u32))
    }

    fn press_key(&mut self, key: Key) -> Result<()> {
        self.enigo
            .key(enigo_key(key), Direction::Click)
            .with_context(|| format!("failed to press {key:?}"))
    }

    fn click(&mut self) -> Result<()> {
        self.enigo
            .button(Button::Left, Direction::Click)
            .context("failed to click")
    }

    fn mouse_down(&mut self) -> Result<()> {
        self.enigo
            .button(Button::Left, Direction::Press)
            .context("failed to press mouse button")
    }

    fn mouse_up(&mut self) -> Result<()> {
        self.enigo
            .button(Button::Left, Direction::Release)
            .context("failed to release mouse button")
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .with_context(|| format!("failed to move cursor to ({x}, {y})"))
    }
}
