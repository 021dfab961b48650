//! Input types that are independent of any specific windowing library.
//! The external input layer normalizes its events into these.

use serde::{Deserialize, Serialize};

/// Mouse button identifier
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

/// A single modifier key, as named in configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModifierKey {
    Shift,
    Control,
    Alt,
    Super,
}

/// Keyboard modifiers state
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub super_key: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        control: false,
        alt: false,
        super_key: false,
    };

    /// Modifiers with only `key` held.
    pub fn only(key: ModifierKey) -> Self {
        let mut modifiers = Self::NONE;
        match key {
            ModifierKey::Shift => modifiers.shift = true,
            ModifierKey::Control => modifiers.control = true,
            ModifierKey::Alt => modifiers.alt = true,
            ModifierKey::Super => modifiers.super_key = true,
        }
        modifiers
    }

    pub fn is_pressed(&self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Control => self.control,
            ModifierKey::Alt => self.alt,
            ModifierKey::Super => self.super_key,
        }
    }

    pub fn any_pressed(&self, keys: &[ModifierKey]) -> bool {
        keys.iter().any(|&key| self.is_pressed(key))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    /// Pointer down and up without a drag
    Click,
    DoubleClick,
}

/// A normalized pointer event in screen space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub button: MouseButton,
    /// Position in physical pixels, origin at the top-left corner
    pub position: (f32, f32),
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Primary-button click with no modifiers.
    pub fn click(x: f32, y: f32) -> Self {
        Self {
            kind: PointerEventKind::Click,
            button: MouseButton::Left,
            position: (x, y),
            modifiers: Modifiers::NONE,
        }
    }

    /// Primary-button double-click with no modifiers.
    pub fn double_click(x: f32, y: f32) -> Self {
        Self {
            kind: PointerEventKind::DoubleClick,
            ..Self::click(x, y)
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }
}
