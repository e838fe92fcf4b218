//! Toolkit-neutral input events consumed by the interaction controller.
//!
//! Positions are in canvas (screen) pixels relative to the top-left corner
//! of the image viewport; the controller maps them into image space.

use crate::geometry::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Delete,
    Tab,
    ZoomIn,
    ZoomOut,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
    };

    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
        alt: false,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EventKind {
    Press(PointerButton),
    Move,
    Release(PointerButton),
    /// Positive notches zoom in / scroll up.
    Wheel { notches: i32 },
    Key(Key),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEvent {
    pub kind: EventKind,
    pub pos: Point,
    pub modifiers: Modifiers,
}

impl InputEvent {
    pub fn new(kind: EventKind, pos: Point, modifiers: Modifiers) -> Self {
        Self {
            kind,
            pos,
            modifiers,
        }
    }

    pub fn press(button: PointerButton, pos: Point) -> Self {
        Self::new(EventKind::Press(button), pos, Modifiers::NONE)
    }

    pub fn moved(pos: Point) -> Self {
        Self::new(EventKind::Move, pos, Modifiers::NONE)
    }

    pub fn release(button: PointerButton, pos: Point) -> Self {
        Self::new(EventKind::Release(button), pos, Modifiers::NONE)
    }

    pub fn key(key: Key) -> Self {
        Self::new(EventKind::Key(key), Point::default(), Modifiers::NONE)
    }

    pub fn wheel(notches: i32, pos: Point, modifiers: Modifiers) -> Self {
        Self::new(EventKind::Wheel { notches }, pos, modifiers)
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}
