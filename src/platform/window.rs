//! Windowing service contract.

use bitflags::bitflags;
use glam::{IVec2, UVec2, Vec2};

bitflags! {
    /// Keyboard modifier state carried by key and mouse events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// Platform scancode, as delivered by the windowing library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    Close,
    Move(IVec2),
    Resize(UVec2),
    Show,
    Hide,
    Paint,
    FocusGain,
    FocusLose,
    KeyPress { key: Key, modifiers: Modifiers },
    KeyRelease { key: Key, modifiers: Modifiers },
    KeyRepeat { key: Key, modifiers: Modifiers },
    Char(char),
    MouseMove { position: Vec2, modifiers: Modifiers },
    MousePress { button: MouseButton, position: Vec2, modifiers: Modifiers },
    MouseRelease { button: MouseButton, position: Vec2, modifiers: Modifiers },
    MouseDouble { button: MouseButton, position: Vec2, modifiers: Modifiers },
    MouseWheel { delta: f32, position: Vec2, modifiers: Modifiers },
}

/// What the engine needs from a window.
///
/// Event polling happens on the control thread; `make_current` and
/// `swap_buffers` on the graphics dispatch thread. The engine serializes
/// access, so implementations need `Send` but not reentrancy.
pub trait WindowService: Send {
    /// Binds the window's GPU context to the calling thread.
    fn make_current(&mut self);
    fn make_not_current(&mut self);
    fn resolution(&self) -> UVec2;
    fn swap_buffers(&mut self);
    /// Drains the platform event queue.
    fn poll_events(&mut self) -> Vec<WindowEvent>;
}

/// Window double for tests and headless runs: fixed resolution, scripted
/// events, counted swaps.
pub struct HeadlessWindow {
    pub resolution: UVec2,
    pub pending_events: Vec<WindowEvent>,
    pub swap_count: u32,
    pub current: bool,
}

impl HeadlessWindow {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: UVec2::new(width, height),
            pending_events: Vec::new(),
            swap_count: 0,
            current: false,
        }
    }
}

impl WindowService for HeadlessWindow {
    fn make_current(&mut self) {
        self.current = true;
    }

    fn make_not_current(&mut self) {
        self.current = false;
    }

    fn resolution(&self) -> UVec2 {
        self.resolution
    }

    fn swap_buffers(&mut self) {
        self.swap_count += 1;
    }

    fn poll_events(&mut self) -> Vec<WindowEvent> {
        std::mem::take(&mut self.pending_events)
    }
}
