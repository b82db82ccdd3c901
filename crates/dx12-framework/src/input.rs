/// Virtual-key codes this framework reacts to. Letters and digits use their
/// ASCII upper-case codes, as Win32 does.
pub mod keys {
    pub const ESCAPE: u8 = 0x1B;
    pub const W: u8 = b'W';
    pub const A: u8 = b'A';
    pub const S: u8 = b'S';
    pub const D: u8 = b'D';
    pub const F: u8 = b'F';
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn slot(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
        }
    }
}

/// Raw events forwarded by the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(u8),
    KeyUp(u8),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    MouseMove { x: i32, y: i32 },
    Wheel(i32),
    Char(char),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseDelta {
    pub x: i32,
    pub y: i32,
}

/// Keyboard and mouse state, sampled once per frame.
///
/// Events accumulate into live state as the window receives them;
/// [`InputDevice::begin_frame`] snapshots that into the per-frame view the
/// update step reads. A press and release inside one frame still reports
/// `was_key_pressed` for that frame.
pub struct InputDevice {
    live_keys: [bool; 256],
    live_mouse: [bool; 3],
    live_pos: (i32, i32),
    live_wheel: i32,
    pending_presses: [bool; 256],
    pending_releases: [bool; 256],
    pending_mouse_presses: [bool; 3],

    keys: [bool; 256],
    pressed: [bool; 256],
    released: [bool; 256],
    mouse: [bool; 3],
    mouse_pressed: [bool; 3],
    mouse_pos: (i32, i32),
    frame_start_pos: (i32, i32),
    mouse_delta: MouseDelta,
    wheel_delta: i32,

    text: String,
}

impl Default for InputDevice {
    fn default() -> Self {
        Self {
            live_keys: [false; 256],
            live_mouse: [false; 3],
            live_pos: (0, 0),
            live_wheel: 0,
            pending_presses: [false; 256],
            pending_releases: [false; 256],
            pending_mouse_presses: [false; 3],
            keys: [false; 256],
            pressed: [false; 256],
            released: [false; 256],
            mouse: [false; 3],
            mouse_pressed: [false; 3],
            mouse_pos: (0, 0),
            frame_start_pos: (0, 0),
            mouse_delta: MouseDelta::default(),
            wheel_delta: 0,
            text: String::new(),
        }
    }
}

impl InputDevice {
    pub fn process(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                let key = key as usize;
                // Auto-repeat arrives as repeated KeyDown; only the edge counts.
                if !self.live_keys[key] {
                    self.pending_presses[key] = true;
                }
                self.live_keys[key] = true;
            }
            InputEvent::KeyUp(key) => {
                let key = key as usize;
                if self.live_keys[key] {
                    self.pending_releases[key] = true;
                }
                self.live_keys[key] = false;
            }
            InputEvent::MouseDown(button) => {
                if !self.live_mouse[button.slot()] {
                    self.pending_mouse_presses[button.slot()] = true;
                }
                self.live_mouse[button.slot()] = true;
            }
            InputEvent::MouseUp(button) => self.live_mouse[button.slot()] = false,
            InputEvent::MouseMove { x, y } => self.live_pos = (x, y),
            InputEvent::Wheel(delta) => self.live_wheel += delta,
            InputEvent::Char(ch) => match ch {
                '\u{8}' => {
                    self.text.pop();
                }
                ch if !ch.is_control() => self.text.push(ch),
                _ => {}
            },
        }
    }

    /// Advances the per-frame snapshot. Call exactly once per frame, before update.
    pub fn begin_frame(&mut self) {
        self.keys = self.live_keys;
        self.pressed = std::mem::replace(&mut self.pending_presses, [false; 256]);
        self.released = std::mem::replace(&mut self.pending_releases, [false; 256]);
        self.mouse = self.live_mouse;
        self.mouse_pressed = std::mem::replace(&mut self.pending_mouse_presses, [false; 3]);

        self.frame_start_pos = self.mouse_pos;
        self.mouse_pos = self.live_pos;
        self.mouse_delta = MouseDelta {
            x: self.mouse_pos.0 - self.frame_start_pos.0,
            y: self.mouse_pos.1 - self.frame_start_pos.1,
        };
        self.wheel_delta = std::mem::take(&mut self.live_wheel);
    }

    pub fn is_key_down(&self, key: u8) -> bool {
        self.keys[key as usize]
    }

    pub fn was_key_pressed(&self, key: u8) -> bool {
        self.pressed[key as usize]
    }

    pub fn was_key_released(&self, key: u8) -> bool {
        self.released[key as usize]
    }

    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.mouse[button.slot()]
    }

    pub fn was_mouse_pressed(&self, button: MouseButton) -> bool {
        self.mouse_pressed[button.slot()]
    }

    pub fn mouse_position(&self) -> (i32, i32) {
        self.mouse_pos
    }

    pub fn mouse_delta(&self) -> MouseDelta {
        self.mouse_delta
    }

    pub fn wheel_delta(&self) -> i32 {
        self.wheel_delta
    }

    /// Characters typed so far.
    pub fn text(&self) -> &str {
        &self.text
    }
}
