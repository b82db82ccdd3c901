use crate::input::InputDevice;

pub type Rgba = [f32; 4];

pub const RESET_COLOR: Rgba = [0.0, 0.2, 0.4, 1.0];
pub const SCENE_COLOR: Rgba = [0.1, 0.1, 0.3, 1.0];

/// Number keys pick the background: 1 red, 2 green, 3 blue, 0 back to the
/// reset colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColorState {
    color: Rgba,
}

impl Default for ClearColorState {
    fn default() -> Self {
        Self { color: RESET_COLOR }
    }
}

impl ClearColorState {
    const BINDINGS: [(u8, Rgba); 4] = [
        (b'1', [1.0, 0.0, 0.0, 1.0]),
        (b'2', [0.0, 1.0, 0.0, 1.0]),
        (b'3', [0.0, 0.0, 1.0, 1.0]),
        (b'0', RESET_COLOR),
    ];

    pub fn color(&self) -> Rgba {
        self.color
    }

    /// Applies this frame's key presses. Returns true if the colour changed.
    pub fn update(&mut self, input: &InputDevice) -> bool {
        let before = self.color;
        for (key, color) in Self::BINDINGS {
            if input.was_key_pressed(key) {
                self.color = color;
            }
        }
        self.color != before
    }
}
