use std::f32::consts::FRAC_PI_2;
use std::f32::consts::PI;

use bevy_math::Mat4;
use bevy_math::Vec3;

use crate::input::keys;
use crate::input::InputDevice;
use crate::input::MouseButton;

pub const CAMERA_PITCH_LIMIT: f32 = FRAC_PI_2 - 0.1;
pub const OBJECT_PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// First-person camera: right mouse looks, WASD moves.
#[derive(Debug, Clone, PartialEq)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, -5.0),
            yaw: 0.0,
            pitch: 0.0,
            move_speed: 5.0,
            mouse_sensitivity: 0.0025,
        }
    }
}

impl FlyCamera {
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw)
    }

    pub fn right(&self) -> Vec3 {
        Vec3::Y.cross(self.forward()).normalize()
    }

    pub fn update(&mut self, input: &InputDevice, dt: f32) {
        if input.is_mouse_down(MouseButton::Right) {
            let delta = input.mouse_delta();
            self.yaw += delta.x as f32 * self.mouse_sensitivity;
            self.pitch = (self.pitch + delta.y as f32 * self.mouse_sensitivity)
                .clamp(-CAMERA_PITCH_LIMIT, CAMERA_PITCH_LIMIT);
        }

        let forward = self.forward();
        let right = self.right();
        let step = self.move_speed * dt;
        if input.is_key_down(keys::W) {
            self.position += forward * step;
        }
        if input.is_key_down(keys::S) {
            self.position -= forward * step;
        }
        if input.is_key_down(keys::A) {
            self.position -= right * step;
        }
        if input.is_key_down(keys::D) {
            self.position += right * step;
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_lh(self.position, self.position + self.forward(), Vec3::Y)
    }
}

/// Left-drag rotation of the displayed object.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObjectRotation {
    pub yaw: f32,
    pub pitch: f32,
}

impl ObjectRotation {
    const SPEED: f32 = 0.01;

    pub fn update(&mut self, input: &InputDevice) {
        if input.is_mouse_down(MouseButton::Left) {
            let delta = input.mouse_delta();
            self.yaw += delta.x as f32 * Self::SPEED;
            self.pitch = (self.pitch + delta.y as f32 * Self::SPEED)
                .clamp(-OBJECT_PITCH_LIMIT, OBJECT_PITCH_LIMIT);
        }
    }

    /// Pitch about X first, then yaw about Y.
    pub fn world(&self) -> Mat4 {
        Mat4::from_rotation_y(self.yaw) * Mat4::from_rotation_x(self.pitch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            fov_y: 0.25 * PI,
            aspect_ratio,
            near: 0.1,
            far: 100.0,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y, self.aspect_ratio, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputEvent;

    fn drag(input: &mut InputDevice, button: MouseButton, dx: i32, dy: i32) {
        input.process(InputEvent::MouseDown(button));
        input.process(InputEvent::MouseMove { x: 0, y: 0 });
        input.begin_frame();
        input.process(InputEvent::MouseMove { x: dx, y: dy });
        input.begin_frame();
    }

    #[test]
    fn camera_pitch_stays_clamped_for_huge_deltas() {
        let mut camera = FlyCamera::default();
        let mut input = InputDevice::default();
        for dy in [i32::MAX / 2, -(i32::MAX / 2), 1_000_000, 1_000_000] {
            drag(&mut input, MouseButton::Right, 0, dy);
            camera.update(&input, 0.016);
            assert!(camera.pitch.abs() <= CAMERA_PITCH_LIMIT);
            assert!(camera.pitch.abs() < FRAC_PI_2);
        }
        assert_eq!(camera.pitch, CAMERA_PITCH_LIMIT);
    }

    #[test]
    fn camera_ignores_mouse_without_right_button() {
        let mut camera = FlyCamera::default();
        let mut input = InputDevice::default();
        drag(&mut input, MouseButton::Left, 400, 400);
        camera.update(&input, 0.016);
        assert_eq!(camera.yaw, 0.0);
        assert_eq!(camera.pitch, 0.0);
    }

    #[test]
    fn w_moves_along_forward() {
        let mut camera = FlyCamera::default();
        let mut input = InputDevice::default();
        input.process(InputEvent::KeyDown(keys::W));
        input.begin_frame();
        camera.update(&input, 0.5);
        assert!((camera.position - Vec3::new(0.0, 2.0, -2.5)).length() < 1e-5);
    }

    #[test]
    fn d_strafes_right() {
        let mut camera = FlyCamera::default();
        let mut input = InputDevice::default();
        input.process(InputEvent::KeyDown(keys::D));
        input.begin_frame();
        camera.update(&input, 1.0);
        assert!((camera.position - Vec3::new(5.0, 2.0, -5.0)).length() < 1e-5);
    }

    #[test]
    fn object_pitch_stays_clamped() {
        let mut rotation = ObjectRotation::default();
        let mut input = InputDevice::default();
        drag(&mut input, MouseButton::Left, 10, 100_000);
        rotation.update(&input);
        assert_eq!(rotation.pitch, OBJECT_PITCH_LIMIT);
        assert!((rotation.yaw - 0.1).abs() < 1e-6);
    }

    #[test]
    fn view_puts_target_in_front() {
        let camera = FlyCamera::default();
        let ahead = camera.position + camera.forward() * 3.0;
        let in_view = camera.view().transform_point3(ahead);
        assert!(in_view.x.abs() < 1e-5);
        assert!(in_view.y.abs() < 1e-5);
        assert!((in_view.z - 3.0).abs() < 1e-5);
    }
}
