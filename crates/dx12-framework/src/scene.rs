use crate::camera::FlyCamera;
use crate::camera::ObjectRotation;
use crate::camera::Projection;
use crate::constants::Lighting;
use crate::constants::ObjectConstants;
use crate::input::keys;
use crate::input::InputDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Solid,
    Wireframe,
}

impl FillMode {
    pub fn toggled(self) -> Self {
        match self {
            FillMode::Solid => FillMode::Wireframe,
            FillMode::Wireframe => FillMode::Solid,
        }
    }
}

/// CPU state behind the lit mesh demos: one object, a fly camera and a
/// directional light.
#[derive(Debug, Clone)]
pub struct MeshScene {
    pub camera: FlyCamera,
    pub rotation: ObjectRotation,
    pub projection: Projection,
    pub lighting: Lighting,
    fill_mode: FillMode,
}

/// What a scene update produced for the renderer.
#[derive(Debug, Clone, Copy)]
pub struct SceneFrame {
    pub constants: ObjectConstants,
    /// The pipeline must be rebuilt with this fill mode before drawing.
    pub fill_mode_changed: Option<FillMode>,
}

impl MeshScene {
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            camera: FlyCamera::default(),
            rotation: ObjectRotation::default(),
            projection: Projection::new(aspect_ratio),
            lighting: Lighting::default(),
            fill_mode: FillMode::Solid,
        }
    }

    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.projection.aspect_ratio = aspect_ratio;
    }

    pub fn update(&mut self, input: &InputDevice, dt: f32) -> SceneFrame {
        self.rotation.update(input);
        self.camera.update(input, dt);

        let fill_mode_changed = if input.was_key_pressed(keys::F) {
            self.fill_mode = self.fill_mode.toggled();
            Some(self.fill_mode)
        } else {
            None
        };

        SceneFrame {
            constants: self.constants(),
            fill_mode_changed,
        }
    }

    pub fn constants(&self) -> ObjectConstants {
        ObjectConstants::new(
            self.rotation.world(),
            self.camera.view(),
            self.projection.matrix(),
            self.camera.position,
            &self.lighting,
        )
    }
}
