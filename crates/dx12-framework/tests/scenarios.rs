use std::f32::consts::FRAC_PI_2;
use std::path::PathBuf;
use std::time::Duration;

use dx12_framework::camera::FlyCamera;
use dx12_framework::camera::ObjectRotation;
use dx12_framework::clear_color::ClearColorState;
use dx12_framework::clear_color::RESET_COLOR;
use dx12_framework::config::AppConfig;
use dx12_framework::config::DemoKind;
use dx12_framework::error::FrameResult;
use dx12_framework::frame::FrameLoop;
use dx12_framework::frame::Viewport;
use dx12_framework::frame::SWAP_CHAIN_BUFFER_COUNT;
use dx12_framework::input::InputDevice;
use dx12_framework::input::InputEvent;
use dx12_framework::input::MouseButton;
use dx12_framework::obj::load_obj;
use dx12_framework::obj::ObjOptions;
use dx12_framework::resource_state::ResourceState;
use dx12_framework::sync::FrameSynchronizer;
use dx12_framework::sync::GpuTimeline;
use dx12_framework::sync::WaitOutcome;

/// A GPU that retires every signal the moment the CPU waits on it.
#[derive(Default)]
struct InstantGpu {
    signalled: u64,
    completed: u64,
}

impl GpuTimeline for InstantGpu {
    fn enqueue_signal(&mut self, value: u64) -> FrameResult<()> {
        self.signalled = value;
        Ok(())
    }

    fn completed_value(&self) -> u64 {
        self.completed
    }

    fn block_until(&mut self, value: u64, _timeout: Option<Duration>) -> FrameResult<WaitOutcome> {
        if value > self.signalled {
            return Ok(WaitOutcome::TimedOut);
        }
        self.completed = self.signalled;
        Ok(WaitOutcome::Reached)
    }
}

fn frame_loop(viewport: Viewport) -> FrameLoop<InstantGpu> {
    let sync = FrameSynchronizer::new(InstantGpu::default(), Some(Duration::from_secs(1)));
    FrameLoop::new(sync, 0, viewport).unwrap()
}

/// Drives one frame the way the renderer does and returns the back buffer used.
fn render_one(frames: &mut FrameLoop<InstantGpu>) -> usize {
    let index = frames.begin_frame().unwrap();
    frames.transition_back_buffer(ResourceState::RenderTarget).unwrap();
    frames.transition_back_buffer(ResourceState::Present).unwrap();
    frames.submit().unwrap();
    frames.present().unwrap();
    frames.finish((index + 1) % SWAP_CHAIN_BUFFER_COUNT).unwrap();
    index
}

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("dx12_framework_{}_{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn resize_mid_run_drains_and_updates_viewport() {
    let mut frames = frame_loop(Viewport::new(1280, 720));
    for _ in 0..3 {
        render_one(&mut frames);
    }
    let before = frames.sync().current_fence();

    let drained = frames.drain_for_resize(800, 600).unwrap();
    assert!(frames.sync().is_drained());
    assert_eq!(drained.fence(), before + 1);
    frames.complete_resize(drained, 0).unwrap();

    assert_eq!(frames.viewport(), Viewport::new(800, 600));
    assert_eq!(render_one(&mut frames), 0);
    assert_eq!(frames.sync().current_fence(), before + 2);
}

#[test]
fn fence_and_back_buffer_advance_once_per_frame() {
    let mut frames = frame_loop(Viewport::new(1280, 720));
    let mut last_index = None;
    for frame in 1..=8u64 {
        let index = render_one(&mut frames);
        assert_eq!(frames.sync().current_fence(), frame);
        if let Some(last) = last_index {
            assert_eq!(index, (last + 1) % SWAP_CHAIN_BUFFER_COUNT);
        }
        last_index = Some(index);
    }
}

#[test]
fn pressing_one_then_zero_sets_red_then_reset() {
    let mut input = InputDevice::default();
    let mut clear = ClearColorState::default();

    input.process(InputEvent::KeyDown(b'1'));
    input.begin_frame();
    assert!(clear.update(&input));
    assert_eq!(clear.color(), [1.0, 0.0, 0.0, 1.0]);

    input.process(InputEvent::KeyUp(b'1'));
    input.process(InputEvent::KeyDown(b'0'));
    input.begin_frame();
    clear.update(&input);
    assert_eq!(clear.color(), RESET_COLOR);
}

#[test]
fn shared_edge_quad_loads_four_vertices_six_indices() {
    let path = temp_file(
        "quad.obj",
        "# two triangles sharing the 1-3 edge\n\
         v 0 0 0\n\
         v 1 0 0\n\
         v 1 1 0\n\
         v 0 1 0\n\
         vn 0 0 1\n\
         f 1//1 2//1 3//1\n\
         f 1//1 3//1 4//1\n",
    );
    let mesh = load_obj(&path, ObjOptions::default()).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(mesh.vertices.len(), 4);
    assert_eq!(mesh.indices.len(), 6);
}

#[test]
fn missing_mesh_is_an_error() {
    let path = std::env::temp_dir().join("dx12_framework_no_such_mesh.obj");
    let error = load_obj(&path, ObjOptions::default()).unwrap_err();
    assert!(format!("{error:#}").contains("no_such_mesh"), "{error:#}");
}

#[test]
fn bundled_octahedron_loads() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/octahedron.obj");
    let mesh = load_obj(path, ObjOptions::default()).unwrap();
    // One vertex per (position, face normal) pair.
    assert_eq!(mesh.vertices.len(), 24);
    assert_eq!(mesh.indices.len(), 24);
}

#[test]
fn extreme_mouse_motion_never_flips_the_camera() {
    let mut input = InputDevice::default();
    let mut camera = FlyCamera::default();
    let mut rotation = ObjectRotation::default();
    input.process(InputEvent::MouseDown(MouseButton::Right));
    input.process(InputEvent::MouseDown(MouseButton::Left));

    for y in [1_000_000, -1_000_000, 1_000_000] {
        input.process(InputEvent::MouseMove { x: 0, y });
        input.begin_frame();
        camera.update(&input, 1.0 / 60.0);
        rotation.update(&input);
        assert!(camera.pitch.abs() < FRAC_PI_2, "camera pitch {}", camera.pitch);
        assert!(rotation.pitch.abs() < FRAC_PI_2, "object pitch {}", rotation.pitch);
    }
}

#[test]
fn command_line_selects_demo_and_size() {
    let config = AppConfig::from_args(["--demo", "pyramid", "--size", "800x600", "--no-depth"]).unwrap();
    assert_eq!(config.demo, DemoKind::Pyramid);
    assert_eq!((config.width, config.height), (800, 600));
    assert!(!config.depth_buffer);
    assert!(AppConfig::from_args(["--size", "800"]).is_err());
}
