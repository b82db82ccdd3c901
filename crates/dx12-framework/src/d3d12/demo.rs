use std::path::Path;
use std::path::PathBuf;

use eyre::eyre;
use tracing::info;
use windows::Win32::Graphics::Direct3D::D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST;

use super::buffers::GpuBuffer;
use super::pipeline::MeshPipeline;
use super::pipeline::PipelineOptions;
use super::renderer::Renderer;
use crate::clear_color::ClearColorState;
use crate::clear_color::SCENE_COLOR;
use crate::config::AppConfig;
use crate::config::DemoKind;
use crate::constants::OBJECT_CONSTANTS_BUFFER_SIZE;
use crate::error::FrameResult;
use crate::frame::Viewport;
use crate::geometry;
use crate::geometry::MeshData;
use crate::geometry::Vertex;
use crate::input::InputDevice;
use crate::obj::load_obj;
use crate::obj::ObjOptions;
use crate::scene::FillMode;
use crate::scene::MeshScene;
use crate::timer::GameTimer;
use crate::upload::BufferUsage;
use crate::upload::MemoryPool;

/// The capabilities the run loop needs from a demo.
pub trait Demo {
    /// Window caption, before frame statistics are appended.
    fn caption(&self) -> String;

    fn update(&mut self, renderer: &mut Renderer, input: &InputDevice, timer: &GameTimer) -> FrameResult<()>;

    fn draw(&mut self, renderer: &mut Renderer) -> FrameResult<()>;

    fn on_resize(&mut self, _viewport: Viewport) {}
}

pub fn build_demo(config: &AppConfig, renderer: &mut Renderer) -> FrameResult<Box<dyn Demo>> {
    let demo: Box<dyn Demo> = match config.demo {
        DemoKind::Clear => Box::new(ClearDemo::default()),
        DemoKind::Cube => Box::new(MeshDemo::build(renderer, "Cube".to_owned(), geometry::cube())?),
        DemoKind::Pyramid => Box::new(MeshDemo::build(
            renderer,
            "Pyramid".to_owned(),
            geometry::pyramid(),
        )?),
        DemoKind::Mesh => {
            let mesh = load_obj(mesh_path(&config.mesh_path), ObjOptions::default())?;
            let name = config
                .mesh_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| config.mesh_path.display().to_string());
            Box::new(MeshDemo::build(renderer, format!("Mesh: {name}"), mesh)?)
        }
    };
    info!(demo = ?config.demo, "demo built");
    Ok(demo)
}

/// Relative paths that do not exist from the working directory are retried
/// against the crate root, where the bundled assets live.
fn mesh_path(path: &Path) -> PathBuf {
    if path.is_relative() && !path.exists() {
        let bundled = Path::new(env!("CARGO_MANIFEST_DIR")).join(path);
        if bundled.exists() {
            return bundled;
        }
    }
    path.to_path_buf()
}

/// Clear-only pass; number keys pick the colour, typed text goes to the title.
#[derive(Default)]
pub struct ClearDemo {
    color: ClearColorState,
    text: String,
}

impl Demo for ClearDemo {
    fn caption(&self) -> String {
        if self.text.is_empty() {
            "Clear".to_owned()
        } else {
            format!("Clear | Text: {}", self.text)
        }
    }

    fn update(&mut self, _renderer: &mut Renderer, input: &InputDevice, _timer: &GameTimer) -> FrameResult<()> {
        if self.color.update(input) {
            info!(color = ?self.color.color(), "clear colour changed");
        }
        if self.text != input.text() {
            self.text = input.text().to_owned();
        }
        Ok(())
    }

    fn draw(&mut self, renderer: &mut Renderer) -> FrameResult<()> {
        renderer.draw_frame(None, self.color.color(), |_| Ok(()))?;
        Ok(())
    }
}

/// One lit, indexed mesh with a fly camera.
pub struct MeshDemo {
    caption: String,
    scene: MeshScene,
    pipeline: MeshPipeline,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    constant_buffer: GpuBuffer,
    index_count: u32,
}

impl MeshDemo {
    pub fn build(renderer: &mut Renderer, caption: String, mesh: MeshData) -> FrameResult<Self> {
        let options = PipelineOptions {
            fill_mode: FillMode::Solid,
            depth: renderer.has_depth_buffer(),
        };
        let pipeline = MeshPipeline::new(renderer.device(), options)?;

        let (vertex_buffer, index_buffer) = renderer.execute_setup(|batch| {
            let vertices = batch.upload(BufferUsage::Vertex, mesh.vertex_bytes(), "vertex buffer")?;
            let indices = batch.upload(BufferUsage::Index, mesh.index_bytes(), "index buffer")?;
            Ok((vertices, indices))
        })?;

        let constant_buffer = GpuBuffer::new(
            renderer.device(),
            MemoryPool::Upload,
            BufferUsage::Constant,
            OBJECT_CONSTANTS_BUFFER_SIZE,
            "object constants",
        )?;
        let scene = MeshScene::new(renderer.viewport().aspect_ratio());
        constant_buffer.write(scene.constants().as_bytes())?;

        info!(
            %caption,
            vertices = mesh.vertices.len(),
            indices = mesh.indices.len(),
            constant_bytes = constant_buffer.size(),
            "mesh uploaded"
        );
        Ok(Self {
            caption,
            scene,
            pipeline,
            vertex_buffer,
            index_buffer,
            constant_buffer,
            index_count: mesh.index_count(),
        })
    }
}

impl Demo for MeshDemo {
    fn caption(&self) -> String {
        match self.scene.fill_mode() {
            FillMode::Solid => self.caption.clone(),
            FillMode::Wireframe => format!("{} (wireframe)", self.caption),
        }
    }

    fn update(&mut self, renderer: &mut Renderer, input: &InputDevice, timer: &GameTimer) -> FrameResult<()> {
        let frame = self.scene.update(input, timer.delta_time());
        if let Some(fill_mode) = frame.fill_mode_changed {
            // Every frame ends drained, so the old state can go without a flush.
            renderer.frames().require_idle_gpu("rebuild the pipeline state")?;
            let options = PipelineOptions {
                fill_mode,
                ..self.pipeline.options
            };
            self.pipeline.rebuild(renderer.device(), options)?;
        }
        // The previous frame was drained, so the GPU no longer reads this buffer.
        self.constant_buffer.write(frame.constants.as_bytes())
    }

    fn draw(&mut self, renderer: &mut Renderer) -> FrameResult<()> {
        if !self.vertex_buffer.is_readable() || !self.index_buffer.is_readable() {
            return Err(eyre!("mesh buffers were not transitioned out of the copy state").into());
        }
        let vertex_view = self.vertex_buffer.vertex_view(size_of::<Vertex>() as u32);
        let index_view = self.index_buffer.index_view();
        let constants = self.constant_buffer.gpu_address();
        let root_signature = &self.pipeline.root_signature;
        let index_count = self.index_count;

        renderer.draw_frame(Some(&self.pipeline.state), SCENE_COLOR, |list| {
            unsafe {
                list.SetGraphicsRootSignature(root_signature);
                list.SetGraphicsRootConstantBufferView(0, constants);
                list.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
                list.IASetVertexBuffers(0, Some(&[vertex_view]));
                list.IASetIndexBuffer(Some(&index_view));
                list.DrawIndexedInstanced(index_count, 1, 0, 0, 0);
            }
            Ok(())
        })?;
        Ok(())
    }

    fn on_resize(&mut self, viewport: Viewport) {
        self.scene.set_aspect_ratio(viewport.aspect_ratio());
    }
}
