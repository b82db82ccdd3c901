use eyre::eyre;
use tracing::debug;
use tracing::error;
use tracing::info;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D12::*;

use super::barrier::transition_barrier;
use super::buffers::UploadBatch;
use super::device::GpuDevice;
use super::swapchain::full_viewport;
use super::swapchain::SwapchainTargets;
use super::timeline::D3d12Timeline;
use crate::config::AppConfig;
use crate::error::FrameResult;
use crate::error::OperationContext;
use crate::frame::FrameLoop;
use crate::frame::Viewport;
use crate::resource_state::ResourceState;
use crate::sync::FrameSynchronizer;

/// Drives the per-frame record/submit/present/fence cycle over the single
/// allocator/list pair.
pub struct Renderer {
    gpu: GpuDevice,
    targets: SwapchainTargets,
    frames: FrameLoop<D3d12Timeline>,
}

impl Renderer {
    pub fn new(config: &AppConfig, hwnd: HWND, viewport: Viewport) -> FrameResult<Self> {
        let gpu = GpuDevice::new(config.use_warp_device)?;
        let targets = SwapchainTargets::new(&gpu, hwnd, viewport, config.depth_buffer)?;
        let timeline = D3d12Timeline::new(&gpu.device, &gpu.queue)?;
        let sync = FrameSynchronizer::new(timeline, config.fence_timeout);
        let frames = FrameLoop::new(sync, targets.current_index(), viewport)?;
        info!(
            width = viewport.width,
            height = viewport.height,
            fence_timeout = ?config.fence_timeout,
            "renderer ready"
        );
        Ok(Self {
            gpu,
            targets,
            frames,
        })
    }

    pub fn device(&self) -> &ID3D12Device {
        &self.gpu.device
    }

    pub fn viewport(&self) -> Viewport {
        self.frames.viewport()
    }

    pub fn frames(&self) -> &FrameLoop<D3d12Timeline> {
        &self.frames
    }

    pub fn has_depth_buffer(&self) -> bool {
        self.targets.depth_stencil_view().is_some()
    }

    /// Submits the closed command list and enqueues a fence signal behind it.
    pub fn submit_and_signal(&mut self) -> FrameResult<u64> {
        self.gpu.execute()?;
        self.frames.sync_mut().signal()
    }

    /// Records one-off setup work (buffer uploads), submits it and waits for
    /// the GPU. Staging buffers are released only after the wait.
    pub fn execute_setup<R>(
        &mut self,
        record: impl FnOnce(&mut UploadBatch<'_>) -> FrameResult<R>,
    ) -> FrameResult<R> {
        self.reset_list(None)?;
        let mut batch = UploadBatch::new(&self.gpu.device, &self.gpu.list);
        let output = record(&mut batch)?;
        let staging = batch.finish();
        unsafe { self.gpu.list.Close() }.during("ID3D12GraphicsCommandList::Close")?;
        let fence = self.submit_and_signal()?;
        self.frames.sync_mut().wait_for(fence)?;
        debug!(fence, staging = staging.len(), "setup work complete");
        drop(staging);
        Ok(output)
    }

    /// Renders one frame: clear, `record` the draws, present, then drain.
    /// `pipeline` is `None` for a clear-only pass.
    pub fn draw_frame(
        &mut self,
        pipeline: Option<&ID3D12PipelineState>,
        clear_color: [f32; 4],
        record: impl FnOnce(&ID3D12GraphicsCommandList) -> FrameResult<()>,
    ) -> FrameResult<u64> {
        let index = self.frames.begin_frame()?;
        let surface_index = self.targets.current_index();
        if index != surface_index {
            return Err(eyre!(
                "frame loop expected back buffer {index} but the swapchain reports {surface_index}"
            )
            .into());
        }
        self.reset_list(pipeline)?;

        let list = &self.gpu.list;
        let back_buffer = self.targets.back_buffer(index)?;
        let (viewport, scissor) = full_viewport(self.frames.viewport());
        let rtv = self.targets.back_buffer_view(index);
        let dsv = self.targets.depth_stencil_view();

        let to_render_target = self.frames.transition_back_buffer(ResourceState::RenderTarget)?;
        unsafe {
            list.RSSetViewports(&[viewport]);
            list.RSSetScissorRects(&[scissor]);
            list.ResourceBarrier(&[transition_barrier(back_buffer, to_render_target)]);
            list.OMSetRenderTargets(1, Some(&rtv), false, dsv.as_ref().map(|dsv| dsv as *const _));
            list.ClearRenderTargetView(rtv, &clear_color, None);
            if let Some(dsv) = dsv {
                list.ClearDepthStencilView(
                    dsv,
                    D3D12_CLEAR_FLAG_DEPTH | D3D12_CLEAR_FLAG_STENCIL,
                    1.0,
                    0,
                    &[],
                );
            }
        }

        record(list)?;

        let to_present = self.frames.transition_back_buffer(ResourceState::Present)?;
        unsafe {
            list.ResourceBarrier(&[transition_barrier(back_buffer, to_present)]);
            list.Close()
        }
        .during("ID3D12GraphicsCommandList::Close")?;

        self.frames.submit()?;
        self.gpu.execute()?;
        self.frames.present()?;
        self.targets.present()?;
        self.frames.finish(self.targets.current_index())
    }

    /// Drains the GPU, then resizes the swapchain and depth buffer.
    pub fn resize(&mut self, width: u32, height: u32) -> FrameResult<()> {
        if self.frames.viewport() == Viewport::new(width, height) {
            return Ok(());
        }
        let drained = self.frames.drain_for_resize(width, height)?;
        self.targets.resize(&self.gpu.device, &drained)?;
        self.frames.complete_resize(drained, self.targets.current_index())
    }

    /// Drains the GPU even when a frame was abandoned partway, so the demo's
    /// buffers and pipeline can be released afterwards.
    pub fn drain_for_shutdown(&mut self) -> FrameResult<u64> {
        self.frames.drain_for_shutdown()
    }

    /// Logs whatever the debug layer recorded before a fatal error.
    pub fn report_failure(&self) {
        if let Some(reason) = self.gpu.removed_reason() {
            error!(%reason, "device removed");
        }
        self.gpu.log_debug_messages();
    }

    fn reset_list(&self, pipeline: Option<&ID3D12PipelineState>) -> FrameResult<()> {
        let sync = self.frames.sync();
        if !sync.is_drained() {
            return Err(eyre!(
                "command allocator reset while fence {} is outstanding (completed {})",
                sync.current_fence(),
                sync.completed_fence()
            )
            .into());
        }
        unsafe { self.gpu.allocator.Reset() }.during("ID3D12CommandAllocator::Reset")?;
        unsafe { self.gpu.list.Reset(&self.gpu.allocator, pipeline) }
            .during("ID3D12GraphicsCommandList::Reset")
    }
}
