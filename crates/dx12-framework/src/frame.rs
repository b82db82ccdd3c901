use eyre::eyre;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::FrameResult;
use crate::resource_state::ResourceState;
use crate::resource_state::StateTracker;
use crate::resource_state::Transition;
use crate::sync::FrameSynchronizer;
use crate::sync::GpuTimeline;

pub const SWAP_CHAIN_BUFFER_COUNT: usize = 2;

const BACK_BUFFER_NAMES: [&str; SWAP_CHAIN_BUFFER_COUNT] = ["back buffer 0", "back buffer 1"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Recording,
    Submitted,
    Presented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Evidence that the GPU was idle when a resize began. Only
/// [`FrameLoop::drain_for_resize`] hands these out, so swapchain buffers cannot be
/// released while still referenced by queued work.
#[derive(Debug)]
pub struct Drained {
    fence: u64,
    viewport: Viewport,
}

impl Drained {
    pub fn fence(&self) -> u64 {
        self.fence
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

/// CPU-side bookkeeping for the per-frame cycle
/// `Idle -> Recording -> Submitted -> Presented -> Idle`.
///
/// Owns the fence synchronizer, the back-buffer ring index and the resource
/// state of every back buffer. The D3D12 renderer asks it before issuing each
/// API call, so ordering mistakes surface as errors instead of GPU corruption.
pub struct FrameLoop<T: GpuTimeline> {
    sync: FrameSynchronizer<T>,
    phase: FramePhase,
    back_buffers: [StateTracker; SWAP_CHAIN_BUFFER_COUNT],
    current: usize,
    viewport: Viewport,
    frames_completed: u64,
}

impl<T: GpuTimeline> FrameLoop<T> {
    pub fn new(
        sync: FrameSynchronizer<T>,
        current_back_buffer: usize,
        viewport: Viewport,
    ) -> FrameResult<Self> {
        check_index(current_back_buffer)?;
        Ok(Self {
            sync,
            phase: FramePhase::Idle,
            back_buffers: BACK_BUFFER_NAMES.map(|name| StateTracker::new(name, ResourceState::Present)),
            current: current_back_buffer,
            viewport,
            frames_completed: 0,
        })
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn current_back_buffer(&self) -> usize {
        self.current
    }

    pub fn back_buffer_state(&self, index: usize) -> ResourceState {
        self.back_buffers[index].state()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    pub fn sync(&self) -> &FrameSynchronizer<T> {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut FrameSynchronizer<T> {
        &mut self.sync
    }

    /// `Idle -> Recording`. Returns the back buffer to render into.
    pub fn begin_frame(&mut self) -> FrameResult<usize> {
        self.expect_phase(FramePhase::Idle, "begin a frame")?;
        if !self.sync.is_drained() {
            // The allocator may only be reset once every list recorded from it retired.
            return Err(eyre!(
                "command allocator still in flight: fence {} signalled, {} completed",
                self.sync.current_fence(),
                self.sync.completed_fence()
            )
            .into());
        }
        self.phase = FramePhase::Recording;
        Ok(self.current)
    }

    /// Moves the current back buffer to `after`, returning the barrier to record.
    pub fn transition_back_buffer(&mut self, after: ResourceState) -> FrameResult<Transition> {
        self.expect_phase(FramePhase::Recording, "record a back-buffer barrier")?;
        self.back_buffers[self.current].transition_to(after)
    }

    /// `Recording -> Submitted`. The back buffer must be presentable again.
    pub fn submit(&mut self) -> FrameResult<()> {
        self.expect_phase(FramePhase::Recording, "submit")?;
        let tracker = &self.back_buffers[self.current];
        if tracker.state() != ResourceState::Present {
            return Err(eyre!(
                "{} submitted in {:?}; it must be transitioned back to Present",
                tracker.name(),
                tracker.state()
            )
            .into());
        }
        self.phase = FramePhase::Submitted;
        Ok(())
    }

    /// `Submitted -> Presented`.
    pub fn present(&mut self) -> FrameResult<()> {
        self.expect_phase(FramePhase::Submitted, "present")?;
        self.phase = FramePhase::Presented;
        Ok(())
    }

    /// `Presented -> Idle`: signals the fence, drains the GPU and adopts the back
    /// buffer index the presentation surface reports next.
    pub fn finish(&mut self, next_back_buffer: usize) -> FrameResult<u64> {
        self.expect_phase(FramePhase::Presented, "finish a frame")?;
        check_index(next_back_buffer)?;
        let fence = self.sync.flush_all()?;
        let expected = (self.current + 1) % SWAP_CHAIN_BUFFER_COUNT;
        if next_back_buffer != expected {
            warn!(
                previous = self.current,
                next = next_back_buffer,
                "presentation surface skipped a back buffer"
            );
        }
        self.current = next_back_buffer;
        self.phase = FramePhase::Idle;
        self.frames_completed += 1;
        debug!(fence, back_buffer = self.current, "frame complete");
        Ok(fence)
    }

    /// Drains outstanding GPU work between frames (setup uploads, pipeline rebuilds).
    pub fn flush(&mut self) -> FrameResult<u64> {
        self.expect_phase(FramePhase::Idle, "flush")?;
        self.sync.flush_all()
    }

    /// Drains the GPU whatever phase the frame was abandoned in. Used on the
    /// way out, after an error, so nothing the queue references is released
    /// early. Leaves the phase untouched; no further frame may begin.
    pub fn drain_for_shutdown(&mut self) -> FrameResult<u64> {
        if self.phase != FramePhase::Idle {
            warn!(phase = ?self.phase, "draining GPU with a frame in progress");
        }
        self.sync.flush_all()
    }

    /// Fails unless the frame is between passes and the GPU has retired
    /// everything, so objects the last frame used may be replaced.
    pub fn require_idle_gpu(&self, action: &str) -> FrameResult<()> {
        self.expect_phase(FramePhase::Idle, action)?;
        if !self.sync.is_drained() {
            return Err(eyre!(
                "cannot {action} while fence {} is outstanding (completed {})",
                self.sync.current_fence(),
                self.sync.completed_fence()
            )
            .into());
        }
        Ok(())
    }

    /// First half of a resize: only valid between frames, and fully drains the GPU.
    pub fn drain_for_resize(&mut self, width: u32, height: u32) -> FrameResult<Drained> {
        self.expect_phase(FramePhase::Idle, "resize")?;
        if width == 0 || height == 0 {
            return Err(eyre!("cannot resize swapchain to {width}x{height}").into());
        }
        let fence = self.sync.flush_all()?;
        Ok(Drained {
            fence,
            viewport: Viewport::new(width, height),
        })
    }

    /// Second half of a resize, after the swapchain buffers were re-acquired.
    pub fn complete_resize(&mut self, drained: Drained, current_back_buffer: usize) -> FrameResult<()> {
        check_index(current_back_buffer)?;
        for tracker in &mut self.back_buffers {
            tracker.reset(ResourceState::Present);
        }
        self.current = current_back_buffer;
        self.viewport = drained.viewport;
        info!(
            width = self.viewport.width,
            height = self.viewport.height,
            fence = drained.fence,
            "swapchain resized"
        );
        Ok(())
    }

    fn expect_phase(&self, expected: FramePhase, action: &str) -> FrameResult<()> {
        if self.phase != expected {
            return Err(eyre!(
                "cannot {action} while frame is {:?} (expected {:?})",
                self.phase,
                expected
            )
            .into());
        }
        Ok(())
    }
}

fn check_index(index: usize) -> FrameResult<()> {
    if index >= SWAP_CHAIN_BUFFER_COUNT {
        return Err(eyre!(
            "back buffer index {index} out of range for {SWAP_CHAIN_BUFFER_COUNT} buffers"
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sync::sim::SimulatedTimeline;

    /// Flip-model surface: every present advances the ring by one.
    struct Surface {
        index: usize,
    }

    impl Surface {
        fn present(&mut self) -> usize {
            self.index = (self.index + 1) % SWAP_CHAIN_BUFFER_COUNT;
            self.index
        }
    }

    fn frame_loop() -> FrameLoop<SimulatedTimeline> {
        let sync = FrameSynchronizer::new(SimulatedTimeline::default(), Some(Duration::from_millis(5)));
        FrameLoop::new(sync, 0, Viewport::new(1280, 720)).unwrap()
    }

    /// Runs one full frame and returns (back buffer used, fence signalled).
    fn run_frame(frames: &mut FrameLoop<SimulatedTimeline>, surface: &mut Surface) -> (usize, u64) {
        let index = frames.begin_frame().unwrap();
        assert_eq!(index, surface.index);
        frames.transition_back_buffer(ResourceState::RenderTarget).unwrap();
        assert_eq!(frames.back_buffer_state(index), ResourceState::RenderTarget);
        frames.transition_back_buffer(ResourceState::Present).unwrap();
        frames.submit().unwrap();
        frames.present().unwrap();
        let fence = frames.finish(surface.present()).unwrap();
        (index, fence)
    }

    #[test]
    fn each_frame_advances_fence_by_exactly_one() {
        let mut frames = frame_loop();
        let mut surface = Surface { index: 0 };
        let mut previous = frames.sync().current_fence();
        for _ in 0..10 {
            let (_, fence) = run_frame(&mut frames, &mut surface);
            assert_eq!(fence, previous + 1);
            assert_eq!(frames.sync().current_fence(), previous + 1);
            assert!(frames.sync().is_drained());
            previous = fence;
        }
        assert_eq!(frames.frames_completed(), 10);
    }

    #[test]
    fn back_buffer_alternates_with_the_surface() {
        let mut frames = frame_loop();
        let mut surface = Surface { index: 0 };
        let mut last = None;
        for _ in 0..6 {
            let (index, _) = run_frame(&mut frames, &mut surface);
            if let Some(last) = last {
                assert_eq!(index, (last + 1) % SWAP_CHAIN_BUFFER_COUNT);
            }
            last = Some(index);
        }
    }

    #[test]
    fn back_buffers_rest_in_present_between_frames() {
        let mut frames = frame_loop();
        let mut surface = Surface { index: 0 };
        for _ in 0..4 {
            run_frame(&mut frames, &mut surface);
            for index in 0..SWAP_CHAIN_BUFFER_COUNT {
                assert_eq!(frames.back_buffer_state(index), ResourceState::Present);
            }
        }
    }

    #[test]
    fn submitting_a_render_target_is_rejected() {
        let mut frames = frame_loop();
        frames.begin_frame().unwrap();
        frames.transition_back_buffer(ResourceState::RenderTarget).unwrap();
        let error = frames.submit().unwrap_err();
        assert!(format!("{error}").contains("Present"), "{error}");
        assert_eq!(frames.phase(), FramePhase::Recording);
    }

    #[test]
    fn phases_cannot_be_skipped() {
        let mut frames = frame_loop();
        assert!(frames.present().is_err());
        assert!(frames.finish(1).is_err());
        assert!(frames.transition_back_buffer(ResourceState::RenderTarget).is_err());
        frames.begin_frame().unwrap();
        assert!(frames.begin_frame().is_err());
        assert!(frames.drain_for_resize(800, 600).is_err());
    }

    #[test]
    fn recording_waits_for_outstanding_gpu_work() {
        let mut frames = frame_loop();
        frames.sync_mut().signal().unwrap();
        assert!(frames.begin_frame().is_err());
        frames.flush().unwrap();
        assert!(frames.begin_frame().is_ok());
    }

    #[test]
    fn resize_drains_before_changing_viewport() {
        let mut frames = frame_loop();
        let mut surface = Surface { index: 0 };
        run_frame(&mut frames, &mut surface);
        // Pretend extra work is in flight when the resize arrives.
        frames.sync_mut().signal().unwrap();
        assert!(!frames.sync().is_drained());

        let drained = frames.drain_for_resize(800, 600).unwrap();
        assert!(frames.sync().is_drained());
        assert_eq!(drained.fence(), frames.sync().current_fence());

        frames.complete_resize(drained, 0).unwrap();
        assert_eq!(frames.viewport(), Viewport::new(800, 600));
        assert_eq!(frames.current_back_buffer(), 0);

        surface.index = 0;
        run_frame(&mut frames, &mut surface);
    }

    #[test]
    fn frame_abandoned_after_submit_still_drains() {
        let mut frames = frame_loop();
        let mut surface = Surface { index: 0 };
        run_frame(&mut frames, &mut surface);
        frames.begin_frame().unwrap();
        frames.transition_back_buffer(ResourceState::RenderTarget).unwrap();
        frames.transition_back_buffer(ResourceState::Present).unwrap();
        frames.submit().unwrap();
        // Present failed here; the submitted list is still queued.
        assert!(frames.flush().is_err());

        let fence = frames.drain_for_shutdown().unwrap();
        assert_eq!(fence, 2);
        assert!(frames.sync().is_drained());
        assert_eq!(frames.phase(), FramePhase::Submitted);
        assert!(frames.begin_frame().is_err());
    }

    #[test]
    fn idle_gpu_between_frames_needs_no_extra_fence() {
        let mut frames = frame_loop();
        let mut surface = Surface { index: 0 };
        let (_, fence) = run_frame(&mut frames, &mut surface);
        frames.require_idle_gpu("rebuild the pipeline").unwrap();
        assert_eq!(frames.sync().current_fence(), fence);

        let (_, next) = run_frame(&mut frames, &mut surface);
        assert_eq!(next, fence + 1);
    }

    #[test]
    fn idle_gpu_check_rejects_outstanding_work() {
        let mut frames = frame_loop();
        frames.sync_mut().signal().unwrap();
        let error = frames.require_idle_gpu("rebuild the pipeline").unwrap_err();
        assert!(format!("{error}").contains("outstanding"), "{error}");
        frames.flush().unwrap();
        frames.begin_frame().unwrap();
        assert!(frames.require_idle_gpu("rebuild the pipeline").is_err());
    }

    #[test]
    fn zero_sized_resize_is_rejected() {
        let mut frames = frame_loop();
        assert!(frames.drain_for_resize(0, 600).is_err());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let sync = FrameSynchronizer::new(SimulatedTimeline::default(), None);
        assert!(FrameLoop::new(sync, SWAP_CHAIN_BUFFER_COUNT, Viewport::new(1, 1)).is_err());
    }
}
