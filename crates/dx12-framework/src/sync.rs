use std::time::Duration;

use eyre::eyre;
use tracing::debug;

use crate::error::FrameReport;
use crate::error::FrameResult;

/// Result of a bounded wait on the GPU timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached,
    TimedOut,
}

/// Completed value a removed device reports for every fence.
pub const DEVICE_LOST_FENCE_VALUE: u64 = u64::MAX;

/// The GPU side of a fence: a queue that can enqueue signal commands and a
/// counter the GPU advances as it retires them.
pub trait GpuTimeline {
    /// Enqueues a GPU-side signal of `value` behind all previously submitted work.
    fn enqueue_signal(&mut self, value: u64) -> FrameResult<()>;

    /// Highest value the GPU has reached. Monotonic, may lag behind requests.
    fn completed_value(&self) -> u64;

    /// Blocks the calling thread until `completed_value() >= value` or the
    /// timeout elapses. `None` waits forever.
    fn block_until(&mut self, value: u64, timeout: Option<Duration>) -> FrameResult<WaitOutcome>;

    /// Reason the device stopped responding, if it did.
    fn device_removed_reason(&self) -> Option<String> {
        None
    }

    /// A lost device reports every value as complete, so this must be checked
    /// before trusting [`GpuTimeline::completed_value`].
    fn is_device_lost(&self) -> bool {
        self.completed_value() == DEVICE_LOST_FENCE_VALUE
    }
}

/// Orders CPU work against the GPU with a single monotonically increasing fence.
///
/// Any write recorded in a command list submitted before [`FrameSynchronizer::signal`]
/// returned `v` is complete once [`FrameSynchronizer::wait_for`] on `v` returns.
pub struct FrameSynchronizer<T: GpuTimeline> {
    timeline: T,
    current_fence: u64,
    wait_timeout: Option<Duration>,
}

impl<T: GpuTimeline> FrameSynchronizer<T> {
    pub fn new(timeline: T, wait_timeout: Option<Duration>) -> Self {
        Self {
            timeline,
            current_fence: 0,
            wait_timeout,
        }
    }

    /// Last value requested with [`Self::signal`].
    pub fn current_fence(&self) -> u64 {
        self.current_fence
    }

    pub fn completed_fence(&self) -> u64 {
        self.timeline.completed_value()
    }

    /// True when the GPU has retired everything ever signalled.
    pub fn is_drained(&self) -> bool {
        !self.timeline.is_device_lost() && self.completed_fence() >= self.current_fence
    }

    pub fn timeline(&self) -> &T {
        &self.timeline
    }

    pub fn signal(&mut self) -> FrameResult<u64> {
        let value = self.current_fence + 1;
        self.timeline.enqueue_signal(value)?;
        self.current_fence = value;
        debug!(fence = value, "signal enqueued");
        Ok(value)
    }

    pub fn wait_for(&mut self, value: u64) -> FrameResult<()> {
        if value > self.current_fence {
            // Nothing will ever signal this value; waiting would hang forever.
            return Err(eyre!(
                "wait for fence {value} requested but only {} has been signalled",
                self.current_fence
            )
            .into());
        }
        if self.timeline.is_device_lost() {
            return Err(self.device_lost(value));
        }
        if self.timeline.completed_value() >= value {
            return Ok(());
        }
        match self.timeline.block_until(value, self.wait_timeout)? {
            WaitOutcome::Reached if !self.timeline.is_device_lost() => Ok(()),
            WaitOutcome::Reached => Err(self.device_lost(value)),
            WaitOutcome::TimedOut => match self.timeline.device_removed_reason() {
                Some(_) => Err(self.device_lost(value)),
                None => Err(eyre!(
                    "timed out after {:?} waiting for fence {value} (completed {})",
                    self.wait_timeout.unwrap_or_default(),
                    self.timeline.completed_value()
                )
                .into()),
            },
        }
    }

    fn device_lost(&self, value: u64) -> FrameReport {
        let reason = self
            .timeline
            .device_removed_reason()
            .unwrap_or_else(|| "no removal reason reported".to_owned());
        let completed = match self.timeline.completed_value() {
            DEVICE_LOST_FENCE_VALUE => "lost".to_owned(),
            completed => completed.to_string(),
        };
        eyre!("GPU device removed while waiting for fence {value} (completed {completed}): {reason}").into()
    }

    /// Signals and waits, leaving the GPU idle. Required before resizing or
    /// releasing anything the GPU may still reference.
    pub fn flush_all(&mut self) -> FrameResult<u64> {
        let value = self.signal()?;
        self.wait_for(value)?;
        Ok(value)
    }
}


#[cfg(test)]
mod tests {
    use super::sim::SimulatedTimeline;
    use super::*;

    fn synchronizer() -> FrameSynchronizer<SimulatedTimeline> {
        FrameSynchronizer::new(SimulatedTimeline::default(), Some(Duration::from_millis(10)))
    }

    #[test]
    fn signal_increments_by_one() {
        let mut sync = synchronizer();
        assert_eq!(sync.current_fence(), 0);
        assert_eq!(sync.signal().unwrap(), 1);
        assert_eq!(sync.signal().unwrap(), 2);
        assert_eq!(sync.timeline().signals, vec![1, 2]);
    }

    #[test]
    fn flush_all_leaves_gpu_drained() {
        let mut sync = synchronizer();
        sync.signal().unwrap();
        let value = sync.flush_all().unwrap();
        assert_eq!(value, 2);
        assert!(sync.is_drained());
        assert_eq!(sync.completed_fence(), 2);
    }

    #[test]
    fn wait_on_completed_value_does_not_block() {
        let mut sync = synchronizer();
        let value = sync.signal().unwrap();
        sync.timeline.retire_all();
        sync.wait_for(value).unwrap();
        assert_eq!(sync.timeline().blocking_waits, 0);
    }

    #[test]
    fn wait_on_unsignalled_value_is_rejected() {
        let mut sync = synchronizer();
        assert!(sync.wait_for(1).is_err());
    }

    #[test]
    fn stalled_gpu_reports_timeout() {
        let mut sync = synchronizer();
        sync.timeline.stalled = true;
        let error = sync.flush_all().unwrap_err();
        assert!(format!("{error}").contains("timed out"), "{error}");
    }

    #[test]
    fn removed_device_reason_is_reported() {
        let mut sync = synchronizer();
        sync.timeline.stalled = true;
        sync.timeline.removed_reason = Some("DXGI_ERROR_DEVICE_HUNG".to_owned());
        let error = sync.flush_all().unwrap_err();
        assert!(format!("{error}").contains("DXGI_ERROR_DEVICE_HUNG"), "{error}");
    }

    #[test]
    fn removed_device_fails_without_blocking() {
        let mut sync = synchronizer();
        sync.timeline.completed = DEVICE_LOST_FENCE_VALUE;
        sync.timeline.removed_reason = Some("DXGI_ERROR_DEVICE_REMOVED".to_owned());
        assert!(!sync.is_drained());

        let error = sync.flush_all().unwrap_err();
        assert!(format!("{error}").contains("DXGI_ERROR_DEVICE_REMOVED"), "{error}");
        assert_eq!(sync.timeline().blocking_waits, 0);
    }

    #[test]
    fn device_lost_during_wait_is_not_success() {
        let mut sync = synchronizer();
        let value = sync.signal().unwrap();
        sync.timeline.pending.clear();
        sync.timeline.pending.push_back(DEVICE_LOST_FENCE_VALUE);
        assert!(sync.wait_for(value).is_err());
        assert_eq!(sync.timeline().blocking_waits, 1);
    }
}
