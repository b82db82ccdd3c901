use std::time::Duration;

use windows::Win32::Foundation::CloseHandle;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Foundation::WAIT_OBJECT_0;
use windows::Win32::Foundation::WAIT_TIMEOUT;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::System::Threading::CreateEventA;
use windows::Win32::System::Threading::WaitForSingleObjectEx;
use windows::Win32::System::Threading::INFINITE;

use super::device::removed_reason;
use crate::error::FrameResult;
use crate::error::OperationContext;
use crate::sync::GpuTimeline;
use crate::sync::WaitOutcome;

/// The queue's fence plus the event the CPU sleeps on while waiting for it.
pub struct D3d12Timeline {
    device: ID3D12Device,
    queue: ID3D12CommandQueue,
    fence: ID3D12Fence,
    event: HANDLE,
}

impl D3d12Timeline {
    pub fn new(device: &ID3D12Device, queue: &ID3D12CommandQueue) -> FrameResult<Self> {
        let fence: ID3D12Fence =
            unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }.during("CreateFence")?;
        let event = unsafe { CreateEventA(None, false, false, None) }.during("CreateEventA")?;
        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            fence,
            event,
        })
    }
}

impl GpuTimeline for D3d12Timeline {
    fn enqueue_signal(&mut self, value: u64) -> FrameResult<()> {
        unsafe { self.queue.Signal(&self.fence, value) }.during("ID3D12CommandQueue::Signal")
    }

    fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn block_until(&mut self, value: u64, timeout: Option<Duration>) -> FrameResult<WaitOutcome> {
        unsafe { self.fence.SetEventOnCompletion(value, self.event) }
            .during("SetEventOnCompletion")?;
        let millis = timeout.map_or(INFINITE, |timeout| {
            u32::try_from(timeout.as_millis()).unwrap_or(INFINITE - 1)
        });
        let status = unsafe { WaitForSingleObjectEx(self.event, millis, false) };
        if status == WAIT_OBJECT_0 {
            return Ok(WaitOutcome::Reached);
        }
        if status == WAIT_TIMEOUT {
            return Ok(WaitOutcome::TimedOut);
        }
        Err(windows::core::Error::from_win32()).during("WaitForSingleObjectEx")
    }

    fn device_removed_reason(&self) -> Option<String> {
        removed_reason(&self.device)
    }
}

impl Drop for D3d12Timeline {
    fn drop(&mut self) {
        if !self.event.is_invalid() {
            let _ = unsafe { CloseHandle(self.event) };
        }
    }
}
