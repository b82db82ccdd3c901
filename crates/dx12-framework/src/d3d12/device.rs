use eyre::eyre;
use tracing::info;
use tracing::warn;
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_11_0;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::*;

use crate::error::FrameResult;
use crate::error::OperationContext;

/// The device and its single direct queue with one allocator/list pair.
pub struct GpuDevice {
    pub factory: IDXGIFactory4,
    pub device: ID3D12Device,
    pub queue: ID3D12CommandQueue,
    pub allocator: ID3D12CommandAllocator,
    /// Created closed; every recording starts with a reset.
    pub list: ID3D12GraphicsCommandList,
    pub info_queue: Option<IDXGIInfoQueue>,
}

impl GpuDevice {
    pub fn new(use_warp_device: bool) -> FrameResult<Self> {
        let (debug_flags, info_queue) = enable_debug_layer();

        let factory: IDXGIFactory4 =
            unsafe { CreateDXGIFactory2(debug_flags) }.during("CreateDXGIFactory2")?;

        let adapter = if use_warp_device {
            info!("Using WARP adapter");
            unsafe { factory.EnumWarpAdapter::<IDXGIAdapter1>() }.during("EnumWarpAdapter")?
        } else {
            hardware_adapter(&factory)?
        };

        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device) }
            .during("D3D12CreateDevice")?;
        let device = device.ok_or_else(|| eyre!("D3D12CreateDevice returned no device"))?;

        let queue: ID3D12CommandQueue = unsafe {
            device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                ..Default::default()
            })
        }
        .during("CreateCommandQueue")?;

        let allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }
                .during("CreateCommandAllocator")?;

        let list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocator, None)
        }
        .during("CreateCommandList")?;
        unsafe { list.Close() }.during("ID3D12GraphicsCommandList::Close")?;

        Ok(Self {
            factory,
            device,
            queue,
            allocator,
            list,
            info_queue,
        })
    }

    /// Submits the (closed) command list to the queue.
    pub fn execute(&self) -> FrameResult<()> {
        let lists = [Some(self.list.cast::<ID3D12CommandList>()?)];
        unsafe { self.queue.ExecuteCommandLists(&lists) };
        Ok(())
    }

    /// Reason the device was removed, or `None` while it is healthy.
    pub fn removed_reason(&self) -> Option<String> {
        removed_reason(&self.device)
    }

    /// Drains queued debug-layer messages into the log.
    pub fn log_debug_messages(&self) {
        let Some(queue) = &self.info_queue else {
            return;
        };
        let count = unsafe { queue.GetNumStoredMessages(DXGI_DEBUG_ALL) };
        for index in 0..count {
            let mut size = 0usize;
            if unsafe { queue.GetMessage(DXGI_DEBUG_ALL, index, None, &mut size) }.is_err() {
                continue;
            }
            // u64 storage keeps the message header aligned.
            let mut storage = vec![0u64; size.div_ceil(8)];
            let message = storage.as_mut_ptr() as *mut DXGI_INFO_QUEUE_MESSAGE;
            if unsafe { queue.GetMessage(DXGI_DEBUG_ALL, index, Some(message), &mut size) }.is_err() {
                continue;
            }
            let (severity, id, description) = unsafe {
                let message = &*message;
                let bytes = std::slice::from_raw_parts(
                    message.pDescription as *const u8,
                    message.DescriptionByteLength,
                );
                (
                    message.Severity,
                    message.ID,
                    String::from_utf8_lossy(bytes)
                        .trim_end_matches('\0')
                        .trim()
                        .to_owned(),
                )
            };
            let severity = match severity {
                DXGI_INFO_QUEUE_MESSAGE_SEVERITY_CORRUPTION => "CORRUPTION",
                DXGI_INFO_QUEUE_MESSAGE_SEVERITY_ERROR => "ERROR",
                DXGI_INFO_QUEUE_MESSAGE_SEVERITY_WARNING => "WARNING",
                DXGI_INFO_QUEUE_MESSAGE_SEVERITY_INFO => "INFO",
                _ => "MESSAGE",
            };
            warn!(severity, id, "{description}");
        }
        unsafe { queue.ClearStoredMessages(DXGI_DEBUG_ALL) };
    }
}

pub fn removed_reason(device: &ID3D12Device) -> Option<String> {
    let reason = unsafe { device.GetDeviceRemovedReason() };
    reason.err().map(|error| format!("{:#010x}: {}", error.code().0, error.message()))
}

/// Turns on the debug layer in debug builds, preferring GPU-based validation.
fn enable_debug_layer() -> (DXGI_CREATE_FACTORY_FLAGS, Option<IDXGIInfoQueue>) {
    if !cfg!(debug_assertions) {
        return (DXGI_CREATE_FACTORY_FLAGS(0), None);
    }

    let mut enabled = false;
    unsafe {
        let mut debug1: Option<ID3D12Debug1> = None;
        let mut debug: Option<ID3D12Debug> = None;
        if let Some(debug1) = D3D12GetDebugInterface(&mut debug1).ok().and(debug1) {
            debug1.EnableDebugLayer();
            debug1.SetEnableGPUBasedValidation(true);
            info!("D3D12 debug layer enabled with GPU-based validation");
            enabled = true;
        } else if let Some(debug) = D3D12GetDebugInterface(&mut debug).ok().and(debug) {
            debug.EnableDebugLayer();
            info!("D3D12 debug layer enabled");
            enabled = true;
        } else {
            warn!("D3D12 debug layer unavailable");
        }
    }
    if !enabled {
        return (DXGI_CREATE_FACTORY_FLAGS(0), None);
    }

    let info_queue = match unsafe { DXGIGetDebugInterface1::<IDXGIInfoQueue>(0) } {
        Ok(queue) => Some(queue),
        Err(error) => {
            warn!("DXGI info queue unavailable: {error}");
            None
        }
    };
    (DXGI_CREATE_FACTORY_DEBUG, info_queue)
}

/// First hardware adapter that can create a feature level 11.0 device.
fn hardware_adapter(factory: &IDXGIFactory4) -> FrameResult<IDXGIAdapter1> {
    for index in 0.. {
        let adapter = match unsafe { factory.EnumAdapters1(index) } {
            Err(error) if error.code() == DXGI_ERROR_NOT_FOUND => break,
            result => result.during("EnumAdapters1")?,
        };
        let desc = unsafe { adapter.GetDesc1() }.during("GetDesc1")?;
        let name = String::from_utf16_lossy(&desc.Description)
            .trim_end_matches('\0')
            .to_owned();

        if (DXGI_ADAPTER_FLAG(desc.Flags as i32) & DXGI_ADAPTER_FLAG_SOFTWARE)
            != DXGI_ADAPTER_FLAG_NONE
        {
            info!(adapter = %name, "skipping software adapter");
            continue;
        }

        let supported = unsafe {
            D3D12CreateDevice(
                &adapter,
                D3D_FEATURE_LEVEL_11_0,
                std::ptr::null_mut::<Option<ID3D12Device>>(),
            )
        }
        .is_ok();
        if supported {
            info!(adapter = %name, "using hardware adapter");
            return Ok(adapter);
        }
        info!(adapter = %name, "adapter does not support feature level 11.0");
    }
    Err(eyre!("no Direct3D 12 capable hardware adapter found; try -warp").into())
}
