use eyre::eyre;
use tracing::info;
use windows::core::Interface;
use windows::Win32::Foundation::HWND;
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

use super::device::GpuDevice;
use crate::error::FrameResult;
use crate::error::OperationContext;
use crate::frame::Drained;
use crate::frame::Viewport;
use crate::frame::SWAP_CHAIN_BUFFER_COUNT;

pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;
pub const DEPTH_STENCIL_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D24_UNORM_S8_UINT;

type BackBuffers = [ID3D12Resource; SWAP_CHAIN_BUFFER_COUNT];

/// Flip-model swapchain, one RTV per back buffer, and an optional depth buffer.
pub struct SwapchainTargets {
    swap_chain: IDXGISwapChain3,
    rtv_heap: ID3D12DescriptorHeap,
    rtv_descriptor_size: usize,
    /// Empty only while a resize has released the buffers.
    back_buffers: Option<BackBuffers>,
    depth: Option<DepthTarget>,
}

struct DepthTarget {
    heap: ID3D12DescriptorHeap,
    resource: ID3D12Resource,
}

impl SwapchainTargets {
    pub fn new(gpu: &GpuDevice, hwnd: HWND, viewport: Viewport, with_depth: bool) -> FrameResult<Self> {
        let desc = DXGI_SWAP_CHAIN_DESC1 {
            BufferCount: SWAP_CHAIN_BUFFER_COUNT as u32,
            Width: viewport.width,
            Height: viewport.height,
            Format: BACK_BUFFER_FORMAT,
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let swap_chain: IDXGISwapChain1 = unsafe {
            gpu.factory
                .CreateSwapChainForHwnd(&gpu.queue, hwnd, &desc, None, None)
        }
        .during("CreateSwapChainForHwnd")?;
        let swap_chain: IDXGISwapChain3 = swap_chain.cast()?;
        unsafe { gpu.factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER) }
            .during("MakeWindowAssociation")?;

        let rtv_heap: ID3D12DescriptorHeap = unsafe {
            gpu.device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: SWAP_CHAIN_BUFFER_COUNT as u32,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                ..Default::default()
            })
        }
        .during("CreateDescriptorHeap(RTV)")?;
        let rtv_descriptor_size = unsafe {
            gpu.device
                .GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV)
        } as usize;

        let mut targets = Self {
            swap_chain,
            rtv_heap,
            rtv_descriptor_size,
            back_buffers: None,
            depth: None,
        };
        targets.acquire(&gpu.device, viewport, with_depth)?;
        info!(
            width = viewport.width,
            height = viewport.height,
            depth = with_depth,
            "swapchain created"
        );
        Ok(targets)
    }

    pub fn swap_chain(&self) -> &IDXGISwapChain3 {
        &self.swap_chain
    }

    pub fn current_index(&self) -> usize {
        unsafe { self.swap_chain.GetCurrentBackBufferIndex() as usize }
    }

    pub fn back_buffer(&self, index: usize) -> FrameResult<&ID3D12Resource> {
        self.back_buffers
            .as_ref()
            .map(|buffers| &buffers[index])
            .ok_or_else(|| eyre!("back buffers are released for a resize").into())
    }

    pub fn back_buffer_view(&self, index: usize) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        let start = unsafe { self.rtv_heap.GetCPUDescriptorHandleForHeapStart() };
        D3D12_CPU_DESCRIPTOR_HANDLE {
            ptr: start.ptr + index * self.rtv_descriptor_size,
        }
    }

    pub fn depth_stencil_view(&self) -> Option<D3D12_CPU_DESCRIPTOR_HANDLE> {
        self.depth
            .as_ref()
            .map(|depth| unsafe { depth.heap.GetCPUDescriptorHandleForHeapStart() })
    }

    pub fn depth_buffer(&self) -> Option<&ID3D12Resource> {
        self.depth.as_ref().map(|depth| &depth.resource)
    }

    pub fn present(&self) -> FrameResult<()> {
        // Sync interval 1: vsync-locked.
        unsafe { self.swap_chain.Present(1, DXGI_PRESENT(0)) }
            .ok()
            .during("IDXGISwapChain::Present")
    }

    /// Releases every buffer reference, resizes, and re-creates the views.
    /// Taking [`Drained`] proves no queued work still references the old buffers.
    pub fn resize(&mut self, device: &ID3D12Device, drained: &Drained) -> FrameResult<()> {
        let viewport = drained.viewport();
        let with_depth = self.depth.is_some();
        self.back_buffers = None;
        self.depth = None;
        unsafe {
            self.swap_chain.ResizeBuffers(
                SWAP_CHAIN_BUFFER_COUNT as u32,
                viewport.width,
                viewport.height,
                DXGI_FORMAT_UNKNOWN,
                DXGI_SWAP_CHAIN_FLAG(0),
            )
        }
        .during("ResizeBuffers")?;
        self.acquire(device, viewport, with_depth)
    }

    fn acquire(&mut self, device: &ID3D12Device, viewport: Viewport, with_depth: bool) -> FrameResult<()> {
        let back_buffers: BackBuffers = array_init::try_array_init(|index| -> FrameResult<_> {
            let buffer: ID3D12Resource =
                unsafe { self.swap_chain.GetBuffer(index as u32) }.during("GetBuffer")?;
            unsafe { device.CreateRenderTargetView(&buffer, None, self.back_buffer_view(index)) };
            Ok(buffer)
        })?;
        self.back_buffers = Some(back_buffers);
        if with_depth {
            self.depth = Some(DepthTarget::new(device, viewport)?);
        }
        Ok(())
    }
}

impl DepthTarget {
    fn new(device: &ID3D12Device, viewport: Viewport) -> FrameResult<Self> {
        let heap: ID3D12DescriptorHeap = unsafe {
            device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: 1,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
                ..Default::default()
            })
        }
        .during("CreateDescriptorHeap(DSV)")?;

        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            ..Default::default()
        };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Width: viewport.width as u64,
            Height: viewport.height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DEPTH_STENCIL_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
            ..Default::default()
        };
        let clear_value = D3D12_CLEAR_VALUE {
            Format: DEPTH_STENCIL_FORMAT,
            Anonymous: D3D12_CLEAR_VALUE_0 {
                DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                    Depth: 1.0,
                    Stencil: 0,
                },
            },
        };
        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            device.CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &desc,
                D3D12_RESOURCE_STATE_DEPTH_WRITE,
                Some(&clear_value),
                &mut resource,
            )
        }
        .during("CreateCommittedResource(depth)")?;
        let resource = resource.ok_or_else(|| eyre!("depth buffer creation returned nothing"))?;
        unsafe {
            device.CreateDepthStencilView(&resource, None, heap.GetCPUDescriptorHandleForHeapStart())
        };
        Ok(Self { heap, resource })
    }
}

/// Viewport and scissor covering the whole client area.
pub fn full_viewport(viewport: Viewport) -> (D3D12_VIEWPORT, RECT) {
    (
        D3D12_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: viewport.width as f32,
            Height: viewport.height as f32,
            MinDepth: D3D12_MIN_DEPTH,
            MaxDepth: D3D12_MAX_DEPTH,
        },
        RECT {
            left: 0,
            top: 0,
            right: viewport.width as i32,
            bottom: viewport.height as i32,
        },
    )
}
