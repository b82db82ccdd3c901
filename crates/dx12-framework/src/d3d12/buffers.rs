use std::ffi::c_void;
use std::ptr::NonNull;

use eyre::eyre;
use tracing::debug;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::barrier::d3d12_state;
use super::barrier::transition_barrier;
use crate::error::FrameResult;
use crate::error::OperationContext;
use crate::resource_state::StateTracker;
use crate::upload::ensure_mappable;
use crate::upload::write_bytes;
use crate::upload::BufferUsage;
use crate::upload::MapTarget;
use crate::upload::MemoryPool;
use crate::upload::StagedUpload;

/// One committed buffer resource and the state it was last recorded into.
pub struct GpuBuffer {
    resource: ID3D12Resource,
    pool: MemoryPool,
    usage: BufferUsage,
    size: u64,
    state: StateTracker,
}

impl GpuBuffer {
    pub fn new(
        device: &ID3D12Device,
        pool: MemoryPool,
        usage: BufferUsage,
        len: u64,
        name: &'static str,
    ) -> FrameResult<Self> {
        let size = usage.allocation_size(len);
        if size == 0 {
            return Err(eyre!("{name}: cannot allocate an empty buffer").into());
        }
        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: match pool {
                MemoryPool::Upload => D3D12_HEAP_TYPE_UPLOAD,
                MemoryPool::Default => D3D12_HEAP_TYPE_DEFAULT,
            },
            ..Default::default()
        };
        let desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Width: size,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            ..Default::default()
        };
        let initial = pool.initial_state();

        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            device.CreateCommittedResource(
                &heap_props,
                D3D12_HEAP_FLAG_NONE,
                &desc,
                d3d12_state(initial),
                None,
                &mut resource,
            )
        }
        .during("CreateCommittedResource")?;
        let resource = resource.ok_or_else(|| eyre!("{name}: CreateCommittedResource returned nothing"))?;
        debug!(name, ?pool, ?usage, size, "buffer created");

        Ok(Self {
            resource,
            pool,
            usage,
            size,
            state: StateTracker::new(name, initial),
        })
    }

    pub fn resource(&self) -> &ID3D12Resource {
        &self.resource
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn gpu_address(&self) -> u64 {
        unsafe { self.resource.GetGPUVirtualAddress() }
    }

    /// Whether draws may read this buffer in its current state.
    pub fn is_readable(&self) -> bool {
        match self.pool {
            MemoryPool::Upload => true,
            MemoryPool::Default => self.state.state() == self.usage.resting_state(),
        }
    }

    pub fn vertex_view(&self, stride: u32) -> D3D12_VERTEX_BUFFER_VIEW {
        D3D12_VERTEX_BUFFER_VIEW {
            BufferLocation: self.gpu_address(),
            StrideInBytes: stride,
            SizeInBytes: self.size as u32,
        }
    }

    /// 32-bit indices.
    pub fn index_view(&self) -> D3D12_INDEX_BUFFER_VIEW {
        D3D12_INDEX_BUFFER_VIEW {
            BufferLocation: self.gpu_address(),
            SizeInBytes: self.size as u32,
            Format: DXGI_FORMAT_R32_UINT,
        }
    }

    /// Scoped map/copy/unmap. Only Upload-pool buffers can be written this way.
    pub fn write(&self, data: &[u8]) -> FrameResult<()> {
        write_bytes(self, data)
    }
}

unsafe impl MapTarget for GpuBuffer {
    fn byte_len(&self) -> usize {
        self.size as usize
    }

    fn map_raw(&self) -> FrameResult<NonNull<u8>> {
        ensure_mappable(self.pool, self.state.name())?;
        let mut data: *mut c_void = std::ptr::null_mut();
        // Empty read range: the CPU never reads these buffers back.
        let read_range = D3D12_RANGE { Begin: 0, End: 0 };
        unsafe { self.resource.Map(0, Some(&read_range), Some(&mut data)) }
            .during("ID3D12Resource::Map")?;
        NonNull::new(data as *mut u8).ok_or_else(|| {
            unsafe { self.resource.Unmap(0, None) };
            eyre!("{}: Map returned a null pointer", self.state.name()).into()
        })
    }

    fn unmap_raw(&self) {
        unsafe { self.resource.Unmap(0, None) };
    }
}

/// Records Default-pool uploads into an open command list. The staging
/// buffers it returns from [`UploadBatch::finish`] must stay alive until the
/// list has executed and the queue has been flushed.
pub struct UploadBatch<'a> {
    device: &'a ID3D12Device,
    list: &'a ID3D12GraphicsCommandList,
    staging: Vec<GpuBuffer>,
}

impl<'a> UploadBatch<'a> {
    pub fn new(device: &'a ID3D12Device, list: &'a ID3D12GraphicsCommandList) -> Self {
        Self {
            device,
            list,
            staging: Vec::new(),
        }
    }

    pub fn device(&self) -> &ID3D12Device {
        self.device
    }

    /// Creates a Default-pool buffer holding `data`: staging write, copy, then a
    /// barrier from `CopyDest` to the usage's resting state.
    pub fn upload(
        &mut self,
        usage: BufferUsage,
        data: &[u8],
        name: &'static str,
    ) -> FrameResult<GpuBuffer> {
        let plan = StagedUpload::new(usage, data.len() as u64)?;
        let mut buffer = GpuBuffer::new(self.device, plan.destination_pool(), usage, plan.copy_len(), name)?;
        let staging = GpuBuffer::new(
            self.device,
            plan.staging_pool(),
            usage,
            plan.copy_len(),
            "staging buffer",
        )?;
        staging.write(data)?;

        let transition = plan.publish(&mut buffer.state)?;
        unsafe {
            self.list
                .CopyBufferRegion(&buffer.resource, 0, &staging.resource, 0, plan.copy_len());
            self.list
                .ResourceBarrier(&[transition_barrier(&buffer.resource, transition)]);
        }
        self.staging.push(staging);
        Ok(buffer)
    }

    pub fn finish(self) -> Vec<GpuBuffer> {
        self.staging
    }
}
