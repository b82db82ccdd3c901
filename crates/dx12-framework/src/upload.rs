//! CPU side of getting bytes into GPU memory.
//!
//! Upload-pool buffers are mapped, written and unmapped in one scope through
//! [`MappedBytes`]. Default-pool buffers cannot be mapped at all; they are
//! created in `CopyDest`, filled by a recorded copy from an upload-pool staging
//! buffer, then transitioned to their [`BufferUsage::resting_state`].

use std::ops::Deref;
use std::ops::DerefMut;
use std::ptr::NonNull;

use eyre::eyre;

use crate::error::FrameResult;
use crate::resource_state::ResourceState;
use crate::resource_state::StateTracker;
use crate::resource_state::Transition;

/// `D3D12_CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT`.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Rounds a constant buffer size up to the device's placement alignment.
pub const fn align_constant_buffer_size(size_bytes: u64) -> u64 {
    (size_bytes + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPool {
    /// CPU-writable, GPU-readable.
    Upload,
    /// GPU-optimal, CPU-inaccessible.
    Default,
}

impl MemoryPool {
    pub fn initial_state(self) -> ResourceState {
        match self {
            MemoryPool::Upload => ResourceState::GenericRead,
            MemoryPool::Default => ResourceState::CopyDest,
        }
    }

    pub fn is_cpu_writable(self) -> bool {
        matches!(self, MemoryPool::Upload)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Constant,
}

impl BufferUsage {
    /// State a Default-pool buffer must be in before draws read it.
    pub fn resting_state(self) -> ResourceState {
        match self {
            BufferUsage::Vertex | BufferUsage::Constant => ResourceState::VertexAndConstantBuffer,
            BufferUsage::Index => ResourceState::IndexBuffer,
        }
    }

    /// Size to allocate for `len` bytes of this kind of data.
    pub fn allocation_size(self, len: u64) -> u64 {
        match self {
            BufferUsage::Constant => align_constant_buffer_size(len),
            BufferUsage::Vertex | BufferUsage::Index => len,
        }
    }
}

/// Refuses to map memory the CPU cannot write. Every [`MapTarget`] backed by a
/// pooled resource calls this first.
pub fn ensure_mappable(pool: MemoryPool, name: &str) -> FrameResult<()> {
    if !pool.is_cpu_writable() {
        return Err(eyre!(
            "{name} lives in the {pool:?} pool and cannot be mapped; upload through a staging buffer"
        )
        .into());
    }
    Ok(())
}

/// How one CPU byte slice reaches a Default-pool buffer: write an Upload-pool
/// staging buffer, record a copy of [`StagedUpload::copy_len`] bytes, then
/// record the single barrier [`StagedUpload::publish`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedUpload {
    usage: BufferUsage,
    len: u64,
}

impl StagedUpload {
    pub fn new(usage: BufferUsage, len: u64) -> FrameResult<Self> {
        if len == 0 {
            return Err(eyre!("cannot upload an empty {usage:?} buffer").into());
        }
        Ok(Self { usage, len })
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn destination_pool(&self) -> MemoryPool {
        MemoryPool::Default
    }

    pub fn staging_pool(&self) -> MemoryPool {
        MemoryPool::Upload
    }

    /// Allocation size for both the staging and destination buffers.
    pub fn buffer_size(&self) -> u64 {
        self.usage.allocation_size(self.len)
    }

    pub fn copy_len(&self) -> u64 {
        self.len
    }

    /// Barrier that makes the copied bytes readable by draws. The destination
    /// must still be in `CopyDest`, so a buffer is published at most once.
    pub fn publish(&self, destination: &mut StateTracker) -> FrameResult<Transition> {
        destination.transition(ResourceState::CopyDest, self.usage.resting_state())
    }
}

/// Memory that can be mapped into the CPU address space.
///
/// # Safety
///
/// A successful `map_raw` must return a pointer valid for reads and writes of
/// `byte_len()` bytes until the matching `unmap_raw` call.
pub unsafe trait MapTarget {
    fn byte_len(&self) -> usize;

    fn map_raw(&self) -> FrameResult<NonNull<u8>>;

    fn unmap_raw(&self);
}

/// A mapped region. Unmaps on drop, so every exit path pairs map with unmap.
pub struct MappedBytes<'a, M: MapTarget + ?Sized> {
    target: &'a M,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'a, M: MapTarget + ?Sized> MappedBytes<'a, M> {
    pub fn map(target: &'a M) -> FrameResult<Self> {
        let ptr = target.map_raw()?;
        Ok(Self {
            target,
            ptr,
            len: target.byte_len(),
        })
    }
}

impl<M: MapTarget + ?Sized> Deref for MappedBytes<'_, M> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // Safety: MapTarget guarantees `len` valid bytes while mapped.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<M: MapTarget + ?Sized> DerefMut for MappedBytes<'_, M> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // Safety: as above, and `&mut self` makes this the only view.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<M: MapTarget + ?Sized> Drop for MappedBytes<'_, M> {
    fn drop(&mut self) {
        self.target.unmap_raw();
    }
}

/// Scoped map, copy, unmap of `data` at the start of `target`.
pub fn write_bytes<M: MapTarget + ?Sized>(target: &M, data: &[u8]) -> FrameResult<()> {
    if data.len() > target.byte_len() {
        return Err(eyre!(
            "write of {} bytes does not fit in a {} byte buffer",
            data.len(),
            target.byte_len()
        )
        .into());
    }
    let mut mapped = MappedBytes::map(target)?;
    mapped[..data.len()].copy_from_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::cell::UnsafeCell;

    use super::*;

    struct HostBuffer {
        bytes: UnsafeCell<Vec<u8>>,
        pool: MemoryPool,
        maps: Cell<u32>,
        unmaps: Cell<u32>,
        fail_map: bool,
    }

    impl HostBuffer {
        fn new(len: usize) -> Self {
            Self {
                bytes: UnsafeCell::new(vec![0; len]),
                pool: MemoryPool::Upload,
                maps: Cell::new(0),
                unmaps: Cell::new(0),
                fail_map: false,
            }
        }
    }

    unsafe impl MapTarget for HostBuffer {
        fn byte_len(&self) -> usize {
            unsafe { (*self.bytes.get()).len() }
        }

        fn map_raw(&self) -> FrameResult<NonNull<u8>> {
            ensure_mappable(self.pool, "host buffer")?;
            if self.fail_map {
                return Err(eyre!("Map failed").into());
            }
            self.maps.set(self.maps.get() + 1);
            let ptr = unsafe { (*self.bytes.get()).as_mut_ptr() };
            Ok(NonNull::new(ptr).expect("vec pointer is never null"))
        }

        fn unmap_raw(&self) {
            self.unmaps.set(self.unmaps.get() + 1);
        }
    }

    #[test]
    fn constant_buffers_round_up_to_256() {
        assert_eq!(align_constant_buffer_size(0), 0);
        assert_eq!(align_constant_buffer_size(1), 256);
        assert_eq!(align_constant_buffer_size(208), 256);
        assert_eq!(align_constant_buffer_size(256), 256);
        assert_eq!(align_constant_buffer_size(257), 512);
        assert_eq!(BufferUsage::Constant.allocation_size(300), 512);
        assert_eq!(BufferUsage::Vertex.allocation_size(300), 300);
    }

    #[test]
    fn written_pattern_reads_back_before_unmap() {
        let buffer = HostBuffer::new(64);
        let pattern: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(37) ^ 0xA5).collect();
        {
            let mut mapped = MappedBytes::map(&buffer).unwrap();
            mapped.copy_from_slice(&pattern);
            assert_eq!(&mapped[..], &pattern[..]);
            assert_eq!(buffer.unmaps.get(), 0);
        }
        assert_eq!(buffer.maps.get(), 1);
        assert_eq!(buffer.unmaps.get(), 1);
    }

    #[test]
    fn write_bytes_pairs_map_and_unmap() {
        let buffer = HostBuffer::new(16);
        write_bytes(&buffer, &[1, 2, 3, 4]).unwrap();
        write_bytes(&buffer, &[9; 16]).unwrap();
        assert_eq!(buffer.maps.get(), 2);
        assert_eq!(buffer.unmaps.get(), 2);
    }

    #[test]
    fn oversized_write_never_maps() {
        let buffer = HostBuffer::new(8);
        assert!(write_bytes(&buffer, &[0; 9]).is_err());
        assert_eq!(buffer.maps.get(), 0);
        assert_eq!(buffer.unmaps.get(), 0);
    }

    #[test]
    fn failed_map_is_not_unmapped() {
        let mut buffer = HostBuffer::new(8);
        buffer.fail_map = true;
        assert!(write_bytes(&buffer, &[1]).is_err());
        assert_eq!(buffer.unmaps.get(), 0);
    }

    #[test]
    fn pools_and_usages_map_to_states() {
        assert_eq!(MemoryPool::Default.initial_state(), ResourceState::CopyDest);
        assert_eq!(MemoryPool::Upload.initial_state(), ResourceState::GenericRead);
        assert!(!MemoryPool::Default.is_cpu_writable());
        assert_eq!(BufferUsage::Index.resting_state(), ResourceState::IndexBuffer);
        assert_eq!(
            BufferUsage::Vertex.resting_state(),
            ResourceState::VertexAndConstantBuffer
        );
    }

    #[test]
    fn default_pool_is_never_mapped() {
        let mut buffer = HostBuffer::new(16);
        buffer.pool = MemoryPool::Default;
        let error = write_bytes(&buffer, &[1, 2, 3]).unwrap_err();
        assert!(format!("{error}").contains("staging"), "{error}");
        assert!(MappedBytes::map(&buffer).is_err());
        assert_eq!(buffer.maps.get(), 0);
        assert_eq!(buffer.unmaps.get(), 0);
    }

    #[test]
    fn staged_upload_goes_through_upload_pool_into_default_pool() {
        let plan = StagedUpload::new(BufferUsage::Vertex, 288).unwrap();
        assert_eq!(plan.staging_pool(), MemoryPool::Upload);
        assert!(plan.staging_pool().is_cpu_writable());
        assert_eq!(plan.destination_pool(), MemoryPool::Default);
        assert_eq!(plan.buffer_size(), 288);
        assert_eq!(plan.copy_len(), 288);

        let constants = StagedUpload::new(BufferUsage::Constant, 208).unwrap();
        assert_eq!(constants.buffer_size(), 256);
        assert_eq!(constants.copy_len(), 208);
    }

    #[test]
    fn staged_upload_publishes_exactly_once() {
        for (usage, resting) in [
            (BufferUsage::Vertex, ResourceState::VertexAndConstantBuffer),
            (BufferUsage::Index, ResourceState::IndexBuffer),
        ] {
            let plan = StagedUpload::new(usage, 64).unwrap();
            let mut tracker = StateTracker::new("mesh buffer", plan.destination_pool().initial_state());

            let transition = plan.publish(&mut tracker).unwrap();
            assert_eq!(
                transition,
                Transition {
                    before: ResourceState::CopyDest,
                    after: resting,
                }
            );
            assert_eq!(tracker.state(), resting);
            assert!(plan.publish(&mut tracker).is_err());
            assert_eq!(tracker.state(), resting);
        }
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(StagedUpload::new(BufferUsage::Index, 0).is_err());
    }
}
