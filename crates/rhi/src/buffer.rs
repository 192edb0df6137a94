//! GPU buffer management.
//!
//! Each [`Buffer`] owns its `VkBuffer` and a dedicated `VkDeviceMemory`
//! allocation whose type is resolved with
//! [`Device::find_memory_type`](crate::device::Device::find_memory_type).
//!
//! - [`BufferUsage`] fixes the usage flags and memory properties of a buffer
//! - Host-visible buffers (uniform, staging) stay mapped for their whole life
//! - [`Buffer::device_local_with_data`] uploads through a transient staging
//!   buffer and a blocking one-shot copy
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use e3d_rhi::buffer::{Buffer, BufferUsage};
//! use e3d_rhi::command::CommandPool;
//! use e3d_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>, pool: &CommandPool) -> Result<(), e3d_rhi::RhiError> {
//! let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];
//! let index_buffer = Buffer::device_local_with_data(
//!     device,
//!     pool,
//!     BufferUsage::Index,
//!     bytemuck::cast_slice(&indices),
//! )?;
//! assert_eq!(index_buffer.size(), 12);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use tracing::debug;

use crate::command::{CommandPool, submit_one_shot};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Device-local vertex data, filled by a transfer
    Vertex,
    /// Device-local index data, filled by a transfer
    Index,
    /// Host-visible uniform data, rewritten every frame
    Uniform,
    /// Host-visible transfer source
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Memory properties the backing allocation must have.
    pub fn memory_properties(self) -> vk::MemoryPropertyFlags {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            BufferUsage::Uniform | BufferUsage::Staging => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }

    /// Returns true when the buffer is CPU-writable and kept mapped.
    #[inline]
    pub fn is_host_visible(self) -> bool {
        self.memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer with a dedicated memory allocation.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// Backing memory.
    memory: vk::DeviceMemory,
    /// Buffer size in bytes.
    size: vk::DeviceSize,
    /// Buffer usage type.
    usage: BufferUsage,
    /// Persistent mapping for host-visible buffers.
    mapped: Option<*mut u8>,
}

// The mapped pointer refers to memory owned by this buffer and is only
// written through `&mut self`.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Creates a buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// - [`RhiError::BufferAllocationError`] for a zero size or when creation,
    ///   allocation, binding or mapping fails
    /// - [`RhiError::NoSuitableMemoryType`] when no memory type fits `usage`
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::BufferAllocationError(format!(
                "{} buffer size must be non-zero",
                usage.name()
            )));
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&create_info, None) }
            .map_err(|e| alloc_error(usage, "create buffer", e))?;

        let memory = match Self::allocate_memory(&device, buffer, usage) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // From here on Drop releases buffer and memory on any error path.
        let mut this = Self {
            device,
            buffer,
            memory,
            size,
            usage,
            mapped: None,
        };

        if usage.is_host_visible() {
            let ptr = unsafe {
                this.device
                    .handle()
                    .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
            }
            .map_err(|e| alloc_error(usage, "map memory", e))?;
            this.mapped = Some(ptr.cast::<u8>());
        }

        debug!("Created {} buffer ({} bytes)", usage.name(), size);
        Ok(this)
    }

    fn allocate_memory(
        device: &Device,
        buffer: vk::Buffer,
        usage: BufferUsage,
    ) -> RhiResult<vk::DeviceMemory> {
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };
        let memory_type =
            device.find_memory_type(requirements.memory_type_bits, usage.memory_properties())?;

        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = unsafe { device.handle().allocate_memory(&alloc_info, None) }
            .map_err(|e| alloc_error(usage, "allocate memory", e))?;

        if let Err(e) = unsafe { device.handle().bind_buffer_memory(buffer, memory, 0) } {
            unsafe { device.handle().free_memory(memory, None) };
            return Err(alloc_error(usage, "bind memory", e));
        }

        Ok(memory)
    }

    /// Creates a host-visible buffer holding `data`.
    pub fn host_visible_with_data(
        device: Arc<Device>,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let mut buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_bytes(0, data)?;
        Ok(buffer)
    }

    /// Creates a device-local buffer and fills it with `data`.
    ///
    /// The data goes through a staging buffer and a one-shot copy on the
    /// graphics queue. The call blocks until the copy has completed and the
    /// staging buffer is gone.
    pub fn device_local_with_data(
        device: Arc<Device>,
        pool: &CommandPool,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let staging = Self::host_visible_with_data(device.clone(), BufferUsage::Staging, data)?;
        let buffer = Self::new(device, usage, staging.size)?;

        let region = vk::BufferCopy::default().size(staging.size);
        submit_one_shot(pool, |cmd| {
            cmd.copy_buffer(staging.handle(), buffer.handle(), &[region]);
            Ok(())
        })?;

        debug!(
            "Uploaded {} bytes into {} buffer",
            staging.size,
            usage.name()
        );
        Ok(buffer)
    }

    /// Copies `data` into the mapped memory at `offset`.
    ///
    /// # Errors
    ///
    /// [`RhiError::BufferAllocationError`] if the buffer is not host-visible
    /// or the write would run past the end.
    pub fn write_bytes(&mut self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        let Some(ptr) = self.mapped else {
            return Err(RhiError::BufferAllocationError(format!(
                "{} buffer is not host-visible",
                self.usage.name()
            )));
        };

        check_range(self.size, offset, data.len())?;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    /// Writes a plain-old-data value at the start of the buffer.
    pub fn write<T: Pod>(&mut self, value: &T) -> RhiResult<()> {
        self.write_bytes(0, bytemuck::bytes_of(value))
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.handle().unmap_memory(self.memory);
            }
            self.device.handle().destroy_buffer(self.buffer, None);
            self.device.handle().free_memory(self.memory, None);
        }
    }
}

fn alloc_error(usage: BufferUsage, what: &str, result: vk::Result) -> RhiError {
    RhiError::BufferAllocationError(format!("{} buffer: {what}: {result}", usage.name()))
}

fn check_range(size: vk::DeviceSize, offset: vk::DeviceSize, len: usize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::BufferAllocationError(format!(
            "write of {len} bytes at offset {offset} exceeds buffer size {size}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_flags() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER)
        );
        assert_eq!(
            BufferUsage::Uniform.to_vk_usage(),
            vk::BufferUsageFlags::UNIFORM_BUFFER
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_buffer_usage_memory() {
        assert_eq!(
            BufferUsage::Vertex.memory_properties(),
            vk::MemoryPropertyFlags::DEVICE_LOCAL
        );
        assert!(!BufferUsage::Index.is_host_visible());
        assert!(BufferUsage::Uniform.is_host_visible());
        assert!(
            BufferUsage::Staging
                .memory_properties()
                .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        );
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(192, 0, 192).is_ok());
        assert!(check_range(192, 64, 128).is_ok());
        assert!(check_range(192, 64, 129).is_err());
        assert!(check_range(16, u64::MAX, 1).is_err());
    }
}
