//! Per-frame submission and presentation.
//!
//! The [`FrameExecutor`] implements a "frames in flight" loop over
//! [`MAX_FRAMES_IN_FLIGHT`] slots:
//!
//! 1. While the GPU renders frame N, the CPU prepares frame N+1
//! 2. Each slot has its own command buffer, semaphores and fence
//! 3. The slot fence keeps the CPU from re-recording a command buffer the GPU
//!    still reads, and a per-image table keeps two slots from rendering into
//!    the same swapchain image at once
//!
//! An out-of-date or suboptimal swapchain never fails a frame: the executor
//! raises [`needs_rebuild`](FrameExecutor::needs_rebuild) and the owner
//! recreates the swapchain before the next call.
//!
//! # Example
//!
//! ```no_run
//! use e3d_rhi::context::DeviceContext;
//! use e3d_rhi::swapchain::Swapchain;
//! use e3d_renderer::frame_executor::FrameExecutor;
//!
//! # fn example(context: &DeviceContext, swapchain: &mut Swapchain) -> Result<(), e3d_rhi::RhiError> {
//! let mut executor = FrameExecutor::new(
//!     context.device().clone(),
//!     context.command_pool(),
//!     swapchain.image_count(),
//! )?;
//!
//! executor.render_frame(swapchain, |cmd, image_index| {
//!     // record into `cmd` for swapchain image `image_index`
//!     Ok(())
//! })?;
//!
//! if executor.needs_rebuild() {
//!     swapchain.recreate(swapchain.extent())?;
//!     executor.on_swapchain_recreated(swapchain.image_count())?;
//!     executor.clear_rebuild();
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use e3d_rhi::RhiResult;
use e3d_rhi::command::{CommandBuffer, CommandPool};
use e3d_rhi::device::Device;
use e3d_rhi::swapchain::{AcquireOutcome, PresentOutcome, Swapchain};
use e3d_rhi::sync::FrameSyncSet;

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Outcome of one [`FrameExecutor::render_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Work was submitted and the image queued for presentation.
    Presented,
    /// Acquisition reported a stale swapchain; nothing was submitted.
    Skipped,
}

/// Resources owned by one frame slot.
struct FrameSlot {
    command_buffer: CommandBuffer,
    sync: FrameSyncSet,
}

/// Which slot last submitted work targeting each swapchain image.
#[derive(Debug, Default)]
struct ImagesInFlight {
    owners: Vec<Option<usize>>,
}

impl ImagesInFlight {
    fn new(image_count: usize) -> Self {
        Self {
            owners: vec![None; image_count],
        }
    }

    /// Forgets every owner and resizes for a new swapchain.
    fn reset(&mut self, image_count: usize) {
        self.owners.clear();
        self.owners.resize(image_count, None);
    }

    /// Records `slot` as the owner of `image`.
    ///
    /// Returns the previous owner when it is a different slot, whose fence
    /// must be waited on before `image` is rendered to again.
    fn claim(&mut self, image: u32, slot: usize) -> Option<usize> {
        let index = image as usize;
        if index >= self.owners.len() {
            self.owners.resize(index + 1, None);
        }
        self.owners[index]
            .replace(slot)
            .filter(|&previous| previous != slot)
    }
}

/// Per-slot GPU operations a frame tick is made of.
trait FrameBackend {
    type Commands;

    fn wait_fence(&mut self, slot: usize) -> RhiResult<()>;
    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;
    /// Resets and begins the slot's command buffer, runs `record`, ends it.
    fn record<F>(&mut self, slot: usize, image_index: u32, record: F) -> RhiResult<()>
    where
        F: FnOnce(&Self::Commands, u32) -> RhiResult<()>;
    fn reset_fence(&mut self, slot: usize) -> RhiResult<()>;
    fn submit(&mut self, slot: usize) -> RhiResult<()>;
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome>;
}

/// The Vulkan objects one [`FrameExecutor::render_frame`] call works on.
struct VulkanFrame<'a> {
    device: &'a Device,
    slots: &'a [FrameSlot],
    swapchain: &'a Swapchain,
}

impl FrameBackend for VulkanFrame<'_> {
    type Commands = CommandBuffer;

    fn wait_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.slots[slot].sync.in_flight_fence().wait(u64::MAX)
    }

    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        self.swapchain
            .acquire_next(self.slots[slot].sync.image_available().handle(), u64::MAX)
    }

    fn record<F>(&mut self, slot: usize, image_index: u32, record: F) -> RhiResult<()>
    where
        F: FnOnce(&Self::Commands, u32) -> RhiResult<()>,
    {
        let cmd = &self.slots[slot].command_buffer;
        cmd.reset()?;
        cmd.begin()?;
        record(cmd, image_index)?;
        cmd.end()
    }

    fn reset_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.slots[slot].sync.in_flight_fence().reset()
    }

    fn submit(&mut self, slot: usize) -> RhiResult<()> {
        let slot = &self.slots[slot];
        let wait_semaphores = [slot.sync.image_available().handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [slot.sync.render_finished().handle()];
        let command_buffers = [slot.command_buffer.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the command buffer was just recorded and the fence reset
        unsafe {
            self.device
                .submit_graphics(&[submit_info], slot.sync.in_flight_fence().handle())
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.slots[slot].sync.render_finished().handle(),
        )
    }
}

/// CPU side of the frame loop: the current slot, image ownership and the
/// rebuild flag.
#[derive(Debug, Default)]
struct FrameCursor {
    images_in_flight: ImagesInFlight,
    current: usize,
    needs_rebuild: bool,
}

impl FrameCursor {
    fn new(image_count: usize) -> Self {
        Self {
            images_in_flight: ImagesInFlight::new(image_count),
            ..Self::default()
        }
    }

    /// Runs one tick: wait, acquire, record, submit, present, advance.
    ///
    /// The slot fence is reset right before submission, so every early
    /// return except a failed submit leaves it signaled.
    fn tick<B, F>(&mut self, backend: &mut B, record: F) -> RhiResult<FrameStatus>
    where
        B: FrameBackend,
        F: FnOnce(&B::Commands, u32) -> RhiResult<()>,
    {
        let slot = self.current;
        backend.wait_fence(slot)?;

        let image_index = match backend.acquire(slot)? {
            AcquireOutcome::Image(index) => index,
            AcquireOutcome::Retry => {
                warn!("Swapchain out of date on acquire, skipping frame");
                self.needs_rebuild = true;
                return Ok(FrameStatus::Skipped);
            }
        };

        if let Some(owner) = self.images_in_flight.claim(image_index, slot) {
            backend.wait_fence(owner)?;
        }

        if let Err(e) = backend.record(slot, image_index, record) {
            // The acquired image and its semaphore are left dangling
            self.needs_rebuild = true;
            return Err(e);
        }

        backend.reset_fence(slot)?;
        backend.submit(slot)?;

        if backend.present(slot, image_index)? == PresentOutcome::Retry {
            warn!("Swapchain out of date on present, scheduling rebuild");
            self.needs_rebuild = true;
        }

        self.current = (slot + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(FrameStatus::Presented)
    }
}

/// Drives acquire, record, submit and present for each frame.
pub struct FrameExecutor {
    device: Arc<Device>,
    slots: Vec<FrameSlot>,
    cursor: FrameCursor,
}

impl FrameExecutor {
    /// Creates [`MAX_FRAMES_IN_FLIGHT`] slots, allocating their command
    /// buffers from `command_pool`, for a swapchain with `image_count` images.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        image_count: usize,
    ) -> RhiResult<Self> {
        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for i in 0..MAX_FRAMES_IN_FLIGHT {
            slots.push(FrameSlot {
                command_buffer: CommandBuffer::new(device.clone(), command_pool)?,
                sync: FrameSyncSet::new(device.clone())?,
            });
            debug!("Created frame slot {}", i);
        }

        info!(
            "Frame executor created with {} frames in flight",
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            device,
            slots,
            cursor: FrameCursor::new(image_count),
        })
    }

    /// Renders one frame.
    ///
    /// `record` receives the slot's command buffer, already begun, and the
    /// acquired image index. It must not begin or end the buffer itself.
    ///
    /// # Errors
    ///
    /// Fence waits, command buffer errors, [`RhiError::AcquireError`],
    /// [`RhiError::SubmitError`], [`RhiError::PresentError`] and anything
    /// `record` returns. Stale swapchain results are not errors. A recording
    /// error schedules a rebuild. After a [`RhiError::SubmitError`] the slot
    /// fence never signals again and the executor can only be dropped.
    ///
    /// [`RhiError::AcquireError`]: e3d_rhi::RhiError::AcquireError
    /// [`RhiError::SubmitError`]: e3d_rhi::RhiError::SubmitError
    /// [`RhiError::PresentError`]: e3d_rhi::RhiError::PresentError
    pub fn render_frame<F>(&mut self, swapchain: &Swapchain, record: F) -> RhiResult<FrameStatus>
    where
        F: FnOnce(&CommandBuffer, u32) -> RhiResult<()>,
    {
        let mut frame = VulkanFrame {
            device: &self.device,
            slots: &self.slots,
            swapchain,
        };
        self.cursor.tick(&mut frame, record)
    }

    /// True once acquire or present reported a stale swapchain.
    #[inline]
    pub fn needs_rebuild(&self) -> bool {
        self.cursor.needs_rebuild
    }

    #[inline]
    pub fn clear_rebuild(&mut self) {
        self.cursor.needs_rebuild = false;
    }

    /// Resets image tracking for a rebuilt swapchain and replaces every slot's
    /// semaphores. The device must be idle.
    pub fn on_swapchain_recreated(&mut self, image_count: usize) -> RhiResult<()> {
        self.cursor.images_in_flight.reset(image_count);
        for slot in &mut self.slots {
            slot.sync.renew_semaphores(self.device.clone())?;
        }
        debug!(
            "Frame executor reset for {} swapchain image(s)",
            image_count
        );
        Ok(())
    }

    /// Blocks until every slot's last submission has completed.
    pub fn wait_all(&self) -> RhiResult<()> {
        let fences: Vec<vk::Fence> = self
            .slots
            .iter()
            .map(|slot| slot.sync.in_flight_fence().handle())
            .collect();

        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, u64::MAX)?;
        }
        Ok(())
    }
}
