//! DMA abstraction layer
//!
//! The BK7256 general-purpose DMA has six channels. Each channel moves data
//! between two endpoints (memory or a peripheral FIFO) in either single or
//! repeat mode and raises a finish interrupt when its programmed length has
//! been transferred. Channels are handed out by a [`DmaAllocator`] keyed on
//! the peripheral that will use them.
//!
//! The ownership wrapper [`DmaTransfer`] moves a buffer and a channel into
//! the transfer so neither can be touched while the engine owns the memory.

use core::marker::PhantomData;

/// Number of general-purpose DMA channels.
pub const DMA_CHANNEL_COUNT: u8 = 6;

/// Largest length a single transfer can be programmed with, in bytes.
pub const MAX_TRANSFER_LEN: u32 = 65_536;

/// Highest channel priority accepted by the arbiter.
pub const MAX_PRIORITY: u8 = 7;

/// DMA channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct DmaId(u8);

impl DmaId {
    /// Create a channel id, rejecting indices past the last channel.
    pub fn new(index: u8) -> Result<Self, DmaError> {
        if index < DMA_CHANNEL_COUNT {
            Ok(Self(index))
        } else {
            Err(DmaError::InvalidChannel)
        }
    }

    /// Raw channel index.
    #[must_use]
    pub fn index(self) -> u8 {
        self.0
    }
}

/// Device on one side of a DMA transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DmaDev {
    /// Plain memory (SRAM, PSRAM). The vendor headers call this "DTCM".
    Dtcm,
    /// JPEG encoder output FIFO
    Jpeg,
    /// LCD data FIFO (8080 or RGB)
    LcdData,
    /// DVP camera input
    Dvp,
    /// UART FIFO
    Uart,
    /// Audio codec FIFO
    Audio,
}

/// Channel work mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DmaWorkMode {
    /// Stop after the programmed length
    Single,
    /// Restart automatically after the programmed length
    Repeat,
}

/// Bus width of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DmaDataWidth {
    /// 8-bit accesses
    Bits8,
    /// 16-bit accesses
    Bits16,
    /// 32-bit accesses
    Bits32,
}

impl DmaDataWidth {
    /// Access size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Bits8 => 1,
            Self::Bits16 => 2,
            Self::Bits32 => 4,
        }
    }
}

/// One side of a DMA transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DmaEndpoint {
    /// Device kind
    pub dev: DmaDev,
    /// Access width
    pub width: DmaDataWidth,
    /// First address of the transfer window
    pub start_addr: u32,
    /// End of the loop window; only meaningful with `addr_loop`
    pub end_addr: u32,
    /// Increment the address after each access
    pub addr_inc: bool,
    /// Wrap back to `start_addr` on reaching `end_addr`
    pub addr_loop: bool,
}

impl DmaEndpoint {
    /// Incrementing memory endpoint.
    #[must_use]
    pub const fn memory(start_addr: u32) -> Self {
        Self {
            dev: DmaDev::Dtcm,
            width: DmaDataWidth::Bits32,
            start_addr,
            end_addr: 0,
            addr_inc: true,
            addr_loop: false,
        }
    }

    /// Fixed-address peripheral FIFO endpoint.
    #[must_use]
    pub const fn fifo(dev: DmaDev, fifo_addr: u32, width: DmaDataWidth) -> Self {
        Self {
            dev,
            width,
            start_addr: fifo_addr,
            end_addr: 0,
            addr_inc: false,
            addr_loop: false,
        }
    }

    /// Make this endpoint loop over `[start_addr, start_addr + len)`.
    #[must_use]
    pub const fn looping(mut self, len: u32) -> Self {
        self.end_addr = self.start_addr.wrapping_add(len);
        self.addr_loop = true;
        self
    }

    #[allow(clippy::arithmetic_side_effects)] // Safety: width.bytes() is 1, 2 or 4, never zero
    fn validate(&self) -> Result<(), DmaError> {
        if self.start_addr % self.width.bytes() != 0 {
            return Err(DmaError::InvalidConfig);
        }
        if self.addr_loop && self.end_addr <= self.start_addr {
            return Err(DmaError::InvalidConfig);
        }
        Ok(())
    }
}

/// Full channel configuration, applied with [`DmaChannel::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DmaConfig {
    /// Work mode
    pub mode: DmaWorkMode,
    /// Arbiter priority, 0..=7
    pub priority: u8,
    /// Source endpoint
    pub src: DmaEndpoint,
    /// Destination endpoint
    pub dst: DmaEndpoint,
}

impl DmaConfig {
    /// Check the configuration against what the controller accepts.
    ///
    /// A repeat-mode transfer whose memory side loops needs a real loop
    /// window; without one the engine moves a few words and halts.
    pub fn validate(&self) -> Result<(), DmaError> {
        if self.priority > MAX_PRIORITY {
            return Err(DmaError::InvalidConfig);
        }
        self.src.validate()?;
        self.dst.validate()?;
        Ok(())
    }
}

/// DMA errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// Every channel is already allocated
    NoFreeChannel,
    /// Channel index out of range or not owned by the caller
    InvalidChannel,
    /// Channel used before `init`
    NotInitialized,
    /// Configuration rejected by [`DmaConfig::validate`]
    InvalidConfig,
    /// Transfer length is zero or above [`MAX_TRANSFER_LEN`]
    TransferTooLong,
    /// Channel is running
    Busy,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoFreeChannel => write!(f, "no free DMA channel"),
            Self::InvalidChannel => write!(f, "invalid DMA channel"),
            Self::NotInitialized => write!(f, "DMA channel not initialized"),
            Self::InvalidConfig => write!(f, "invalid DMA configuration"),
            Self::TransferTooLong => write!(f, "DMA transfer length out of range"),
            Self::Busy => write!(f, "DMA channel busy"),
        }
    }
}

/// Check a transfer length against the controller limit.
pub fn check_transfer_len(len: u32) -> Result<(), DmaError> {
    if len == 0 || len > MAX_TRANSFER_LEN {
        Err(DmaError::TransferTooLong)
    } else {
        Ok(())
    }
}

/// DMA channel abstraction
///
/// All methods are callable from interrupt context: none of them block.
pub trait DmaChannel {
    /// Error type
    type Error: core::fmt::Debug + From<DmaError>;

    /// Channel index
    fn id(&self) -> DmaId;

    /// Apply a configuration. The channel must be stopped.
    fn init(&mut self, config: &DmaConfig) -> Result<(), Self::Error>;

    /// Release the configuration and stop the channel
    fn deinit(&mut self) -> Result<(), Self::Error>;

    /// Program the number of bytes moved per start
    fn set_transfer_len(&mut self, len: u32) -> Result<(), Self::Error>;

    /// Move the source window
    fn set_src_start_addr(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Move the destination window
    fn set_dst_start_addr(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Start a transfer
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Stop a transfer
    fn stop(&mut self) -> Result<(), Self::Error>;

    /// Raise the finish interrupt at the end of each transfer
    fn enable_finish_interrupt(&mut self) -> Result<(), Self::Error>;

    /// Mask the finish interrupt
    fn disable_finish_interrupt(&mut self) -> Result<(), Self::Error>;

    /// Check if transfer is complete
    fn is_complete(&self) -> bool;

    /// Currently programmed transfer length
    fn transfer_len(&self) -> u32;
}

/// Hands out channels per peripheral.
pub trait DmaAllocator {
    /// Channel type produced by this allocator
    type Channel: DmaChannel;

    /// Reserve a free channel for `dev`.
    fn alloc(&mut self, dev: DmaDev) -> Result<Self::Channel, DmaError>;

    /// Return a channel previously reserved for `dev`.
    fn free(&mut self, dev: DmaDev, channel: Self::Channel) -> Result<(), DmaError>;
}

/// DMA transfer that owns its buffer
pub struct DmaTransfer<B, C> {
    buffer: B,
    channel: C,
    _phantom: PhantomData<B>,
}

impl<B, C> DmaTransfer<B, C>
where
    B: DmaBuffer,
    C: DmaChannel,
{
    /// Create a new DMA transfer
    ///
    /// # Safety
    ///
    /// The channel must already be configured to read from or write to
    /// `buffer`, and the buffer must live in a DMA-reachable region
    /// (see [`crate::dma_safety`]).
    pub unsafe fn new(buffer: B, channel: C) -> Self {
        Self {
            buffer,
            channel,
            _phantom: PhantomData,
        }
    }

    /// Program the length from the buffer and start the transfer
    pub fn start(mut self) -> Result<DmaTransferActive<B, C>, C::Error> {
        let len = u32::try_from(self.buffer.len()).map_err(|_| DmaError::TransferTooLong)?;
        check_transfer_len(len)?;
        self.channel.set_transfer_len(len)?;
        self.channel.start()?;
        Ok(DmaTransferActive {
            buffer: self.buffer,
            channel: self.channel,
        })
    }
}

/// Active DMA transfer
pub struct DmaTransferActive<B, C> {
    buffer: B,
    channel: C,
}

impl<B, C> DmaTransferActive<B, C>
where
    C: DmaChannel,
{
    /// Wait for transfer to complete, yielding to the Embassy executor on each
    /// poll so that other tasks can run while the DMA transfer is in flight.
    pub async fn wait(mut self) -> Result<(B, C), C::Error> {
        while !self.channel.is_complete() {
            embassy_futures::yield_now().await;
        }
        self.channel.stop()?;
        Ok((self.buffer, self.channel))
    }

    /// Check if complete without blocking
    pub fn is_complete(&self) -> bool {
        self.channel.is_complete()
    }
}

/// DMA buffer trait (read-only access)
pub trait DmaBuffer {
    /// Get buffer pointer
    fn as_ptr(&self) -> *const u8;

    /// Get buffer length
    fn len(&self) -> usize;

    /// Check if buffer is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// DMA buffer trait (read-write access)
pub trait DmaBufferMut: DmaBuffer {
    /// Get mutable buffer pointer
    fn as_mut_ptr(&mut self) -> *mut u8;
}

impl DmaBuffer for &[u8] {
    fn as_ptr(&self) -> *const u8 {
        (*self).as_ptr()
    }

    fn len(&self) -> usize {
        (*self).len()
    }
}

impl DmaBuffer for &mut [u8] {
    fn as_ptr(&self) -> *const u8 {
        (**self).as_ptr()
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

impl DmaBufferMut for &mut [u8] {
    fn as_mut_ptr(&mut self) -> *mut u8 {
        (**self).as_mut_ptr()
    }
}
