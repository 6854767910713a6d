//! Mock implementations for testing
//!
//! Every mock shares one [`MockHw`] state so a test can assert the exact
//! order of hardware operations across peripherals, e.g. that the JPEG DMA
//! is stopped before the decoder is started.

use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use crate::board::{Peripherals, VideoBoard};
use crate::camera::{CameraConfig, CameraError, CameraSensor};
use crate::dma::{
    check_transfer_len, DmaAllocator, DmaChannel, DmaConfig, DmaDev, DmaError, DmaId, DmaWorkMode,
    DMA_CHANNEL_COUNT,
};
use crate::jpeg::{JpegDecoder, JpegEncConfig, JpegEncoder, JpegError};
use crate::lcd::{LcdClock, LcdDataFormat, LcdDisplay, LcdError, LcdGeometry, LcdInterface};
use crate::psram::{Psram, PsramConfig, PsramError};

/// RGB data FIFO address reported by [`MockLcd`].
pub const MOCK_RGB_FIFO: u32 = 0x4806_0044;

/// 8080 data FIFO address reported by [`MockLcd`].
pub const MOCK_I8080_FIFO: u32 = 0x4806_0048;

/// Encoder FIFO address reported by [`MockEncoder`].
pub const MOCK_JPEG_FIFO: u32 = 0x4803_0014;

/// One recorded hardware operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    /// Channel reserved for a device
    DmaAlloc(DmaDev, DmaId),
    /// Channel returned
    DmaFree(DmaDev, DmaId),
    /// Operation on one channel
    Dma(DmaId, DmaOp),
    /// Encoder operation
    Encoder(EncoderOp),
    /// Decoder operation
    Decoder(DecoderOp),
    /// Display operation
    Lcd(LcdOp),
    /// PSRAM controller operation
    Psram(PsramOp),
    /// Camera operation
    Camera(CameraOp),
}

/// DMA channel operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaOp {
    /// `init`
    Init(DmaConfig),
    /// `deinit`
    Deinit,
    /// `set_transfer_len`
    SetLen(u32),
    /// `set_src_start_addr`
    SetSrc(u32),
    /// `set_dst_start_addr`
    SetDst(u32),
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `enable_finish_interrupt`
    EnableIrq,
    /// `disable_finish_interrupt`
    DisableIrq,
}

/// Encoder operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderOp {
    /// `driver_init`
    DriverInit,
    /// `driver_deinit`
    DriverDeinit,
    /// `dvp_init`
    DvpInit(JpegEncConfig),
    /// `dvp_deinit`
    DvpDeinit,
    /// `set_enable`
    SetEnable(bool),
    /// `set_yuv_mode`
    SetYuvMode(bool),
}

/// Decoder operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderOp {
    /// `driver_init`
    DriverInit,
    /// `driver_deinit`
    DriverDeinit,
    /// `init`
    Init {
        /// Bitstream address
        src: u32,
        /// Output frame address
        dst: u32,
    },
    /// `start`
    Start,
}

/// Display operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdOp {
    /// `driver_init`
    DriverInit(LcdClock),
    /// `rgb_init`
    RgbInit(u8, LcdGeometry, LcdDataFormat),
    /// `i8080_init`
    I8080Init(LcdGeometry, LcdDataFormat),
    /// `pixel_config`
    PixelConfig(LcdGeometry),
    /// `display_enable`
    DisplayEnable(bool),
    /// `i8080_start_transfer`
    StartTransfer(bool),
    /// `i8080_write_cmd`
    WriteCmd(u8),
    /// `rgb_deinit`
    RgbDeinit,
    /// `i8080_deinit`
    I8080Deinit,
}

/// PSRAM operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsramOp {
    /// `init`
    Init(PsramConfig),
    /// `deinit`
    Deinit,
}

/// Camera operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraOp {
    /// `set_config`
    SetConfig(CameraConfig),
    /// `start`
    Start,
    /// `stop`
    Stop,
}

/// Operations a test can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `DmaAllocator::alloc` returns `NoFreeChannel`
    DmaAlloc,
    /// `DmaChannel::deinit` fails
    DmaDeinit,
    /// `JpegEncoder::dvp_init` fails
    EncoderDvpInit,
    /// `JpegDecoder::init` fails
    DecoderInit,
    /// `JpegDecoder::driver_deinit` fails
    DecoderDeinit,
    /// `LcdDisplay::rgb_deinit` fails
    LcdRgbDeinit,
    /// `Psram::init` fails
    PsramInit,
    /// `Psram::deinit` fails
    PsramDeinit,
    /// `CameraSensor::set_config` fails
    CameraConfig,
    /// `CameraSensor::stop` fails
    CameraStop,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    owner: Option<DmaDev>,
    config: Option<DmaConfig>,
    len: u32,
    src: u32,
    dst: u32,
    running: bool,
    irq: bool,
}

struct HwState {
    calls: Vec<HwCall>,
    channels: [ChannelState; DMA_CHANNEL_COUNT as usize],
    faults: Vec<Fault>,
    psram: Vec<u8>,
    psram_ready: bool,
    jpeg_frame_size: u32,
}

impl HwState {
    fn log(&mut self, call: HwCall) {
        self.calls.push(call);
    }

    fn faulted(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }
}

/// Shared handle to all mock peripherals.
#[derive(Clone)]
pub struct MockHw {
    state: Rc<RefCell<HwState>>,
}

impl MockHw {
    /// Fresh hardware with `psram_capacity` bytes of PSRAM.
    pub fn new(psram_capacity: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(HwState {
                calls: Vec::new(),
                channels: [ChannelState::default(); DMA_CHANNEL_COUNT as usize],
                faults: Vec::new(),
                psram: std::vec![0; psram_capacity],
                psram_ready: false,
                jpeg_frame_size: 0,
            })),
        }
    }

    /// Build the peripheral bundle backed by this state.
    pub fn peripherals(&self) -> Peripherals<MockBoard> {
        Peripherals {
            dma: MockDma { hw: self.clone() },
            encoder: MockEncoder { hw: self.clone() },
            decoder: MockDecoder { hw: self.clone() },
            lcd: MockLcd { hw: self.clone() },
            psram: MockPsram { hw: self.clone() },
            camera: MockCamera { hw: self.clone() },
        }
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<HwCall> {
        self.state.borrow().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Make `fault` fail until [`MockHw::clear_faults`].
    pub fn inject(&self, fault: Fault) {
        self.state.borrow_mut().faults.push(fault);
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.state.borrow_mut().faults.clear();
    }

    /// Size the encoder reports for the last frame.
    pub fn set_jpeg_frame_size(&self, size: u32) {
        self.state.borrow_mut().jpeg_frame_size = size;
    }

    /// Simulate the end of a transfer: single-mode channels stop.
    pub fn finish_dma(&self, id: DmaId) {
        let mut state = self.state.borrow_mut();
        if let Some(ch) = state.channels.get_mut(usize::from(id.index())) {
            if ch.config.map(|c| c.mode) == Some(DmaWorkMode::Single) {
                ch.running = false;
            }
        }
    }

    /// `true` while channel `id` is running.
    pub fn dma_running(&self, id: DmaId) -> bool {
        self.channel(id).is_some_and(|c| c.running)
    }

    /// Current source address of channel `id`.
    pub fn dma_src(&self, id: DmaId) -> Option<u32> {
        self.channel(id).map(|c| c.src)
    }

    /// Current destination address of channel `id`.
    pub fn dma_dst(&self, id: DmaId) -> Option<u32> {
        self.channel(id).map(|c| c.dst)
    }

    /// Channel currently owned by `dev`, if any.
    pub fn dma_owned_by(&self, dev: DmaDev) -> Option<DmaId> {
        let state = self.state.borrow();
        state
            .channels
            .iter()
            .position(|c| c.owner == Some(dev))
            .and_then(|i| u8::try_from(i).ok())
            .and_then(|i| DmaId::new(i).ok())
    }

    /// Copy of PSRAM contents at `offset`.
    pub fn psram_bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        let state = self.state.borrow();
        state
            .psram
            .get(offset..offset.saturating_add(len))
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    fn channel(&self, id: DmaId) -> Option<ChannelState> {
        self.state
            .borrow()
            .channels
            .get(usize::from(id.index()))
            .copied()
    }

    fn log(&self, call: HwCall) {
        self.state.borrow_mut().log(call);
    }

    fn faulted(&self, fault: Fault) -> bool {
        self.state.borrow().faulted(fault)
    }
}

/// Board whose peripherals are all mocks.
pub struct MockBoard;

impl VideoBoard for MockBoard {
    type DmaChannel = MockDmaChannel;
    type Dma = MockDma;
    type Encoder = MockEncoder;
    type Decoder = MockDecoder;
    type Lcd = MockLcd;
    type Psram = MockPsram;
    type Camera = MockCamera;
}

/// Mock DMA allocator
pub struct MockDma {
    hw: MockHw,
}

impl DmaAllocator for MockDma {
    type Channel = MockDmaChannel;

    fn alloc(&mut self, dev: DmaDev) -> Result<MockDmaChannel, DmaError> {
        if self.hw.faulted(Fault::DmaAlloc) {
            return Err(DmaError::NoFreeChannel);
        }
        let mut state = self.hw.state.borrow_mut();
        let slot = state
            .channels
            .iter()
            .position(|c| c.owner.is_none())
            .ok_or(DmaError::NoFreeChannel)?;
        let id = DmaId::new(u8::try_from(slot).map_err(|_| DmaError::InvalidChannel)?)?;
        if let Some(ch) = state.channels.get_mut(slot) {
            *ch = ChannelState {
                owner: Some(dev),
                ..ChannelState::default()
            };
        }
        state.log(HwCall::DmaAlloc(dev, id));
        Ok(MockDmaChannel {
            id,
            hw: self.hw.clone(),
        })
    }

    fn free(&mut self, dev: DmaDev, channel: MockDmaChannel) -> Result<(), DmaError> {
        let mut state = self.hw.state.borrow_mut();
        let ch = state
            .channels
            .get_mut(usize::from(channel.id.index()))
            .ok_or(DmaError::InvalidChannel)?;
        if ch.owner != Some(dev) {
            return Err(DmaError::InvalidChannel);
        }
        *ch = ChannelState::default();
        state.log(HwCall::DmaFree(dev, channel.id));
        Ok(())
    }
}

/// Mock DMA channel
pub struct MockDmaChannel {
    id: DmaId,
    hw: MockHw,
}

impl MockDmaChannel {
    fn update<R>(
        &mut self,
        op: DmaOp,
        f: impl FnOnce(&mut ChannelState) -> Result<R, DmaError>,
    ) -> Result<R, DmaError> {
        let mut state = self.hw.state.borrow_mut();
        state.log(HwCall::Dma(self.id, op));
        let ch = state
            .channels
            .get_mut(usize::from(self.id.index()))
            .ok_or(DmaError::InvalidChannel)?;
        f(ch)
    }
}

impl DmaChannel for MockDmaChannel {
    type Error = DmaError;

    fn id(&self) -> DmaId {
        self.id
    }

    fn init(&mut self, config: &DmaConfig) -> Result<(), DmaError> {
        config.validate()?;
        let config = *config;
        self.update(DmaOp::Init(config), |ch| {
            if ch.running {
                return Err(DmaError::Busy);
            }
            ch.config = Some(config);
            ch.src = config.src.start_addr;
            ch.dst = config.dst.start_addr;
            Ok(())
        })
    }

    fn deinit(&mut self) -> Result<(), DmaError> {
        let fail = self.hw.faulted(Fault::DmaDeinit);
        self.update(DmaOp::Deinit, |ch| {
            ch.running = false;
            ch.irq = false;
            ch.config = None;
            if fail {
                Err(DmaError::Busy)
            } else {
                Ok(())
            }
        })
    }

    fn set_transfer_len(&mut self, len: u32) -> Result<(), DmaError> {
        check_transfer_len(len)?;
        self.update(DmaOp::SetLen(len), |ch| {
            ch.len = len;
            Ok(())
        })
    }

    fn set_src_start_addr(&mut self, addr: u32) -> Result<(), DmaError> {
        self.update(DmaOp::SetSrc(addr), |ch| {
            ch.src = addr;
            Ok(())
        })
    }

    fn set_dst_start_addr(&mut self, addr: u32) -> Result<(), DmaError> {
        self.update(DmaOp::SetDst(addr), |ch| {
            ch.dst = addr;
            Ok(())
        })
    }

    fn start(&mut self) -> Result<(), DmaError> {
        self.update(DmaOp::Start, |ch| {
            if ch.config.is_none() || ch.len == 0 {
                return Err(DmaError::NotInitialized);
            }
            if ch.running {
                return Err(DmaError::Busy);
            }
            ch.running = true;
            Ok(())
        })
    }

    fn stop(&mut self) -> Result<(), DmaError> {
        self.update(DmaOp::Stop, |ch| {
            ch.running = false;
            Ok(())
        })
    }

    fn enable_finish_interrupt(&mut self) -> Result<(), DmaError> {
        self.update(DmaOp::EnableIrq, |ch| {
            ch.irq = true;
            Ok(())
        })
    }

    fn disable_finish_interrupt(&mut self) -> Result<(), DmaError> {
        self.update(DmaOp::DisableIrq, |ch| {
            ch.irq = false;
            Ok(())
        })
    }

    fn is_complete(&self) -> bool {
        !self.hw.dma_running(self.id)
    }

    fn transfer_len(&self) -> u32 {
        self.hw.channel(self.id).map_or(0, |c| c.len)
    }
}

/// Mock JPEG encoder
pub struct MockEncoder {
    hw: MockHw,
}

impl JpegEncoder for MockEncoder {
    type Error = JpegError;

    fn driver_init(&mut self) -> Result<(), JpegError> {
        self.hw.log(HwCall::Encoder(EncoderOp::DriverInit));
        Ok(())
    }

    fn driver_deinit(&mut self) -> Result<(), JpegError> {
        self.hw.log(HwCall::Encoder(EncoderOp::DriverDeinit));
        Ok(())
    }

    fn dvp_init(&mut self, config: &JpegEncConfig) -> Result<(), JpegError> {
        self.hw.log(HwCall::Encoder(EncoderOp::DvpInit(*config)));
        if self.hw.faulted(Fault::EncoderDvpInit) {
            return Err(JpegError::NotInitialized);
        }
        config.validate()
    }

    fn dvp_deinit(&mut self) -> Result<(), JpegError> {
        self.hw.log(HwCall::Encoder(EncoderOp::DvpDeinit));
        Ok(())
    }

    fn set_enable(&mut self, enable: bool) -> Result<(), JpegError> {
        self.hw.log(HwCall::Encoder(EncoderOp::SetEnable(enable)));
        Ok(())
    }

    fn set_yuv_mode(&mut self, yuv: bool) -> Result<(), JpegError> {
        self.hw.log(HwCall::Encoder(EncoderOp::SetYuvMode(yuv)));
        Ok(())
    }

    fn frame_size(&self) -> u32 {
        self.hw.state.borrow().jpeg_frame_size
    }

    fn fifo_addr(&self) -> u32 {
        MOCK_JPEG_FIFO
    }
}

/// Mock JPEG decoder
pub struct MockDecoder {
    hw: MockHw,
}

impl JpegDecoder for MockDecoder {
    type Error = JpegError;

    fn driver_init(&mut self) -> Result<(), JpegError> {
        self.hw.log(HwCall::Decoder(DecoderOp::DriverInit));
        Ok(())
    }

    fn driver_deinit(&mut self) -> Result<(), JpegError> {
        self.hw.log(HwCall::Decoder(DecoderOp::DriverDeinit));
        if self.hw.faulted(Fault::DecoderDeinit) {
            return Err(JpegError::Busy);
        }
        Ok(())
    }

    fn init(&mut self, src_addr: u32, dst_addr: u32) -> Result<(), JpegError> {
        self.hw.log(HwCall::Decoder(DecoderOp::Init {
            src: src_addr,
            dst: dst_addr,
        }));
        if self.hw.faulted(Fault::DecoderInit) {
            return Err(JpegError::Corrupt);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), JpegError> {
        self.hw.log(HwCall::Decoder(DecoderOp::Start));
        Ok(())
    }
}

/// Mock display controller
pub struct MockLcd {
    hw: MockHw,
}

impl LcdDisplay for MockLcd {
    type Error = LcdError;

    fn driver_init(&mut self, clock: LcdClock) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::DriverInit(clock)));
        Ok(())
    }

    fn rgb_init(
        &mut self,
        clk_div: u8,
        geometry: LcdGeometry,
        format: LcdDataFormat,
    ) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::RgbInit(clk_div, geometry, format)));
        Ok(())
    }

    fn i8080_init(&mut self, geometry: LcdGeometry, format: LcdDataFormat) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::I8080Init(geometry, format)));
        Ok(())
    }

    fn pixel_config(&mut self, geometry: LcdGeometry) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::PixelConfig(geometry)));
        Ok(())
    }

    fn display_enable(&mut self, enable: bool) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::DisplayEnable(enable)));
        Ok(())
    }

    fn i8080_start_transfer(&mut self, start: bool) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::StartTransfer(start)));
        Ok(())
    }

    fn i8080_write_cmd(&mut self, cmd: u8) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::WriteCmd(cmd)));
        Ok(())
    }

    fn rgb_deinit(&mut self) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::RgbDeinit));
        if self.hw.faulted(Fault::LcdRgbDeinit) {
            return Err(LcdError::NotInitialized);
        }
        Ok(())
    }

    fn i8080_deinit(&mut self) -> Result<(), LcdError> {
        self.hw.log(HwCall::Lcd(LcdOp::I8080Deinit));
        Ok(())
    }

    fn data_fifo_addr(&self, interface: LcdInterface) -> u32 {
        match interface {
            LcdInterface::Rgb => MOCK_RGB_FIFO,
            LcdInterface::I8080 => MOCK_I8080_FIFO,
        }
    }
}

/// Mock PSRAM backed by a heap buffer
pub struct MockPsram {
    hw: MockHw,
}

impl MockPsram {
    fn range(&self, offset: usize, len: usize) -> Result<core::ops::Range<usize>, PsramError> {
        let state = self.hw.state.borrow();
        if !state.psram_ready {
            return Err(PsramError::NotInitialized);
        }
        let end = offset.checked_add(len).ok_or(PsramError::OutOfBounds)?;
        if end > state.psram.len() {
            return Err(PsramError::OutOfBounds);
        }
        Ok(offset..end)
    }
}

impl Psram for MockPsram {
    type Error = PsramError;

    fn init(&mut self, config: PsramConfig) -> Result<(), PsramError> {
        self.hw.log(HwCall::Psram(PsramOp::Init(config)));
        if self.hw.faulted(Fault::PsramInit) {
            return Err(PsramError::NotInitialized);
        }
        self.hw.state.borrow_mut().psram_ready = true;
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), PsramError> {
        self.hw.log(HwCall::Psram(PsramOp::Deinit));
        self.hw.state.borrow_mut().psram_ready = false;
        if self.hw.faulted(Fault::PsramDeinit) {
            return Err(PsramError::NotInitialized);
        }
        Ok(())
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), PsramError> {
        let range = self.range(offset, buf.len())?;
        let state = self.hw.state.borrow();
        let src = state.psram.get(range).ok_or(PsramError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), PsramError> {
        let range = self.range(offset, data.len())?;
        let mut state = self.hw.state.borrow_mut();
        let dst = state.psram.get_mut(range).ok_or(PsramError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<(), PsramError> {
        let range = self.range(offset, len)?;
        let mut state = self.hw.state.borrow_mut();
        let dst = state.psram.get_mut(range).ok_or(PsramError::OutOfBounds)?;
        dst.fill(byte);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.hw.state.borrow().psram.len()
    }
}

/// Mock camera sensor
pub struct MockCamera {
    hw: MockHw,
}

impl CameraSensor for MockCamera {
    type Error = CameraError;

    fn set_config(&mut self, config: &CameraConfig) -> Result<(), CameraError> {
        self.hw.log(HwCall::Camera(CameraOp::SetConfig(*config)));
        if self.hw.faulted(Fault::CameraConfig) {
            return Err(CameraError::NoAck);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.hw.log(HwCall::Camera(CameraOp::Start));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CameraError> {
        self.hw.log(HwCall::Camera(CameraOp::Stop));
        if self.hw.faulted(Fault::CameraStop) {
            return Err(CameraError::NoAck);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_dma_alloc_exhausts() {
        let hw = MockHw::new(0);
        let mut dma = hw.peripherals().dma;
        let mut held = Vec::new();
        for _ in 0..DMA_CHANNEL_COUNT {
            held.push(dma.alloc(DmaDev::LcdData).unwrap());
        }
        assert_eq!(dma.alloc(DmaDev::Jpeg).err(), Some(DmaError::NoFreeChannel));
        let first = held.remove(0);
        dma.free(DmaDev::LcdData, first).unwrap();
        assert!(dma.alloc(DmaDev::Jpeg).is_ok());
    }

    #[test]
    fn test_mock_dma_start_requires_init() {
        let hw = MockHw::new(0);
        let mut dma = hw.peripherals().dma;
        let mut ch = dma.alloc(DmaDev::LcdData).unwrap();
        assert_eq!(ch.start(), Err(DmaError::NotInitialized));
    }

    #[test]
    fn test_mock_dma_single_mode_stops_on_finish() {
        use crate::dma::DmaEndpoint;

        let hw = MockHw::new(0);
        let mut dma = hw.peripherals().dma;
        let mut ch = dma.alloc(DmaDev::LcdData).unwrap();
        ch.init(&DmaConfig {
            mode: DmaWorkMode::Single,
            priority: 0,
            src: DmaEndpoint::memory(0x6000_0000),
            dst: DmaEndpoint::memory(0x6005_0000),
        })
        .unwrap();
        ch.set_transfer_len(640).unwrap();
        ch.start().unwrap();
        assert_eq!(ch.start(), Err(DmaError::Busy));
        assert!(!ch.is_complete());
        hw.finish_dma(ch.id());
        assert!(ch.is_complete());
    }

    #[test]
    fn test_owned_transfer_returns_buffer_and_channel() {
        use crate::dma::{DmaEndpoint, DmaTransfer};

        let hw = MockHw::new(0);
        let mut dma = hw.peripherals().dma;
        let mut ch = dma.alloc(DmaDev::Uart).unwrap();
        ch.init(&DmaConfig {
            mode: DmaWorkMode::Single,
            priority: 0,
            src: DmaEndpoint::memory(0x3000_0000),
            dst: DmaEndpoint::memory(0x3000_1000),
        })
        .unwrap();
        let id = ch.id();
        let buf: &[u8] = &[0u8; 64];

        // SAFETY: the channel above was configured for this buffer and the
        // mock never touches memory.
        let active = unsafe { DmaTransfer::new(buf, ch) }.start().unwrap();
        assert!(!active.is_complete());
        assert_eq!(hw.calls().last(), Some(&HwCall::Dma(id, DmaOp::Start)));

        hw.finish_dma(id);
        let (buf, ch) = embassy_futures::block_on(active.wait()).unwrap();
        assert_eq!(buf.len(), 64);
        assert_eq!(ch.transfer_len(), 64);
        assert!(ch.is_complete());
    }

    #[test]
    fn test_mock_psram_bounds() {
        let hw = MockHw::new(16);
        let mut psram = hw.peripherals().psram;
        assert_eq!(psram.write(0, &[1]), Err(PsramError::NotInitialized));
        psram.init(PsramConfig::DEFAULT).unwrap();
        psram.write(12, &[1, 2, 3, 4]).unwrap();
        assert_eq!(psram.write(14, &[1, 2, 3]), Err(PsramError::OutOfBounds));
        assert_eq!(hw.psram_bytes(12, 4), std::vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_calls_are_ordered_across_devices() {
        let hw = MockHw::new(0);
        let mut p = hw.peripherals();
        p.lcd.driver_init(LcdClock::Mhz96).unwrap();
        p.encoder.set_enable(false).unwrap();
        assert_eq!(
            hw.calls(),
            std::vec![
                HwCall::Lcd(LcdOp::DriverInit(LcdClock::Mhz96)),
                HwCall::Encoder(EncoderOp::SetEnable(false)),
            ]
        );
    }
}
