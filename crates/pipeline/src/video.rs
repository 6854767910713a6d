//! Video pipeline glue
//!
//! [`VideoPipeline`] owns the peripherals of one board and reacts to their
//! interrupts. Every handler is short and non-blocking so it can run from
//! the ISR that produced the event:
//!
//! ```text
//!  camera ──DVP──► JPEG encoder ──FIFO──► JPEG DMA ──► SRAM bitstream
//!                       │                                   │
//!                   (yuv_mode)                         JPEG decoder
//!                       ▼                                   ▼
//!                 PSRAM display frame ◄──── back ──── PingPong ──── front
//!                                                               │
//!                                LCD FIFO ◄── LCD DMA (segment chain)
//! ```
//!
//! Life cycle: [`VideoPipeline::open`] powers the blocks and launches the
//! warm-up DMA pass, [`VideoPipeline::start`] brings the panel and camera
//! up once the pass finished, [`VideoPipeline::handle`] runs per interrupt
//! and [`VideoPipeline::close`] tears everything down.

use core::fmt;

use bk_platform::board::{Peripherals, VideoBoard};
use bk_platform::camera::CameraSensor;
use bk_platform::config::{I8080_WARMUP_LEN, SOLID_COLOR_PATTERN_BYTES};
use bk_platform::dma::{
    DmaAllocator, DmaChannel, DmaConfig, DmaDataWidth, DmaDev, DmaEndpoint, DmaError, DmaId,
    DmaWorkMode,
};
use bk_platform::dma_safety::{JPEG_BITSTREAM_ADDR, JPEG_BITSTREAM_BYTES};
use bk_platform::jpeg::{JpegDecoder, JpegEncEvent, JpegEncoder};
use bk_platform::lcd::{LcdDisplay, LcdInt, LcdInterface, RAM_WRITE};
use bk_platform::psram::{Psram, PsramLayout};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};
use embassy_time::Instant;

use crate::config::{ConfigError, PipelineConfig, PipelineMode};
use crate::error::{PipelineError, Result};
use crate::frame_buffer::{FrameBufferError, FrameId, FrameModule, FramePool, FrameType};
use crate::pacing::{FramePacer, PaceDecision};
use crate::pingpong::{Handoff, PingPong};
use crate::segment::{SegmentChain, SegmentStep};

/// Foreground rows are blended through stack buffers of this size.
const BLEND_CHUNK: usize = 256;

/// Arbiter priority of every pipeline channel.
const DMA_PRIORITY: u8 = 0;

/// Interrupt sources the pipeline reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineEvent {
    /// Finish interrupt of a DMA channel
    DmaFinished(DmaId),
    /// Encoder interrupt
    JpegEnc(JpegEncEvent),
    /// Decoder finished one MCU
    JpegDecMcu,
    /// Decoder finished the frame
    JpegDecComplete,
    /// Display interrupt
    Lcd(LcdInt),
}

/// Life-cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineState {
    /// Nothing powered
    Closed,
    /// Blocks powered, warm-up DMA pass in flight or done
    WarmingUp,
    /// Streaming to the panel
    Running,
    /// Streaming halted; [`VideoPipeline::close`] still required
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::WarmingUp => write!(f, "warming up"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Encoded frame written into a PSRAM JPEG slot by a capture.
///
/// The slot stays locked until [`VideoPipeline::release_capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapturedFrame {
    /// Pool slot holding the bitstream
    pub frame: FrameId,
    /// Bitstream address
    pub addr: u32,
    /// Bitstream length in bytes
    pub size: u32,
    /// Capture number, starting at 0
    pub sequence: u32,
}

/// Captures the channel buffers before further ones are dropped.
pub const CAPTURE_DEPTH: usize = 4;

/// Channel that receives [`CapturedFrame`]s.
pub type CaptureChannel = Channel<CriticalSectionRawMutex, CapturedFrame, CAPTURE_DEPTH>;

/// Sending half handed to [`VideoPipeline::set_capture_sink`].
pub type CaptureSender = Sender<'static, CriticalSectionRawMutex, CapturedFrame, CAPTURE_DEPTH>;

/// Counters since [`VideoPipeline::open`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineStats {
    /// Frames fully pushed to the panel
    pub frames_displayed: u32,
    /// LCD DMA segments completed while running
    pub segments: u32,
    /// RGB end-of-frame interrupts
    pub lcd_eof: u32,
    /// Frames the decoder finished
    pub frames_decoded: u32,
    /// Camera frames skipped by pacing or a busy decoder
    pub frames_dropped: u32,
    /// Decoded frames overwritten before the panel showed them
    pub frames_replaced: u32,
    /// Decodes that ended with fewer MCUs than the frame holds
    pub short_decodes: u32,
    /// Frames captured
    pub captures: u32,
    /// Captures lost to a full or missing sink
    pub capture_overruns: u32,
    /// Events ignored in the current state or for foreign channels
    pub spurious: u32,
    /// Handler errors
    pub errors: u32,
    /// Presented frames over the last pacing window
    pub measured_fps: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Powered {
    encoder: bool,
    decoder: bool,
    dvp: bool,
    camera: bool,
    psram: bool,
    lcd: Option<LcdInterface>,
}

#[derive(Debug, Clone, Copy, Default)]
struct McuCount {
    expected: u32,
    seen: u32,
}

fn bump(counter: &mut u32) {
    *counter = counter.saturating_add(1);
}

fn keep_first<E: Into<PipelineError>>(
    first: &mut Option<PipelineError>,
    step: &'static str,
    result: core::result::Result<(), E>,
) {
    if let Err(e) = result {
        let e = e.into();
        warn!("video: {} failed: {}", step, e);
        first.get_or_insert(e);
    }
}

/// Copy every YUYV pixel pair of `fg` that differs from `key` over `bg`.
///
/// Slices are walked in 4-byte macro-pixels; a trailing partial pair is
/// left untouched.
pub fn blend_yuyv(bg: &mut [u8], fg: &[u8], key: [u8; 4]) {
    for (b, f) in bg.chunks_exact_mut(4).zip(fg.chunks_exact(4)) {
        if f != key.as_slice() {
            b.copy_from_slice(f);
        }
    }
}

/// The pipeline.
pub struct VideoPipeline<B: VideoBoard> {
    hw: Peripherals<B>,
    config: Option<PipelineConfig>,
    state: PipelineState,
    powered: Powered,
    lcd_dma: Option<B::DmaChannel>,
    jpeg_dma: Option<B::DmaChannel>,
    chain: Option<SegmentChain>,
    frames: PingPong<u32>,
    warmed_up: bool,
    lcd_running: bool,
    lcd_pending: bool,
    decoding: bool,
    mcu: McuCount,
    foreground_loaded: bool,
    pool: FramePool,
    capture_slot: Option<FrameId>,
    capture_in_flight: bool,
    capture_tx: Option<CaptureSender>,
    pacer: Option<FramePacer>,
    eof_count: u32,
    stats: PipelineStats,
}

impl<B: VideoBoard> VideoPipeline<B> {
    /// Take ownership of the board peripherals. Nothing is powered yet.
    pub fn new(hw: Peripherals<B>) -> Self {
        Self {
            hw,
            config: None,
            state: PipelineState::Closed,
            powered: Powered::default(),
            lcd_dma: None,
            jpeg_dma: None,
            chain: None,
            frames: PingPong::new(0, 0),
            warmed_up: false,
            lcd_running: false,
            lcd_pending: false,
            decoding: false,
            mcu: McuCount::default(),
            foreground_loaded: false,
            pool: FramePool::new(),
            capture_slot: None,
            capture_in_flight: false,
            capture_tx: None,
            pacer: None,
            eof_count: 0,
            stats: PipelineStats::default(),
        }
    }

    /// Where captured frames go. Without a sink every capture is an overrun.
    pub fn set_capture_sink(&mut self, tx: CaptureSender) {
        self.capture_tx = Some(tx);
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Counters since the last open.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_replaced: self.frames.replaced(),
            measured_fps: self.pacer.as_ref().map_or(0, FramePacer::measured_fps),
            ..self.stats
        }
    }

    /// Configuration of the open pipeline.
    pub fn config(&self) -> Option<&PipelineConfig> {
        self.config.as_ref()
    }

    /// `true` once the warm-up DMA pass has walked the whole frame.
    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    /// Channel feeding the LCD FIFO.
    pub fn lcd_channel(&self) -> Option<DmaId> {
        self.lcd_dma.as_ref().map(|c| c.id())
    }

    /// Channel draining the encoder FIFO.
    pub fn jpeg_channel(&self) -> Option<DmaId> {
        self.jpeg_dma.as_ref().map(|c| c.id())
    }

    /// Hand the peripherals back. Fails unless the pipeline is closed.
    pub fn into_peripherals(self) -> core::result::Result<Peripherals<B>, Self> {
        if self.state == PipelineState::Closed && self.powered == Powered::default() {
            Ok(self.hw)
        } else {
            Err(self)
        }
    }

    fn active_config(&self) -> Result<PipelineConfig> {
        self.config.ok_or(PipelineError::InvalidState(self.state))
    }

    fn lcd_dma(&mut self) -> Result<&mut B::DmaChannel> {
        self.lcd_dma
            .as_mut()
            .ok_or(PipelineError::InvalidState(self.state))
    }

    // ── open ────────────────────────────────────────────────────────────

    /// Power the blocks for `config` and launch the warm-up DMA pass.
    ///
    /// Segmented modes copy one short block per segment from the frame to a
    /// scratch area, walking the same chain the panel transfer uses later;
    /// [`VideoPipeline::start`] is refused until that pass completes. On any
    /// failure everything already powered is torn down again.
    pub fn open(&mut self, config: &PipelineConfig) -> Result<()> {
        if self.state != PipelineState::Closed {
            return Err(PipelineError::InvalidState(self.state));
        }
        config.validate()?;

        self.config = Some(*config);
        self.stats = PipelineStats::default();
        let [front, back] = config.frames;
        self.frames = PingPong::new(front.addr(), back.addr());
        self.pacer = config.display_fps.map(FramePacer::new);
        self.pool.reset();
        if config.mode == PipelineMode::JpegCapture {
            self.pool.register(FrameModule::Capture);
        }

        if let Err(e) = self.power_up(config) {
            error!("video: open failed: {}", e);
            // The open error is the one worth reporting.
            let _ = self.close();
            return Err(e);
        }
        self.state = PipelineState::WarmingUp;
        info!("video: open {}", config.mode);
        Ok(())
    }

    fn power_up(&mut self, config: &PipelineConfig) -> Result<()> {
        let mode = config.mode;
        if mode.uses_camera() {
            self.hw.encoder.driver_init()?;
            self.powered.encoder = true;
        }
        if mode.uses_jpeg() {
            self.hw.decoder.driver_init()?;
            self.powered.decoder = true;
            // A bad frame size would only surface at the first decode.
            self.mcu.expected = config.jpeg.mcu_geometry()?.total();
        }
        self.hw.psram.init(config.psram)?;
        self.powered.psram = true;
        self.hw.lcd.driver_init(config.clock)?;

        let channel = self.hw.dma.alloc(DmaDev::LcdData)?;
        debug!("video: LCD DMA on channel {}", channel.id());
        self.lcd_dma = Some(channel);

        if mode.segmented() {
            self.launch_warmup(config)
        } else {
            self.prepare_solid_color(config)
        }
    }

    fn launch_warmup(&mut self, config: &PipelineConfig) -> Result<()> {
        let base = *self.frames.front();
        let scratch = config.warmup_scratch()?.addr();
        self.chain = Some(SegmentChain::new(
            base,
            config.segment_len,
            config.segment_count,
        )?);
        self.warmed_up = false;

        let ch = self.lcd_dma()?;
        ch.init(&DmaConfig {
            mode: DmaWorkMode::Single,
            priority: DMA_PRIORITY,
            src: DmaEndpoint::memory(base),
            dst: DmaEndpoint::memory(scratch),
        })?;
        ch.set_transfer_len(I8080_WARMUP_LEN)?;
        ch.enable_finish_interrupt()?;
        ch.start()?;
        Ok(())
    }

    fn prepare_solid_color(&mut self, config: &PipelineConfig) -> Result<()> {
        let frame = config.frames[0];
        let word = config.solid_color.color.to_le_bytes();
        let mut pattern = [0u8; SOLID_COLOR_PATTERN_BYTES as usize];
        for chunk in pattern.chunks_exact_mut(4) {
            chunk.copy_from_slice(&word);
        }
        self.hw.psram.write(frame.offset, &pattern)?;

        let fifo = self.hw.lcd.data_fifo_addr(LcdInterface::Rgb);
        let ch = self.lcd_dma()?;
        ch.init(&DmaConfig {
            mode: DmaWorkMode::Repeat,
            priority: DMA_PRIORITY,
            src: DmaEndpoint::memory(frame.addr()).looping(SOLID_COLOR_PATTERN_BYTES),
            dst: DmaEndpoint {
                addr_inc: true,
                ..DmaEndpoint::fifo(DmaDev::LcdData, fifo, DmaDataWidth::Bits32).looping(4)
            },
        })?;
        ch.set_transfer_len(SOLID_COLOR_PATTERN_BYTES)?;
        self.warmed_up = true;
        Ok(())
    }

    /// Copy a YUYV foreground image into PSRAM for [`PipelineMode::YuvBlend`].
    ///
    /// `image` must hold exactly `width * height * 2` bytes of the
    /// configured blend rectangle. Blending starts with the next frame.
    pub fn load_foreground(&mut self, image: &[u8]) -> Result<()> {
        if self.state == PipelineState::Closed {
            return Err(PipelineError::InvalidState(self.state));
        }
        let config = self.active_config()?;
        if image.len() != config.blend.image_bytes() {
            return Err(ConfigError::BlendOutOfFrame.into());
        }
        self.hw.psram.write(PsramLayout::FOREGROUND.offset, image)?;
        self.foreground_loaded = true;
        Ok(())
    }

    // ── start / stop ────────────────────────────────────────────────────

    /// Bring up the panel interface and the camera path.
    ///
    /// Requires a finished warm-up pass. The JPEG modes only start the LCD
    /// DMA after the first decode; the other modes stream immediately.
    pub fn start(&mut self) -> Result<()> {
        if self.state != PipelineState::WarmingUp || !self.warmed_up {
            return Err(PipelineError::InvalidState(self.state));
        }
        let config = self.active_config()?;
        if let Err(e) = self.start_streams(&config) {
            error!("video: start failed: {}", e);
            let _ = self.close();
            return Err(e);
        }
        self.state = PipelineState::Running;
        info!("video: running");
        Ok(())
    }

    fn start_streams(&mut self, config: &PipelineConfig) -> Result<()> {
        match config.mode {
            PipelineMode::SolidColor => {
                self.hw
                    .lcd
                    .rgb_init(config.clk_div, config.geometry, config.format)?;
                self.powered.lcd = Some(LcdInterface::Rgb);
                self.lcd_dma()?.start()?;
                self.hw.lcd.display_enable(true)?;
                Ok(())
            }
            PipelineMode::YuvDisplay | PipelineMode::YuvBlend => {
                self.start_panel(config)?;
                self.hw.encoder.dvp_init(&config.jpeg)?;
                self.powered.dvp = true;
                self.hw.encoder.set_yuv_mode(true)?;
                self.start_camera(config)?;
                self.hw.lcd.display_enable(true)?;
                Ok(())
            }
            PipelineMode::JpegDisplay | PipelineMode::JpegCapture => {
                self.start_panel(config)?;
                self.hw.encoder.dvp_init(&config.jpeg)?;
                self.powered.dvp = true;
                self.start_jpeg_dma()?;
                self.start_camera(config)?;
                self.hw.lcd.display_enable(true)?;
                Ok(())
            }
            PipelineMode::I8080 => {
                self.start_panel(config)?;
                self.hw.lcd.i8080_start_transfer(true)?;
                self.hw.lcd.i8080_write_cmd(RAM_WRITE)?;
                self.start_lcd_frame()
            }
        }
    }

    /// Configure the panel interface and point the LCD DMA at its FIFO.
    fn start_panel(&mut self, config: &PipelineConfig) -> Result<()> {
        let interface = config.mode.interface();
        match interface {
            LcdInterface::Rgb => {
                self.hw
                    .lcd
                    .rgb_init(config.clk_div, config.geometry, config.format)?;
            }
            LcdInterface::I8080 => {
                self.hw.lcd.i8080_init(config.geometry, config.format)?;
            }
        }
        self.powered.lcd = Some(interface);

        let fifo = self.hw.lcd.data_fifo_addr(interface);
        let front = *self.frames.front();
        let ch = self.lcd_dma()?;
        ch.stop()?;
        ch.init(&DmaConfig {
            mode: DmaWorkMode::Single,
            priority: DMA_PRIORITY,
            src: DmaEndpoint::memory(front),
            dst: DmaEndpoint::fifo(DmaDev::LcdData, fifo, DmaDataWidth::Bits32),
        })?;
        ch.set_transfer_len(config.segment_len)?;
        ch.enable_finish_interrupt()?;
        self.chain = Some(SegmentChain::new(
            front,
            config.segment_len,
            config.segment_count,
        )?);
        Ok(())
    }

    fn start_jpeg_dma(&mut self) -> Result<()> {
        let fifo = self.hw.encoder.fifo_addr();
        let mut ch = self.hw.dma.alloc(DmaDev::Jpeg)?;
        debug!("video: JPEG DMA on channel {}", ch.id());
        let configured = ch
            .init(&DmaConfig {
                mode: DmaWorkMode::Single,
                priority: DMA_PRIORITY,
                src: DmaEndpoint::fifo(DmaDev::Jpeg, fifo, DmaDataWidth::Bits32),
                dst: DmaEndpoint::memory(JPEG_BITSTREAM_ADDR),
            })
            .and_then(|()| ch.set_transfer_len(JPEG_BITSTREAM_BYTES))
            .and_then(|()| ch.start());
        // Stored before the result is checked so close() frees it.
        self.jpeg_dma = Some(ch);
        configured?;
        Ok(())
    }

    fn start_camera(&mut self, config: &PipelineConfig) -> Result<()> {
        self.hw.camera.set_config(&config.camera)?;
        self.hw.camera.start()?;
        self.powered.camera = true;
        Ok(())
    }

    /// Halt streaming, leaving the blocks powered.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::InvalidState(self.state));
        }
        self.halt()
    }

    /// Every step runs even if an earlier one failed; the first error is
    /// returned and the pipeline is `Stopped` either way.
    fn halt(&mut self) -> Result<()> {
        let mut first = None;
        if self.powered.camera {
            keep_first(&mut first, "camera stop", self.hw.camera.stop());
        }
        if let Some(ch) = self.jpeg_dma.as_mut() {
            keep_first(&mut first, "jpeg dma stop", ch.stop());
        }
        if let Some(ch) = self.lcd_dma.as_mut() {
            keep_first(&mut first, "lcd dma stop", ch.stop());
        }
        keep_first(&mut first, "display disable", self.hw.lcd.display_enable(false));
        if let Some(id) = self.capture_slot.take() {
            keep_first(&mut first, "capture abandon", self.pool.abandon(id));
        }
        self.lcd_running = false;
        self.lcd_pending = false;
        self.decoding = false;
        self.capture_in_flight = false;
        self.state = PipelineState::Stopped;
        info!("video: stopped");
        first.map_or(Ok(()), Err)
    }

    // ── close ───────────────────────────────────────────────────────────

    /// Release every channel and power everything down.
    ///
    /// Steps run in reverse bring-up order. A failing step is logged and
    /// the rest still run; the first error is returned. Closing a closed
    /// pipeline does nothing.
    pub fn close(&mut self) -> Result<()> {
        let idle = self.lcd_dma.is_none()
            && self.jpeg_dma.is_none()
            && self.powered == Powered::default();
        if self.state == PipelineState::Closed && idle {
            self.reset();
            return Ok(());
        }

        let mut first = None;
        if let Some(mut ch) = self.lcd_dma.take() {
            keep_first(&mut first, "lcd dma deinit", ch.deinit());
            keep_first(&mut first, "lcd dma free", self.hw.dma.free(DmaDev::LcdData, ch));
        }
        if let Some(mut ch) = self.jpeg_dma.take() {
            keep_first(&mut first, "jpeg dma deinit", ch.deinit());
            keep_first(&mut first, "jpeg dma free", self.hw.dma.free(DmaDev::Jpeg, ch));
        }
        if self.powered.camera {
            keep_first(&mut first, "camera stop", self.hw.camera.stop());
        }
        if self.powered.decoder {
            keep_first(&mut first, "decoder deinit", self.hw.decoder.driver_deinit());
        }
        if self.powered.dvp {
            keep_first(&mut first, "dvp deinit", self.hw.encoder.dvp_deinit());
        }
        if self.powered.encoder {
            keep_first(&mut first, "encoder deinit", self.hw.encoder.driver_deinit());
        }
        match self.powered.lcd {
            Some(LcdInterface::Rgb) => keep_first(&mut first, "rgb deinit", self.hw.lcd.rgb_deinit()),
            Some(LcdInterface::I8080) => {
                keep_first(&mut first, "8080 deinit", self.hw.lcd.i8080_deinit());
            }
            None => {}
        }
        if self.powered.psram {
            keep_first(&mut first, "psram deinit", self.hw.psram.deinit());
        }

        self.reset();
        info!("video: closed");
        first.map_or(Ok(()), Err)
    }

    fn reset(&mut self) {
        self.state = PipelineState::Closed;
        self.config = None;
        self.powered = Powered::default();
        self.chain = None;
        self.frames.reset();
        self.warmed_up = false;
        self.lcd_running = false;
        self.lcd_pending = false;
        self.decoding = false;
        self.mcu = McuCount::default();
        self.foreground_loaded = false;
        self.pool.reset();
        self.capture_slot = None;
        self.capture_in_flight = false;
        self.pacer = None;
        self.eof_count = 0;
    }

    // ── capture ─────────────────────────────────────────────────────────

    /// Capture an encoded frame into a PSRAM JPEG slot.
    ///
    /// A free slot is reserved now. The next time the JPEG DMA is re-armed
    /// it writes into that slot instead of the SRAM bitstream buffer, and
    /// the frame it brings is published to the capture sink instead of
    /// being decoded. Refused while a capture is armed or the sink still
    /// holds the previous one.
    pub fn request_capture(&mut self) -> Result<()> {
        let config = self.active_config()?;
        if config.mode != PipelineMode::JpegCapture {
            return Err(PipelineError::CaptureUnsupported);
        }
        if self.state != PipelineState::Running {
            return Err(PipelineError::InvalidState(self.state));
        }
        if self.capture_slot.is_some() || self.pool.is_frozen(FrameType::Jpeg) {
            return Err(PipelineError::CaptureBusy);
        }
        let id = self
            .pool
            .alloc(FrameType::Jpeg)
            .ok_or(PipelineError::CaptureBusy)?;
        self.capture_slot = Some(id);
        Ok(())
    }

    /// `true` while a capture waits for its encoded frame.
    pub fn capture_pending(&self) -> bool {
        self.capture_slot.is_some()
    }

    /// Hand a published capture back to the pool.
    pub fn release_capture(&mut self, frame: FrameId) -> Result<()> {
        self.pool.release(frame, FrameModule::Capture)?;
        Ok(())
    }

    // ── interrupt entry ─────────────────────────────────────────────────

    /// Interrupt entry point, stamped with the current time.
    pub fn handle(&mut self, event: PipelineEvent) -> Result<()> {
        self.handle_at(event, Instant::now())
    }

    /// [`VideoPipeline::handle`] with an explicit arrival time.
    pub fn handle_at(&mut self, event: PipelineEvent, now: Instant) -> Result<()> {
        let result = self.dispatch(event, now);
        if let Err(e) = result {
            bump(&mut self.stats.errors);
            error!("video: {} while handling {}", e, event);
        }
        result
    }

    fn dispatch(&mut self, event: PipelineEvent, now: Instant) -> Result<()> {
        match (self.state, event) {
            (PipelineState::WarmingUp, PipelineEvent::DmaFinished(id))
            | (PipelineState::Running, PipelineEvent::DmaFinished(id)) => self.on_dma_finished(id),
            (PipelineState::Running, PipelineEvent::JpegEnc(ev)) => self.on_encoder(ev, now),
            (PipelineState::Running, PipelineEvent::JpegDecMcu) if self.decoding => {
                bump(&mut self.mcu.seen);
                Ok(())
            }
            (PipelineState::Running, PipelineEvent::JpegDecComplete) if self.decoding => {
                self.on_decode_complete()
            }
            (PipelineState::Running, PipelineEvent::Lcd(int)) => self.on_lcd(int),
            _ => {
                self.spurious(event);
                Ok(())
            }
        }
    }

    fn spurious(&mut self, event: PipelineEvent) {
        bump(&mut self.stats.spurious);
        trace!("video: ignored {} in {}", event, self.state);
    }

    fn on_dma_finished(&mut self, id: DmaId) -> Result<()> {
        let ours = self.lcd_dma.as_ref().is_some_and(|c| c.id() == id);
        // While running, the LCD channel only finishes segments it was sent.
        let idle = self.state == PipelineState::Running && !self.lcd_running;
        let Some(chain) = self.chain.as_mut().filter(|_| ours && !idle) else {
            self.spurious(PipelineEvent::DmaFinished(id));
            return Ok(());
        };
        let step = chain.on_segment_done();
        let running = self.state == PipelineState::Running;

        match step {
            SegmentStep::Rearm { next_addr } => {
                let ch = self.lcd_dma()?;
                ch.set_src_start_addr(next_addr)?;
                ch.start()?;
                if running {
                    bump(&mut self.stats.segments);
                }
                Ok(())
            }
            SegmentStep::FrameComplete { rewind_addr } => {
                self.lcd_dma()?.set_src_start_addr(rewind_addr)?;
                if running {
                    bump(&mut self.stats.segments);
                    self.on_lcd_frame_done()
                } else {
                    self.warmed_up = true;
                    info!("video: warm-up pass complete");
                    Ok(())
                }
            }
        }
    }

    fn on_lcd_frame_done(&mut self) -> Result<()> {
        bump(&mut self.stats.frames_displayed);
        self.lcd_running = false;
        if self.frames.consumer_done() == Handoff::Swapped {
            self.rebase_to_front()?;
            return self.start_lcd_frame();
        }
        if self.lcd_pending {
            self.lcd_pending = false;
            return self.start_lcd_frame();
        }
        Ok(())
    }

    fn rebase_to_front(&mut self) -> Result<()> {
        let front = *self.frames.front();
        let chain = self
            .chain
            .as_mut()
            .ok_or(PipelineError::InvalidState(self.state))?;
        chain.rebase(front)?;
        Ok(())
    }

    /// Send the current frame from its first segment.
    fn start_lcd_frame(&mut self) -> Result<()> {
        let chain = self
            .chain
            .as_ref()
            .ok_or(PipelineError::InvalidState(self.state))?;
        if self.lcd_running || !chain.at_frame_start() {
            return Err(DmaError::Busy.into());
        }
        let addr = chain.current_addr();
        let ch = self.lcd_dma()?;
        ch.set_src_start_addr(addr)?;
        ch.start()?;
        self.lcd_running = true;
        self.frames.consumer_started();
        Ok(())
    }

    fn pace(&mut self, now: Instant) -> bool {
        let present = self
            .pacer
            .as_mut()
            .map_or(true, |p| p.on_frame(now) == PaceDecision::Present);
        if !present {
            bump(&mut self.stats.frames_dropped);
        }
        present
    }

    fn on_encoder(&mut self, event: JpegEncEvent, now: Instant) -> Result<()> {
        let mode = self.active_config()?.mode;
        match event {
            JpegEncEvent::EndOfYuv if mode.uses_camera() && !mode.uses_jpeg() => {
                self.on_yuv_frame(mode, now)
            }
            JpegEncEvent::EndOfFrame if mode.uses_jpeg() => self.on_jpeg_frame(now),
            JpegEncEvent::HeadOutput | JpegEncEvent::StartOfFrame => Ok(()),
            _ => {
                self.spurious(PipelineEvent::JpegEnc(event));
                Ok(())
            }
        }
    }

    fn on_yuv_frame(&mut self, mode: PipelineMode, now: Instant) -> Result<()> {
        if !self.pace(now) {
            return Ok(());
        }
        if mode == PipelineMode::YuvBlend && self.foreground_loaded {
            self.blend_foreground()?;
        }
        if self.lcd_running {
            self.lcd_pending = true;
            Ok(())
        } else {
            self.start_lcd_frame()
        }
    }

    /// Encoder pushed a whole bitstream into SRAM or a capture slot.
    ///
    /// The JPEG DMA stays stopped from here until the decode finished, so
    /// the bitstream cannot change under the decoder.
    fn on_jpeg_frame(&mut self, now: Instant) -> Result<()> {
        if let Some(ch) = self.jpeg_dma.as_mut() {
            ch.stop()?;
        }

        if self.decoding {
            // The decoder still reads the bitstream; the DMA is re-armed
            // when it completes.
            bump(&mut self.stats.frames_dropped);
            return Ok(());
        }
        if self.capture_in_flight {
            let published = self.publish_capture();
            self.restart_jpeg_dma()?;
            return published;
        }
        if !self.pace(now) {
            return self.restart_jpeg_dma();
        }

        let dst = *self.frames.back();
        if let Err(e) = self.hw.decoder.init(JPEG_BITSTREAM_ADDR, dst) {
            self.restart_jpeg_dma()?;
            return Err(e.into());
        }
        self.frames.producer_started();
        self.decoding = true;
        self.mcu.seen = 0;
        Ok(())
    }

    /// Complete the armed capture slot and send it to the sink.
    fn publish_capture(&mut self) -> Result<()> {
        self.capture_in_flight = false;
        let Some(id) = self.capture_slot.take() else {
            return Ok(());
        };
        let size = self.hw.encoder.frame_size().min(JPEG_BITSTREAM_BYTES);
        let len = usize::try_from(size).map_err(|_| ConfigError::AddressOverflow)?;
        let delivery = self.pool.complete(id, len)?;
        let frame = delivery
            .frame
            .filter(|_| delivery.modules.contains(&FrameModule::Capture));
        let Some(frame) = frame else {
            bump(&mut self.stats.capture_overruns);
            warn!("video: capture dropped, previous frame still held");
            return Ok(());
        };
        let addr = self
            .pool
            .slot(frame)
            .map(|s| s.region.addr())
            .ok_or(FrameBufferError::InvalidFrame)?;
        let captured = CapturedFrame {
            frame,
            addr,
            size,
            sequence: self.stats.captures,
        };
        let sent = self
            .capture_tx
            .as_ref()
            .is_some_and(|tx| tx.try_send(captured).is_ok());
        if sent {
            bump(&mut self.stats.captures);
            debug!("video: captured {} bytes into slot {}", size, frame.index());
        } else {
            bump(&mut self.stats.capture_overruns);
            warn!("video: capture dropped, sink full or missing");
            self.pool.release(frame, FrameModule::Capture)?;
        }
        Ok(())
    }

    fn on_decode_complete(&mut self) -> Result<()> {
        self.decoding = false;
        bump(&mut self.stats.frames_decoded);
        // No MCU interrupt at all counts as short too.
        if self.mcu.seen != self.mcu.expected {
            bump(&mut self.stats.short_decodes);
            warn!(
                "video: decode ended after {} of {} MCUs",
                self.mcu.seen,
                self.mcu.expected
            );
        }

        let shown = if self.frames.producer_done() == Handoff::Swapped {
            self.rebase_to_front().and_then(|()| self.start_lcd_frame())
        } else {
            Ok(())
        };
        // The encoder restarts even if the panel could not.
        self.restart_jpeg_dma()?;
        shown
    }

    /// Re-arm the JPEG DMA, into the armed capture slot if there is one.
    fn restart_jpeg_dma(&mut self) -> Result<()> {
        let capture = self
            .capture_slot
            .and_then(|id| self.pool.slot(id))
            .map(|s| s.region.addr());
        let ch = self
            .jpeg_dma
            .as_mut()
            .ok_or(PipelineError::InvalidState(self.state))?;
        ch.set_dst_start_addr(capture.unwrap_or(JPEG_BITSTREAM_ADDR))?;
        ch.start()?;
        self.capture_in_flight = capture.is_some();
        Ok(())
    }

    fn on_lcd(&mut self, int: LcdInt) -> Result<()> {
        let config = self.active_config()?;
        match (config.mode, int) {
            (PipelineMode::SolidColor, LcdInt::RgbOutputEof) => {
                bump(&mut self.stats.lcd_eof);
                bump(&mut self.eof_count);
                if self.eof_count >= config.solid_color.frames {
                    self.hw.lcd.display_enable(false)?;
                    self.lcd_dma()?.stop()?;
                    self.state = PipelineState::Stopped;
                    info!("video: solid colour done after {} frames", self.eof_count);
                }
                Ok(())
            }
            (PipelineMode::I8080, LcdInt::I8080OutputEof) => {
                self.hw.lcd.display_enable(false)?;
                self.hw.lcd.pixel_config(config.geometry)?;
                self.hw.lcd.display_enable(true)?;
                self.hw.lcd.i8080_write_cmd(RAM_WRITE)?;
                if self.lcd_running {
                    Ok(())
                } else {
                    self.start_lcd_frame()
                }
            }
            (mode, LcdInt::RgbOutputEof) if mode.interface() == LcdInterface::Rgb => {
                bump(&mut self.stats.lcd_eof);
                Ok(())
            }
            _ => {
                self.spurious(PipelineEvent::Lcd(int));
                Ok(())
            }
        }
    }

    // ── blend ───────────────────────────────────────────────────────────

    /// Blend the foreground image into the front display frame.
    #[allow(clippy::arithmetic_side_effects)] // Safety: rectangle bounded by validate_blend
    fn blend_foreground(&mut self) -> Result<()> {
        let config = self.active_config()?;
        let blend = config.blend;
        let row_bytes = blend.row_bytes();
        let frame_row = usize::from(config.geometry.width) * 2;
        let frame_offset = config.frames[0].offset;

        let mut fg = [0u8; BLEND_CHUNK];
        let mut bg = [0u8; BLEND_CHUNK];
        for row in 0..usize::from(blend.height) {
            let fg_row = PsramLayout::FOREGROUND.offset + row * row_bytes;
            let bg_row = frame_offset
                + (usize::from(blend.y) + row) * frame_row
                + usize::from(blend.x) * 2;
            let mut done = 0;
            while done < row_bytes {
                let n = (row_bytes - done).min(BLEND_CHUNK);
                let (Some(fg), Some(bg)) = (fg.get_mut(..n), bg.get_mut(..n)) else {
                    break;
                };
                self.hw.psram.read(fg_row + done, fg)?;
                self.hw.psram.read(bg_row + done, bg)?;
                blend_yuyv(bg, fg, blend.key);
                self.hw.psram.write(bg_row + done, bg)?;
                done += n;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_skips_key_pixels() {
        let key = [0x00, 0x80, 0x00, 0x80];
        let mut bg = [1u8; 12];
        let fg = [9, 9, 9, 9, 0x00, 0x80, 0x00, 0x80, 7, 7, 7, 7];
        blend_yuyv(&mut bg, &fg, key);
        assert_eq!(bg, [9, 9, 9, 9, 1, 1, 1, 1, 7, 7, 7, 7]);
    }

    #[test]
    fn test_blend_ignores_partial_pair() {
        let mut bg = [1u8; 6];
        blend_yuyv(&mut bg, &[5u8; 6], [0; 4]);
        assert_eq!(bg, [5, 5, 5, 5, 1, 1]);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(std::format!("{}", PipelineState::WarmingUp), "warming up");
    }
}
