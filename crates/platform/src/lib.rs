//! Hardware Abstraction Layer (HAL) for the BK72xx video path
//!
//! This crate provides trait-based abstractions for the peripherals a
//! camera-to-LCD pipeline touches, enabling development and testing without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application / demo commands
//!         ↓
//! Video pipeline (bk-pipeline: DMA chaining, ping-pong, frame pool)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Vendor drivers (DMA, JPEG, LCD, PSRAM, DVP sensor)
//! ```
//!
//! # Peripherals
//!
//! - [`dma`] - Channel allocation, endpoint configuration, finish interrupts
//! - [`jpeg`] - Encoder (DVP input) and decoder
//! - [`lcd`] - 8080 and RGB display interfaces
//! - [`psram`] - External frame memory and its layout
//! - [`camera`] - DVP sensor configuration
//! - [`board`] - One concrete driver per peripheral
//!
//! # Features
//!
//! - `std`: Enable standard library support and the [`mocks`] module
//! - `defmt`: Enable defmt logging
//! - `serde`: Serialize configuration types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod board;
pub mod camera;
pub mod config;
pub mod dma;
pub mod dma_safety;
pub mod jpeg;
pub mod lcd;
pub mod psram;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use board::{Peripherals, VideoBoard};
pub use camera::{CameraConfig, CameraError, CameraSensor, Fps};
pub use dma::{
    DmaAllocator, DmaBuffer, DmaBufferMut, DmaChannel, DmaConfig, DmaDataWidth, DmaDev,
    DmaEndpoint, DmaError, DmaId, DmaTransfer, DmaWorkMode,
};
pub use dma_safety::DmaAccessible;
pub use jpeg::{JpegDecoder, JpegEncConfig, JpegEncEvent, JpegEncoder, JpegError, McuGeometry};
pub use lcd::{
    LcdClock, LcdDataFormat, LcdDisplay, LcdError, LcdGeometry, LcdInt, LcdInterface,
};
pub use psram::{Psram, PsramConfig, PsramError, PsramLayout, PsramRegion};
