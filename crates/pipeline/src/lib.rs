//! DMA-chained, double-buffered video pipeline for BK72xx boards
//!
//! Moves camera frames to an LCD panel without the CPU touching pixels:
//! the JPEG DMA drains the encoder FIFO into SRAM, the decoder writes
//! alternating PSRAM display frames, and the LCD DMA pushes the current
//! frame to the panel FIFO as a chain of segments re-armed from the finish
//! interrupt.
//!
//! # Modules
//!
//! - [`config`] - Pipeline modes and their validated configuration
//! - [`segment`] - Segment cursor driven by the DMA finish interrupt
//! - [`pingpong`] - Front/back display frame hand-off
//! - [`frame_buffer`] - PSRAM frame pool with per-consumer locks
//! - [`pacing`] - Presented-frame rate limiting
//! - [`video`] - The pipeline state machine
//! - [`shared`] - Sharing the pipeline between interrupts and tasks
//!
//! # Features
//!
//! - `std`: Host builds (pulls in the platform mocks)
//! - `defmt`: Route log lines to defmt
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
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod frame_buffer;
pub mod pacing;
pub mod pingpong;
pub mod segment;
pub mod shared;
pub mod video;

pub use config::{BlendConfig, ConfigError, PipelineConfig, PipelineMode, SolidColorConfig};
pub use error::PipelineError;
pub use frame_buffer::{FrameBufferError, FrameId, FrameModule, FramePool, FrameType};
pub use pacing::{FramePacer, PaceDecision};
pub use pingpong::{Handoff, PingPong};
pub use segment::{SegmentChain, SegmentStep};
pub use shared::{wait_warmed_up, IsrShared};
pub use video::{
    blend_yuyv, CaptureChannel, CaptureSender, CapturedFrame, PipelineEvent, PipelineState,
    PipelineStats, VideoPipeline, CAPTURE_DEPTH,
};
