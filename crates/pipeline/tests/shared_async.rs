//! Task-side waiting on a pipeline driven from "interrupt" context.
//!
//! Run with: cargo test -p bk-pipeline --test shared_async

use bk_pipeline::config::PipelineConfig;
use bk_pipeline::shared::{wait_warmed_up, IsrShared};
use bk_pipeline::video::{PipelineEvent, PipelineState, VideoPipeline};
use bk_platform::mocks::{MockBoard, MockHw};
use embassy_futures::join::join;
use embassy_futures::yield_now;

fn opened(config: &PipelineConfig) -> (MockHw, IsrShared<VideoPipeline<MockBoard>>) {
    let hw = MockHw::new(1024 * 1024);
    let mut pipeline = VideoPipeline::new(hw.peripherals());
    pipeline.open(config).unwrap();
    let shared = IsrShared::new();
    shared.install(pipeline);
    (hw, shared)
}

/// Fire one LCD DMA finish interrupt per poll until the pass completes.
async fn drive_warmup(hw: &MockHw, shared: &IsrShared<VideoPipeline<MockBoard>>) -> u32 {
    let mut interrupts = 0;
    loop {
        yield_now().await;
        let done = shared
            .with(|p| {
                if p.is_warmed_up() {
                    return true;
                }
                let id = p.lcd_channel().unwrap();
                hw.finish_dma(id);
                p.handle(PipelineEvent::DmaFinished(id)).unwrap();
                false
            })
            .unwrap();
        if done {
            return interrupts;
        }
        interrupts += 1;
    }
}

#[tokio::test]
async fn test_wait_returns_after_warmup_pass() {
    let (hw, shared) = opened(&PipelineConfig::rgb_jpeg_display());

    let (warmed, interrupts) = join(wait_warmed_up(&shared), drive_warmup(&hw, &shared)).await;
    assert!(warmed);
    assert_eq!(interrupts, 4);

    let started = shared.with(|p| p.start()).unwrap();
    assert!(started.is_ok());
    assert_eq!(shared.with(|p| p.state()), Some(PipelineState::Running));
}

#[tokio::test]
async fn test_wait_gives_up_when_pipeline_removed() {
    let (_hw, shared) = opened(&PipelineConfig::i8080_display());

    let remove = async {
        yield_now().await;
        shared.take().is_some()
    };
    let (warmed, removed) = join(wait_warmed_up(&shared), remove).await;
    assert!(removed);
    assert!(!warmed);
}

#[tokio::test]
async fn test_solid_color_needs_no_wait() {
    let (_hw, shared) = opened(&PipelineConfig::rgb_solid_color(0));
    assert!(wait_warmed_up(&shared).await);
}
