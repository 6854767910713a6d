//! Frame pool delivery and locking.

use bk_pipeline::frame_buffer::{
    FrameBufferError, FrameModule, FramePool, FrameState, FrameType,
};
use bk_platform::psram::PsramLayout;

#[test]
fn test_slots_map_to_psram_layout() {
    let mut pool = FramePool::new();
    let d = pool.alloc(FrameType::Display).unwrap();
    let j = pool.alloc(FrameType::Jpeg).unwrap();
    assert_eq!(pool.slot(d).unwrap().region, PsramLayout::DISPLAY[0]);
    assert_eq!(pool.slot(j).unwrap().region, PsramLayout::JPEG[0]);
}

#[test]
fn test_jpeg_frame_goes_to_every_idle_consumer() {
    let mut pool = FramePool::new();
    pool.register(FrameModule::Wifi);
    pool.register(FrameModule::Decoder);
    pool.register(FrameModule::Capture);

    let id = pool.alloc(FrameType::Jpeg).unwrap();
    let delivery = pool.complete(id, 20_000).unwrap();
    assert_eq!(delivery.frame, Some(id));
    assert_eq!(
        delivery.modules.as_slice(),
        &[FrameModule::Wifi, FrameModule::Decoder, FrameModule::Capture]
    );
    let slot = pool.slot(id).unwrap();
    assert_eq!(slot.lock, 3);
    assert_eq!(slot.length, 20_000);

    // A locked slot is not handed to the producer again.
    let next = pool.alloc(FrameType::Jpeg).unwrap();
    assert_ne!(next, id);
    assert_eq!(pool.alloc(FrameType::Jpeg), None);
}

#[test]
fn test_busy_consumer_skips_newer_frames() {
    let mut pool = FramePool::new();
    pool.register(FrameModule::Decoder);

    let first = pool.alloc(FrameType::Jpeg).unwrap();
    pool.complete(first, 100).unwrap();
    assert!(pool.is_frozen(FrameType::Jpeg));

    let second = pool.alloc(FrameType::Jpeg).unwrap();
    let delivery = pool.complete(second, 100).unwrap();
    assert_eq!(delivery.frame, None);
    assert_eq!(pool.slot(second).unwrap().state, FrameState::Framed);

    pool.release(first, FrameModule::Decoder).unwrap();
    assert!(!pool.is_frozen(FrameType::Jpeg));
    assert_eq!(pool.slot(first).unwrap().lock, 0);
}

#[test]
fn test_release_order_and_errors() {
    let mut pool = FramePool::new();
    pool.register(FrameModule::Wifi);
    pool.register(FrameModule::Capture);
    let id = pool.alloc(FrameType::Jpeg).unwrap();
    pool.complete(id, 10).unwrap();

    assert_eq!(
        pool.release(id, FrameModule::Decoder),
        Err(FrameBufferError::NotHeld)
    );
    pool.release(id, FrameModule::Wifi).unwrap();
    assert_eq!(pool.slot(id).unwrap().state, FrameState::Alloced);
    pool.release(id, FrameModule::Capture).unwrap();
    assert_eq!(pool.slot(id).unwrap().state, FrameState::Framed);
    assert_eq!(
        pool.release(id, FrameModule::Capture),
        Err(FrameBufferError::NotLocked)
    );
}

#[test]
fn test_oldest_frame_is_reused_first() {
    let mut pool = FramePool::new();
    let a = pool.alloc(FrameType::Display).unwrap();
    let b = pool.alloc(FrameType::Display).unwrap();
    pool.complete(b, 1).unwrap();
    pool.complete(a, 1).unwrap();
    // b completed first, so it is the older frame.
    assert_eq!(pool.alloc(FrameType::Display), Some(b));
    assert!(pool.slot(a).unwrap().sequence > pool.slot(b).unwrap().sequence);
}

#[test]
fn test_deregistered_module_gets_nothing() {
    let mut pool = FramePool::new();
    pool.register(FrameModule::Display);
    pool.deregister(FrameModule::Display);
    let id = pool.alloc(FrameType::Display).unwrap();
    assert_eq!(pool.complete(id, 1).unwrap().frame, None);

    pool.reset();
    assert_eq!(pool.slot(id).unwrap().state, FrameState::Invalid);
}
