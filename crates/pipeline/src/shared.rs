//! Ownership shared between interrupt handlers and tasks.
//!
//! Interrupt handlers on the BK7256 cannot take arguments, so the pipeline
//! lives in a `static` and every handler borrows it inside a critical
//! section:
//!
//! ```ignore
//! static PIPELINE: IsrShared<VideoPipeline<Board>> = IsrShared::new();
//!
//! fn dma_finish_isr(id: DmaId) {
//!     PIPELINE.with(|p| p.handle(PipelineEvent::DmaFinished(id)));
//! }
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::video::VideoPipeline;
use bk_platform::board::VideoBoard;

/// A value installed once and then borrowed from any context.
pub struct IsrShared<T> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Option<T>>>,
}

impl<T> IsrShared<T> {
    /// Empty slot, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Store `value`, returning the previous one.
    pub fn install(&self, value: T) -> Option<T> {
        self.inner.lock(|cell| cell.borrow_mut().replace(value))
    }

    /// Remove the value.
    pub fn take(&self) -> Option<T> {
        self.inner.lock(|cell| cell.borrow_mut().take())
    }

    /// Run `f` on the value inside a critical section.
    ///
    /// Returns `None` if nothing is installed or the value is already
    /// borrowed further up the stack.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.lock(|cell| {
            let mut guard = cell.try_borrow_mut().ok()?;
            guard.as_mut().map(f)
        })
    }

    /// `true` once a value is installed.
    pub fn is_installed(&self) -> bool {
        self.inner
            .lock(|cell| cell.try_borrow().map(|v| v.is_some()).unwrap_or(true))
    }

    /// Yield to the executor until `pred` holds for the installed value.
    ///
    /// Returns `false` if the value is removed while waiting.
    pub async fn wait_until(&self, mut pred: impl FnMut(&T) -> bool) -> bool {
        loop {
            match self.with(|v| pred(v)) {
                Some(true) => return true,
                Some(false) => {}
                None if !self.is_installed() => return false,
                None => {}
            }
            embassy_futures::yield_now().await;
        }
    }
}

impl<T> Default for IsrShared<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the warm-up DMA pass of a shared pipeline.
///
/// Replaces the busy-wait on the warm-up flag before the panel is brought
/// up; other tasks keep running while the interrupt walks the chain.
pub async fn wait_warmed_up<B: VideoBoard>(shared: &IsrShared<VideoPipeline<B>>) -> bool {
    shared.wait_until(VideoPipeline::is_warmed_up).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_take() {
        let shared: IsrShared<u32> = IsrShared::new();
        assert!(!shared.is_installed());
        assert_eq!(shared.with(|v| *v), None);
        assert_eq!(shared.install(3), None);
        assert_eq!(shared.install(4), Some(3));
        assert_eq!(shared.with(|v| {
            *v += 1;
            *v
        }), Some(5));
        assert_eq!(shared.take(), Some(5));
        assert!(!shared.is_installed());
    }

    #[test]
    fn test_reentrant_borrow_is_refused() {
        let shared: IsrShared<u32> = IsrShared::new();
        shared.install(1);
        let inner = shared.with(|_| shared.with(|v| *v));
        assert_eq!(inner, Some(None));
    }
}
