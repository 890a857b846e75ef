//! Timed waits used by the self-test sequences.

use std::time::Duration;

/// Blocking wait capability.
///
/// The resonance test waits while the motor moves; tests substitute a
/// virtual clock so the sequence can be checked without real-time cost.
#[allow(async_fn_in_trait)]
pub trait Delay {
    /// Suspend for `duration`. Runs to completion once started.
    async fn sleep(&mut self, duration: Duration);
}

/// Real-time delay backed by the Tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    async fn sleep(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
