//! Run-scoped cancellation.
//!
//! A [`CancellationToken`] is a shared flag polled at the suspension points of
//! the pipeline and by the scratch writer on every chunk of a download. It is
//! never polled inside a publish call, so a cancelled run never abandons a
//! publish mid-acknowledgement.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{EXIT_CANCELLED, MirrorError, Result};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Shared flag that requests the run to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return [`MirrorError::Cancelled`] if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Cancelled`] when the token is cancelled.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_mirror::cancel::CancellationToken;
    ///
    /// let token = CancellationToken::new();
    /// assert!(token.check().is_ok());
    /// token.cancel();
    /// assert!(token.check().is_err());
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(MirrorError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early if cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Cancelled`] if cancellation arrives before the
    /// sleep completes.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    /// Cancel this token when the process receives SIGINT or SIGTERM.
    ///
    /// The first signal only cancels the token. A second signal while the
    /// token is already cancelled terminates the process with
    /// [`EXIT_CANCELLED`].
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the signal handlers cannot be registered.
    pub fn cancel_on_signals(&self) -> std::io::Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};

        for signal in [SIGINT, SIGTERM] {
            // Registered first so it sees the flag before this signal sets it.
            signal_hook::flag::register_conditional_shutdown(
                signal,
                EXIT_CANCELLED,
                Arc::clone(&self.flag),
            )?;
            signal_hook::flag::register(signal, Arc::clone(&self.flag))?;
        }
        Ok(())
    }
}
