//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the lock logic from the wall clock. The
//! open sequence, the wrong-secret delay, the join retry interval and the
//! restart delay all go through it, so a simulation can run an entire boot
//! plus a sixty-second open in microseconds.
//!
//! The device runs a single cooperative loop, so unlike an async runtime the
//! `sleep` here blocks the caller. That blocking is the point: nothing else
//! may be serviced while the actuator is energized.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: Implementations must not share global state

use std::time::Duration;

/// Abstract environment providing time.
///
/// # Implementations
///
/// - Simulation (`safelock-harness::SimEnv`): Virtual time that advances
///   instantly on `sleep`.
/// - Production (`safelock-server::SystemEnv`): Real monotonic clock and
///   thread sleep.
pub trait Environment {
    /// Type representing a point in time.
    ///
    /// Must support:
    /// - `Copy` - Lightweight to pass around
    /// - `Ord` - Can be compared (for deadline logic)
    /// - `Sub<Output = Duration>` - Can compute elapsed time
    type Instant: Copy + Ord + std::ops::Sub<Output = Duration>;

    /// Returns the current time.
    ///
    /// Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Blocks the caller for the specified duration.
    ///
    /// - Simulation: Advances the virtual clock instantly
    /// - Production: Parks the thread
    fn sleep(&self, duration: Duration);
}
