//! Production environment: the host's monotonic clock.

use std::time::{Duration, Instant};

use safelock_core::Environment;

/// Real time. `sleep` parks the serving thread, which is what the device
/// loop expects while the actuator is energized.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_waits_at_least_the_duration() {
        let env = SystemEnv;
        let start = env.now();
        env.sleep(Duration::from_millis(5));
        assert!(env.now() - start >= Duration::from_millis(5));
    }
}
