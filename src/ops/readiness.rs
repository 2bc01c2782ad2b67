use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::config::MoiraConfig;
use crate::errors::{MoiraError, Result};
use crate::fate::id::FateId;
use crate::fate::repo::Repo;

/// Re-runs a readiness check until it reports `0`, sleeping for the hinted
/// delay between attempts.
///
/// Each sleep is capped by `max_delay`, and the whole wait by `timeout`, after
/// which polling fails with [`MoiraError::Timeout`]. Nothing is cancelled on
/// timeout; whatever the last attempt submitted has already been applied or
/// rejected.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessPoller {
    timeout: Duration,
    max_delay: Duration,
}

impl ReadinessPoller {
    pub fn new(timeout: Duration, max_delay: Duration) -> Self {
        Self { timeout, max_delay }
    }

    pub fn from_config(config: &MoiraConfig) -> Self {
        Self::new(config.readiness_timeout(), config.readiness_max_delay())
    }

    /// Polls `attempt` until it returns `0`. Returns how many attempts it took.
    pub fn poll<A>(&self, what: &str, mut attempt: A) -> Result<usize>
    where
        A: FnMut() -> Result<u64>,
    {
        let start = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let hint = attempt()?;
            if hint == 0 {
                debug!("{} ready after {} attempts", what, attempts);
                return Ok(attempts);
            }
            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(MoiraError::Timeout {
                    waited: elapsed,
                    what: what.to_string(),
                });
            }
            let delay = Duration::from_millis(hint)
                .min(self.max_delay)
                .min(self.timeout - elapsed);
            trace!("{} not ready, retrying in {:?}", what, delay);
            thread::sleep(delay);
        }
    }

    /// Polls a step's [`Repo::is_ready`] until it is ready to be called.
    pub fn wait_until_ready<E, R>(&self, repo: &R, fate_id: &FateId, env: &E) -> Result<usize>
    where
        R: Repo<E> + ?Sized,
    {
        let what = format!("{} {}", fate_id, repo.name());
        self.poll(&what, || repo.is_ready(fate_id, env))
    }
}
