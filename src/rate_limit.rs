use std::{
   collections::{
      HashMap,
      VecDeque,
   },
   sync::{
      Mutex,
      MutexGuard,
      PoisonError,
   },
   time::Instant,
};

use rand::Rng;
use tracing::debug;

/// Outcome of an admission check. Rejection is an ordinary result, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
   Admit,
   Reject,
}

impl Decision {
   pub fn is_admitted(self) -> bool {
      matches!(self, Decision::Admit)
   }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
   pub max_requests:      usize,
   pub window_ms:         u64,
   pub sweep_probability: f64,
}

impl Default for RateLimitConfig {
   fn default() -> Self {
      Self {
         max_requests:      10,
         window_ms:         60_000,
         sweep_probability: 0.01,
      }
   }
}

/// Timestamps (ms) of recently admitted requests, oldest first.
type RateWindow = VecDeque<u64>;

/// Sliding-window rate limiter keyed by an opaque client identity.
///
/// Every read-modify-write on the registry, including sweeps, happens under
/// one lock, so concurrent requests from the same identity can never both
/// take the last slot.
pub struct AdmissionController {
   windows: Mutex<HashMap<String, RateWindow>>,
   config:  RateLimitConfig,
   epoch:   Instant,
}

impl AdmissionController {
   pub fn new(config: RateLimitConfig) -> Self {
      Self {
         windows: Mutex::new(HashMap::new()),
         config:  RateLimitConfig {
            sweep_probability: config.sweep_probability.clamp(0.0, 1.0),
            ..config
         },
         epoch:   Instant::now(),
      }
   }

   /// Decide whether `identity` may proceed at time `now` (milliseconds).
   ///
   /// Expired timestamps are trimmed first. A rejected request is not
   /// recorded, so retrying at the limit does not push the window forward.
   pub fn admit(&self, identity: &str, now: u64) -> Decision {
      let mut windows = self.lock();

      let window = windows.entry(identity.to_owned()).or_default();
      trim(window, now, self.config.window_ms);

      let decision = if window.len() >= self.config.max_requests {
         Decision::Reject
      } else {
         window.push_back(now);
         Decision::Admit
      };

      self.maybe_sweep(&mut windows, now);

      decision
   }

   /// `admit` against the controller's own monotonic clock.
   pub fn check(&self, identity: &str) -> Decision {
      self.admit(identity, self.now_ms())
   }

   /// Drop every identity whose window has fully expired at `now`.
   /// Returns how many identities were removed.
   #[cfg(test)]
   fn sweep(&self, now: u64) -> usize {
      let mut windows = self.lock();
      sweep_locked(&mut windows, now, self.config.window_ms)
   }

   pub fn tracked_identities(&self) -> usize {
      self.lock().len()
   }

   fn now_ms(&self) -> u64 {
      u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
   }

   /// Runs a full sweep with probability `sweep_probability`. Callers hold
   /// the registry lock, so it never interleaves with an `admit`.
   fn maybe_sweep(&self, windows: &mut HashMap<String, RateWindow>, now: u64) {
      let p = self.config.sweep_probability;
      if p > 0.0 && rand::thread_rng().gen_bool(p) {
         let removed = sweep_locked(windows, now, self.config.window_ms);
         debug!(removed, remaining = windows.len(), "rate limiter sweep");
      }
   }

   // The registry holds no invariant a panicking holder could break halfway,
   // so a poisoned lock is still safe to use.
   fn lock(&self) -> MutexGuard<'_, HashMap<String, RateWindow>> {
      self.windows.lock().unwrap_or_else(PoisonError::into_inner)
   }

   #[cfg(test)]
   fn window_len(&self, identity: &str) -> Option<usize> {
      self.lock().get(identity).map(VecDeque::len)
   }
}

fn trim(window: &mut RateWindow, now: u64, window_ms: u64) {
   window.retain(|&ts| now.saturating_sub(ts) < window_ms);
}

fn sweep_locked(windows: &mut HashMap<String, RateWindow>, now: u64, window_ms: u64) -> usize {
   let before = windows.len();
   windows.retain(|_, window| {
      trim(window, now, window_ms);
      !window.is_empty()
   });
   before - windows.len()
}
