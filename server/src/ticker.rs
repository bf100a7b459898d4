//! Fixed-timestep scheduling for the simulation.
//!
//! Wall-clock time from a [`Clock`] fills an accumulator that is drained in
//! whole steps. Simulation time only advances through those steps, so the
//! world never depends on how often the caller polls. When the process falls
//! too far behind, the backlog is collapsed into one final step instead of
//! spiralling.

use crate::config::TickerConfig;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.micros.fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

/// A simulation advanced in fixed steps that periodically publishes output.
pub trait FixedStep {
    type Output;

    /// Advances to `now_ms` of simulation time by `dt` seconds.
    fn step(&mut self, now_ms: u64, dt: f32);

    /// Whether something happened that clients should hear about right away.
    fn wants_flush(&self) -> bool;

    fn flush(&mut self, now_ms: u64, tick_rate: f32) -> Vec<Self::Output>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollReport {
    pub steps: u32,
    pub flushes: u32,
    /// Backlog folded into a single step after the catch-up cap.
    pub skipped: Duration,
}

pub struct Ticker<C: Clock> {
    config: TickerConfig,
    clock: C,
    step: Duration,
    accumulator: Duration,
    last_poll: Option<Duration>,
    sim_time: Duration,
    tick: u64,
    window_start: Duration,
    window_steps: u32,
    tick_rate: f32,
}

impl<C: Clock> Ticker<C> {
    pub fn new(config: TickerConfig, clock: C) -> Self {
        let step = config.step();
        let tick_rate = config.tick_rate as f32;
        Self {
            config,
            clock,
            step,
            accumulator: Duration::ZERO,
            last_poll: None,
            sim_time: Duration::ZERO,
            tick: 0,
            window_start: Duration::ZERO,
            window_steps: 0,
            tick_rate,
        }
    }

    /// Arms the ticker; time before this call is never simulated.
    pub fn start(&mut self) {
        let now = self.clock.now();
        self.last_poll = Some(now);
        self.window_start = now;
        self.window_steps = 0;
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn sim_time_ms(&self) -> u64 {
        self.sim_time.as_millis() as u64
    }

    /// Steps per wall-clock second, measured over the last full second.
    pub fn tick_rate(&self) -> f32 {
        self.tick_rate
    }

    /// Runs every step that is due and collects what the simulation flushed.
    ///
    /// # Panics
    ///
    /// If called before [`Ticker::start`].
    pub fn poll<S: FixedStep>(&mut self, sim: &mut S) -> (Vec<S::Output>, PollReport) {
        let now = self.clock.now();
        let last = self.last_poll.expect("ticker polled before start()");
        self.last_poll = Some(now);
        self.accumulator += now.saturating_sub(last);

        let mut outputs = Vec::new();
        let mut report = PollReport::default();

        while self.accumulator >= self.step {
            if report.steps == self.config.max_catch_up_steps {
                let backlog = std::mem::take(&mut self.accumulator);
                warn!(
                    "Simulation {}ms behind after {} catch-up steps, skipping ahead",
                    backlog.as_millis(),
                    report.steps
                );
                let dt = backlog.min(self.config.max_step_dt);
                self.run_step(sim, backlog, dt, &mut outputs, &mut report);
                report.skipped = backlog;
                break;
            }
            self.accumulator -= self.step;
            self.run_step(sim, self.step, self.step, &mut outputs, &mut report);
        }

        self.measure_tick_rate(now);
        (outputs, report)
    }

    fn run_step<S: FixedStep>(
        &mut self,
        sim: &mut S,
        advance: Duration,
        dt: Duration,
        outputs: &mut Vec<S::Output>,
        report: &mut PollReport,
    ) {
        self.sim_time += advance;
        self.tick += 1;
        self.window_steps += 1;
        report.steps += 1;

        let now_ms = self.sim_time_ms();
        sim.step(now_ms, dt.as_secs_f32());

        let heartbeat = self.tick % self.config.broadcast_every as u64 == 0;
        if heartbeat || sim.wants_flush() {
            outputs.extend(sim.flush(now_ms, self.tick_rate));
            report.flushes += 1;
        }
    }

    fn measure_tick_rate(&mut self, now: Duration) {
        let elapsed = now.saturating_sub(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.tick_rate = self.window_steps as f32 / elapsed.as_secs_f32();
            debug!("Tick {}: {:.1}Hz", self.tick, self.tick_rate);
            self.window_start = now;
            self.window_steps = 0;
        }
    }

    /// Wall-clock time left until the next step is due.
    pub fn time_until_next_step(&self) -> Duration {
        let pending = match self.last_poll {
            Some(last) => self.accumulator + self.clock.now().saturating_sub(last),
            None => Duration::ZERO,
        };
        self.step.saturating_sub(pending)
    }
}
