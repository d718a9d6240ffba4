//! Per-sample processor trait and tick timing

use biopulse_core::Duration;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Core trait for stateful per-sample stages
///
/// Implementors own all of their state; processing is infallible once the
/// stage has been constructed.
pub trait SampleProcessor: Send {
    /// Process one sample and return the stage output
    fn process_sample(&mut self, input: f32) -> f32;

    /// Processor name/identifier
    fn name(&self) -> &str;

    /// Zero all internal state
    fn reset(&mut self);

    /// Process a block in place, sample by sample
    fn process_in_place(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Get processor type for pipeline organization
    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Filter
    }
}

/// Types of per-sample stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    /// IIR filter chain
    Filter,
    /// Event detector producing a flag per sample
    Detector,
}

/// Tick timing statistics against a fixed period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickBudget {
    period: Duration,
    ticks: u64,
    overruns: u64,
    worst_tick: Duration,
    total: Duration,
}

impl TickBudget {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ticks: 0,
            overruns: 0,
            worst_tick: Duration::default(),
            total: Duration::default(),
        }
    }

    /// Budget for one tick at `sample_rate` Hz
    pub fn for_sample_rate(sample_rate: f32) -> Self {
        let nanos = (1_000_000_000.0 / sample_rate as f64).round() as u64;
        Self::new(Duration::from_nanos(nanos))
    }

    /// Start timing a tick
    pub fn start(&self) -> TickTimer {
        TickTimer {
            start_time: Instant::now(),
        }
    }

    /// Record one tick; returns `true` when it exceeded the period
    pub fn record(&mut self, elapsed: Duration) -> bool {
        self.ticks += 1;
        self.total = self.total + elapsed;
        if elapsed > self.worst_tick {
            self.worst_tick = elapsed;
        }

        let overrun = elapsed > self.period;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn worst_tick(&self) -> Duration {
        self.worst_tick
    }

    /// Mean tick cost, zero before the first tick
    pub fn mean_tick(&self) -> Duration {
        if self.ticks == 0 {
            Duration::default()
        } else {
            Duration::from_nanos(self.total.as_nanos() / self.ticks)
        }
    }

    /// Worst tick as a fraction of the period
    pub fn worst_utilization(&self) -> f32 {
        self.worst_tick.as_nanos() as f32 / self.period.as_nanos().max(1) as f32
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.period);
    }
}

/// Helper for timing one tick
pub struct TickTimer {
    start_time: Instant,
}

impl TickTimer {
    /// Finish timing and return the elapsed time
    pub fn finish(self) -> Duration {
        self.start_time.elapsed().into()
    }
}
