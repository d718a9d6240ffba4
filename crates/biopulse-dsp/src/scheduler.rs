//! Fixed-rate sample scheduler
//!
//! One call to [`SampleScheduler::tick`] handles one ADC reading, in order:
//! ECG filter, peak detector, beat gate and RR tracking, then EEG filter and
//! block accumulation, then spectral analysis when the block is full.
//!
//! In [`AnalysisMode::Deferred`] the full block is not analyzed on the tick.
//! It is swapped for a spare buffer and returned to the caller, who analyzes
//! it in another execution context and hands the buffer back through
//! [`SampleScheduler::recycle`]. The filler and the analyzer never share a
//! buffer.

use crate::config::MonitorConfig;
use crate::detector::PeakDetector;
use crate::filters::{EcgBandFilter, EegFilter};
use crate::heartbeat::{BeatGate, HeartRate, RrEvent, RrTracker};
use crate::processor::{SampleProcessor, TickBudget};
use crate::spectral::{BandPowerAnalyzer, SpectralBlock, SpectralReport};
use biopulse_core::{config_error, BpResult, Duration, RawSample, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

/// Where completed spectral blocks are analyzed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Inside the tick that completes the block
    #[default]
    Inline,
    /// Handed off to the caller with a buffer swap
    Deferred,
}

/// Scheduler parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub analysis_mode: AnalysisMode,
    /// Spare block buffers kept for deferred hand-off
    pub handoff_pool: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            analysis_mode: AnalysisMode::Inline,
            handoff_pool: 2,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> BpResult<()> {
        if self.analysis_mode == AnalysisMode::Deferred && self.handoff_pool == 0 {
            return Err(config_error!("Deferred analysis needs at least one spare buffer"));
        }
        Ok(())
    }
}

/// Everything one tick produced
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub timestamp: Timestamp,
    pub ecg_filtered: f32,
    pub eeg_filtered: f32,
    /// Detector flag before gating
    pub raw_peak: bool,
    /// Gated beat: one per QRS complex
    pub peak: bool,
    /// Detector compared this sample against statistics it has not filled yet
    pub warming_up: bool,
    /// Accepted RR interval ending at this beat (ms)
    pub rr_interval_ms: Option<f32>,
    /// Mean heart rate over the recent accepted intervals, set with `rr_interval_ms`
    pub heart_rate_bpm: Option<f32>,
    /// Inline analysis result when a block completed on this tick
    pub spectral: Option<SpectralReport>,
    /// Full block to analyze elsewhere (deferred mode)
    pub handoff: Option<Vec<f32>>,
}

/// Running totals since construction or the last reset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub beats: u64,
    pub rr_accepted: u64,
    pub rr_rejected: u64,
    pub blocks_analyzed: u64,
    pub blocks_handed_off: u64,
    pub overruns: u64,
    pub worst_tick: Duration,
    pub mean_tick: Duration,
    pub mean_bpm: Option<f32>,
    pub last_report: Option<SpectralReport>,
}

/// Drives both channels through the processing chain one sample at a time
pub struct SampleScheduler {
    config: MonitorConfig,
    ecg_filter: EcgBandFilter,
    eeg_filter: EegFilter,
    detector: PeakDetector,
    gate: BeatGate,
    rr: RrTracker,
    heart_rate: HeartRate,
    block: SpectralBlock,
    analyzer: BandPowerAnalyzer,
    spare_buffers: Vec<Vec<f32>>,
    tick_index: u64,
    beats: u64,
    handed_off: u64,
    budget: TickBudget,
    last_report: Option<SpectralReport>,
}

impl SampleScheduler {
    /// Build every stage from a validated configuration
    pub fn new(config: &MonitorConfig) -> BpResult<Self> {
        config.validate()?;

        let fs = config.sample_rate_hz;
        let block_size = config.spectral.block_size;
        let spare_buffers = match config.scheduler.analysis_mode {
            AnalysisMode::Inline => Vec::new(),
            AnalysisMode::Deferred => (0..config.scheduler.handoff_pool)
                .map(|_| Vec::with_capacity(block_size))
                .collect(),
        };

        let scheduler = Self {
            ecg_filter: EcgBandFilter::new(fs, &config.filters)?,
            eeg_filter: EegFilter::new(fs, &config.filters)?,
            detector: PeakDetector::from_config(&config.detector)?,
            gate: BeatGate::new(config.detector.refractory_ms),
            rr: RrTracker::from_config(&config.detector),
            heart_rate: HeartRate::new(config.detector.heart_rate_window),
            block: SpectralBlock::new(block_size),
            analyzer: BandPowerAnalyzer::new(fs, &config.spectral)?,
            spare_buffers,
            tick_index: 0,
            beats: 0,
            handed_off: 0,
            budget: TickBudget::for_sample_rate(fs),
            last_report: None,
            config: config.clone(),
        };

        info!(
            config = %scheduler.config.name,
            sample_rate = fs,
            block_size,
            resolution_hz = scheduler.analyzer.frequency_resolution(),
            mode = ?scheduler.config.scheduler.analysis_mode,
            "sample scheduler ready"
        );

        Ok(scheduler)
    }

    /// Process one sample stamped by the internal sample clock
    pub fn tick(&mut self, sample: RawSample) -> TickOutput {
        let timestamp = Timestamp::from_sample_index(self.tick_index, self.config.sample_rate_hz);
        self.tick_at(sample, timestamp)
    }

    /// Process one sample with an externally supplied timestamp
    pub fn tick_at(&mut self, sample: RawSample, timestamp: Timestamp) -> TickOutput {
        let timer = self.budget.start();
        self.tick_index += 1;

        // ECG path
        let ecg_filtered = self.ecg_filter.process_sample(sample.ecg);
        let warming_up = self.detector.is_warming_up();
        let raw_peak = self.detector.process(ecg_filtered);
        let peak = self.gate.update(raw_peak, timestamp);

        let mut rr_interval_ms = None;
        let mut heart_rate_bpm = None;
        if peak {
            self.beats += 1;
            match self.rr.on_beat(timestamp) {
                RrEvent::Accepted(rr) => {
                    self.heart_rate.push(rr);
                    rr_interval_ms = Some(rr);
                    heart_rate_bpm = self.heart_rate.mean_bpm();
                    trace!(%timestamp, rr_ms = rr, "beat");
                }
                RrEvent::Rejected(rr) => {
                    trace!(%timestamp, rr_ms = rr, "beat with implausible RR interval");
                }
                RrEvent::First => {
                    trace!(%timestamp, "first beat");
                }
            }
        }

        // EEG path
        let eeg_filtered = self.eeg_filter.process_sample(sample.eeg);
        let mut spectral = None;
        let mut handoff = None;
        if self.block.push(eeg_filtered) {
            match self.config.scheduler.analysis_mode {
                AnalysisMode::Inline => {
                    let report = self.analyzer.analyze(self.block.as_slice());
                    self.block.clear();
                    self.last_report = Some(report);
                    spectral = Some(report);
                }
                AnalysisMode::Deferred => {
                    let spare = self.spare_buffers.pop().unwrap_or_else(|| {
                        warn!("hand-off pool empty, allocating a block buffer");
                        Vec::with_capacity(self.block.capacity())
                    });
                    self.handed_off += 1;
                    handoff = Some(self.block.swap(spare));
                }
            }
        }

        let elapsed = timer.finish();
        if self.budget.record(elapsed) {
            let overruns = self.budget.overruns();
            if overruns.is_power_of_two() {
                warn!(
                    overruns,
                    elapsed_us = elapsed.as_micros(),
                    period_us = self.budget.period().as_micros(),
                    "tick exceeded sample period"
                );
            }
        }

        TickOutput {
            timestamp,
            ecg_filtered,
            eeg_filtered,
            raw_peak,
            peak,
            warming_up,
            rr_interval_ms,
            heart_rate_bpm,
            spectral,
            handoff,
        }
    }

    /// Return a handed-off block buffer to the pool
    pub fn recycle(&mut self, buffer: Vec<f32>) {
        if self.spare_buffers.len() < self.config.scheduler.handoff_pool {
            self.spare_buffers.push(buffer);
        }
    }

    /// Analyzer matching this scheduler's spectral settings, for deferred blocks
    pub fn deferred_analyzer(&self) -> BpResult<BandPowerAnalyzer> {
        BandPowerAnalyzer::new(self.config.sample_rate_hz, &self.config.spectral)
    }

    /// Zero every stage and restart the sample clock
    ///
    /// Blocks already handed off in deferred mode belong to the previous run.
    pub fn reset(&mut self) {
        self.ecg_filter.reset();
        self.eeg_filter.reset();
        self.detector.reset();
        self.gate.reset();
        self.rr.reset();
        self.heart_rate.reset();
        self.block.clear();
        self.analyzer.reset();
        self.tick_index = 0;
        self.beats = 0;
        self.handed_off = 0;
        self.budget.reset();
        self.last_report = None;

        info!(config = %self.config.name, "sample scheduler reset");
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn budget(&self) -> &TickBudget {
        &self.budget
    }

    /// Samples waiting in the current block
    pub fn pending_samples(&self) -> usize {
        self.block.len()
    }

    pub fn spare_buffers(&self) -> usize {
        self.spare_buffers.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.tick_index,
            beats: self.beats,
            rr_accepted: self.rr.accepted(),
            rr_rejected: self.rr.rejected(),
            blocks_analyzed: self.analyzer.blocks_analyzed(),
            blocks_handed_off: self.handed_off,
            overruns: self.budget.overruns(),
            worst_tick: self.budget.worst_tick(),
            mean_tick: self.budget.mean_tick(),
            mean_bpm: self.heart_rate.mean_bpm(),
            last_report: self.last_report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deferred_config() -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.scheduler.analysis_mode = AnalysisMode::Deferred;
        config
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = MonitorConfig::default();
        config.spectral.block_size = 100;
        assert!(SampleScheduler::new(&config).is_err());

        let mut config = deferred_config();
        config.scheduler.handoff_pool = 0;
        assert!(SampleScheduler::new(&config).is_err());
    }

    #[test]
    fn test_sample_clock() {
        let mut scheduler = SampleScheduler::new(&MonitorConfig::default()).unwrap();
        let first = scheduler.tick(RawSample::default());
        let second = scheduler.tick(RawSample::default());

        assert_eq!(first.timestamp, Timestamp::ZERO);
        assert_eq!(second.timestamp.as_micros(), 2_000);
        assert_eq!(scheduler.stats().ticks, 2);
    }

    #[test]
    fn test_inline_block_cadence() {
        let mut scheduler = SampleScheduler::new(&MonitorConfig::default()).unwrap();

        let mut completed = Vec::new();
        for i in 0..1024 {
            let out = scheduler.tick(RawSample::new(0.0, (i as f32 * 0.3).sin()));
            assert!(out.handoff.is_none());
            if let Some(report) = out.spectral {
                completed.push((i, report.block_index));
            }
        }

        assert_eq!(completed, vec![(255, 0), (511, 1), (767, 2), (1023, 3)]);
        assert_eq!(scheduler.pending_samples(), 0);
        assert_eq!(scheduler.stats().blocks_analyzed, 4);
        assert!(scheduler.stats().last_report.is_some());
    }

    #[test]
    fn test_deferred_handoff_and_recycle() {
        let mut scheduler = SampleScheduler::new(&deferred_config()).unwrap();
        assert_eq!(scheduler.spare_buffers(), 2);

        let mut handed = Vec::new();
        for i in 0..768 {
            let out = scheduler.tick(RawSample::new(0.0, i as f32));
            assert!(out.spectral.is_none());
            if let Some(block) = out.handoff {
                handed.push(block);
            }
        }

        assert_eq!(handed.len(), 3);
        assert!(handed.iter().all(|block| block.len() == 256));
        assert_eq!(scheduler.pending_samples(), 0);
        // Third hand-off found the pool empty and allocated
        assert_eq!(scheduler.spare_buffers(), 0);
        assert_eq!(scheduler.stats().blocks_handed_off, 3);

        let mut analyzer = scheduler.deferred_analyzer().unwrap();
        for block in handed {
            analyzer.analyze(&block);
            scheduler.recycle(block);
        }
        assert_eq!(analyzer.blocks_analyzed(), 3);
        // Pool is capped at its configured size
        assert_eq!(scheduler.spare_buffers(), 2);
    }

    #[test]
    fn test_deferred_matches_inline() {
        let mut inline = SampleScheduler::new(&MonitorConfig::default()).unwrap();
        let mut deferred = SampleScheduler::new(&deferred_config()).unwrap();
        let mut analyzer = deferred.deferred_analyzer().unwrap();

        let mut inline_reports = Vec::new();
        let mut deferred_reports = Vec::new();
        for i in 0..1024 {
            let sample = RawSample::new(0.0, (2.0 * std::f32::consts::PI * 10.0 * i as f32 / 500.0).sin());
            if let Some(report) = inline.tick(sample).spectral {
                inline_reports.push(report);
            }
            if let Some(block) = deferred.tick(sample).handoff {
                deferred_reports.push(analyzer.analyze(&block));
                deferred.recycle(block);
            }
        }

        assert_eq!(inline_reports, deferred_reports);
    }

    #[test]
    fn test_reset_restarts_everything() {
        let mut scheduler = SampleScheduler::new(&MonitorConfig::default()).unwrap();
        let input: Vec<RawSample> = (0..600)
            .map(|i| RawSample::new(if i % 400 < 10 { 1.0 } else { 0.0 }, (i as f32 * 0.1).sin()))
            .collect();

        let first: Vec<TickOutput> = input.iter().map(|s| scheduler.tick(*s)).collect();
        scheduler.reset();
        assert_eq!(scheduler.stats().ticks, 0);
        assert_eq!(scheduler.pending_samples(), 0);
        assert!(scheduler.stats().last_report.is_none());

        let second: Vec<TickOutput> = input.iter().map(|s| scheduler.tick(*s)).collect();
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.timestamp, b.timestamp);
            assert_eq!(a.ecg_filtered, b.ecg_filtered);
            assert_eq!(a.raw_peak, b.raw_peak);
            assert_eq!(a.peak, b.peak);
            assert_eq!(a.spectral, b.spectral);
        }
    }

    #[test]
    fn test_warm_up_flags_clear_after_first_cycle_and_blocks() {
        let mut scheduler = SampleScheduler::new(&MonitorConfig::default()).unwrap();
        let buffer_len = scheduler.config().detector.buffer_len;

        let mut block_flags = Vec::new();
        for i in 0..1024 {
            let out = scheduler.tick(RawSample::new(0.0, (i as f32 * 0.3).sin()));
            assert_eq!(out.warming_up, i < buffer_len, "tick {}", i);
            if let Some(report) = out.spectral {
                block_flags.push(report.warming_up);
            }
        }
        assert_eq!(block_flags, vec![true, true, true, false]);

        scheduler.reset();
        assert!(scheduler.tick(RawSample::default()).warming_up);
    }

    #[test]
    fn test_external_timestamps() {
        let mut scheduler = SampleScheduler::new(&MonitorConfig::default()).unwrap();
        let out = scheduler.tick_at(RawSample::default(), Timestamp::from_millis(1234));
        assert_eq!(out.timestamp.as_millis(), 1234);
    }

    #[test]
    fn test_budget_counts_every_tick() {
        let mut scheduler = SampleScheduler::new(&MonitorConfig::default()).unwrap();
        for _ in 0..300 {
            scheduler.tick(RawSample::default());
        }
        let budget = scheduler.budget();
        assert_eq!(budget.ticks(), 300);
        assert!(budget.overruns() <= 300);
        assert!(budget.worst_tick() >= budget.mean_tick());
    }
}
