//! Drives the sample scheduler from a simulated front end

use anyhow::{Context, Result};
use biopulse_core::{Band, SignalChunk};
use biopulse_dsp::{
    AnalysisMode, BandPowerAnalyzer, MonitorConfig, SampleScheduler, SchedulerStats,
    SpectralReport, TickOutput,
};
use biopulse_simulation::{
    start_sample_stream, BiosignalSimulator, EcgPattern, EegPattern, NoiseConfig,
    SimulatorConfig, StreamCommand, StreamConfig,
};
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Samples per generated chunk in offline mode
const OFFLINE_CHUNK_MS: u64 = 100;

/// Blocks queued for the deferred analysis task
const DEFERRED_QUEUE: usize = 8;

/// Signal source settings for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub seconds: f32,
    pub realtime: bool,
    pub heart_bpm: f32,
    pub noise_std: f32,
    pub mains_hum: f32,
    pub eeg: EegPattern,
    pub seed: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seconds: 30.0,
            realtime: false,
            heart_bpm: 75.0,
            noise_std: 0.0,
            mains_hum: 0.0,
            eeg: EegPattern::relaxed(),
            seed: None,
        }
    }
}

impl RunOptions {
    fn simulator_config(&self, config: &MonitorConfig) -> SimulatorConfig {
        SimulatorConfig {
            sample_rate_hz: config.sample_rate_hz,
            ecg: EcgPattern::at_heart_rate(self.heart_bpm),
            eeg: self.eeg.clone(),
            noise: NoiseConfig {
                gaussian_std: self.noise_std,
                mains_amplitude: self.mains_hum,
                mains_hz: config.filters.mains_hz,
            },
            seed: self.seed,
        }
    }

    fn total_samples(&self, config: &MonitorConfig) -> usize {
        (self.seconds.max(0.0) as f64 * config.sample_rate_hz as f64).round() as usize
    }
}

/// What a finished run reports
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub config: String,
    pub seconds: f32,
    pub stats: SchedulerStats,
    /// Latest report, from whichever context analyzed the blocks
    pub last_report: Option<SpectralReport>,
    pub deferred_blocks: u64,
    /// Blocks lost because the deferred queue was full or closed
    pub deferred_dropped: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "Run summary ({}, {:.1}s)", self.config, self.seconds)?;
        writeln!(f, "  ticks:          {}", stats.ticks)?;
        writeln!(f, "  beats:          {}", stats.beats)?;
        writeln!(
            f,
            "  RR intervals:   {} accepted, {} rejected",
            stats.rr_accepted, stats.rr_rejected
        )?;
        match stats.mean_bpm {
            Some(bpm) => writeln!(f, "  mean rate:      {:.1} BPM", bpm)?,
            None => writeln!(f, "  mean rate:      -")?,
        }
        writeln!(
            f,
            "  blocks:         {} inline, {} deferred, {} dropped",
            stats.blocks_analyzed, self.deferred_blocks, self.deferred_dropped
        )?;
        if let Some(report) = &self.last_report {
            let percentages = report.percentages();
            for band in Band::ALL {
                writeln!(f, "  {:<6}          {:5.1}%", band.name(), percentages[band.index()])?;
            }
            writeln!(f, "  beta/alpha:     {:.3}", report.beta_alpha_ratio())?;
        }
        writeln!(
            f,
            "  tick overruns:  {} (worst {}µs, mean {}µs)",
            stats.overruns,
            stats.worst_tick.as_micros(),
            stats.mean_tick.as_micros()
        )
    }
}

/// Blocks analyzed off the tick path
struct DeferredAnalysis {
    blocks: mpsc::Sender<Vec<f32>>,
    returned: mpsc::Receiver<Vec<f32>>,
    task: JoinHandle<(u64, Option<SpectralReport>)>,
    dropped: u64,
}

impl DeferredAnalysis {
    fn spawn(mut analyzer: BandPowerAnalyzer, queue: usize) -> Self {
        let (blocks, mut incoming) = mpsc::channel::<Vec<f32>>(queue);
        let (give_back, returned) = mpsc::channel::<Vec<f32>>(queue);

        let task = tokio::spawn(async move {
            let mut last = None;
            while let Some(block) = incoming.recv().await {
                let report = analyzer.analyze(&block);
                log_report(&report);
                last = Some(report);
                // The producer may already be gone at shutdown
                let _ = give_back.send(block).await;
            }
            (analyzer.blocks_analyzed(), last)
        });

        Self {
            blocks,
            returned,
            task,
            dropped: 0,
        }
    }
}

/// Scheduler plus its optional deferred analysis task
pub struct Monitor {
    scheduler: SampleScheduler,
    deferred: Option<DeferredAnalysis>,
}

impl Monitor {
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        Self::with_queue(config, DEFERRED_QUEUE)
    }

    /// Monitor whose deferred task buffers at most `queue` blocks
    fn with_queue(config: &MonitorConfig, queue: usize) -> Result<Self> {
        let scheduler = SampleScheduler::new(config).context("Failed to build processing chain")?;
        let deferred = match config.scheduler.analysis_mode {
            AnalysisMode::Inline => None,
            AnalysisMode::Deferred => Some(DeferredAnalysis::spawn(
                scheduler
                    .deferred_analyzer()
                    .context("Failed to build deferred analyzer")?,
                queue.max(1),
            )),
        };
        Ok(Self {
            scheduler,
            deferred,
        })
    }

    /// Tick every sample of a chunk
    pub fn process_chunk(&mut self, chunk: &SignalChunk) {
        self.process_samples(chunk, chunk.len());
    }

    fn process_samples(&mut self, chunk: &SignalChunk, limit: usize) {
        if let Some(deferred) = &mut self.deferred {
            while let Ok(buffer) = deferred.returned.try_recv() {
                self.scheduler.recycle(buffer);
            }
        }

        for sample in chunk.samples().take(limit) {
            let out = self.scheduler.tick(sample);
            self.handle_output(out);
        }
    }

    fn handle_output(&mut self, out: TickOutput) {
        if let (Some(rr), Some(bpm)) = (out.rr_interval_ms, out.heart_rate_bpm) {
            debug!(at = %out.timestamp, rr_ms = rr, bpm, warming_up = out.warming_up, "heartbeat");
        }

        if let Some(report) = &out.spectral {
            log_report(report);
        }

        if let Some(block) = out.handoff {
            match &mut self.deferred {
                Some(deferred) => match deferred.blocks.try_send(block) {
                    Ok(()) => {}
                    Err(TrySendError::Full(block)) | Err(TrySendError::Closed(block)) => {
                        deferred.dropped += 1;
                        warn!(
                            dropped = deferred.dropped,
                            "deferred analysis queue unavailable, dropping block"
                        );
                        self.scheduler.recycle(block);
                    }
                },
                None => self.scheduler.recycle(block),
            }
        }
    }

    /// Wait for outstanding deferred blocks and summarize
    pub async fn finish(self, seconds: f32) -> Result<RunSummary> {
        let stats = self.scheduler.stats();
        let mut summary = RunSummary {
            config: self.scheduler.config().name.clone(),
            seconds,
            stats,
            last_report: stats.last_report,
            deferred_blocks: 0,
            deferred_dropped: 0,
        };

        if let Some(deferred) = self.deferred {
            let DeferredAnalysis {
                blocks,
                returned,
                task,
                dropped,
            } = deferred;
            drop(blocks);
            drop(returned);
            let (count, last) = task.await.context("Deferred analysis task failed")?;
            summary.deferred_blocks = count;
            summary.deferred_dropped = dropped;
            summary.last_report = last;
        }

        Ok(summary)
    }
}

fn log_report(report: &SpectralReport) {
    let [delta, theta, alpha, beta, gamma] = report.percentages();
    info!(
        block = report.block_index,
        delta = format_args!("{:.1}%", delta),
        theta = format_args!("{:.1}%", theta),
        alpha = format_args!("{:.1}%", alpha),
        beta = format_args!("{:.1}%", beta),
        gamma = format_args!("{:.1}%", gamma),
        beta_alpha = format_args!("{:.3}", report.beta_alpha_ratio()),
        warming_up = report.warming_up,
        "band powers"
    );
}

/// Process `options.seconds` of simulated signal
pub async fn run(config: &MonitorConfig, options: &RunOptions) -> Result<RunSummary> {
    let mut monitor = Monitor::new(config)?;
    let sim_config = options.simulator_config(config);
    let total = options.total_samples(config);

    info!(
        seconds = options.seconds,
        realtime = options.realtime,
        heart_bpm = options.heart_bpm,
        ecg = %sim_config.ecg.description(),
        mode = ?config.scheduler.analysis_mode,
        "starting run"
    );

    if options.realtime {
        run_realtime(&mut monitor, sim_config, total).await?;
    } else {
        run_offline(&mut monitor, sim_config, total).await?;
    }

    monitor.finish(options.seconds).await
}

async fn run_offline(monitor: &mut Monitor, sim_config: SimulatorConfig, total: usize) -> Result<()> {
    let chunk_samples =
        ((OFFLINE_CHUNK_MS as f64 / 1000.0) * sim_config.sample_rate_hz as f64).round() as usize;
    let mut simulator = BiosignalSimulator::new(sim_config).context("Invalid simulation settings")?;

    let mut remaining = total;
    while remaining > 0 {
        let count = remaining.min(chunk_samples.max(1));
        let chunk = simulator.generate_samples(count)?;
        monitor.process_chunk(&chunk);
        remaining -= count;
        // Let the deferred task keep up
        tokio::task::yield_now().await;
    }
    Ok(())
}

async fn run_realtime(monitor: &mut Monitor, sim_config: SimulatorConfig, total: usize) -> Result<()> {
    let mut stream = start_sample_stream(StreamConfig {
        simulator: sim_config,
        ..StreamConfig::default()
    })
    .context("Failed to start sample stream")?;

    stream.control.send(StreamCommand::Start).await?;

    let mut remaining = total;
    while remaining > 0 {
        match stream.data.recv().await {
            Ok(chunk) => {
                let count = remaining.min(chunk.len());
                monitor.process_samples(&chunk, count);
                remaining -= count;
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "processing fell behind the stream, chunks skipped");
            }
            Err(RecvError::Closed) => break,
        }
    }

    stream.control.send(StreamCommand::Shutdown).await?;
    stream.task.await.context("Sample stream task panicked")??;
    Ok(())
}
