//! Fixed-rate sample streaming
//!
//! A [`SampleStream`] emits one [`SignalChunk`] per chunk period on a
//! broadcast channel, so consumers see samples at the acquisition rate.

use crate::biosignal_simulator::{BiosignalSimulator, SimulatorConfig};
use biopulse_core::{BpResult, Duration as SampleDuration, SignalChunk};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for real-time streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub simulator: SimulatorConfig,
    /// Time covered by one chunk (ms)
    pub chunk_ms: u64,
    /// Chunks buffered per subscriber before it starts lagging
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            chunk_ms: 100,
            buffer_size: 64,
        }
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamCommand {
    Start,
    /// Halt and rewind the simulator clock
    Stop,
    Pause,
    Resume,
    SetHeartRate(f32),
    /// End the streaming task
    Shutdown,
}

/// Stream statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub chunks_generated: u64,
    pub samples_generated: u64,
    pub heart_rate_bpm: Option<f32>,
    /// Generation time of the latest chunk (µs)
    pub last_chunk_time_us: u64,
}

/// Simulated acquisition front end
pub struct SampleStream {
    config: StreamConfig,
    simulator: BiosignalSimulator,
    data_sender: broadcast::Sender<SignalChunk>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    stats_sender: watch::Sender<StreamStats>,
    running: bool,
}

impl SampleStream {
    /// Create a stream and the sender that controls it
    ///
    /// The stream ends once every clone of the sender has been dropped.
    pub fn new(config: StreamConfig) -> BpResult<(Self, mpsc::Sender<StreamCommand>)> {
        let simulator = BiosignalSimulator::new(config.simulator.clone())?;
        let (data_sender, _) = broadcast::channel(config.buffer_size.max(1));
        let (control_sender, control_receiver) = mpsc::channel(32);
        let (stats_sender, _) = watch::channel(StreamStats {
            heart_rate_bpm: simulator.heart_rate_bpm(),
            ..StreamStats::default()
        });

        let stream = Self {
            config,
            simulator,
            data_sender,
            control_receiver,
            stats_sender,
            running: false,
        };
        Ok((stream, control_sender))
    }

    /// Get a receiver for data updates
    pub fn subscribe(&self) -> broadcast::Receiver<SignalChunk> {
        self.data_sender.subscribe()
    }

    pub fn stats(&self) -> watch::Receiver<StreamStats> {
        self.stats_sender.subscribe()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Run until [`StreamCommand::Shutdown`] or until the control senders are gone
    pub async fn run(&mut self) -> BpResult<()> {
        let chunk_period = Duration::from_millis(self.config.chunk_ms.max(1));
        let chunk_duration = SampleDuration::from(chunk_period);
        let mut ticker = interval(chunk_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        info!(
            chunk_ms = self.config.chunk_ms,
            sample_rate = self.config.simulator.sample_rate_hz,
            "sample stream ready"
        );

        loop {
            tokio::select! {
                _ = ticker.tick(), if self.running => {
                    let started = Instant::now();
                    let chunk = self.simulator.generate_chunk(chunk_duration)?;
                    let elapsed = started.elapsed();

                    self.stats_sender.send_modify(|stats| {
                        stats.chunks_generated += 1;
                        stats.samples_generated += chunk.len() as u64;
                        stats.last_chunk_time_us = elapsed.as_micros() as u64;
                    });

                    if elapsed > chunk_period {
                        warn!(
                            elapsed_us = elapsed.as_micros() as u64,
                            chunk_ms = self.config.chunk_ms,
                            "chunk generation slower than real time"
                        );
                    }

                    // No receivers is not an error
                    let _ = self.data_sender.send(chunk);
                }

                command = self.control_receiver.recv() => {
                    match command {
                        Some(StreamCommand::Start) | Some(StreamCommand::Resume) => {
                            if !self.running {
                                ticker.reset();
                                self.set_running(true);
                                info!("sample stream running");
                            }
                        }
                        Some(StreamCommand::Pause) => {
                            self.set_running(false);
                            info!("sample stream paused");
                        }
                        Some(StreamCommand::Stop) => {
                            self.set_running(false);
                            self.simulator.reset_time();
                            self.stats_sender.send_modify(|stats| {
                                stats.chunks_generated = 0;
                                stats.samples_generated = 0;
                            });
                            info!("sample stream stopped");
                        }
                        Some(StreamCommand::SetHeartRate(bpm)) => {
                            match self.simulator.set_heart_rate(bpm) {
                                Ok(()) => {
                                    self.stats_sender.send_modify(|stats| stats.heart_rate_bpm = Some(bpm));
                                    info!(bpm, "simulated heart rate changed");
                                }
                                Err(e) => warn!(bpm, error = %e, "heart rate change rejected"),
                            }
                        }
                        Some(StreamCommand::Shutdown) | None => {
                            debug!("sample stream shutting down");
                            break;
                        }
                    }
                }
            }
        }

        self.set_running(false);
        Ok(())
    }

    fn set_running(&mut self, running: bool) {
        self.running = running;
        self.stats_sender.send_modify(|stats| stats.is_running = running);
    }
}

/// Handles to a stream running in a background task
pub struct StreamHandle {
    pub data: broadcast::Receiver<SignalChunk>,
    pub control: mpsc::Sender<StreamCommand>,
    pub stats: watch::Receiver<StreamStats>,
    pub task: JoinHandle<BpResult<()>>,
}

/// Create a stream and run it on the current runtime
///
/// The stream starts paused; send [`StreamCommand::Start`] to begin.
pub fn start_sample_stream(config: StreamConfig) -> BpResult<StreamHandle> {
    let (mut stream, control) = SampleStream::new(config)?;
    let data = stream.subscribe();
    let stats = stream.stats();

    let task = tokio::spawn(async move {
        let result = stream.run().await;
        if let Err(e) = &result {
            warn!(error = %e, "sample stream failed");
        }
        result
    });

    Ok(StreamHandle {
        data,
        control,
        stats,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use biopulse_core::Timestamp;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::sleep;

    fn fast_config() -> StreamConfig {
        StreamConfig {
            simulator: SimulatorConfig {
                seed: Some(1),
                ..SimulatorConfig::default()
            },
            chunk_ms: 20,
            buffer_size: 64,
        }
    }

    #[tokio::test]
    async fn test_stream_emits_contiguous_chunks() {
        let mut handle = start_sample_stream(fast_config()).unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();

        let mut chunks = Vec::new();
        for _ in 0..3 {
            chunks.push(handle.data.recv().await.unwrap());
        }

        assert_eq!(chunks[0].start, Timestamp::ZERO);
        for chunk in &chunks {
            assert_eq!(chunk.len(), 10);
            assert_eq!(chunk.sample_rate, 500.0);
        }
        assert_eq!(chunks[1].start, chunks[0].end());
        assert_eq!(chunks[2].start, chunks[1].end());

        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        assert!(handle.task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_pause_halts_output() {
        let mut handle = start_sample_stream(fast_config()).unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();
        handle.data.recv().await.unwrap();

        handle.control.send(StreamCommand::Pause).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        while handle.data.try_recv().is_ok() {}
        assert!(!handle.stats.borrow().is_running);

        sleep(Duration::from_millis(100)).await;
        assert!(matches!(handle.data.try_recv(), Err(TryRecvError::Empty)));

        handle.control.send(StreamCommand::Resume).await.unwrap();
        assert!(handle.data.recv().await.is_ok());

        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        handle.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stop_rewinds_clock() {
        let mut handle = start_sample_stream(fast_config()).unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();
        handle.data.recv().await.unwrap();
        handle.data.recv().await.unwrap();

        handle.control.send(StreamCommand::Stop).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        while handle.data.try_recv().is_ok() {}
        assert_eq!(handle.stats.borrow().chunks_generated, 0);

        handle.control.send(StreamCommand::Start).await.unwrap();
        let chunk = handle.data.recv().await.unwrap();
        assert_eq!(chunk.start, Timestamp::ZERO);

        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        handle.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_heart_rate_command() {
        let mut handle = start_sample_stream(fast_config()).unwrap();
        assert_eq!(handle.stats.borrow().heart_rate_bpm, Some(75.0));

        handle.control.send(StreamCommand::SetHeartRate(90.0)).await.unwrap();
        handle.stats.changed().await.unwrap();
        assert_eq!(handle.stats.borrow().heart_rate_bpm, Some(90.0));

        // Out of range requests leave the rate unchanged
        handle.control.send(StreamCommand::SetHeartRate(1000.0)).await.unwrap();
        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        handle.task.await.unwrap().unwrap();
        assert_eq!(handle.stats.borrow().heart_rate_bpm, Some(90.0));
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let (mut stream, control) = SampleStream::new(fast_config()).unwrap();
        let stats = stream.stats();
        control.send(StreamCommand::Shutdown).await.unwrap();

        assert!(stream.run().await.is_ok());
        assert_eq!(stats.borrow().chunks_generated, 0);
        assert!(!stats.borrow().is_running);
    }

    #[tokio::test]
    async fn test_dropping_control_ends_stream() {
        let handle = start_sample_stream(fast_config()).unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();
        sleep(Duration::from_millis(30)).await;

        drop(handle.control);
        assert!(handle.task.await.unwrap().is_ok());
        assert!(!handle.stats.borrow().is_running);
    }
}
