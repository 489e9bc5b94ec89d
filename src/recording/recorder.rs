//! Background writer draining captured frames to disk.

use super::config::{RecordingConfig, RecordingStats};
use super::writer;
use crate::device::AlignedFrameData;
use crate::errors::{Result, SenseError};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Invoked on the writer thread once the queue has drained after recording
/// was turned off.
pub type CompletionCallback = Box<dyn FnOnce(&RecordingStats) + Send + 'static>;

/// Saves copies of acquired frames on a dedicated thread.
///
/// Frames are queued by value so the acquisition buffer can be overwritten
/// immediately. A full queue drops the incoming frame. Write failures are
/// counted and logged but never reach the producer.
pub struct Recorder {
    sender: Option<Sender<AlignedFrameData>>,
    worker: Option<JoinHandle<RecordingStats>>,
    dropped: Arc<AtomicU64>,
    directory: PathBuf,
}

impl Recorder {
    pub fn start(config: RecordingConfig) -> Result<Self> {
        Self::start_with_completion(config, None)
    }

    pub fn start_with_completion(
        config: RecordingConfig,
        on_complete: Option<CompletionCallback>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&config.directory).map_err(|e| {
            SenseError::recording(format!(
                "cannot create recording directory {}: {}",
                config.directory.display(),
                e
            ))
        })?;

        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let directory = config.directory.clone();
        let dropped = Arc::new(AtomicU64::new(0));
        let worker_dropped = dropped.clone();

        let worker = std::thread::Builder::new()
            .name("crabsense-recorder".to_string())
            .spawn(move || {
                let mut stats = write_loop(&config.directory, receiver);
                stats.frames_dropped = worker_dropped.load(Ordering::Relaxed);
                if let Some(callback) = on_complete {
                    callback(&stats);
                }
                stats
            })
            .map_err(|e| SenseError::recording(format!("spawn failed: {e}")))?;

        log::info!("Recording started in {}", directory.display());
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            dropped,
            directory,
        })
    }

    /// Queue a copy of `frame`. Returns `false` when the frame was dropped.
    pub fn push(&self, frame: &AlignedFrameData) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(frame.snapshot()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!(
                    "Recording queue full, dropped frame {} ({} dropped so far)",
                    frame.frame_number,
                    dropped
                );
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("Recording writer exited unexpectedly");
                false
            }
        }
    }

    pub fn directory(&self) -> &std::path::Path {
        &self.directory
    }

    /// Stop accepting frames, wait for the queue to drain and return the
    /// final statistics.
    pub fn finish(mut self) -> Result<RecordingStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<RecordingStats> {
        drop(self.sender.take());
        let worker = self
            .worker
            .take()
            .ok_or_else(|| SenseError::recording("recording already finished"))?;
        let stats = worker
            .join()
            .map_err(|_| SenseError::recording("recording writer panicked"))?;
        log::info!(
            "Recording finished: {} written, {} dropped, {} failed",
            stats.frames_written,
            stats.frames_dropped,
            stats.write_failures
        );
        Ok(stats)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.shutdown() {
                log::warn!("Error finishing recording in drop: {}", e);
            }
        }
    }
}

fn write_loop(directory: &std::path::Path, receiver: Receiver<AlignedFrameData>) -> RecordingStats {
    let started = Instant::now();
    let mut stats = RecordingStats::new(directory);
    let mut index = 0u64;

    // Every frame consumes an index so a failing slot cannot block later frames.
    for frame in receiver.iter() {
        match writer::write_frame_pair(directory, index, &frame.color_data, &frame.depth_data) {
            Ok(()) => {
                log::debug!("Saved frame {} as pair {}", frame.frame_number, index);
                stats.frames_written += 1;
            }
            Err(e) => {
                log::error!("Failed to save frame {}: {}", frame.frame_number, e);
                writer::remove_frame_pair(directory, index);
                stats.write_failures += 1;
                stats.first_error.get_or_insert_with(|| e.to_string());
            }
        }
        index += 1;
    }

    stats.duration_secs = started.elapsed().as_secs_f64();
    stats
}
