use super::frame::AlignedFrameData;
use crate::device_config::DeviceConfig;
use crate::errors::{Result, SenseError};
use crate::geometry::CoordinateMapper;
use crate::pipeline::{ActiveProfile, CameraPipeline, FrameSet};
use crate::recording::{CompletionCallback, Recorder, RecordingConfig, RecordingStats};
use crate::types::StreamKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Subscriber invoked on the acquisition thread for every delivered frame.
pub type FrameCallback = Box<dyn FnMut(&AlignedFrameData) + Send + 'static>;

/// Handle returned by [`DepthDevice::on_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Counters of the acquisition loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub frames_delivered: u64,
    pub cycles_skipped: u64,
}

type Subscribers = Arc<Mutex<Vec<(SubscriptionId, FrameCallback)>>>;
type SharedRecorder = Arc<Mutex<Option<Recorder>>>;
type Worker = JoinHandle<Option<Box<dyn CameraPipeline>>>;

/// Consecutive driver failures after which the loop logs an error once.
const FAILURE_REPORT_THRESHOLD: u32 = 100;
const FAILURE_BACKOFF: Duration = Duration::from_millis(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    skipped: AtomicU64,
}

struct Session {
    stop_flag: Arc<AtomicBool>,
    worker: Worker,
    active: ActiveProfile,
    mapper: Option<CoordinateMapper>,
}

/// Streams aligned color/depth frames from a [`CameraPipeline`].
///
/// `open` starts the driver and one acquisition thread; every cycle the
/// thread waits for a frame set, copies color, aligns depth to color, copies
/// the aligned depth and calls each subscriber with the shared
/// [`AlignedFrameData`]. `close` (also run on drop) blocks until the thread
/// has exited, after which no callback fires.
///
/// Callbacks run while the subscriber list is locked. They must not call
/// back into the device and must copy the frame if they need it later.
pub struct DepthDevice {
    pipeline: Option<Box<dyn CameraPipeline>>,
    config: Option<DeviceConfig>,
    session: Option<Session>,
    subscribers: Subscribers,
    next_subscription: AtomicU64,
    recorder: SharedRecorder,
    counters: Arc<Counters>,
    streaming: bool,
}

impl DepthDevice {
    pub fn new(pipeline: Box<dyn CameraPipeline>) -> Self {
        Self {
            pipeline: Some(pipeline),
            config: None,
            session: None,
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_subscription: AtomicU64::new(1),
            recorder: Arc::new(Mutex::new(None)),
            counters: Arc::new(Counters::default()),
            streaming: false,
        }
    }

    /// Configuration used by the next `open(None)`.
    pub fn with_config(mut self, config: DeviceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Start streaming.
    ///
    /// Uses `config`, else the stored configuration, else
    /// [`DeviceConfig::default_streams`]. Opening an open device fails with
    /// [`SenseError::AlreadyOpen`].
    pub fn open(&mut self, config: Option<DeviceConfig>) -> Result<()> {
        if self.session.is_some() {
            return Err(SenseError::AlreadyOpen);
        }
        let mut pipeline = self
            .pipeline
            .take()
            .ok_or_else(|| SenseError::pipeline("camera pipeline was lost by a previous session"))?;

        let mut config = config
            .or_else(|| self.config.take())
            .unwrap_or_else(DeviceConfig::default_streams);
        let pipeline_config = config.to_pipeline_config();

        let active = match pipeline.start(&pipeline_config) {
            Ok(active) => active,
            Err(e) => {
                self.pipeline = Some(pipeline);
                self.config = Some(config);
                return Err(e);
            }
        };
        config.profiles = active.requests();

        let Some(color) = active.stream(StreamKind::Color).copied() else {
            log::error!("Negotiated profile has no color stream");
            shutdown_pipeline(pipeline.as_mut());
            self.pipeline = Some(pipeline);
            self.config = Some(config);
            return Err(SenseError::configuration("negotiated profile has no color stream"));
        };
        if active.stream(StreamKind::Depth).is_none() {
            log::error!("Negotiated profile has no depth stream");
            shutdown_pipeline(pipeline.as_mut());
            self.pipeline = Some(pipeline);
            self.config = Some(config);
            return Err(SenseError::configuration("negotiated profile has no depth stream"));
        }

        let frame = AlignedFrameData::new(color.intrinsics.width, color.intrinsics.height);
        let mapper = CoordinateMapper::from_device_config(&active, &config);
        if mapper.is_none() {
            log::warn!("No coordinate mapper available for the negotiated streams");
        }

        self.counters.delivered.store(0, Ordering::Relaxed);
        self.counters.skipped.store(0, Ordering::Relaxed);

        let stop_flag = Arc::new(AtomicBool::new(false));
        let spawned = {
            let stop_flag = stop_flag.clone();
            let subscribers = self.subscribers.clone();
            let recorder = self.recorder.clone();
            let counters = self.counters.clone();
            spawn_worker(
                std::thread::Builder::new().name("crabsense-acquisition".to_string()),
                pipeline,
                move |pipeline| {
                    acquisition_loop(pipeline, frame, &stop_flag, &subscribers, &recorder, &counters)
                },
            )
        };
        let worker = match spawned {
            Ok(worker) => worker,
            Err((mut pipeline, e)) => {
                log::error!("Failed to start acquisition thread: {}", e);
                shutdown_pipeline(pipeline.as_mut());
                self.pipeline = Some(pipeline);
                self.config = Some(config);
                return Err(SenseError::pipeline(format!("spawn failed: {e}")));
            }
        };

        log::info!(
            "Device open: {} streams, color {}x{}",
            active.streams.len(),
            color.intrinsics.width,
            color.intrinsics.height
        );

        self.session = Some(Session {
            stop_flag,
            worker,
            active,
            mapper,
        });
        self.config = Some(config);
        self.streaming = true;
        Ok(())
    }

    /// Stop streaming and release the driver.
    ///
    /// Blocks until an in-flight callback returns and the acquisition thread
    /// has exited. Safe to call on a device that was never opened, and
    /// idempotent. Subscribers are removed; an active recording is finished.
    pub fn close(&mut self) {
        lock(&self.subscribers).clear();

        if let Some(session) = self.session.take() {
            session.stop_flag.store(true, Ordering::Release);
            match session.worker.join() {
                Ok(Some(mut pipeline)) => {
                    shutdown_pipeline(pipeline.as_mut());
                    self.pipeline = Some(pipeline);
                }
                Ok(None) => log::error!("Acquisition thread never received the camera pipeline"),
                Err(_) => log::error!("Acquisition thread panicked; camera pipeline lost"),
            }
            log::info!(
                "Device closed after {} frames",
                self.counters.delivered.load(Ordering::Relaxed)
            );
        }

        if let Some(recorder) = lock(&self.recorder).take() {
            if let Err(e) = recorder.finish() {
                log::warn!("Error finishing recording during close: {}", e);
            }
        }

        self.streaming = false;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Current configuration; after `open` its profiles are the negotiated ones.
    pub fn config(&self) -> Option<&DeviceConfig> {
        self.config.as_ref()
    }

    pub fn active_profile(&self) -> Option<&ActiveProfile> {
        self.session.as_ref().map(|s| &s.active)
    }

    /// Mapper of the open session, if its color and depth streams were found.
    pub fn coordinate_mapper(&self) -> Option<&CoordinateMapper> {
        self.session.as_ref().and_then(|s| s.mapper.as_ref())
    }

    /// Meters per raw depth unit of the open session.
    pub fn depth_scale(&self) -> Option<f32> {
        self.active_profile().map(|a| a.depth_scale)
    }

    pub fn stats(&self) -> AcquisitionStats {
        AcquisitionStats {
            frames_delivered: self.counters.delivered.load(Ordering::Relaxed),
            cycles_skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Register a callback for every delivered frame.
    pub fn on_frame<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&AlignedFrameData) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        lock(&self.subscribers).push((id, Box::new(callback)));
        id
    }

    /// Remove a callback; blocks while a dispatch is in progress.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Save a copy of every subsequent frame under `directory`. The device
    /// must be open; closing it finishes the recording.
    pub fn start_recording(&self, directory: impl Into<PathBuf>) -> Result<()> {
        self.start_recording_with(RecordingConfig::new(directory), None)
    }

    /// `on_complete` runs on the writer thread once the queue has drained.
    pub fn start_recording_with(
        &self,
        config: RecordingConfig,
        on_complete: Option<CompletionCallback>,
    ) -> Result<()> {
        if self.session.is_none() {
            return Err(SenseError::NotOpen);
        }
        let mut slot = lock(&self.recorder);
        if slot.is_some() {
            return Err(SenseError::recording("already recording"));
        }
        *slot = Some(Recorder::start_with_completion(config, on_complete)?);
        Ok(())
    }

    /// Stop queueing frames and wait until every queued frame is written.
    pub fn stop_recording(&self) -> Result<RecordingStats> {
        let recorder = lock(&self.recorder)
            .take()
            .ok_or_else(|| SenseError::recording("not recording"))?;
        recorder.finish()
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.recorder).is_some()
    }
}

impl Drop for DepthDevice {
    fn drop(&mut self) {
        self.close();
    }
}

fn shutdown_pipeline(pipeline: &mut dyn CameraPipeline) {
    if let Err(e) = pipeline.stop() {
        log::warn!("Error stopping camera pipeline: {}", e);
    }
    pipeline.release();
}

/// Start `body` on a new thread and hand it the pipeline once the thread
/// exists. On failure the pipeline is returned to the caller.
fn spawn_worker<F>(
    builder: std::thread::Builder,
    pipeline: Box<dyn CameraPipeline>,
    body: F,
) -> std::result::Result<Worker, (Box<dyn CameraPipeline>, std::io::Error)>
where
    F: FnOnce(Box<dyn CameraPipeline>) -> Box<dyn CameraPipeline> + Send + 'static,
{
    let (handoff, receiver) = crossbeam_channel::bounded::<Box<dyn CameraPipeline>>(1);
    let worker = match builder.spawn(move || receiver.recv().ok().map(body)) {
        Ok(worker) => worker,
        Err(e) => return Err((pipeline, e)),
    };
    match handoff.send(pipeline) {
        Ok(()) => Ok(worker),
        Err(returned) => {
            let _ = worker.join();
            Err((
                returned.into_inner(),
                std::io::Error::new(std::io::ErrorKind::Other, "acquisition thread exited early"),
            ))
        }
    }
}

fn acquisition_loop(
    mut pipeline: Box<dyn CameraPipeline>,
    mut frame: AlignedFrameData,
    stop_flag: &AtomicBool,
    subscribers: &Mutex<Vec<(SubscriptionId, FrameCallback)>>,
    recorder: &Mutex<Option<Recorder>>,
    counters: &Counters,
) -> Box<dyn CameraPipeline> {
    let mut failures = 0u32;

    while !stop_flag.load(Ordering::Acquire) {
        let cycle = pipeline
            .wait_for_frames()
            .and_then(|set| fill_frame(pipeline.as_mut(), &set, &mut frame));

        if let Err(e) = cycle {
            counters.skipped.fetch_add(1, Ordering::Relaxed);
            failures = failures.saturating_add(1);
            if failures == FAILURE_REPORT_THRESHOLD {
                log::error!("Camera pipeline failed {} times in a row: {}", failures, e);
            } else {
                log::warn!("Skipping acquisition cycle: {}", e);
            }
            std::thread::sleep(FAILURE_BACKOFF);
            continue;
        }
        failures = 0;

        for (_, callback) in lock(subscribers).iter_mut() {
            callback(&frame);
        }
        counters.delivered.fetch_add(1, Ordering::Relaxed);

        if let Some(recorder) = lock(recorder).as_ref() {
            recorder.push(&frame);
        }
        log::debug!("Delivered frame {}", frame.frame_number);
    }

    pipeline
}

/// Copy color and aligned depth of `set` into `frame`. On error the frame
/// must not be delivered.
fn fill_frame(
    pipeline: &mut dyn CameraPipeline,
    set: &FrameSet,
    frame: &mut AlignedFrameData,
) -> Result<()> {
    frame.timestamp = set.timestamp;
    frame.frame_number = set.frame_number;

    set.color_frame()
        .ok_or_else(|| SenseError::pipeline("frame set has no color frame"))?
        .copy_into_bytes(&mut frame.color_data)?;

    let aligned = pipeline.align(set, StreamKind::Color)?;
    aligned
        .depth_frame()
        .ok_or_else(|| SenseError::pipeline("aligned frame set has no depth frame"))?
        .copy_into_depth(&mut frame.depth_data)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::synthetic::{SyntheticPipeline, SyntheticScene};

    fn started_pipeline() -> Box<dyn CameraPipeline> {
        let mut pipeline: Box<dyn CameraPipeline> =
            Box::new(SyntheticPipeline::new(SyntheticScene::matched()));
        pipeline
            .start(&DeviceConfig::default_streams().to_pipeline_config())
            .unwrap();
        pipeline
    }

    #[test]
    fn test_spawn_worker_hands_over_pipeline() {
        let worker = spawn_worker(std::thread::Builder::new(), started_pipeline(), |mut p| {
            p.wait_for_frames().unwrap();
            p
        })
        .map_err(|(_, e)| e)
        .unwrap();

        let mut pipeline = worker.join().unwrap().expect("pipeline handed to worker");
        shutdown_pipeline(pipeline.as_mut());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_spawn_failure_returns_pipeline() {
        // No address space can hold this stack, so the spawn fails.
        let builder = std::thread::Builder::new().stack_size(1 << 60);
        let Err((mut pipeline, _)) = spawn_worker(builder, started_pipeline(), |p| p) else {
            panic!("spawn with an impossible stack size succeeded");
        };

        assert!(pipeline.wait_for_frames().is_ok());
        shutdown_pipeline(pipeline.as_mut());
        assert!(pipeline
            .start(&DeviceConfig::default_streams().to_pipeline_config())
            .is_ok());
    }
}
