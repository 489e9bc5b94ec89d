//! End-to-end tests of the streaming engine against the synthetic camera

use crabsense::device_config::StreamMode;
use crabsense::pipeline::synthetic::gradient_rgb;
use crabsense::recording::writer;
use crabsense::{
    AlignedFrameData, DepthDevice, DeviceConfig, PixelFormat, SenseError, StreamKind,
    StreamRequest, SyntheticPipeline, SyntheticScene,
};
use crossbeam_channel::{unbounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(10);

fn small_config(color: (i32, i32), depth: (i32, i32)) -> DeviceConfig {
    DeviceConfig::new(vec![
        StreamRequest::new(StreamKind::Depth, PixelFormat::Z16, 0, -1, depth.0, depth.1),
        StreamRequest::new(StreamKind::Color, PixelFormat::Rgb8, 0, -1, color.0, color.1),
    ])
}

fn device(scene: SyntheticScene) -> DepthDevice {
    DepthDevice::new(Box::new(SyntheticPipeline::new(scene)))
}

/// Subscribe with a callback forwarding a copy of every frame.
fn frames_of(device: &DepthDevice) -> Receiver<AlignedFrameData> {
    let (tx, rx) = unbounded();
    device.on_frame(move |frame| {
        let _ = tx.send(frame.snapshot());
    });
    rx
}

fn collect(rx: &Receiver<AlignedFrameData>, n: usize) -> Vec<AlignedFrameData> {
    (0..n)
        .map(|_| rx.recv_timeout(TIMEOUT).expect("frame not delivered in time"))
        .collect()
}

#[test]
fn test_delivers_frames_in_order() {
    let mut device = device(SyntheticScene::matched());
    let rx = frames_of(&device);
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();
    assert!(device.is_streaming());

    let frames = collect(&rx, 10);
    device.close();

    for pair in frames.windows(2) {
        assert!(pair[1].timestamp > pair[0].timestamp);
        assert!(pair[1].frame_number > pair[0].frame_number);
    }
    for frame in &frames {
        assert_eq!((frame.width, frame.height), (160, 120));
        assert_eq!(frame.color_data.len(), 160 * 120 * 3);
        assert_eq!(frame.depth_data.len(), 160 * 120);
        assert!(frame.depth_data.iter().all(|&d| d > 0));
    }
    assert_eq!(frames[0].color_data, gradient_rgb(160, 120, frames[0].frame_number));
}

#[test]
fn test_open_rewrites_profiles_and_builds_mapper() {
    let mut device = device(SyntheticScene::matched());
    assert!(device.coordinate_mapper().is_none());
    assert!(device.depth_scale().is_none());

    device.open(Some(small_config((320, 240), (320, 240)))).unwrap();

    let config = device.config().unwrap();
    assert!(config.profiles.iter().all(|p| p.frame_rate == 30 && p.sub_index == 0));
    assert_eq!(config.color_profile().unwrap().width, 320);

    let mapper = device.coordinate_mapper().expect("mapper after open");
    assert!(mapper.color_and_depth_match());
    assert_eq!(mapper.color_intrinsics().width, 320);
    assert_eq!(device.depth_scale(), Some(0.001));

    device.close();
    assert!(device.coordinate_mapper().is_none());
    assert!(device.active_profile().is_none());
}

#[test]
fn test_default_config_when_none_given() {
    let mut device = device(SyntheticScene::matched());
    let rx = frames_of(&device);
    device.open(None).unwrap();

    let config = device.config().unwrap();
    assert_eq!(config.profiles.len(), 3);
    assert!(config.profile(StreamKind::Infrared).is_some());

    let frames = collect(&rx, 5);
    device.close();

    for pair in frames.windows(2) {
        assert!(pair[1].timestamp > pair[0].timestamp);
    }
    for frame in &frames {
        assert_eq!((frame.width, frame.height), (640, 480));
        assert_eq!(frame.color_data.len(), 640 * 480 * 3);
        assert_eq!(frame.depth_data.len(), 640 * 480);
    }
}

#[test]
fn test_depth_is_aligned_to_color_resolution() {
    let mut device = device(SyntheticScene::offset());
    let rx = frames_of(&device);
    device.open(Some(small_config((320, 240), (160, 120)))).unwrap();

    let frame = collect(&rx, 1).remove(0);
    let mapper_matches = device.coordinate_mapper().unwrap().color_and_depth_match();
    device.close();

    assert!(!mapper_matches);
    assert_eq!(frame.depth_data.len(), 320 * 240);
    assert!(frame.depth_data.iter().any(|&d| d > 0));
}

#[test]
fn test_open_while_open_fails() {
    let mut device = device(SyntheticScene::matched());
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();

    let result = device.open(None);
    assert!(matches!(result, Err(SenseError::AlreadyOpen)));
    assert!(device.is_streaming());

    device.close();
}

#[test]
fn test_close_is_idempotent_and_safe_when_never_opened() {
    let mut never_opened = device(SyntheticScene::matched());
    never_opened.close();
    never_opened.close();
    assert!(!never_opened.is_streaming());

    let mut device = device(SyntheticScene::matched());
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();
    device.close();
    device.close();
    assert!(!device.is_streaming());
}

#[test]
fn test_reopen_after_close() {
    let mut device = device(SyntheticScene::matched());
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();
    device.close();

    let rx = frames_of(&device);
    device.open(None).unwrap();
    let frames = collect(&rx, 2);
    device.close();

    assert_eq!(frames[0].width, 160);
}

#[test]
fn test_failed_open_keeps_device_usable() {
    let mut device = device(SyntheticScene::matched());
    let fisheye = DeviceConfig::new(vec![StreamRequest::new(
        StreamKind::Fisheye,
        PixelFormat::Y8,
        0,
        -1,
        640,
        480,
    )]);

    assert!(matches!(device.open(Some(fisheye)), Err(SenseError::Pipeline(_))));
    assert!(!device.is_streaming());

    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();
    assert!(device.is_streaming());
    device.close();
}

#[test]
fn test_close_waits_for_running_callback() {
    let mut device = device(SyntheticScene::matched());
    let (entered_tx, entered_rx) = unbounded();
    let in_callback = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicU64::new(0));
    {
        let in_callback = in_callback.clone();
        let calls = calls.clone();
        device.on_frame(move |_| {
            in_callback.store(true, Ordering::SeqCst);
            calls.fetch_add(1, Ordering::SeqCst);
            let _ = entered_tx.send(());
            std::thread::sleep(Duration::from_millis(200));
            in_callback.store(false, Ordering::SeqCst);
        });
    }
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();

    entered_rx.recv_timeout(TIMEOUT).unwrap();
    device.close();

    assert!(!in_callback.load(Ordering::SeqCst));
    let after_close = calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(calls.load(Ordering::SeqCst), after_close);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let mut device = device(SyntheticScene::matched());
    let calls = Arc::new(AtomicU64::new(0));
    let id = {
        let calls = calls.clone();
        device.on_frame(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    let rx = frames_of(&device);
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();

    collect(&rx, 1);
    assert!(device.unsubscribe(id));
    assert!(!device.unsubscribe(id));
    let frozen = calls.load(Ordering::SeqCst);
    collect(&rx, 3);
    device.close();

    assert_eq!(calls.load(Ordering::SeqCst), frozen);
}

#[test]
fn test_incomplete_frame_sets_are_skipped() {
    let scene = SyntheticScene {
        incomplete_every: Some(2),
        ..SyntheticScene::matched()
    };
    let mut device = device(scene);
    let rx = frames_of(&device);
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();

    let frames = collect(&rx, 4);
    device.close();

    // Every second frame set carries no color frame and never reaches subscribers.
    assert!(frames.iter().all(|f| f.frame_number % 2 == 0));
    let stats = device.stats();
    assert!(stats.cycles_skipped >= 3);
    assert!(stats.frames_delivered >= 4);
}

#[test]
fn test_keeps_acquiring_through_long_failure_runs() {
    let scene = SyntheticScene {
        incomplete_every: Some(1),
        ..SyntheticScene::matched()
    };
    let mut device = device(scene);
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();

    let deadline = std::time::Instant::now() + TIMEOUT;
    while device.stats().cycles_skipped <= 120 {
        assert!(std::time::Instant::now() < deadline, "acquisition stopped retrying");
        std::thread::sleep(Duration::from_millis(20));
    }
    let skipped = device.stats().cycles_skipped;
    std::thread::sleep(Duration::from_millis(100));

    assert!(device.is_streaming());
    assert!(device.stats().cycles_skipped > skipped);
    assert_eq!(device.stats().frames_delivered, 0);

    device.close();
    assert!(!device.is_streaming());
}

#[test]
fn test_recording_writes_frame_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let mut device = device(SyntheticScene::matched().with_realtime(true).with_frame_rate(200));
    let rx = frames_of(&device);
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();

    device.start_recording(dir.path()).unwrap();
    assert!(device.is_recording());
    assert!(matches!(
        device.start_recording(dir.path()),
        Err(SenseError::Recording(_))
    ));
    while rx.try_recv().is_ok() {}
    collect(&rx, 5);
    let stats = device.stop_recording().unwrap();
    device.close();

    assert!(!device.is_recording());
    assert!(stats.frames_written > 0);
    assert_eq!(stats.write_failures, 0);
    let indices = writer::recorded_indices(dir.path()).unwrap();
    assert_eq!(indices.len() as u64, stats.frames_written);
    assert_eq!(indices[0], 0);

    let (color, depth) = writer::read_frame_pair(dir.path(), 0).unwrap();
    assert_eq!(color.len(), 160 * 120 * 3);
    assert_eq!(depth.len(), 160 * 120);
}

#[test]
fn test_recording_requires_open_device() {
    let dir = tempfile::tempdir().unwrap();
    let device = device(SyntheticScene::matched());
    assert!(matches!(device.start_recording(dir.path()), Err(SenseError::NotOpen)));
    assert!(matches!(device.stop_recording(), Err(SenseError::Recording(_))));
}

#[test]
fn test_close_finishes_recording() {
    let dir = tempfile::tempdir().unwrap();
    let mut device = device(SyntheticScene::matched());
    let rx = frames_of(&device);
    device.open(Some(small_config((160, 120), (160, 120)))).unwrap();
    device.start_recording(dir.path()).unwrap();
    while rx.try_recv().is_ok() {}
    collect(&rx, 2);

    device.close();
    assert!(!device.is_recording());
    assert!(!writer::recorded_indices(dir.path()).unwrap().is_empty());
}

#[test]
fn test_record_then_play_back() {
    let dir = tempfile::tempdir().unwrap();

    let mut recorder = device(SyntheticScene::matched());
    let live = frames_of(&recorder);
    let record = small_config((160, 120), (160, 120))
        .with_mode(StreamMode::Record)
        .with_record_path(dir.path());
    recorder.open(Some(record)).unwrap();
    let recorded = collect(&live, 3);
    recorder.close();
    assert!(dir.path().join(writer::PROFILE_FILE).exists());

    let mut player = device(SyntheticScene::offset());
    let replay = frames_of(&player);
    let playback = DeviceConfig::default_streams()
        .with_mode(StreamMode::Playback)
        .with_playback_path(dir.path());
    player.open(Some(playback)).unwrap();
    let played = collect(&replay, 1).remove(0);

    // The recorded profile wins over the player's own optics.
    assert!(player.coordinate_mapper().unwrap().color_and_depth_match());
    assert_eq!(player.config().unwrap().mode, StreamMode::Playback);
    player.close();

    assert_eq!(played.frame_number, 0);
    assert_eq!(played.color_data, recorded[0].color_data);
    assert_eq!(played.depth_data, recorded[0].depth_data);
}

#[test]
fn test_playback_without_path_streams_live() {
    let mut device = device(SyntheticScene::matched());
    let rx = frames_of(&device);
    let config = small_config((160, 120), (160, 120)).with_mode(StreamMode::Playback);
    device.open(Some(config)).unwrap();

    collect(&rx, 1);
    assert_eq!(device.config().unwrap().mode, StreamMode::Live);
    device.close();
}

#[test]
fn test_drop_stops_acquisition() {
    let calls = Arc::new(AtomicU64::new(0));
    {
        let mut device = device(SyntheticScene::matched());
        let calls = calls.clone();
        device.on_frame(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        });
        device.open(Some(small_config((160, 120), (160, 120)))).unwrap();
        std::thread::sleep(Duration::from_millis(20));
    }
    let after_drop = calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), after_drop);
}
