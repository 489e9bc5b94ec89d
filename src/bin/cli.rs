use anyhow::{anyhow, bail, Context, Result};
use crabsense::geometry::transform;
use crabsense::pipeline::{CameraPipeline, FrameData};
use crabsense::{
    init_logging_with, DepthDevice, SenseConfig, SyntheticPipeline, SyntheticScene,
};
use glam::Vec2;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const USAGE: &str = "Usage: crabsense-cli <command> [args]

Commands:
  stream [--frames <n>] [--json]        print aligned frames until n or Ctrl-C
  record <dir> [--frames <n>]           save aligned frame pairs to <dir>
  map <x> <y> [--json]                  map a color pixel to the depth image
  config [--write] [--json]             print (or write) the settings file

Options:
  --config <path>   settings file (default crabsense.toml)
  --offset          synthetic camera with separate color and depth optics
  --realtime        pace the synthetic camera at its frame rate";

struct Options {
    positional: Vec<String>,
    frames: Option<u64>,
    config_path: PathBuf,
    json: bool,
    offset: bool,
    realtime: bool,
    write: bool,
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut options = Options {
        positional: Vec::new(),
        frames: None,
        config_path: SenseConfig::default_path(),
        json: false,
        offset: false,
        realtime: false,
        write: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--frames needs a value"))?;
                options.frames = Some(value.parse().context("invalid --frames")?);
            }
            "--config" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| anyhow!("--config needs a path"))?;
                options.config_path = PathBuf::from(value);
            }
            "--json" => options.json = true,
            "--offset" => options.offset = true,
            "--realtime" => options.realtime = true,
            "--write" => options.write = true,
            other if other.starts_with("--") => bail!("Unknown option: {}", other),
            other => options.positional.push(other.to_string()),
        }
        i += 1;
    }
    Ok(options)
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let options = parse_options(&args[2..])?;
    let config = SenseConfig::load_from_file(&options.config_path)?;
    init_logging_with(&config.logging.level);
    config
        .validate()
        .map_err(|e| anyhow!("invalid configuration: {}", e))?;

    match args[1].as_str() {
        "stream" => cmd_stream(&config, &options),
        "record" => cmd_record(&config, &options),
        "map" => cmd_map(&config, &options),
        "config" => cmd_config(&config, &options),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        command => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn scene(options: &Options) -> SyntheticScene {
    let scene = if options.offset {
        SyntheticScene::offset()
    } else {
        SyntheticScene::matched()
    };
    scene.with_realtime(options.realtime)
}

fn new_device(config: &SenseConfig, options: &Options) -> DepthDevice {
    let pipeline = SyntheticPipeline::new(scene(options));
    DepthDevice::new(Box::new(pipeline)).with_config(config.device.clone())
}

/// Set on Ctrl-C.
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;
    Ok(interrupted)
}

#[derive(serde::Serialize)]
struct FrameSummary {
    frame_number: u64,
    timestamp: String,
    width: u32,
    height: u32,
    center_distance_m: Option<f32>,
}

fn cmd_stream(config: &SenseConfig, options: &Options) -> Result<()> {
    let interrupted = interrupt_flag()?;
    let mut device = new_device(config, options);
    device.open(None)?;
    let scale = device.depth_scale().unwrap_or(0.001);

    let (tx, rx) = crossbeam_channel::unbounded();
    device.on_frame(move |frame| {
        let _ = tx.send(FrameSummary {
            frame_number: frame.frame_number,
            timestamp: frame.timestamp.to_rfc3339(),
            width: frame.width,
            height: frame.height,
            center_distance_m: frame.average_depth(frame.width / 2, frame.height / 2, 2, 0, u16::MAX, scale),
        });
    });

    let mut received = 0u64;
    while !interrupted.load(Ordering::SeqCst) && options.frames.map_or(true, |n| received < n) {
        let Ok(summary) = rx.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        received += 1;
        if options.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            let distance = summary
                .center_distance_m
                .map_or("-".to_string(), |d| format!("{:.3} m", d));
            println!(
                "Frame {} {}x{} at {} center {}",
                summary.frame_number, summary.width, summary.height, summary.timestamp, distance
            );
        }
    }

    let stats = device.stats();
    device.close();
    eprintln!(
        "{} frames delivered, {} cycles skipped",
        stats.frames_delivered, stats.cycles_skipped
    );
    Ok(())
}

fn cmd_record(config: &SenseConfig, options: &Options) -> Result<()> {
    let directory = options
        .positional
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.recording.output_directory));
    let frames = options.frames.unwrap_or(30);
    let interrupted = interrupt_flag()?;

    let mut device = new_device(config, options);
    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    device.on_frame(move |_| {
        let _ = tx.try_send(());
    });
    device.open(None)?;

    let mut recording_config = config.recording_config();
    recording_config.directory = directory;
    device.start_recording_with(recording_config, None)?;

    let mut seen = 0u64;
    while seen < frames && !interrupted.load(Ordering::SeqCst) {
        if rx.recv_timeout(Duration::from_millis(100)).is_ok() {
            seen += 1;
        }
    }

    let stats = device.stop_recording()?;
    device.close();

    if options.json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!(
            "Recorded {} frames to {} ({} dropped, {} failed)",
            stats.frames_written, stats.output_directory, stats.frames_dropped, stats.write_failures
        );
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct MapResult {
    color: [f32; 2],
    depth: [f32; 2],
    distance_m: Option<f32>,
    reprojected: Option<[f32; 2]>,
}

fn cmd_map(config: &SenseConfig, options: &Options) -> Result<()> {
    let [x, y] = match options.positional.as_slice() {
        [x, y] => [x.parse::<f32>()?, y.parse::<f32>()?],
        _ => bail!("Usage: crabsense-cli map <x> <y>"),
    };
    let color_pixel = Vec2::new(x, y);

    let mut device_config = config.device.clone();
    let mut pipeline = SyntheticPipeline::new(scene(options));
    let active = pipeline.start(&device_config.to_pipeline_config())?;
    device_config.profiles = active.requests();
    let frames = pipeline.wait_for_frames();
    pipeline.stop()?;
    pipeline.release();
    let frames = frames?;

    let mapper = crabsense::CoordinateMapper::from_device_config(&active, &device_config)
        .ok_or_else(|| anyhow!("no color and depth streams to map between"))?;
    let depth_frame = frames
        .depth_frame()
        .ok_or_else(|| anyhow!("no depth frame received"))?;
    let FrameData::Depth(depth) = &depth_frame.data else {
        bail!("depth frame carries no depth samples");
    };

    let depth_pixel =
        mapper.map_color_to_depth(color_pixel, depth, active.depth_scale, config.depth_range());
    let width = depth_frame.width as usize;
    let distance_m = depth
        .get(depth_pixel.y as usize * width + depth_pixel.x as usize)
        .filter(|&&raw| raw != 0)
        .map(|&raw| raw as f32 * active.depth_scale);
    let reprojected = distance_m.map(|d| {
        let point = transform(
            mapper.map_depth_to_world(depth_pixel, d),
            mapper.depth_extrinsics(),
        );
        mapper.map_world_to_color(point).to_array()
    });

    let result = MapResult {
        color: color_pixel.to_array(),
        depth: depth_pixel.to_array(),
        distance_m,
        reprojected,
    };

    if options.json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!("Color pixel ({:.1}, {:.1})", x, y);
        println!("Depth pixel ({:.1}, {:.1})", result.depth[0], result.depth[1]);
        match (distance_m, reprojected) {
            (Some(d), Some(p)) => {
                println!("Distance {:.3} m, reprojects to ({:.1}, {:.1})", d, p[0], p[1])
            }
            _ => println!("No depth measurement"),
        }
        if mapper.color_and_depth_match() {
            println!("Color and depth share intrinsics; mapping is the identity");
        }
    }
    Ok(())
}

fn cmd_config(config: &SenseConfig, options: &Options) -> Result<()> {
    if options.write {
        config.save_to_file(&options.config_path)?;
        println!("Wrote {}", options.config_path.display());
        return Ok(());
    }
    if options.json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
