//! On-disk layout of recorded frame pairs.
//!
//! A recording directory holds `{index}_color.bin` (packed RGB bytes) and
//! `{index}_depth.bin` (little-endian u16 samples) for every saved frame, with
//! indices counting up from 0. Recordings made by the synthetic driver also
//! carry `profile.json` describing the negotiated streams.

use crate::errors::{Result, SenseError};
use crate::pipeline::ActiveProfile;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const PROFILE_FILE: &str = "profile.json";

const COLOR_SUFFIX: &str = "_color.bin";
const DEPTH_SUFFIX: &str = "_depth.bin";

pub fn color_path(directory: &Path, index: u64) -> PathBuf {
    directory.join(format!("{index}{COLOR_SUFFIX}"))
}

pub fn depth_path(directory: &Path, index: u64) -> PathBuf {
    directory.join(format!("{index}{DEPTH_SUFFIX}"))
}

/// Write one color/depth pair under `directory`.
pub fn write_frame_pair(directory: &Path, index: u64, color: &[u8], depth: &[u16]) -> Result<()> {
    fs::write(color_path(directory, index), color)?;

    let file = fs::File::create(depth_path(directory, index))?;
    let mut out = BufWriter::new(file);
    for sample in depth {
        out.write_all(&sample.to_le_bytes())?;
    }
    out.flush()?;
    Ok(())
}

/// Delete whatever part of pair `index` exists as a file.
pub fn remove_frame_pair(directory: &Path, index: u64) {
    for path in [color_path(directory, index), depth_path(directory, index)] {
        if path.is_file() {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("Could not remove partial frame file {}: {}", path.display(), e);
            }
        }
    }
}

/// Read back the pair written by [`write_frame_pair`].
pub fn read_frame_pair(directory: &Path, index: u64) -> Result<(Vec<u8>, Vec<u16>)> {
    let color = fs::read(color_path(directory, index))?;
    let raw = fs::read(depth_path(directory, index))?;
    if raw.len() % 2 != 0 {
        return Err(SenseError::recording(format!(
            "depth file for frame {} has an odd byte count ({})",
            index,
            raw.len()
        )));
    }
    let depth = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok((color, depth))
}

/// Indices of complete pairs in `directory`, ascending.
pub fn recorded_indices(directory: &Path) -> Result<Vec<u64>> {
    let mut indices = Vec::new();
    for entry in fs::read_dir(directory)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        let Some(index) = name
            .strip_suffix(COLOR_SUFFIX)
            .and_then(|stem| stem.parse::<u64>().ok())
        else {
            continue;
        };
        if depth_path(directory, index).exists() {
            indices.push(index);
        }
    }
    indices.sort_unstable();
    Ok(indices)
}

pub fn write_profile(directory: &Path, profile: &ActiveProfile) -> Result<()> {
    let json = serde_json::to_string_pretty(profile)?;
    fs::write(directory.join(PROFILE_FILE), json)?;
    Ok(())
}

pub fn read_profile(directory: &Path) -> Result<ActiveProfile> {
    let path = directory.join(PROFILE_FILE);
    let contents = fs::read_to_string(&path).map_err(|e| {
        SenseError::recording(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&contents)?)
}
