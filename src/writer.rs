use crate::pl1000::Pl1000Api;
use crate::session::DeviceSession;
use anyhow::{anyhow, Result};
use hdf5::{File, H5Type, Location};
use std::fs::DirEntry;
use std::path::{Path, PathBuf};

/// Writes finished captures as `capture<N>.h5` files in one directory.
pub struct CaptureWriter {
    dir: PathBuf,
    next_index: usize,
}

impl CaptureWriter {
    /// Continue numbering after the highest capture file already in `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            log::info!("Created capture directory {}", dir.display());
        }
        let entries: Vec<DirEntry> = std::fs::read_dir(&dir)?.filter_map(|e| e.ok()).collect();
        let next_index = entries
            .iter()
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|f| f.strip_prefix("capture"))
                    .and_then(|f| f.strip_suffix(".h5"))
                    .and_then(|n| n.parse::<usize>().ok())
            })
            .max()
            .map_or(0, |max| max + 1);
        Ok(Self { dir, next_index })
    }

    pub fn next_path(&self) -> PathBuf {
        self.dir.join(format!("capture{}.h5", self.next_index))
    }

    /// Write the data held by `session` into the next capture file.
    pub fn write<D: Pl1000Api>(&mut self, device: &str, session: &DeviceSession<D>) -> Result<PathBuf> {
        let path = self.next_path();
        write_capture(&path, device, session)?;
        self.next_index += 1;
        Ok(path)
    }
}

fn scalar_attr<T: H5Type>(loc: &Location, name: &str, value: &T) -> Result<()> {
    loc.new_attr::<T>().shape(()).create(name)?.write_scalar(value)?;
    Ok(())
}

/// One capture to one file: `raw`, `times` and `channels` datasets plus scalar attributes.
pub fn write_capture<D: Pl1000Api>(path: &Path, device: &str, session: &DeviceSession<D>) -> Result<()> {
    let buffer = session
        .buffer()
        .ok_or_else(|| anyhow!("{} has no capture buffer", device))?;
    let timing = session
        .timing()
        .ok_or_else(|| anyhow!("{} has no timing", device))?;

    let file = File::create(path)?;
    let raw = file
        .new_dataset::<u16>()
        .shape(buffer.data.dim())
        .create("raw")?;
    raw.write(&buffer.data)?;
    let times = file
        .new_dataset::<f32>()
        .shape(buffer.times.dim())
        .create("times")?;
    times.write(&buffer.times)?;
    let channels = file
        .new_dataset::<u16>()
        .shape(buffer.channels.len())
        .create("channels")?;
    channels.write_raw(&buffer.channels)?;

    scalar_attr(&file, "sampling_ms", &timing.sampling_ms)?;
    scalar_attr(&file, "record_us", &timing.record_us)?;
    scalar_attr(&file, "valid_points", &(buffer.valid_points as u64))?;
    scalar_attr(&file, "overflow", &session.overflow())?;
    scalar_attr(&file, "trigger_index", &session.trigger_index())?;
    scalar_attr(&file, "scale", &session.scale())?;
    if let Some(t) = session.read_at() {
        scalar_attr(&file, "read_at", &t.unix_timestamp())?;
    }
    file.flush()?;
    log::debug!("{} capture written to {}", device, path.display());
    Ok(())
}
