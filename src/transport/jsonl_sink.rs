use super::{TransportError, TransportSink};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends one payload per line to a local file, rotating by size
///
/// Rotated files keep the base name with a numeric suffix: `out.jsonl.1` is the
/// newest, `out.jsonl.{max_rotations}` the oldest kept. A failed rotation is
/// logged and writing carries on in whatever file sits at the base path.
pub struct JsonlSink {
    base_path: PathBuf,
    file: Option<BufWriter<File>>,
    connected: bool,
    current_size: u64,
    max_size: u64,
    rotation_count: u32,
    max_rotations: u32,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>, max_size_mb: u64, max_rotations: u32) -> Self {
        Self::with_max_bytes(path, max_size_mb.saturating_mul(1024 * 1024), max_rotations)
    }

    pub fn with_max_bytes(path: impl AsRef<Path>, max_size: u64, max_rotations: u32) -> Self {
        Self {
            base_path: path.as_ref().to_path_buf(),
            file: None,
            connected: false,
            current_size: 0,
            max_size,
            rotation_count: 0,
            max_rotations,
        }
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn rotated_path(&self, index: u32) -> PathBuf {
        let mut name = self.base_path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn open_file(&self) -> Result<File, TransportError> {
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.base_path)?)
    }

    /// Open (or reopen) the base file, picking up its current size
    fn reopen(&mut self) -> Result<(), TransportError> {
        self.file = None;
        let file = self.open_file()?;
        self.current_size = file.metadata()?.len();
        self.file = Some(BufWriter::new(file));
        Ok(())
    }

    fn shift_rotated_files(&self) -> Result<(), TransportError> {
        if self.max_rotations == 0 {
            std::fs::remove_file(&self.base_path)?;
            return Ok(());
        }

        let oldest = self.rotated_path(self.max_rotations);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }

        for i in (1..self.max_rotations).rev() {
            let old_path = self.rotated_path(i);
            if old_path.exists() {
                std::fs::rename(&old_path, self.rotated_path(i + 1))?;
            }
        }

        if self.base_path.exists() {
            std::fs::rename(&self.base_path, self.rotated_path(1))?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), TransportError> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }

        // The base file may or may not have moved; always continue at the base path
        let shifted = self.shift_rotated_files();
        self.reopen()?;
        shifted?;

        self.rotation_count += 1;
        log::info!("📄 Rotated output file (rotation #{})", self.rotation_count);

        Ok(())
    }
}

#[async_trait]
impl TransportSink for JsonlSink {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.base_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.reopen()?;
        self.connected = true;
        Ok(())
    }

    /// The topic is not recorded; the file is the channel
    async fn publish(&mut self, _topic: &str, payload: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.file.is_none() {
            self.reopen()?;
        }
        let file = self.file.as_mut().ok_or(TransportError::NotConnected)?;

        writeln!(file, "{}", payload)?;
        file.flush()?;

        self.current_size += (payload.len() + 1) as u64;

        // The line is already written; a rotation failure is only logged
        if self.current_size >= self.max_size {
            if let Err(e) = self.rotate() {
                log::error!("❌ Failed to rotate {}: {}", self.base_path.display(), e);
            }
        }

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn sink_type(&self) -> &'static str {
        "JSONL"
    }
}
