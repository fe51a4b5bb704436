//! Camera collaborator replayed from disk.
//!
//! A directory of `*.jpg` frames is played back in name order, looping. A
//! frame may have a sidecar `*.json` with its detections, produced offline by
//! whatever vision pipeline is under test.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use droid_core::utils::{
    lifecycle,
    vision::{Detections, DETECTIONS, FRAMES},
};

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("cannot read frame directory {path}: {source}")]
    Dir { path: PathBuf, source: io::Error },
    #[error("no .jpg frames in {0}")]
    NoFrames(PathBuf),
    #[error("cannot read frame {path}: {source}")]
    Frame { path: PathBuf, source: io::Error },
}

pub struct DirCamera {
    frames: Vec<PathBuf>,
    period: Duration,
}

impl DirCamera {
    /// List the frames; an empty or unreadable directory is an error.
    pub fn open(
        dir: &Path,
        fps: u32,
    ) -> Result<Self, CameraError> {
        let entries = fs::read_dir(dir).map_err(|source| CameraError::Dir {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "jpg"))
            .collect();
        if frames.is_empty() {
            return Err(CameraError::NoFrames(dir.to_path_buf()));
        }
        frames.sort();

        Ok(Self {
            frames,
            period: Duration::from_millis(1000 / u64::from(fps.max(1))),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    fn read_frame(path: &Path) -> Result<Arc<[u8]>, CameraError> {
        fs::read(path).map(Arc::from).map_err(|source| CameraError::Frame {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_detections(path: &Path) -> Option<Detections> {
        let sidecar = path.with_extension("json");
        let text = fs::read_to_string(&sidecar).ok()?;
        match serde_json::from_str(&text) {
            Ok(detections) => Some(detections),
            Err(error) => {
                tracing::warn!(path = %sidecar.display(), %error, "bad detection sidecar");
                None
            }
        }
    }

    /// Publish frames until shutdown or the first read failure.
    pub fn run(self) -> Result<(), CameraError> {
        let sender = FRAMES.sender();
        for path in self.frames.iter().cycle() {
            if !lifecycle::is_running() {
                break;
            }
            sender.send(Self::read_frame(path)?);
            if let Some(detections) = Self::read_detections(path) {
                // Stale detections are worthless; drop when the autopilot lags.
                let _ = DETECTIONS.try_send(detections);
            }
            thread::sleep(self.period);
        }
        Ok(())
    }

    /// Run the replay on its own thread.
    pub fn spawn(self) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("camera".into())
            .spawn(move || match self.run() {
                Ok(()) => tracing::info!("camera stopped"),
                Err(error) => tracing::error!(%error, "camera failed, vision loop ended"),
            })
    }
}
