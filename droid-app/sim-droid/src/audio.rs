//! Audio owner task backed by `mpg123`.
//!
//! Only this task starts or stops player processes: a new request terminates
//! whatever is playing before the next clip starts.

use std::{
    io,
    path::PathBuf,
    process::{Child, Command, Stdio},
};

use droid_core::utils::{
    controllers::{AudioCommand, Clip, AUDIO_CHANNEL},
    lifecycle::{self, Owner},
};
use embassy_time::{Duration, Instant, Timer};

/// MPEG-1 layer III frames per second at 44.1 kHz (1152 samples per frame).
const MP3_FRAMES_PER_SECOND: f32 = 44_100.0 / 1152.0;

const FAREWELL_POLL: Duration = Duration::from_millis(50);

/// Where each clip lives on disk.
#[derive(Debug, Clone)]
pub struct ClipPaths {
    pub ambient: PathBuf,
    pub shutdown: PathBuf,
    pub alert: PathBuf,
    pub armed: PathBuf,
}

impl ClipPaths {
    /// `ambient.mp3`, `shutdown.mp3`, `alert.mp3`, `armed.mp3` inside `dir`.
    pub fn in_dir(dir: &std::path::Path) -> Self {
        Self {
            ambient: dir.join("ambient.mp3"),
            shutdown: dir.join("shutdown.mp3"),
            alert: dir.join("alert.mp3"),
            armed: dir.join("armed.mp3"),
        }
    }

    pub fn path(
        &self,
        clip: Clip,
    ) -> &PathBuf {
        match clip {
            Clip::Ambient => &self.ambient,
            Clip::Shutdown => &self.shutdown,
            Clip::Alert => &self.alert,
            Clip::Armed => &self.armed,
        }
    }
}

pub struct Mpg123 {
    device: Option<String>,
    clips: ClipPaths,
    current: Option<Child>,
}

impl Mpg123 {
    pub fn new(
        device: Option<String>,
        clips: ClipPaths,
    ) -> Self {
        Self {
            device,
            clips,
            current: None,
        }
    }

    /// Player arguments for `clip`, optionally limited to a window in seconds.
    pub fn args(
        &self,
        clip: Clip,
        window: Option<(u32, u32)>,
    ) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(device) = &self.device {
            args.extend(["-a".to_owned(), device.clone()]);
        }
        args.push("-q".to_owned());
        if let Some((start_s, duration_s)) = window {
            let frames = |s: u32| (s as f32 * MP3_FRAMES_PER_SECOND).round() as u32;
            args.extend([
                "-k".to_owned(),
                frames(start_s).to_string(),
                "-n".to_owned(),
                frames(duration_s).to_string(),
            ]);
        }
        args.push(self.clips.path(clip).display().to_string());
        args
    }

    /// Terminate the current clip, if any.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.current.take() {
            if let Err(error) = child.kill().and_then(|()| child.wait().map(|_| ())) {
                if error.kind() != io::ErrorKind::InvalidInput {
                    tracing::warn!(%error, "failed to stop player");
                }
            }
        }
    }

    /// Replace whatever is playing with `clip`.
    pub fn play(
        &mut self,
        clip: Clip,
        window: Option<(u32, u32)>,
    ) {
        self.stop();
        let spawned = Command::new("mpg123")
            .args(self.args(clip, window))
            .stdin(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => {
                tracing::debug!(?clip, ?window, "playing");
                self.current = Some(child);
            }
            Err(error) => tracing::error!(?clip, %error, "failed to start mpg123"),
        }
    }

    /// Whether the current clip is still playing.
    pub fn is_playing(&mut self) -> bool {
        match self.current.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) => {
                self.current = None;
                false
            }
            None => false,
        }
    }
}

impl Drop for Mpg123 {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Play the shutdown clip to the end, bounded by `limit`.
async fn farewell(
    player: &mut Mpg123,
    limit: Duration,
) {
    player.play(Clip::Shutdown, None);
    let deadline = Instant::now() + limit;
    while player.is_playing() && Instant::now() < deadline {
        Timer::after(FAREWELL_POLL).await;
    }
    player.stop();
    lifecycle::report_parked(Owner::Audio);
}

/// Serve `AUDIO_CHANNEL`. After shutdown only the farewell is honoured.
pub async fn run(
    mut player: Mpg123,
    farewell_limit: Duration,
) -> ! {
    loop {
        let command = AUDIO_CHANNEL.receive().await;
        if !lifecycle::is_running() && command != AudioCommand::Farewell {
            continue;
        }
        match command {
            AudioCommand::Play(clip) => player.play(clip, None),
            AudioCommand::Segment {
                clip,
                start_s,
                duration_s,
            } => player.play(clip, Some((start_s, duration_s))),
            AudioCommand::Stop => player.stop(),
            AudioCommand::Farewell => farewell(&mut player, farewell_limit).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_window_is_converted_to_frames() {
        let player = Mpg123::new(
            Some("hw:1,0".into()),
            ClipPaths::in_dir(std::path::Path::new("sounds")),
        );
        assert_eq!(
            player.args(Clip::Ambient, Some((2, 2))),
            ["-a", "hw:1,0", "-q", "-k", "77", "-n", "77", "sounds/ambient.mp3"]
        );
    }

    #[test]
    fn default_device_plays_whole_clip() {
        let player = Mpg123::new(None, ClipPaths::in_dir(std::path::Path::new("sounds")));
        assert_eq!(player.args(Clip::Shutdown, None), ["-q", "sounds/shutdown.mp3"]);
    }
}
