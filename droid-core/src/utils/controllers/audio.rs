//! Audio boundary.
//!
//! The core only decides *what* to play; a host task owns the player process and
//! receives [`AudioCommand`]s over [`AUDIO_CHANNEL`].

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use embassy_time::{Duration, Timer};
use rand_core::RngCore;

use crate::utils::{config::AudioConfig, lifecycle};

/// Channel used to send audio commands to the player task.
pub static AUDIO_CHANNEL: Channel<CriticalSectionRawMutex, AudioCommand, 8> = Channel::new();

/// Sound clips the droid knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clip {
    /// Background chatter, played in slices.
    Ambient,
    /// Played once on the way down.
    Shutdown,
    /// Squeal when a wheel is pushed hard.
    Alert,
    /// Acknowledges arming or disarming.
    Armed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCommand {
    /// Play a whole clip, replacing anything already playing.
    Play(Clip),
    /// Play `duration_s` seconds of `clip` starting at `start_s`.
    Segment {
        clip: Clip,
        start_s: u32,
        duration_s: u32,
    },
    Stop,
    /// Play the shutdown clip to the end, then report parked.
    Farewell,
}

/// Periodic ambient chatter.
pub struct Chatter<R> {
    rng: R,
    config: AudioConfig,
}

impl<R: RngCore> Chatter<R> {
    pub fn new(
        rng: R,
        config: AudioConfig,
    ) -> Self {
        Self { rng, config }
    }

    /// Next slice of the ambient clip, starting at a random whole second.
    pub fn next_segment(&mut self) -> AudioCommand {
        let latest_start = self.config.clip_len_s.saturating_sub(self.config.segment_s);
        AudioCommand::Segment {
            clip: Clip::Ambient,
            start_s: self.uniform(0, latest_start),
            duration_s: self.config.segment_s,
        }
    }

    /// Pause before the next slice, uniformly within the configured gap.
    pub fn next_gap(&mut self) -> Duration {
        let min_ms = self.config.min_gap_s.saturating_mul(1000);
        let max_ms = self.config.max_gap_s.saturating_mul(1000);
        Duration::from_millis(self.uniform(min_ms, max_ms) as u64)
    }

    /// Inclusive uniform draw in `[lo, hi]`.
    fn uniform(
        &mut self,
        lo: u32,
        hi: u32,
    ) -> u32 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo) as u64 + 1;
        lo + ((self.rng.next_u32() as u64 * span) >> 32) as u32
    }

    pub async fn run(&mut self) {
        if !self.config.ambient {
            tracing::info!("ambient chatter disabled");
            return;
        }
        while lifecycle::is_running() {
            AUDIO_CHANNEL.send(self.next_segment()).await;
            let gap = self.next_gap();
            tracing::debug!(gap_ms = gap.as_millis(), "next chatter scheduled");
            Timer::after(gap).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns a fixed sequence of words.
    struct Scripted(std::vec::Vec<u32>);

    impl RngCore for Scripted {
        fn next_u32(&mut self) -> u32 {
            self.0.remove(0)
        }

        fn next_u64(&mut self) -> u64 {
            self.next_u32() as u64
        }

        fn fill_bytes(
            &mut self,
            dst: &mut [u8],
        ) {
            dst.fill(0);
        }
    }

    #[test]
    fn segments_start_inside_the_clip() {
        let mut chatter = Chatter::new(Scripted(vec![0, u32::MAX]), AudioConfig::default());
        assert_eq!(
            chatter.next_segment(),
            AudioCommand::Segment {
                clip: Clip::Ambient,
                start_s: 0,
                duration_s: 2
            }
        );
        assert_eq!(
            chatter.next_segment(),
            AudioCommand::Segment {
                clip: Clip::Ambient,
                start_s: 7,
                duration_s: 2
            }
        );
    }

    #[test]
    fn gaps_span_configured_window() {
        let mut chatter = Chatter::new(
            Scripted(vec![0, u32::MAX, 1 << 31]),
            AudioConfig::default(),
        );
        assert_eq!(chatter.next_gap(), Duration::from_millis(5_000));
        assert_eq!(chatter.next_gap(), Duration::from_millis(15_000));
        let mid = chatter.next_gap().as_millis();
        assert!((9_900..=10_100).contains(&mid));
    }

    #[test]
    fn degenerate_window_is_fixed() {
        let config = AudioConfig {
            min_gap_s: 3,
            max_gap_s: 3,
            segment_s: 9,
            ..AudioConfig::default()
        };
        let mut chatter = Chatter::new(Scripted(vec![]), config);
        assert_eq!(chatter.next_gap(), Duration::from_secs(3));
        assert!(matches!(
            chatter.next_segment(),
            AudioCommand::Segment { start_s: 0, .. }
        ));
    }
}
