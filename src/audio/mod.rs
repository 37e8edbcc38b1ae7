//! Audio collaborators.
//!
//! The audio track runs on its own clock. The player never reads its
//! position; it only starts it, stops it, and reacts to its notifications.

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{PlayerError, PlayerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    Playing,
    Paused,
    Ended,
}

pub type AudioEvents = mpsc::UnboundedSender<AudioEvent>;

#[allow(async_fn_in_trait)]
pub trait AudioTrack {
    /// Begin playback from the start. Resolves once the track is playing.
    async fn start(&self) -> PlayerResult<()>;

    /// Stop and rewind. Emits `Paused` if the track was playing.
    fn stop(&self);
}

// ---------------------------------------------------------------------------
// Silent track
// ---------------------------------------------------------------------------

/// A track with no sound that simply "ends" after a fixed duration.
pub struct SilentTrack {
    duration: Duration,
    events: AudioEvents,
    timer: RefCell<Option<JoinHandle<()>>>,
}

impl SilentTrack {
    pub fn new(duration: Duration, events: AudioEvents) -> Self {
        SilentTrack {
            duration,
            events,
            timer: RefCell::new(None),
        }
    }
}

impl AudioTrack for SilentTrack {
    async fn start(&self) -> PlayerResult<()> {
        self.stop_timer();
        let events = self.events.clone();
        let duration = self.duration;
        let timer = tokio::task::spawn_local(async move {
            tokio::time::sleep(duration).await;
            let _ = events.send(AudioEvent::Ended);
        });
        *self.timer.borrow_mut() = Some(timer);
        debug!(duration_ms = duration.as_millis() as u64, "silent track started");
        let _ = self.events.send(AudioEvent::Playing);
        Ok(())
    }

    fn stop(&self) {
        if self.stop_timer() {
            let _ = self.events.send(AudioEvent::Paused);
        }
    }
}

impl SilentTrack {
    /// Cancel a running timer; returns whether one was still running.
    fn stop_timer(&self) -> bool {
        match self.timer.borrow_mut().take() {
            Some(timer) if !timer.is_finished() => {
                timer.abort();
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// External player process
// ---------------------------------------------------------------------------

/// Plays a file through an external command line player.
///
/// The process exiting on its own is reported as `Ended`; `stop` kills it
/// and reports `Paused`.
pub struct ProcessTrack {
    command: Vec<String>,
    file: PathBuf,
    events: AudioEvents,
    stop: RefCell<Option<oneshot::Sender<()>>>,
}

impl ProcessTrack {
    pub fn new(command: Vec<String>, file: PathBuf, events: AudioEvents) -> Self {
        ProcessTrack {
            command,
            file,
            events,
            stop: RefCell::new(None),
        }
    }
}

impl AudioTrack for ProcessTrack {
    async fn start(&self) -> PlayerResult<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| PlayerError::audio("empty audio command"))?;
        let mut child = Command::new(program)
            .args(args)
            .arg(&self.file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlayerError::audio(format!("failed to run {program}: {e}")))?;

        let (stop_tx, mut stop_rx) = oneshot::channel();
        *self.stop.borrow_mut() = Some(stop_tx);
        let events = self.events.clone();
        tokio::task::spawn_local(async move {
            tokio::select! {
                status = child.wait() => {
                    match status {
                        Ok(status) => info!(%status, "audio process exited"),
                        Err(e) => warn!("audio process wait failed: {e}"),
                    }
                    let _ = events.send(AudioEvent::Ended);
                }
                _ = &mut stop_rx => {
                    if let Err(e) = child.kill().await {
                        warn!("failed to kill audio process: {e}");
                    }
                    let _ = events.send(AudioEvent::Paused);
                }
            }
        });

        info!(file = %self.file.display(), "audio started");
        let _ = self.events.send(AudioEvent::Playing);
        Ok(())
    }

    fn stop(&self) {
        if let Some(stop) = self.stop.borrow_mut().take() {
            let _ = stop.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::LocalSet;

    #[tokio::test(start_paused = true)]
    async fn silent_track_ends_after_its_duration() {
        LocalSet::new()
            .run_until(async {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let track = SilentTrack::new(Duration::from_secs(2), tx);
                track.start().await.unwrap();
                assert_eq!(rx.recv().await, Some(AudioEvent::Playing));
                assert_eq!(rx.recv().await, Some(AudioEvent::Ended));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_a_silent_track_pauses_it() {
        LocalSet::new()
            .run_until(async {
                let (tx, mut rx) = mpsc::unbounded_channel();
                let track = SilentTrack::new(Duration::from_secs(2), tx);
                track.start().await.unwrap();
                tokio::time::sleep(Duration::from_millis(500)).await;
                track.stop();
                // A second stop is a no-op.
                track.stop();
                assert_eq!(rx.recv().await, Some(AudioEvent::Playing));
                assert_eq!(rx.recv().await, Some(AudioEvent::Paused));
                tokio::time::sleep(Duration::from_secs(5)).await;
                assert!(rx.try_recv().is_err());
            })
            .await;
    }

    #[tokio::test]
    async fn missing_player_fails_to_start() {
        LocalSet::new()
            .run_until(async {
                let (tx, _rx) = mpsc::unbounded_channel();
                let track = ProcessTrack::new(
                    vec!["grid-player-no-such-audio-binary".into()],
                    PathBuf::from("track.mp3"),
                    tx,
                );
                assert!(matches!(track.start().await, Err(PlayerError::Audio(_))));
            })
            .await;
    }
}
