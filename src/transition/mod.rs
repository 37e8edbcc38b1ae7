//! Transition controller — the session state machine.
//!
//! `Stopped → Transitioning → Playing → Transitioning → Stopped`. The
//! state is checked and set before the first await of every sequence, so
//! on a single-threaded executor a trigger that arrives while a sequence
//! is running always sees `Transitioning` and is dropped.

pub mod phase;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::audio::{AudioEvent, AudioTrack};
use crate::config::{PlayerConfig, Timings};
use crate::decoder::LazyFrames;
use crate::error::PlayerResult;
use crate::grid::{Grid, Snapshot, Surface};
use crate::player::{ClockTiming, PlaybackHandle, start_playback};
use crate::types::{ColorIndex, Label, Palette, SessionState};

pub use phase::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The sequence ran to completion.
    Completed,
    /// The trigger arrived in a state that does not accept it.
    Ignored,
}

/// Everything owned by one enter → play → exit lifecycle.
struct Session<C> {
    grid: Rc<Grid<C>>,
    snapshot: Snapshot<C>,
    playback: PlaybackHandle,
}

pub struct Controller<S: Surface, A> {
    surface: Rc<S>,
    audio: A,
    frames: LazyFrames,
    palette: Palette,
    highlight: ColorIndex,
    timings: Timings,
    state: watch::Sender<SessionState>,
    label: Cell<Label>,
    session: RefCell<Option<Session<S::Cell>>>,
}

impl<S, A> Controller<S, A>
where
    S: Surface + 'static,
    A: AudioTrack,
{
    pub fn new(surface: Rc<S>, audio: A, frames: LazyFrames, config: &PlayerConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Stopped);
        Controller {
            surface,
            audio,
            frames,
            palette: config.palette.clone(),
            highlight: config.highlight_index(),
            timings: config.timings,
            state,
            label: Cell::new(Label::Play),
            session: RefCell::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn label(&self) -> Label {
        self.label.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn surface(&self) -> &Rc<S> {
        &self.surface
    }

    /// Wait until no sequence is running and return the resting state.
    pub async fn settle(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| *s != SessionState::Transitioning).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Map the trigger control to enter or exit according to its label.
    pub async fn toggle(&self) -> PlayerResult<TriggerOutcome> {
        match self.label() {
            Label::Play => self.on_trigger_enter().await,
            Label::Stop => Ok(self.on_trigger_exit().await),
        }
    }

    /// Run the enter sequence: expand, reveal, fade to highlight, start
    /// audio and the playback clock.
    ///
    /// Frame data is decoded before the state or the surface changes; a
    /// failure there, or later in the sequence, leaves the controller
    /// `Stopped` with the surface as it was.
    pub async fn on_trigger_enter(&self) -> PlayerResult<TriggerOutcome> {
        if self.state() != SessionState::Stopped {
            debug!(state = ?self.state(), "enter trigger ignored");
            return Ok(TriggerOutcome::Ignored);
        }
        // Nothing awaits between the check above and `begin`.
        let frames = self.frames.get()?;
        self.begin(SessionState::Stopped);

        info!("session entering");
        self.resize(true).await;
        self.reveal(true).await;

        let grid = match Grid::collect(&*self.surface, self.frames.cell_count()) {
            Ok(grid) => Rc::new(grid),
            Err(e) => {
                self.teardown(None).await;
                self.finish(SessionState::Stopped);
                return Err(e);
            }
        };
        let snapshot = grid.snapshot();
        let highlight = self.palette.color(self.highlight);
        self.fade(&grid, || grid.fill(highlight)).await;

        if let Err(e) = self.audio.start().await {
            self.teardown(Some((&*grid, &snapshot))).await;
            self.finish(SessionState::Stopped);
            return Err(e);
        }

        let timing = ClockTiming {
            tick: self.timings.tick(),
            grace: self.timings.grace(),
        };
        let playback = match start_playback(
            Rc::clone(&self.surface),
            Rc::clone(&grid),
            frames,
            self.palette.clone(),
            timing,
        ) {
            Ok(playback) => playback,
            Err(e) => {
                self.audio.stop();
                self.teardown(Some((&*grid, &snapshot))).await;
                self.finish(SessionState::Stopped);
                return Err(e);
            }
        };

        *self.session.borrow_mut() = Some(Session {
            grid,
            snapshot,
            playback,
        });
        self.label.set(Label::Stop);
        self.finish(SessionState::Playing);
        info!("session playing");
        Ok(TriggerOutcome::Completed)
    }

    /// Run the exit sequence: stop audio and the playback clock, restore
    /// the original colors, hide the added cells, collapse.
    pub async fn on_trigger_exit(&self) -> TriggerOutcome {
        if !self.begin(SessionState::Playing) {
            debug!(state = ?self.state(), "exit trigger ignored");
            return TriggerOutcome::Ignored;
        }

        info!("session exiting");
        self.audio.stop();
        let session = self.session.borrow_mut().take();
        match session {
            Some(session) => {
                let stats = session.playback.stop().await;
                debug!(
                    ticks = stats.ticks,
                    redraws = stats.redraws,
                    writes = stats.writes,
                    "playback finished"
                );
                self.teardown(Some((&*session.grid, &session.snapshot)))
                    .await;
            }
            None => self.teardown(None).await,
        }

        self.label.set(Label::Play);
        self.finish(SessionState::Stopped);
        info!("session stopped");
        TriggerOutcome::Completed
    }

    pub async fn on_audio_event(&self, event: AudioEvent) -> TriggerOutcome {
        match event {
            AudioEvent::Playing => {
                debug!("audio playing");
                TriggerOutcome::Ignored
            }
            AudioEvent::Paused | AudioEvent::Ended => {
                debug!(?event, "audio stopped");
                self.on_trigger_exit().await
            }
        }
    }

    fn begin(&self, from: SessionState) -> bool {
        if self.state() != from {
            return false;
        }
        self.state.send_replace(SessionState::Transitioning);
        true
    }

    fn finish(&self, to: SessionState) {
        self.state.send_replace(to);
    }

    async fn resize(&self, expanded: bool) {
        Phase::new("resize", self.timings.resize())
            .run(&*self.surface, || self.surface.set_expanded(expanded))
            .await;
    }

    async fn reveal(&self, revealed: bool) {
        Phase::new("reveal", self.timings.reveal())
            .run(&*self.surface, || self.surface.set_revealed(revealed))
            .await;
    }

    async fn fade(&self, grid: &Grid<S::Cell>, apply: impl FnOnce()) {
        grid.set_animatable(true);
        Phase::new("fade", self.timings.fade())
            .run(&*self.surface, apply)
            .await;
        grid.set_animatable(false);
    }

    /// Put the surface back: restore colors (if a snapshot was taken),
    /// hide the added cells, collapse.
    async fn teardown(&self, restore: Option<(&Grid<S::Cell>, &Snapshot<S::Cell>)>) {
        if let Some((grid, snapshot)) = restore {
            self.fade(grid, || grid.restore(snapshot)).await;
        }
        self.reveal(false).await;
        self.resize(false).await;
    }
}

/// Forward audio notifications to `controller`, each in its own task so
/// one arriving mid-sequence meets the state guard instead of waiting.
pub fn listen<S, A>(
    controller: Rc<Controller<S, A>>,
    mut events: mpsc::UnboundedReceiver<AudioEvent>,
) -> JoinHandle<()>
where
    S: Surface + 'static,
    A: AudioTrack + 'static,
{
    tokio::task::spawn_local(async move {
        while let Some(event) = events.recv().await {
            let controller = Rc::clone(&controller);
            tokio::task::spawn_local(async move {
                controller.on_audio_event(event).await;
            });
        }
    })
}
