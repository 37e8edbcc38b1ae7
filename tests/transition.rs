use std::rc::Rc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::LocalSet;

use grid_player::audio::{AudioEvent, AudioTrack, SilentTrack};
use grid_player::{PlayerError, PlayerResult};
use grid_player::config::{GridLayout, PlayerConfig};
use grid_player::decoder::LazyFrames;
use grid_player::host::memory::{HostOp, MemorySurface};
use grid_player::transition::{self, Controller, TriggerOutcome};
use grid_player::types::{FrameData, Label, Run, SessionState};

type TestController = Controller<MemorySurface, SilentTrack>;

const LAYOUT: GridLayout = GridLayout {
    columns: 2,
    rows: 3,
    base_rows: 1,
};

fn config() -> PlayerConfig {
    PlayerConfig {
        grid: LAYOUT,
        ..PlayerConfig::default()
    }
}

/// Ten frames at 10 fps, alternating two colors, sized for `cells`.
fn frames(cells: u32) -> FrameData {
    FrameData {
        fps: 10.0,
        frames: (0..10)
            .map(|i| vec![Run { color: (i % 2) as u8 + 1, len: cells }])
            .collect(),
    }
}

struct Fixture {
    surface: Rc<MemorySurface>,
    controller: Rc<TestController>,
    events: mpsc::UnboundedReceiver<AudioEvent>,
}

fn fixture(data: FrameData, cell_count: usize, track_length: Duration) -> Fixture {
    let config = config();
    let (tx, events) = mpsc::unbounded_channel();
    let surface = Rc::new(MemorySurface::new(LAYOUT, config.palette.clone()));
    let controller = Rc::new(Controller::new(
        Rc::clone(&surface),
        SilentTrack::new(track_length, tx),
        LazyFrames::new(data, cell_count),
        &config,
    ));
    Fixture {
        surface,
        controller,
        events,
    }
}

fn default_fixture() -> Fixture {
    fixture(frames(6), 6, Duration::from_secs(60))
}

#[tokio::test(start_paused = true)]
async fn enter_runs_resize_then_reveal_one_after_another() {
    LocalSet::new()
        .run_until(async {
            let f = default_fixture();
            let outcome = f.controller.on_trigger_enter().await.unwrap();
            assert_eq!(outcome, TriggerOutcome::Completed);
            assert_eq!(f.controller.state(), SessionState::Playing);
            assert_eq!(f.controller.label(), Label::Stop);
            assert_eq!(f.surface.phases(), vec![HostOp::Expand(true), HostOp::Reveal(true)]);

            let log = f.surface.log();
            let at = |op: HostOp| log.iter().find(|(_, o)| *o == op).map(|(t, _)| *t).unwrap();
            let gap = at(HostOp::Reveal(true)) - at(HostOp::Expand(true));
            assert_eq!(gap, Duration::from_millis(300));
            assert!(f.surface.is_expanded());
            assert!(f.surface.is_revealed());
            assert!(!f.surface.overflow_visible());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn trigger_during_a_sequence_is_dropped() {
    LocalSet::new()
        .run_until(async {
            let f = default_fixture();
            let controller = Rc::clone(&f.controller);
            let first = tokio::task::spawn_local(async move { controller.on_trigger_enter().await });

            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(f.controller.state(), SessionState::Transitioning);
            assert_eq!(
                f.controller.on_trigger_enter().await.unwrap(),
                TriggerOutcome::Ignored
            );
            assert_eq!(f.controller.on_trigger_exit().await, TriggerOutcome::Ignored);

            assert_eq!(first.await.unwrap().unwrap(), TriggerOutcome::Completed);
            assert_eq!(f.controller.state(), SessionState::Playing);
            // Only one resize ever ran.
            assert_eq!(f.surface.phases(), vec![HostOp::Expand(true), HostOp::Reveal(true)]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn exit_restores_original_colors_and_collapses() {
    LocalSet::new()
        .run_until(async {
            let f = default_fixture();
            let before = f.surface.cell_states();
            let blank = config().palette.0[0];

            f.controller.on_trigger_enter().await.unwrap();
            tokio::time::sleep(Duration::from_millis(450)).await;
            assert_eq!(f.controller.on_trigger_exit().await, TriggerOutcome::Completed);

            assert_eq!(f.controller.state(), SessionState::Stopped);
            assert_eq!(f.controller.label(), Label::Play);
            assert_eq!(
                f.surface.phases(),
                vec![
                    HostOp::Expand(true),
                    HostOp::Reveal(true),
                    HostOp::Reveal(false),
                    HostOp::Expand(false),
                ]
            );
            assert!(!f.surface.is_expanded());
            assert!(f.surface.overflow_visible());

            // Column-major with one base row: cells 0 and 3 existed before.
            let after = f.surface.cell_states();
            assert_eq!(after[0].color, before[0].color);
            assert_eq!(after[3].color, before[1].color);
            for i in [1, 2, 4, 5] {
                assert_eq!(after[i].color, blank);
                assert_eq!(after[i].opacity, 0.0);
            }
            assert!(after.iter().all(|cell| !cell.animatable));

            f.surface.reset_writes();
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert_eq!(f.surface.writes(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn second_session_reuses_the_inserted_cells() {
    LocalSet::new()
        .run_until(async {
            let f = default_fixture();
            f.controller.toggle().await.unwrap();
            f.controller.toggle().await.unwrap();
            f.controller.toggle().await.unwrap();
            assert_eq!(f.controller.state(), SessionState::Playing);
            assert_eq!(f.surface.cell_states().len(), 6);
            f.controller.toggle().await.unwrap();
            assert_eq!(f.controller.state(), SessionState::Stopped);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_leave_the_surface_untouched() {
    LocalSet::new()
        .run_until(async {
            let f = fixture(frames(5), 6, Duration::from_secs(60));
            let states = f.controller.subscribe();
            let err = f.controller.on_trigger_enter().await.unwrap_err();
            assert!(matches!(err, PlayerError::MalformedFrame { actual: 5, .. }));
            assert!(err.is_malformed_input());
            // The state never left `Stopped`, not even briefly.
            assert!(!states.has_changed().unwrap());
            assert_eq!(f.controller.state(), SessionState::Stopped);
            assert_eq!(f.controller.label(), Label::Play);
            assert!(f.surface.log().is_empty());
            assert_eq!(f.surface.writes(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn structural_mismatch_rolls_back_to_stopped() {
    LocalSet::new()
        .run_until(async {
            let f = fixture(frames(8), 8, Duration::from_secs(60));
            let err = f.controller.on_trigger_enter().await.unwrap_err();
            assert!(matches!(
                err,
                PlayerError::StructuralMismatch {
                    expected: 8,
                    actual: 6
                }
            ));
            assert_eq!(f.controller.state(), SessionState::Stopped);
            assert_eq!(
                f.surface.phases(),
                vec![
                    HostOp::Expand(true),
                    HostOp::Reveal(true),
                    HostOp::Reveal(false),
                    HostOp::Expand(false),
                ]
            );
            assert_eq!(f.surface.writes(), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn audio_ending_stops_the_session() {
    LocalSet::new()
        .run_until(async {
            let Fixture {
                surface,
                controller,
                events,
            } = fixture(frames(6), 6, Duration::from_secs(1));
            let listener = transition::listen(Rc::clone(&controller), events);

            controller.on_trigger_enter().await.unwrap();
            let mut states = controller.subscribe();
            states
                .wait_for(|s| *s == SessionState::Stopped)
                .await
                .unwrap();

            assert_eq!(controller.label(), Label::Play);
            assert!(!surface.is_revealed());
            assert!(!surface.is_expanded());
            listener.abort();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn own_pause_during_exit_is_ignored() {
    LocalSet::new()
        .run_until(async {
            let Fixture {
                surface,
                controller,
                events,
            } = default_fixture();
            let listener = transition::listen(Rc::clone(&controller), events);

            controller.on_trigger_enter().await.unwrap();
            controller.on_trigger_exit().await;
            tokio::time::sleep(Duration::from_secs(2)).await;

            // One exit sequence, not two.
            assert_eq!(
                surface
                    .phases()
                    .iter()
                    .filter(|op| **op == HostOp::Expand(false))
                    .count(),
                1
            );
            assert_eq!(controller.state(), SessionState::Stopped);
            listener.abort();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn enter_while_playing_is_ignored() {
    LocalSet::new()
        .run_until(async {
            let f = default_fixture();
            f.controller.on_trigger_enter().await.unwrap();
            let states = f.controller.subscribe();

            assert_eq!(
                f.controller.on_trigger_enter().await.unwrap(),
                TriggerOutcome::Ignored
            );
            assert_eq!(f.controller.state(), SessionState::Playing);
            assert_eq!(f.controller.label(), Label::Stop);
            assert!(!states.has_changed().unwrap());
            assert_eq!(f.surface.phases(), vec![HostOp::Expand(true), HostOp::Reveal(true)]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn fade_to_highlight_sits_between_reveal_and_audio_start() {
    LocalSet::new()
        .run_until(async {
            let Fixture {
                surface,
                controller,
                mut events,
            } = default_fixture();
            let highlight = config().palette.0[4];
            let t0 = tokio::time::Instant::now();
            let enter = {
                let controller = Rc::clone(&controller);
                tokio::task::spawn_local(async move { controller.on_trigger_enter().await })
            };

            // Halfway through the fade.
            tokio::time::sleep(Duration::from_millis(750)).await;
            let states = surface.cell_states();
            assert_eq!(states.len(), 6);
            assert!(states.iter().all(|cell| cell.color == highlight && cell.animatable));
            assert!(events.try_recv().is_err());

            assert_eq!(enter.await.unwrap().unwrap(), TriggerOutcome::Completed);
            assert!(surface.cell_states().iter().all(|cell| !cell.animatable));
            assert_eq!(events.try_recv().unwrap(), AudioEvent::Playing);

            // Let the first playback tick draw.
            tokio::time::sleep(Duration::from_millis(1)).await;
            let offsets: Vec<Duration> = surface
                .presents()
                .iter()
                .take(4)
                .map(|at| *at - t0)
                .collect();
            // Resize, reveal, fade, then the first frame once audio is up.
            assert_eq!(
                offsets,
                vec![
                    Duration::ZERO,
                    Duration::from_millis(300),
                    Duration::from_millis(600),
                    Duration::from_millis(900),
                ]
            );
        })
        .await;
}

/// An audio device that never starts.
struct UnavailableTrack;

impl AudioTrack for UnavailableTrack {
    async fn start(&self) -> PlayerResult<()> {
        Err(PlayerError::audio("no output device"))
    }

    fn stop(&self) {}
}

#[tokio::test(start_paused = true)]
async fn audio_start_failure_restores_the_surface() {
    LocalSet::new()
        .run_until(async {
            let config = config();
            let surface = Rc::new(MemorySurface::new(LAYOUT, config.palette.clone()));
            let controller = Controller::new(
                Rc::clone(&surface),
                UnavailableTrack,
                LazyFrames::new(frames(6), 6),
                &config,
            );
            let before = surface.cell_states();

            let err = controller.on_trigger_enter().await.unwrap_err();
            assert!(matches!(err, PlayerError::Audio(_)));
            assert_eq!(controller.state(), SessionState::Stopped);
            assert_eq!(controller.label(), Label::Play);
            assert_eq!(
                surface.phases(),
                vec![
                    HostOp::Expand(true),
                    HostOp::Reveal(true),
                    HostOp::Reveal(false),
                    HostOp::Expand(false),
                ]
            );

            let after = surface.cell_states();
            assert_eq!(after[0].color, before[0].color);
            assert_eq!(after[3].color, before[1].color);
            for i in [1, 2, 4, 5] {
                assert_eq!(after[i].color, config.palette.0[0]);
                assert_eq!(after[i].opacity, 0.0);
            }

            surface.reset_writes();
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(surface.writes(), 0);
        })
        .await;
}
