use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Mutex;
use std::time::Instant;
use std::{fs, process, thread};

use anyhow::{Context, Result, bail};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::{cursor, execute, terminal};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::error;
use tracing_subscriber::EnvFilter;

use grid_player::{
    audio::{AudioEvents, AudioTrack, ProcessTrack, SilentTrack},
    config::PlayerConfig,
    decoder::{FrameSequence, LazyFrames, diff},
    grid::Surface,
    host::{memory::MemorySurface, terminal::TermSurface},
    transition::{self, Controller},
    types::{FrameData, SessionState},
    PlayerResult,
};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

const PLAY_USAGE: &str =
    "grid-player play <frames.json> [--audio <file>] [--config <config.json>] [--headless]";
const COMPILE_USAGE: &str = "grid-player compile <diffs.json> <frames.json> [--config <config.json>]";
const INSPECT_USAGE: &str = "grid-player inspect <frames.json> [--config <config.json>]";

#[derive(Debug, Default)]
struct Args {
    positional: Vec<String>,
    audio: Option<PathBuf>,
    config: Option<PathBuf>,
    headless: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--audio" => parsed.audio = Some(args.next().context("--audio needs a file")?.into()),
                "--config" => {
                    parsed.config = Some(args.next().context("--config needs a file")?.into())
                }
                "--headless" => parsed.headless = true,
                flag if flag.starts_with("--") => bail!("Unknown option {flag}"),
                _ => parsed.positional.push(arg),
            }
        }
        Ok(parsed)
    }

    fn load_config(&self) -> Result<PlayerConfig> {
        match &self.config {
            Some(path) => PlayerConfig::load_from(path)
                .with_context(|| format!("Failed to load config {}", path.display())),
            None => Ok(PlayerConfig::load()),
        }
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let command = args.next();
    let args = Args::parse(args)?;

    match command.as_deref() {
        Some("play") => {
            let path = args.positional.first().context(PLAY_USAGE)?;
            init_logging(args.headless)?;
            play(path, &args)
        }
        Some("compile") => {
            let input = args.positional.first().context(COMPILE_USAGE)?;
            let output = args.positional.get(1).context(COMPILE_USAGE)?;
            init_logging(true)?;
            compile(input, output, &args)
        }
        Some("inspect") => {
            let path = args.positional.first().context(INSPECT_USAGE)?;
            init_logging(true)?;
            inspect(path, &args)
        }
        _ => bail!(
            "grid-player: audio-synced animation on a grid of cells\n\nUsage:\n  {PLAY_USAGE}\n  {COMPILE_USAGE}\n  {INSPECT_USAGE}"
        ),
    }
}

/// Log to `GRID_PLAYER_LOG` when set, otherwise to stderr unless the
/// terminal UI owns the screen.
fn init_logging(stderr_ok: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Ok(path) = std::env::var("GRID_PLAYER_LOG") {
        let file = fs::File::create(&path).with_context(|| format!("Failed to create {path}"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else if stderr_ok {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

fn read_frame_data(path: &str) -> Result<FrameData> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    FrameData::from_json(&json).with_context(|| format!("Failed to parse {path}"))
}

// ---------------------------------------------------------------------------
// compile / inspect
// ---------------------------------------------------------------------------

fn compile(input: &str, output: &str, args: &Args) -> Result<()> {
    let config = args.load_config()?;
    let json = fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))?;
    let diffs = diff::DiffData::from_json(&json).with_context(|| format!("Failed to parse {input}"))?;
    let data = diff::to_run_length(&diffs, config.grid.columns, config.grid.rows)
        .with_context(|| format!("Invalid diff data in {input}"))?;

    let output_json = serde_json::to_string(&data)?;
    fs::write(output, &output_json).with_context(|| format!("Failed to write {output}"))?;

    let runs: usize = data.frames.iter().map(Vec::len).sum();
    eprintln!(
        "Compiled {} frames ({} runs) from {} -> {}",
        data.frames.len(),
        runs,
        input,
        output,
    );
    Ok(())
}

fn inspect(path: &str, args: &Args) -> Result<()> {
    let config = args.load_config()?;
    let data = read_frame_data(path)?;
    let frames = FrameSequence::decode(&data, config.grid.cell_count())
        .with_context(|| format!("Invalid frame data in {path}"))?;

    let changes: Vec<usize> = (1..frames.len()).map(|i| frames.changed_cells(i)).collect();
    let max = changes.iter().copied().max().unwrap_or(0);
    let mean = if changes.is_empty() {
        0.0
    } else {
        changes.iter().sum::<usize>() as f64 / changes.len() as f64
    };

    println!("frames:   {}", frames.len());
    println!("fps:      {}", frames.fps());
    println!("duration: {:.2}s", frames.total_duration().as_secs_f64());
    println!("cells:    {} ({}x{})", frames.cell_count(), config.grid.columns, config.grid.rows);
    println!("changed cells per frame: mean {mean:.1}, max {max}");
    Ok(())
}

// ---------------------------------------------------------------------------
// play
// ---------------------------------------------------------------------------

/// The audio collaborator picked on the command line.
enum Track {
    Silent(SilentTrack),
    Process(ProcessTrack),
}

impl Track {
    fn new(config: &PlayerConfig, frames: &LazyFrames, audio: Option<&Path>, events: AudioEvents) -> Self {
        match audio {
            Some(file) => Track::Process(ProcessTrack::new(
                config.audio_command.clone(),
                file.to_path_buf(),
                events,
            )),
            None => Track::Silent(SilentTrack::new(frames.nominal_duration(), events)),
        }
    }
}

impl AudioTrack for Track {
    async fn start(&self) -> PlayerResult<()> {
        match self {
            Track::Silent(track) => track.start().await,
            Track::Process(track) => track.start().await,
        }
    }

    fn stop(&self) {
        match self {
            Track::Silent(track) => track.stop(),
            Track::Process(track) => track.stop(),
        }
    }
}

fn play(path: &str, args: &Args) -> Result<()> {
    let config = args.load_config()?;
    let data = read_frame_data(path)?;
    let frames = LazyFrames::new(data, config.grid.cell_count());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = LocalSet::new();
    if args.headless {
        local.block_on(&runtime, play_headless(config, frames, args.audio.clone()))
    } else {
        local.block_on(&runtime, play_terminal(config, frames, args.audio.clone()))
    }
}

async fn play_headless(config: PlayerConfig, frames: LazyFrames, audio: Option<PathBuf>) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let track = Track::new(&config, &frames, audio.as_deref(), tx);
    let surface = Rc::new(MemorySurface::new(config.grid, config.palette.clone()));
    let controller = Rc::new(Controller::new(Rc::clone(&surface), track, frames, &config));
    let listener = transition::listen(Rc::clone(&controller), rx);

    let started = Instant::now();
    controller.on_trigger_enter().await?;
    controller
        .subscribe()
        .wait_for(|s| *s == SessionState::Stopped)
        .await?;
    listener.abort();

    eprintln!(
        "Played one session in {:.2}s ({} cell writes)",
        started.elapsed().as_secs_f64(),
        surface.writes(),
    );
    Ok(())
}

async fn play_terminal(config: PlayerConfig, frames: LazyFrames, audio: Option<PathBuf>) -> Result<()> {
    let (term_w, term_h) = terminal::size()?;
    let (need_w, need_h) = TermSurface::<io::Stdout>::required_size(&config.grid);
    if term_w < need_w || term_h < need_h {
        bail!("Terminal too small: need {need_w}x{need_h}, have {term_w}x{term_h}");
    }

    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(
        stdout,
        terminal::EnterAlternateScreen,
        cursor::Hide,
        terminal::Clear(terminal::ClearType::All),
    )?;

    let result = run_terminal(config, frames, audio).await;

    // Always restore terminal state.
    let _ = execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
    let _ = stdout.flush();

    result
}

enum Input {
    Toggle,
    Redraw,
    Quit,
}

/// Read terminal events on a blocking thread and forward the ones the
/// player cares about.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Input> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        loop {
            let input = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Char('p') => Input::Toggle,
                    KeyCode::Char('q') | KeyCode::Esc => Input::Quit,
                    _ => continue,
                },
                Ok(Event::Resize(_, _)) => Input::Redraw,
                Ok(_) => continue,
                Err(_) => Input::Quit,
            };
            if tx.send(input).is_err() {
                break;
            }
        }
    });
    rx
}

async fn run_terminal(config: PlayerConfig, frames: LazyFrames, audio: Option<PathBuf>) -> Result<()> {
    let (audio_tx, audio_rx) = mpsc::unbounded_channel();
    let track = Track::new(&config, &frames, audio.as_deref(), audio_tx);
    let surface = Rc::new(TermSurface::new(io::stdout(), config.grid, config.palette.clone()));
    let controller = Rc::new(Controller::new(Rc::clone(&surface), track, frames, &config));
    let listener = transition::listen(Rc::clone(&controller), audio_rx);

    let mut inputs = spawn_input_reader();
    let mut states = controller.subscribe();
    let (failures_tx, mut failures) = mpsc::unbounded_channel();

    surface.render_menubar(controller.label())?;
    surface.present()?;

    let outcome = loop {
        tokio::select! {
            input = inputs.recv() => match input {
                Some(Input::Toggle) => {
                    let controller = Rc::clone(&controller);
                    let failures_tx = failures_tx.clone();
                    tokio::task::spawn_local(async move {
                        if let Err(e) = controller.toggle().await {
                            error!("trigger failed: {e}");
                            let _ = failures_tx.send(e);
                        }
                    });
                }
                Some(Input::Redraw) => {
                    surface.invalidate();
                    surface.render_menubar(controller.label())?;
                    surface.present()?;
                }
                Some(Input::Quit) | None => break Ok(()),
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                surface.render_menubar(controller.label())?;
            }
            Some(e) = failures.recv() => {
                break Err(anyhow::Error::new(e).context("Failed to start playback"));
            }
        }
    };

    if controller.settle().await == SessionState::Playing {
        controller.on_trigger_exit().await;
    }
    listener.abort();
    outcome
}
