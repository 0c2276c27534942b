use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod audio;
mod config;
mod display;
mod lifecycle;
mod notify;
mod playback;
mod render;
mod video;

use audio::AudioSink;
use config::Config;
use lifecycle::Lifecycle;
use notify::NotificationOverlay;
use playback::clock::{FramePacer, PlaybackClock};
use playback::controls::Controller;
use playback::{NoInput, Player, TerminalInput};
use render::{ColorMode, RenderSession};
use video::{FfmpegVideo, VideoSource};

#[derive(Parser, Debug)]
#[command(name = "termvideo")]
#[command(author, version, about = "Play videos in the terminal")]
pub struct Args {
    /// Video file to play
    #[arg(required_unless_present_any = ["init_config", "completions"])]
    pub video: Option<PathBuf>,

    /// Color mode: color, dynamic, 256, monochrome, ascii-art, full-ascii
    #[arg(short, long)]
    pub color_mode: Option<ColorMode>,

    /// Start position in milliseconds
    #[arg(short, long)]
    pub offset: Option<u64>,

    /// Volume in percent (0-100)
    #[arg(short, long)]
    pub volume: Option<f32>,

    /// Do not play the soundtrack
    #[arg(long)]
    pub no_audio: bool,

    /// Ignore keyboard controls
    #[arg(long)]
    pub no_keyboard: bool,

    /// Only draw ascii characters
    #[arg(long)]
    pub no_unicode: bool,

    /// Verbose logging to stderr
    #[arg(short, long)]
    pub debug: bool,

    /// Frames per second (defaults to the video's rate)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Grid height in rows (defaults to the terminal height)
    #[arg(long)]
    pub rows: Option<u16>,

    /// Grid width in columns (defaults to the terminal width)
    #[arg(long)]
    pub cols: Option<u16>,

    /// Round colors to multiples of this step with dithering (<= 0 disables)
    #[arg(long, allow_negative_numbers = true)]
    pub color_reduce: Option<i32>,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write a default config file to ~/.config/termvideo/config.toml
    #[arg(long)]
    pub init_config: bool,

    /// Print shell completions and exit
    #[arg(long, value_name = "SHELL")]
    pub completions: Option<clap_complete::Shell>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let directive = if args.debug {
        "termvideo=debug"
    } else {
        "termvideo=warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "termvideo", &mut stdout());
        return Ok(());
    }

    if args.init_config {
        let path = Config::init_default_config()?;
        println!("Config written to {}", path.display());
        return Ok(());
    }

    // Load config, then let the command line override it
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_from_default_path().unwrap_or_default(),
    };
    config.merge_args(&args);
    config.validate()?;

    let path = args.video.clone().context("No video file given")?;
    let code = play(config, path).await?;
    std::process::exit(code);
}

async fn play(config: Config, path: PathBuf) -> Result<i32> {
    let lifecycle = Arc::new(Lifecycle::new());

    let (term_cols, term_rows) = display::terminal::grid_size()?;
    let cols = config.render.cols.unwrap_or(term_cols).max(1);
    let rows = config.render.rows.unwrap_or(term_rows).max(1);

    let video = FfmpegVideo::open(&path, cols, rows)?;
    let fps = config
        .playback
        .fps
        .unwrap_or_else(|| video.frame_rate().round().max(1.0) as u32);
    info!(
        "Grid {}x{}, {} fps, duration {:?}ms",
        cols,
        rows,
        fps,
        video.info().duration_ms
    );

    let audio = if config.playback.audio {
        let scratch = audio::temp_pcm_path();
        lifecycle.on_teardown("remove extracted audio", move || {
            let _ = std::fs::remove_file(&scratch);
        });
        match audio::create_audio_pipeline(&path, config.playback.offset_ms, config.playback.volume) {
            Ok(player) => {
                let handle = player.stop_handle();
                lifecycle.on_teardown("stop audio", move || handle.stop());
                Some(Box::new(player) as Box<dyn AudioSink + Send>)
            }
            Err(e) => {
                warn!("Playing without audio: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let raw = config.input.raw_mode();
    display::terminal::setup(rows, raw)?;
    lifecycle.on_teardown("restore terminal", move || display::terminal::restore(raw));

    // SIGINT (Ctrl-C outside raw mode) and SIGTERM
    let signal_lifecycle = lifecycle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        if signal_lifecycle.teardown() {
            info!("Interrupted");
            std::process::exit(playback::Exit::Interrupted.code());
        }
    });

    let mut player = Player {
        video,
        audio,
        session: RenderSession::new(config.playback.color_mode, config.render.options(), cols, rows),
        overlay: NotificationOverlay::new(),
        clock: PlaybackClock::new(config.playback.offset_ms as i64),
        pacer: FramePacer::new(fps),
        controller: Controller::new(config.playback.volume),
        lifecycle: lifecycle.clone(),
        follow_resize: config.render.follows_terminal(),
    };
    let keyboard = config.input.keyboard;

    let result = tokio::task::spawn_blocking(move || {
        let mut out = stdout().lock();
        if keyboard {
            player.run(&mut TerminalInput, &mut out)
        } else {
            player.run(&mut NoInput, &mut out)
        }
    })
    .await
    .context("Render loop panicked");

    lifecycle.teardown();
    let exit = result??;
    info!("Playback finished: {:?}", exit);
    Ok(exit.code())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
