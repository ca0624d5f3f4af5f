//! The `raiders` client binary.
//!
//! `raiders [server_address] [port] [player_id]` opens a window, connects to a
//! server, shows every snapshot and answers it with the local keyboard and
//! mouse input. With `--headless` no window is opened: frames are only
//! composed (and dumped as PNG when `--frames-dir` is given) and the client
//! sends idle actions.

mod platform;
mod present;
mod window;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use clap::Parser;
use raiders_client::{
    ClientSession, ExitReason, IdleInput, InputDevice, RasterRenderer, Renderer, WindowInput,
};
use raiders_config::{CliArgs, Config};
use raiders_net::CloseReason;
use tokio::net::TcpStream;
use tracing::{error, info, warn};
use winit::event_loop::EventLoop;

use platform::AppDirs;
use window::{ClientWindow, FrameSlot, UserEvent, WindowRenderer};

/// How long a closed window waits for the session to wind down.
const SESSION_GRACE: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = match &args.config {
        Some(dir) => Ok(AppDirs::with_config_dir(dir)),
        None => AppDirs::resolve(),
    }
    .and_then(|dirs| dirs.create().map(|()| dirs));

    // Logging is not up yet; keep the failure to report it afterwards.
    let mut startup_error = None;
    let mut config = match &dirs {
        Ok(dirs) => Config::load_or_create(&dirs.config_dir).unwrap_or_else(|e| {
            startup_error = Some(e.to_string());
            Config::default()
        }),
        Err(e) => {
            startup_error = Some(e.to_string());
            Config::default()
        }
    };
    config.apply_cli_overrides(&args);

    let log_dir = dirs.as_ref().ok().map(AppDirs::log_dir);
    raiders_log::init_logging(log_dir, config.debug.file_logging, Some(&config));
    if let Some(e) = startup_error {
        warn!(error = %e, "using default configuration");
    }
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }

    if config.render.headless {
        run_headless(config)
    } else {
        run_windowed(config)
    }
}

fn title(config: &Config) -> String {
    format!("Player {} - Client", config.network.player_id)
}

fn run_headless(config: Config) -> ExitCode {
    let renderer = RasterRenderer::new(&config.render, title(&config));
    let quit = renderer.quit_handle();
    block_on_session(&config, renderer, IdleInput::default(), quit)
}

/// Event loop on this thread, session on a second one. The window closes when
/// the session ends; closing the window asks the session to stop.
fn run_windowed(config: Config) -> ExitCode {
    let event_loop = match EventLoop::<UserEvent>::with_user_event().build() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!(error = %e, "failed to create event loop, try --headless");
            return ExitCode::FAILURE;
        }
    };

    let raster = RasterRenderer::new(&config.render, title(&config));
    let quit = raster.quit_handle();
    let slot = Arc::new(FrameSlot::new((
        config.render.window_width,
        config.render.window_height,
    )));
    let input = WindowInput::new();
    let renderer = WindowRenderer::new(raster, Arc::clone(&slot), event_loop.create_proxy());

    let (done_tx, done_rx) = mpsc::channel();
    let session_input = input.clone();
    let session_quit = Arc::clone(&quit);
    let session_config = config.clone();
    let spawned = std::thread::Builder::new()
        .name("session".to_string())
        .spawn(move || {
            let code = block_on_session(&session_config, renderer, session_input, session_quit);
            let _ = done_tx.send(code);
        });
    if let Err(e) = spawned {
        error!(error = %e, "failed to start session thread");
        return ExitCode::FAILURE;
    }

    let mut app = ClientWindow::new(title(&config), slot, input, Arc::clone(&quit));
    if let Err(e) = event_loop.run_app(&mut app) {
        error!(error = %e, "event loop failed");
        quit.store(true, Ordering::Relaxed);
        return ExitCode::FAILURE;
    }
    quit.store(true, Ordering::Relaxed);

    let code = match done_rx.recv_timeout(SESSION_GRACE) {
        Ok(code) => code,
        // The session is blocked on a silent server; the socket goes with the
        // process.
        Err(RecvTimeoutError::Timeout) => {
            warn!("session did not stop in time, exiting");
            ExitCode::SUCCESS
        }
        Err(RecvTimeoutError::Disconnected) => {
            error!("session thread stopped without a result");
            ExitCode::FAILURE
        }
    };
    if app.failed() {
        ExitCode::FAILURE
    } else {
        code
    }
}

fn block_on_session<R, I>(config: &Config, renderer: R, input: I, quit: Arc<AtomicBool>) -> ExitCode
where
    R: Renderer,
    I: InputDevice,
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        tokio::spawn(watch_interrupts(quit));
        run_session(config, renderer, input).await
    })
}

async fn run_session<R, I>(config: &Config, renderer: R, input: I) -> ExitCode
where
    R: Renderer,
    I: InputDevice,
{
    let mut session: ClientSession<TcpStream, _, _> = ClientSession::new(config, renderer, input);

    if let Err(e) = session.connect().await {
        error!(error = %e, "could not connect to server");
        return ExitCode::FAILURE;
    }

    let reason = session.run().await;
    session.shutdown().await;
    info!(?reason, "session ended");

    match reason {
        ExitReason::ServerShutdown
        | ExitReason::LocalQuit
        | ExitReason::PeerClosed(CloseReason::PeerClosed) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// First Ctrl-C asks the session to stop after the current frame. A second one
/// exits at once, since a session blocked on the server never sees the flag.
async fn watch_interrupts(quit: Arc<AtomicBool>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("interrupt received, stopping");
    quit.store(true, Ordering::Relaxed);

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("second interrupt, exiting immediately");
        std::process::exit(130);
    }
}
