//! Client session state machine.
//!
//! A [`ClientSession`] owns the channel, the renderer and the input device.
//! It connects, registers its player, then answers every world snapshot with
//! one rendered frame and one action until the server goes away or the user
//! quits.

use std::future::Future;
use std::io;
use std::time::Duration;

use raiders_config::Config;
use raiders_net::{
    Action, ChannelError, CloseReason, ConnectError, Frame, FrameConfig, FramedChannel, Message,
    PlayerAction, PlayerId, Received, Register, dial,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::encoder::ActionEncoder;
use crate::input::InputDevice;
use crate::limiter::FrameLimiter;
use crate::render::Renderer;
use crate::scene::{ResourceCounters, Scene};
use crate::viewport::ViewportProjector;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Registering,
    Syncing,
    Terminated(ExitReason),
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The server announced its shutdown.
    ServerShutdown,
    /// The channel stopped delivering messages.
    PeerClosed(CloseReason),
    /// The user asked to quit.
    LocalQuit,
    /// Sending a message failed.
    SendFailed,
    /// The server could not be reached.
    ConnectFailed,
    /// The session was driven before a channel was attached.
    NotConnected,
}

/// Fatal session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

/// Drives one connection from connect to shutdown.
pub struct ClientSession<S, R, I> {
    channel: Option<FramedChannel<S>>,
    renderer: R,
    input: I,
    player_id: PlayerId,
    projector: ViewportProjector,
    encoder: ActionEncoder,
    limiter: FrameLimiter,
    frame_config: FrameConfig,
    server_address: String,
    server_port: u16,
    connect_timeout: Duration,
    state: SessionState,
    quit_requested: bool,
    renderer_released: bool,
    frames_rendered: u64,
    actions_sent: u64,
}

impl<S, R, I> ClientSession<S, R, I>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Renderer,
    I: InputDevice,
{
    pub fn new(config: &Config, renderer: R, input: I) -> Self {
        Self {
            channel: None,
            renderer,
            input,
            player_id: config.network.player_id,
            projector: ViewportProjector::new(config.viewport.clone()),
            encoder: ActionEncoder::new(config.viewport.size),
            limiter: FrameLimiter::new(config.render.max_fps),
            frame_config: FrameConfig {
                max_payload_size: config.network.max_payload_size,
            },
            server_address: config.network.server_address.clone(),
            server_port: config.network.server_port,
            connect_timeout: config.network.connect_timeout(),
            state: SessionState::Connecting,
            quit_requested: false,
            renderer_released: false,
            frames_rendered: 0,
            actions_sent: 0,
        }
    }

    /// Hand the session an already-connected channel.
    pub fn attach(&mut self, channel: FramedChannel<S>) {
        if self.state != SessionState::Connecting {
            warn!(state = ?self.state, "ignoring channel attached outside of connecting state");
            return;
        }
        self.channel = Some(channel);
        self.state = SessionState::Registering;
    }

    /// Announce the local player to the server.
    pub async fn register(&mut self) {
        if self.state != SessionState::Registering {
            return;
        }
        let msg = Message::Register(Register {
            player_id: self.player_id,
        });
        if self.send(&msg).await {
            info!(player_id = self.player_id, "registered");
            self.state = SessionState::Syncing;
        }
    }

    /// Advance the session by one iteration.
    pub async fn step(&mut self) -> SessionState {
        match self.state {
            SessionState::Terminated(_) => {}
            _ if self.quit_requested => self.terminate(ExitReason::LocalQuit).await,
            SessionState::Connecting => self.terminate(ExitReason::NotConnected).await,
            SessionState::Registering => self.register().await,
            SessionState::Syncing => self.sync().await,
        }
        self.state
    }

    /// Run until the session terminates.
    pub async fn run(&mut self) -> ExitReason {
        loop {
            if let SessionState::Terminated(reason) = self.step().await {
                return reason;
            }
        }
    }

    async fn sync(&mut self) {
        let received = match self.channel.as_mut() {
            Some(channel) => channel.receive().await,
            None => Received::Closed(CloseReason::LocallyClosed),
        };

        match received {
            Received::Message(Message::Frame(frame)) => {
                self.on_frame(frame).await;
                self.pace().await;
            }
            Received::Message(Message::InvalidFrame(reason)) => {
                warn!(%reason, "skipping malformed frame");
                self.pace().await;
            }
            Received::Message(Message::ServerShutdown) => {
                info!("server is shutting down");
                self.terminate(ExitReason::ServerShutdown).await;
            }
            Received::Message(other) => {
                debug!(message = ?other, "ignoring message");
            }
            Received::Closed(reason) => {
                if reason == CloseReason::PeerClosed {
                    info!("connection closed by server");
                } else {
                    warn!(?reason, "connection lost");
                }
                self.terminate(ExitReason::PeerClosed(reason)).await;
            }
        }
    }

    async fn on_frame(&mut self, frame: Frame) {
        let layout = match self.projector.project(&frame.info, self.player_id, frame.size) {
            Ok(layout) => layout,
            Err(e) => {
                warn!(error = %e, "skipping frame");
                return;
            }
        };

        let window_size = self.renderer.window_size();
        let counters = ResourceCounters::for_player(&frame.info, self.player_id);
        let scene = Scene::compose(&layout, &counters, window_size);
        match self.renderer.render(&scene) {
            Ok(()) => self.frames_rendered += 1,
            Err(e) => warn!(error = %e, "failed to render frame"),
        }

        if self.renderer.poll_quit() {
            info!("quit requested");
            self.quit_requested = true;
        }

        self.input.sample();
        let action = self.encoder.encode(
            self.input.keyboard(),
            self.input.mouse(),
            window_size,
            layout.viewport.relative_pos,
        );
        let msg = Message::Action(PlayerAction {
            player_id: self.player_id,
            action,
        });
        if self.send(&msg).await {
            self.actions_sent += 1;
        }
    }

    /// Hold the loop to the configured rate. Runs after every snapshot,
    /// skipped or not, so a flood of bad frames is paced too.
    async fn pace(&mut self) {
        if self.state == SessionState::Syncing {
            self.limiter.wait().await;
        }
    }

    /// Send one message, terminating the session on failure.
    async fn send(&mut self, msg: &Message) -> bool {
        let result = match self.channel.as_mut() {
            Some(channel) => channel.send(msg).await,
            None => Err(ChannelError::Closed),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to send message");
                self.terminate(ExitReason::SendFailed).await;
                false
            }
        }
    }

    async fn terminate(&mut self, reason: ExitReason) {
        if matches!(self.state, SessionState::Terminated(_)) {
            return;
        }
        debug!(?reason, "session terminated");
        self.state = SessionState::Terminated(reason);
        self.shutdown().await;
    }

    /// Release the channel and the renderer. Safe to call any number of times.
    ///
    /// A session that is still live ends with [`ExitReason::LocalQuit`].
    pub async fn shutdown(&mut self) {
        if !matches!(self.state, SessionState::Terminated(_)) {
            self.state = SessionState::Terminated(ExitReason::LocalQuit);
        }
        if let Some(mut channel) = self.channel.take() {
            channel.close().await;
        }
        self.release_renderer();
    }

    fn release_renderer(&mut self) {
        if self.renderer_released {
            return;
        }
        self.renderer_released = true;
        self.renderer.close();
        info!(
            frames = self.frames_rendered,
            actions = self.actions_sent,
            "stopped"
        );
    }

    /// Connect through `connecting`, which must yield a stream within the
    /// configured timeout.
    ///
    /// Failure is final: the session terminates and releases the renderer.
    pub async fn connect_with<F>(&mut self, connecting: F) -> Result<(), SessionError>
    where
        F: Future<Output = io::Result<S>>,
    {
        info!(
            address = %self.server_address,
            port = self.server_port,
            player_id = self.player_id,
            "connecting"
        );
        let addr = format!("{}:{}", self.server_address, self.server_port);
        match raiders_net::connect_with(addr, self.connect_timeout, self.frame_config, connecting)
            .await
        {
            Ok(channel) => {
                self.attach(channel);
                Ok(())
            }
            Err(e) => {
                self.terminate(ExitReason::ConnectFailed).await;
                Err(e.into())
            }
        }
    }

    /// Ask the session to stop at the top of its next iteration.
    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Most recently sent action, or [`Action::NEUTRAL`] before the first.
    pub fn last_action(&self) -> Action {
        self.encoder.last()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn input_mut(&mut self) -> &mut I {
        &mut self.input
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn actions_sent(&self) -> u64 {
        self.actions_sent
    }
}

impl<R, I> ClientSession<TcpStream, R, I>
where
    R: Renderer,
    I: InputDevice,
{
    /// Connect to the configured server over TCP.
    pub async fn connect(&mut self) -> Result<(), SessionError> {
        let addr = format!("{}:{}", self.server_address, self.server_port);
        self.connect_with(dial(&addr)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::FixedInput;
    use crate::render::RecordingRenderer;
    use raiders_input::{KeyCode, KeyboardState, MouseState};
    use raiders_net::{ObjectRecord, WorldSnapshot};
    use tokio::io::{DuplexStream, duplex};

    type TestSession = ClientSession<DuplexStream, RecordingRenderer, FixedInput>;

    fn config(player_id: PlayerId) -> Config {
        let mut config = Config::default();
        config.network.player_id = player_id;
        config.render.max_fps = 0;
        config
    }

    fn session_pair(player_id: PlayerId) -> (TestSession, FramedChannel<DuplexStream>) {
        let (client, server) = duplex(64 * 1024);
        let mut session = ClientSession::new(
            &config(player_id),
            RecordingRenderer::new((800, 800)),
            FixedInput::default(),
        );
        session.attach(FramedChannel::new(client, FrameConfig::default()));
        (session, FramedChannel::new(server, FrameConfig::default()))
    }

    fn frame(player_id: PlayerId, pos: (f64, f64)) -> Message {
        let mut info = WorldSnapshot::default();
        info.positions.insert(player_id, pos);
        info.objects.push(ObjectRecord::new(-1, pos.0, pos.1, 20.0));
        Message::Frame(Frame {
            size: (1000, 1000),
            info,
        })
    }

    #[tokio::test]
    async fn test_register_then_sync() {
        let (mut session, mut server) = session_pair(5);
        assert_eq!(session.state(), SessionState::Registering);

        assert_eq!(session.step().await, SessionState::Syncing);
        assert_eq!(
            server.receive().await,
            Received::Message(Message::Register(Register { player_id: 5 }))
        );
    }

    #[tokio::test]
    async fn test_frame_renders_and_sends_action() {
        let (mut session, mut server) = session_pair(1);
        session.input_mut().keyboard = KeyboardState::from_iter([KeyCode::KeyD]);
        session.step().await;
        server.receive().await;

        server.send(&frame(1, (500.0, 500.0))).await.unwrap();
        assert_eq!(session.step().await, SessionState::Syncing);

        assert_eq!(session.renderer().scenes.len(), 1);
        match server.receive().await {
            Received::Message(Message::Action(msg)) => {
                assert_eq!(msg.player_id, 1);
                assert_eq!(msg.action.ax, 2);
                assert_eq!(msg.action, session.last_action());
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_frame_without_local_player_is_skipped() {
        let (mut session, mut server) = session_pair(1);
        session.step().await;
        server.receive().await;

        server.send(&frame(2, (500.0, 500.0))).await.unwrap();
        server.send(&Message::ServerShutdown).await.unwrap();
        session.step().await;
        assert_eq!(
            session.step().await,
            SessionState::Terminated(ExitReason::ServerShutdown)
        );
        assert!(session.renderer().scenes.is_empty());
        assert_eq!(session.actions_sent(), 0);
    }

    #[tokio::test]
    async fn test_unrecognized_messages_are_ignored() {
        let (mut session, mut server) = session_pair(1);
        session.step().await;
        server.receive().await;

        server.send(&Message::Unrecognized).await.unwrap();
        server
            .send(&Message::Register(Register { player_id: 9 }))
            .await
            .unwrap();
        assert_eq!(session.step().await, SessionState::Syncing);
        assert_eq!(session.step().await, SessionState::Syncing);
    }

    #[tokio::test]
    async fn test_peer_close_terminates() {
        let (mut session, mut server) = session_pair(1);
        session.step().await;
        server.close().await;
        drop(server);

        assert_eq!(
            session.run().await,
            ExitReason::PeerClosed(CloseReason::PeerClosed)
        );
        assert_eq!(session.renderer().close_calls, 1);
    }

    #[tokio::test]
    async fn test_quit_is_observed_after_frame() {
        let (mut session, mut server) = session_pair(1);
        session.step().await;
        server.receive().await;

        server.send(&frame(1, (500.0, 500.0))).await.unwrap();
        session.renderer.quit_requested = true;
        assert_eq!(session.step().await, SessionState::Syncing);
        // The in-flight action still went out.
        assert!(matches!(
            server.receive().await,
            Received::Message(Message::Action(_))
        ));

        assert_eq!(
            session.step().await,
            SessionState::Terminated(ExitReason::LocalQuit)
        );
        assert_eq!(
            server.receive().await,
            Received::Closed(CloseReason::PeerClosed)
        );
    }

    #[tokio::test]
    async fn test_step_without_channel_terminates() {
        let mut session: TestSession = ClientSession::new(
            &config(1),
            RecordingRenderer::new((800, 800)),
            FixedInput::new(KeyboardState::new(), MouseState::new()),
        );
        assert_eq!(session.run().await, ExitReason::NotConnected);
        assert!(session.renderer().is_closed());
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (mut session, _server) = session_pair(1);
        session.shutdown().await;
        session.shutdown().await;
        assert_eq!(
            session.state(),
            SessionState::Terminated(ExitReason::LocalQuit)
        );
        assert_eq!(session.renderer().close_calls, 1);
    }

    #[tokio::test]
    async fn test_connect_failure_releases_renderer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = config(1);
        config.network.server_address = "127.0.0.1".to_string();
        config.network.server_port = port;
        let mut session: ClientSession<TcpStream, _, _> = ClientSession::new(
            &config,
            RecordingRenderer::new((800, 800)),
            FixedInput::default(),
        );

        assert!(matches!(
            session.connect().await,
            Err(SessionError::Connect(_))
        ));
        assert_eq!(
            session.state(),
            SessionState::Terminated(ExitReason::ConnectFailed)
        );
        assert_eq!(session.renderer().close_calls, 1);
    }

    #[tokio::test]
    async fn test_bad_frame_body_skips_only_that_tick() {
        let (client, mut raw_server) = duplex(64 * 1024);
        let mut session: TestSession = ClientSession::new(
            &config(1),
            RecordingRenderer::new((800, 800)),
            FixedInput::default(),
        );
        session.attach(FramedChannel::new(client, FrameConfig::default()));
        session.step().await;

        let bad = br#"{"type":"frame","size":[1000,1000],"info":{"positions":{"1":[500.0,500.0]},"objects":[[7,1,2]]}}"#;
        raiders_net::write_frame(&mut raw_server, bad, &FrameConfig::default())
            .await
            .unwrap();
        assert_eq!(session.step().await, SessionState::Syncing);
        assert!(session.renderer().scenes.is_empty());
        assert_eq!(session.actions_sent(), 0);

        let mut server = FramedChannel::new(raw_server, FrameConfig::default());
        assert!(matches!(
            server.receive().await,
            Received::Message(Message::Register(_))
        ));
        server.send(&frame(1, (500.0, 500.0))).await.unwrap();
        assert_eq!(session.step().await, SessionState::Syncing);
        assert_eq!(session.renderer().scenes.len(), 1);
        assert_eq!(session.actions_sent(), 1);
        assert!(matches!(
            server.receive().await,
            Received::Message(Message::Action(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_timeout_releases_renderer() {
        let mut config = config(1);
        config.network.server_address = "192.0.2.1".to_string();
        config.network.connect_timeout_ms = 20;
        let mut session: TestSession = ClientSession::new(
            &config,
            RecordingRenderer::new((800, 800)),
            FixedInput::default(),
        );

        let result = session
            .connect_with(std::future::pending::<io::Result<DuplexStream>>())
            .await;
        assert!(matches!(
            result,
            Err(SessionError::Connect(ConnectError::Timeout { .. }))
        ));
        assert_eq!(
            session.state(),
            SessionState::Terminated(ExitReason::ConnectFailed)
        );
        assert_eq!(session.renderer().close_calls, 1);
    }

    #[tokio::test]
    async fn test_connect_with_stream_starts_registering() {
        let (client, server) = duplex(1024);
        let mut session: TestSession = ClientSession::new(
            &config(4),
            RecordingRenderer::new((800, 800)),
            FixedInput::default(),
        );
        session.connect_with(async { Ok(client) }).await.unwrap();
        assert_eq!(session.state(), SessionState::Registering);

        let mut server = FramedChannel::new(server, FrameConfig::default());
        session.step().await;
        assert_eq!(
            server.receive().await,
            Received::Message(Message::Register(Register { player_id: 4 }))
        );
    }

    #[tokio::test]
    async fn test_skipped_frames_are_paced() {
        let (client, server) = duplex(64 * 1024);
        let mut config = config(1);
        config.render.max_fps = 1;
        let mut session: TestSession = ClientSession::new(
            &config,
            RecordingRenderer::new((800, 800)),
            FixedInput::default(),
        );
        session.attach(FramedChannel::new(client, FrameConfig::default()));
        let mut server = FramedChannel::new(server, FrameConfig::default());
        session.step().await;
        server.receive().await;

        server.send(&frame(2, (500.0, 500.0))).await.unwrap();
        assert_eq!(session.step().await, SessionState::Syncing);
        assert!(session.renderer().scenes.is_empty());
        assert!(session.limiter.delay(std::time::Instant::now()) > Duration::ZERO);
    }
}
