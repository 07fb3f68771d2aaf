//! Chat session lifecycle.
//!
//! ```text
//! Disconnected ─► Connecting ─► Announcing ─► Streaming ─► Closing ─► Closed
//!                     │              │                                  ▲
//!                     └──────────────┴──── connect / announce failed ───┘
//! ```
//!
//! [`ChatSession`] is the unconnected session. Connecting it yields a
//! [`SessionHandle`] for user actions and a [`SessionEvents`] stream of
//! output lines. One spawned task runs the receive loop; sends run on the
//! caller's task and share the write half through an async mutex.
//!
//! Shutdown is cooperative. [`SessionHandle::exit`] moves the state to
//! `Closing`, the receive loop sees that through its state watch and stops
//! without reading another frame, and the write half is shut down. A
//! connection error seen by the receive loop takes the same path.

use std::{fmt, sync::Arc};

use parley_crypto::{CryptoError, EncryptionStrategy, StrategyKind};
use parley_proto::{Envelope, FrameFormat, Username};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};

use crate::{
    config::ClientConfig,
    error::{Result, SessionError},
    event::{SessionCommand, SessionEvent},
    transport::{FrameReader, FrameWriter, TransportError},
};

type BoxedWriter = FrameWriter<Box<dyn AsyncWrite + Send + Unpin>>;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Username chosen, no connection yet
    Disconnected,
    /// Dialing the relay
    Connecting,
    /// Connected, sending the identity frame
    Announcing,
    /// Exchanging chat frames
    Streaming,
    /// Shutting down
    Closing,
    /// Terminal
    Closed,
}

impl SessionState {
    /// True while chat frames can be sent and received.
    pub fn is_streaming(self) -> bool {
        self == Self::Streaming
    }

    /// True once shutdown has started.
    pub fn is_closing_or_closed(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Announcing => "announcing",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}

/// A session that has not connected yet.
pub struct ChatSession {
    config: ClientConfig,
    format: FrameFormat,
    username: Username,
    strategy: EncryptionStrategy,
    state: watch::Sender<SessionState>,
}

impl ChatSession {
    /// Create a session for `username` using the `kind` encryption variant.
    ///
    /// The username is trimmed. The asymmetric variant generates its key
    /// pair here.
    ///
    /// # Errors
    ///
    /// - `Config` if the header width is unsupported
    /// - `Protocol` if the username is empty or contains `:`
    /// - `Crypto` if key generation fails
    pub fn new(config: ClientConfig, username: &str, kind: StrategyKind) -> Result<Self> {
        let username = Username::new(username)?;
        let strategy = EncryptionStrategy::new(kind, &username, &config.key_dir)?;
        Self::with_strategy(config, username, strategy)
    }

    /// Create a session around an already built strategy.
    pub fn with_strategy(
        config: ClientConfig,
        username: Username,
        strategy: EncryptionStrategy,
    ) -> Result<Self> {
        let format = config.frame_format()?;
        let (state, _) = watch::channel(SessionState::Disconnected);
        Ok(Self { config, format, username, strategy, state })
    }

    /// Local username.
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Encryption variant in use.
    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions, including those after connecting.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Connect to the configured relay over TCP and start streaming.
    ///
    /// # Errors
    ///
    /// - `Connect` / `ConnectTimeout` if the relay cannot be reached; the
    ///   key registry is cleared and the session is `Closed`
    /// - `Transport` if the identity frame cannot be sent
    pub async fn connect(self) -> Result<(SessionHandle, SessionEvents)> {
        let addr = self.config.relay_addr();
        let timeout = self.config.connect_timeout;

        self.state.send_replace(SessionState::Connecting);
        tracing::info!(%addr, user = %self.username, "connecting to relay");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.abandon();
                return Err(SessionError::Connect { addr, source });
            },
            Err(_) => {
                self.abandon();
                return Err(SessionError::ConnectTimeout { addr, timeout });
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        self.attach(stream).await
    }

    /// Start streaming over an already open connection.
    ///
    /// Sends the identity frame, then spawns the receive loop.
    ///
    /// # Errors
    ///
    /// - `Transport` if the identity frame cannot be sent
    pub async fn attach<S>(self, stream: S) -> Result<(SessionHandle, SessionEvents)>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let Self { format, username, strategy, state, .. } = self;
        state.send_replace(SessionState::Connecting);

        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            username,
            strategy,
            writer: Mutex::new(None),
            state,
            events,
            receiver: Mutex::new(None),
        });

        if let Err(e) = shared.strategy.on_session_start() {
            tracing::warn!(error = %e, "failed to reset key registry");
            shared.emit(SessionEvent::Error(format!("Ошибка очистки файла ключей: {e}")));
        }

        let (read, write) = tokio::io::split(stream);
        let reader = FrameReader::new(read, format);
        let mut writer: BoxedWriter = FrameWriter::new(Box::new(write), format);

        shared.state.send_replace(SessionState::Announcing);
        if let Err(e) = writer.send_frame(&shared.username.announcement()).await {
            tracing::warn!(error = %e, "identity announcement failed");
            if let Err(e) = shared.strategy.on_session_end() {
                tracing::warn!(error = %e, "failed to reset key registry");
            }
            shared.state.send_replace(SessionState::Closed);
            return Err(e.into());
        }
        tracing::debug!(user = %shared.username, "identity announced");

        *shared.writer.lock().await = Some(writer);
        shared.state.send_replace(SessionState::Streaming);

        if let Some(key) = shared.strategy.public_key() {
            shared.emit(SessionEvent::Notice(format!("Ваш публичный ключ: {key}")));
        }

        let task = tokio::spawn(receive_loop(Arc::clone(&shared), reader));
        *shared.receiver.lock().await = Some(task);

        Ok((SessionHandle { shared }, SessionEvents { rx }))
    }

    /// Give up before streaming: clear the key registry and go to `Closed`.
    fn abandon(&self) {
        if let Err(e) = self.strategy.on_session_end() {
            tracing::warn!(error = %e, "failed to reset key registry");
        }
        self.state.send_replace(SessionState::Closed);
    }
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("relay", &self.config.relay_addr())
            .field("username", &self.username)
            .field("strategy", &self.strategy)
            .field("state", &self.state())
            .finish()
    }
}

struct Shared {
    username: Username,
    strategy: EncryptionStrategy,
    writer: Mutex<Option<BoxedWriter>>,
    state: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }

    /// Route one received payload to the output.
    fn dispatch(&self, payload: &[u8]) {
        let text = String::from_utf8_lossy(payload);

        let Some(envelope) = Envelope::parse(&text) else {
            tracing::trace!(frame = %text, "dropping control frame");
            return;
        };

        let inbound = self.strategy.maybe_decrypt(&envelope.message, &envelope.sender);
        self.emit(SessionEvent::received(envelope.sender, inbound));
    }

    /// Run the shutdown sequence once. Later calls return immediately.
    ///
    /// Failures while closing are reported as [`SessionEvent::Error`] and
    /// otherwise ignored; [`SessionEvent::Closed`] always follows. A
    /// shutdown error that only says the peer is already gone is logged at
    /// `debug` and not reported, since the receive loop has reported the
    /// lost connection already.
    async fn close(&self) {
        let began = self.state.send_if_modified(|state| {
            if state.is_closing_or_closed() {
                return false;
            }
            *state = SessionState::Closing;
            true
        });
        if !began {
            return;
        }

        tracing::info!(user = %self.username, "closing session");

        if let Err(e) = self.strategy.on_session_end() {
            tracing::warn!(error = %e, "failed to reset key registry");
            self.emit(SessionEvent::Error(format!("Ошибка очистки файла ключей: {e}")));
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match writer.shutdown().await {
                Ok(()) => {},
                Err(e) if e.is_disconnect() => {
                    tracing::debug!(error = %e, "connection already closed by peer");
                },
                Err(e) => {
                    tracing::warn!(error = %e, "error while closing connection");
                    self.emit(SessionEvent::Error(format!(
                        "Ошибка при закрытии соединения: {e}"
                    )));
                },
            }
        }

        self.state.send_replace(SessionState::Closed);
        self.emit(SessionEvent::Closed);
    }
}

async fn receive_loop<R>(shared: Arc<Shared>, mut reader: FrameReader<R>)
where
    R: AsyncRead + Unpin,
{
    let mut state = shared.state.subscribe();
    let mut frames: u64 = 0;

    loop {
        let received = tokio::select! {
            biased;
            () = stopped(&mut state) => break,
            received = reader.receive() => received,
        };

        match received {
            Ok(payload) => {
                frames += 1;
                shared.dispatch(&payload);
            },
            Err(e) => {
                if shared.state().is_streaming() {
                    tracing::warn!(error = %e, "connection lost");
                    shared.emit(SessionEvent::Error(format!("Ошибка соединения: {e}")));
                }
                shared.close().await;
                break;
            },
        }
    }

    tracing::debug!(frames, "receive loop stopped");
}

/// Resolves once the session leaves `Streaming`.
async fn stopped(state: &mut watch::Receiver<SessionState>) {
    loop {
        let streaming = state.borrow_and_update().is_streaming();
        if !streaming || state.changed().await.is_err() {
            return;
        }
    }
}

/// Cloneable handle for acting on a running session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Local username.
    pub fn username(&self) -> &Username {
        &self.shared.username
    }

    /// Encryption variant in use.
    pub fn strategy_kind(&self) -> StrategyKind {
        self.shared.strategy.kind()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Send a chat message.
    ///
    /// Empty text is ignored. On success the message is echoed to the
    /// event stream as typed. A socket failure closes the session.
    ///
    /// # Errors
    ///
    /// - `NotStreaming` if the session is not streaming, or stops streaming
    ///   while the frame is being written
    /// - `Crypto` if encryption was requested and failed; nothing is sent
    /// - `Transport` if the frame could not be written
    pub async fn send_message(&self, text: &str, recipient: &str, encrypt: bool) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let state = self.state();
        if !state.is_streaming() {
            return Err(SessionError::NotStreaming(state));
        }

        let payload = self.shared.strategy.maybe_encrypt(text, recipient, encrypt)?;
        let frame = Envelope::new(&self.shared.username, payload).into_frame();

        let mut state_rx = self.shared.state.subscribe();
        let mut guard = self.shared.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(SessionError::NotStreaming(self.state()));
        };

        // close() needs this lock; a write stuck on a full socket yields it
        // as soon as the session leaves Streaming
        let sent = tokio::select! {
            biased;
            () = stopped(&mut state_rx) => {
                tracing::debug!("send abandoned, session is closing");
                return Err(SessionError::NotStreaming(self.state()));
            },
            sent = writer.send_frame(&frame) => sent,
        };

        // Echo while the writer is held so it cannot follow Closed
        if sent.is_ok() {
            self.shared.emit(SessionEvent::Echo {
                sender: self.shared.username.to_string(),
                text: text.to_string(),
            });
        }
        drop(guard);

        if let Err(e) = sent {
            if matches!(e, TransportError::Io(_)) {
                tracing::warn!(error = %e, "send failed, closing session");
                self.shared.close().await;
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Register a peer's exported public key.
    pub fn register_peer(&self, username: &str, public_key: &str) -> Result<()> {
        Ok(self.shared.strategy.register_peer(username, public_key)?)
    }

    /// Forget every registered public key, in memory and on disk.
    pub fn clear_peers(&self) -> Result<()> {
        Ok(self.shared.strategy.clear_peers()?)
    }

    /// Registered keys as `username:key` lines.
    pub fn peer_keys(&self) -> Result<Vec<String>> {
        Ok(self.shared.strategy.peer_lines()?)
    }

    /// Local public key, if this variant has one.
    pub fn public_key(&self) -> Option<&str> {
        self.shared.strategy.public_key()
    }

    /// Create key material for `recipient` ahead of the first message.
    pub fn prepare_recipient(&self, recipient: &str) -> Result<()> {
        Ok(self.shared.strategy.prepare_recipient(recipient)?)
    }

    /// Run one command, reporting its outcome on the event stream.
    pub async fn submit(&self, command: SessionCommand) {
        let notice = |line: String| self.shared.emit(SessionEvent::Notice(line));
        let error = |line: String| self.shared.emit(SessionEvent::Error(line));

        match command {
            SessionCommand::Send { text, recipient, encrypt } => {
                if let Err(e) = self.send_message(&text, &recipient, encrypt).await {
                    error(send_error_line(&e));
                }
            },
            SessionCommand::RegisterPeer { username, public_key } => {
                match self.register_peer(&username, &public_key) {
                    Ok(()) => notice(format!("Ключ добавлен для пользователя: {}", username.trim())),
                    Err(e) => error(format!("Ошибка добавления ключа: {e}")),
                }
            },
            SessionCommand::ClearPeers => match self.clear_peers() {
                Ok(()) => notice("Все публичные ключи удалены".to_string()),
                Err(e) => error(format!("Ошибка очистки файла ключей: {e}")),
            },
            SessionCommand::ListPeers => match self.peer_keys() {
                Ok(lines) if lines.is_empty() => notice("Нет сохранённых ключей".to_string()),
                Ok(lines) => lines.into_iter().for_each(notice),
                Err(e) => error(format!("Ошибка загрузки ключей: {e}")),
            },
            SessionCommand::ShowPublicKey => match self.public_key() {
                Some(key) => notice(format!("Ваш публичный ключ: {key}")),
                None => error(format!("Ошибка: {}", CryptoError::Unsupported("public key export"))),
            },
            SessionCommand::PrepareRecipient { recipient } => {
                if let Err(e) = self.prepare_recipient(&recipient) {
                    error(format!("Ошибка создания ключа: {e}"));
                }
            },
            SessionCommand::Exit => self.exit().await,
        }
    }

    /// End the session and wait for the receive loop to stop.
    ///
    /// Safe to call from any task and more than once.
    pub async fn exit(&self) {
        self.shared.close().await;

        let receiver = self.shared.receiver.lock().await.take();
        if let Some(task) = receiver {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "receive loop task failed");
            }
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("username", &self.shared.username)
            .field("strategy", &self.shared.strategy)
            .field("state", &self.state())
            .finish()
    }
}

fn send_error_line(error: &SessionError) -> String {
    match error {
        SessionError::Crypto(CryptoError::MissingRecipient) => {
            "Ошибка: Вы не указали получателя".to_string()
        },
        other => format!("Ошибка отправки сообщения: {other}"),
    }
}

/// Ordered stream of session output.
#[derive(Debug)]
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    /// Wait for the next event.
    ///
    /// [`SessionEvent::Closed`] is the last event a session emits.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }
}
