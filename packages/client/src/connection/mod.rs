//! Reconnecting WebSocket connection to one event.
//!
//! [`ConnectionClient`] is a handle to a driver task. The driver owns the
//! [`ConnectionMachine`] and executes its commands: opening a transport task
//! per attempt, closing it, and arming or cancelling the reconnect timer.
//! Control requests, transport results and timer expiries all arrive as
//! events on the driver's channels, so they are handled one at a time.

pub mod machine;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use slalom_live_shared::protocol::ServerMessage;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, protocol::Message},
};

use crate::error::ClientError;

pub use machine::{ClientEvent, Command, ConnectionMachine, ConnectionState};

/// Upper bound for a transport task to finish its close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// What the connection reports to the view
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOutput {
    Message(ServerMessage),
    Error(ClientError),
}

/// Handle to the connection driver of one event
pub struct ConnectionClient {
    control: mpsc::UnboundedSender<ClientEvent>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl ConnectionClient {
    /// Spawn the driver. Nothing is opened until [`Self::connect`].
    pub fn spawn(
        url: String,
        backoff: Vec<Duration>,
    ) -> (Self, mpsc::UnboundedReceiver<ClientOutput>) {
        let (control, control_rx) = mpsc::unbounded_channel();
        let (output, output_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver::new(url, ConnectionMachine::new(backoff), output, state_tx);
        let task = tokio::spawn(driver.run(control_rx));

        (
            Self {
                control,
                state,
                task,
            },
            output_rx,
        )
    }

    pub fn connect(&self) {
        self.send(ClientEvent::ConnectRequested);
    }

    /// The view became visible again; reconnects now if the transport is down.
    pub fn visibility_regained(&self) {
        self.send(ClientEvent::VisibilityRegained);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver of connection state changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Explicit disconnect. Closes the transport, cancels the timer and waits
    /// for the driver to stop; no reconnect happens afterwards.
    pub async fn disconnect(self) {
        self.send(ClientEvent::ExplicitDisconnect);
        if let Err(e) = self.task.await {
            tracing::warn!("Connection driver ended abnormally: {}", e);
        }
    }

    fn send(&self, event: ClientEvent) {
        if self.control.send(event).is_err() {
            tracing::debug!("Connection driver already stopped, dropping {:?}", event);
        }
    }
}

/// Transport task of one attempt
struct Transport {
    attempt: u64,
    close: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Driver {
    url: String,
    machine: ConnectionMachine,
    output: mpsc::UnboundedSender<ClientOutput>,
    state: watch::Sender<ConnectionState>,
    internal_tx: mpsc::UnboundedSender<ClientEvent>,
    internal_rx: mpsc::UnboundedReceiver<ClientEvent>,
    transport: Option<Transport>,
    timer: Option<JoinHandle<()>>,
}

impl Driver {
    fn new(
        url: String,
        machine: ConnectionMachine,
        output: mpsc::UnboundedSender<ClientOutput>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            url,
            machine,
            output,
            state,
            internal_tx,
            internal_rx,
            transport: None,
            timer: None,
        }
    }

    async fn run(mut self, mut control: mpsc::UnboundedReceiver<ClientEvent>) {
        loop {
            let event = tokio::select! {
                event = control.recv() => event.unwrap_or(ClientEvent::ExplicitDisconnect),
                // the driver holds a sender itself, so this never yields None
                Some(event) = self.internal_rx.recv() => event,
            };

            let commands = self.machine.handle(event);
            for command in commands {
                self.execute(command).await;
            }
            let next = self.machine.state();
            self.state.send_if_modified(|state| {
                let changed = *state != next;
                *state = next;
                changed
            });

            if self.machine.is_terminated() {
                break;
            }
        }

        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.close_transport().await;
        tracing::debug!("Connection driver for {} stopped", self.url);
    }

    async fn execute(&mut self, command: Command) {
        match command {
            Command::OpenTransport { attempt } => {
                self.close_transport().await;
                tracing::info!("Connecting to {} (attempt {})", self.url, attempt);
                let (close, close_rx) = oneshot::channel();
                let task = tokio::spawn(run_transport(
                    self.url.clone(),
                    attempt,
                    self.internal_tx.clone(),
                    self.output.clone(),
                    close_rx,
                ));
                self.transport = Some(Transport {
                    attempt,
                    close,
                    task,
                });
            }
            Command::CloseTransport => self.close_transport().await,
            Command::ScheduleReconnect { delay, timer } => {
                tracing::info!("Reconnecting in {:?}", delay);
                let events = self.internal_tx.clone();
                if let Some(previous) = self.timer.replace(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(ClientEvent::TimerFired { timer });
                })) {
                    previous.abort();
                }
            }
            Command::CancelReconnect => {
                if let Some(timer) = self.timer.take() {
                    timer.abort();
                }
            }
        }
    }

    /// Ask the current transport to close and wait briefly for it
    async fn close_transport(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };
        let _ = transport.close.send(());
        let mut task = transport.task;
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut task).await.is_err() {
            tracing::debug!("Transport {} did not close in time", transport.attempt);
            task.abort();
        }
    }
}

fn connect_error(e: WsError) -> ClientError {
    match e {
        WsError::Http(response) => ClientError::Rejected(response.status().as_u16()),
        other => ClientError::Connection(other.to_string()),
    }
}

/// One transport attempt: open, forward inbound frames, report the close.
///
/// Reports `Opened`/`Closed` tagged with its attempt number; results of an
/// attempt the machine has moved past are ignored there.
async fn run_transport(
    url: String,
    attempt: u64,
    events: mpsc::UnboundedSender<ClientEvent>,
    output: mpsc::UnboundedSender<ClientOutput>,
    mut close: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = &mut close => return,
    };

    let ws = match connected {
        Ok((ws, _)) => ws,
        Err(e) => {
            let error = connect_error(e);
            tracing::warn!("Connection attempt {} failed: {}", attempt, error);
            let _ = output.send(ClientOutput::Error(error));
            let _ = events.send(ClientEvent::Closed { attempt });
            return;
        }
    };
    tracing::info!("Connected to {}", url);
    let _ = events.send(ClientEvent::Opened { attempt });

    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            _ = &mut close => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    tracing::debug!("Failed to send close frame: {}", e);
                }
                break;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerMessage::parse(text.as_str()) {
                    Ok(message) => {
                        let _ = output.send(ClientOutput::Message(message));
                    }
                    Err(e) => {
                        tracing::warn!("Dropping malformed frame: {}", e);
                        let _ = output.send(ClientOutput::Error(ClientError::MalformedMessage(
                            e.to_string(),
                        )));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    match frame {
                        Some(frame) => tracing::info!(
                            "Server closed the connection ({}: {})",
                            u16::from(frame.code),
                            frame.reason
                        ),
                        None => tracing::info!("Server closed the connection"),
                    }
                    break;
                }
                // pings are answered by tungstenite; the client sends no data
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    let _ = output.send(ClientOutput::Error(ClientError::Connection(e.to_string())));
                    break;
                }
                None => break,
            }
        }
    }

    let _ = events.send(ClientEvent::Closed { attempt });
}
