//! Supervisor — owns the shutdown sentinel, wires the discovery triad and
//! session components together, and exposes the command/event API the UI
//! collaborator (the terminal driver) talks to.
//!
//! Grounded on `GUI/src/runtime/mod.rs`'s `RuntimeHandle`/`RuntimeWorker`/
//! `spawn_runtime` trio: a command channel drives a worker that owns the
//! currently-active task set, and a cloned event sender flows into every
//! spawned task.

use std::path::PathBuf;

use log::Level;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::PeerDescriptor;
use crate::config::Config;
use crate::discovery::{self, PeerSet};
use crate::session;
use crate::transfer;

/// Notification pushed to the UI collaborator (spec §3 `EventRecord`).
#[derive(Debug, Clone)]
pub enum EventRecord {
    Log(Level, String),
    PeerDiscovered(PeerDescriptor),
    SessionEstablished(Role),
    TransferProgress(u64),
    TransferComplete(String),
    TransferError(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Discovering,
    Connecting,
    Transferring,
    Terminated,
}

pub(crate) enum Command {
    Start,
    SelectPeer(PeerDescriptor),
    EnqueueForSend(PathBuf),
    /// Self-sent by the task awaiting the acceptor's handoff oneshot once
    /// the first inbound connection lands.
    PeerConnected(TcpStream),
    /// Sent by a discovery/session component that hit a fatal bind/config
    /// error (spec §7 `ConfigError`: "published as `TransferError` and
    /// causes orderly shutdown"). The component has already emitted its
    /// own `TransferError` event before sending this.
    ConfigFailure(String),
    /// Self-sent once the transfer engine's spawned task returns on its
    /// own — stream EOF, a fatal transfer error, or the sender's queue
    /// channel closing (spec §4.7: `Transferring` lasts until the
    /// transfer engine's task ends, then the state machine moves on).
    TransferFinished,
    Shutdown(oneshot::Sender<()>),
}

/// Handle the UI collaborator holds to drive the supervisor (spec §6
/// "Commands exposed to the UI collaborator").
#[derive(Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
}

impl SupervisorHandle {
    pub async fn start(&self) {
        let _ = self.commands.send(Command::Start).await;
    }

    pub async fn select_peer(&self, peer: PeerDescriptor) {
        let _ = self.commands.send(Command::SelectPeer(peer)).await;
    }

    /// No-op unless the supervisor is `Transferring` as initiator (spec
    /// §6); the sender-role transfer engine silently ignores the call
    /// otherwise since there is no active `TransferHandle` to enqueue on.
    pub async fn enqueue_for_send(&self, local_path: PathBuf) {
        let _ = self.commands.send(Command::EnqueueForSend(local_path)).await;
    }

    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// Spawn the supervisor worker and return a handle plus the event stream.
pub fn spawn_supervisor(
    runtime: &tokio::runtime::Handle,
    config: Config,
) -> (SupervisorHandle, mpsc::Receiver<EventRecord>) {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::channel(512);
    let worker_commands = command_tx.clone();

    runtime.spawn(async move {
        let mut worker = Worker::new(config, event_tx, worker_commands);
        worker.run(command_rx).await;
    });

    (SupervisorHandle { commands: command_tx }, event_rx)
}

struct DiscoveryTriad {
    cancel: CancellationToken,
    beacon: JoinHandle<()>,
    listener: JoinHandle<()>,
    acceptor: JoinHandle<()>,
}

struct Worker {
    config: Config,
    events: mpsc::Sender<EventRecord>,
    commands: mpsc::Sender<Command>,
    state: State,
    triad: Option<DiscoveryTriad>,
    peers: PeerSet,
    transfer_cancel: Option<CancellationToken>,
    sender_queue: Option<mpsc::UnboundedSender<PathBuf>>,
}

impl Worker {
    fn new(config: Config, events: mpsc::Sender<EventRecord>, commands: mpsc::Sender<Command>) -> Self {
        Self {
            config,
            events,
            commands,
            state: State::Discovering,
            triad: None,
            peers: discovery::new_peer_set(),
            transfer_cancel: None,
            sender_queue: None,
        }
    }

    async fn run(&mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(cmd) = commands.recv().await {
            match cmd {
                Command::Start => self.handle_start().await,
                Command::SelectPeer(peer) => self.handle_select_peer(peer).await,
                Command::EnqueueForSend(path) => self.handle_enqueue(path).await,
                Command::PeerConnected(stream) => self.handle_peer_connected(stream).await,
                Command::ConfigFailure(reason) => {
                    // Already published as TransferError by the failing
                    // component itself; spec §7: "causes orderly
                    // shutdown".
                    self.log(Level::Error, format!("config failure: {reason}")).await;
                    self.handle_shutdown().await;
                    break;
                }
                Command::TransferFinished => {
                    self.state = State::Terminated;
                    self.log(Level::Debug, "transfer engine finished; terminating").await;
                    break;
                }
                Command::Shutdown(ack) => {
                    self.handle_shutdown().await;
                    let _ = ack.send(());
                    break;
                }
            }
        }
    }

    async fn emit(&self, event: EventRecord) {
        let _ = self.events.send(event).await;
    }

    async fn log(&self, level: Level, message: impl Into<String>) {
        self.emit(EventRecord::Log(level, message.into())).await;
    }

    async fn handle_start(&mut self) {
        if self.triad.is_some() {
            return;
        }
        self.start_discovery_triad().await;
        self.state = State::Discovering;
    }

    async fn start_discovery_triad(&mut self) {
        let cancel = CancellationToken::new();
        let device_name = self
            .config
            .device_name
            .clone()
            .unwrap_or_else(crate::util::local_device_name);

        let beacon = tokio::spawn(discovery::beacon::run(
            device_name,
            self.config.session_port,
            self.config.discovery_port,
            self.events.clone(),
            self.commands.clone(),
            cancel.clone(),
        ));

        let listener = tokio::spawn(discovery::listener::run(
            self.config.discovery_port,
            self.peers.clone(),
            self.events.clone(),
            self.commands.clone(),
            cancel.clone(),
        ));

        let (handoff_tx, handoff_rx) = oneshot::channel();
        let acceptor = tokio::spawn(session::acceptor::run(
            self.config.clone(),
            self.events.clone(),
            self.commands.clone(),
            cancel.clone(),
            handoff_tx,
        ));

        let self_commands = self.commands.clone();
        tokio::spawn(async move {
            if let Ok(stream) = handoff_rx.await {
                let _ = self_commands.send(Command::PeerConnected(stream)).await;
            }
        });

        self.triad = Some(DiscoveryTriad {
            cancel,
            beacon,
            listener,
            acceptor,
        });
    }

    async fn handle_peer_connected(&mut self, stream: TcpStream) {
        if self.state != State::Discovering {
            return;
        }
        self.emit(EventRecord::SessionEstablished(Role::Responder)).await;
        self.stop_discovery_triad().await;
        self.state = State::Transferring;

        let cancel = CancellationToken::new();
        self.transfer_cancel = Some(cancel.clone());
        let dest_root = self.config.destination_root();
        let handle = transfer::spawn_receiver(
            stream,
            dest_root,
            self.config.max_frame_bytes,
            self.events.clone(),
            cancel,
        );
        self.watch_transfer_completion(handle);
    }

    /// Notify the worker once the transfer engine's spawned task returns,
    /// whatever the reason (clean EOF, fatal error, or cancellation) —
    /// spec §4.7: `Transferring` lasts until the transfer engine's task
    /// ends, then the state machine moves to `Terminated`.
    fn watch_transfer_completion(&self, handle: tokio::task::JoinHandle<()>) {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let _ = handle.await;
            let _ = commands.send(Command::TransferFinished).await;
        });
    }

    /// Tear down the discovery triad exactly once (spec §3 invariant: "the
    /// shutdown signal for the discovery triad is delivered at most once
    /// per process").
    async fn stop_discovery_triad(&mut self) {
        if let Some(triad) = self.triad.take() {
            triad.cancel.cancel();
            let _ = triad.beacon.await;
            let _ = triad.listener.await;
            let _ = triad.acceptor.await;
        }
    }

    async fn handle_select_peer(&mut self, peer: PeerDescriptor) {
        if self.state != State::Discovering {
            return;
        }
        self.state = State::Connecting;

        match session::dialer::dial(&peer).await {
            Ok(stream) => {
                self.emit(EventRecord::SessionEstablished(Role::Initiator)).await;
                self.stop_discovery_triad().await;
                self.state = State::Transferring;

                let cancel = CancellationToken::new();
                self.transfer_cancel = Some(cancel.clone());
                let (queue_tx, handle) = transfer::spawn_sender(
                    stream,
                    self.config.max_frame_bytes,
                    self.events.clone(),
                    cancel,
                );
                self.sender_queue = Some(queue_tx);
                self.watch_transfer_completion(handle);
            }
            Err(e) => {
                self.emit(EventRecord::TransferError(
                    format!("{}:{}", peer.ip, peer.port),
                    e.to_string(),
                ))
                .await;
                self.state = State::Discovering;
            }
        }
    }

    async fn handle_enqueue(&mut self, path: PathBuf) {
        if self.state != State::Transferring {
            return;
        }
        if let Some(queue) = &self.sender_queue {
            let _ = queue.send(path);
        }
    }

    async fn handle_shutdown(&mut self) {
        self.stop_discovery_triad().await;
        if let Some(cancel) = self.transfer_cancel.take() {
            cancel.cancel();
        }
        self.sender_queue = None;
        self.state = State::Terminated;
        self.log(Level::Debug, "supervisor terminated").await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    use super::*;

    /// `watch_transfer_completion` must forward a `TransferFinished`
    /// command once its watched task returns, whatever the reason.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn watch_transfer_completion_forwards_finish_signal() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let (commands_tx, mut commands_rx) = mpsc::channel(8);
        let worker = Worker::new(Config::default(), events_tx, commands_tx);

        worker.watch_transfer_completion(tokio::spawn(async {}));

        let cmd = timeout(Duration::from_secs(2), commands_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(cmd, Command::TransferFinished));
    }

    /// Scenario S2 / testable property #6: once the transfer engine's
    /// spawned task ends on its own — here, the peer dropping the stream
    /// right after connecting, so the receiver's next read hits a clean
    /// EOF — the worker moves to `Terminated` and `run` returns on its
    /// own. No `Shutdown` command is ever sent.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn transferring_terminates_naturally_when_receiver_task_ends() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.destination_root = Some(tmp.path().join("dest"));

        let (events_tx, mut events_rx) = mpsc::channel(32);
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let mut worker = Worker::new(config, events_tx, commands_tx.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dial = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (receiver_side, _) = listener.accept().await.unwrap();
        let sender_side = dial.await.unwrap();

        // The peer disconnects immediately, before sending any frame.
        drop(sender_side);

        commands_tx.send(Command::PeerConnected(receiver_side)).await.unwrap();
        drop(commands_tx);

        timeout(Duration::from_secs(5), worker.run(commands_rx))
            .await
            .expect("worker did not terminate after the transfer task finished naturally");

        assert_eq!(worker.state, State::Terminated);

        let mut saw_terminated_log = false;
        while let Ok(Some(event)) = timeout(Duration::from_millis(200), events_rx.recv()).await {
            if matches!(&event, EventRecord::Log(log::Level::Debug, msg) if msg.contains("terminating")) {
                saw_terminated_log = true;
                break;
            }
        }
        assert!(saw_terminated_log);
    }

    /// Spec §7 `ConfigError`: a fatal bind/config failure reported by a
    /// discovery/session component causes orderly shutdown, not a hang.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn config_failure_causes_orderly_shutdown() {
        let (events_tx, _events_rx) = mpsc::channel(8);
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let mut worker = Worker::new(Config::default(), events_tx, commands_tx.clone());

        commands_tx
            .send(Command::ConfigFailure("port already in use".into()))
            .await
            .unwrap();
        drop(commands_tx);

        timeout(Duration::from_secs(5), worker.run(commands_rx))
            .await
            .expect("worker did not shut down after a config failure");

        assert_eq!(worker.state, State::Terminated);
    }
}
