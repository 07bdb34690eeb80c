//! Builds the task graph for one voice session and hands back the
//! control surface.
//!
//! Every device- and network-facing piece enters through a capability
//! trait, so the same wiring runs in production (cpal microphone,
//! WebSocket channel) and in tests (scripted fakes).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use voxlink_capture::{CaptureConfig, CapturePipeline, CaptureSource};
use voxlink_endpoint::EndpointConfig;
use voxlink_foundation::{AppState, StateManager};
use voxlink_stt::{RecognitionAdapter, RecognizerEvent, RestartGate, SpeechRecognizer};
use voxlink_telemetry::SessionMetrics;
use voxlink_transport::{MessageChannel, TransportAdapter, TransportConfig, WsChannel};
use voxlink_tts::{AudioSink, PlaybackController, SpeechSynthesizer};

use crate::config::{Cli, SessionConfig};
use crate::session::{
    endpoint_task, ConversationEntry, SessionDeps, SessionEvent, SessionHandle,
    SessionOrchestrator, UiEvent,
};

/// The pluggable edges of the session.
pub struct Providers {
    pub source: Box<dyn CaptureSource>,
    pub recognizer: Box<dyn SpeechRecognizer>,
    /// Raw event stream the recognizer was constructed with.
    pub recognizer_rx: mpsc::Receiver<RecognizerEvent>,
    pub sink: Arc<dyn AudioSink>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub channel: Box<dyn MessageChannel>,
}

pub struct RuntimeConfig {
    pub capture: CaptureConfig,
    pub endpoint: EndpointConfig,
    pub session: SessionConfig,
    pub transport: TransportConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            endpoint: EndpointConfig::default(),
            session: SessionConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            capture: cli.capture_config(),
            endpoint: cli.endpoint_config(),
            session: cli.session_config(),
            transport: TransportConfig {
                ping_interval: if cli.no_ping {
                    None
                } else {
                    TransportConfig::default().ping_interval
                },
            },
        }
    }
}

/// Control surface for a running session.
pub struct AppHandle {
    pub client_id: String,
    pub session: SessionHandle,
    pub ui_rx: mpsc::Receiver<UiEvent>,
    pub conversation: Arc<RwLock<Vec<ConversationEntry>>>,
    pub metrics: Arc<SessionMetrics>,
    state: Arc<StateManager>,
    session_task: JoinHandle<()>,
    support_tasks: Vec<JoinHandle<()>>,
}

impl AppHandle {
    /// Graceful end: `end_call` goes out, the loop drains and exits.
    pub async fn shutdown(self) {
        let _ = self.state.transition(AppState::Stopping);
        self.session.hangup().await;
        let _ = self.session_task.await;
        for task in self.support_tasks {
            task.abort();
        }
        let _ = self.state.transition(AppState::Stopped);
        info!("voxlink shut down");
    }
}

/// Connect to the voice service and stand up a session around the
/// given local providers.
pub async fn connect(cli: &Cli, providers: LocalProviders) -> anyhow::Result<AppHandle> {
    let client_id = Uuid::new_v4().to_string();
    let url = format!("{}/{}", cli.server.trim_end_matches('/'), client_id);
    info!(%client_id, %url, "connecting to voice service");

    let channel = WsChannel::connect(&url).await?;
    let config = RuntimeConfig::from_cli(cli);
    Ok(start_session(
        client_id,
        config,
        Providers {
            source: providers.source,
            recognizer: providers.recognizer,
            recognizer_rx: providers.recognizer_rx,
            sink: providers.sink,
            synthesizer: providers.synthesizer,
            channel: Box::new(channel),
        },
    ))
}

/// Providers minus the network channel, which `connect` supplies.
pub struct LocalProviders {
    pub source: Box<dyn CaptureSource>,
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub recognizer_rx: mpsc::Receiver<RecognizerEvent>,
    pub sink: Arc<dyn AudioSink>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

/// Wire every component together and start the event loop.
pub fn start_session(client_id: String, config: RuntimeConfig, providers: Providers) -> AppHandle {
    let state = Arc::new(StateManager::new());
    let metrics = Arc::new(SessionMetrics::default());
    let gate = Arc::new(RestartGate::default());
    // Muted until the user starts listening.
    let endpoint_muted = Arc::new(AtomicBool::new(true));
    let conversation = Arc::new(RwLock::new(Vec::new()));

    let (outbound_tx, outbound_rx) = mpsc::channel(64);
    let (transport_tx, transport_rx) = mpsc::channel(64);
    let (chunk_tx, chunk_rx) = mpsc::channel(64);
    let (analysis_tx, _) = broadcast::channel(64);
    let (transcript_tx, transcript_rx) = mpsc::channel(32);
    let (ui_tx, ui_rx) = mpsc::channel(64);

    let recognition = RecognitionAdapter::spawn(
        providers.recognizer,
        providers.recognizer_rx,
        transcript_tx,
        gate.clone(),
    );

    let capture = CapturePipeline::new(providers.source, config.capture)
        .with_metrics(metrics.clone());
    let playback = Arc::new(PlaybackController::new(
        providers.sink,
        providers.synthesizer,
    ));

    let (orchestrator, session) = SessionOrchestrator::new(
        client_id.clone(),
        SessionDeps {
            capture,
            recognition,
            gate,
            playback,
            outbound_tx,
            ui_tx,
            endpoint_muted: endpoint_muted.clone(),
            metrics: metrics.clone(),
            chunk_tx,
            analysis_tx: analysis_tx.clone(),
            conversation: conversation.clone(),
            config: config.session,
        },
    );

    let mut support_tasks = vec![
        endpoint_task::spawn(
            analysis_tx.subscribe(),
            endpoint_muted,
            session.sender(),
            config.endpoint,
        ),
        TransportAdapter::spawn(
            providers.channel,
            outbound_rx,
            transport_tx,
            config.transport,
        ),
    ];
    support_tasks.push(forward(chunk_rx, session.sender(), SessionEvent::Chunk));
    support_tasks.push(forward(
        transcript_rx,
        session.sender(),
        SessionEvent::Transcript,
    ));
    support_tasks.push(forward(
        transport_rx,
        session.sender(),
        SessionEvent::Transport,
    ));

    let session_task = tokio::spawn(orchestrator.run());

    // The channel handshake already succeeded before we got here.
    let opener = session.sender();
    support_tasks.push(tokio::spawn(async move {
        let _ = opener.send(SessionEvent::ChannelOpened).await;
    }));

    let _ = state.transition(AppState::Running);

    AppHandle {
        client_id,
        session,
        ui_rx,
        conversation,
        metrics,
        state,
        session_task,
        support_tasks,
    }
}

/// Pump one side channel into the ordered session queue.
fn forward<T: Send + 'static>(
    mut rx: mpsc::Receiver<T>,
    tx: mpsc::Sender<SessionEvent>,
    wrap: fn(T) -> SessionEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if tx.send(wrap(item)).await.is_err() {
                break;
            }
        }
    })
}

