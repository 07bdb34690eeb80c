use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use voxlink_app::config::Cli;
use voxlink_app::runtime::{self, LocalProviders};
use voxlink_app::session::UiEvent;
use voxlink_capture::CpalSource;
use voxlink_stt::NullRecognizer;
use voxlink_tts::{NullSink, NullSynthesizer};

fn init_logging() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all("logs").context("Failed to create logs directory")?;
    let file_appender = tracing_appender::rolling::daily("logs", "voxlink.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_logging()?;
    let cli = Cli::parse();
    info!("Voxlink starting");

    let (recognizer, recognizer_rx) = NullRecognizer::new();
    let providers = LocalProviders {
        source: Box::new(CpalSource::new()),
        recognizer: Box::new(recognizer),
        recognizer_rx,
        sink: Arc::new(NullSink),
        synthesizer: Arc::new(NullSynthesizer),
    };

    let mut handle = runtime::connect(&cli, providers).await?;
    println!("Connected as {}", handle.client_id);
    println!("Commands: /start  /stop  /quit  (anything else is sent as text)");

    if cli.auto_listen {
        handle.session.start_listening().await;
    }

    let session = handle.session.clone();
    let input_task = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "" => {}
                "/start" => session.start_listening().await,
                "/stop" => session.stop_listening().await,
                "/quit" => {
                    // Ends the session loop, which closes the ui stream
                    // and lets main exit.
                    session.hangup().await;
                    break;
                }
                text => session.send_text(text.to_string()).await,
            }
        }
    });

    loop {
        tokio::select! {
            maybe_event = handle.ui_rx.recv() => {
                match maybe_event {
                    Some(event) => render(event),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    input_task.abort();
    handle.shutdown().await;
    Ok(())
}

fn render(event: UiEvent) {
    match event {
        UiEvent::ModeChanged(mode) => println!("[{:?}]", mode),
        UiEvent::InterimTranscript(text) => println!("  … {}", text),
        UiEvent::UserUtterance(text) => println!("you: {}", text),
        UiEvent::AssistantResponse(text) => println!("assistant: {}", text),
        UiEvent::Status(text) => println!("({})", text),
        UiEvent::Error(text) => println!("error: {}", text),
    }
}
