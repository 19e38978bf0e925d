mod config;
mod host;

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use readaloud_core::blobs::BlobStore;
use readaloud_core::bus::{BusEvent, Envelope, MessageBus, Reply};
use readaloud_core::extract::{PageContent, PageExtractor};
use readaloud_core::media::RodioBackend;
use readaloud_core::relay::{RelayConfig, RelayController};
use readaloud_core::session::SessionConfig;
use readaloud_core::synth::{HttpSynthesisBackend, SynthesisBackend};
use readaloud_types::events::PlayAudioRequestEvent;
use readaloud_types::{AudioSource, ControlEvent, LifecycleEvent, PlaybackRequest, SynthesisInput};
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::config::Config;
use crate::host::TaskHost;

#[derive(Parser)]
#[command(about = "Reads a page of text aloud through the TTS relay")]
struct Cli {
    /// File whose contents stand in for the page body; "-" reads stdin.
    page: String,

    /// Speak only this text, as if the user had selected it on the page.
    #[arg(long)]
    selection: Option<String>,

    /// Voice id passed to the synthesis backend.
    #[arg(long)]
    voice: Option<String>,

    /// Rate adjustment, e.g. "+10%".
    #[arg(long)]
    rate: Option<String>,

    /// Pitch adjustment, e.g. "-2Hz".
    #[arg(long)]
    pitch: Option<String>,

    /// Fetch the audio up front and hand the player a blob locator instead
    /// of raw synthesis input.
    #[arg(long)]
    preload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();

    let body = read_page(&args.page).context("Failed to read page text")?;
    let mut content = PageContent::new(body);
    if let Some(selection) = args.selection.clone() {
        content = content.with_selection(selection);
    }

    // The shared pieces every context hangs off.
    let bus = MessageBus::default();
    let blobs = BlobStore::new();
    let synth: Arc<dyn SynthesisBackend> =
        Arc::new(HttpSynthesisBackend::new(config.backend_url.clone()));
    let media = Arc::new(RodioBackend::new().context("Failed to open audio output")?);

    // Resident contexts: the extractor and the relay attach to the bus at
    // construction. The audio context stays unprovisioned until the relay's
    // first request.
    let extractor = tokio::spawn(PageExtractor::new(&bus, content).run());
    let task_host = Arc::new(TaskHost::new(
        bus.clone(),
        blobs.clone(),
        Arc::clone(&synth),
        media,
        SessionConfig {
            metadata_timeout: config.metadata_timeout,
        },
    ));
    let relay = tokio::spawn(
        RelayController::new(
            bus.clone(),
            task_host,
            RelayConfig {
                forward_grace: config.forward_grace,
            },
        )
        .run(),
    );

    // From here on this process plays the UI panel's role.
    let text = request_page_text(&bus).await?;
    tracing::info!(chars = text.len(), "page text extracted");

    let input = synthesis_input(&args, text);
    let source = if args.preload {
        tracing::info!("pre-fetching audio");
        let audio = synth
            .synthesize(&input)
            .await
            .context("Failed to pre-fetch audio")?;
        AudioSource::preloaded(blobs.insert(audio))
    } else {
        AudioSource::synthesis(input)
    };

    // Subscribe before requesting playback so no lifecycle event is missed.
    let mut lifecycle = bus.subscribe();

    let (envelope, ack) = Envelope::request(ControlEvent::PlayAudioRequest(
        PlayAudioRequestEvent::new(PlaybackRequest::new(source)),
    ));
    bus.send(envelope)
        .map_err(|e| anyhow::anyhow!("playback request not delivered: {e}"))?;
    match tokio::time::timeout(Duration::from_secs(5), ack).await {
        Ok(Ok(Reply::Ack { success: true })) => tracing::debug!("playback request accepted"),
        Ok(Ok(_)) => anyhow::bail!("playback request rejected"),
        Ok(Err(_)) | Err(_) => anyhow::bail!("no acknowledgment from the relay"),
    }

    let outcome = tokio::select! {
        event = next_lifecycle(&mut lifecycle) => event,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, stopping playback");
            if let Err(e) = bus.send(Envelope::control(ControlEvent::StopAudio)) {
                tracing::warn!("stop not delivered: {e}");
            }
            None
        }
    };

    extractor.abort();
    relay.abort();

    match outcome {
        Some(LifecycleEvent::AudioEnded) => {
            tracing::info!("playback finished");
            Ok(())
        }
        Some(LifecycleEvent::AudioError) => anyhow::bail!("playback failed"),
        None => Ok(()),
    }
}

fn synthesis_input(args: &Cli, text: String) -> SynthesisInput {
    let mut input = SynthesisInput::new(text);
    if let Some(voice) = &args.voice {
        input = input.with_voice(voice);
    }
    if let Some(rate) = &args.rate {
        input = input.with_rate(rate);
    }
    if let Some(pitch) = &args.pitch {
        input = input.with_pitch(pitch);
    }
    input
}

fn read_page(page: &str) -> Result<String> {
    if page == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("reading stdin")?;
        Ok(body)
    } else {
        std::fs::read_to_string(page).with_context(|| format!("reading {page}"))
    }
}

async fn request_page_text(bus: &MessageBus) -> Result<String> {
    let (envelope, reply) = Envelope::request(ControlEvent::GetPageText);
    bus.send(envelope)
        .map_err(|e| anyhow::anyhow!("page text request not delivered: {e}"))?;
    match tokio::time::timeout(Duration::from_secs(2), reply).await {
        Ok(Ok(Reply::PageText(page))) => Ok(page.into_text()),
        Ok(Ok(_)) => anyhow::bail!("unexpected reply to page text request"),
        Ok(Err(_)) | Err(_) => anyhow::bail!("no response from the page extractor"),
    }
}

async fn next_lifecycle(
    rx: &mut tokio::sync::broadcast::Receiver<Envelope>,
) -> Option<LifecycleEvent> {
    loop {
        match rx.recv().await {
            Ok(envelope) => {
                if let BusEvent::Lifecycle(event) = envelope.event() {
                    return Some(*event);
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "lifecycle listener lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => return None,
        }
    }
}
