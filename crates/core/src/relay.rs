use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use readaloud_types::events::PlayAudioEvent;
use readaloud_types::{AudioSource, ControlEvent, PlaybackRequest};
use tokio::sync::broadcast;

use crate::bus::{BusEvent, Envelope, MessageBus};
use crate::error::RelayError;

/// How long to wait after provisioning before forwarding, covering the
/// window where a freshly created context has not yet attached its
/// listener. The bus delivers only to listeners attached at send time, so
/// this trades worst-case latency for not losing the message.
pub const DEFAULT_FORWARD_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub forward_grace: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            forward_grace: DEFAULT_FORWARD_GRACE,
        }
    }
}

/// Lifecycle of the audio-capable context as last observed by the relay.
/// Purely observational: existence is re-queried from the host before every
/// forward, never answered from this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessGate {
    Absent,
    Provisioning,
    Ready,
}

/// The privileged host surface the relay drives: context existence checks,
/// idempotent context creation, and the one-time panel trigger setup.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait ContextHost: Send + Sync {
    async fn has_audio_context(&self) -> bool;

    /// Creates the audio-capable context. Racing an existing instance must
    /// report success, not an error.
    async fn create_audio_context(&self) -> Result<(), RelayError>;

    /// Makes the UI panel open when the user activates the extension icon.
    fn configure_panel_trigger(&self) -> Result<(), RelayError>;
}

/// Always-resident coordinator between the UI and the audio context. It
/// guarantees the audio context exists before a playback request reaches
/// it, and forwards the request after the readiness grace period.
pub struct RelayController {
    bus: MessageBus,
    rx: broadcast::Receiver<Envelope>,
    host: Arc<dyn ContextHost>,
    config: RelayConfig,
    gate: Mutex<ReadinessGate>,
}

impl RelayController {
    /// Attaches to the bus immediately so no request sent after
    /// construction can be missed, even if `run` is polled late.
    pub fn new(bus: MessageBus, host: Arc<dyn ContextHost>, config: RelayConfig) -> Self {
        let rx = bus.subscribe();
        Self {
            bus,
            rx,
            host,
            config,
            gate: Mutex::new(ReadinessGate::Absent),
        }
    }

    pub fn gate(&self) -> ReadinessGate {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn run(mut self) {
        // One-time UI affordance setup; failure is logged, never fatal.
        if let Err(e) = self.host.configure_panel_trigger() {
            tracing::error!("failed to configure panel trigger: {e}");
        }

        tracing::info!("relay listening");
        loop {
            match self.rx.recv().await {
                Ok(envelope) => {
                    if let BusEvent::Control(ControlEvent::PlayAudioRequest(event)) =
                        envelope.event()
                    {
                        let request = event.request().clone();
                        self.on_playback_request(request, &envelope).await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "relay lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Handles one playback request end to end. Any failure terminates the
    /// request: it is logged, nothing is retried, and no partial state
    /// survives into the next request.
    pub async fn on_playback_request(&self, request: PlaybackRequest, envelope: &Envelope) {
        if let Err(e) = validate(&request) {
            tracing::warn!("dropping playback request: {e}");
            envelope.ack(false);
            return;
        }

        if let Err(e) = self.ensure_audio_context().await {
            tracing::error!("dropping playback request: {e}");
            envelope.ack(false);
            return;
        }

        self.schedule_forward(request);
        envelope.ack(true);
    }

    async fn ensure_audio_context(&self) -> Result<(), RelayError> {
        if self.host.has_audio_context().await {
            tracing::debug!("audio context already exists");
            self.set_gate(ReadinessGate::Ready);
            return Ok(());
        }

        self.set_gate(ReadinessGate::Provisioning);
        tracing::info!("creating audio context");
        match self.host.create_audio_context().await {
            Ok(()) => {
                self.set_gate(ReadinessGate::Ready);
                Ok(())
            }
            Err(e) => {
                // Reflect what actually exists rather than caching the
                // failed attempt; the next request re-queries anyway.
                let gate = if self.host.has_audio_context().await {
                    ReadinessGate::Ready
                } else {
                    ReadinessGate::Absent
                };
                self.set_gate(gate);
                Err(e)
            }
        }
    }

    /// Every request gets its own delayed forward; forwards for superseded
    /// requests are not cancelled. The session manager's replace-on-play
    /// rule keeps at most one live session regardless.
    fn schedule_forward(&self, request: PlaybackRequest) {
        let bus = self.bus.clone();
        let grace = self.config.forward_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let event = ControlEvent::PlayAudio(PlayAudioEvent::new(request));
            match bus.send(Envelope::control(event)) {
                Ok(listeners) => tracing::debug!(listeners, "forwarded PLAY_AUDIO"),
                Err(e) => tracing::error!("failed to forward PLAY_AUDIO: {e}"),
            }
        });
    }

    fn set_gate(&self, gate: ReadinessGate) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = gate;
    }
}

/// Shape validation happens here, once; downstream contexts trust the
/// payload.
fn validate(request: &PlaybackRequest) -> Result<(), RelayError> {
    match request.source() {
        AudioSource::PreloadedBlob { locator } if locator.is_empty() => {
            Err(RelayError::InvalidRequest("empty blob locator"))
        }
        AudioSource::Synthesis(input) if input.text().trim().is_empty() => {
            Err(RelayError::InvalidRequest("empty synthesis text"))
        }
        _ => Ok(()),
    }
}
