//! Production `ContextHost`: the audio-capable context is a lazily spawned
//! tokio task running the session manager.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use readaloud_core::blobs::BlobStore;
use readaloud_core::bus::MessageBus;
use readaloud_core::error::RelayError;
use readaloud_core::media::MediaBackend;
use readaloud_core::relay::ContextHost;
use readaloud_core::session::{AudioSessionManager, SessionConfig};
use readaloud_core::synth::SynthesisBackend;
use tokio::task::JoinHandle;

pub struct TaskHost {
    bus: MessageBus,
    blobs: BlobStore,
    synth: Arc<dyn SynthesisBackend>,
    media: Arc<dyn MediaBackend>,
    session_config: SessionConfig,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TaskHost {
    pub fn new(
        bus: MessageBus,
        blobs: BlobStore,
        synth: Arc<dyn SynthesisBackend>,
        media: Arc<dyn MediaBackend>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            bus,
            blobs,
            synth,
            media,
            session_config,
            task: Mutex::new(None),
        }
    }

    fn alive(task: &Option<JoinHandle<()>>) -> bool {
        task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

#[async_trait]
impl ContextHost for TaskHost {
    async fn has_audio_context(&self) -> bool {
        Self::alive(&self.task.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn create_audio_context(&self) -> Result<(), RelayError> {
        let mut guard = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        // Racing an existing live context is success, not an error.
        if Self::alive(&guard) {
            return Ok(());
        }

        let manager = AudioSessionManager::new(
            self.bus.clone(),
            self.blobs.clone(),
            Arc::clone(&self.synth),
            Arc::clone(&self.media),
            self.session_config.clone(),
        );
        *guard = Some(tokio::spawn(manager.run()));
        tracing::info!("audio context created");
        Ok(())
    }

    fn configure_panel_trigger(&self) -> Result<(), RelayError> {
        // The standalone service has no browser action icon; the panel role
        // is played by this process itself, so there is nothing to toggle.
        tracing::debug!("panel trigger configured");
        Ok(())
    }
}
