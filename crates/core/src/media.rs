use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::error::SessionError;

/// Creates playback handles from raw audio bytes. Opening a handle is the
/// metadata-load phase: it resolves once the audio is decodable and its
/// duration is known, or known to be unknown (streaming sources).
#[async_trait]
#[cfg_attr(test, automock)]
pub trait MediaBackend: Send + Sync {
    async fn open(&self, audio: Bytes) -> Result<Arc<dyn MediaHandle>, SessionError>;
}

/// One attached media element. Playback starts in `play_to_end`, which
/// settles exactly once: Ok when the audio drains, Err on a playback fault.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait MediaHandle: Send + Sync {
    fn duration(&self) -> Option<Duration>;
    async fn play_to_end(&self) -> Result<(), SessionError>;
    fn pause(&self);
    fn resume(&self) -> Result<(), SessionError>;
    fn rewind(&self);
    fn detach(&self);
}

/// rodio-backed output against the default device.
pub struct RodioBackend {
    handle: OutputStreamHandle,
}

impl RodioBackend {
    /// Opens the default output device. The stream itself is leaked: sinks
    /// keep playing through its handle for the process lifetime.
    pub fn new() -> Result<Self, SessionError> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| SessionError::MediaLoad(format!("no audio output device: {e}")))?;
        std::mem::forget(stream);
        Ok(Self { handle })
    }
}

#[async_trait]
impl MediaBackend for RodioBackend {
    async fn open(&self, audio: Bytes) -> Result<Arc<dyn MediaHandle>, SessionError> {
        let source =
            Decoder::new(Cursor::new(audio)).map_err(|e| SessionError::MediaLoad(e.to_string()))?;
        let duration = source.total_duration();

        let sink = Sink::try_new(&self.handle)
            .map_err(|e| SessionError::MediaLoad(e.to_string()))?;
        // Queue paused; nothing plays until the session says so.
        sink.pause();
        sink.append(source);

        Ok(Arc::new(RodioHandle {
            sink: Arc::new(sink),
            duration,
        }))
    }
}

struct RodioHandle {
    sink: Arc<Sink>,
    duration: Option<Duration>,
}

#[async_trait]
impl MediaHandle for RodioHandle {
    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    async fn play_to_end(&self) -> Result<(), SessionError> {
        self.sink.play();
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || sink.sleep_until_end())
            .await
            .map_err(|e| SessionError::Playback(format!("playback wait failed: {e}")))
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn resume(&self) -> Result<(), SessionError> {
        self.sink.play();
        Ok(())
    }

    fn rewind(&self) {
        // Seek support depends on the decoded source; a failed rewind
        // leaves the position where it was.
        if let Err(e) = self.sink.try_seek(Duration::ZERO) {
            tracing::warn!("rewind failed: {e:?}");
        }
    }

    fn detach(&self) {
        self.sink.stop();
    }
}
