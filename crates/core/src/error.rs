use std::time::Duration;

/// Failures local to the relay controller. Both are terminal for the
/// request they occurred in; neither reaches the UI.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("audio context provisioning failed: {0}")]
    Provisioning(String),
    #[error("forward failed: no listener attached to the bus")]
    Forward,
    #[error("invalid playback request: {0}")]
    InvalidRequest(&'static str),
}

/// Terminal failures of a playback session. Each surfaces as a single
/// `AUDIO_ERROR` broadcast when the failing session is still the current
/// one; a superseded session fails silently.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("synthesis backend returned status {0}")]
    BackendStatus(u16),
    #[error("synthesis request failed: {0}")]
    Backend(String),
    #[error("unknown blob locator: {0}")]
    UnknownLocator(String),
    #[error("audio failed to load: {0}")]
    MediaLoad(String),
    #[error("audio metadata not loaded within {0:?}")]
    MediaLoadTimeout(Duration),
    #[error("playback failed: {0}")]
    Playback(String),
}
