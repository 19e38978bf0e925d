use crate::source::PlaybackRequest;

/// Control messages moving between contexts. The tag is the wire-level
/// message type.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ControlEvent {
    /// UI to relay: play this.
    #[serde(rename = "PLAY_AUDIO_REQUEST")]
    PlayAudioRequest(PlayAudioRequestEvent),
    /// Relay to the audio context, forwarded after the readiness grace.
    #[serde(rename = "PLAY_AUDIO")]
    PlayAudio(PlayAudioEvent),
    #[serde(rename = "STOP_AUDIO")]
    StopAudio,
    #[serde(rename = "PAUSE_AUDIO")]
    PauseAudio,
    #[serde(rename = "RESUME_AUDIO")]
    ResumeAudio,
    /// Answered by the page extractor with a `PageText` reply.
    #[serde(rename = "GET_PAGE_TEXT")]
    GetPageText,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlayAudioRequestEvent {
    data: PlaybackRequest,
}

impl PlayAudioRequestEvent {
    pub fn new(data: PlaybackRequest) -> Self {
        Self { data }
    }

    pub fn request(&self) -> &PlaybackRequest {
        &self.data
    }

    pub fn into_request(self) -> PlaybackRequest {
        self.data
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlayAudioEvent {
    data: PlaybackRequest,
}

impl PlayAudioEvent {
    pub fn new(data: PlaybackRequest) -> Self {
        Self { data }
    }

    pub fn request(&self) -> &PlaybackRequest {
        &self.data
    }

    pub fn into_request(self) -> PlaybackRequest {
        self.data
    }
}

/// Terminal outcome of a playback session, broadcast at most once per
/// session and only by the session that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    #[serde(rename = "AUDIO_ENDED")]
    AudioEnded,
    #[serde(rename = "AUDIO_ERROR")]
    AudioError,
}
