/// A request to play one piece of text as speech.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PlaybackRequest {
    source: AudioSource,
}

impl PlaybackRequest {
    pub fn new(source: AudioSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    pub fn into_source(self) -> AudioSource {
        self.source
    }
}

/// Where the audio comes from. Exactly one variant per request; the relay
/// validates the payload once at its boundary.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioSource {
    /// Audio that was already fetched upstream and registered under a blob
    /// locator. The preferred, low-latency path.
    PreloadedBlob { locator: String },
    /// Raw input for the remote synthesis endpoint, used when nothing was
    /// pre-fetched.
    Synthesis(SynthesisInput),
}

impl AudioSource {
    pub fn preloaded(locator: impl Into<String>) -> Self {
        Self::PreloadedBlob {
            locator: locator.into(),
        }
    }

    pub fn synthesis(input: SynthesisInput) -> Self {
        Self::Synthesis(input)
    }
}

/// Parameters forwarded verbatim to the synthesis backend. The engine
/// selector is not part of the request; the synthesis client injects it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SynthesisInput {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pitch: Option<String>,
}

impl SynthesisInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            rate: None,
            pitch: None,
        }
    }

    pub fn with_voice(mut self, voice: &str) -> Self {
        self.voice = Some(voice.to_string());
        self
    }

    /// Rate adjustment such as "+0%" or "-10%".
    pub fn with_rate(mut self, rate: &str) -> Self {
        self.rate = Some(rate.to_string());
        self
    }

    /// Pitch adjustment such as "+0Hz" or "-10Hz".
    pub fn with_pitch(mut self, pitch: &str) -> Self {
        self.pitch = Some(pitch.to_string());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    pub fn rate(&self) -> Option<&str> {
        self.rate.as_deref()
    }

    pub fn pitch(&self) -> Option<&str> {
        self.pitch.as_deref()
    }
}
