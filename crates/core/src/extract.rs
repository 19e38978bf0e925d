use readaloud_types::{ControlEvent, PageText};
use tokio::sync::broadcast;

use crate::bus::{BusEvent, Envelope, MessageBus, Reply};

/// What the page currently shows. The owner keeps it up to date; the
/// extractor only reads it.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    body: String,
    selection: Option<String>,
}

impl PageContent {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            selection: None,
        }
    }

    pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    /// The user's selection when non-empty, otherwise the full body text.
    pub fn text(&self) -> &str {
        match self.selection.as_deref().map(str::trim) {
            Some(selection) if !selection.is_empty() => selection,
            _ => &self.body,
        }
    }
}

/// Peer context answering `GET_PAGE_TEXT`. Independent of the audio
/// lifecycle; it never touches playback state.
pub struct PageExtractor {
    rx: broadcast::Receiver<Envelope>,
    content: PageContent,
}

impl PageExtractor {
    /// Attaches to the bus immediately so requests sent right after
    /// construction are not lost.
    pub fn new(bus: &MessageBus, content: PageContent) -> Self {
        Self {
            rx: bus.subscribe(),
            content,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("page extractor listening");
        loop {
            match self.rx.recv().await {
                Ok(envelope) => {
                    if matches!(
                        envelope.event(),
                        BusEvent::Control(ControlEvent::GetPageText)
                    ) {
                        let text = self.content.text().to_owned();
                        tracing::debug!(chars = text.len(), "answering page text request");
                        envelope.respond(Reply::PageText(PageText::new(text)));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "page extractor lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
