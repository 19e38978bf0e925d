use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use readaloud_types::{AudioSource, ControlEvent, LifecycleEvent, PlaybackRequest};
use tokio::sync::broadcast;

use crate::blobs::BlobStore;
use crate::bus::{BusEvent, Envelope, MessageBus};
use crate::error::SessionError;
use crate::media::{MediaBackend, MediaHandle};
use crate::synth::SynthesisBackend;

pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub metadata_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: DEFAULT_METADATA_TIMEOUT,
        }
    }
}

/// Phase of the live session. Terminal outcomes clear the slot instead of
/// being stored, so an empty slot doubles as Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Loading,
    Playing,
    Paused,
}

/// The single live playback session. Replaced wholesale on every play
/// request, never mutated into a new one.
struct Session {
    generation: u64,
    phase: Phase,
    handle: Option<Arc<dyn MediaHandle>>,
    /// Locator this session created (synthesis path) and must release.
    owned_locator: Option<String>,
}

struct Slot {
    current: Mutex<Option<Session>>,
    generations: AtomicU64,
}

/// Owns the at-most-one live audio session. Control messages arrive through
/// the bus listener; the playback chain for each session runs as its own
/// task, tagged with the session's generation. Every continuation re-checks
/// that its generation is still current before touching the slot or
/// broadcasting, which is what keeps a replaced session from ever emitting.
#[derive(Clone)]
pub struct AudioSessionManager {
    bus: MessageBus,
    blobs: BlobStore,
    synth: Arc<dyn SynthesisBackend>,
    media: Arc<dyn MediaBackend>,
    config: SessionConfig,
    slot: Arc<Slot>,
}

impl AudioSessionManager {
    pub fn new(
        bus: MessageBus,
        blobs: BlobStore,
        synth: Arc<dyn SynthesisBackend>,
        media: Arc<dyn MediaBackend>,
        config: SessionConfig,
    ) -> Self {
        Self {
            bus,
            blobs,
            synth,
            media,
            config,
            slot: Arc::new(Slot {
                current: Mutex::new(None),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub async fn run(self) {
        let mut rx = self.bus.subscribe();
        tracing::info!("audio session manager listening");
        loop {
            match rx.recv().await {
                Ok(envelope) => self.handle(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "session manager lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn handle(&self, envelope: Envelope) {
        let BusEvent::Control(event) = envelope.event() else {
            return;
        };
        match event {
            ControlEvent::PlayAudio(event) => {
                self.on_play(event.request().clone());
                // Accepted and dispatched; completion arrives as a
                // lifecycle broadcast, not through this reply.
                envelope.ack(true);
            }
            ControlEvent::StopAudio => self.on_stop(),
            ControlEvent::PauseAudio => self.on_pause(),
            ControlEvent::ResumeAudio => self.on_resume(),
            _ => {}
        }
    }

    /// Unconditionally replaces any live session, then dispatches the
    /// playback chain for the new one.
    fn on_play(&self, request: PlaybackRequest) {
        let generation = self.slot.generations.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut guard = self.lock_current();
            if let Some(previous) = guard.take() {
                self.teardown(previous);
            }
            *guard = Some(Session {
                generation,
                phase: Phase::Loading,
                handle: None,
                owned_locator: None,
            });
        }

        tracing::info!(generation, "starting playback session");
        let manager = self.clone();
        tokio::spawn(async move {
            manager.drive(generation, request.into_source()).await;
        });
    }

    /// Silences a replaced session and releases what it owned. Its chains
    /// are not cancelled; they discover the stale generation at their next
    /// checkpoint and vanish without broadcasting.
    fn teardown(&self, session: Session) {
        tracing::debug!(
            generation = session.generation,
            phase = ?session.phase,
            "tearing down replaced session"
        );
        if let Some(handle) = session.handle {
            handle.pause();
            handle.detach();
        }
        if let Some(locator) = session.owned_locator {
            self.blobs.revoke(&locator);
        }
    }

    async fn drive(self, generation: u64, source: AudioSource) {
        match self.start(generation, source).await {
            Ok(Some(handle)) => self.await_outcome(generation, handle).await,
            // Superseded mid-flight; everything already cleaned up.
            Ok(None) => {}
            Err(error) => self.fail(generation, error),
        }
    }

    /// Everything up to `Playing`: resolve the source to audio bytes, load
    /// the media within the metadata timeout, attach the handle. Returns
    /// None when the session was superseded along the way.
    async fn start(
        &self,
        generation: u64,
        source: AudioSource,
    ) -> Result<Option<Arc<dyn MediaHandle>>, SessionError> {
        let (audio, owned_locator) = self.resolve(&source).await?;

        if let Some(locator) = owned_locator {
            // Record ownership so teardown can release the locator; a
            // chain that already lost the race releases it itself.
            if !self.adopt_locator(generation, &locator) {
                self.blobs.revoke(&locator);
                tracing::debug!(generation, "superseded before media load");
                return Ok(None);
            }
        } else if !self.is_current(generation) {
            tracing::debug!(generation, "superseded before media load");
            return Ok(None);
        }

        let handle = match tokio::time::timeout(
            self.config.metadata_timeout,
            self.media.open(audio),
        )
        .await
        {
            Ok(Ok(handle)) => handle,
            Ok(Err(error)) => return Err(error),
            Err(_) => return Err(SessionError::MediaLoadTimeout(self.config.metadata_timeout)),
        };

        match handle.duration() {
            Some(duration) => tracing::debug!(generation, ?duration, "audio metadata loaded"),
            // Streaming sources legitimately report no duration.
            None => tracing::warn!(generation, "audio duration unknown"),
        }

        if !self.attach(generation, Arc::clone(&handle)) {
            handle.detach();
            tracing::debug!(generation, "superseded during media load");
            return Ok(None);
        }
        Ok(Some(handle))
    }

    /// Both source variants converge on audio bytes; the synthesis path
    /// additionally registers the fetched audio under a locator this
    /// session owns.
    async fn resolve(
        &self,
        source: &AudioSource,
    ) -> Result<(Bytes, Option<String>), SessionError> {
        match source {
            AudioSource::PreloadedBlob { locator } => {
                let audio = self
                    .blobs
                    .get(locator)
                    .ok_or_else(|| SessionError::UnknownLocator(locator.clone()))?;
                Ok((audio, None))
            }
            AudioSource::Synthesis(input) => {
                tracing::info!(chars = input.text().len(), "requesting synthesis");
                let audio = self.synth.synthesize(input).await?;
                let locator = self.blobs.insert(audio.clone());
                Ok((audio, Some(locator)))
            }
        }
    }

    /// Awaits the terminal playback outcome and broadcasts it exactly once,
    /// and only if this chain's session is still the current one.
    async fn await_outcome(&self, generation: u64, handle: Arc<dyn MediaHandle>) {
        let outcome = handle.play_to_end().await;

        let Some(session) = self.take_if_current(generation) else {
            tracing::debug!(generation, "suppressing outcome of superseded session");
            return;
        };
        if let Some(locator) = session.owned_locator {
            self.blobs.revoke(&locator);
        }

        match outcome {
            Ok(()) => {
                tracing::info!(generation, "playback ended");
                self.broadcast(LifecycleEvent::AudioEnded);
            }
            Err(error) => {
                tracing::error!(generation, %error, "playback failed");
                self.broadcast(LifecycleEvent::AudioError);
            }
        }
    }

    /// A genuine failure of the current session: exactly one `AUDIO_ERROR`.
    /// Superseded chains fall through silently.
    fn fail(&self, generation: u64, error: SessionError) {
        let Some(session) = self.take_if_current(generation) else {
            tracing::debug!(generation, %error, "suppressing failure of superseded session");
            return;
        };
        if let Some(handle) = session.handle {
            handle.detach();
        }
        if let Some(locator) = session.owned_locator {
            self.blobs.revoke(&locator);
        }
        tracing::error!(generation, %error, "playback session failed");
        self.broadcast(LifecycleEvent::AudioError);
    }

    /// Pause and reset to the start; the session object survives, so a
    /// later resume replays from zero. Without a session, or before the
    /// media is attached, this is a no-op.
    fn on_stop(&self) {
        let mut guard = self.lock_current();
        match guard.as_mut() {
            Some(Session {
                handle: Some(handle),
                phase,
                ..
            }) => {
                handle.pause();
                handle.rewind();
                *phase = Phase::Paused;
                tracing::info!("playback stopped, position reset");
            }
            _ => tracing::debug!("stop requested with no playable session"),
        }
    }

    fn on_pause(&self) {
        let mut guard = self.lock_current();
        match guard.as_mut() {
            Some(Session {
                handle: Some(handle),
                phase,
                ..
            }) => {
                handle.pause();
                *phase = Phase::Paused;
                tracing::info!("playback paused");
            }
            _ => tracing::debug!("pause requested with no playable session"),
        }
    }

    fn on_resume(&self) {
        let mut guard = self.lock_current();
        match guard.as_mut() {
            Some(Session {
                handle: Some(handle),
                phase,
                generation,
                ..
            }) => match handle.resume() {
                Ok(()) => {
                    *phase = Phase::Playing;
                    tracing::info!("playback resumed");
                }
                // A failed resume is logged and swallowed; no lifecycle
                // event for it.
                Err(error) => {
                    tracing::error!(generation = *generation, %error, "resume failed");
                }
            },
            _ => tracing::debug!("resume requested with no playable session"),
        }
    }

    fn broadcast(&self, event: LifecycleEvent) {
        if let Err(e) = self.bus.send(Envelope::lifecycle(event)) {
            tracing::warn!("lifecycle broadcast lost: {e}");
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<Session>> {
        self.slot
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_current()
            .as_ref()
            .is_some_and(|session| session.generation == generation)
    }

    fn adopt_locator(&self, generation: u64, locator: &str) -> bool {
        let mut guard = self.lock_current();
        match guard.as_mut() {
            Some(session) if session.generation == generation => {
                session.owned_locator = Some(locator.to_owned());
                true
            }
            _ => false,
        }
    }

    fn attach(&self, generation: u64, handle: Arc<dyn MediaHandle>) -> bool {
        let mut guard = self.lock_current();
        match guard.as_mut() {
            Some(session) if session.generation == generation => {
                session.handle = Some(handle);
                session.phase = Phase::Playing;
                true
            }
            _ => false,
        }
    }

    /// Removes the session from the slot when, and only when, it still
    /// belongs to the given generation.
    fn take_if_current(&self, generation: u64) -> Option<Session> {
        let mut guard = self.lock_current();
        match guard.as_ref() {
            Some(session) if session.generation == generation => guard.take(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::MockSynthesisBackend;
    use async_trait::async_trait;
    use readaloud_types::events::PlayAudioEvent;
    use readaloud_types::SynthesisInput;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Media handle with scripted outcomes and observable control calls.
    struct FakeHandle {
        duration: Option<Duration>,
        play_calls: AtomicUsize,
        paused: std::sync::atomic::AtomicBool,
        rewinds: AtomicUsize,
        detached: std::sync::atomic::AtomicBool,
        fail_resume: bool,
        finished: Notify,
        outcome: Mutex<Option<Result<(), SessionError>>>,
    }

    impl FakeHandle {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                duration: Some(Duration::from_secs(3)),
                play_calls: AtomicUsize::new(0),
                paused: std::sync::atomic::AtomicBool::new(false),
                rewinds: AtomicUsize::new(0),
                detached: std::sync::atomic::AtomicBool::new(false),
                fail_resume: false,
                finished: Notify::new(),
                outcome: Mutex::new(None),
            })
        }

        fn failing_resume() -> Arc<Self> {
            let mut handle = Self::new();
            Arc::get_mut(&mut handle).expect("unshared").fail_resume = true;
            handle
        }

        fn finish(&self, outcome: Result<(), SessionError>) {
            *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
            self.finished.notify_waiters();
        }

        fn plays(&self) -> usize {
            self.play_calls.load(Ordering::SeqCst)
        }

        fn detached(&self) -> bool {
            self.detached.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaHandle for FakeHandle {
        fn duration(&self) -> Option<Duration> {
            self.duration
        }

        async fn play_to_end(&self) -> Result<(), SessionError> {
            self.play_calls.fetch_add(1, Ordering::SeqCst);
            self.paused.store(false, Ordering::SeqCst);
            loop {
                let notified = self.finished.notified();
                if let Some(outcome) = self
                    .outcome
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                {
                    return outcome;
                }
                notified.await;
            }
        }

        fn pause(&self) {
            self.paused.store(true, Ordering::SeqCst);
        }

        fn resume(&self) -> Result<(), SessionError> {
            if self.fail_resume {
                return Err(SessionError::Playback("source revoked".into()));
            }
            self.paused.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn rewind(&self) {
            self.rewinds.fetch_add(1, Ordering::SeqCst);
        }

        fn detach(&self) {
            self.detached.store(true, Ordering::SeqCst);
            // A detached sink drains immediately, like a stopped element.
            self.finish(Ok(()));
        }
    }

    enum OpenScript {
        Ready(Arc<FakeHandle>),
        Gated(Arc<Notify>, Arc<FakeHandle>),
        Stall,
    }

    #[derive(Default)]
    struct FakeMedia {
        scripts: Mutex<VecDeque<OpenScript>>,
        opens: AtomicUsize,
    }

    impl FakeMedia {
        fn scripted(scripts: Vec<OpenScript>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                opens: AtomicUsize::new(0),
            })
        }

        fn opens(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaBackend for FakeMedia {
        async fn open(&self, _audio: Bytes) -> Result<Arc<dyn MediaHandle>, SessionError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let script = self
                .scripts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .expect("unexpected open");
            match script {
                OpenScript::Ready(handle) => Ok(handle),
                OpenScript::Gated(gate, handle) => {
                    gate.notified().await;
                    Ok(handle)
                }
                OpenScript::Stall => std::future::pending().await,
            }
        }
    }

    struct Harness {
        manager: AudioSessionManager,
        blobs: BlobStore,
        lifecycle: broadcast::Receiver<Envelope>,
    }

    fn harness(synth: MockSynthesisBackend, media: Arc<FakeMedia>) -> Harness {
        harness_with_config(synth, media, SessionConfig::default())
    }

    fn harness_with_config(
        synth: MockSynthesisBackend,
        media: Arc<FakeMedia>,
        config: SessionConfig,
    ) -> Harness {
        let bus = MessageBus::default();
        let blobs = BlobStore::new();
        let manager = AudioSessionManager::new(
            bus.clone(),
            blobs.clone(),
            Arc::new(synth),
            media,
            config,
        );
        let lifecycle = bus.subscribe();
        Harness {
            manager,
            blobs,
            lifecycle,
        }
    }

    impl Harness {
        fn play_preloaded(&self, locator: &str) {
            self.manager
                .on_play(PlaybackRequest::new(AudioSource::preloaded(locator)));
        }

        fn play_synthesis(&self, text: &str) {
            self.manager
                .on_play(PlaybackRequest::new(AudioSource::synthesis(
                    SynthesisInput::new(text),
                )));
        }

        async fn next_lifecycle(&mut self, within: Duration) -> Option<LifecycleEvent> {
            tokio::time::timeout(within, async {
                loop {
                    match self.lifecycle.recv().await {
                        Ok(envelope) => {
                            if let BusEvent::Lifecycle(event) = envelope.event() {
                                return *event;
                            }
                        }
                        Err(_) => std::future::pending::<()>().await,
                    }
                }
            })
            .await
            .ok()
        }

        fn idle(&self) -> bool {
            self.manager.lock_current().is_none()
        }
    }

    async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    const EVENT_WAIT: Duration = Duration::from_millis(500);
    const NO_EVENT_WAIT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn preloaded_play_broadcasts_ended_exactly_once() {
        let handle = FakeHandle::new();
        let media = FakeMedia::scripted(vec![OpenScript::Ready(Arc::clone(&handle))]);
        let mut h = harness(MockSynthesisBackend::new(), media);
        let locator = h.blobs.insert(Bytes::from_static(b"audio"));

        h.play_preloaded(&locator);
        wait_until("playback start", || handle.plays() == 1).await;

        handle.finish(Ok(()));
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioEnded));
        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);
        assert!(h.idle());
        // The preloaded blob belongs to the caller; it is not revoked.
        assert_eq!(h.blobs.len(), 1);
    }

    #[tokio::test]
    async fn play_acknowledges_dispatch_through_the_envelope() {
        let handle = FakeHandle::new();
        let media = FakeMedia::scripted(vec![OpenScript::Ready(Arc::clone(&handle))]);
        let h = harness(MockSynthesisBackend::new(), media);
        let locator = h.blobs.insert(Bytes::from_static(b"audio"));

        let (envelope, ack) = Envelope::request(ControlEvent::PlayAudio(PlayAudioEvent::new(
            PlaybackRequest::new(AudioSource::preloaded(locator)),
        )));
        h.manager.handle(envelope);

        let reply = ack.await.expect("ack");
        assert!(matches!(reply, crate::bus::Reply::Ack { success: true }));
    }

    #[tokio::test]
    async fn synthesis_failure_broadcasts_one_error_and_never_opens_media() {
        let mut synth = MockSynthesisBackend::new();
        synth
            .expect_synthesize()
            .times(1)
            .returning(|_| Box::pin(async { Err(SessionError::BackendStatus(500)) }));
        let media = FakeMedia::scripted(vec![]);
        let mut h = harness(synth, Arc::clone(&media));

        h.play_synthesis("hello");
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioError));
        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);
        assert_eq!(media.opens(), 0);
        assert!(h.idle());
    }

    #[tokio::test]
    async fn synthesis_registers_a_locator_and_releases_it_on_end() {
        let mut synth = MockSynthesisBackend::new();
        synth
            .expect_synthesize()
            .times(1)
            .returning(|_| Box::pin(async { Ok(Bytes::from_static(b"synthesized")) }));
        let handle = FakeHandle::new();
        let media = FakeMedia::scripted(vec![OpenScript::Ready(Arc::clone(&handle))]);
        let mut h = harness(synth, media);

        h.play_synthesis("hello");
        wait_until("playback start", || handle.plays() == 1).await;
        assert_eq!(h.blobs.len(), 1);

        handle.finish(Ok(()));
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioEnded));
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn playback_error_broadcasts_one_error() {
        let handle = FakeHandle::new();
        let media = FakeMedia::scripted(vec![OpenScript::Ready(Arc::clone(&handle))]);
        let mut h = harness(MockSynthesisBackend::new(), media);
        let locator = h.blobs.insert(Bytes::from_static(b"audio"));

        h.play_preloaded(&locator);
        wait_until("playback start", || handle.plays() == 1).await;

        handle.finish(Err(SessionError::Playback("decoder gave up".into())));
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioError));
        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);
    }

    #[tokio::test]
    async fn rapid_plays_leave_only_the_last_handle_attached() {
        let handles = [FakeHandle::new(), FakeHandle::new(), FakeHandle::new()];
        let media = FakeMedia::scripted(
            handles
                .iter()
                .map(|handle| OpenScript::Ready(Arc::clone(handle)))
                .collect(),
        );
        let mut h = harness(MockSynthesisBackend::new(), Arc::clone(&media));
        let locator = h.blobs.insert(Bytes::from_static(b"audio"));

        for (index, _) in handles.iter().enumerate() {
            h.play_preloaded(&locator);
            let expected = index + 1;
            wait_until("media open", || media.opens() == expected).await;
        }

        wait_until("last handle playing", || handles[2].plays() == 1).await;
        wait_until("predecessors detached", || {
            handles[0].detached() && handles[1].detached()
        })
        .await;
        assert!(!handles[2].detached());

        handles[2].finish(Ok(()));
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioEnded));
        // The two superseded sessions never broadcast.
        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);
    }

    #[tokio::test]
    async fn session_superseded_during_load_never_broadcasts() {
        let gate = Arc::new(Notify::new());
        let first = FakeHandle::new();
        let second = FakeHandle::new();
        let media = FakeMedia::scripted(vec![
            OpenScript::Gated(Arc::clone(&gate), Arc::clone(&first)),
            OpenScript::Ready(Arc::clone(&second)),
        ]);
        let mut h = harness(MockSynthesisBackend::new(), Arc::clone(&media));
        let locator = h.blobs.insert(Bytes::from_static(b"audio"));

        h.play_preloaded(&locator);
        wait_until("first open in flight", || media.opens() == 1).await;

        h.play_preloaded(&locator);
        wait_until("second session playing", || second.plays() == 1).await;

        second.finish(Ok(()));
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioEnded));

        // Let the first session's metadata load settle late: its chain
        // must detach the handle and stay silent.
        gate.notify_one();
        wait_until("late handle detached", || first.detached()).await;
        assert_eq!(first.plays(), 0);
        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);
    }

    #[tokio::test]
    async fn metadata_timeout_broadcasts_error_and_never_plays() {
        let media = FakeMedia::scripted(vec![OpenScript::Stall]);
        let mut h = harness_with_config(
            MockSynthesisBackend::new(),
            media,
            SessionConfig {
                metadata_timeout: Duration::from_millis(50),
            },
        );
        let locator = h.blobs.insert(Bytes::from_static(b"audio"));

        h.play_preloaded(&locator);
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioError));
        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);
        assert!(h.idle());
    }

    #[tokio::test]
    async fn unknown_locator_broadcasts_one_error() {
        let media = FakeMedia::scripted(vec![]);
        let mut h = harness(MockSynthesisBackend::new(), Arc::clone(&media));

        h.play_preloaded("blob:readaloud/404");
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioError));
        assert_eq!(media.opens(), 0);
    }

    #[tokio::test]
    async fn controls_without_a_session_are_noops() {
        let media = FakeMedia::scripted(vec![]);
        let mut h = harness(MockSynthesisBackend::new(), media);

        h.manager.on_stop();
        h.manager.on_pause();
        h.manager.on_resume();

        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);
        assert!(h.idle());
    }

    #[tokio::test]
    async fn stop_rewinds_and_keeps_the_session_resumable() {
        let handle = FakeHandle::new();
        let media = FakeMedia::scripted(vec![OpenScript::Ready(Arc::clone(&handle))]);
        let mut h = harness(MockSynthesisBackend::new(), media);
        let locator = h.blobs.insert(Bytes::from_static(b"audio"));

        h.play_preloaded(&locator);
        wait_until("playback start", || handle.plays() == 1).await;

        h.manager.on_stop();
        assert!(handle.paused.load(Ordering::SeqCst));
        assert_eq!(handle.rewinds.load(Ordering::SeqCst), 1);
        assert!(!h.idle());
        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);

        // Resume replays from zero and the session still completes.
        h.manager.on_resume();
        assert!(!handle.paused.load(Ordering::SeqCst));
        handle.finish(Ok(()));
        assert_eq!(h.next_lifecycle(EVENT_WAIT).await, Some(LifecycleEvent::AudioEnded));
    }

    #[tokio::test]
    async fn failed_resume_is_logged_not_broadcast() {
        let handle = FakeHandle::failing_resume();
        let media = FakeMedia::scripted(vec![OpenScript::Ready(Arc::clone(&handle))]);
        let mut h = harness(MockSynthesisBackend::new(), media);
        let locator = h.blobs.insert(Bytes::from_static(b"audio"));

        h.play_preloaded(&locator);
        wait_until("playback start", || handle.plays() == 1).await;

        h.manager.on_pause();
        h.manager.on_resume();

        assert_eq!(h.next_lifecycle(NO_EVENT_WAIT).await, None);
        assert!(!h.idle());
    }
}
