//! Chat session: one conversation, its settings and its collaborators.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use vsai_ai::{
    ChatRequest, GeneratedImage, Message, MessageStatus, Personality, UserInput, intent,
    providers::{ChatGenerator, DEFAULT_LANGUAGE, ImageGenerator, LanguageDetector},
};

use crate::{
    assembler::{Assembly, MessageAssembler, consume_into},
    error::{Error, Result},
    handle::SessionHandle,
    history::HistoryStore,
    playback::{SpeakOutcome, Speaker},
    store::{MessageStore, StoreEvent},
};

/// The generation collaborators a session talks to
#[derive(Clone)]
pub struct Services {
    pub chat: Arc<dyn ChatGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub language: Arc<dyn LanguageDetector>,
}

impl Services {
    /// Use one provider for every capability
    pub fn from_provider<P>(provider: Arc<P>) -> Self
    where
        P: ChatGenerator + ImageGenerator + LanguageDetector + 'static,
    {
        Self {
            chat: provider.clone(),
            images: provider.clone(),
            language: provider,
        }
    }
}

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Account key for the history store
    pub account: String,
    pub personality: Personality,
    /// Ground answers with web search
    pub search_enabled: bool,
}

/// Clears the running flag however the turn future ends
struct TurnGuard<'a>(&'a SessionHandle);

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// One conversation with the assistant
pub struct ChatSession {
    config: SessionConfig,
    services: Services,
    history: Arc<dyn HistoryStore>,
    speaker: Option<Arc<Speaker>>,
    store: MessageStore,
    handle: SessionHandle,
}

impl ChatSession {
    pub fn new(config: SessionConfig, services: Services, history: Arc<dyn HistoryStore>) -> Self {
        let store = MessageStore::new();
        Self {
            config,
            services,
            history,
            speaker: None,
            handle: SessionHandle::new(store.clone()),
            store,
        }
    }

    /// Enable spoken answers
    pub fn with_speaker(mut self, speaker: Arc<Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Subscribe to message changes
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.messages()
    }

    /// Get a cloneable handle for stopping turns from other tasks
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// Stop the current turn; see [`SessionHandle::stop_generation`]
    pub fn stop_generation(&self) -> Option<Message> {
        self.handle.stop_generation()
    }

    pub fn account(&self) -> &str {
        &self.config.account
    }

    pub fn personality(&self) -> Personality {
        self.config.personality
    }

    pub fn set_personality(&mut self, personality: Personality) {
        self.config.personality = personality;
    }

    pub fn search_enabled(&self) -> bool {
        self.config.search_enabled
    }

    pub fn set_search_enabled(&mut self, enabled: bool) {
        self.config.search_enabled = enabled;
    }

    pub fn speaker(&self) -> Option<&Arc<Speaker>> {
        self.speaker.as_ref()
    }

    /// Replace the local messages with the stored history.
    ///
    /// Turns saved while still pending come back as stopped. On failure the
    /// session starts empty and the error is returned.
    pub async fn load_history(&self) -> Result<usize> {
        match self.history.load(&self.config.account).await {
            Ok(messages) => {
                let messages: Vec<Message> = messages
                    .into_iter()
                    .map(|m| if m.is_pending() { m.into_stopped() } else { m })
                    .collect();
                let count = messages.len();
                self.store.set_all(messages);
                tracing::info!(account = %self.config.account, count, "Loaded chat history");
                Ok(count)
            }
            Err(e) => {
                self.store.clear();
                Err(e)
            }
        }
    }

    /// Delete the stored history, then the local messages
    pub async fn clear_history(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::Busy);
        }
        self.history.clear(&self.config.account).await?;
        self.store.clear();
        tracing::info!(account = %self.config.account, "Cleared chat history");
        Ok(())
    }

    /// Run one turn and return the model message in its terminal state.
    ///
    /// Service failures are not returned as errors; they end up in the
    /// message's `error`. When `voice` is set the text answer is spoken, even a
    /// partial one from a stopped turn.
    pub async fn send(&self, input: UserInput, voice: bool) -> Result<Message> {
        if input.is_empty() {
            return Err(Error::EmptyInput);
        }
        let cancel = self.handle.begin().ok_or(Error::Busy)?;

        let status = intent::classify(&input);
        let message = {
            let _guard = TurnGuard(&self.handle);
            let message = self.run_turn(input, status, &cancel).await;
            self.save_history().await;
            message
        };

        // A stopped turn still speaks whatever text it kept
        let spoken = voice
            && status == MessageStatus::GeneratingText
            && message.error.is_none()
            && !message.text.is_empty();
        if spoken {
            self.speak(&message.text).await;
        }

        Ok(message)
    }

    async fn run_turn(
        &self,
        input: UserInput,
        status: MessageStatus,
        cancel: &CancellationToken,
    ) -> Message {
        let history = self.store.messages();
        let placeholder = Message::placeholder(status);
        let id = placeholder.id.clone();

        self.store.push(Message::user(&input));
        self.store.push(placeholder.clone());
        self.handle.set_in_flight(Some(id.clone()));
        tracing::info!(message = %id, ?status, "Turn started");

        let language = if input.text.trim().is_empty() {
            DEFAULT_LANGUAGE.to_string()
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.stopped(&id),
                language = self.services.language.detect_language(&input.text) => language,
            }
        };
        let mut placeholder = placeholder;
        placeholder.language = Some(language);

        let image = input.image.clone();
        match (status, image.as_deref()) {
            (MessageStatus::EditingImage, Some(image)) => {
                let edit = self.services.images.edit_image(&input.text, image);
                self.run_image(placeholder, edit, cancel).await
            }
            (MessageStatus::GeneratingImage, _) => {
                let generate = self.services.images.generate_image(&input.text);
                self.run_image(placeholder, generate, cancel).await
            }
            _ => self.run_text(history, input, placeholder, cancel).await,
        }
    }

    async fn run_image<F>(
        &self,
        placeholder: Message,
        request: F,
        cancel: &CancellationToken,
    ) -> Message
    where
        F: Future<Output = vsai_ai::Result<GeneratedImage>>,
    {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.stopped(&placeholder.id),
            result = request => result,
        };
        if cancel.is_cancelled() {
            return self.stopped(&placeholder.id);
        }

        let message = match result {
            Ok(generated) => Message {
                text: generated.text,
                image: Some(generated.image),
                status: None,
                ..placeholder
            },
            Err(e) => {
                tracing::error!(message = %placeholder.id, "Image request failed: {}", e);
                let mut failed = Message::failed(placeholder.id, e.display_message());
                failed.language = placeholder.language;
                failed
            }
        };
        self.store.replace(message.clone());
        message
    }

    async fn run_text(
        &self,
        history: Vec<Message>,
        input: UserInput,
        placeholder: Message,
        cancel: &CancellationToken,
    ) -> Message {
        let request = ChatRequest {
            history,
            input,
            personality: self.config.personality,
            search_enabled: self.config.search_enabled,
        };

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.stopped(&placeholder.id),
            stream = self.services.chat.stream_chat(&request) => stream,
        };

        let assembler = MessageAssembler::from_placeholder(placeholder);
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Failed to start chat stream: {}", e);
                let failed = assembler.fail(e.display_message()).into_message();
                self.store.replace(failed.clone());
                return failed;
            }
        };

        let assembly = consume_into(assembler, stream, cancel, |snapshot| {
            self.store.replace(snapshot.clone());
        })
        .await;

        match assembly {
            Assembly::Completed(message) | Assembly::Failed(message) => message,
            Assembly::Cancelled(message) => self.stopped(&message.id),
        }
    }

    /// Finalize the in-flight message as stopped, unless a stop already did
    fn stopped(&self, id: &str) -> Message {
        self.store
            .update(id, |m| if m.is_pending() { m.into_stopped() } else { m })
            .unwrap_or_else(|| Message::failed(id, vsai_ai::STOPPED_NOTICE))
    }

    async fn save_history(&self) {
        let messages = self.store.messages();
        if messages.is_empty() {
            return;
        }
        if let Err(e) = self.history.replace(&self.config.account, &messages).await {
            tracing::error!("Failed to save chat history: {}", e);
        }
    }

    /// Speak `text` if speech output is available. Failures are logged, not returned.
    pub async fn speak(&self, text: &str) -> Option<SpeakOutcome> {
        let Some(speaker) = self.speaker.as_ref() else {
            tracing::debug!("Speech output unavailable");
            return None;
        };
        let outcome = speaker.speak(text, &CancellationToken::new()).await;
        if let SpeakOutcome::Failed(ref e) = outcome {
            tracing::warn!("Speech failed: {}", e);
        }
        Some(outcome)
    }

    /// Halt any speech in progress
    pub fn stop_speaking(&self) -> bool {
        self.speaker.as_ref().is_some_and(|s| s.stop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use crate::playback::{AudioFormat, testing::{FakeSynth, VirtualOutput}};
    use async_trait::async_trait;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use vsai_ai::{Citation, Fragment, ResponseEvent, ResponseStream, Role, STOPPED_NOTICE};

    enum Script {
        /// Emit these events, then close
        Events(Vec<ResponseEvent>),
        /// Emit these events, then never finish
        Hang(Vec<ResponseEvent>),
        /// Fail to start the stream
        Refuse,
    }

    #[derive(Default)]
    struct ScriptedChat {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedChat {
        fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatGenerator for ScriptedChat {
        async fn stream_chat(&self, request: &ChatRequest) -> vsai_ai::Result<ResponseStream> {
            self.requests.lock().push(request.clone());
            let script = self
                .scripts
                .lock()
                .pop_front()
                .unwrap_or(Script::Events(vec![]));
            match script {
                Script::Events(events) => Ok(Box::pin(futures::stream::iter(events))),
                Script::Hang(events) => Ok(Box::pin(
                    futures::stream::iter(events).chain(futures::stream::pending()),
                )),
                Script::Refuse => Err(vsai_ai::Error::api("UNAVAILABLE", "try later")),
            }
        }
    }

    #[derive(Default)]
    struct FakeImages {
        missing: bool,
        prompts: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl ImageGenerator for FakeImages {
        async fn generate_image(&self, prompt: &str) -> vsai_ai::Result<GeneratedImage> {
            self.prompts.lock().push((prompt.to_string(), None));
            if self.missing {
                return Err(vsai_ai::Error::MissingPayload("No image returned".into()));
            }
            Ok(GeneratedImage {
                text: "Here is your image.".into(),
                image: "data:image/png;base64,AAAA".into(),
            })
        }

        async fn edit_image(
            &self,
            prompt: &str,
            image_uri: &str,
        ) -> vsai_ai::Result<GeneratedImage> {
            self.prompts
                .lock()
                .push((prompt.to_string(), Some(image_uri.to_string())));
            Ok(GeneratedImage {
                text: "Here is the edited image.".into(),
                image: "data:image/png;base64,BBBB".into(),
            })
        }
    }

    struct FixedLanguage(&'static str);

    #[async_trait]
    impl LanguageDetector for FixedLanguage {
        async fn detect_language(&self, _text: &str) -> String {
            self.0.to_string()
        }
    }

    struct Fixture {
        session: ChatSession,
        chat: Arc<ScriptedChat>,
        images: Arc<FakeImages>,
        history: Arc<MemoryHistory>,
    }

    fn fixture_with(scripts: Vec<Script>, images: FakeImages) -> Fixture {
        let chat = Arc::new(ScriptedChat::new(scripts));
        let images = Arc::new(images);
        let history = Arc::new(MemoryHistory::new());
        let services = Services {
            chat: chat.clone(),
            images: images.clone(),
            language: Arc::new(FixedLanguage("fr-FR")),
        };
        let config = SessionConfig {
            account: "user@example.com".into(),
            personality: Personality::Professional,
            search_enabled: true,
        };
        Fixture {
            session: ChatSession::new(config, services, history.clone()),
            chat,
            images,
            history,
        }
    }

    fn fixture(scripts: Vec<Script>) -> Fixture {
        fixture_with(scripts, FakeImages::default())
    }

    fn text_events(texts: &[&str]) -> Vec<ResponseEvent> {
        texts
            .iter()
            .map(|t| ResponseEvent::Fragment(Fragment::text(*t)))
            .collect()
    }

    #[tokio::test]
    async fn test_text_turn_completes_and_saves() {
        let mut events = text_events(&["Bonjour", " !"]);
        events.push(ResponseEvent::Fragment(
            Fragment::text("").with_citations(vec![Citation::new("https://a", "A")]),
        ));
        let f = fixture(vec![Script::Events(events)]);

        let reply = f.session.send(UserInput::text("Salut"), false).await.unwrap();

        assert_eq!(reply.role, Role::Model);
        assert_eq!(reply.text, "Bonjour !");
        assert_eq!(reply.citations.len(), 1);
        assert_eq!(reply.language.as_deref(), Some("fr-FR"));
        assert!(reply.status.is_none());
        assert!(!f.session.is_running());

        let messages = f.session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Salut");
        assert_eq!(messages[1], reply);

        let saved = f.history.load("user@example.com").await.unwrap();
        assert_eq!(saved, messages);

        let requests = f.chat.requests.lock();
        assert!(requests[0].history.is_empty());
        assert!(requests[0].search_enabled);
        assert_eq!(requests[0].personality, Personality::Professional);
    }

    #[tokio::test]
    async fn test_history_excludes_current_turn() {
        let f = fixture(vec![
            Script::Events(text_events(&["one"])),
            Script::Events(text_events(&["two"])),
        ]);
        f.session.send(UserInput::text("first"), false).await.unwrap();
        f.session.send(UserInput::text("second"), false).await.unwrap();

        let requests = f.chat.requests.lock();
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[1].text, "one");
        assert_eq!(requests[1].input.text, "second");
    }

    #[tokio::test]
    async fn test_stream_error_becomes_error_message() {
        let mut events = text_events(&["partial"]);
        events.push(ResponseEvent::Error {
            message: "connection reset".into(),
        });
        let f = fixture(vec![Script::Events(events)]);

        let reply = f.session.send(UserInput::text("hi"), false).await.unwrap();
        assert!(reply.text.is_empty());
        assert!(reply.status.is_none());
        assert_eq!(reply.error.as_deref(), Some("Error: connection reset"));
        assert_eq!(f.history.load("user@example.com").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_refused_becomes_error_message() {
        let f = fixture(vec![Script::Refuse]);
        let reply = f.session.send(UserInput::text("hi"), false).await.unwrap();
        assert_eq!(reply.error.as_deref(), Some("Error: try later"));
        assert!(!f.session.is_running());
    }

    #[tokio::test]
    async fn test_image_generation_turn() {
        let f = fixture(vec![]);
        let reply = f
            .session
            .send(UserInput::text("Draw a lighthouse at dusk"), false)
            .await
            .unwrap();

        assert_eq!(reply.text, "Here is your image.");
        assert_eq!(reply.image.as_deref(), Some("data:image/png;base64,AAAA"));
        assert!(reply.status.is_none());
        assert!(f.chat.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_image_edit_turn() {
        let f = fixture(vec![]);
        let input = UserInput::with_image("remove the background", "data:image/jpeg;base64,/9j/");
        let reply = f.session.send(input, false).await.unwrap();

        assert_eq!(reply.text, "Here is the edited image.");
        let prompts = f.images.prompts.lock();
        assert_eq!(prompts[0].1.as_deref(), Some("data:image/jpeg;base64,/9j/"));
    }

    #[tokio::test]
    async fn test_missing_image_is_failure() {
        let f = fixture_with(
            vec![],
            FakeImages {
                missing: true,
                ..Default::default()
            },
        );
        let reply = f.session.send(UserInput::text("draw a cat"), false).await.unwrap();
        assert!(reply.image.is_none());
        assert!(reply.status.is_none());
        assert_eq!(reply.error.as_deref(), Some("Error: No image returned"));
    }

    #[tokio::test]
    async fn test_stop_keeps_partial_text() {
        let f = fixture(vec![Script::Hang(text_events(&["partial"]))]);
        let mut rx = f.session.subscribe();
        let handle = f.session.handle();

        let stopper = async {
            loop {
                if let Ok(StoreEvent::Replaced(m)) = rx.recv().await {
                    if m.text == "partial" {
                        assert!(matches!(
                            f.session.send(UserInput::text("again"), false).await,
                            Err(Error::Busy)
                        ));
                        handle.stop_generation();
                        break;
                    }
                }
            }
        };

        let (reply, _) = tokio::join!(f.session.send(UserInput::text("hi"), false), stopper);
        let reply = reply.unwrap();

        assert_eq!(reply.text, "partial");
        assert!(reply.status.is_none());
        assert!(reply.error.is_none());
        assert!(!handle.is_running());

        let saved = f.history.load("user@example.com").await.unwrap();
        assert_eq!(saved.last().unwrap(), &reply);
    }

    #[tokio::test]
    async fn test_stop_without_text_sets_notice() {
        let f = fixture(vec![Script::Hang(vec![])]);
        let handle = f.session.handle();
        let mut rx = f.session.subscribe();

        let stopper = async {
            // user message, then the placeholder
            let _ = rx.recv().await;
            let _ = rx.recv().await;
            handle.stop_generation()
        };

        let (reply, stopped) = tokio::join!(f.session.send(UserInput::text("hi"), false), stopper);
        let reply = reply.unwrap();

        assert_eq!(reply.error.as_deref(), Some(STOPPED_NOTICE));
        assert!(reply.status.is_none());
        assert_eq!(stopped.unwrap(), reply);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let f = fixture(vec![]);
        assert!(matches!(
            f.session.send(UserInput::text("   "), false).await,
            Err(Error::EmptyInput)
        ));
        assert!(f.session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_voice_turn_is_spoken() {
        let f = fixture(vec![Script::Events(text_events(&["First. ", "Second."]))]);
        let synth = Arc::new(FakeSynth::silence(0.2));
        let output = Arc::new(VirtualOutput::at(0.0));
        let speaker = Arc::new(Speaker::new(
            synth.clone(),
            output.clone(),
            AudioFormat::default(),
        ));
        let session = f.session.with_speaker(speaker.clone());

        session.send(UserInput::text("talk to me"), true).await.unwrap();

        assert_eq!(synth.requests(), vec!["First.", "Second."]);
        assert!(speaker.is_speaking());
        output.advance_to(1.0);
        assert!(!speaker.is_speaking());
    }

    #[tokio::test]
    async fn test_stopped_voice_turn_speaks_partial_text() {
        let f = fixture(vec![Script::Hang(text_events(&["Partial answer."]))]);
        let synth = Arc::new(FakeSynth::silence(0.2));
        let output = Arc::new(VirtualOutput::at(0.0));
        let speaker = Arc::new(Speaker::new(
            synth.clone(),
            output.clone(),
            AudioFormat::default(),
        ));
        let session = f.session.with_speaker(speaker.clone());
        let handle = session.handle();
        let mut rx = session.subscribe();

        let stopper = async {
            loop {
                if let Ok(StoreEvent::Replaced(m)) = rx.recv().await {
                    if !m.text.is_empty() {
                        handle.stop_generation();
                        break;
                    }
                }
            }
        };

        let (reply, _) = tokio::join!(session.send(UserInput::text("talk"), true), stopper);
        let reply = reply.unwrap();

        assert_eq!(reply.text, "Partial answer.");
        assert!(reply.error.is_none());
        assert_eq!(synth.requests(), vec!["Partial answer."]);
        assert!(speaker.is_speaking());
    }

    #[tokio::test]
    async fn test_stopped_voice_turn_without_text_is_silent() {
        let f = fixture(vec![Script::Hang(vec![])]);
        let synth = Arc::new(FakeSynth::silence(0.2));
        let output = Arc::new(VirtualOutput::at(0.0));
        let speaker = Arc::new(Speaker::new(
            synth.clone(),
            output.clone(),
            AudioFormat::default(),
        ));
        let session = f.session.with_speaker(speaker.clone());
        let handle = session.handle();
        let mut rx = session.subscribe();

        let stopper = async {
            let _ = rx.recv().await;
            let _ = rx.recv().await;
            handle.stop_generation();
        };

        let (reply, _) = tokio::join!(session.send(UserInput::text("talk"), true), stopper);

        assert_eq!(reply.unwrap().error.as_deref(), Some(STOPPED_NOTICE));
        assert!(synth.requests().is_empty());
        assert!(!speaker.is_speaking());
    }

    #[tokio::test]
    async fn test_load_and_clear_history() {
        let f = fixture(vec![]);
        let user = Message::user(&UserInput::text("old question"));
        let pending = Message::placeholder(MessageStatus::GeneratingText);
        f.history
            .replace("user@example.com", &[user.clone(), pending.clone()])
            .await
            .unwrap();

        assert_eq!(f.session.load_history().await.unwrap(), 2);
        let loaded = f.session.messages();
        assert_eq!(loaded[0], user);
        assert!(loaded[1].status.is_none());
        assert_eq!(loaded[1].error.as_deref(), Some(STOPPED_NOTICE));

        f.session.clear_history().await.unwrap();
        assert!(f.session.messages().is_empty());
        assert!(f.history.load("user@example.com").await.unwrap().is_empty());
    }
}
