//! Google Generative AI (Gemini) API provider

use crate::{
    error::{Error, Result},
    models::ModelSet,
    providers::{
        ChatGenerator, DEFAULT_LANGUAGE, ImageGenerator, LanguageDetector, SpeechSynthesizer,
        SpeechTranscriber,
    },
    stream::{FinishReason, Fragment, ResponseEvent, ResponseStream},
    types::{ChatRequest, Citation, GeneratedImage, InlineImage, Message, Role},
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static LANGUAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Z]{2,4})?$").expect("language tag pattern is valid")
});

/// Google Generative AI client
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    models: ModelSet,
}

impl GoogleProvider {
    /// Create a new Google provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            models: ModelSet::default(),
        }
    }

    /// Use a different model set (base URL, chat/image/tts models, voice)
    pub fn with_models(mut self, models: ModelSet) -> Self {
        self.models = models;
        self
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!("{}?key={}", self.models.method_url(model, method), self.api_key)
    }

    /// One-shot `generateContent` call
    async fn generate_content(
        &self,
        model: &str,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse> {
        let response = self
            .client
            .post(self.url(model, "generateContent"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChatGenerator for GoogleProvider {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ResponseStream> {
        let body = build_chat_request(request)?;
        let url = format!(
            "{}&alt=sse",
            self.url(&self.models.chat, "streamGenerateContent")
        );

        tracing::debug!(
            model = %self.models.chat,
            history = request.history.len(),
            search = request.search_enabled,
            "Starting chat stream"
        );

        let request_builder = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source)))
    }
}

#[async_trait]
impl ImageGenerator for GoogleProvider {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(format!(
                    "Generate an image for: \"{}\"",
                    prompt
                ))],
            }],
            generation_config: Some(GeminiGenerationConfig::modalities(&["IMAGE"])),
            ..Default::default()
        };
        let response = self.generate_content(&self.models.image, &request).await?;
        extract_image(&response, "No image returned", "Here is your image.")
    }

    async fn edit_image(&self, prompt: &str, image_uri: &str) -> Result<GeneratedImage> {
        let source = InlineImage::from_data_uri(image_uri)?;
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: None,
                parts: vec![
                    GeminiPart::inline(&source),
                    GeminiPart::text(format!("Edit image: \"{}\"", prompt)),
                ],
            }],
            generation_config: Some(GeminiGenerationConfig::modalities(&["IMAGE"])),
            ..Default::default()
        };
        let response = self.generate_content(&self.models.image, &request).await?;
        extract_image(&response, "No edited image returned", "Here is the edited image.")
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleProvider {
    async fn synthesize(&self, text: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(text)],
            }],
            generation_config: Some(GeminiGenerationConfig {
                speech_config: Some(GeminiSpeechConfig {
                    voice_config: GeminiVoiceConfig {
                        prebuilt_voice_config: GeminiPrebuiltVoice {
                            voice_name: self.models.voice.clone(),
                        },
                    },
                }),
                ..GeminiGenerationConfig::modalities(&["AUDIO"])
            }),
            ..Default::default()
        };
        let response = self.generate_content(&self.models.tts, &request).await?;
        extract_audio(&response)
    }
}

#[async_trait]
impl SpeechTranscriber for GoogleProvider {
    async fn transcribe(&self, mime_type: &str, audio: &str) -> Result<String> {
        tracing::debug!(mime_type, bytes = audio.len(), "Transcribing recording");
        let request = transcription_request(mime_type, audio);
        let response = self.generate_content(&self.models.chat, &request).await?;
        extract_transcript(&response)
    }
}

#[async_trait]
impl LanguageDetector for GoogleProvider {
    async fn detect_language(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return DEFAULT_LANGUAGE.to_string();
        }

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(format!(
                    "Detect the language of this text and return only its BCP-47 code: \"{}\"",
                    text
                ))],
            }],
            generation_config: Some(GeminiGenerationConfig {
                temperature: Some(0.0),
                ..Default::default()
            }),
            ..Default::default()
        };

        match self.generate_content(&self.models.chat, &request).await {
            Ok(response) => sanitize_language(response.text().as_deref()),
            Err(e) => {
                tracing::debug!("Language detection failed, using {}: {}", DEFAULT_LANGUAGE, e);
                DEFAULT_LANGUAGE.to_string()
            }
        }
    }
}

fn transcription_request(mime_type: &str, audio: &str) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: None,
            parts: vec![
                GeminiPart::blob(mime_type, audio),
                GeminiPart::text(
                    "Transcribe this recording exactly as spoken, in its original language. \
                     Return only the transcript, or nothing if there is no speech.",
                ),
            ],
        }],
        generation_config: Some(GeminiGenerationConfig {
            temperature: Some(0.0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the streamed chat request body
fn build_chat_request(request: &ChatRequest) -> Result<GeminiRequest> {
    let mut contents: Vec<GeminiContent> =
        request.history.iter().filter_map(convert_message).collect();

    let mut parts = Vec::new();
    if let Some(ref image) = request.input.image {
        parts.push(GeminiPart::inline(&InlineImage::from_data_uri(image)?));
    }
    if !request.input.text.is_empty() || parts.is_empty() {
        parts.push(GeminiPart::text(request.input.text.clone()));
    }
    contents.push(GeminiContent {
        role: Some(Role::User.as_str().to_string()),
        parts,
    });

    let tools = request.search_enabled.then(|| {
        vec![GeminiTool {
            google_search: GeminiGoogleSearch {},
        }]
    });

    Ok(GeminiRequest {
        contents,
        system_instruction: Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(request.personality.system_instruction())],
        }),
        tools,
        generation_config: None,
    })
}

/// History turns are replayed as text only; pending and failed turns are dropped.
fn convert_message(msg: &Message) -> Option<GeminiContent> {
    if msg.is_pending() || msg.error.is_some() || msg.text.trim().is_empty() {
        return None;
    }
    Some(GeminiContent {
        role: Some(msg.role.as_str().to_string()),
        parts: vec![GeminiPart::text(msg.text.clone())],
    })
}

fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = ResponseEvent> {
    stream! {
        let mut finish_reason: Option<FinishReason> = None;

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data.is_empty() || msg.data == "[DONE]" {
                        continue;
                    }

                    match serde_json::from_str::<GeminiResponse>(&msg.data) {
                        Ok(response) => {
                            if let Some(reason) = response.block_reason() {
                                event_source.close();
                                yield ResponseEvent::Error {
                                    message: format!("Response blocked: {}", reason),
                                };
                                return;
                            }
                            if let Some(reason) = response.finish_reason() {
                                finish_reason = Some(FinishReason::from_api(reason));
                            }
                            if let Some(fragment) = fragment_from_chunk(&response) {
                                yield ResponseEvent::Fragment(fragment);
                            }
                        }
                        Err(e) => {
                            event_source.close();
                            let message = match serde_json::from_str::<GeminiErrorResponse>(&msg.data) {
                                Ok(error_response) => error_response.error.message,
                                Err(_) => format!("Failed to parse chunk: {}", e),
                            };
                            yield ResponseEvent::Error { message };
                            return;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    event_source.close();
                    break;
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    event_source.close();
                    let body = response.text().await.unwrap_or_default();
                    let message = match api_error(status, &body) {
                        Error::Api { message, .. } => message,
                        other => other.to_string(),
                    };
                    yield ResponseEvent::Error { message };
                    return;
                }
                Err(e) => {
                    event_source.close();
                    yield ResponseEvent::Error {
                        message: format!("SSE error: {}", e),
                    };
                    return;
                }
            }
        }

        yield ResponseEvent::Done { finish_reason };
    }
}

/// Text and grounding citations of the first candidate, or `None` for an empty chunk
fn fragment_from_chunk(response: &GeminiResponse) -> Option<Fragment> {
    let candidate = response.candidates.first()?;

    let text = candidate
        .content
        .as_ref()
        .map(|content| {
            content
                .parts
                .iter()
                .filter(|p| !p.thought.unwrap_or(false))
                .filter_map(|p| p.text.as_deref())
                .collect::<String>()
        })
        .unwrap_or_default();

    let citations: Vec<Citation> = candidate
        .grounding_metadata
        .as_ref()
        .map(|meta| {
            meta.grounding_chunks
                .iter()
                .filter_map(|chunk| chunk.web.as_ref())
                .map(|web| {
                    Citation::new(web.uri.clone(), web.title.clone().unwrap_or_default())
                })
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() && citations.is_empty() {
        return None;
    }

    Some(Fragment { text, citations })
}

fn extract_image(
    response: &GeminiResponse,
    missing: &str,
    default_caption: &str,
) -> Result<GeneratedImage> {
    let parts = response.first_parts();

    let image = parts
        .iter()
        .find_map(|p| p.inline_data.as_ref())
        .filter(|blob| !blob.data.is_empty())
        .ok_or_else(|| Error::MissingPayload(missing.to_string()))?;

    let caption = parts
        .iter()
        .find_map(|p| p.text.as_deref())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(default_caption);

    Ok(GeneratedImage {
        text: caption.to_string(),
        image: format!("data:{};base64,{}", image.mime_type, image.data),
    })
}

fn extract_audio(response: &GeminiResponse) -> Result<String> {
    response
        .first_parts()
        .first()
        .and_then(|p| p.inline_data.as_ref())
        .map(|blob| blob.data.clone())
        .filter(|data| !data.is_empty())
        .ok_or_else(|| Error::MissingPayload("No audio returned".to_string()))
}

fn extract_transcript(response: &GeminiResponse) -> Result<String> {
    response
        .text()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| Error::MissingPayload("No speech recognized".to_string()))
}

fn sanitize_language(answer: Option<&str>) -> String {
    match answer.map(str::trim) {
        Some(code) if LANGUAGE_TAG.is_match(code) => code.to_string(),
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> Error {
    match serde_json::from_str::<GeminiErrorResponse>(body) {
        Ok(parsed) => Error::api(
            parsed.error.status.unwrap_or_else(|| status.to_string()),
            parsed.error.message,
        ),
        Err(_) if body.trim().is_empty() => Error::api(
            status.to_string(),
            status.canonical_reason().unwrap_or("request failed"),
        ),
        Err(_) => Error::api(status.to_string(), body.trim()),
    }
}

// Request types

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiBlob,
    },
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        GeminiPart::Text { text: text.into() }
    }

    fn inline(image: &InlineImage) -> Self {
        Self::blob(&image.mime_type, &image.data)
    }

    fn blob(mime_type: &str, data: &str) -> Self {
        GeminiPart::InlineData {
            inline_data: GeminiBlob {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    google_search: GeminiGoogleSearch,
}

#[derive(Debug, Serialize)]
struct GeminiGoogleSearch {}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<GeminiSpeechConfig>,
}

impl GeminiGenerationConfig {
    fn modalities(modalities: &[&str]) -> Self {
        Self {
            response_modalities: Some(modalities.iter().map(|m| m.to_string()).collect()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiSpeechConfig {
    voice_config: GeminiVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiVoiceConfig {
    prebuilt_voice_config: GeminiPrebuiltVoice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPrebuiltVoice {
    voice_name: String,
}

// Response types

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

impl GeminiResponse {
    fn first_parts(&self) -> &[GeminiResponsePart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }

    fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }

    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    text: Option<String>,
    inline_data: Option<GeminiBlob>,
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiWebSource>,
}

#[derive(Debug, Deserialize)]
struct GeminiWebSource {
    uri: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageStatus, Personality, UserInput};

    fn request(input: UserInput, history: Vec<Message>, search: bool) -> ChatRequest {
        ChatRequest {
            history,
            input,
            personality: Personality::Humorous,
            search_enabled: search,
        }
    }

    #[test]
    fn test_chat_request_shape() {
        let mut answered = Message::placeholder(MessageStatus::GeneratingText);
        answered.status = None;
        answered.text = "Paris.".into();
        let history = vec![
            Message::user(&UserInput::text("Capital of France?")),
            answered,
            Message::failed("x", "Error: boom"),
        ];

        let body =
            build_chat_request(&request(UserInput::text("And Spain?"), history, true)).unwrap();
        let json = serde_json::to_value(&body).unwrap();

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3, "failed turn should not be replayed");
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "Paris.");
        assert_eq!(contents[2]["parts"][0]["text"], "And Spain?");
        assert_eq!(json["tools"][0]["googleSearch"], serde_json::json!({}));
        assert!(
            json["systemInstruction"]["parts"][0]["text"]
                .as_str()
                .unwrap()
                .contains("Witty and clever.")
        );
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_chat_request_inline_image_first() {
        let input = UserInput::with_image("What is this?", "data:image/jpeg;base64,/9j/4AAQ");
        let body = build_chat_request(&request(input, vec![], false)).unwrap();
        let json = serde_json::to_value(&body).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "/9j/4AAQ");
        assert_eq!(parts[1]["text"], "What is this?");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_chat_request_rejects_bad_image() {
        let input = UserInput::with_image("What is this?", "not-a-data-uri");
        assert!(matches!(
            build_chat_request(&request(input, vec![], false)),
            Err(Error::InvalidImage)
        ));
    }

    #[test]
    fn test_fragment_from_chunk_with_grounding() {
        let data = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello, "}, {"text": "world"}]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://a.example", "title": "A"}},
                    {"retrievedContext": {"uri": "ignored"}}
                ]}
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(data).unwrap();
        let fragment = fragment_from_chunk(&response).unwrap();
        assert_eq!(fragment.text, "Hello, world");
        assert_eq!(fragment.citations, vec![Citation::new("https://a.example", "A")]);
    }

    #[test]
    fn test_fragment_from_chunk_skips_empty_and_thoughts() {
        let data = r#"{"candidates": [{"content": {"parts": [{"text": "plan", "thought": true}]}}],
                      "usageMetadata": {"promptTokenCount": 4}}"#;
        let response: GeminiResponse = serde_json::from_str(data).unwrap();
        assert!(fragment_from_chunk(&response).is_none());

        let response: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(fragment_from_chunk(&response).is_none());
    }

    #[test]
    fn test_finish_and_block_reason() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "x"}]}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response.finish_reason(), Some("STOP"));
        assert!(response.block_reason().is_none());

        let blocked: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert_eq!(blocked.block_reason(), Some("SAFETY"));
    }

    #[test]
    fn test_extract_image_with_default_caption() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "iVBOR"}}
            ]}}]}"#,
        )
        .unwrap();
        let image = extract_image(&response, "No image returned", "Here is your image.").unwrap();
        assert_eq!(image.text, "Here is your image.");
        assert_eq!(image.image, "data:image/png;base64,iVBOR");
    }

    #[test]
    fn test_extract_image_missing_is_error() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "I cannot draw that."}]}}]}"#,
        )
        .unwrap();
        let err = extract_image(&response, "No edited image returned", "x").unwrap_err();
        assert_eq!(err.to_string(), "No edited image returned");
    }

    #[test]
    fn test_extract_audio() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAABAA=="}}
            ]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_audio(&response).unwrap(), "AAABAA==");

        let empty = GeminiResponse::default();
        assert!(matches!(extract_audio(&empty), Err(Error::MissingPayload(_))));
    }

    #[test]
    fn test_transcription_request_shape() {
        let json = serde_json::to_value(transcription_request("audio/wav", "UklGRg==")).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "audio/wav");
        assert_eq!(parts[0]["inlineData"]["data"], "UklGRg==");
        assert!(parts[1]["text"].as_str().unwrap().starts_with("Transcribe"));
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_extract_transcript() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "  what's the weather\n"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_transcript(&response).unwrap(), "what's the weather");

        let silent: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": " \n"}]}}]}"#,
        )
        .unwrap();
        let err = extract_transcript(&silent).unwrap_err();
        assert_eq!(err.display_message(), "Error: No speech recognized");
    }

    #[test]
    fn test_sanitize_language() {
        assert_eq!(sanitize_language(Some(" fr-FR\n")), "fr-FR");
        assert_eq!(sanitize_language(Some("de")), "de");
        assert_eq!(sanitize_language(Some("The language is French")), "en-US");
        assert_eq!(sanitize_language(None), "en-US");
    }

    #[test]
    fn test_api_error_parsing() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = api_error(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(
            err,
            Error::Api { ref status, ref message } if status == "RESOURCE_EXHAUSTED" && message == "Quota exceeded"
        ));

        let err = api_error(reqwest::StatusCode::BAD_GATEWAY, "");
        assert!(err.to_string().contains("Bad Gateway"));
    }
}
