//! Клиент REST API Gemini и Veo
//!
//! Сценарий и речь идут через `models/{model}:generateContent`,
//! видео через `models/{model}:predictLongRunning` с последующим опросом
//! операции. Ключ передается заголовком `x-goog-api-key`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::ai::{GenerativeService, OperationHandle, OperationStatus, ReferenceImage, VideoRequest};
use crate::config::ClipSyncConfig;
use crate::error::{ClipSyncError, Result};
use crate::script::ScriptBeat;

const API_KEY_HEADER: &str = "x-goog-api-key";

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"^```(?:json)?\s*|\s*```\s*$").unwrap();
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<ApiErrorBody>,
    response: Option<Value>,
}

impl GenerateContentResponse {
    fn first_part(&self) -> Option<&Part> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
    }
}

/// Клиент Gemini/Veo
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    script_model: String,
    speech_model: String,
    video_model: String,
}

impl GeminiClient {
    pub fn new(config: &ClipSyncConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            error!("Gemini API key is empty");
            return Err(ClipSyncError::MissingCredential("API key is not configured".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            script_model: config.script_model.clone(),
            speech_model: config.speech_model.clone(),
            video_model: config.video_model.clone(),
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Response> {
        debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<GenerateContentResponse> {
        let response = self.post_json(&self.model_url(model, "generateContent"), body).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl GenerativeService for GeminiClient {
    async fn generate_script(
        &self,
        topic: &str,
        emotion_goal: &str,
        keywords: &str,
        target_seconds: u32,
    ) -> Result<Vec<ScriptBeat>> {
        info!("Generating script for topic '{}'", topic);
        let body = script_request_body(topic, emotion_goal, keywords, target_seconds);
        let response = self.generate_content(&self.script_model, &body).await?;
        let text = response.first_part().and_then(|p| p.text.as_deref()).unwrap_or("[]");
        let beats = parse_script_text(text);
        info!("Script generated with {} beats", beats.len());
        Ok(beats)
    }

    async fn generate_speech(&self, text: &str, voice_name: &str) -> Result<String> {
        debug!("Synthesizing {} chars with voice {}", text.chars().count(), voice_name);
        let body = speech_request_body(text, voice_name);
        let response = self.generate_content(&self.speech_model, &body).await?;
        Ok(response
            .first_part()
            .and_then(|p| p.inline_data.as_ref())
            .map(|d| d.data.clone())
            .unwrap_or_default())
    }

    async fn generate_video(
        &self,
        request: &VideoRequest,
        reference: Option<&ReferenceImage>,
    ) -> Result<OperationHandle> {
        info!(
            "Submitting video generation ({}, {}, reference image: {})",
            request.aspect_ratio,
            request.resolution,
            reference.is_some()
        );
        let body = video_request_body(request, reference);
        let response = self
            .post_json(&self.model_url(&self.video_model, "predictLongRunning"), &body)
            .await?;
        let operation: OperationResponse = response.json().await?;
        let name = operation
            .name
            .ok_or_else(|| ClipSyncError::Upstream("Video operation has no name".to_string()))?;
        debug!("Video operation started: {}", name);
        Ok(OperationHandle { name })
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let url = format!("{}/{}", self.base_url, handle.name);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let operation: OperationResponse = check_status(response).await?.json().await?;
        Ok(operation_status(operation))
    }

    async fn download(&self, uri: &str) -> Result<Bytes> {
        info!("Downloading generated video");
        let response = self
            .client
            .get(uri)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes)
    }
}

/// Перевести неуспешный ответ в ошибку библиотеки
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("Failed to read error response: {}", e));
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or(body);
    error!("API error (status {}): {}", status, message);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClipSyncError::MissingCredential(message)),
        _ => Err(ClipSyncError::from_upstream(message)),
    }
}

fn script_request_body(topic: &str, emotion_goal: &str, keywords: &str, target_seconds: u32) -> Value {
    let prompt = format!(
        "Write a viral short-video script about: \"{topic}\".\n\
         Emotional arc: \"{emotion_goal}\".\n\
         SEO keywords: \"{keywords}\".\n\
         Return a JSON array of objects {{ type: \"HOOK\" | \"BODY\" | \"PAYOFF\" | \"CTA\", content: string, duration: number }}.\n\
         Total duration around {target_seconds} seconds. Language: Vietnamese."
    );
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "type": { "type": "STRING", "enum": ["HOOK", "BODY", "PAYOFF", "CTA"] },
                        "content": { "type": "STRING" },
                        "duration": { "type": "NUMBER" }
                    },
                    "required": ["type", "content", "duration"]
                }
            }
        }
    })
}

fn speech_request_body(text: &str, voice_name: &str) -> Value {
    json!({
        "contents": [{
            "parts": [{
                "text": format!("Read the following text naturally, expressively and in a consistent tone: {}", text)
            }]
        }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice_name } }
            }
        }
    })
}

fn video_request_body(request: &VideoRequest, reference: Option<&ReferenceImage>) -> Value {
    let mut instance = json!({ "prompt": request.prompt });
    if let Some(image) = reference {
        instance["image"] = json!({
            "bytesBase64Encoded": image.data,
            "mimeType": image.mime_type,
        });
    }

    let mut parameters = json!({
        "sampleCount": 1,
        "aspectRatio": request.aspect_ratio,
        "resolution": request.resolution,
    });
    if let Some(negative) = request.negative_prompt.as_deref().filter(|n| !n.trim().is_empty()) {
        parameters["negativePrompt"] = json!(negative);
    }

    json!({ "instances": [instance], "parameters": parameters })
}

/// Разобрать ответ модели со сценарием. Некорректный JSON дает пустой вектор.
fn parse_script_text(text: &str) -> Vec<ScriptBeat> {
    let cleaned = CODE_FENCE.replace_all(text.trim(), "");
    match serde_json::from_str::<Vec<ScriptBeat>>(&cleaned) {
        Ok(beats) => beats,
        Err(e) => {
            warn!("Failed to parse script JSON: {}", e);
            Vec::new()
        }
    }
}

fn operation_status(operation: OperationResponse) -> OperationStatus {
    if let Some(error) = operation.error {
        return OperationStatus::failed(error.message.unwrap_or_else(|| "Video generation failed".to_string()));
    }
    let result_uri = operation.response.as_ref().and_then(|response| {
        ["/generateVideoResponse/generatedSamples/0/video/uri", "/generatedVideos/0/video/uri"]
            .iter()
            .find_map(|pointer| response.pointer(pointer).and_then(Value::as_str))
            .map(str::to_string)
    });
    OperationStatus {
        done: operation.done,
        error: None,
        result_uri,
    }
}
