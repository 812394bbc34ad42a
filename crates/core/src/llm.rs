use crate::error::LlmError;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Non-streaming chat reply, with the backend's timing counters passed
/// through for the client to display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub model: String,
    pub message: ChatMessage,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateReply {
    pub model: String,
    pub response: String,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Seam to the model backend. The HTTP layer holds this behind a trait
/// object so handler tests can substitute a fake.
#[async_trait]
pub trait ModelServer: Send + Sync {
    /// Idempotent: a model already known to the backend is left alone,
    /// otherwise it is created from `<name>.modelfile` in the models
    /// directory.
    async fn initialize_model(&self, name: &str) -> Result<(), LlmError>;

    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatReply, LlmError>;

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, LlmError>;

    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerateReply, LlmError>;

    async fn generate_stream(&self, model: &str, prompt: &str) -> Result<TokenStream, LlmError>;
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Debug, Deserialize)]
struct TaggedModel {
    name: String,
}

/// One NDJSON line of a streaming chat or generate response.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    content: String,
}

impl StreamChunk {
    fn token(&self) -> Option<String> {
        self.message
            .as_ref()
            .map(|message| message.content.clone())
            .or_else(|| self.response.clone())
    }
}

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    models_dir: PathBuf,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            models_dir: models_dir.into(),
        }
    }

    async fn post_json(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(format!("{}{endpoint}", self.base_url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                details,
            });
        }
        Ok(response)
    }

    async fn installed_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                details,
            });
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Response(error.to_string()))?;
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    /// Fans the response's NDJSON lines out as one token per line. Chunks
    /// from the wire can split mid-line, so bytes are buffered until a
    /// newline arrives.
    async fn stream_tokens(&self, response: reqwest::Response) -> TokenStream {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = Vec::new();

            'outer: while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(error) => {
                        let _ = tx.send(Err(LlmError::Http(error))).await;
                        break;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    let line = &line[..line.len() - 1];
                    if line.is_empty() {
                        continue;
                    }

                    let parsed: StreamChunk = match serde_json::from_slice(line) {
                        Ok(parsed) => parsed,
                        Err(error) => {
                            let _ = tx.send(Err(LlmError::Response(error.to_string()))).await;
                            break 'outer;
                        }
                    };

                    if let Some(error) = parsed.error {
                        let _ = tx.send(Err(LlmError::Response(error))).await;
                        break 'outer;
                    }
                    if let Some(token) = parsed.token() {
                        if !token.is_empty() && tx.send(Ok(token)).await.is_err() {
                            break 'outer;
                        }
                    }
                    if parsed.done {
                        break 'outer;
                    }
                }
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }
}

#[async_trait]
impl ModelServer for OllamaClient {
    async fn initialize_model(&self, name: &str) -> Result<(), LlmError> {
        if self
            .installed_models()
            .await?
            .iter()
            .any(|model| model == name)
        {
            tracing::info!(model = name, "model already initialized");
            return Ok(());
        }

        let modelfile_path = self.models_dir.join(format!("{name}.modelfile"));
        let modelfile = tokio::fs::read_to_string(&modelfile_path)
            .await
            .map_err(|_| LlmError::ModelfileMissing(modelfile_path.display().to_string()))?;

        self.post_json(
            "/api/create",
            &json!({ "model": name, "modelfile": modelfile }),
        )
        .await?;
        tracing::info!(model = name, "model created");
        Ok(())
    }

    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatReply, LlmError> {
        let response = self
            .post_json(
                "/api/chat",
                &json!({ "model": model, "messages": messages, "stream": false }),
            )
            .await?;

        response
            .json()
            .await
            .map_err(|error| LlmError::Response(error.to_string()))
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, LlmError> {
        let response = self
            .post_json(
                "/api/chat",
                &json!({ "model": model, "messages": messages, "stream": true }),
            )
            .await?;
        Ok(self.stream_tokens(response).await)
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<GenerateReply, LlmError> {
        let response = self
            .post_json(
                "/api/generate",
                &json!({ "model": model, "prompt": prompt, "stream": false }),
            )
            .await?;

        response
            .json()
            .await
            .map_err(|error| LlmError::Response(error.to_string()))
    }

    async fn generate_stream(&self, model: &str, prompt: &str) -> Result<TokenStream, LlmError> {
        let response = self
            .post_json(
                "/api/generate",
                &json!({ "model": model, "prompt": prompt, "stream": true }),
            )
            .await?;
        Ok(self.stream_tokens(response).await)
    }
}

/// Modelfile and GGUF stems under the models directory; these are the
/// models the server can offer for initialization.
pub fn list_local_models(models_dir: &Path) -> Result<Vec<String>, LlmError> {
    if !models_dir.exists() {
        return Ok(Vec::new());
    }

    let mut models = Vec::new();
    for entry in std::fs::read_dir(models_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if extension == "modelfile" || extension == "gguf" {
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                models.push(stem.to_string());
            }
        }
    }

    models.sort();
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_models_are_modelfile_and_gguf_stems() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("llama3.modelfile"), "FROM llama3").unwrap();
        std::fs::write(dir.path().join("tiny.gguf"), [0u8; 4]).unwrap();
        std::fs::write(dir.path().join("readme.txt"), "not a model").unwrap();

        let models = list_local_models(dir.path()).unwrap();
        assert_eq!(models, vec!["llama3", "tiny"]);
    }

    #[test]
    fn missing_models_dir_lists_nothing() {
        let dir = tempdir().unwrap();
        let models = list_local_models(&dir.path().join("absent")).unwrap();
        assert!(models.is_empty());
    }

    #[test]
    fn stream_chunks_carry_either_chat_or_generate_tokens() {
        let chat: StreamChunk =
            serde_json::from_str(r#"{"message":{"content":"Hi"},"done":false}"#).unwrap();
        assert_eq!(chat.token().as_deref(), Some("Hi"));

        let generate: StreamChunk =
            serde_json::from_str(r#"{"response":"there","done":true}"#).unwrap();
        assert_eq!(generate.token().as_deref(), Some("there"));
        assert!(generate.done);

        let failure: StreamChunk =
            serde_json::from_str(r#"{"error":"model not found"}"#).unwrap();
        assert_eq!(failure.error.as_deref(), Some("model not found"));
    }

    #[test]
    fn replies_tolerate_missing_timing_counters() {
        let reply: ChatReply = serde_json::from_str(
            r#"{"model":"llama3","message":{"role":"assistant","content":"Hello."}}"#,
        )
        .unwrap();

        assert_eq!(reply.message.content, "Hello.");
        assert!(reply.total_duration.is_none());
    }
}
