//! History stores: JSON files on disk, or the chat-history REST service

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use vsai_ai::Message;
use vsai_chat::{Error, HistoryStore, Result};

/// On-disk record for one account
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryFile {
    account: String,
    updated_at: i64,
    history: Vec<Message>,
}

/// One JSON file per account under the local data directory
pub struct LocalHistory {
    dir: PathBuf,
}

impl LocalHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the default history directory
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vsai")
            .join("history")
    }

    fn path_for(&self, account: &str) -> PathBuf {
        let name: String = account
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

fn io_error(e: std::io::Error) -> Error {
    Error::History(e.to_string())
}

#[async_trait]
impl HistoryStore for LocalHistory {
    async fn load(&self, account: &str) -> Result<Vec<Message>> {
        let path = self.path_for(account);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(e)),
        };
        let file: HistoryFile = serde_json::from_str(&content)
            .map_err(|e| Error::History(format!("{}: {}", path.display(), e)))?;
        Ok(file.history)
    }

    async fn replace(&self, account: &str, messages: &[Message]) -> Result<()> {
        fs::create_dir_all(&self.dir).await.map_err(io_error)?;

        let file = HistoryFile {
            account: account.to_string(),
            updated_at: chrono::Utc::now().timestamp_millis(),
            history: messages.to_vec(),
        };
        let content =
            serde_json::to_string_pretty(&file).map_err(|e| Error::History(e.to_string()))?;

        // Write then rename so a crash never leaves a truncated file
        let path = self.path_for(account);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await.map_err(io_error)?;
        fs::rename(&tmp, &path).await.map_err(io_error)?;
        Ok(())
    }

    async fn clear(&self, account: &str) -> Result<()> {
        match fs::remove_file(self.path_for(account)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(e)),
        }
    }
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    email: &'a str,
    history: &'a [Message],
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<Message>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: Option<String>,
}

/// Client for the chat-history REST service
pub struct RemoteHistory {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteHistory {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn account_url(&self, account: &str) -> String {
        format!(
            "{}/chat-history/{}",
            self.base_url,
            urlencoding::encode(account)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::History(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "An unexpected error occurred".to_string());
        tracing::debug!(%status, "History request failed");
        Err(Error::History(message))
    }
}

#[async_trait]
impl HistoryStore for RemoteHistory {
    async fn load(&self, account: &str) -> Result<Vec<Message>> {
        let response = self.send(self.client.get(self.account_url(account))).await?;
        let body: HistoryResponse = response
            .json()
            .await
            .map_err(|e| Error::History(e.to_string()))?;
        Ok(body.history)
    }

    async fn replace(&self, account: &str, messages: &[Message]) -> Result<()> {
        let body = SaveRequest {
            email: account,
            history: messages,
        };
        let url = format!("{}/chat-history", self.base_url);
        self.send(self.client.post(url).json(&body)).await?;
        Ok(())
    }

    async fn clear(&self, account: &str) -> Result<()> {
        self.send(self.client.delete(self.account_url(account)))
            .await?;
        Ok(())
    }
}
