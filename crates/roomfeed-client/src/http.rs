//! History over HTTP.
//!
//! `GET {base}/find/chat/list/{roomId}` returns the room's stored messages
//! as a JSON array, oldest first.

use async_trait::async_trait;
use reqwest::{Client, header::AUTHORIZATION};
use roomfeed_proto::{ChatRecord, RoomId};

use crate::{error::HistoryError, transport::HistoryStore};

/// History endpoint client.
#[derive(Debug, Clone)]
pub struct HttpHistoryStore {
    client: Client,
    base_url: String,
    bearer: Option<String>,
}

impl HttpHistoryStore {
    /// Store rooted at `base_url` (scheme, host and optional path prefix).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), bearer: None }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    fn url(&self, room_id: RoomId) -> String {
        format!("{}/find/chat/list/{room_id}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn fetch_history(&self, room_id: RoomId) -> Result<Vec<ChatRecord>, HistoryError> {
        let url = self.url(room_id);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|err| HistoryError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(HistoryError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|err| HistoryError::Request(err.to_string()))?;
        let records = ChatRecord::list_from_json(&body)?;
        tracing::debug!(%url, count = records.len(), "history fetched");
        Ok(records)
    }
}
