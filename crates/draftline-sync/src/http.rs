//! HTTP client for a remote draft service.
//!
//! Endpoints, relative to the base URL:
//!
//! - `POST   drafts`              body `{ "session_id", "snapshot" }` → `{ "id", ... }`
//! - `GET    drafts/{session_id}` → `{ "session_id", "snapshot", "saved_at" }`, 404 when absent
//! - `DELETE drafts/{session_id}` → 2xx, 404 counts as already deleted

use std::time::Duration;

use draftline_core::DraftSnapshot;
use reqwest::{StatusCode, Url};
use serde::Serialize;

use crate::gateway::{GatewayError, RemoteDraftGateway, RemoteDraftReceipt, RemoteDraftRecord};

#[derive(Serialize)]
struct SaveDraftBody<'a> {
    session_id: &'a str,
    snapshot: &'a DraftSnapshot,
}

pub struct HttpDraftGateway {
    client: reqwest::Client,
    base: Url,
}

impl HttpDraftGateway {
    /// `timeout` bounds each request; the scheduler adds none of its own.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base = Url::parse(base_url).map_err(|e| GatewayError::Endpoint(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::Endpoint(format!("{base_url} cannot be a base URL")));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn drafts_url(&self) -> Url {
        self.url_with(&["drafts"])
    }

    pub fn draft_url(&self, session_id: &str) -> Url {
        self.url_with(&["drafts", session_id])
    }

    fn url_with(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn rejection(resp: reqwest::Response) -> GatewayError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    GatewayError::Rejected { status, message }
}

fn transport(e: reqwest::Error) -> GatewayError {
    GatewayError::Transport(e.to_string())
}

#[async_trait::async_trait]
impl RemoteDraftGateway for HttpDraftGateway {
    async fn save_draft(
        &self,
        session_id: &str,
        snapshot: &DraftSnapshot,
    ) -> Result<RemoteDraftReceipt, GatewayError> {
        let resp = self
            .client
            .post(self.drafts_url())
            .json(&SaveDraftBody {
                session_id,
                snapshot,
            })
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        resp.json::<RemoteDraftReceipt>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn delete_draft(&self, session_id: &str) -> Result<(), GatewayError> {
        let resp = self
            .client
            .delete(self.draft_url(session_id))
            .send()
            .await
            .map_err(transport)?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(rejection(resp).await)
    }

    async fn load_draft(&self, session_id: &str) -> Result<Option<DraftSnapshot>, GatewayError> {
        let resp = self
            .client
            .get(self.draft_url(session_id))
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(rejection(resp).await);
        }
        let record = resp
            .json::<RemoteDraftRecord>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(Some(record.snapshot))
    }
}
