use crate::overlay::event::{decode_batch, SafetyEvent, VideoId};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::time::Duration;

/// Data source for events and zones. Calls block; the engine runs them on
/// worker threads.
pub trait SafetyBackend: Send + Sync {
    fn fetch_events(&self, video_id: VideoId) -> Result<Vec<SafetyEvent>>;
    fn fetch_zone(&self, video_id: VideoId) -> Result<Vec<[f64; 2]>>;
    fn save_zone(&self, video_id: VideoId, points: &[[f64; 2]]) -> Result<()>;
    fn reprocess(&self, video_id: VideoId) -> Result<()>;
}

/// Dashboard REST API client.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("safety-overlay")
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl SafetyBackend for HttpBackend {
    fn fetch_events(&self, video_id: VideoId) -> Result<Vec<SafetyEvent>> {
        let url = self.url(&format!("videos/{video_id}/events"));
        self.client
            .get(&url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json::<Vec<serde_json::Value>>()
            .map(decode_batch)
            .with_context(|| format!("decode events for video {video_id}"))
    }

    fn fetch_zone(&self, video_id: VideoId) -> Result<Vec<[f64; 2]>> {
        let url = self.url("get_zone");
        let points = self
            .client
            .get(&url)
            .query(&[("video_id", video_id)])
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?
            .json::<Option<Vec<[f64; 2]>>>()
            .with_context(|| format!("decode zone for video {video_id}"))?;
        Ok(points.unwrap_or_default())
    }

    fn save_zone(&self, video_id: VideoId, points: &[[f64; 2]]) -> Result<()> {
        let url = self.url("update_zone");
        self.client
            .post(&url)
            .query(&[("video_id", video_id)])
            .json(points)
            .send()
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("save zone for video {video_id}"))?;
        Ok(())
    }

    fn reprocess(&self, video_id: VideoId) -> Result<()> {
        let url = self.url(&format!("videos/{video_id}/reprocess"));
        self.client
            .post(&url)
            .send()
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("reprocess video {video_id}"))?;
        Ok(())
    }
}
