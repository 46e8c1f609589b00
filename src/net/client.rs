use crate::memory::fit::FitStrategy;
use crate::net::server::{AddedBody, ErrorBody, StrategyBody};
use crate::sched::{
    process::ProcessSpec,
    simulation::{DefragReport, TickReport},
    snapshot::Snapshot,
};
use anyhow::{Result, bail};
use reqwest::{Client, Response};
use serde::{Serialize, de::DeserializeOwned};

/// Typed HTTP client for a running `memsim server`.
pub struct SimClient {
    http: Client,
    base_url: String,
}

impl SimClient {
    pub fn new(base_url: &str) -> Self {
        SimClient {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').into(),
        }
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        let url = format!("{}/snapshot", self.base_url);
        let resp = self.http.get(&url).send().await?;
        decode(resp).await
    }

    pub async fn add_process(&self, spec: &ProcessSpec) -> Result<u64> {
        let added: AddedBody = self.post("/processes", Some(spec)).await?;
        Ok(added.id)
    }

    pub async fn tick(&self) -> Result<TickReport> {
        self.post::<(), _>("/tick", None).await
    }

    pub async fn start(&self) -> Result<Snapshot> {
        self.post::<(), _>("/start", None).await
    }

    pub async fn stop(&self) -> Result<Snapshot> {
        self.post::<(), _>("/stop", None).await
    }

    pub async fn set_strategy(&self, strategy: FitStrategy) -> Result<Snapshot> {
        self.post("/strategy", Some(&StrategyBody { strategy })).await
    }

    pub async fn defragment(&self) -> Result<DefragReport> {
        self.post::<(), _>("/defragment", None).await
    }

    pub async fn reset(&self) -> Result<Snapshot> {
        self.post::<(), _>("/reset", None).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: Option<&B>) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.post(&url);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        decode(resp).await
    }
}

/// Turn error bodies into readable errors instead of bare status codes.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => bail!("{} ({})", body.error, status),
        Err(_) => bail!("{} ({})", text, status),
    }
}
