use anyhow::{anyhow, Context};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};

pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:3000";

/// Reply to every `/v1/checkpoint/*` operation.
#[derive(Debug, Deserialize)]
pub struct OperationReply {
    pub success: bool,
    pub strategy: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct NodeClient {
    base_url: String,
    client: Client,
}

impl NodeClient {
    pub fn new(url: &str) -> Self {
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn save(&self) -> anyhow::Result<OperationReply> {
        self.operation("save", None)
    }

    pub fn restore(&self) -> anyhow::Result<OperationReply> {
        self.operation("restore", None)
    }

    pub fn timer(&self, seconds: u32, periodic: bool) -> anyhow::Result<OperationReply> {
        self.operation("timer", Some(json!({ "seconds": seconds, "periodic": periodic })))
    }

    pub fn stop(&self) -> anyhow::Result<OperationReply> {
        self.operation("stop", None)
    }

    pub fn done(&self) -> anyhow::Result<OperationReply> {
        self.operation("done", None)
    }

    pub fn erase(&self) -> anyhow::Result<OperationReply> {
        self.operation("erase", None)
    }

    pub fn status(&self) -> anyhow::Result<Value> {
        let url = format!("{}/v1/status", self.base_url);
        let resp = self.client.get(&url).send().with_context(|| format!("node unreachable at {}", self.base_url))?;
        Ok(check(resp)?.json()?)
    }

    fn operation(&self, verb: &str, body: Option<Value>) -> anyhow::Result<OperationReply> {
        let url = format!("{}/v1/checkpoint/{}", self.base_url, verb);
        let mut req = self.client.post(&url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().with_context(|| format!("node unreachable at {}", self.base_url))?;
        Ok(check(resp)?.json()?)
    }
}

/// Turns a non-2xx reply into an error carrying the node's message.
fn check(resp: Response) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<Value>()
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| "no details".to_string());
    Err(anyhow!("{} ({})", message, status))
}
