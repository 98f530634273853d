// Remote generation service.
// The orchestrator only sees `GenerationService::submit` and a
// `PendingGeneration` it can check without blocking. The HTTP client below
// talks to a fal-style queue: submit, poll the status URL at a fixed interval,
// then fetch the result. That whole exchange runs on a worker thread and
// reports exactly one outcome through a channel.

use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Image snapshot + mask, submitted together.
#[derive(Clone)]
pub struct GenerationRequest {
    pub image: RgbaImage,
    pub mask: RgbaImage,
    pub sync_mode: bool,
}

/// Successful outcome: where the generated media lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationOutput {
    pub url: String,
}

pub type GenerationOutcome = Result<GenerationOutput>;

/// Handle to one in-flight request. Yields its outcome once.
pub struct PendingGeneration {
    rx: Receiver<GenerationOutcome>,
    finished: bool,
}

impl PendingGeneration {
    pub fn new(rx: Receiver<GenerationOutcome>) -> Self {
        Self { rx, finished: false }
    }

    /// Non-blocking check. `Some` exactly once; `None` while pending and after.
    pub fn try_outcome(&mut self) -> Option<GenerationOutcome> {
        if self.finished {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                Err(Error::request("generation worker stopped without a result"))
            }
        };
        self.finished = true;
        Some(outcome)
    }
}

pub trait GenerationService {
    fn submit(&mut self, request: GenerationRequest) -> Result<PendingGeneration>;
}

// ------------------------------ wire types ------------------------------

#[derive(Serialize, Debug)]
struct QueueInput {
    image_url: String,
    mask_image_url: String,
    sync_mode: bool,
}

#[derive(Deserialize, Debug)]
struct QueueTicket {
    request_id: String,
    #[serde(default)]
    status_url: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct QueueStatus {
    status: String,
}

#[derive(Deserialize, Debug)]
struct MediaRef {
    url: String,
}

#[derive(Deserialize, Debug)]
struct MediaPayload {
    #[serde(default)]
    image: Option<MediaRef>,
    #[serde(default)]
    video: Option<MediaRef>,
}

/// Encode an image as a `data:image/png;base64,...` URL.
pub fn png_data_url(img: &RgbaImage) -> Result<String> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| Error::ImageEncode(e.to_string()))?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(&bytes)))
}

/// Pull the single media URL out of a result payload.
pub fn parse_output(body: &str) -> GenerationOutcome {
    let payload: MediaPayload = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;
    payload
        .image
        .or(payload.video)
        .map(|m| m.url.trim().to_string())
        .filter(|url| !url.is_empty())
        .map(|url| GenerationOutput { url })
        .ok_or_else(|| Error::malformed("payload has no media url"))
}

// ------------------------------ HTTP client ------------------------------

#[derive(Clone, Debug)]
pub struct QueueSettings {
    pub endpoint: String,
    pub app_id: String,
    pub key: Option<String>,
    pub poll_interval: Duration,
}

/// fal-style queue client.
pub struct QueueService {
    settings: QueueSettings,
    agent: ureq::Agent,
}

impl QueueService {
    pub fn new(settings: QueueSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(120))
            .timeout_write(Duration::from_secs(60))
            .build();
        Self { settings, agent }
    }

    fn submit_url(&self) -> String {
        format!("{}/{}", self.settings.endpoint.trim_end_matches('/'), self.settings.app_id)
    }
}

impl GenerationService for QueueService {
    fn submit(&mut self, request: GenerationRequest) -> Result<PendingGeneration> {
        let input = QueueInput {
            image_url: png_data_url(&request.image)?,
            mask_image_url: png_data_url(&request.mask)?,
            sync_mode: request.sync_mode,
        };
        let job = QueueJob {
            agent: self.agent.clone(),
            submit_url: self.submit_url(),
            key: self.settings.key.clone(),
            poll_interval: self.settings.poll_interval,
        };

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("generation".into())
            .spawn(move || {
                let outcome = job.run(&input);
                if let Err(err) = &outcome {
                    tracing::error!(error = %err, "generation job failed");
                }
                // receiver may be gone if the request was abandoned
                let _ = tx.send(outcome);
            })
            .map_err(|e| Error::request(format!("spawn generation worker: {e}")))?;

        Ok(PendingGeneration::new(rx))
    }
}

struct QueueJob {
    agent: ureq::Agent,
    submit_url: String,
    key: Option<String>,
    poll_interval: Duration,
}

impl QueueJob {
    fn run(&self, input: &QueueInput) -> GenerationOutcome {
        // 1) enqueue
        let body = read_body(
            self.authorize(self.agent.post(&self.submit_url))
                .set("Content-Type", "application/json")
                .send_json(input),
        )?;
        let ticket: QueueTicket = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(format!("queue ticket: {e}")))?;
        tracing::info!(request_id = %ticket.request_id, "generation queued");

        let base = format!("{}/requests/{}", self.submit_url, ticket.request_id);
        let status_url = ticket.status_url.unwrap_or_else(|| format!("{base}/status"));
        let response_url = ticket.response_url.unwrap_or(base);

        // 2) poll until terminal
        loop {
            thread::sleep(self.poll_interval);
            let body = read_body(self.authorize(self.agent.get(&status_url)).call())?;
            let status: QueueStatus = serde_json::from_str(&body)
                .map_err(|e| Error::malformed(format!("queue status: {e}")))?;
            tracing::debug!(request_id = %ticket.request_id, status = %status.status, "generation status");
            match status.status.as_str() {
                "IN_QUEUE" | "IN_PROGRESS" => continue,
                "COMPLETED" => break,
                other => return Err(Error::request(format!("job ended with status {other}"))),
            }
        }

        // 3) fetch result
        let body = read_body(self.authorize(self.agent.get(&response_url)).call())?;
        let output = parse_output(&body)?;
        tracing::info!(request_id = %ticket.request_id, url = %output.url, "generation completed");
        Ok(output)
    }

    fn authorize(&self, req: ureq::Request) -> ureq::Request {
        match &self.key {
            Some(key) => req.set("Authorization", &format!("Key {key}")),
            None => req,
        }
    }
}

fn read_body(response: std::result::Result<ureq::Response, ureq::Error>) -> Result<String> {
    match response {
        Ok(resp) => resp
            .into_string()
            .map_err(|e| Error::request(format!("read response: {e}"))),
        Err(ureq::Error::Status(code, resp)) => {
            let text = resp.into_string().unwrap_or_default();
            Err(Error::status(code, text))
        }
        Err(err) => Err(Error::request(err.to_string())),
    }
}
