//! Replicate-hosted flux-fill inpainting engine
//!
//! The canvas and matte are uploaded through the files API under unique names,
//! a prediction is created with `Prefer: wait`, and the prediction is polled
//! if the synchronous window closes before it finishes. Uploaded files are
//! deleted whether or not the prediction succeeds.

use crate::{
    error::{Result, ThumbnailError},
    inpainting::{InpaintRequest, InpaintingEngine},
    tracing_config::spans,
};
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Connection settings for the Replicate API
#[derive(Clone)]
pub struct ReplicateConfig {
    api_token: String,
    /// API root, without trailing slash
    pub base_url: String,
    /// Model in `owner/name` form
    pub model: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Polls before giving up on a prediction
    pub max_polls: u32,
}

impl ReplicateConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.replicate.com/v1";
    pub const DEFAULT_MODEL: &'static str = "black-forest-labs/flux-fill-pro";
    pub const TOKEN_VAR: &'static str = "REPLICATE_API_TOKEN";
    pub const BASE_URL_VAR: &'static str = "REPLICATE_API_BASE";

    #[must_use]
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        }
    }

    /// Read the token and optional base URL from the environment
    ///
    /// # Errors
    /// - `REPLICATE_API_TOKEN` is unset or blank
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    ///
    /// # Errors
    /// - The token variable is missing or blank
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(Self::TOKEN_VAR)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ThumbnailError::invalid_config(format!(
                    "{} environment variable is required",
                    Self::TOKEN_VAR
                ))
            })?;

        let mut config = Self::new(token);
        if let Some(base) = lookup(Self::BASE_URL_VAR).filter(|b| !b.trim().is_empty()) {
            config = config.with_base_url(base);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// # Errors
    /// - Blank token, model not in `owner/name` form, zero polls
    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(ThumbnailError::invalid_config("Replicate API token is empty"));
        }
        match self.model.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {},
            _ => {
                return Err(ThumbnailError::invalid_config(format!(
                    "Model '{}' must be in owner/name form",
                    self.model
                )))
            },
        }
        if self.max_polls == 0 {
            return Err(ThumbnailError::config_value_error(
                "max polls",
                self.max_polls,
                ">= 1",
                Some(150),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReplicateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicateConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
    urls: FileUrls,
}

#[derive(Debug, Deserialize)]
struct FileUrls {
    get: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Value,
}

/// Inpainting engine backed by Replicate
#[derive(Debug, Clone)]
pub struct ReplicateEngine {
    config: ReplicateConfig,
    client: reqwest::Client,
}

impl ReplicateEngine {
    /// # Errors
    /// - Invalid configuration
    /// - The HTTP client could not be constructed
    pub fn new(config: ReplicateConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ThumbnailError::invalid_config(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { config, client })
    }

    #[must_use]
    pub fn config(&self) -> &ReplicateConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// Turn a non-success response into an engine error carrying the body
    async fn check_status(operation: &str, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ThumbnailError::engine(format!(
            "{} returned {}: {}",
            operation,
            status,
            body.trim()
        )))
    }

    async fn upload(&self, label: &str, png: &[u8]) -> Result<UploadedFile> {
        let file_name = format!("{}-{}.png", label, Uuid::new_v4());
        let part = multipart::Part::bytes(png.to_vec())
            .file_name(file_name.clone())
            .mime_str("image/png")
            .map_err(|e| ThumbnailError::engine_http_error("Build upload part", &e))?;
        let form = multipart::Form::new().part("content", part);

        let response = self
            .client
            .post(self.endpoint("files"))
            .bearer_auth(&self.config.api_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ThumbnailError::engine_http_error("Upload", &e))?;

        let uploaded: UploadedFile = Self::check_status("Upload", response)
            .await?
            .json()
            .await
            .map_err(|e| ThumbnailError::engine_http_error("Parse upload response", &e))?;
        debug!(file = %file_name, id = %uploaded.id, bytes = png.len(), "Uploaded {}", label);
        Ok(uploaded)
    }

    /// Best-effort removal of an uploaded file
    async fn delete(&self, file: &UploadedFile) {
        let result = self
            .client
            .delete(self.endpoint(&format!("files/{}", file.id)))
            .bearer_auth(&self.config.api_token)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                debug!(id = %file.id, "Deleted uploaded file");
            },
            Ok(response) => warn!(id = %file.id, status = %response.status(), "Failed to delete uploaded file"),
            Err(e) => warn!(id = %file.id, error = %e, "Failed to delete uploaded file"),
        }
    }

    fn prediction_input(request: &InpaintRequest, image_url: &str, mask_url: &str) -> Value {
        json!({
            "input": {
                "image": image_url,
                "mask": mask_url,
                "prompt": request.prompt,
                "guidance": request.parameters.guidance,
                "output_format": request.parameters.output_format,
                "safety_tolerance": request.parameters.safety_tolerance,
                "num_outputs": 1
            }
        })
    }

    async fn create_prediction(&self, body: &Value) -> Result<Prediction> {
        let response = self
            .client
            .post(self.endpoint(&format!("models/{}/predictions", self.config.model)))
            .bearer_auth(&self.config.api_token)
            .header("Prefer", "wait")
            .json(body)
            .send()
            .await
            .map_err(|e| ThumbnailError::engine_http_error("Create prediction", &e))?;

        Self::check_status("Create prediction", response)
            .await?
            .json()
            .await
            .map_err(|e| ThumbnailError::engine_http_error("Parse prediction", &e))
    }

    async fn poll_prediction(&self, mut prediction: Prediction) -> Result<Prediction> {
        let mut polls = 0;
        while !prediction.status.is_terminal() {
            if polls >= self.config.max_polls {
                return Err(ThumbnailError::engine(format!(
                    "Prediction {} still {:?} after {} polls",
                    prediction.id, prediction.status, polls
                )));
            }
            tokio::time::sleep(self.config.poll_interval).await;
            polls += 1;

            let response = self
                .client
                .get(self.endpoint(&format!("predictions/{}", prediction.id)))
                .bearer_auth(&self.config.api_token)
                .send()
                .await
                .map_err(|e| ThumbnailError::engine_http_error("Poll prediction", &e))?;
            prediction = Self::check_status("Poll prediction", response)
                .await?
                .json()
                .await
                .map_err(|e| ThumbnailError::engine_http_error("Parse prediction", &e))?;
            debug!(id = %prediction.id, status = ?prediction.status, polls, "Polled prediction");
        }
        Ok(prediction)
    }

    async fn predict(
        &self,
        request: &InpaintRequest,
        image: &UploadedFile,
        mask: &UploadedFile,
    ) -> Result<Vec<String>> {
        let body = Self::prediction_input(request, &image.urls.get, &mask.urls.get);
        let prediction = self.create_prediction(&body).await?;
        info!(id = %prediction.id, status = ?prediction.status, "Prediction created");

        let prediction = self.poll_prediction(prediction).await?;
        match prediction.status {
            PredictionStatus::Succeeded => Self::parse_output(&prediction.output),
            status => Err(ThumbnailError::engine(format!(
                "Prediction {} {:?}: {}",
                prediction.id,
                status,
                match &prediction.error {
                    Value::Null => "no error detail".to_string(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }
            ))),
        }
    }

    /// Extract result URLs from a prediction's `output` field
    ///
    /// The model returns either a single URL or a list of URLs.
    fn parse_output(output: &Value) -> Result<Vec<String>> {
        let urls: Vec<String> = match output {
            Value::String(url) => vec![url.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };
        let urls: Vec<String> = urls.into_iter().filter(|u| !u.trim().is_empty()).collect();
        if urls.is_empty() {
            return Err(ThumbnailError::engine(format!(
                "Prediction output contained no image URL: {}",
                output
            )));
        }
        Ok(urls)
    }

    /// Upload both inputs, predict, and delete whatever was uploaded
    async fn generate_with_cleanup(&self, request: &InpaintRequest) -> Result<Vec<String>> {
        let image = self.upload("canvas", &request.canvas_png).await?;
        let mask = match self.upload("mask", &request.mask_png).await {
            Ok(mask) => mask,
            Err(e) => {
                self.delete(&image).await;
                return Err(e);
            },
        };

        let result = self.predict(request, &image, &mask).await;
        self.delete(&image).await;
        self.delete(&mask).await;
        result
    }
}

#[async_trait]
impl InpaintingEngine for ReplicateEngine {
    async fn generate(&self, request: &InpaintRequest) -> Result<Vec<String>> {
        self.generate_with_cleanup(request)
            .instrument(spans::prediction("replicate", &self.config.model))
            .await
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationParameters;
    use std::collections::{HashMap, HashSet};
    use wiremock::{
        matchers::{header, method, path, path_regex},
        Mock, MockServer, Request, ResponseTemplate,
    };

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn request() -> InpaintRequest {
        InpaintRequest {
            canvas_png: vec![1, 2, 3],
            mask_png: vec![4, 5],
            prompt: "Product photography of a cap".to_string(),
            parameters: GenerationParameters::default(),
        }
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ReplicateConfig::from_lookup(lookup(&[
            ("REPLICATE_API_TOKEN", " r8_secret "),
            ("REPLICATE_API_BASE", "http://localhost:5000/v1/"),
        ]))
        .unwrap();
        assert_eq!(config.api_token, "r8_secret");
        assert_eq!(config.base_url, "http://localhost:5000/v1");
        assert_eq!(config.model, ReplicateConfig::DEFAULT_MODEL);

        let missing = ReplicateConfig::from_lookup(lookup(&[("REPLICATE_API_TOKEN", "  ")]));
        assert!(matches!(missing, Err(ThumbnailError::InvalidConfig(m)) if m.contains("REPLICATE_API_TOKEN")));
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let debug = format!("{:?}", ReplicateConfig::new("r8_topsecret"));
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_config_validation() {
        assert!(ReplicateConfig::new("t").validate().is_ok());
        assert!(ReplicateConfig::new("t").with_model("flux").validate().is_err());
        assert!(ReplicateConfig::new("t").with_model("a/b/c").validate().is_err());
        assert!(ReplicateConfig::new("t")
            .with_polling(Duration::from_millis(1), 0)
            .validate()
            .is_err());
        assert!(ReplicateEngine::new(ReplicateConfig::new("")).is_err());
    }

    #[test]
    fn test_prediction_input_fields() {
        let body = ReplicateEngine::prediction_input(&request(), "https://f/img", "https://f/mask");
        let input = &body["input"];
        assert_eq!(input["image"], "https://f/img");
        assert_eq!(input["mask"], "https://f/mask");
        assert_eq!(input["prompt"], "Product photography of a cap");
        assert_eq!(input["guidance"], 30.0);
        assert_eq!(input["output_format"], "png");
        assert_eq!(input["safety_tolerance"], 2);
        assert_eq!(input["num_outputs"], 1);
    }

    #[test]
    fn test_parse_output_shapes() {
        assert_eq!(
            ReplicateEngine::parse_output(&json!("https://r/out.png")).unwrap(),
            vec!["https://r/out.png"]
        );
        assert_eq!(
            ReplicateEngine::parse_output(&json!(["https://r/0.png", "https://r/1.png"])).unwrap(),
            vec!["https://r/0.png", "https://r/1.png"]
        );
        for empty in [json!([]), json!(null), json!([""]), json!({"url": 1}), json!([42])] {
            assert!(matches!(
                ReplicateEngine::parse_output(&empty),
                Err(ThumbnailError::Engine(_))
            ));
        }
    }

    #[test]
    fn test_prediction_deserialization() {
        let prediction: Prediction = serde_json::from_value(json!({
            "id": "abc",
            "status": "processing",
            "urls": {"get": "https://api/predictions/abc"}
        }))
        .unwrap();
        assert_eq!(prediction.status, PredictionStatus::Processing);
        assert!(prediction.output.is_null());
        assert!(!prediction.status.is_terminal());

        let prediction: Prediction =
            serde_json::from_value(json!({"id": "abc", "status": "queued_elsewhere"})).unwrap();
        assert_eq!(prediction.status, PredictionStatus::Unknown);
        assert!(PredictionStatus::Canceled.is_terminal());
        assert!(!PredictionStatus::Starting.is_terminal());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_engine_error() {
        let config = ReplicateConfig::new("t")
            .with_base_url("http://127.0.0.1:9/v1")
            .with_request_timeout(Duration::from_millis(500));
        let engine = ReplicateEngine::new(config).unwrap();
        let result = engine.generate(&request()).await;
        assert!(matches!(result, Err(ThumbnailError::Engine(_))));
    }

    const RESULT_URL: &str = "https://delivery.test/out-0.png";

    fn uploaded_file_name(request: &Request) -> Option<String> {
        let body = String::from_utf8_lossy(&request.body);
        let start = body.find("filename=\"")? + "filename=\"".len();
        let end = body[start..].find('"')? + start;
        Some(body[start..end].to_string())
    }

    /// Files API that ids each upload by its label, optionally rejecting masks
    async fn files_api(reject_mask: bool) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(move |request: &Request| {
                let name = uploaded_file_name(request).unwrap_or_default();
                let label = name.split('-').next().unwrap_or_default().to_string();
                if reject_mask && label == "mask" {
                    return ResponseTemplate::new(500).set_body_string("storage unavailable");
                }
                ResponseTemplate::new(201).set_body_json(json!({
                    "id": format!("file-{}", label),
                    "urls": {"get": format!("https://files.test/{}", name)}
                }))
            })
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/v1/files/[^/]+$"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        server
    }

    async fn mount_prediction(server: &MockServer, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path("/v1/models/black-forest-labs/flux-fill-pro/predictions"))
            .and(header("Prefer", "wait"))
            .and(header("Authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    fn engine_for(server: &MockServer) -> ReplicateEngine {
        let config = ReplicateConfig::new("t")
            .with_base_url(format!("{}/v1", server.uri()))
            .with_request_timeout(Duration::from_secs(5))
            .with_polling(Duration::from_millis(5), 3);
        ReplicateEngine::new(config).unwrap()
    }

    async fn received(server: &MockServer, verb: &str) -> Vec<Request> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb)
            .collect()
    }

    async fn deleted_paths(server: &MockServer) -> Vec<String> {
        let mut paths: Vec<String> = received(server, "DELETE")
            .await
            .iter()
            .map(|r| r.url.path().to_string())
            .collect();
        paths.sort();
        paths
    }

    #[tokio::test]
    async fn test_rejected_prediction_deletes_both_uploads() {
        let server = files_api(false).await;
        mount_prediction(&server, 422, json!({"detail": "invalid mask"})).await;

        let err = engine_for(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Engine(ref m) if m.contains("422")));
        assert_eq!(
            deleted_paths(&server).await,
            vec!["/v1/files/file-canvas", "/v1/files/file-mask"]
        );
    }

    #[tokio::test]
    async fn test_failed_mask_upload_deletes_canvas() {
        let server = files_api(true).await;
        mount_prediction(&server, 201, json!({"id": "p1", "status": "starting"})).await;

        let err = engine_for(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Engine(ref m) if m.contains("storage unavailable")));
        assert_eq!(deleted_paths(&server).await, vec!["/v1/files/file-canvas"]);

        // No prediction is attempted without both inputs
        let posts = received(&server, "POST").await;
        assert!(posts.iter().all(|r| r.url.path() == "/v1/files"));
    }

    #[tokio::test]
    async fn test_failed_poll_deletes_uploads() {
        let server = files_api(false).await;
        mount_prediction(&server, 201, json!({"id": "p1", "status": "processing"})).await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p1"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = engine_for(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Engine(ref m) if m.contains("Poll prediction")));
        assert_eq!(
            deleted_paths(&server).await,
            vec!["/v1/files/file-canvas", "/v1/files/file-mask"]
        );
    }

    #[tokio::test]
    async fn test_failed_prediction_status_deletes_uploads() {
        let server = files_api(false).await;
        mount_prediction(
            &server,
            201,
            json!({"id": "p2", "status": "failed", "error": "flagged as sensitive"}),
        )
        .await;

        let err = engine_for(&server).generate(&request()).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Engine(ref m) if m.contains("flagged as sensitive")));
        assert_eq!(deleted_paths(&server).await.len(), 2);
    }

    #[tokio::test]
    async fn test_polled_prediction_succeeds_with_unique_uploads() {
        let server = files_api(false).await;
        mount_prediction(&server, 201, json!({"id": "p3", "status": "starting"})).await;
        Mock::given(method("GET"))
            .and(path("/v1/predictions/p3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p3",
                "status": "succeeded",
                "output": [RESULT_URL]
            })))
            .mount(&server)
            .await;

        let engine = engine_for(&server);
        for _ in 0..2 {
            assert_eq!(engine.generate(&request()).await.unwrap(), vec![RESULT_URL]);
        }
        assert_eq!(deleted_paths(&server).await.len(), 4);

        let names: Vec<String> = received(&server, "POST")
            .await
            .iter()
            .filter(|r| r.url.path() == "/v1/files")
            .filter_map(uploaded_file_name)
            .collect();
        assert_eq!(names.len(), 4);
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), 4);
        for name in &names {
            let (label, rest) = name.split_once('-').unwrap();
            assert!(label == "canvas" || label == "mask", "unexpected upload {}", name);
            let id = rest.strip_suffix(".png").unwrap();
            assert!(Uuid::parse_str(id).is_ok(), "upload {} is not uniquely named", name);
        }

        // The prediction references the uploaded files
        let prediction = received(&server, "POST")
            .await
            .into_iter()
            .find(|r| r.url.path().ends_with("/predictions"))
            .unwrap();
        let body: Value = serde_json::from_slice(&prediction.body).unwrap();
        assert!(body["input"]["image"]
            .as_str()
            .unwrap()
            .starts_with("https://files.test/canvas-"));
        assert!(body["input"]["mask"]
            .as_str()
            .unwrap()
            .starts_with("https://files.test/mask-"));
    }
}
