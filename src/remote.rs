//! Background removal: the same-origin proxy route and its client.
//!
//! The proxy is a single hop. It re-sends the inbound multipart parts to the
//! upstream service with the server-held key attached and streams the image
//! back. Any failure becomes one generic JSON error; upstream error bodies
//! are dropped.

use crate::config::ProxyConfig;
use crate::tools::Tool;
use crate::{ForgeError, ProxyCredential, Result, SourceFile, TransformResult};
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Local proxy route
pub const ROUTE: &str = "/api/removebg";

/// Header carrying the upstream credential
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// The only error text the proxy ever returns
pub const FAILURE_MESSAGE: &str = "Failed to remove background";

#[derive(Clone)]
struct ProxyState {
    http: reqwest::Client,
    upstream_url: Arc<str>,
    credential: ProxyCredential,
}

/// Build the proxy router
pub fn router(config: &ProxyConfig) -> Router {
    if config.api_key.is_empty() {
        tracing::warn!(
            "{} is not set; upstream calls will be unauthenticated",
            crate::config::API_KEY_ENV
        );
    }

    let state = ProxyState {
        http: reqwest::Client::new(),
        upstream_url: Arc::from(config.upstream_url.as_str()),
        credential: config.api_key.clone(),
    };

    Router::new()
        .route(ROUTE, post(remove_background))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state)
}

/// Serve the proxy on an already-bound listener
pub async fn serve_on(listener: TcpListener, config: &ProxyConfig) -> std::io::Result<()> {
    let app = router(config);
    tracing::info!(
        addr = %listener.local_addr()?,
        upstream = %config.upstream_url,
        "background-removal proxy listening"
    );
    axum::serve(listener, app).await
}

/// Bind `config.listen` and serve until the process exits
pub async fn serve(config: &ProxyConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(config.listen).await?;
    serve_on(listener, config).await
}

async fn remove_background(
    State(state): State<ProxyState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Response {
    let relayed = match multipart {
        Ok(multipart) => relay(&state, multipart).await,
        Err(rejection) => Err(ForgeError::Api(rejection.body_text())),
    };

    match relayed {
        Ok(upstream) => (
            [(header::CONTENT_TYPE, "image/png")],
            Body::from_stream(upstream.bytes_stream()),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "background removal failed");
            failure_response()
        }
    }
}

fn failure_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": FAILURE_MESSAGE })),
    )
        .into_response()
}

/// Forward every inbound part to the upstream and return its success response
async fn relay(state: &ProxyState, mut multipart: Multipart) -> Result<reqwest::Response> {
    let mut form = Form::new();
    let mut parts = 0usize;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ForgeError::Api(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ForgeError::Api(e.body_text()))?;

        let mut part = Part::bytes(data.to_vec());
        if let Some(file_name) = file_name {
            part = part.file_name(file_name);
        }
        if let Some(content_type) = content_type {
            part = part
                .mime_str(&content_type)
                .map_err(|e| ForgeError::Api(e.to_string()))?;
        }
        form = form.part(name, part);
        parts += 1;
    }

    tracing::debug!(parts, upstream = %state.upstream_url, "relaying upload");

    let response = state
        .http
        .post(&*state.upstream_url)
        .header(API_KEY_HEADER, state.credential.expose())
        .multipart(form)
        .send()
        .await
        .map_err(|e| ForgeError::Api(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ForgeError::Api(format!(
            "upstream returned {}",
            response.status()
        )));
    }
    Ok(response)
}

/// Client for the background-removal route.
///
/// Points at the local proxy by default; given a credential it can also call
/// the upstream directly.
#[derive(Debug, Clone)]
pub struct RemoveBgClient {
    http: reqwest::Client,
    endpoint: String,
    credential: Option<ProxyCredential>,
}

impl RemoveBgClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            credential: None,
        }
    }

    /// Attach `X-Api-Key` to every request
    pub fn with_credential(mut self, credential: ProxyCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload `source` and return the background-free PNG
    pub async fn remove_background(&self, source: &SourceFile) -> Result<TransformResult> {
        let part = Part::bytes(source.bytes.clone())
            .file_name("upload")
            .mime_str(&source.media_type)
            .map_err(|e| ForgeError::Api(e.to_string()))?;
        let form = Form::new().part("image_file", part).text("size", "auto");

        let mut request = self.http.post(&self.endpoint).multipart(form);
        if let Some(credential) = &self.credential {
            request = request.header(API_KEY_HEADER, credential.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ForgeError::Api(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ForgeError::Api(format!("request returned {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ForgeError::Api(e.to_string()))?;
        tracing::debug!(size = bytes.len(), "background removed");

        let tool = Tool::BackgroundRemover;
        Ok(TransformResult {
            bytes: bytes.to_vec(),
            media_type: tool.output_media_type(),
            filename: tool.filename(),
        })
    }
}
