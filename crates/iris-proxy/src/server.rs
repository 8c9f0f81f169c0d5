//! Actix Web HTTP server.
//!
//! Exposes Anthropic-compatible endpoints:
//! - `POST /v1/messages`
//! - `GET /health`

use crate::{
    config::ProxyConfig,
    error::TranslateError,
    format::ModelFormat,
    streaming::{translate_stream, StreamTranslator},
    translation,
    types::MessagesRequest,
};
use actix_cors::Cors;
use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Request bodies carry whole conversations; the actix default is 256 KiB.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }
}

pub async fn serve(config: ProxyConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    info!(addr = %addr, backend = %config.backend_url, "iris-proxy listening");

    let state = web::Data::new(AppState::new(config)?);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .configure(routes)
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run()
    .await
    .context("server error")?;

    Ok(())
}

/// Register the proxy routes. `AppState` must be provided as app data.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
        .route("/health", web::get().to(health_check))
        .route("/v1/messages", web::post().to(handle_messages));
}

async fn health_check() -> &'static str {
    "OK"
}

fn error_response(status: StatusCode, err: &TranslateError) -> HttpResponse {
    HttpResponse::build(status).json(err.to_payload())
}

fn translate_error_response(err: &TranslateError) -> HttpResponse {
    let status = if err.is_client_fault() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    };
    error_response(status, err)
}

fn upstream_error_response(message: String) -> HttpResponse {
    error_response(StatusCode::BAD_GATEWAY, &TranslateError::Upstream(message))
}

async fn handle_messages(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let req: MessagesRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            debug!(error = %e, "rejecting malformed request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                &TranslateError::InvalidRequest(e.to_string()),
            );
        }
    };

    let config = &state.config;
    let outgoing = match translation::convert_request(&req, &config.models, &config.routing) {
        Ok(outgoing) => outgoing,
        Err(e) => {
            error!(error = %e, "request translation error");
            return translate_error_response(&e);
        }
    };

    let format = ModelFormat::detect(&outgoing.model);
    debug!(
        client_model = %req.model,
        backend_model = %outgoing.model,
        format = %format,
        stream = req.stream,
        messages = outgoing.messages.len(),
        "routing decision"
    );

    let mut request = state
        .client
        .post(config.chat_completions_url())
        .json(&outgoing);
    if let Some(key) = &config.api_key {
        request = request.bearer_auth(key);
    }

    let upstream = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "backend request failed");
            return upstream_error_response(format!("request failed: {}", e));
        }
    };

    if let Some(request_id) = upstream
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
    {
        debug!(upstream_request_id = %request_id, "backend accepted request");
    }

    if !upstream.status().is_success() {
        let status = upstream.status();
        let text = upstream.text().await.unwrap_or_default();
        error!(%status, body = %text, "backend error");
        return upstream_error_response(format!("returned status {}", status));
    }

    if req.stream {
        let translator =
            StreamTranslator::new(outgoing.model.clone(), format, config.kimi_buffer_limit);
        let stream = translate_stream(upstream.bytes_stream(), translator)
            .map(|frame| Ok::<_, actix_web::Error>(web::Bytes::from(frame)));

        return HttpResponse::Ok()
            .content_type("text/event-stream")
            .insert_header(("cache-control", "no-cache"))
            .streaming(stream);
    }

    let bytes = match upstream.bytes().await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "failed to read backend response");
            return upstream_error_response(format!("could not read response: {}", e));
        }
    };

    match translation::decode_response(&bytes)
        .and_then(|resp| translation::convert_response(resp, &outgoing.model, format))
    {
        Ok(out) => HttpResponse::Ok().json(out),
        Err(e) => {
            error!(error = %e, kind = e.kind(), "response translation error");
            translate_error_response(&e)
        }
    }
}
