//! HTTP entry
//!
//! A single route (`/`) accepts any method. `GET` answers a liveness line,
//! `POST` is checked against the source allow-list and then decoded by
//! content type: JSON bodies are dispatched as a request tree, multipart
//! bodies are stored as uploads. Every response is `200 text/plain` carrying
//! the invocation's log.

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::gateway::Gateways;
use crate::poller::FulfillmentPoller;
use crate::request::Request;
use crate::session::Session;
use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequest, Multipart, State};
use axum::http::{header, HeaderMap, Method};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::Router;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Shared by every invocation
pub struct AppState {
    config: Arc<Config>,
    dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Arc<Config>, gateways: Gateways) -> Self {
        let poller = FulfillmentPoller::from_config(&config);
        Self {
            dispatcher: Dispatcher::new(gateways, poller),
            config,
        }
    }

    fn session(&self) -> Session {
        let gateways = self.dispatcher.gateways();
        Session::new(
            self.config.clone(),
            gateways.storage.clone(),
            gateways.local.clone(),
        )
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", any(handle))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn handle(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
) -> impl IntoResponse {
    let span = tracing::info_span!(
        "invocation",
        id = %uuid::Uuid::new_v4(),
        method = %request.method(),
        peer = %peer,
    );

    let output = async {
        let started = Instant::now();
        tracing::info!("start handler");

        let mut session = state.session();
        process(&state, &mut session, peer, request).await;

        tracing::info!("end handler ({:?})", started.elapsed());
        session.into_output()
    }
    .instrument(span)
    .await;

    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], output)
}

async fn process(
    state: &AppState,
    session: &mut Session,
    peer: SocketAddr,
    request: axum::extract::Request,
) {
    match *request.method() {
        Method::GET => return session.log("cloudbox works"),
        Method::POST => {}
        _ => return session.log("Unknown request"),
    }

    let source = source_ip(&state.config, peer, request.headers());
    if !is_allowed(&state.config, source).await {
        tracing::warn!(%source, "source not allowed");
        return session.log(format!("SourceIP: {} is NOT allowed", source));
    }

    let Some(content_type) = request
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    else {
        return session.log("No Content-Type");
    };

    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match media_type.as_str() {
        "application/json" => handle_json(state, session, request).await,
        "multipart/form-data" => match Multipart::from_request(request, &()).await {
            Ok(multipart) => handle_multipart(session, multipart).await,
            Err(e) => session.log(format!("Multipart: {}", e.body_text())),
        },
        _ => session.log(format!("Unknown Content-Type: {}", content_type)),
    }
}

/// TCP peer, or the first `X-Forwarded-For` entry when trusted
fn source_ip(config: &Config, peer: SocketAddr, headers: &HeaderMap) -> IpAddr {
    let forwarded = config
        .trust_forwarded_for
        .then(|| headers.get(FORWARDED_FOR))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    forwarded.unwrap_or_else(|| peer.ip()).to_canonical()
}

/// Source matches an allowed IP, or an address an allowed host resolves to
async fn is_allowed(config: &Config, source: IpAddr) -> bool {
    let listed = config
        .allowed_ips()
        .filter_map(|ip| ip.parse::<IpAddr>().ok())
        .any(|ip| ip.to_canonical() == source);
    if listed {
        return true;
    }

    for host in config.allowed_hosts() {
        match tokio::net::lookup_host((host, 0)).await {
            Ok(mut addrs) => {
                if addrs.any(|addr| addr.ip().to_canonical() == source) {
                    return true;
                }
            }
            Err(e) => tracing::debug!(host, error = %e, "allowed host did not resolve"),
        }
    }
    false
}

async fn handle_json(state: &AppState, session: &mut Session, request: axum::extract::Request) {
    let body = match axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return session.log(format!("ReadBody: {}", e)),
    };
    let tree = match Request::from_json(&body) {
        Ok(tree) => tree,
        Err(e) => return session.log(format!("Unmarshal: {}", e)),
    };
    state.dispatcher.dispatch(session, &tree).await;
}

/// Upload file names must stay inside their target directory or prefix
fn is_plain_file_name(name: &str) -> bool {
    !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

async fn handle_multipart(session: &mut Session, mut multipart: Multipart) {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return session.log(format!("Multipart: {}", e.body_text())),
        };

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        session.log(format!("name = {}, filename = {}", name, file_name));
        if file_name.is_empty() {
            session.log("no filename");
            continue;
        }
        if !is_plain_file_name(&file_name) {
            session.log(format!("bad filename {}", file_name));
            continue;
        }

        let body = match field.bytes().await {
            Ok(body) => body.to_vec(),
            Err(e) => return session.log(format!("Multipart: {}", e.body_text())),
        };

        match name.as_str() {
            "file" | "s3" => {
                let bucket = match session.bucket() {
                    Ok(bucket) => bucket.clone(),
                    Err(e) => {
                        session.log(e.to_string());
                        continue;
                    }
                };
                if let Err(e) = bucket.put(&format!("tmp/{}", file_name), body).await {
                    session.log(format!("S3Put: {:#}", e));
                }
            }
            "tmp" => {
                let path = session.config().scratch_dir.join(&file_name);
                if let Err(e) = session.local().write_file(&path, &body).await {
                    session.log(format!("WriteFile: {:#}", e));
                }
            }
            _ => session.log(format!("unknown name = {}", name)),
        }
    }
}
