//! HTTP intercept proxy
//!
//! Sits between the browser and the application. Requests arrive either in
//! absolute form (the browser is configured to use us as its HTTP proxy) or
//! origin form (we act as a reverse proxy in front of `upstream`). Every
//! request is reported to the [`InterceptLedger`] before forwarding and marked
//! complete once the upstream response is in hand.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{E2eError, E2eResult};
use crate::intercept::InterceptLedger;

/// Request bodies larger than this are rejected
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

#[derive(Clone)]
struct ProxyState {
    ledger: Arc<InterceptLedger>,
    client: reqwest::Client,
    upstream: Url,
}

/// A running proxy; stops when dropped or on [`InterceptProxy::shutdown`]
pub struct InterceptProxy {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl InterceptProxy {
    pub async fn start(listen: SocketAddr, upstream: Url, ledger: Arc<InterceptLedger>) -> E2eResult<Self> {
        let listener = TcpListener::bind(listen).await?;
        let addr = listener.local_addr()?;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        let state = ProxyState {
            ledger,
            client,
            upstream,
        };

        let app = Router::new()
            .fallback(forward)
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                warn!("Intercept proxy stopped: {}", e);
            }
        });

        info!("Intercept proxy listening on {}", addr);

        Ok(Self {
            addr,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for InterceptProxy {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn forward(State(state): State<ProxyState>, req: Request) -> Response {
    match relay(&state, req).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("Proxy relay failed: {}", e);
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

async fn relay(state: &ProxyState, req: Request) -> E2eResult<Response> {
    let (parts, body) = req.into_parts();
    let body: Bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| E2eError::Proxy(format!("reading request body: {}", e)))?;

    let target = target_url(&state.upstream, &parts.uri)?;
    let ticket = state.ledger.observe(parts.method.as_str(), &target, &body);

    debug!("{} {}", parts.method, target);

    let upstream = state
        .client
        .request(parts.method.clone(), target.clone())
        .headers(strip_hop_by_hop(&parts.headers))
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let headers = strip_hop_by_hop(upstream.headers());
    let bytes = upstream.bytes().await?;

    state.ledger.complete(ticket, status.as_u16());

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Absolute-form URIs are used as-is; origin-form ones resolve against upstream
fn target_url(upstream: &Url, uri: &Uri) -> E2eResult<Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(Url::parse(&uri.to_string())?);
    }
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Ok(upstream.join(path_and_query)?)
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}
