//! Origin listener.
//!
//! One listener per (protocol, host, port). It owns the TCP socket, the route
//! table for that origin, the pending scopes and the set of open client
//! connections. Requests are turned into exchanges and dispatched; the
//! response is written when the exchange comes back on the listener's
//! completion channel.

use super::connections::ConnectionSet;
use super::origin::Origin;
use super::routes::{normalize_path, translated_uri, RouteTable};
use super::scope::{PendingScope, Scope, ScopeTable};
use crate::component::Processor;
use crate::error::GatewayError;
use crate::exchange::headers::{
    self, import_headers, HANDLER, QUERY_STRING, REQUEST_METHOD, REQUEST_URL, SERVER,
    STATUS_CODE, TRANSLATED_PATH, TRANSLATED_URI, VERSION,
};
use crate::exchange::{Body, BoxError, Exchange, StreamBody, CALLBACK_PROPERTY};
use crate::pipeline::{Direction, Dispatcher};
use crate::response::{error_response, not_found, set_json_content_type, status_or_500};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, Version};
use hyper_util::rt::TokioIo;
use parking_lot::{Mutex, RwLock};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct OriginListener {
    origin: Origin,
    id: String,
    callback_channel: String,
    dispatcher: Arc<dyn Dispatcher>,
    routes: RouteTable,
    scopes: ScopeTable,
    connections: ConnectionSet,
    shutdown_tx: watch::Sender<bool>,
    local_addr: RwLock<Option<SocketAddr>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for OriginListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginListener")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl OriginListener {
    pub fn new(origin: Origin, dispatcher: Arc<dyn Dispatcher>) -> Result<Self, GatewayError> {
        if origin.protocol != "http" {
            return Err(GatewayError::UnsupportedProtocol(origin.protocol));
        }
        let id = origin.id();
        let callback_channel = dispatcher.channel_id(Direction::Out, &id);
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            origin,
            id,
            callback_channel,
            dispatcher,
            routes: RouteTable::new(),
            scopes: ScopeTable::new(),
            connections: ConnectionSet::new(),
            shutdown_tx,
            local_addr: RwLock::new(None),
            accept_task: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.prefixes()
    }

    pub fn pending_scopes(&self) -> usize {
        self.scopes.len()
    }

    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    pub fn route(&self, path: &str, handler: Arc<dyn Processor>) {
        let prefix = self.routes.route(path, handler);
        info!("Added route {} on {}", prefix, self.id);
    }

    pub fn deroute(&self, path: &str, handler: &Arc<dyn Processor>) -> bool {
        let removed = self.routes.deroute(path, handler);
        if removed {
            info!("Removed route {} on {}", normalize_path(path), self.id);
        }
        removed
    }

    /// Bind the socket and start accepting. Calling it again on a started
    /// listener returns the bound address.
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr, GatewayError> {
        if let Some(addr) = self.local_addr() {
            return Ok(addr);
        }

        let listener = TcpListener::bind((self.origin.host.as_str(), self.origin.port))
            .await
            .map_err(|e| GatewayError::Bind(self.id.clone(), e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(self.id.clone(), e))?;
        *self.local_addr.write() = Some(addr);

        let completions = self.dispatcher.subscribe(&self.callback_channel);
        tokio::spawn(Arc::clone(self).run_completions(completions));

        let shutdown = self.shutdown_tx.subscribe();
        let accept = tokio::spawn(Arc::clone(self).accept_loop(listener, shutdown));
        *self.accept_task.lock() = Some(accept);

        info!("Server listening on {} ({})", self.id, addr);
        Ok(addr)
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, shutdown: watch::Receiver<bool>) {
        let stopped = stopped(shutdown);
        tokio::pin!(stopped);
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, peer)) => self.serve_connection(stream, peer),
                    Err(e) => error!("Accept error on {}: {}", self.id, e),
                },
                _ = &mut stopped => {
                    debug!("Accept loop on {} stopping", self.id);
                    break;
                }
            }
        }
    }

    fn serve_connection(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        let listener = Arc::clone(self);
        let shutdown = self.shutdown_tx.subscribe();
        let id = self.id.clone();

        self.connections.spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let listener = Arc::clone(&listener);
                async move { listener.handle(req).await }
            });
            let conn = http1::Builder::new().serve_connection(io, service);
            tokio::pin!(conn);

            let stopped = stopped(shutdown);
            tokio::pin!(stopped);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = &mut stopped => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                debug!("Connection error on {} from {}: {}", id, peer, e);
            }
        });
    }

    /// Resolve the route, dispatch the exchange and wait for its completion.
    async fn handle(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> Result<Response<StreamBody>, Infallible> {
        let path = normalize_path(req.uri().path());
        let Some(matched) = self.routes.resolve(&path) else {
            debug!("No route for {} on {}", path, self.id);
            return Ok(not_found(&path));
        };

        let (parts, body) = req.into_parts();
        let mut exchange = self.build_exchange(&parts, &path, &matched.prefix);
        exchange.body = Body::Stream(body.map_err(BoxError::from).boxed());
        exchange.set_property(CALLBACK_PROPERTY, self.callback_channel.clone());

        let id = exchange.id();
        let (tx, rx) = oneshot::channel();
        self.scopes.insert(id, Scope::new(parts, tx));
        let _pending = PendingScope {
            table: &self.scopes,
            id,
        };

        self.dispatcher
            .send(Direction::In, matched.handler, exchange, &self.id);

        match rx.await {
            Ok(response) => Ok(response),
            Err(_) => {
                warn!("Exchange {} dropped before completion", id);
                Ok(error_response(500, "exchange dropped before completion"))
            }
        }
    }

    /// Raw request headers first, then the metadata headers, so a client
    /// cannot override metadata by sending a header with the same name.
    fn build_exchange(&self, parts: &Parts, path: &str, prefix: &str) -> Exchange {
        let mut exchange = Exchange::new();
        import_headers(&mut exchange, &parts.headers);

        exchange.set_header(SERVER, format!("{}:{}", self.origin.host, self.origin.port));
        exchange.set_header(HANDLER, prefix);
        exchange.set_header(VERSION, version_str(parts.version));
        exchange.set_header(REQUEST_METHOD, parts.method.as_str());
        exchange.set_header(REQUEST_URL, parts.uri.to_string());
        exchange.set_header(QUERY_STRING, parts.uri.query().unwrap_or_default());
        exchange.set_header(TRANSLATED_PATH, path);
        exchange.set_header(TRANSLATED_URI, translated_uri(path, prefix));
        exchange
    }

    async fn run_completions(self: Arc<Self>, mut completions: mpsc::UnboundedReceiver<Exchange>) {
        while let Some(exchange) = completions.recv().await {
            if let Err(e) = self.complete(exchange) {
                match e {
                    GatewayError::ScopeNotFound(_) => warn!("{} on {}", e, self.id),
                    _ => debug!("{} on {}", e, self.id),
                }
            }
        }
        debug!("Completion channel for {} closed", self.id);
    }

    /// Write the response for a completed exchange. Each scope is answered
    /// at most once; later completions for the same id are rejected.
    pub fn complete(&self, exchange: Exchange) -> Result<(), GatewayError> {
        let id = exchange.id();
        let scope = self
            .scopes
            .take(id)
            .ok_or(GatewayError::ScopeNotFound(id))?;

        let response = render_completion(exchange).unwrap_or_else(|e| {
            error!("Failed to render exchange {}: {}", id, e);
            error_response(500, &e.to_string())
        });

        debug!(
            "{} {} -> {} in {:?}",
            scope.request.method,
            scope.request.uri,
            response.status(),
            scope.opened_at.elapsed()
        );

        scope
            .responder
            .send(response)
            .map_err(|_| GatewayError::ResponderGone(id))
    }

    /// Stop accepting, then drain (or abort, when `force` is set) open
    /// connections. A closed listener does not accept again; the service
    /// creates a fresh one for the origin on the next acquire.
    pub async fn close(&self, force: bool) {
        self.shutdown_tx.send_replace(true);

        let accept = self.accept_task.lock().take();
        if let Some(accept) = accept {
            let _ = accept.await;
        }

        if force {
            let aborted = self.connections.abort_all();
            if aborted > 0 {
                info!("Aborted {} connection(s) on {}", aborted, self.id);
            }
        }
        self.connections.wait_idle().await;
        self.connections.clear();

        self.dispatcher.unsubscribe(&self.callback_channel);
        *self.local_addr.write() = None;
        info!("Server closed on {}", self.id);
    }
}

/// Build the client response from a completed exchange.
pub(crate) fn render_completion(mut exchange: Exchange) -> Result<Response<StreamBody>, GatewayError> {
    if let Some(error) = &exchange.error {
        return Ok(error_response(error.status(), &error.message));
    }

    let declared = exchange.header(STATUS_CODE).map(|code| {
        code.parse::<u16>()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, status_or_500)
    });
    let content_type = declared
        .and(exchange.header(headers::CONTENT_TYPE))
        .and_then(|value| HeaderValue::from_str(value).ok());

    let is_json = exchange.body.is_json();
    let body = exchange.take_body().into_stream()?;

    let mut response = Response::new(body);
    *response.status_mut() = declared.unwrap_or(StatusCode::OK);
    if is_json {
        set_json_content_type(&mut response);
    } else if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}

/// Resolves once shutdown has been signaled or the sender is gone.
async fn stopped(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
