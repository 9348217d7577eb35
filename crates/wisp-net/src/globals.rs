//! Global Primitive Table
//!
//! Typed capability slots standing in for the page's network globals
//! (fetch, XHR open/send, sendBeacon, the WebSocket constructor). The
//! embedding shell binds its platform implementations into the table at
//! startup; the interceptor swaps wrapped variants in and out of the same
//! slots. Tests bind fakes instead of touching any process-wide state.

use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by table dispatch and by blocking primitives.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("connection to {url} refused by policy")]
    Blocked { url: String },

    #[error("no {0} primitive bound")]
    Unbound(&'static str),

    #[error("host error: {0}")]
    Host(String),
}

/// First argument of a fetch call: a bare target or a full request
/// descriptor.
#[derive(Debug, Clone)]
pub enum FetchInput {
    Url(String),
    Request(FetchRequest),
}

impl FetchInput {
    /// The request target, whichever form the caller used.
    pub fn url(&self) -> &str {
        match self {
            FetchInput::Url(url) => url,
            FetchInput::Request(req) => &req.url,
        }
    }

    /// The descriptor's own method, if the caller supplied one.
    pub fn method(&self) -> Option<&str> {
        match self {
            FetchInput::Url(_) => None,
            FetchInput::Request(req) => req.method.as_deref(),
        }
    }
}

/// Request descriptor form of a fetch call.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub url: String,
    pub method: Option<String>,
    pub body: Option<Vec<u8>>,
}

/// Per-call fetch options; its method takes precedence over the
/// descriptor's.
#[derive(Debug, Clone, Default)]
pub struct FetchInit {
    pub method: Option<String>,
    pub body: Option<Vec<u8>>,
}

/// Response produced by the fetch primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// The synthetic response handed to blocked fetch callers: success
    /// shaped, explicitly empty.
    pub fn no_content() -> Self {
        Self {
            status: 204,
            status_text: "No Content".to_owned(),
            body: Vec::new(),
        }
    }

    /// Plain 200 response.
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_owned(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// XHR lifecycle stage, mirroring the platform's readyState.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Unsent,
    Opened,
    HeadersReceived,
    Loading,
    Done,
}

/// A host-owned XHR handle. The open/send primitives operate on this
/// record; the interceptor's open wrapper stores its verdict here so the
/// send wrapper can honor it later.
#[derive(Debug)]
pub struct Xhr {
    pub method: Option<String>,
    pub url: Option<String>,
    pub asynchronous: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ready_state: ReadyState,
    pub status: u16,
    pub(crate) blocked: bool,
}

impl Xhr {
    pub fn new() -> Self {
        Self {
            method: None,
            url: None,
            asynchronous: true,
            username: None,
            password: None,
            ready_state: ReadyState::Unsent,
            status: 0,
            blocked: false,
        }
    }
}

impl Default for Xhr {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments of an XHR open call.
#[derive(Debug, Clone)]
pub struct XhrOpenArgs {
    pub method: String,
    pub url: String,
    pub asynchronous: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl XhrOpenArgs {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            asynchronous: true,
            username: None,
            password: None,
        }
    }
}

/// An open duplex channel, as the host defines it.
pub trait Socket: Send {
    fn url(&self) -> &str;
}

pub type FetchFuture = BoxFuture<'static, Result<HttpResponse, NetError>>;
pub type FetchFn = Arc<dyn Fn(FetchInput, Option<FetchInit>) -> FetchFuture + Send + Sync>;
pub type XhrOpenFn = Arc<dyn Fn(&mut Xhr, XhrOpenArgs) + Send + Sync>;
pub type XhrSendFn = Arc<dyn Fn(&mut Xhr, Option<&[u8]>) + Send + Sync>;
pub type BeaconFn = Arc<dyn Fn(&str, &[u8]) -> bool + Send + Sync>;
pub type SocketFn = Arc<dyn Fn(&str, &[String]) -> Result<Box<dyn Socket>, NetError> + Send + Sync>;

#[derive(Default)]
struct Slots {
    fetch: Option<FetchFn>,
    xhr_open: Option<XhrOpenFn>,
    xhr_send: Option<XhrSendFn>,
    send_beacon: Option<BeaconFn>,
    web_socket: Option<SocketFn>,
}

/// The swappable global slot table.
///
/// Cheap to clone (shared interior); slot reads clone the `Arc` out of
/// the lock so dispatch never calls a primitive while holding it.
#[derive(Clone, Default)]
pub struct GlobalTable {
    slots: Arc<Mutex<Slots>>,
}

impl GlobalTable {
    /// An empty table; every slot unbound.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_slot(&self) -> Option<FetchFn> {
        self.slots.lock().unwrap().fetch.clone()
    }

    pub fn bind_fetch(&self, f: FetchFn) {
        self.slots.lock().unwrap().fetch = Some(f);
    }

    pub fn xhr_open_slot(&self) -> Option<XhrOpenFn> {
        self.slots.lock().unwrap().xhr_open.clone()
    }

    pub fn bind_xhr_open(&self, f: XhrOpenFn) {
        self.slots.lock().unwrap().xhr_open = Some(f);
    }

    pub fn xhr_send_slot(&self) -> Option<XhrSendFn> {
        self.slots.lock().unwrap().xhr_send.clone()
    }

    pub fn bind_xhr_send(&self, f: XhrSendFn) {
        self.slots.lock().unwrap().xhr_send = Some(f);
    }

    pub fn send_beacon_slot(&self) -> Option<BeaconFn> {
        self.slots.lock().unwrap().send_beacon.clone()
    }

    pub fn bind_send_beacon(&self, f: BeaconFn) {
        self.slots.lock().unwrap().send_beacon = Some(f);
    }

    pub fn web_socket_slot(&self) -> Option<SocketFn> {
        self.slots.lock().unwrap().web_socket.clone()
    }

    pub fn bind_web_socket(&self, f: SocketFn) {
        self.slots.lock().unwrap().web_socket = Some(f);
    }

    /// Dispatch a fetch call through whatever is currently bound.
    pub async fn fetch(
        &self,
        input: FetchInput,
        init: Option<FetchInit>,
    ) -> Result<HttpResponse, NetError> {
        let f = self.fetch_slot().ok_or(NetError::Unbound("fetch"))?;
        f(input, init).await
    }

    /// Dispatch an XHR open call.
    pub fn open_xhr(&self, xhr: &mut Xhr, args: XhrOpenArgs) -> Result<(), NetError> {
        let f = self.xhr_open_slot().ok_or(NetError::Unbound("xhr-open"))?;
        f(xhr, args);
        Ok(())
    }

    /// Dispatch an XHR send call.
    pub fn send_xhr(&self, xhr: &mut Xhr, body: Option<&[u8]>) -> Result<(), NetError> {
        let f = self.xhr_send_slot().ok_or(NetError::Unbound("xhr-send"))?;
        f(xhr, body);
        Ok(())
    }

    /// Dispatch a beacon send. The returned flag means "accepted for
    /// delivery", never "delivered".
    pub fn send_beacon(&self, url: &str, data: &[u8]) -> Result<bool, NetError> {
        let f = self
            .send_beacon_slot()
            .ok_or(NetError::Unbound("send-beacon"))?;
        Ok(f(url, data))
    }

    /// Dispatch a WebSocket construction.
    pub fn connect(&self, url: &str, protocols: &[String]) -> Result<Box<dyn Socket>, NetError> {
        let f = self
            .web_socket_slot()
            .ok_or(NetError::Unbound("web-socket"))?;
        f(url, protocols)
    }
}
