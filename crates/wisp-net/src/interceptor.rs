//! Network Interceptor
//!
//! Installs blocking wrappers over the global primitive table and takes
//! them out again, restoring the exact originals. Install and uninstall
//! are idempotent and symmetric:
//!
//! 1. `install()` captures every currently bound slot, then replaces the
//!    captured slots with wrappers built over those captures. Capture
//!    happens strictly before replacement, so a wrapper can never end up
//!    recorded as its own original.
//! 2. `uninstall()` puts the captured references back and discards the
//!    record. Slots that were empty at capture are left alone.
//!
//! Every wrapper routes through one recovery boundary: a classifier
//! failure downgrades to allow and the call is forwarded untouched. A bug
//! in blocking logic must never break the host application's networking.

use crate::classify::{Classify, RuleClassifier, Verdict};
use crate::globals::{
    BeaconFn, FetchFn, GlobalTable, HttpResponse, NetError, ReadyState, SocketFn, XhrOpenFn,
    XhrSendFn,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Where a blocked XHR is pointed before the original open runs, so no
/// real connection is ever attempted.
pub const NOOP_TARGET: &str = "about:blank";

/// Originals captured at install time, one optional slot per primitive.
/// Exists exactly while the wrappers are active.
#[derive(Default)]
struct Originals {
    fetch: Option<FetchFn>,
    xhr_open: Option<XhrOpenFn>,
    xhr_send: Option<XhrSendFn>,
    send_beacon: Option<BeaconFn>,
    web_socket: Option<SocketFn>,
}

/// Install/uninstall engine for the network blockers.
pub struct Interceptor {
    table: GlobalTable,
    classifier: Arc<dyn Classify>,
    originals: Mutex<Option<Originals>>,
}

impl Interceptor {
    /// Interceptor over `table` with the standard rule classifier.
    pub fn new(table: GlobalTable) -> Self {
        Self::with_classifier(table, Arc::new(RuleClassifier::new()))
    }

    /// Interceptor with a host-supplied verdict source.
    pub fn with_classifier(table: GlobalTable, classifier: Arc<dyn Classify>) -> Self {
        Self {
            table,
            classifier,
            originals: Mutex::new(None),
        }
    }

    /// Whether the wrapped variants currently occupy the table.
    pub fn is_installed(&self) -> bool {
        self.originals.lock().unwrap().is_some()
    }

    /// Swap wrappers in. No-op when already installed.
    pub fn install(&self) {
        let mut held = self.originals.lock().unwrap();
        if held.is_some() {
            debug!("blockers already installed");
            return;
        }

        let captured = Originals {
            fetch: self.table.fetch_slot(),
            xhr_open: self.table.xhr_open_slot(),
            xhr_send: self.table.xhr_send_slot(),
            send_beacon: self.table.send_beacon_slot(),
            web_socket: self.table.web_socket_slot(),
        };

        if let Some(orig) = captured.fetch.clone() {
            self.table
                .bind_fetch(wrap_fetch(orig, self.classifier.clone()));
        }
        if let Some(orig) = captured.xhr_open.clone() {
            self.table
                .bind_xhr_open(wrap_xhr_open(orig, self.classifier.clone()));
        }
        if let Some(orig) = captured.xhr_send.clone() {
            self.table.bind_xhr_send(wrap_xhr_send(orig));
        }
        if let Some(orig) = captured.send_beacon.clone() {
            self.table
                .bind_send_beacon(wrap_beacon(orig, self.classifier.clone()));
        }
        if let Some(orig) = captured.web_socket.clone() {
            self.table
                .bind_web_socket(wrap_socket(orig, self.classifier.clone()));
        }

        *held = Some(captured);
        info!("network blockers installed");
    }

    /// Restore the captured originals. No-op when not installed.
    pub fn uninstall(&self) {
        let mut held = self.originals.lock().unwrap();
        let Some(originals) = held.take() else {
            debug!("blockers not installed");
            return;
        };

        if let Some(orig) = originals.fetch {
            self.table.bind_fetch(orig);
        }
        if let Some(orig) = originals.xhr_open {
            self.table.bind_xhr_open(orig);
        }
        if let Some(orig) = originals.xhr_send {
            self.table.bind_xhr_send(orig);
        }
        if let Some(orig) = originals.send_beacon {
            self.table.bind_send_beacon(orig);
        }
        if let Some(orig) = originals.web_socket {
            self.table.bind_web_socket(orig);
        }

        info!("network blockers removed");
    }
}

/// The per-wrapper recovery boundary: classifier failures downgrade to
/// allow so traffic keeps flowing.
fn verdict_or_allow(classifier: &dyn Classify, url: &str, method: Option<&str>) -> Verdict {
    match classifier.classify(url, method) {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!("classifier error, allowing {url}: {err}");
            Verdict::Allow
        }
    }
}

fn wrap_fetch(orig: FetchFn, classifier: Arc<dyn Classify>) -> FetchFn {
    Arc::new(move |input, init| {
        let method = init
            .as_ref()
            .and_then(|i| i.method.clone())
            .or_else(|| input.method().map(str::to_owned));

        if verdict_or_allow(&*classifier, input.url(), method.as_deref()).is_block() {
            debug!("blocked fetch: {}", input.url());
            return Box::pin(std::future::ready(Ok(HttpResponse::no_content())));
        }

        orig(input, init)
    })
}

fn wrap_xhr_open(orig: XhrOpenFn, classifier: Arc<dyn Classify>) -> XhrOpenFn {
    Arc::new(move |xhr, mut args| {
        xhr.blocked =
            verdict_or_allow(&*classifier, &args.url, Some(args.method.as_str())).is_block();
        if xhr.blocked {
            debug!("blocked xhr: {} {}", args.method, args.url);
            // Rewrite the target only; method, async flag, and credentials
            // reach the original open unchanged.
            args.url = NOOP_TARGET.to_owned();
        }
        orig(xhr, args)
    })
}

fn wrap_xhr_send(orig: XhrSendFn) -> XhrSendFn {
    Arc::new(move |xhr, body| {
        if xhr.blocked {
            // Complete locally; nothing goes on the wire and the caller
            // sees an ordinary empty completion.
            xhr.status = 204;
            xhr.ready_state = ReadyState::Done;
            return;
        }
        orig(xhr, body)
    })
}

fn wrap_beacon(orig: BeaconFn, classifier: Arc<dyn Classify>) -> BeaconFn {
    Arc::new(move |url, data| {
        if verdict_or_allow(&*classifier, url, Some("POST")).is_block() {
            debug!("blocked beacon: {url}");
            // Beacons report acceptance, not completion; accepted-and-
            // dropped is indistinguishable to the caller.
            return true;
        }
        orig(url, data)
    })
}

fn wrap_socket(orig: SocketFn, classifier: Arc<dyn Classify>) -> SocketFn {
    Arc::new(move |url, protocols| {
        if verdict_or_allow(&*classifier, url, None).is_block() {
            // Unlike the other primitives, a socket that "succeeds" but
            // carries nothing would leave a live duplex channel half-open.
            // Refuse construction outright.
            warn!("refused socket: {url}");
            return Err(NetError::Blocked {
                url: url.to_owned(),
            });
        }
        orig(url, protocols)
    })
}
