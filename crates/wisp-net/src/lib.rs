//! Wisp Network Layer
//!
//! Request classification and reversible interception of the page's
//! network primitives.
//!
//! Flow:
//! 1. The shell binds its platform primitives into a [`GlobalTable`]
//! 2. [`Interceptor::install`] swaps classified wrappers into the slots
//! 3. Blocked calls are answered locally; allowed calls forward untouched
//! 4. [`Interceptor::uninstall`] restores the exact original references

mod classify;
mod globals;
mod interceptor;

pub use classify::{Classify, ClassifyError, RuleClassifier, Verdict, should_block};
pub use globals::{
    BeaconFn, FetchFn, FetchFuture, FetchInit, FetchInput, FetchRequest, GlobalTable,
    HttpResponse, NetError, ReadyState, Socket, SocketFn, Xhr, XhrOpenArgs, XhrOpenFn, XhrSendFn,
};
pub use interceptor::{Interceptor, NOOP_TARGET};
