//! Request Classification
//!
//! Pure verdict engine for outbound requests. Every intercepted call
//! (fetch, XHR, beacon, socket) is classified against a fixed rule table
//! before it reaches the real network primitive.
//!
//! Rule precedence (first match wins):
//! 1. Telemetry hosts (crash reporters, analytics collectors): always block
//! 2. App-domain requests with a known non-POST method: always allow
//! 3. App-domain POSTs whose path is a telemetry endpoint: block
//! 4. Everything else: allow
//!
//! Classification is fail-open: an unparseable target must never stop a
//! legitimate request, so parse failures resolve to allow.

use thiserror::Error;
use tracing::trace;
use url::Url;

/// Origin that relative request targets resolve against.
const APP_ORIGIN: &str = "https://discord.com";

/// Hosts blocked for every method and path. Matched by containment so
/// project-hosted collectors (e.g. a sentry ingest under the app's own
/// infrastructure) are caught as well.
const TELEMETRY_HOSTS: &[&str] = &[
    "sentry.io",
    "sentry.discord",
    "bugsnag.com",
    "datadoghq.com",
    "segment.io",
    "amplitude.com",
];

/// The protected application's own domains. Matched as exact host or
/// subdomain suffix.
const APP_HOSTS: &[&str] = &["discord.com", "discordapp.com"];

/// Heavy animated-media CDNs. Only consulted when media blocking is
/// switched on at construction; a bandwidth/memory tradeoff, not a
/// privacy rule.
const MEDIA_HOSTS: &[&str] = &["tenor.com", "giphy.com"];

/// One segment of a telemetry path pattern.
enum Seg {
    /// Exact segment text (already lowercase).
    Lit(&'static str),
    /// A versioned API segment: `v` followed by digits.
    ApiVersion,
    /// An all-digits identifier segment.
    Id,
}

impl Seg {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Seg::Lit(lit) => segment == *lit,
            Seg::ApiVersion => {
                segment.len() > 1
                    && segment.starts_with('v')
                    && segment[1..].bytes().all(|b| b.is_ascii_digit())
            }
            Seg::Id => !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()),
        }
    }
}

/// Telemetry endpoints on the app's own domains. Matched as an exact
/// segment prefix of the request path, never as a substring; `/science`
/// must not drag `/sciencefiction` down with it.
const TELEMETRY_PATHS: &[&[Seg]] = &[
    &[Seg::Lit("api"), Seg::ApiVersion, Seg::Lit("science")],
    &[Seg::Lit("api"), Seg::ApiVersion, Seg::Lit("track")],
    &[
        Seg::Lit("api"),
        Seg::ApiVersion,
        Seg::Lit("users"),
        Seg::Lit("@me"),
        Seg::Lit("analytics"),
    ],
    &[
        Seg::Lit("api"),
        Seg::ApiVersion,
        Seg::Lit("applications"),
        Seg::Id,
        Seg::Lit("analytics"),
    ],
];

/// Classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Let the request through to the original primitive.
    Allow,
    /// Suppress the request.
    Block,
}

impl Verdict {
    /// Check if the request should be suppressed.
    pub fn is_block(&self) -> bool {
        matches!(self, Verdict::Block)
    }

    /// Check if the request may proceed.
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Classifier errors
///
/// `RuleClassifier` never surfaces these; it recovers to allow
/// internally. The type exists so host-supplied classifiers can fail and
/// the interceptor's per-wrapper recovery boundary stays testable.
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    #[error("unparseable request target: {0}")]
    BadTarget(String),

    #[error("classifier failure: {0}")]
    Internal(String),
}

/// Verdict source consulted by the interceptor wrappers.
pub trait Classify: Send + Sync {
    /// Classify a request target. `method` is the HTTP verb when the
    /// caller knows it (`None` for sockets and descriptor-less fetches).
    fn classify(&self, url: &str, method: Option<&str>) -> Result<Verdict, ClassifyError>;
}

/// The fixed rule engine.
///
/// Pure and stateless: identical inputs always yield identical verdicts,
/// with no dependency on installation state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier {
    block_media_hosts: bool,
}

impl RuleClassifier {
    /// Standard rules: telemetry hosts and app-domain telemetry endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard rules plus the heavy animated-media host set.
    pub fn with_media_blocking() -> Self {
        Self {
            block_media_hosts: true,
        }
    }

    /// Rule evaluation proper. Propagates parse errors so the recovery in
    /// [`Classify::classify`] happens in exactly one place.
    fn evaluate(&self, raw: &str, method: Option<&str>) -> Result<Verdict, ClassifyError> {
        let target = parse_target(raw)?;
        let host = target
            .host_str()
            .ok_or_else(|| ClassifyError::BadTarget(raw.to_owned()))?
            .to_ascii_lowercase();
        let path = target.path().to_ascii_lowercase();

        if TELEMETRY_HOSTS.iter().any(|h| host.contains(*h)) {
            return Ok(Verdict::Block);
        }

        if self.block_media_hosts && MEDIA_HOSTS.iter().any(|h| host_in_domain(&host, h)) {
            return Ok(Verdict::Block);
        }

        if !APP_HOSTS.iter().any(|h| host_in_domain(&host, h)) {
            return Ok(Verdict::Allow);
        }

        // Reads against the app's own domains are never blocked; only the
        // POST telemetry endpoints below are.
        if let Some(m) = method {
            if !m.eq_ignore_ascii_case("POST") {
                return Ok(Verdict::Allow);
            }
        }

        if is_telemetry_path(&path) {
            return Ok(Verdict::Block);
        }

        Ok(Verdict::Allow)
    }
}

impl Classify for RuleClassifier {
    fn classify(&self, url: &str, method: Option<&str>) -> Result<Verdict, ClassifyError> {
        Ok(self.evaluate(url, method).unwrap_or_else(|err| {
            trace!("allowing unclassifiable target: {err}");
            Verdict::Allow
        }))
    }
}

/// Check a target against the standard rules. Convenience for callers
/// that do not inject their own [`Classify`] implementation.
pub fn should_block(url: &str, method: Option<&str>) -> bool {
    RuleClassifier::new()
        .classify(url, method)
        .map(|v| v.is_block())
        .unwrap_or(false)
}

fn parse_target(raw: &str) -> Result<Url, ClassifyError> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(APP_ORIGIN)
            .and_then(|base| base.join(raw))
            .map_err(|_| ClassifyError::BadTarget(raw.to_owned())),
        Err(_) => Err(ClassifyError::BadTarget(raw.to_owned())),
    }
}

/// Exact host or subdomain-suffix match (`cdn.discord.com` is in
/// `discord.com`; `notdiscord.com` is not).
fn host_in_domain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn is_telemetry_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    TELEMETRY_PATHS.iter().any(|pattern| {
        pattern.len() <= segments.len()
            && pattern
                .iter()
                .zip(segments.iter())
                .all(|(pat, seg)| pat.matches(seg))
    })
}
