//! Fault directive: the forced delay / forced status carried by a request.
//!
//! A directive is decoded fresh for every inbound request, consumed by one
//! endpoint and, when that endpoint forwards, re-encoded onto the outbound
//! call. The same type backs both transports so the HTTP and RPC surfaces
//! cannot drift apart:
//!
//! ```text
//! HTTP  ?force_delay=50&force_ret=503  ─┐
//!                                       ├─> FaultDirective { delay_ms: 50, forced_status: Some(503) }
//! RPC   BasicRequest { 50, 503 }       ─┘
//! ```
//!
//! # Decoding rules
//!
//! Malformed input is never an error:
//! - `force_delay` that is absent, negative or not an integer decodes to `0`.
//! - `force_ret` that is absent, zero, negative or not an integer decodes to
//!   "no forced status".
//!
//! # Encoding rules
//!
//! Fields are emitted only when they carry information: a zero delay and an
//! absent status are omitted rather than written as literal zeros, so a
//! decode of an encoded directive yields the same directive.

use proto_gen::basic::BasicRequest;
use std::fmt;
use std::time::Duration;

/// Query parameter carrying the forced delay in milliseconds.
pub const ARG_FORCE_DELAY: &str = "force_delay";

/// Query parameter carrying the forced status code.
pub const ARG_FORCE_RETURN_CODE: &str = "force_ret";

/// Decoded fault-injection parameters for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultDirective {
    /// Milliseconds to suspend the request before answering. `0` means no delay.
    pub delay_ms: u64,

    /// Status code to fail with. `None` means succeed normally.
    pub forced_status: Option<u32>,

    /// Route to call downstream. Only meaningful to a forwarding hop.
    pub path: Option<String>,
}

impl FaultDirective {
    /// Build a directive from already-typed values.
    #[must_use]
    pub fn new(delay_ms: u64, forced_status: Option<u32>) -> Self {
        Self {
            delay_ms,
            forced_status: forced_status.filter(|code| *code != 0),
            path: None,
        }
    }

    /// Attach the target path used by a forwarding hop.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.is_empty() { None } else { Some(path) };
        self
    }

    /// Decode from URL query pairs.
    ///
    /// When a key repeats, its first occurrence wins. Unknown keys are
    /// ignored.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut delay: Option<String> = None;
        let mut status: Option<String> = None;

        for (key, value) in pairs {
            match key.as_ref() {
                ARG_FORCE_DELAY if delay.is_none() => delay = Some(value.as_ref().to_string()),
                ARG_FORCE_RETURN_CODE if status.is_none() => {
                    status = Some(value.as_ref().to_string());
                }
                _ => {}
            }
        }

        Self {
            delay_ms: delay.as_deref().map_or(0, parse_delay),
            forced_status: status.as_deref().and_then(parse_status),
            path: None,
        }
    }

    /// Query pairs to append to an outbound HTTP request.
    ///
    /// Only non-default fields are emitted, so the result may be empty.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(2);
        if self.delay_ms > 0 {
            pairs.push((ARG_FORCE_DELAY, self.delay_ms.to_string()));
        }
        if let Some(code) = self.forced_status {
            pairs.push((ARG_FORCE_RETURN_CODE, code.to_string()));
        }
        pairs
    }

    /// Decode from an RPC request message.
    #[must_use]
    pub fn from_rpc(request: &BasicRequest) -> Self {
        Self {
            delay_ms: u64::try_from(request.force_delay).unwrap_or(0),
            forced_status: u32::try_from(request.force_ret)
                .ok()
                .filter(|code| *code != 0),
            path: None,
        }
    }

    /// Encode as an RPC request message.
    ///
    /// Values that do not fit the wire type are clamped to `i32::MAX`.
    #[must_use]
    pub fn to_rpc(&self) -> BasicRequest {
        BasicRequest {
            force_delay: i32::try_from(self.delay_ms).unwrap_or(i32::MAX),
            force_ret: self
                .forced_status
                .map_or(0, |code| i32::try_from(code).unwrap_or(i32::MAX)),
        }
    }

    /// The injected delay as a [`Duration`].
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Suspend the calling task for the injected delay.
    ///
    /// Only the current request is suspended; other requests on the same
    /// runtime keep running. Not cancellable once started other than by
    /// dropping the future.
    pub async fn apply_delay(&self) {
        if self.delay_ms == 0 {
            return;
        }
        tracing::debug!(target: "common.directive", delay_ms = self.delay_ms, "Applying forced delay");
        tokio::time::sleep(self.delay()).await;
    }
}

impl fmt::Display for FaultDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delay: {}, return code: {}",
            self.delay_ms,
            self.forced_status.unwrap_or(0)
        )
    }
}

fn parse_delay(raw: &str) -> u64 {
    raw.parse::<u64>().unwrap_or(0)
}

fn parse_status(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|code| *code != 0)
}
