//! Transport surfaces a fixture can be reached on.

use std::fmt;

/// The protocol surface a request arrived on (or is forwarded over).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// `GET /<path>?force_delay=..&force_ret=..`
    Http,
    /// `BasicService/Request(force_delay, force_ret)`
    Grpc,
}

impl Transport {
    /// Stable lowercase label for metrics and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Grpc => "grpc",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_labels() {
        assert_eq!(Transport::Http.as_str(), "http");
        assert_eq!(Transport::Grpc.to_string(), "grpc");
    }
}
