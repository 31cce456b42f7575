use std::fmt;

/// The application protocol served on a service port.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Http2,
    Grpc,
    Https,
    Mongo,
    Redis,
    Tcp,
    Udp,
}

// === impl Protocol ===

impl Protocol {
    /// Infers a port's protocol from its transport protocol and its name.
    ///
    /// UDP ports are always `Udp`. Otherwise the port name's prefix (up to the first `-`) selects
    /// the protocol, so `http-example` and `http` are both `Http`. Unrecognized or missing names
    /// are treated as opaque TCP.
    pub fn infer(transport: Option<&str>, port_name: &str) -> Self {
        if transport.is_some_and(|t| t.eq_ignore_ascii_case("UDP")) {
            return Self::Udp;
        }

        let prefix = port_name.split('-').next().unwrap_or_default();
        match prefix.to_ascii_lowercase().as_str() {
            "http" => Self::Http,
            "http2" => Self::Http2,
            "grpc" => Self::Grpc,
            "https" => Self::Https,
            "mongo" => Self::Mongo,
            "redis" => Self::Redis,
            _ => Self::Tcp,
        }
    }

    /// Indicates whether the protocol carries HTTP requests that may be routed.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http | Self::Http2 | Self::Grpc)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Http => "HTTP",
            Self::Http2 => "HTTP2",
            Self::Grpc => "GRPC",
            Self::Https => "HTTPS",
            Self::Mongo => "Mongo",
            Self::Redis => "Redis",
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        };
        f.write_str(s)
    }
}
