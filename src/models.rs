use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Up,
    Down,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Up => "UP",
            Status::Down => "DOWN",
        }
    }
}

/// Identity of one monitored endpoint. The path is deliberately not part of
/// the key: two paths on the same port count as the same service for alerting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub host: String,
    pub service: String,
    pub port: u16,
}

impl EndpointKey {
    pub fn new(host: impl Into<String>, service: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            port,
        }
    }

    /// Canonical encoding used as the key in the durable state file.
    /// A fixed-order JSON array, so equal tuples always encode identically.
    pub fn canonical(&self) -> String {
        serde_json::json!([self.host, self.service, self.port]).to_string()
    }

    pub fn from_canonical(s: &str) -> Option<Self> {
        let (host, service, port): (String, String, u16) = serde_json::from_str(s).ok()?;
        Some(Self { host, service, port })
    }
}

impl std::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}:{}", self.service, self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Outcome of one probe. Produced fresh each cycle; only `up` is persisted.
#[derive(Debug, Clone, Copy)]
pub struct ProbeVerdict {
    pub up: bool,
    pub protocol: Option<Protocol>,
    pub observed_at: DateTime<Utc>,
}

impl ProbeVerdict {
    pub fn reachable(protocol: Protocol) -> Self {
        Self {
            up: true,
            protocol: Some(protocol),
            observed_at: Utc::now(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            up: false,
            protocol: None,
            observed_at: Utc::now(),
        }
    }
}

/// Previous persisted verdict for an endpoint. An endpoint never seen before
/// is `Unknown`, which must not be treated as a recovery when it comes up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrevStatus {
    Unknown,
    Up,
    Down,
}

impl From<Option<bool>> for PrevStatus {
    fn from(persisted: Option<bool>) -> Self {
        match persisted {
            None => PrevStatus::Unknown,
            Some(true) => PrevStatus::Up,
            Some(false) => PrevStatus::Down,
        }
    }
}
