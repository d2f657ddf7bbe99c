//! Parsing of plain-text proxy lists.

use crate::proxy::{ProxyEndpoint, ProxyType};
use url::Url;

/// Turns raw source content into proxy candidates.
pub trait ProxyParser: Send + Sync {
    fn parse(&self, content: &str) -> Vec<ProxyEndpoint>;
}

/// Parses one proxy per line.
///
/// Accepts `host:port` and `scheme://[user[:pass]@]host:port`. Blank lines,
/// `#` comments and malformed lines are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser {
    default_type: ProxyType,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type assigned to bare `host:port` lines and unknown schemes.
    pub fn with_default_type(default_type: ProxyType) -> Self {
        Self { default_type }
    }

    fn parse_line(&self, line: &str) -> Option<ProxyEndpoint> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if line.contains("://") {
            return self.parse_url(line);
        }

        let (host, port) = line.split_once(':')?;
        if host.is_empty() || port.contains(':') {
            return None;
        }
        let port = port.trim().parse::<u16>().ok()?;
        Some(ProxyEndpoint::new(host.trim(), port, self.default_type))
    }

    fn parse_url(&self, line: &str) -> Option<ProxyEndpoint> {
        let url = Url::parse(line).ok()?;
        let proxy_type = ProxyType::from_scheme(url.scheme()).unwrap_or(self.default_type);
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;

        let mut endpoint = ProxyEndpoint::new(host, port, proxy_type);
        if !url.username().is_empty() {
            let password = url.password().map(str::to_string);
            endpoint = endpoint.with_credentials(url.username(), password);
        }
        Some(endpoint)
    }
}

impl ProxyParser for LineParser {
    fn parse(&self, content: &str) -> Vec<ProxyEndpoint> {
        content.lines().filter_map(|line| self.parse_line(line)).collect()
    }
}
