//! Client address extraction.
//!
//! A gate never looks inside the request itself. It asks an [`Extract`]
//! strategy for an address string and treats `None` as "no match".
//!
//! The built-in [`DefaultExtractor`] walks a fixed chain of accessors on
//! any request type implementing [`PeerAddress`]:
//!
//! ```text
//! connection.remote_addr
//!     → socket.remote_addr
//!     → connection.socket.remote_addr
//!     → remote_ip
//! ```
//!
//! The first accessor yielding a non-empty value wins.

use crate::config::IpExtractionConfig;
use std::net::IpAddr;
use tracing::trace;

/// Strategy that finds the caller's address on a request.
///
/// Implemented for any `Fn(&R) -> Option<String>`, so a closure can be
/// passed wherever an extractor is expected.
pub trait Extract<R>: Send + Sync {
    fn extract(&self, request: &R) -> Option<String>;
}

impl<R, F> Extract<R> for F
where
    F: Fn(&R) -> Option<String> + Send + Sync,
{
    fn extract(&self, request: &R) -> Option<String> {
        self(request)
    }
}

/// Conventional places a request type may carry the peer address.
///
/// Every accessor defaults to `None`; implement the ones your request
/// type actually has.
pub trait PeerAddress {
    /// Address recorded on the connection.
    fn connection_remote_addr(&self) -> Option<&str> {
        None
    }

    /// Address recorded on the socket.
    fn socket_remote_addr(&self) -> Option<&str> {
        None
    }

    /// Address recorded on the socket owned by the connection.
    fn connection_socket_remote_addr(&self) -> Option<&str> {
        None
    }

    /// Address stored directly on the request.
    fn remote_ip(&self) -> Option<&str> {
        None
    }

    /// Header lookup, used by [`HeaderExtractor`].
    fn header(&self, _name: &str) -> Option<&str> {
        None
    }
}

type Accessor<R> = fn(&R) -> Option<&str>;

fn accessors<R: PeerAddress>() -> [(&'static str, Accessor<R>); 4] {
    [
        ("connection.remote_addr", R::connection_remote_addr as Accessor<R>),
        ("socket.remote_addr", R::socket_remote_addr as Accessor<R>),
        (
            "connection.socket.remote_addr",
            R::connection_socket_remote_addr as Accessor<R>,
        ),
        ("remote_ip", R::remote_ip as Accessor<R>),
    ]
}

/// Walk the accessor chain and return the first non-empty value.
pub fn peer_address<R: PeerAddress>(request: &R) -> Option<&str> {
    accessors::<R>().into_iter().find_map(|(path, accessor)| {
        let value = accessor(request).filter(|v| !v.trim().is_empty())?;
        trace!(path, address = value, "Peer address resolved");
        Some(value)
    })
}

/// Extractor used when none is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtractor;

impl<R: PeerAddress> Extract<R> for DefaultExtractor {
    fn extract(&self, request: &R) -> Option<String> {
        peer_address(request).map(str::to_string)
    }
}

/// Extractor that trusts proxy headers before the peer address.
///
/// With no headers configured it behaves exactly like [`DefaultExtractor`].
#[derive(Debug, Clone, Default)]
pub struct HeaderExtractor {
    headers: Vec<String>,
    use_first_ip: bool,
}

impl HeaderExtractor {
    /// Build from the `ip_extraction` section; a disabled section yields an
    /// extractor that only reads the peer address.
    pub fn from_config(config: &IpExtractionConfig) -> Self {
        let headers = if config.enabled {
            config.headers.iter().map(|h| h.to_lowercase()).collect()
        } else {
            Vec::new()
        };

        Self {
            headers,
            use_first_ip: config.use_first_ip,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn from_headers<R: PeerAddress>(&self, request: &R) -> Option<String> {
        self.headers.iter().find_map(|name| {
            let value = request.header(name)?;
            let candidate = if self.use_first_ip {
                // X-Forwarded-For: client, proxy1, proxy2
                value.split(',').next()?
            } else {
                // Use the last IP (closest proxy)
                value.split(',').last()?
            };
            let candidate = candidate.trim();

            candidate.parse::<IpAddr>().ok()?;
            trace!(header = %name, address = candidate, "Client address taken from header");
            Some(candidate.to_string())
        })
    }
}

impl<R: PeerAddress> Extract<R> for HeaderExtractor {
    fn extract(&self, request: &R) -> Option<String> {
        self.from_headers(request)
            .or_else(|| peer_address(request).map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeRequest {
        connection: Option<String>,
        socket: Option<String>,
        connection_socket: Option<String>,
        ip: Option<String>,
        headers: HashMap<String, String>,
    }

    impl PeerAddress for FakeRequest {
        fn connection_remote_addr(&self) -> Option<&str> {
            self.connection.as_deref()
        }

        fn socket_remote_addr(&self) -> Option<&str> {
            self.socket.as_deref()
        }

        fn connection_socket_remote_addr(&self) -> Option<&str> {
            self.connection_socket.as_deref()
        }

        fn remote_ip(&self) -> Option<&str> {
            self.ip.as_deref()
        }

        fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name).map(String::as_str)
        }
    }

    fn header_config(headers: &[&str], use_first_ip: bool) -> IpExtractionConfig {
        IpExtractionConfig {
            enabled: true,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            use_first_ip,
        }
    }

    #[test]
    fn test_default_extractor_each_path() {
        let requests = [
            FakeRequest {
                connection: Some("192.168.0.1".to_string()),
                ..Default::default()
            },
            FakeRequest {
                socket: Some("192.168.0.1".to_string()),
                ..Default::default()
            },
            FakeRequest {
                connection_socket: Some("192.168.0.1".to_string()),
                ..Default::default()
            },
            FakeRequest {
                ip: Some("192.168.0.1".to_string()),
                ..Default::default()
            },
        ];

        for request in &requests {
            assert_eq!(
                DefaultExtractor.extract(request),
                Some("192.168.0.1".to_string())
            );
        }
    }

    #[test]
    fn test_default_extractor_prefers_first_path() {
        let request = FakeRequest {
            connection: Some("10.0.0.1".to_string()),
            socket: Some("10.0.0.2".to_string()),
            connection_socket: Some("10.0.0.3".to_string()),
            ip: Some("10.0.0.4".to_string()),
            ..Default::default()
        };
        assert_eq!(DefaultExtractor.extract(&request), Some("10.0.0.1".to_string()));

        let request = FakeRequest {
            socket: Some("10.0.0.2".to_string()),
            ip: Some("10.0.0.4".to_string()),
            ..Default::default()
        };
        assert_eq!(DefaultExtractor.extract(&request), Some("10.0.0.2".to_string()));
    }

    #[test]
    fn test_default_extractor_skips_empty_values() {
        let request = FakeRequest {
            connection: Some(String::new()),
            socket: Some("  ".to_string()),
            ip: Some("10.0.0.4".to_string()),
            ..Default::default()
        };
        assert_eq!(DefaultExtractor.extract(&request), Some("10.0.0.4".to_string()));
    }

    #[test]
    fn test_default_extractor_none() {
        assert!(DefaultExtractor.extract(&FakeRequest::default()).is_none());
    }

    #[test]
    fn test_closure_extractor() {
        let lookup = |req: &FakeRequest| req.headers.get("some-fake-header").cloned();

        let mut request = FakeRequest::default();
        request
            .headers
            .insert("some-fake-header".to_string(), "192.168.0.1".to_string());

        assert_eq!(lookup.extract(&request), Some("192.168.0.1".to_string()));
    }

    #[test]
    fn test_header_extractor_xff_first() {
        let extractor = HeaderExtractor::from_config(&header_config(&["x-forwarded-for"], true));

        let mut request = FakeRequest::default();
        request.headers.insert(
            "x-forwarded-for".to_string(),
            "1.2.3.4, 5.6.7.8, 9.10.11.12".to_string(),
        );

        assert_eq!(extractor.extract(&request), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn test_header_extractor_xff_last() {
        let extractor = HeaderExtractor::from_config(&header_config(&["x-forwarded-for"], false));

        let mut request = FakeRequest::default();
        request.headers.insert(
            "x-forwarded-for".to_string(),
            "1.2.3.4, 5.6.7.8, 9.10.11.12".to_string(),
        );

        assert_eq!(extractor.extract(&request), Some("9.10.11.12".to_string()));
    }

    #[test]
    fn test_header_extractor_priority() {
        let extractor =
            HeaderExtractor::from_config(&header_config(&["X-Forwarded-For", "x-real-ip"], true));
        assert_eq!(extractor.headers(), ["x-forwarded-for", "x-real-ip"]);

        let mut request = FakeRequest::default();
        request
            .headers
            .insert("x-forwarded-for".to_string(), "1.2.3.4".to_string());
        request
            .headers
            .insert("x-real-ip".to_string(), "5.6.7.8".to_string());

        // Should use x-forwarded-for since it's first in the list
        assert_eq!(extractor.extract(&request), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn test_header_extractor_skips_garbage_header() {
        let extractor =
            HeaderExtractor::from_config(&header_config(&["x-forwarded-for", "x-real-ip"], true));

        let mut request = FakeRequest::default();
        request
            .headers
            .insert("x-forwarded-for".to_string(), "unknown".to_string());
        request
            .headers
            .insert("x-real-ip".to_string(), "5.6.7.8".to_string());

        assert_eq!(extractor.extract(&request), Some("5.6.7.8".to_string()));
    }

    #[test]
    fn test_header_extractor_falls_back_to_peer() {
        let extractor = HeaderExtractor::from_config(&header_config(&["x-real-ip"], true));

        let request = FakeRequest {
            socket: Some("10.9.8.7".to_string()),
            ..Default::default()
        };

        assert_eq!(extractor.extract(&request), Some("10.9.8.7".to_string()));
    }

    #[test]
    fn test_header_extractor_disabled_ignores_headers() {
        let mut config = header_config(&["x-real-ip"], true);
        config.enabled = false;
        let extractor = HeaderExtractor::from_config(&config);
        assert!(extractor.headers().is_empty());

        let mut request = FakeRequest {
            connection: Some("10.0.0.1".to_string()),
            ..Default::default()
        };
        request
            .headers
            .insert("x-real-ip".to_string(), "5.6.7.8".to_string());

        assert_eq!(extractor.extract(&request), Some("10.0.0.1".to_string()));
    }
}
