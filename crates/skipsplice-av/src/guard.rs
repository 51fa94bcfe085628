//! Outbound URL safety checks for stream URLs and their redirect targets.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use skipsplice_core::{Error, Result};
use url::{Host, Url};

/// Rejects URLs that would make the prober reach internal hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlGuard {
    allow_private: bool,
}

impl UrlGuard {
    pub fn new(allow_private: bool) -> Self {
        Self { allow_private }
    }

    /// Guard that only checks the URL shape.
    pub fn permissive() -> Self {
        Self::new(true)
    }

    /// Parse `raw` and make sure every address it names is public.
    ///
    /// Hostnames are resolved and each resolved address is checked.
    pub async fn check(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim())
            .map_err(|e| Error::validation(format!("invalid stream url: {e}")))?;
        let host = checked_host(&url)?;
        if self.allow_private {
            return Ok(url);
        }

        match host {
            Host::Ipv4(ip) => ensure_public(IpAddr::V4(ip))?,
            Host::Ipv6(ip) => ensure_public(IpAddr::V6(ip))?,
            Host::Domain(name) => {
                let name = name.trim_end_matches('.').to_ascii_lowercase();
                if is_blocked_name(&name) {
                    return Err(Error::validation(format!("blocked host: {name}")));
                }
                let port = url.port_or_known_default().unwrap_or(80);
                let addrs = tokio::net::lookup_host((name.as_str(), port))
                    .await
                    .map_err(|e| Error::validation(format!("cannot resolve {name}: {e}")))?;
                let mut any = false;
                for addr in addrs {
                    ensure_public(addr.ip())?;
                    any = true;
                }
                if !any {
                    return Err(Error::validation(format!("{name} resolved to no addresses")));
                }
            }
        }

        Ok(url)
    }

    /// Check without name resolution, for use inside a redirect policy.
    ///
    /// Catches internal IP literals, blocked names and bad schemes. A public
    /// looking hostname passes; callers re-check the terminal URL with
    /// [`UrlGuard::check`].
    pub fn blocks(&self, url: &Url) -> bool {
        let host = match checked_host(url) {
            Ok(host) => host,
            Err(_) => return true,
        };
        if self.allow_private {
            return false;
        }
        match host {
            Host::Ipv4(ip) => is_internal(IpAddr::V4(ip)),
            Host::Ipv6(ip) => is_internal(IpAddr::V6(ip)),
            Host::Domain(name) => is_blocked_name(&name.trim_end_matches('.').to_ascii_lowercase()),
        }
    }
}

fn checked_host(url: &Url) -> Result<Host<&str>> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::validation(format!(
            "unsupported url scheme: {}",
            url.scheme()
        )));
    }
    url.host()
        .ok_or_else(|| Error::validation("stream url has no host"))
}

fn is_blocked_name(name: &str) -> bool {
    name == "localhost" || name.ends_with(".localhost") || name == "metadata.google.internal"
}

fn ensure_public(ip: IpAddr) -> Result<()> {
    if is_internal(ip) {
        return Err(Error::validation(format!("address not allowed: {ip}")));
    }
    Ok(())
}

fn is_internal(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal_v4(v4),
            None => is_internal_v6(v6),
        },
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0xC0) == 64)
        // 0.0.0.0/8 "this network"
        || a == 0
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xFE00) == 0xFC00
        // fe80::/10 link local
        || (first & 0xFFC0) == 0xFE80
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn rejected(url: &str) -> bool {
        matches!(UrlGuard::default().check(url).await, Err(Error::Validation(_)))
    }

    #[tokio::test]
    async fn public_ip_literals_pass() {
        let url = UrlGuard::default()
            .check("https://203.0.113.10/show/ep1.mkv")
            .await
            .unwrap();
        assert_eq!(url.host_str(), Some("203.0.113.10"));
        assert!(UrlGuard::default().check("http://[2606:4700::1111]/a.mp4").await.is_ok());
    }

    #[tokio::test]
    async fn internal_addresses_are_rejected() {
        for url in [
            "http://127.0.0.1/a.mkv",
            "http://10.1.2.3/a.mkv",
            "http://172.16.0.1/a.mkv",
            "http://192.168.1.10/a.mkv",
            "http://100.64.0.1/a.mkv",
            "http://169.254.169.254/latest/meta-data",
            "http://0.0.0.0/a.mkv",
            "http://[::1]/a.mkv",
            "http://[fd00::1]/a.mkv",
            "http://[fe80::1]/a.mkv",
            "http://[::ffff:127.0.0.1]/a.mkv",
        ] {
            assert!(rejected(url).await, "{url} should be rejected");
        }
    }

    #[tokio::test]
    async fn blocked_names_are_rejected_without_lookup() {
        for url in [
            "http://localhost:8080/a.mkv",
            "http://media.localhost/a.mkv",
            "http://metadata.google.internal/computeMetadata/v1/",
            "http://LOCALHOST./a.mkv",
        ] {
            assert!(rejected(url).await, "{url} should be rejected");
        }
    }

    #[tokio::test]
    async fn bad_shapes_are_rejected() {
        for url in ["ftp://203.0.113.10/a.mkv", "file:///etc/passwd", "not a url", "data:text/plain,hi"] {
            assert!(rejected(url).await, "{url} should be rejected");
        }
    }

    #[tokio::test]
    async fn permissive_guard_allows_loopback() {
        let guard = UrlGuard::permissive();
        assert!(guard.check("http://127.0.0.1:9000/a.mkv").await.is_ok());
        assert!(matches!(
            guard.check("ftp://127.0.0.1/a").await,
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn redirect_hops_are_screened_without_lookup() {
        let guard = UrlGuard::default();
        let url = |s: &str| Url::parse(s).unwrap();

        assert!(guard.blocks(&url("http://169.254.169.254/latest/meta-data")));
        assert!(guard.blocks(&url("http://10.0.0.7:8080/admin")));
        assert!(guard.blocks(&url("http://localhost/a.mkv")));
        assert!(guard.blocks(&url("file:///etc/passwd")));
        assert!(!guard.blocks(&url("https://203.0.113.10/a.mkv")));
        assert!(!guard.blocks(&url("https://cdn.example.com/a.mkv")));

        assert!(!UrlGuard::permissive().blocks(&url("http://127.0.0.1/a.mkv")));
    }

    #[test]
    fn cgnat_boundaries() {
        assert!(is_internal("100.64.0.0".parse().unwrap()));
        assert!(is_internal("100.127.255.255".parse().unwrap()));
        assert!(!is_internal("100.128.0.1".parse().unwrap()));
        assert!(!is_internal("8.8.8.8".parse().unwrap()));
    }
}
