// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! `rtsp://host:port/mount` endpoints.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static RTSP_RE: LazyLock<core::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*)://([^/:]*)(?::([^/]*))?(/.*)?$"));

/// A parsed RTSP URL.
///
/// Both the client (`rtspsrc location`) and the server sink
/// (`qtirtspbin address`, `port`, `mpoint`) are configured from this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspEndpoint {
    /// Host name or IP address.
    pub address: String,
    /// TCP port, never zero.
    pub port: u16,
    /// Mount point, starting with `/`.
    pub mount_point: String,
}

impl FromStr for RtspEndpoint {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self> {
        let fail = |reason: &str| Error::RtspUrl {
            url: url.to_owned(),
            reason: reason.to_owned(),
        };
        let re = RTSP_RE
            .as_ref()
            .map_err(|err| Error::Runtime(format!("RTSP pattern: {}", err)))?;
        let captures = re
            .captures(url.trim())
            .ok_or_else(|| fail("expected rtsp://<address>:<port>/<mount point>"))?;

        if !captures[1].eq_ignore_ascii_case("rtsp") {
            return Err(fail("scheme must be rtsp"));
        }
        let address = &captures[2];
        if address.is_empty() {
            return Err(fail("missing address"));
        }
        let port = match captures.get(3) {
            None => return Err(fail("missing port")),
            Some(port) => port
                .as_str()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| fail("port must be a number between 1 and 65535"))?,
        };
        let mount_point = match captures.get(4) {
            Some(mount) if mount.as_str().len() > 1 => mount.as_str().to_owned(),
            _ => return Err(fail("missing mount point")),
        };

        Ok(RtspEndpoint {
            address: address.to_owned(),
            port,
            mount_point,
        })
    }
}

impl fmt::Display for RtspEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rtsp://{}:{}{}", self.address, self.port, self.mount_point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_components() {
        let endpoint: RtspEndpoint = "rtsp://127.0.0.1:8900/live".parse().unwrap();
        assert_eq!(endpoint.address, "127.0.0.1");
        assert_eq!(endpoint.port, 8900);
        assert_eq!(endpoint.mount_point, "/live");
        assert_eq!(endpoint.to_string(), "rtsp://127.0.0.1:8900/live");
    }

    #[test]
    fn nested_mount_point() {
        let endpoint: RtspEndpoint = "rtsp://camera.local:554/stream/1".parse().unwrap();
        assert_eq!(endpoint.mount_point, "/stream/1");
    }

    fn reason(url: &str) -> String {
        match url.parse::<RtspEndpoint>() {
            Err(Error::RtspUrl { reason, .. }) => reason,
            other => panic!("{:?} parsed as {:?}", url, other),
        }
    }

    #[test]
    fn failures_are_descriptive() {
        assert_eq!(reason("http://127.0.0.1:8900/live"), "scheme must be rtsp");
        assert_eq!(reason("rtsp://127.0.0.1/live"), "missing port");
        assert_eq!(reason("rtsp://:8900/live"), "missing address");
        assert_eq!(reason("rtsp://127.0.0.1:8900"), "missing mount point");
        assert_eq!(reason("rtsp://127.0.0.1:8900/"), "missing mount point");
        assert!(reason("rtsp://127.0.0.1:0/live").starts_with("port"));
        assert!(reason("rtsp://127.0.0.1:http/live").starts_with("port"));
        assert!(reason("127.0.0.1:8900/live").starts_with("expected"));
    }
}
