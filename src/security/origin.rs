//! Origin validation for room connections
//!
//! Browsers always send an `Origin` header on WebSocket upgrades, which is the
//! only signal available to stop another site from joining a room on behalf
//! of a visitor. The historical deployment accepted every origin, so
//! `AllowAny` stays the default and the allow-list is opt-in.

use std::collections::HashSet;

use url::Url;

use crate::error::{Result, RustyRoomsError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept any origin, including requests without an `Origin` header
    AllowAny,
    /// Accept only these normalized origins
    AllowList(HashSet<String>),
}

impl OriginPolicy {
    /// Build an allow-list, normalizing every entry
    pub fn allow_list<I>(origins: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut allowed = HashSet::new();
        for origin in origins {
            let origin = origin.as_ref();
            let normalized = normalize_origin(origin).ok_or_else(|| {
                RustyRoomsError::ConfigError(format!("Invalid allowed origin '{}'", origin))
            })?;
            allowed.insert(normalized);
        }

        if allowed.is_empty() {
            return Err(RustyRoomsError::ConfigError(
                "Origin allow-list must contain at least one origin".to_string(),
            ));
        }

        Ok(OriginPolicy::AllowList(allowed))
    }

    /// Check the `Origin` header value of an upgrade request
    pub fn check(&self, origin: Option<&str>) -> Result<()> {
        match self {
            OriginPolicy::AllowAny => Ok(()),
            OriginPolicy::AllowList(allowed) => {
                let origin = origin
                    .ok_or_else(|| RustyRoomsError::OriginRejected("<missing>".to_string()))?;

                match normalize_origin(origin) {
                    Some(normalized) if allowed.contains(&normalized) => Ok(()),
                    _ => {
                        log::warn!("Rejected connection from origin '{}'", origin);
                        Err(RustyRoomsError::OriginRejected(origin.to_string()))
                    }
                }
            }
        }
    }

    pub fn is_allow_any(&self) -> bool {
        matches!(self, OriginPolicy::AllowAny)
    }
}

/// Reduce an origin to `scheme://host[:port]`, mapping ws/wss onto http/https
fn normalize_origin(origin: &str) -> Option<String> {
    let mut url = Url::parse(origin.trim()).ok()?;

    let scheme = match url.scheme() {
        "ws" => "http",
        "wss" => "https",
        "http" | "https" => return serialized(&url),
        _ => return None,
    };
    url.set_scheme(scheme).ok()?;
    serialized(&url)
}

fn serialized(url: &Url) -> Option<String> {
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
