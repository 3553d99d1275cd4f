//! Server configuration module
//! Handles dynamic configuration parameters for the relay server

use crate::constants::{
    DEFAULT_HOST, DEFAULT_MAX_FRAME_SIZE, DEFAULT_OUTBOUND_QUEUE_CAPACITY, DEFAULT_PORT,
    DEFAULT_ROOM_GRACE_PERIOD_SECS, DEFAULT_STATIC_DIR, DEFAULT_STORAGE_DIR, DEV_SERVER_PORT,
    FALLBACK_STATIC_DIR,
};
use crate::error::{Result, RustyRoomsError};
use crate::security::OriginPolicy;
use std::env;
use std::net::{IpAddr, UdpSocket};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// What the hub does with a room once its last subscriber is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomRetention {
    /// Keep every room for the lifetime of the process
    Retain,
    /// Drop a room that stayed empty for `grace`
    ReapWhenEmpty { grace: Duration },
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the markdown documents
    pub storage_dir: PathBuf,
    /// Directory holding the built front end bundle
    pub static_dir: PathBuf,
    /// Pending frames allowed per subscriber before eviction
    pub outbound_queue_capacity: usize,
    /// Largest inbound message accepted from a peer, in bytes
    pub max_frame_size: usize,
    /// Disconnect peers that stay silent this long (None disables the check)
    pub idle_timeout: Option<Duration>,
    pub room_retention: RoomRetention,
    /// Which browser origins may open a room connection
    pub origin_policy: OriginPolicy,
    /// Origins allowed by the CORS layer of the HTTP API
    pub cors_origins: Vec<String>,
    /// TLS configuration
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    /// Enable TLS
    pub enable_tls: bool,
}

impl ServerConfig {
    /// Configuration with defaults and no environment lookups, for tests
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            idle_timeout: None,
            room_retention: RoomRetention::Retain,
            origin_policy: OriginPolicy::AllowAny,
            cors_origins: vec![format!("http://localhost:{}", DEV_SERVER_PORT)],
            tls_cert_path: None,
            tls_key_path: None,
            enable_tls: false,
        }
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = var("RUSTY_ROOMS_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = parse_var(&var, "RUSTY_ROOMS_PORT")?.unwrap_or(DEFAULT_PORT);

        let storage_dir = var("RUSTY_ROOMS_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));

        let static_dir = match var("RUSTY_ROOMS_STATIC_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_static_dir(),
        };

        let outbound_queue_capacity = parse_var(&var, "RUSTY_ROOMS_QUEUE_CAPACITY")?
            .unwrap_or(DEFAULT_OUTBOUND_QUEUE_CAPACITY);
        if outbound_queue_capacity == 0 {
            return Err(RustyRoomsError::ConfigError(
                "RUSTY_ROOMS_QUEUE_CAPACITY must be at least 1".to_string(),
            ));
        }

        let max_frame_size =
            parse_var(&var, "RUSTY_ROOMS_MAX_FRAME_SIZE")?.unwrap_or(DEFAULT_MAX_FRAME_SIZE);
        if max_frame_size == 0 {
            return Err(RustyRoomsError::ConfigError(
                "RUSTY_ROOMS_MAX_FRAME_SIZE must be at least 1".to_string(),
            ));
        }

        // 0 or unset keeps the historical behavior: no idle timeout
        let idle_timeout = parse_var::<u64, _>(&var, "RUSTY_ROOMS_IDLE_TIMEOUT_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let grace_secs = parse_var(&var, "RUSTY_ROOMS_ROOM_GRACE_SECS")?
            .unwrap_or(DEFAULT_ROOM_GRACE_PERIOD_SECS);
        let room_retention = match var("RUSTY_ROOMS_ROOM_RETENTION") {
            Some(value) => parse_retention(&value, grace_secs)?,
            None => RoomRetention::ReapWhenEmpty {
                grace: Duration::from_secs(grace_secs),
            },
        };

        let origin_policy = match var("RUSTY_ROOMS_ALLOWED_ORIGINS") {
            Some(list) if !list.trim().is_empty() => OriginPolicy::allow_list(split_list(&list))?,
            _ => OriginPolicy::AllowAny,
        };

        let cors_origins = match var("RUSTY_ROOMS_CORS_ORIGINS") {
            Some(list) if !list.trim().is_empty() => split_list(&list),
            _ => default_cors_origins(port),
        };
        // warp's CORS builder panics on malformed origins, so reject them here
        let cors_origins = cors_origins
            .iter()
            .map(|origin| normalize_cors_origin(origin))
            .collect::<Result<Vec<_>>>()?;

        // TLS configuration
        let enable_tls = var("RUSTY_ROOMS_ENABLE_TLS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let tls_cert_path = var("RUSTY_ROOMS_TLS_CERT_PATH");
        let tls_key_path = var("RUSTY_ROOMS_TLS_KEY_PATH");

        // Validate TLS configuration if enabled
        if enable_tls {
            if tls_cert_path.is_none() || tls_key_path.is_none() {
                return Err(RustyRoomsError::ConfigError(
                    "TLS is enabled but RUSTY_ROOMS_TLS_CERT_PATH or RUSTY_ROOMS_TLS_KEY_PATH is not set".to_string()
                ));
            }

            if let (Some(ref cert_path), Some(ref key_path)) = (&tls_cert_path, &tls_key_path) {
                if !std::path::Path::new(cert_path).exists() {
                    return Err(RustyRoomsError::ConfigError(format!(
                        "TLS certificate file does not exist: {}",
                        cert_path
                    )));
                }
                if !std::path::Path::new(key_path).exists() {
                    return Err(RustyRoomsError::ConfigError(format!(
                        "TLS private key file does not exist: {}",
                        key_path
                    )));
                }
            }
        }

        Ok(Self {
            host,
            port,
            storage_dir,
            static_dir,
            outbound_queue_capacity,
            max_frame_size,
            idle_timeout,
            room_retention,
            origin_policy,
            cors_origins,
            tls_cert_path,
            tls_key_path,
            enable_tls,
        })
    }
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            RustyRoomsError::ConfigError(format!("{} has an invalid value: '{}'", name, raw))
        }),
        None => Ok(None),
    }
}

fn parse_retention(value: &str, grace_secs: u64) -> Result<RoomRetention> {
    match value.trim().to_lowercase().as_str() {
        "retain" => Ok(RoomRetention::Retain),
        "reap" => Ok(RoomRetention::ReapWhenEmpty {
            grace: Duration::from_secs(grace_secs),
        }),
        other => Err(RustyRoomsError::ConfigError(format!(
            "RUSTY_ROOMS_ROOM_RETENTION must be 'retain' or 'reap', got '{}'",
            other
        ))),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_cors_origin(origin: &str) -> Result<String> {
    let url = url::Url::parse(origin).map_err(|e| {
        RustyRoomsError::ConfigError(format!("Invalid CORS origin '{}': {}", origin, e))
    })?;
    let normalized = url.origin();
    if !normalized.is_tuple() {
        return Err(RustyRoomsError::ConfigError(format!(
            "Invalid CORS origin '{}': no host",
            origin
        )));
    }
    Ok(normalized.ascii_serialization())
}

fn default_static_dir() -> PathBuf {
    let primary = PathBuf::from(DEFAULT_STATIC_DIR);
    if primary.exists() {
        return primary;
    }
    log::warn!(
        "Static directory {} does not exist, falling back to {}",
        primary.display(),
        FALLBACK_STATIC_DIR
    );
    PathBuf::from(FALLBACK_STATIC_DIR)
}

/// Dev server and bundled UI origins, on localhost and on the LAN address
fn default_cors_origins(port: u16) -> Vec<String> {
    let mut hosts = vec!["localhost".to_string()];
    if let Some(ip) = local_ipv4() {
        hosts.push(ip.to_string());
    }

    hosts
        .iter()
        .flat_map(|host| {
            [DEV_SERVER_PORT, port]
                .into_iter()
                .map(move |p| format!("http://{}:{}", host, p))
        })
        .collect()
}

/// First non-loopback IPv4 address of this machine
///
/// Connecting a UDP socket only selects a route, no packet is sent.
pub fn local_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (ip.is_ipv4() && !ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}
