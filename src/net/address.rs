//! Socket addresses exposed by a native channel, and client-IP extraction.
//!
//! # Responsibilities
//! - Model inet (possibly unresolved) and non-inet socket addresses
//! - Pick the client IP from a channel's local/remote addresses
//!
//! # Design Decisions
//! - Forwarding headers (X-Forwarded-For) are ignored here; that policy is app specific
//! - Local address is consulted first by default, matching the gateway's historical behaviour

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// An inet socket address whose host may be unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InetSocketAddress {
    ip: Option<IpAddr>,
    host: Option<String>,
    port: u16,
}

impl InetSocketAddress {
    /// An address for a host name that has not been resolved to an IP.
    pub fn unresolved(host: impl Into<String>, port: u16) -> Self {
        Self {
            ip: None,
            host: Some(host.into()),
            port,
        }
    }

    /// Attach the host name the address was created with.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host name if one was given, otherwise the IP literal.
    pub fn host_string(&self) -> String {
        match (&self.host, self.ip) {
            (Some(host), _) => host.clone(),
            (None, Some(ip)) => ip.to_string(),
            (None, None) => String::new(),
        }
    }
}

impl From<SocketAddr> for InetSocketAddress {
    fn from(addr: SocketAddr) -> Self {
        Self {
            ip: Some(addr.ip()),
            host: None,
            port: addr.port(),
        }
    }
}

/// A socket address as seen by the network layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAddress {
    Inet(InetSocketAddress),
    Unix(PathBuf),
}

impl SocketAddress {
    pub fn as_inet(&self) -> Option<&InetSocketAddress> {
        match self {
            SocketAddress::Inet(inet) => Some(inet),
            SocketAddress::Unix(_) => None,
        }
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        SocketAddress::Inet(addr.into())
    }
}

impl From<InetSocketAddress> for SocketAddress {
    fn from(addr: InetSocketAddress) -> Self {
        SocketAddress::Inet(addr)
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketAddress::Inet(inet) => write!(f, "{}:{}", inet.host_string(), inet.port),
            SocketAddress::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Local and remote addresses of a connection.
pub trait NativeChannel {
    fn local_address(&self) -> Option<SocketAddress>;
    fn remote_address(&self) -> Option<SocketAddress>;
}

/// Plain address pair, for native layers that know both ends up front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionAddresses {
    pub local: Option<SocketAddress>,
    pub remote: Option<SocketAddress>,
}

impl NativeChannel for ConnectionAddresses {
    fn local_address(&self) -> Option<SocketAddress> {
        self.local.clone()
    }

    fn remote_address(&self) -> Option<SocketAddress> {
        self.remote.clone()
    }
}

/// Which end of the connection is consulted first for the client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressPreference {
    #[default]
    LocalFirst,
    RemoteFirst,
}

/// Textual client IP for a channel.
///
/// No channel yields `Some("")`. Otherwise the first inet address with a
/// resolved IP wins, in `preference` order; `None` if neither has one.
pub fn client_ip(channel: Option<&dyn NativeChannel>, preference: AddressPreference) -> Option<String> {
    let Some(channel) = channel else {
        return Some(String::new());
    };

    let candidates = match preference {
        AddressPreference::LocalFirst => [channel.local_address(), channel.remote_address()],
        AddressPreference::RemoteFirst => [channel.remote_address(), channel.local_address()],
    };

    candidates
        .iter()
        .flatten()
        .find_map(|addr| addr.as_inet().and_then(InetSocketAddress::ip))
        .map(|ip| ip.to_string())
}

/// The channel's local inet address, if it has one.
pub fn local_inet(channel: Option<&dyn NativeChannel>) -> Option<InetSocketAddress> {
    match channel?.local_address()? {
        SocketAddress::Inet(inet) => Some(inet),
        SocketAddress::Unix(_) => None,
    }
}
