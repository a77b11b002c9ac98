//! Core types shared by the target builder, the device prober and the CLI.

pub mod endpoint;
pub mod error;
pub mod outcome;
pub mod session;

pub use endpoint::{EndpointSpec, Generation, CLASSIC_ENDPOINT, NEXT_ENDPOINT};
pub use error::FetchError;
pub use outcome::ProbeOutcome;
pub use session::FetchSession;

use std::fmt;
use std::net::IpAddr;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// A single address to probe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target(pub String);

impl Target {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the address is an IPv6 literal and needs brackets inside a URL.
    pub fn is_ipv6(&self) -> bool {
        matches!(self.0.parse::<IpAddr>(), Ok(IpAddr::V6(_)))
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target(s.to_string())
    }
}

impl From<IpAddr> for Target {
    fn from(ip: IpAddr) -> Self {
        Target(ip.to_string())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
