use std::fmt;

use crate::Target;

/// Device platform generation, told apart by which management port serves the REST path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Generation {
    /// Generation-2 platform, health summary on port 8888.
    Next,
    /// Generation-1 platform, hardware data on port 443.
    Classic,
}

impl Generation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Generation::Next => "next",
            Generation::Classic => "classic",
        }
    }

    pub fn endpoint(&self) -> &'static EndpointSpec {
        match self {
            Generation::Next => &NEXT_ENDPOINT,
            Generation::Classic => &CLASSIC_ENDPOINT,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSpec {
    pub generation: Generation,
    pub scheme: &'static str,
    pub port: u16,
    pub path: &'static str,
    pub content_type: &'static str,
}

pub const NEXT_ENDPOINT: EndpointSpec = EndpointSpec {
    generation: Generation::Next,
    scheme: "https",
    port: 8888,
    path: "/restconf/data/openconfig-system:system/f5-system-health:health/f5-system-health:summary/f5-system-health:components",
    content_type: "application/yang-data+json",
};

pub const CLASSIC_ENDPOINT: EndpointSpec = EndpointSpec {
    generation: Generation::Classic,
    scheme: "https",
    port: 443,
    path: "/mgmt/tm/sys/hardware",
    content_type: "application/json",
};

impl EndpointSpec {
    /// Full request URL for `target`; IPv6 literals are bracketed.
    pub fn url(&self, target: &Target) -> String {
        if target.is_ipv6() {
            format!("{}://[{}]:{}{}", self.scheme, target, self.port, self.path)
        } else {
            format!("{}://{}:{}{}", self.scheme, target, self.port, self.path)
        }
    }
}
