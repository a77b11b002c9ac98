//! Target set building: single addresses, CIDR ranges and target files.

use anyhow::{anyhow, Context, Result};
use healthfetch_core::Target;
use ipnet::IpNet;
use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::debug;

/// Largest number of hosts a single range may expand to.
pub const MAX_RANGE_HOSTS: usize = 65_536;

/// Expand a CIDR into its usable host addresses. Host bits in the input are ignored.
pub fn expand_cidr(cidr: &str) -> Result<Vec<IpAddr>> {
    let net: IpNet = cidr.parse()?;
    let ips: Vec<IpAddr> = net.hosts().take(MAX_RANGE_HOSTS + 1).collect();
    if ips.len() > MAX_RANGE_HOSTS {
        return Err(anyhow!("range {} expands to more than {} hosts", cidr, MAX_RANGE_HOSTS));
    }
    Ok(ips)
}

/// Parse one entry: an IPv4/IPv6 literal or a CIDR range.
pub fn parse_spec(input: &str) -> Result<Vec<Target>> {
    let s = input.trim();
    if let Ok(ip) = s.parse::<IpAddr>() {
        return Ok(vec![Target::from(ip)]);
    }
    if s.contains('/') {
        if let Ok(net) = s.parse::<IpNet>() {
            let ips = expand_cidr(&net.to_string())?;
            return Ok(ips.into_iter().map(Target::from).collect());
        }
    }
    Err(anyhow!("invalid address or range: {}", s))
}

/// Read a newline-delimited target file (comments with # and blanks ignored).
pub fn read_target_file(path: &Path) -> Result<Vec<Target>> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut out = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let t = line.trim();
        if t.is_empty() || t.starts_with('#') { continue; }
        let parsed = parse_spec(t).with_context(|| format!("{}:{}", path.display(), i + 1))?;
        out.extend(parsed);
    }
    debug!(file = %path.display(), count = out.len(), "read target file");
    Ok(out)
}

/// Collects targets from several sources, keeping first-seen order and dropping duplicates.
#[derive(Debug, Default)]
pub struct TargetSetBuilder {
    seen: HashSet<Target>,
    ordered: Vec<Target>,
}

impl TargetSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: Target) -> &mut Self {
        if self.seen.insert(target.clone()) {
            self.ordered.push(target);
        }
        self
    }

    pub fn add_spec(&mut self, input: &str) -> Result<&mut Self> {
        for t in parse_spec(input)? {
            self.add(t);
        }
        Ok(self)
    }

    pub fn add_file(&mut self, path: &Path) -> Result<&mut Self> {
        for t in read_target_file(path)? {
            self.add(t);
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn build(self) -> Result<Vec<Target>> {
        if self.ordered.is_empty() {
            return Err(anyhow!("no targets to probe"));
        }
        Ok(self.ordered)
    }
}
