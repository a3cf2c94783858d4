//! Host specification parsing

use std::fmt;

use hostrun_exec::ConnectionInfo;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;

/// A remote target: login user plus address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    /// Login user
    pub user: String,
    /// Host name or IP, optionally with `:port`
    pub address: String,
}

impl Host {
    /// Parse a single `user@address` token, splitting on the last `@`
    ///
    /// # Errors
    /// Returns `CoreError::InvalidHostSpec` naming the token if it has no `@` or either
    /// half is empty
    pub fn parse(token: &str) -> Result<Self, CoreError> {
        let token = token.trim();
        match token.rsplit_once('@') {
            Some((user, address)) if !user.is_empty() && !address.is_empty() => Ok(Self {
                user: user.to_string(),
                address: address.to_string(),
            }),
            _ => Err(CoreError::InvalidHostSpec(token.to_string())),
        }
    }

    /// Connection details for the channel provider
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::from_address(&self.address, &self.user)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.address)
    }
}

/// Ordered, duplicate-free set of hosts for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSet {
    hosts: Vec<Host>,
}

impl HostSet {
    /// Parse a comma separated `user@addr,user@addr` list, preserving order
    ///
    /// Repeated hosts keep their first position; later repeats are dropped.
    ///
    /// # Errors
    /// Returns `CoreError::EmptyHostSpec` for empty or whitespace-only input and
    /// `CoreError::InvalidHostSpec` for the first malformed token
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        if spec.trim().is_empty() {
            return Err(CoreError::EmptyHostSpec);
        }

        let mut hosts: Vec<Host> = Vec::new();
        for token in spec.split(',') {
            let host = Host::parse(token)?;
            if hosts.contains(&host) {
                warn!(host = %host, "duplicate host ignored");
                continue;
            }
            hosts.push(host);
        }

        Ok(Self { hosts })
    }

    /// Number of hosts
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Always false for a parsed set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Iterate in input order
    pub fn iter(&self) -> std::slice::Iter<'_, Host> {
        self.hosts.iter()
    }

    /// Hosts in input order
    #[must_use]
    pub fn as_slice(&self) -> &[Host] {
        &self.hosts
    }
}

impl<'a> IntoIterator for &'a HostSet {
    type Item = &'a Host;
    type IntoIter = std::slice::Iter<'a, Host>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
