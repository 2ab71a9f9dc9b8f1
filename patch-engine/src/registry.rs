use std::collections::HashSet;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimRejection {
    #[error("IP address cannot be empty")]
    Empty,
    #[error("IP address {0} is already used, enter a unique address")]
    Duplicate(String),
}

/// Addresses already committed during one run. The gateway is claimed up
/// front so no node can be handed the gateway's address.
#[derive(Debug, Clone)]
pub struct AddressRegistry {
    claimed: HashSet<String>,
}

impl AddressRegistry {
    pub fn new(gateway: &str) -> Self {
        let mut claimed = HashSet::new();
        let gateway = gateway.trim();
        if !gateway.is_empty() {
            claimed.insert(gateway.to_owned());
        }
        Self { claimed }
    }

    /// Rebuilds the registry from addresses found on disk. Duplicates in
    /// `existing` are tolerated; they were accepted by an earlier run.
    pub fn with_existing<'a>(gateway: &str, existing: impl IntoIterator<Item = &'a str>) -> Self {
        let mut registry = Self::new(gateway);
        for address in existing {
            let address = address.trim();
            if !address.is_empty() {
                registry.claimed.insert(address.to_owned());
            }
        }
        registry
    }

    /// Claims `candidate`. A rejection leaves the registry unchanged and the
    /// caller is expected to retry with another address.
    pub fn claim(&mut self, candidate: &str) -> Result<(), ClaimRejection> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(ClaimRejection::Empty);
        }
        if !self.claimed.insert(candidate.to_owned()) {
            return Err(ClaimRejection::Duplicate(candidate.to_owned()));
        }
        Ok(())
    }

    pub fn is_claimed(&self, address: &str) -> bool {
        self.claimed.contains(address.trim())
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Runs `addresses` through a fresh registry and returns every rejection
/// without stopping. Used where uniqueness is reported, not enforced.
pub fn audit<'a>(gateway: &str, addresses: impl IntoIterator<Item = &'a str>) -> Vec<ClaimRejection> {
    let mut registry = AddressRegistry::new(gateway);
    addresses
        .into_iter()
        .filter_map(|x| registry.claim(x).err())
        .collect()
}
