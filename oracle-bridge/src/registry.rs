//! Authorization registry
//!
//! Single owner, an operator allow-list and an optional requester
//! allow-list. The owner is auto-authorized as an operator at
//! construction; ownership transfers do not touch the operator set.

use crate::types::Address;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Who may open screening requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequesterPolicy {
    /// Anyone (the Transfer Ledger is the expected caller)
    #[default]
    Open,
    /// Only identities added with `authorize_requester`
    AllowList,
}

/// Owner-controlled allow-lists
#[derive(Debug, Clone)]
pub struct AuthorizationRegistry {
    owner: Address,
    oracles: HashSet<Address>,
    requesters: HashSet<Address>,
    requester_policy: RequesterPolicy,
}

impl AuthorizationRegistry {
    /// Create a registry owned (and operated) by `owner`
    pub fn new(owner: Address) -> Result<Self> {
        if owner.is_zero() {
            return Err(Error::ZeroAddress("owner"));
        }

        let mut oracles = HashSet::new();
        oracles.insert(owner);

        Ok(Self {
            owner,
            oracles,
            requesters: HashSet::new(),
            requester_policy: RequesterPolicy::Open,
        })
    }

    /// Current owner
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Fail with `NotOwner` unless `caller` is the owner
    pub fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if *caller != self.owner {
            return Err(Error::NotOwner);
        }
        Ok(())
    }

    /// Add an operator. Returns false when it was already present.
    pub fn authorize_oracle(&mut self, caller: &Address, operator: Address) -> Result<bool> {
        self.ensure_owner(caller)?;
        if operator.is_zero() {
            return Err(Error::ZeroAddress("operator"));
        }

        let added = self.oracles.insert(operator);
        if added {
            info!("Oracle authorized: {}", operator);
        }
        Ok(added)
    }

    /// Remove an operator. Returns false when it was not present.
    pub fn revoke_oracle(&mut self, caller: &Address, operator: &Address) -> Result<bool> {
        self.ensure_owner(caller)?;

        let removed = self.oracles.remove(operator);
        if removed {
            info!("Oracle revoked: {}", operator);
        }
        Ok(removed)
    }

    /// Pure lookup
    pub fn is_authorized_oracle(&self, operator: &Address) -> bool {
        self.oracles.contains(operator)
    }

    /// Number of authorized operators
    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Hand ownership to `new_owner`, returning the previous owner
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: Address) -> Result<Address> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(Error::ZeroAddress("new owner"));
        }

        let previous = std::mem::replace(&mut self.owner, new_owner);
        info!("Ownership transferred: {} -> {}", previous, new_owner);
        Ok(previous)
    }

    /// Current requester policy
    pub fn requester_policy(&self) -> RequesterPolicy {
        self.requester_policy
    }

    /// Switch requester policy (owner-only)
    pub fn set_requester_policy(&mut self, caller: &Address, policy: RequesterPolicy) -> Result<()> {
        self.ensure_owner(caller)?;
        self.requester_policy = policy;
        Ok(())
    }

    /// Allow `requester` to open screening requests
    pub fn authorize_requester(&mut self, caller: &Address, requester: Address) -> Result<bool> {
        self.ensure_owner(caller)?;
        if requester.is_zero() {
            return Err(Error::ZeroAddress("requester"));
        }
        Ok(self.requesters.insert(requester))
    }

    /// Withdraw a requester
    pub fn revoke_requester(&mut self, caller: &Address, requester: &Address) -> Result<bool> {
        self.ensure_owner(caller)?;
        Ok(self.requesters.remove(requester))
    }

    /// Capability check for `request_screening`
    pub fn ensure_requester(&self, caller: &Address) -> Result<()> {
        match self.requester_policy {
            RequesterPolicy::Open => Ok(()),
            RequesterPolicy::AllowList if self.requesters.contains(caller) => Ok(()),
            RequesterPolicy::AllowList => Err(Error::NotAuthorizedRequester),
        }
    }
}
