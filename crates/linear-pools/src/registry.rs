//! Registry mapping protocol ids to the names of the protocols wrapped tokens
//! come from. Registration is permissioned through the authorizer and entries
//! can never be changed or removed.

use {
    crate::error::{BalancerError, Error},
    alloy_primitives::{Address, B256, keccak256},
    std::{
        collections::{BTreeMap, HashSet},
        sync::{Arc, Mutex, RwLock},
    },
};

/// Decides whether an account may perform an action on a contract.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait Authorizer: Send + Sync {
    fn can_perform(&self, action_id: B256, account: Address, where_: Address) -> bool;
}

/// Identifier of `action` on the contract at `disambiguator`.
pub fn action_id(disambiguator: Address, action: &str) -> B256 {
    let mut data = disambiguator.to_vec();
    data.extend_from_slice(action.as_bytes());
    keccak256(data)
}

/// Authorizer storing explicit permission grants.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizer {
    grants: Mutex<HashSet<(B256, Address, Address)>>,
}

impl InMemoryAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `account` to perform each of `action_ids` on `where_`.
    pub fn grant_permissions(&self, action_ids: &[B256], account: Address, where_: Address) {
        let mut grants = self.grants.lock().unwrap();
        for action_id in action_ids {
            grants.insert((*action_id, account, where_));
        }
    }
}

impl Authorizer for InMemoryAuthorizer {
    fn can_perform(&self, action_id: B256, account: Address, where_: Address) -> bool {
        self.grants
            .lock()
            .unwrap()
            .contains(&(action_id, account, where_))
    }
}

pub const REGISTER_PROTOCOL_ID: &str = "registerProtocolId";

pub struct ProtocolIdRegistry {
    owner: Address,
    authorizer: Arc<dyn Authorizer>,
    protocols: RwLock<BTreeMap<u32, String>>,
}

impl ProtocolIdRegistry {
    /// A registry whose permissions are granted for the contract at `owner`.
    pub fn new(owner: Address, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            owner,
            authorizer,
            protocols: Default::default(),
        }
    }

    pub fn register_protocol_id(
        &self,
        caller: Address,
        protocol_id: u32,
        name: &str,
    ) -> Result<(), Error> {
        let action = action_id(self.owner, REGISTER_PROTOCOL_ID);
        if !self.authorizer.can_perform(action, caller, self.owner) {
            return Err(BalancerError::Unauthorized.into());
        }
        let mut protocols = self.protocols.write().unwrap();
        if protocols.contains_key(&protocol_id) {
            return Err(Error::AlreadyRegistered);
        }
        protocols.insert(protocol_id, name.to_string());
        tracing::info!(protocol_id, name, "registered protocol id");
        Ok(())
    }

    pub fn get_protocol_name(&self, protocol_id: u32) -> Result<String, Error> {
        self.protocols
            .read()
            .unwrap()
            .get(&protocol_id)
            .cloned()
            .ok_or(Error::NotRegistered)
    }
}
