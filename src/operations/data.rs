use crate::agent::*;
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Running,
    Success,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u64);

/// Secondary agent -> record index derived from a record store.
///
/// The owning store is authoritative; this index is rebuilt whenever a
/// record is added or removed so the two directions never diverge.
#[derive(Debug)]
pub struct ClaimIndex<K> {
    owners: HashMap<AgentId, K>,
}

impl<K> Default for ClaimIndex<K> {
    fn default() -> Self {
        ClaimIndex { owners: HashMap::new() }
    }
}

impl<K> ClaimIndex<K>
where
    K: Copy + Eq + Debug,
{
    pub fn owner_of(&self, agent: AgentId) -> Option<K> {
        self.owners.get(&agent).copied()
    }

    pub fn is_claimed(&self, agent: AgentId) -> bool {
        self.owners.contains_key(&agent)
    }

    /// Claim `agent` for `key`. An agent already held by another record
    /// stays with its first owner and the claim is rejected.
    pub fn try_claim(&mut self, agent: AgentId, key: K) -> Result<(), K> {
        match self.owners.get(&agent) {
            Some(owner) if *owner != key => Err(*owner),
            _ => {
                self.owners.insert(agent, key);

                Ok(())
            }
        }
    }

    /// Rebuild from the authoritative records. Conflicting claims keep the
    /// first owner seen.
    pub fn rebuild<I>(&mut self, claims: I)
    where
        I: IntoIterator<Item = (AgentId, K)>,
    {
        self.owners.clear();

        for (agent, key) in claims {
            if let Err(owner) = self.try_claim(agent, key) {
                warn!("Agent {:?} claimed by {:?} is already held by {:?}, rejecting", agent, key, owner);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_rejected() {
        let mut index = ClaimIndex::default();

        assert!(index.try_claim(AgentId(1), OperationId(1)).is_ok());
        assert_eq!(index.try_claim(AgentId(1), OperationId(2)), Err(OperationId(1)));
        assert_eq!(index.owner_of(AgentId(1)), Some(OperationId(1)));
    }

    #[test]
    fn rebuild_keeps_first_owner() {
        let mut index = ClaimIndex::default();

        index.rebuild(vec![
            (AgentId(1), OperationId(1)),
            (AgentId(2), OperationId(1)),
            (AgentId(1), OperationId(2)),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.owner_of(AgentId(1)), Some(OperationId(1)));
    }
}
