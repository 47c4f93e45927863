//! The matching queue.
//!
//! A market holds one FIFO sequence that contains either waiting jobs or
//! idle nodes, never both. An arrival of the opposite kind is matched
//! against the head immediately; an arrival of the same kind is appended.
//! The variant is the type tag, so a mixed or tagged-but-empty queue cannot
//! be represented once [`MatchQueue::normalize`] has run.

use std::collections::VecDeque;

use hypernode_core::Pubkey;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// What the queue currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueType {
    /// Supply equals demand.
    Empty,
    /// Jobs waiting for nodes.
    HoldingJobs,
    /// Nodes waiting for jobs.
    HoldingNodes,
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::HoldingJobs => write!(f, "jobs"),
            Self::HoldingNodes => write!(f, "nodes"),
        }
    }
}

/// Which side of the market an arrival belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// A job looking for a node.
    Job,
    /// A node looking for a job.
    Node,
}

impl Side {
    const fn label(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Node => "node",
        }
    }
}

/// Outcome of submitting an identity to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Matched with the head of the opposite side, which was popped.
    Matched(Pubkey),
    /// Appended; `position` is 1-based.
    Queued {
        /// Position in the queue after the push.
        position: usize,
    },
}

/// Single-type FIFO of waiting jobs or idle nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "entries", rename_all = "snake_case")]
pub enum MatchQueue {
    /// Nothing waiting.
    #[default]
    Empty,
    /// Jobs waiting, oldest first.
    Jobs(VecDeque<Pubkey>),
    /// Nodes waiting, oldest first.
    Nodes(VecDeque<Pubkey>),
}

impl MatchQueue {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self::Empty
    }

    /// The type tag for the current contents.
    #[must_use]
    pub fn queue_type(&self) -> QueueType {
        match self {
            Self::Empty => QueueType::Empty,
            Self::Jobs(_) => QueueType::HoldingJobs,
            Self::Nodes(_) => QueueType::HoldingNodes,
        }
    }

    /// Number of waiting entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Jobs(q) | Self::Nodes(q) => q.len(),
        }
    }

    /// Returns true when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waiting entries in arrival order.
    #[must_use]
    pub fn entries(&self) -> Vec<Pubkey> {
        match self {
            Self::Empty => Vec::new(),
            Self::Jobs(q) | Self::Nodes(q) => q.iter().copied().collect(),
        }
    }

    /// Returns true if `id` waits on the given side.
    #[must_use]
    pub fn contains(&self, side: Side, id: &Pubkey) -> bool {
        match (side, self) {
            (Side::Job, Self::Jobs(q)) | (Side::Node, Self::Nodes(q)) => q.contains(id),
            _ => false,
        }
    }

    /// 1-based position of `id` on the given side.
    #[must_use]
    pub fn position(&self, side: Side, id: &Pubkey) -> Option<usize> {
        match (side, self) {
            (Side::Job, Self::Jobs(q)) | (Side::Node, Self::Nodes(q)) => {
                q.iter().position(|x| x == id).map(|p| p + 1)
            }
            _ => None,
        }
    }

    /// Submits a job: matches the oldest idle node or enqueues the job.
    pub fn submit_job(&mut self, job: Pubkey, capacity: usize) -> Result<Admission> {
        self.admit(Side::Job, job, capacity)
    }

    /// Submits a node: matches the oldest waiting job or enqueues the node.
    pub fn submit_node(&mut self, node: Pubkey, capacity: usize) -> Result<Admission> {
        self.admit(Side::Node, node, capacity)
    }

    /// Checks whether `submit` would fail, without mutating.
    pub fn check_admit(&self, side: Side, id: &Pubkey, capacity: usize) -> Result<()> {
        match (side, self) {
            (Side::Job, Self::Nodes(_)) | (Side::Node, Self::Jobs(_)) => Ok(()),
            _ if self.contains(side, id) => Err(MarketError::DuplicateEntry {
                what: side.label(),
                id: *id,
            }),
            _ if self.len() >= capacity => Err(MarketError::QueueFull { capacity }),
            _ => Ok(()),
        }
    }

    fn admit(&mut self, side: Side, id: Pubkey, capacity: usize) -> Result<Admission> {
        self.check_admit(side, &id, capacity)?;

        let counterpart = match (side, &mut *self) {
            (Side::Job, Self::Nodes(q)) | (Side::Node, Self::Jobs(q)) => Some(q),
            _ => None,
        };
        if let Some(waiting) = counterpart {
            let head = waiting.pop_front().ok_or_else(|| {
                MarketError::InvariantViolation("tagged queue is empty".to_string())
            })?;
            self.normalize();
            return Ok(Admission::Matched(head));
        }

        match self {
            Self::Empty => {
                let entries = VecDeque::from([id]);
                *self = match side {
                    Side::Job => Self::Jobs(entries),
                    Side::Node => Self::Nodes(entries),
                };
                Ok(Admission::Queued { position: 1 })
            }
            Self::Jobs(q) | Self::Nodes(q) => {
                q.push_back(id);
                Ok(Admission::Queued { position: q.len() })
            }
        }
    }

    /// Removes a waiting identity from the given side.
    ///
    /// Returns false if it was not waiting there.
    pub fn remove(&mut self, side: Side, id: &Pubkey) -> bool {
        let removed = match (side, &mut *self) {
            (Side::Job, Self::Jobs(q)) | (Side::Node, Self::Nodes(q)) => {
                match q.iter().position(|x| x == id) {
                    Some(pos) => q.remove(pos).is_some(),
                    None => false,
                }
            }
            _ => false,
        };
        self.normalize();
        removed
    }

    /// Collapses a tagged queue with no entries to `Empty`.
    fn normalize(&mut self) {
        if matches!(self, Self::Jobs(q) | Self::Nodes(q) if q.is_empty()) {
            *self = Self::Empty;
        }
    }

    /// Returns true if the tag agrees with the contents.
    ///
    /// Only a deserialized queue can fail this.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Jobs(q) | Self::Nodes(q) => {
                !q.is_empty() && q.iter().enumerate().all(|(i, id)| !q.range(..i).any(|x| x == id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CAP: usize = 314;

    fn id(n: u8) -> Pubkey {
        Pubkey::new([n; 32])
    }

    #[test]
    fn new_queue_is_empty() {
        let q = MatchQueue::new();
        assert_eq!(q.queue_type(), QueueType::Empty);
        assert!(q.is_empty());
        assert!(q.is_well_formed());
    }

    #[test]
    fn job_into_empty_queue_is_queued() {
        let mut q = MatchQueue::new();
        assert_eq!(q.submit_job(id(1), CAP).unwrap(), Admission::Queued { position: 1 });
        assert_eq!(q.queue_type(), QueueType::HoldingJobs);
        assert_eq!(q.submit_job(id(2), CAP).unwrap(), Admission::Queued { position: 2 });
        assert_eq!(q.entries(), vec![id(1), id(2)]);
    }

    #[test]
    fn node_matches_oldest_job() {
        let mut q = MatchQueue::new();
        q.submit_job(id(1), CAP).unwrap();
        q.submit_job(id(2), CAP).unwrap();
        assert_eq!(q.submit_node(id(10), CAP).unwrap(), Admission::Matched(id(1)));
        assert_eq!(q.queue_type(), QueueType::HoldingJobs);
        assert_eq!(q.entries(), vec![id(2)]);
    }

    #[test]
    fn last_pop_resets_to_empty() {
        let mut q = MatchQueue::new();
        q.submit_node(id(10), CAP).unwrap();
        assert_eq!(q.queue_type(), QueueType::HoldingNodes);
        assert_eq!(q.submit_job(id(1), CAP).unwrap(), Admission::Matched(id(10)));
        assert_eq!(q, MatchQueue::Empty);
    }

    #[test]
    fn duplicate_entry_rejected_without_change() {
        let mut q = MatchQueue::new();
        q.submit_node(id(10), CAP).unwrap();
        let before = q.clone();
        let err = q.submit_node(id(10), CAP).unwrap_err();
        assert!(matches!(err, MarketError::DuplicateEntry { what: "node", .. }));
        assert_eq!(q, before);
    }

    #[test]
    fn capacity_limits_push_but_not_match() {
        let mut q = MatchQueue::new();
        q.submit_job(id(1), 1).unwrap();
        let err = q.submit_job(id(2), 1).unwrap_err();
        assert_eq!(err, MarketError::QueueFull { capacity: 1 });
        assert_eq!(q.submit_node(id(10), 1).unwrap(), Admission::Matched(id(1)));
    }

    #[test]
    fn zero_capacity_rejects_first_push() {
        let mut q = MatchQueue::new();
        assert!(q.submit_job(id(1), 0).is_err());
        assert_eq!(q, MatchQueue::Empty);
    }

    #[test]
    fn remove_middle_and_last() {
        let mut q = MatchQueue::new();
        for n in 1..=3 {
            q.submit_job(id(n), CAP).unwrap();
        }
        assert!(q.remove(Side::Job, &id(2)));
        assert_eq!(q.entries(), vec![id(1), id(3)]);
        assert!(!q.remove(Side::Node, &id(1)));
        assert!(q.remove(Side::Job, &id(1)));
        assert!(q.remove(Side::Job, &id(3)));
        assert_eq!(q.queue_type(), QueueType::Empty);
        assert!(!q.remove(Side::Job, &id(3)));
    }

    #[test]
    fn position_is_one_based() {
        let mut q = MatchQueue::new();
        q.submit_node(id(5), CAP).unwrap();
        q.submit_node(id(6), CAP).unwrap();
        assert_eq!(q.position(Side::Node, &id(6)), Some(2));
        assert_eq!(q.position(Side::Job, &id(6)), None);
    }

    #[test]
    fn malformed_queues_detected() {
        assert!(!MatchQueue::Jobs(VecDeque::new()).is_well_formed());
        assert!(!MatchQueue::Nodes(VecDeque::from([id(1), id(1)])).is_well_formed());
        assert!(MatchQueue::Nodes(VecDeque::from([id(1), id(2)])).is_well_formed());
    }

    #[test]
    fn serde_shape() {
        let mut q = MatchQueue::new();
        q.submit_job(id(1), CAP).unwrap();
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "jobs");
        assert_eq!(json["entries"].as_array().map(Vec::len), Some(1));
        let back: MatchQueue = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);
    }

    proptest! {
        #[test]
        fn exclusivity_and_fifo_hold(ops in prop::collection::vec(any::<bool>(), 1..200)) {
            let mut q = MatchQueue::new();
            let mut jobs_in = 0u32;
            let mut nodes_in = 0u32;
            let mut matched = Vec::new();

            for (i, is_job) in ops.iter().enumerate() {
                let mut bytes = [0u8; 32];
                bytes[..8].copy_from_slice(&(i as u64).to_le_bytes());
                bytes[8] = u8::from(*is_job);
                let key = Pubkey::new(bytes);

                let admission = if *is_job {
                    jobs_in += 1;
                    q.submit_job(key, usize::MAX)
                } else {
                    nodes_in += 1;
                    q.submit_node(key, usize::MAX)
                };
                if let Ok(Admission::Matched(other)) = admission {
                    matched.push(other);
                }

                prop_assert!(q.is_well_formed());
                prop_assert_eq!(q.is_empty(), q.queue_type() == QueueType::Empty);
            }

            // Everything still waiting is the surplus of one side.
            let surplus = jobs_in.abs_diff(nodes_in) as usize;
            prop_assert_eq!(q.len(), surplus);
            prop_assert_eq!(matched.len(), jobs_in.min(nodes_in) as usize);

            // Matched heads come out in arrival order.
            let mut sorted = matched.clone();
            sorted.sort_by_key(|k| u64::from_le_bytes(k.as_bytes()[..8].try_into().unwrap_or([0; 8])));
            prop_assert_eq!(sorted, matched);
        }
    }
}
