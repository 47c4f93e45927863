//! Market records and per-market transitions.
//!
//! A [`MarketLedger`] is one shard of the marketplace: the market record,
//! its vault and every job created against it. All transitions check their
//! preconditions first and mutate only once nothing can fail, so an error
//! leaves the shard and the balance book untouched.

use std::collections::BTreeMap;

use hypernode_core::{Amount, ContentHash, Pubkey};
use serde::{Deserialize, Serialize};

use crate::config::QueuedJobExpiry;
use crate::error::{MarketError, Result};
use crate::events::MarketEvent;
use crate::job::{CreateJob, Job, JobState};
use crate::queue::{Admission, MatchQueue, QueueType, Side};
use crate::vault::{BalanceBook, Vault};

/// Pricing and admission policy of a market. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    /// Fixed price per job.
    pub job_price: Amount,
    /// Seconds a job may run before it can be timed out.
    pub job_timeout: i64,
    /// Minimum stake a node must present to list.
    pub node_xhyper_minimum: u128,
}

impl MarketParams {
    /// Creates market parameters.
    #[must_use]
    pub const fn new(job_price: Amount, job_timeout: i64, node_xhyper_minimum: u128) -> Self {
        Self {
            job_price,
            job_timeout,
            node_xhyper_minimum,
        }
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidInput`] for a zero price or a
    /// non-positive timeout.
    pub fn validate(&self) -> Result<()> {
        if self.job_price.is_zero() {
            return Err(MarketError::InvalidInput("job price must be non-zero".to_string()));
        }
        if self.job_timeout <= 0 {
            return Err(MarketError::InvalidInput(format!(
                "job timeout must be positive, got {}",
                self.job_timeout
            )));
        }
        Ok(())
    }
}

/// A fixed-price venue pairing jobs with nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Market id.
    pub id: Pubkey,
    /// Identity that created the market.
    pub authority: Pubkey,
    /// Address of the market's escrow vault.
    pub vault: Pubkey,
    /// Pricing and admission policy.
    pub params: MarketParams,
    /// Waiting jobs or idle nodes.
    pub queue: MatchQueue,
    /// Jobs ever created here.
    pub total_jobs: u64,
    /// Node listings ever accepted here.
    pub total_nodes: u64,
}

impl Market {
    fn new(id: Pubkey, authority: Pubkey, params: MarketParams) -> Self {
        Self {
            id,
            authority,
            vault: Vault::address_of(&id),
            params,
            queue: MatchQueue::new(),
            total_jobs: 0,
            total_nodes: 0,
        }
    }

    /// The queue's type tag.
    #[must_use]
    pub fn queue_type(&self) -> QueueType {
        self.queue.queue_type()
    }
}

/// Outcome of creating a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobAdmission {
    /// No idle node; the job waits at `position` (1-based).
    Queued {
        /// Queue position.
        position: usize,
    },
    /// Bound to the oldest idle node and now running.
    Matched {
        /// The bound node.
        node: Pubkey,
    },
}

/// Outcome of listing a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeAdmission {
    /// No waiting job; the node waits at `position` (1-based).
    Queued {
        /// Queue position.
        position: usize,
    },
    /// Bound to the oldest waiting job, which is now running.
    Matched {
        /// The job now running on the node.
        job: Pubkey,
    },
}

/// One market shard: the record, its vault and its jobs.
#[derive(Debug, Clone)]
pub(crate) struct MarketLedger {
    pub(crate) market: Market,
    pub(crate) vault: Vault,
    pub(crate) jobs: BTreeMap<Pubkey, Job>,
}

impl MarketLedger {
    pub(crate) fn open(id: Pubkey, authority: Pubkey, params: MarketParams) -> Self {
        Self {
            market: Market::new(id, authority, params),
            vault: Vault::for_market(&id),
            jobs: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(market: Market, vault_balance: Amount, jobs: Vec<Job>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for job in jobs {
            if job.market != market.id {
                return Err(MarketError::InvariantViolation(format!(
                    "job {} filed under market {} belongs to {}",
                    job.id, market.id, job.market
                )));
            }
            let id = job.id;
            if by_id.insert(id, job).is_some() {
                return Err(MarketError::InvariantViolation(format!("job {id} recorded twice")));
            }
        }
        let vault = Vault::for_market(&market.id).with_balance(vault_balance);
        Ok(Self {
            market,
            vault,
            jobs: by_id,
        })
    }

    fn job(&self, id: &Pubkey) -> Result<&Job> {
        self.jobs.get(id).ok_or(MarketError::JobNotFound(*id))
    }

    fn job_mut(&mut self, id: &Pubkey) -> Result<&mut Job> {
        self.jobs.get_mut(id).ok_or(MarketError::JobNotFound(*id))
    }

    /// Escrows the market price from `client` and submits the job.
    pub(crate) fn create_job(
        &mut self,
        client: Pubkey,
        request: &CreateJob,
        balances: &mut BalanceBook,
        capacity: usize,
        now: i64,
        events: &mut Vec<MarketEvent>,
    ) -> Result<JobAdmission> {
        if request.ipfs_job.is_zero() {
            return Err(MarketError::InvalidInput("job content hash is zero".to_string()));
        }
        if self.jobs.contains_key(&request.id) {
            return Err(MarketError::DuplicateEntry {
                what: "job",
                id: request.id,
            });
        }
        let price = self.market.params.job_price;
        balances.check_debit(&client, price)?;
        self.vault.check_deposit(price)?;
        self.check_counterpart(Side::Job)?;

        // Nothing below can fail for a consistent shard.
        let admission = self.market.queue.submit_job(request.id, capacity)?;
        balances.debit(&client, price)?;
        self.vault.deposit(price)?;

        let market_id = self.market.id;
        let mut job = Job::new(
            request,
            market_id,
            client,
            price,
            self.market.params.job_timeout,
            now,
        );
        let outcome = match admission {
            Admission::Matched(node) => {
                job.start(node, now)?;
                events.push(MarketEvent::JobMatched {
                    market: market_id,
                    job: job.id,
                    node,
                    at: now,
                });
                JobAdmission::Matched { node }
            }
            Admission::Queued { position } => {
                events.push(MarketEvent::JobQueued {
                    market: market_id,
                    job: job.id,
                    position,
                    at: now,
                });
                JobAdmission::Queued { position }
            }
        };
        self.jobs.insert(job.id, job);
        self.market.total_jobs = self.market.total_jobs.saturating_add(1);
        Ok(outcome)
    }

    /// Submits an idle node.
    pub(crate) fn list_node(
        &mut self,
        node: Pubkey,
        stake: u128,
        capacity: usize,
        now: i64,
        events: &mut Vec<MarketEvent>,
    ) -> Result<NodeAdmission> {
        let required = self.market.params.node_xhyper_minimum;
        if stake < required {
            return Err(MarketError::InsufficientStake {
                required,
                provided: stake,
            });
        }
        self.check_counterpart(Side::Node)?;

        let market_id = self.market.id;
        let outcome = match self.market.queue.submit_node(node, capacity)? {
            Admission::Matched(job_id) => {
                self.job_mut(&job_id)?.start(node, now)?;
                events.push(MarketEvent::JobMatched {
                    market: market_id,
                    job: job_id,
                    node,
                    at: now,
                });
                NodeAdmission::Matched { job: job_id }
            }
            Admission::Queued { position } => {
                events.push(MarketEvent::NodeQueued {
                    market: market_id,
                    node,
                    position,
                    at: now,
                });
                NodeAdmission::Queued { position }
            }
        };
        self.market.total_nodes = self.market.total_nodes.saturating_add(1);
        Ok(outcome)
    }

    /// Verifies that a submission from `side` could bind the counterpart at
    /// the head of the queue, before the queue is touched.
    fn check_counterpart(&self, side: Side) -> Result<()> {
        let (MatchQueue::Jobs(waiting), Side::Node) = (&self.market.queue, side) else {
            return Ok(());
        };
        let Some(head) = waiting.front() else {
            return Err(MarketError::InvariantViolation(
                "queue tagged as jobs is empty".to_string(),
            ));
        };
        let job = self.jobs.get(head).ok_or_else(|| {
            MarketError::InvariantViolation(format!("queued job {head} has no record"))
        })?;
        job.ensure_transition(JobState::Running)?;
        if job.node.is_some() {
            return Err(MarketError::InvariantViolation(format!(
                "queued job {head} already has a node"
            )));
        }
        Ok(())
    }

    /// Removes an idle node from the queue.
    pub(crate) fn delist_node(
        &mut self,
        node: Pubkey,
        now: i64,
        events: &mut Vec<MarketEvent>,
    ) -> Result<()> {
        if !self.market.queue.remove(Side::Node, &node) {
            return Err(MarketError::NodeNotQueued(node));
        }
        events.push(MarketEvent::NodeDelisted {
            market: self.market.id,
            node,
            at: now,
        });
        Ok(())
    }

    /// `Running -> Completed`, releasing the price to the bound node.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn finish_job(
        &mut self,
        job_id: Pubkey,
        node: Pubkey,
        result: ContentHash,
        balances: &mut BalanceBook,
        enforce_deadline: bool,
        expiry: QueuedJobExpiry,
        now: i64,
        events: &mut Vec<MarketEvent>,
    ) -> Result<Job> {
        let job = self.job(&job_id)?;
        if job.node != Some(node) {
            return Err(MarketError::Unauthorized {
                caller: node,
                role: "bound node",
                subject: job_id,
            });
        }
        job.ensure_transition(JobState::Completed)?;
        if result.is_zero() {
            return Err(MarketError::InvalidInput("result content hash is zero".to_string()));
        }
        if enforce_deadline && job.is_expired(now, expiry) {
            return Err(MarketError::JobExpired {
                job: job_id,
                deadline: job.deadline(expiry).unwrap_or(now),
            });
        }
        let price = job.price;
        balances.check_credit(&node, price)?;

        let payout = self.vault.withdraw(price)?;
        let job = self.job_mut(&job_id)?;
        job.complete(result, now)?;
        balances.credit(&node, payout)?;

        events.push(MarketEvent::JobCompleted {
            market: job.market,
            job: job_id,
            node,
            ipfs_result: result,
            payout,
            at: now,
        });
        Ok(job.clone())
    }

    /// `Queued -> Stopped`, refunding the client.
    pub(crate) fn cancel_job(
        &mut self,
        job_id: Pubkey,
        client: Pubkey,
        balances: &mut BalanceBook,
        now: i64,
        events: &mut Vec<MarketEvent>,
    ) -> Result<Job> {
        let job = self.job(&job_id)?;
        if job.client != client {
            return Err(MarketError::Unauthorized {
                caller: client,
                role: "client",
                subject: job_id,
            });
        }
        job.ensure_transition(JobState::Stopped)?;
        if !self.market.queue.contains(Side::Job, &job_id) {
            return Err(MarketError::InvariantViolation(format!(
                "queued job {job_id} is missing from the queue"
            )));
        }
        let price = job.price;
        balances.check_credit(&client, price)?;

        let refund = self.vault.withdraw(price)?;
        self.market.queue.remove(Side::Job, &job_id);
        let job = self.job_mut(&job_id)?;
        job.stop(now)?;
        balances.credit(&client, refund)?;

        events.push(MarketEvent::JobStopped {
            market: job.market,
            job: job_id,
            client,
            refund,
            at: now,
        });
        Ok(job.clone())
    }

    /// `Queued | Running -> TimedOut`, refunding the client.
    pub(crate) fn timeout_job(
        &mut self,
        job_id: Pubkey,
        balances: &mut BalanceBook,
        expiry: QueuedJobExpiry,
        now: i64,
        events: &mut Vec<MarketEvent>,
    ) -> Result<Job> {
        let job = self.job(&job_id)?;
        job.ensure_transition(JobState::TimedOut)?;
        let Some(deadline) = job.deadline(expiry) else {
            return Err(MarketError::InvalidStateTransition {
                job: job_id,
                from: job.state,
                to: JobState::TimedOut,
            });
        };
        if now <= deadline {
            return Err(MarketError::JobNotTimedOut {
                job: job_id,
                deadline,
                now,
            });
        }
        let was_queued = job.state == JobState::Queued;
        if was_queued && !self.market.queue.contains(Side::Job, &job_id) {
            return Err(MarketError::InvariantViolation(format!(
                "queued job {job_id} is missing from the queue"
            )));
        }
        let (client, price) = (job.client, job.price);
        balances.check_credit(&client, price)?;

        let refund = self.vault.withdraw(price)?;
        if was_queued {
            self.market.queue.remove(Side::Job, &job_id);
        }
        let job = self.job_mut(&job_id)?;
        job.time_out(now)?;
        balances.credit(&client, refund)?;

        events.push(MarketEvent::JobTimedOut {
            market: job.market,
            job: job_id,
            client,
            node: job.node,
            refund,
            at: now,
        });
        Ok(job.clone())
    }

    /// Ids of open jobs past their deadline, oldest first.
    pub(crate) fn expired_jobs(&self, now: i64, expiry: QueuedJobExpiry) -> Vec<Pubkey> {
        let mut expired: Vec<&Job> = self
            .jobs
            .values()
            .filter(|job| job.is_open() && job.is_expired(now, expiry))
            .collect();
        expired.sort_by_key(|job| (job.time_created, job.id));
        expired.into_iter().map(|job| job.id).collect()
    }

    /// Jobs of this market, oldest first.
    pub(crate) fn jobs_by_age(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| (job.time_created, job.id));
        jobs
    }

    /// Sum of prices of open jobs.
    fn escrowed_total(&self) -> Result<Amount> {
        self.jobs
            .values()
            .filter(|job| job.is_open())
            .try_fold(Amount::ZERO, |acc, job| acc.checked_add(job.price))
            .ok_or_else(|| {
                MarketError::InvariantViolation(format!(
                    "escrowed total of market {} overflows",
                    self.market.id
                ))
            })
    }

    /// Verifies the shard's structural and accounting invariants.
    pub(crate) fn check_invariants(&self) -> Result<()> {
        let id = self.market.id;
        let violation = |msg: String| Err(MarketError::InvariantViolation(msg));

        if self.market.vault != Vault::address_of(&id) || self.vault.address() != &self.market.vault
        {
            return violation(format!("market {id} vault address mismatch"));
        }
        if !self.market.queue.is_well_formed() {
            return violation(format!("market {id} queue is malformed"));
        }

        let queued_in_records = self
            .jobs
            .values()
            .filter(|job| job.state == JobState::Queued)
            .count();
        let queued_in_queue = match &self.market.queue {
            MatchQueue::Jobs(waiting) => {
                for job_id in waiting {
                    match self.jobs.get(job_id) {
                        Some(job) if job.state == JobState::Queued => {}
                        Some(job) => {
                            return violation(format!(
                                "job {job_id} is queued but {}",
                                job.state
                            ));
                        }
                        None => return violation(format!("queued job {job_id} has no record")),
                    }
                }
                waiting.len()
            }
            MatchQueue::Empty | MatchQueue::Nodes(_) => 0,
        };
        if queued_in_records != queued_in_queue {
            return violation(format!(
                "market {id} has {queued_in_records} queued jobs but {queued_in_queue} in the queue"
            ));
        }

        for job in self.jobs.values() {
            if job.market != id {
                return violation(format!("job {} belongs to {}", job.id, job.market));
            }
            // A timed-out job may or may not have been matched.
            let consistent = match job.state {
                JobState::Queued | JobState::Stopped => job.node.is_none(),
                JobState::Running | JobState::Completed => job.node.is_some(),
                JobState::TimedOut => true,
            };
            if !consistent {
                return violation(format!("job {} is {} with node {:?}", job.id, job.state, job.node));
            }
        }

        let escrowed = self.escrowed_total()?;
        if escrowed != self.vault.balance() {
            return violation(format!(
                "market {id} vault holds {} but open jobs total {escrowed}",
                self.vault.balance()
            ));
        }
        Ok(())
    }
}
