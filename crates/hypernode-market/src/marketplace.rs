//! The marketplace store.
//!
//! Markets and jobs are kept in one arena keyed by [`Pubkey`]. Every market
//! is a shard behind its own mutex, so a transition on one market is a
//! single indivisible step and two markets never contend.
//!
//! Lock order, always acquired in this sequence and never reversed:
//!
//! ```text
//! markets (map) -> shard -> job_index -> balances -> reputations -> events
//! ```
//!
//! The map lock is released before any shard is locked, except in
//! [`Marketplace::snapshot`], which locks shards in id order.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hypernode_core::{Amount, ContentHash, NodeReputation, Pubkey};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{ErrorKind, MarketError, Result};
use crate::events::MarketEvent;
use crate::job::{CreateJob, Job};
use crate::market::{JobAdmission, Market, MarketLedger, MarketParams, NodeAdmission};
use crate::snapshot::{LedgerSnapshot, MarketRecord, SNAPSHOT_VERSION};
use crate::vault::BalanceBook;

type Shard = Arc<Mutex<MarketLedger>>;

/// Seed prefix for market ids.
const MARKET_SEED: &[u8] = b"market";

/// Central store of markets, jobs, balances and reputations.
#[derive(Debug)]
pub struct Marketplace {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    /// Market shards by market id.
    markets: RwLock<HashMap<Pubkey, Shard>>,
    /// Job id -> market id.
    job_index: RwLock<HashMap<Pubkey, Pubkey>>,
    balances: Mutex<BalanceBook>,
    reputations: Mutex<BTreeMap<Pubkey, NodeReputation>>,
    events: Mutex<Vec<MarketEvent>>,
}

impl Default for Marketplace {
    fn default() -> Self {
        Self::from_parts(EngineConfig::default(), Arc::new(SystemClock), HashMap::new(), HashMap::new())
    }
}

impl Marketplace {
    /// Creates an empty marketplace.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, clock, HashMap::new(), HashMap::new()))
    }

    fn from_parts(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        markets: HashMap<Pubkey, Shard>,
        job_index: HashMap<Pubkey, Pubkey>,
    ) -> Self {
        Self {
            config,
            clock,
            markets: RwLock::new(markets),
            job_index: RwLock::new(job_index),
            balances: Mutex::new(BalanceBook::new()),
            reputations: Mutex::new(BTreeMap::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// The engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current time according to the engine clock.
    #[must_use]
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    fn shard(&self, market: &Pubkey) -> Result<Shard> {
        self.markets
            .read()
            .get(market)
            .cloned()
            .ok_or(MarketError::MarketNotFound(*market))
    }

    fn shard_for_job(&self, job: &Pubkey) -> Result<Shard> {
        let market = self
            .job_index
            .read()
            .get(job)
            .copied()
            .ok_or(MarketError::JobNotFound(*job))?;
        self.shard(&market)
    }

    fn publish(&self, mut events: Vec<MarketEvent>) {
        self.events.lock().append(&mut events);
    }

    // ==================== Market Operations ====================

    /// Creates a market owned by `authority` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidInput`] for a zero price or
    /// non-positive timeout.
    pub fn create_market(&self, authority: Pubkey, params: MarketParams) -> Result<Pubkey> {
        params.validate()?;
        let now = self.clock.now();

        let mut markets = self.markets.write();
        let mut nonce = u64::try_from(markets.len()).unwrap_or(u64::MAX);
        let id = loop {
            let candidate =
                Pubkey::derive(&[MARKET_SEED, authority.as_bytes(), &nonce.to_le_bytes()]);
            if !markets.contains_key(&candidate) {
                break candidate;
            }
            nonce = nonce.wrapping_add(1);
        };
        markets.insert(id, Arc::new(Mutex::new(MarketLedger::open(id, authority, params))));
        self.publish(vec![MarketEvent::MarketCreated {
            market: id,
            authority,
            job_price: params.job_price,
            at: now,
        }]);
        drop(markets);

        info!(
            market = %id,
            authority = %authority,
            job_price = %params.job_price,
            job_timeout = params.job_timeout,
            "created market"
        );
        Ok(id)
    }

    /// Creates a job, escrows the market price from `client` and matches
    /// it with the oldest idle node if there is one.
    ///
    /// # Errors
    ///
    /// Fails without side effects on an unknown market, a duplicate job id,
    /// a zero content hash, insufficient client funds or a full queue.
    pub fn create_job(
        &self,
        market: Pubkey,
        client: Pubkey,
        request: CreateJob,
    ) -> Result<JobAdmission> {
        let shard = self.shard(&market)?;
        let now = self.clock.now();

        let mut ledger = shard.lock();
        let mut index = self.job_index.write();
        if index.contains_key(&request.id) {
            return Err(MarketError::DuplicateEntry {
                what: "job",
                id: request.id,
            });
        }
        let mut events = Vec::new();
        let admission = {
            let mut balances = self.balances.lock();
            ledger.create_job(
                client,
                &request,
                &mut balances,
                self.config.max_queue_len,
                now,
                &mut events,
            )?
        };
        index.insert(request.id, market);
        drop(index);
        self.publish(events);
        drop(ledger);

        match admission {
            JobAdmission::Matched { node } => {
                info!(market = %market, job = %request.id, node = %node, "job matched on arrival");
            }
            JobAdmission::Queued { position } => {
                info!(market = %market, job = %request.id, client = %client, "job queued");
                debug!(job = %request.id, position, "queue position");
            }
        }
        Ok(admission)
    }

    /// Lists a node, matching it with the oldest waiting job if there is
    /// one. A node already running a job may list again for more work.
    ///
    /// # Errors
    ///
    /// Fails without side effects on an unknown market, a stake below the
    /// market minimum, a node already waiting in the queue or a full queue.
    pub fn list_node(&self, market: Pubkey, node: Pubkey, stake: u128) -> Result<NodeAdmission> {
        let shard = self.shard(&market)?;
        let now = self.clock.now();

        let mut ledger = shard.lock();
        let mut events = Vec::new();
        let admission =
            ledger.list_node(node, stake, self.config.max_queue_len, now, &mut events)?;
        self.publish(events);
        drop(ledger);

        match admission {
            NodeAdmission::Matched { job } => {
                info!(market = %market, job = %job, node = %node, "node matched on arrival");
            }
            NodeAdmission::Queued { position } => {
                info!(market = %market, node = %node, "node queued");
                debug!(node = %node, position, "queue position");
            }
        }
        Ok(admission)
    }

    /// Removes an idle node from a market's queue.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NodeNotQueued`] if the node is not waiting.
    pub fn delist_node(&self, market: Pubkey, node: Pubkey) -> Result<()> {
        let shard = self.shard(&market)?;
        let now = self.clock.now();

        let mut ledger = shard.lock();
        let mut events = Vec::new();
        ledger.delist_node(node, now, &mut events)?;
        self.publish(events);
        drop(ledger);

        info!(market = %market, node = %node, "node delisted");
        Ok(())
    }

    // ==================== Job Transitions ====================

    /// Completes a running job and releases its price to `node`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Unauthorized`] unless `node` is the bound
    /// node, [`MarketError::InvalidStateTransition`] unless the job is
    /// running, [`MarketError::InvalidInput`] for a zero result hash and
    /// [`MarketError::JobExpired`] past the deadline when enforced.
    pub fn finish_job(&self, job: Pubkey, node: Pubkey, ipfs_result: ContentHash) -> Result<Job> {
        let shard = self.shard_for_job(&job)?;
        let now = self.clock.now();

        let mut ledger = shard.lock();
        let mut events = Vec::new();
        let finished = {
            let mut balances = self.balances.lock();
            ledger
                .finish_job(
                    job,
                    node,
                    ipfs_result,
                    &mut balances,
                    self.config.enforce_deadline_on_finish,
                    self.config.queued_job_expiry,
                    now,
                    &mut events,
                )
                .inspect_err(|err| log_rejection("finish_job", &job, &node, err))?
        };
        if self.config.track_reputation {
            self.reputations.lock().entry(node).or_default().record_success(
                finished.execution_secs(),
                finished.price,
                now,
            );
        }
        self.publish(events);
        drop(ledger);

        info!(
            market = %finished.market,
            job = %job,
            node = %node,
            payout = %finished.price,
            "job completed"
        );
        Ok(finished)
    }

    /// Withdraws a queued job and refunds its client.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Unauthorized`] unless `client` created the
    /// job and [`MarketError::InvalidStateTransition`] unless it is queued.
    pub fn cancel_job(&self, job: Pubkey, client: Pubkey) -> Result<Job> {
        let shard = self.shard_for_job(&job)?;
        let now = self.clock.now();

        let mut ledger = shard.lock();
        let mut events = Vec::new();
        let stopped = {
            let mut balances = self.balances.lock();
            ledger
                .cancel_job(job, client, &mut balances, now, &mut events)
                .inspect_err(|err| log_rejection("cancel_job", &job, &client, err))?
        };
        self.publish(events);
        drop(ledger);

        info!(market = %stopped.market, job = %job, refund = %stopped.price, "job stopped");
        Ok(stopped)
    }

    /// Times out a job past its deadline and refunds its client.
    ///
    /// Anyone may call this. A second call on the same job fails with
    /// [`MarketError::InvalidStateTransition`] and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::JobNotTimedOut`] before the deadline and
    /// [`MarketError::InvalidStateTransition`] for a job that cannot expire.
    pub fn timeout_job(&self, job: Pubkey) -> Result<Job> {
        let shard = self.shard_for_job(&job)?;
        let now = self.clock.now();

        let mut ledger = shard.lock();
        let mut events = Vec::new();
        let timed_out = {
            let mut balances = self.balances.lock();
            ledger.timeout_job(
                job,
                &mut balances,
                self.config.queued_job_expiry,
                now,
                &mut events,
            )?
        };
        self.record_timeout(&timed_out, now);
        self.publish(events);
        drop(ledger);

        info!(
            market = %timed_out.market,
            job = %job,
            node = ?timed_out.node,
            refund = %timed_out.price,
            "job timed out"
        );
        Ok(timed_out)
    }

    /// Times out every expired job of a market in one locked step.
    ///
    /// Returns the ids of the jobs that timed out, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::MarketNotFound`] for an unknown market.
    pub fn sweep_timeouts(&self, market: Pubkey) -> Result<Vec<Pubkey>> {
        let shard = self.shard(&market)?;
        let now = self.clock.now();
        let expiry = self.config.queued_job_expiry;

        let mut ledger = shard.lock();
        let mut events = Vec::new();
        let mut swept = Vec::new();
        let mut timed_out = Vec::new();
        {
            let mut balances = self.balances.lock();
            for job in ledger.expired_jobs(now, expiry) {
                match ledger.timeout_job(job, &mut balances, expiry, now, &mut events) {
                    Ok(record) => {
                        swept.push(job);
                        timed_out.push(record);
                    }
                    Err(err) => warn!(market = %market, job = %job, error = %err, "sweep skipped job"),
                }
            }
        }
        for record in &timed_out {
            self.record_timeout(record, now);
        }
        self.publish(events);
        drop(ledger);

        debug!(market = %market, count = swept.len(), "swept timeouts");
        if !swept.is_empty() {
            info!(market = %market, count = swept.len(), "timed out expired jobs");
        }
        Ok(swept)
    }

    fn record_timeout(&self, job: &Job, now: i64) {
        if !self.config.track_reputation {
            return;
        }
        if let Some(node) = job.node {
            self.reputations.lock().entry(node).or_default().record_timeout(now);
        }
    }

    // ==================== Balances ====================

    /// Credits `amount` to `account` and returns the new balance.
    ///
    /// This is the boundary where funds enter from the external wallet
    /// layer.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidInput`] for a zero amount and
    /// [`MarketError::Overflow`] if the balance would overflow.
    pub fn deposit(&self, account: Pubkey, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(MarketError::InvalidInput("deposit amount is zero".to_string()));
        }
        let balance = self.balances.lock().credit(&account, amount)?;
        info!(account = %account, amount = %amount, balance = %balance, "deposited");
        Ok(balance)
    }

    /// Payable balance of `account`.
    #[must_use]
    pub fn balance(&self, account: &Pubkey) -> Amount {
        self.balances.lock().balance(account)
    }

    // ==================== Queries ====================

    /// A copy of a market record.
    #[must_use]
    pub fn market(&self, id: &Pubkey) -> Option<Market> {
        let shard = self.shard(id).ok()?;
        let ledger = shard.lock();
        Some(ledger.market.clone())
    }

    /// All markets, ordered by id.
    #[must_use]
    pub fn markets(&self) -> Vec<Market> {
        self.shards_by_id()
            .into_iter()
            .map(|(_, shard)| shard.lock().market.clone())
            .collect()
    }

    /// A copy of a job record.
    #[must_use]
    pub fn job(&self, id: &Pubkey) -> Option<Job> {
        let shard = self.shard_for_job(id).ok()?;
        let ledger = shard.lock();
        ledger.jobs.get(id).cloned()
    }

    /// Escrowed total of a market's vault.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::MarketNotFound`] for an unknown market.
    pub fn vault_balance(&self, market: &Pubkey) -> Result<Amount> {
        Ok(self.shard(market)?.lock().vault.balance())
    }

    /// Jobs of a market, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::MarketNotFound`] for an unknown market.
    pub fn jobs_for_market(&self, market: &Pubkey) -> Result<Vec<Job>> {
        Ok(self.shard(market)?.lock().jobs_by_age())
    }

    /// Reputation record of a node, if it has settled any job.
    #[must_use]
    pub fn reputation(&self, node: &Pubkey) -> Option<NodeReputation> {
        self.reputations.lock().get(node).cloned()
    }

    /// Verifies queue consistency, stale references and escrow
    /// conservation for one market.
    ///
    /// # Errors
    ///
    /// Returns the first [`MarketError::InvariantViolation`] found.
    pub fn check_invariants(&self, market: &Pubkey) -> Result<()> {
        self.shard(market)?.lock().check_invariants()
    }

    /// Takes all events emitted since the last drain, in order.
    pub fn drain_events(&self) -> Vec<MarketEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn shards_by_id(&self) -> Vec<(Pubkey, Shard)> {
        let mut shards: Vec<(Pubkey, Shard)> = self
            .markets
            .read()
            .iter()
            .map(|(id, shard)| (*id, Arc::clone(shard)))
            .collect();
        shards.sort_by_key(|(id, _)| *id);
        shards
    }

    // ==================== Persistence ====================

    /// Captures the complete state.
    ///
    /// Shards are locked in id order and held together, so the snapshot is
    /// consistent across markets and balances.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        let shards = self.shards_by_id();
        let guards: Vec<_> = shards.iter().map(|(_, shard)| shard.lock()).collect();
        let balances = self.balances.lock().clone();
        let reputations = self.reputations.lock().clone();

        let markets = guards
            .iter()
            .map(|ledger| MarketRecord {
                market: ledger.market.clone(),
                vault_balance: ledger.vault.balance(),
                jobs: ledger.jobs_by_age(),
            })
            .collect();

        LedgerSnapshot {
            version: SNAPSHOT_VERSION,
            markets,
            balances,
            reputations,
        }
    }

    /// Rebuilds a marketplace from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidInput`] for an unsupported version or
    /// invalid configuration and [`MarketError::InvariantViolation`] if any
    /// market fails its invariant checks or a job id appears twice.
    pub fn restore(
        snapshot: LedgerSnapshot,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(MarketError::InvalidInput(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        config.validate()?;

        let mut markets = HashMap::with_capacity(snapshot.markets.len());
        let mut job_index = HashMap::new();
        for record in snapshot.markets {
            let id = record.market.id;
            let ledger = MarketLedger::from_parts(record.market, record.vault_balance, record.jobs)?;
            ledger.check_invariants()?;
            for job in ledger.jobs.keys() {
                if job_index.insert(*job, id).is_some() {
                    return Err(MarketError::InvariantViolation(format!(
                        "job {job} appears in more than one market"
                    )));
                }
            }
            if markets.insert(id, Arc::new(Mutex::new(ledger))).is_some() {
                return Err(MarketError::InvariantViolation(format!(
                    "market {id} recorded twice"
                )));
            }
        }

        let market_count = markets.len();
        let job_count = job_index.len();
        let marketplace = Self::from_parts(config, clock, markets, job_index);
        *marketplace.balances.lock() = snapshot.balances;
        *marketplace.reputations.lock() = snapshot.reputations;

        debug!(markets = market_count, jobs = job_count, "restored marketplace");
        Ok(marketplace)
    }
}

fn log_rejection(operation: &str, job: &Pubkey, caller: &Pubkey, err: &MarketError) {
    if err.kind() == ErrorKind::Unauthorized {
        warn!(operation, job = %job, caller = %caller, "rejected unauthorized call");
    }
}
