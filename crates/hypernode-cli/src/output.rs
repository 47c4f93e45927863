//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use hypernode_core::{Amount, NodeReputation, Pubkey, Tier};
use hypernode_market::{Job, JobAdmission, Market, NodeAdmission};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// A freshly generated identity.
#[derive(Debug, Clone, Serialize)]
pub struct KeyView {
    /// The identity in base58.
    pub pubkey: Pubkey,
}

impl TableDisplay for KeyView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "{}", self.pubkey)?;
        Ok(())
    }
}

/// Payable balance of an account.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    /// Account.
    pub account: Pubkey,
    /// Balance in base units.
    pub balance: Amount,
}

impl TableDisplay for BalanceView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Account:  {}", self.account)?;
        writeln!(writer, "Balance:  {}", self.balance)?;
        Ok(())
    }
}

/// A market together with its vault balance.
#[derive(Debug, Clone, Serialize)]
pub struct MarketView {
    /// Market record.
    #[serde(flatten)]
    pub market: Market,
    /// Escrowed total.
    pub vault_balance: Amount,
}

impl TableDisplay for MarketView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let market = &self.market;
        writeln!(writer, "Market {}", market.id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Authority:        {}", market.authority)?;
        writeln!(writer, "Vault:            {}", market.vault)?;
        writeln!(writer, "Vault Balance:    {}", self.vault_balance)?;
        writeln!(writer)?;
        writeln!(writer, "Policy")?;
        writeln!(writer, "  Job Price:      {}", market.params.job_price)?;
        writeln!(writer, "  Job Timeout:    {}s", market.params.job_timeout)?;
        writeln!(writer, "  Min Stake:      {}", market.params.node_xhyper_minimum)?;
        writeln!(writer)?;
        writeln!(writer, "Queue ({})", market.queue_type())?;
        let entries = market.queue.entries();
        if entries.is_empty() {
            writeln!(writer, "  (empty)")?;
        }
        for (i, id) in entries.iter().enumerate() {
            writeln!(writer, "  {:>3}. {id}", i + 1)?;
        }
        writeln!(writer)?;
        writeln!(writer, "Totals")?;
        writeln!(writer, "  Jobs:           {}", market.total_jobs)?;
        writeln!(writer, "  Node Listings:  {}", market.total_nodes)?;
        Ok(())
    }
}

/// List of markets for display.
#[derive(Debug, Clone, Serialize)]
pub struct MarketList {
    /// Markets ordered by id.
    pub markets: Vec<MarketView>,
}

impl TableDisplay for MarketList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.markets.is_empty() {
            writeln!(writer, "No markets")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<44}  {:>22}  {:>8}  {:<6}  {:>5}  {:>22}",
            "ID", "PRICE", "TIMEOUT", "QUEUE", "LEN", "VAULT"
        )?;
        writeln!(writer, "{}", "─".repeat(118))?;
        for view in &self.markets {
            let market = &view.market;
            writeln!(
                writer,
                "{:<44}  {:>22}  {:>7}s  {:<6}  {:>5}  {:>22}",
                market.id.to_string(),
                market.params.job_price.to_string(),
                market.params.job_timeout,
                market.queue_type().to_string(),
                market.queue.len(),
                view.vault_balance.to_string()
            )?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} market(s)", self.markets.len())?;
        Ok(())
    }
}

impl TableDisplay for Job {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Job {}", self.id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "State:      {}", self.state)?;
        writeln!(writer, "Market:     {}", self.market)?;
        writeln!(writer, "Client:     {}", self.client)?;
        match self.node {
            Some(node) => writeln!(writer, "Node:       {node}")?,
            None => writeln!(writer, "Node:       -")?,
        }
        writeln!(writer, "Price:      {}", self.price)?;
        writeln!(writer, "Timeout:    {}s", self.timeout)?;
        writeln!(writer, "Hardware:   {} GB VRAM, {}", self.min_vram, self.gpu_type)?;
        writeln!(writer, "Definition: {}", self.ipfs_job)?;
        if !self.ipfs_result.is_zero() {
            writeln!(writer, "Result:     {}", self.ipfs_result)?;
        }
        writeln!(writer)?;
        writeln!(writer, "Created:    {}", self.time_created)?;
        writeln!(writer, "Started:    {}", self.time_start)?;
        writeln!(writer, "Ended:      {}", self.time_end)?;
        Ok(())
    }
}

/// Jobs of one market.
#[derive(Debug, Clone, Serialize)]
pub struct JobList {
    /// Market ID.
    pub market: Pubkey,
    /// Jobs, oldest first.
    pub jobs: Vec<Job>,
}

impl TableDisplay for JobList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.jobs.is_empty() {
            writeln!(writer, "No jobs in market {}", self.market)?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<44}  {:<10}  {:<8}  {:<6}  {:>4}  {:>12}",
            "ID", "STATE", "NODE", "GPU", "VRAM", "CREATED"
        )?;
        writeln!(writer, "{}", "─".repeat(94))?;
        for job in &self.jobs {
            let node = job.node.map_or_else(|| "-".to_string(), |n| n.short());
            writeln!(
                writer,
                "{:<44}  {:<10}  {:<8}  {:<6}  {:>4}  {:>12}",
                job.id.to_string(),
                job.state.to_string(),
                node,
                job.gpu_type.to_string(),
                job.min_vram,
                job.time_created
            )?;
        }
        writeln!(writer)?;
        writeln!(writer, "Total: {} job(s)", self.jobs.len())?;
        Ok(())
    }
}

/// Result of creating a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobCreated {
    /// Job ID.
    pub job: Pubkey,
    /// What happened on submission.
    pub admission: JobAdmission,
}

impl TableDisplay for JobCreated {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ Created job {}", self.job)?;
        match self.admission {
            JobAdmission::Queued { position } => writeln!(writer, "  queued at position {position}")?,
            JobAdmission::Matched { node } => writeln!(writer, "  matched with node {node}")?,
        }
        Ok(())
    }
}

/// Result of listing a node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeListed {
    /// Node identity.
    pub node: Pubkey,
    /// What happened on submission.
    pub admission: NodeAdmission,
}

impl TableDisplay for NodeListed {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ Listed node {}", self.node)?;
        match self.admission {
            NodeAdmission::Queued { position } => writeln!(writer, "  queued at position {position}")?,
            NodeAdmission::Matched { job } => writeln!(writer, "  matched with job {job}")?,
        }
        Ok(())
    }
}

/// Result of a timeout sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Swept market.
    pub market: Pubkey,
    /// Jobs that timed out, oldest first.
    pub timed_out: Vec<Pubkey>,
}

impl TableDisplay for SweepReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.timed_out.is_empty() {
            writeln!(writer, "No expired jobs in market {}", self.market)?;
            return Ok(());
        }
        writeln!(writer, "Timed out {} job(s):", self.timed_out.len())?;
        for job in &self.timed_out {
            writeln!(writer, "  {job}")?;
        }
        Ok(())
    }
}

/// Balance and reputation of a node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    /// Node identity.
    pub node: Pubkey,
    /// Payable balance.
    pub balance: Amount,
    /// Jobs completed.
    pub completed_jobs: u64,
    /// Jobs timed out while bound to the node.
    pub timed_out_jobs: u64,
    /// Total released to the node.
    pub total_revenue: Amount,
    /// Rolling average execution time.
    pub avg_execution_secs: u64,
    /// Score in 0..=1000.
    pub score: u16,
    /// Tier for the score.
    pub tier: Tier,
}

impl NodeView {
    /// Builds the view; a node without history gets a fresh record.
    #[must_use]
    pub fn new(node: Pubkey, balance: Amount, reputation: Option<NodeReputation>) -> Self {
        let rep = reputation.unwrap_or_default();
        Self {
            node,
            balance,
            completed_jobs: rep.completed_jobs(),
            timed_out_jobs: rep.timed_out_jobs(),
            total_revenue: rep.total_revenue(),
            avg_execution_secs: rep.avg_execution_secs(),
            score: rep.score(),
            tier: rep.tier(),
        }
    }
}

impl TableDisplay for NodeView {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Node {}", self.node)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Balance:        {}", self.balance)?;
        writeln!(writer, "Revenue:        {}", self.total_revenue)?;
        writeln!(writer)?;
        writeln!(writer, "Reputation")?;
        writeln!(writer, "  Score:        {} ({})", self.score, self.tier)?;
        writeln!(writer, "  Completed:    {}", self.completed_jobs)?;
        writeln!(writer, "  Timed Out:    {}", self.timed_out_jobs)?;
        writeln!(writer, "  Avg Runtime:  {}s", self.avg_execution_secs)?;
        Ok(())
    }
}

/// Simple message output.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message text.
    pub message: String,
    /// Whether this is a success message.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
}

impl Message {
    /// Create a success message.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.success {
            writeln!(writer, "✓ {}", self.message)?;
        } else {
            writeln!(writer, "{}", self.message)?;
        }
        Ok(())
    }
}
