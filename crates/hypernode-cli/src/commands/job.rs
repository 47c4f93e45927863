//! Job lifecycle commands.

use std::io::Write;

use hypernode_core::Pubkey;
use hypernode_market::{CreateJob, Marketplace};

use crate::cli::{CreateJobArgs, JobCommands};
use crate::error::CliError;
use crate::output::{JobCreated, JobList, OutputFormat};

/// Job command executor.
pub struct JobCommand<'a> {
    place: &'a Marketplace,
}

impl<'a> JobCommand<'a> {
    /// Create a new job command.
    #[must_use]
    pub const fn new(place: &'a Marketplace) -> Self {
        Self { place }
    }

    /// Execute a job subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the marketplace rejects the operation or
    /// writing fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &JobCommands,
    ) -> Result<(), CliError> {
        match command {
            JobCommands::Create(args) => {
                let created = self.create(args)?;
                format.write(writer, &created)?;
            }
            JobCommands::Show { id } => {
                let job = self
                    .place
                    .job(id)
                    .ok_or_else(|| CliError::NotFound(format!("job {id}")))?;
                format.write(writer, &job)?;
            }
            JobCommands::List { market } => {
                let jobs = self.place.jobs_for_market(market)?;
                format.write(writer, &JobList { market: *market, jobs })?;
            }
            JobCommands::Finish { id, node, result } => {
                let job = self.place.finish_job(*id, *node, *result)?;
                format.write(writer, &job)?;
            }
            JobCommands::Cancel { id, client } => {
                let job = self.place.cancel_job(*id, *client)?;
                format.write(writer, &job)?;
            }
            JobCommands::Timeout { id } => {
                let job = self.place.timeout_job(*id)?;
                format.write(writer, &job)?;
            }
        }
        Ok(())
    }

    fn create(&self, args: &CreateJobArgs) -> Result<JobCreated, CliError> {
        let request = CreateJob {
            id: args.id.unwrap_or_else(Pubkey::new_unique),
            ipfs_job: args.ipfs,
            min_vram: args.min_vram,
            gpu_type: args.gpu,
        };
        let job = request.id;
        let admission = self.place.create_job(args.market, args.client, request)?;
        Ok(JobCreated { job, admission })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use hypernode_core::{Amount, ContentHash};
    use hypernode_market::{ErrorKind, GpuType, JobAdmission, JobState, MarketError, MarketParams};

    fn setup() -> (Marketplace, Pubkey, Pubkey) {
        let place = Marketplace::default();
        let market = place
            .create_market(Pubkey::new([1; 32]), MarketParams::new(Amount::from_hyper(1), 600, 0))
            .unwrap();
        let client = Pubkey::new([2; 32]);
        place.deposit(client, Amount::from_hyper(5)).unwrap();
        (place, market, client)
    }

    fn args(market: Pubkey, client: Pubkey) -> CreateJobArgs {
        CreateJobArgs {
            market,
            client,
            ipfs: ContentHash::of(b"def"),
            min_vram: 4,
            gpu: GpuType::Any,
            id: Some(Pubkey::new([3; 32])),
        }
    }

    #[test]
    fn create_and_cancel() {
        let (place, market, client) = setup();
        let cmd = JobCommand::new(&place);
        let job = Pubkey::new([3; 32]);

        let created = cmd.create(&args(market, client)).unwrap();
        assert_eq!(created.job, job);
        assert_eq!(created.admission, JobAdmission::Queued { position: 1 });

        let mut out = Vec::new();
        cmd.execute(
            &mut out,
            &OutputFormat::new(Format::Json),
            &JobCommands::Cancel { id: job, client },
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["state"], "stopped");
        assert_eq!(place.job(&job).unwrap().state, JobState::Stopped);
        assert_eq!(place.balance(&client), Amount::from_hyper(5));
    }

    #[test]
    fn generated_id_when_omitted() {
        let (place, market, client) = setup();
        let cmd = JobCommand::new(&place);
        let mut a = args(market, client);
        a.id = None;
        let first = cmd.create(&a).unwrap();
        let second = cmd.create(&a).unwrap();
        assert_ne!(first.job, second.job);
    }

    #[test]
    fn insufficient_funds_surfaces_market_error() {
        let (place, market, _) = setup();
        let cmd = JobCommand::new(&place);
        let broke = Pubkey::new([8; 32]);
        match cmd.create(&args(market, broke)) {
            Err(CliError::Market(err)) => assert_eq!(err.kind(), ErrorKind::InsufficientFunds),
            other => panic!("expected market error, got {other:?}"),
        }
    }

    #[test]
    fn timeout_before_deadline_fails() {
        let (place, market, client) = setup();
        let cmd = JobCommand::new(&place);
        cmd.create(&args(market, client)).unwrap();
        let err = cmd
            .execute(
                &mut Vec::new(),
                &OutputFormat::default(),
                &JobCommands::Timeout { id: Pubkey::new([3; 32]) },
            )
            .unwrap_err();
        assert!(matches!(err, CliError::Market(MarketError::JobNotTimedOut { .. })));
    }
}
