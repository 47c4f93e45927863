//! Property tests over random operation sequences.

use std::collections::HashMap;

use hypernode_core::{Amount, Pubkey};
use hypernode_integration_tests::{Harness, content, identity, job_request};
use hypernode_market::{
    EngineConfig, GpuType, Job, JobState, MarketParams, QueueType, QueuedJobExpiry,
};
use proptest::prelude::*;

const PRICE: Amount = Amount::from_hyper(3);
const TIMEOUT: i64 = 100;

#[derive(Debug, Clone)]
enum Op {
    Create(u8),
    List(u8),
    Delist(u8),
    Finish(u8, u8),
    Cancel(u8),
    Timeout(u8),
    Sweep,
    Advance(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..12).prop_map(Op::Create),
        3 => (0u8..6).prop_map(Op::List),
        1 => (0u8..6).prop_map(Op::Delist),
        3 => (0u8..12, 0u8..6).prop_map(|(j, n)| Op::Finish(j, n)),
        1 => (0u8..12).prop_map(Op::Cancel),
        1 => (0u8..12).prop_map(Op::Timeout),
        1 => Just(Op::Sweep),
        2 => (1i64..80).prop_map(Op::Advance),
    ]
}

fn job_id(i: u8) -> Pubkey {
    job_request(&format!("job-{i}"), 0, GpuType::Any).id
}

fn node_id(i: u8) -> Pubkey {
    identity(&format!("node-{i}"))
}

fn apply(h: &Harness, client: Pubkey, op: &Op) {
    // Rejections are expected; the properties below only look at state.
    let _ = match *op {
        Op::Create(j) => h
            .place
            .create_job(h.market, client, job_request(&format!("job-{j}"), 0, GpuType::Any))
            .map(drop),
        Op::List(n) => h.place.list_node(h.market, node_id(n), 0).map(drop),
        Op::Delist(n) => h.place.delist_node(h.market, node_id(n)),
        Op::Finish(j, n) => h.place.finish_job(job_id(j), node_id(n), content("out")).map(drop),
        Op::Cancel(j) => h.place.cancel_job(job_id(j), client).map(drop),
        Op::Timeout(j) => h.place.timeout_job(job_id(j)).map(drop),
        Op::Sweep => h.place.sweep_timeouts(h.market).map(drop),
        Op::Advance(secs) => {
            h.clock.advance(secs);
            Ok(())
        }
    };
}

fn open_escrow(jobs: &[Job]) -> Amount {
    jobs.iter()
        .filter(|j| j.is_open())
        .map(|j| j.price)
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn ledger_invariants_hold_after_every_operation(
        ops in prop::collection::vec(op(), 1..80),
        running_only in any::<bool>(),
    ) {
        let config = if running_only {
            EngineConfig::new().with_queued_job_expiry(QueuedJobExpiry::RunningOnly)
        } else {
            EngineConfig::new()
        };
        let h = Harness::with_config(MarketParams::new(PRICE, TIMEOUT, 0), config).unwrap();
        let client = h.funded_client("client", 1_000).unwrap();
        let supply = h.place.balance(&client);

        let mut terminal: HashMap<Pubkey, Job> = HashMap::new();
        let mut bound: HashMap<Pubkey, Pubkey> = HashMap::new();

        for op in &ops {
            apply(&h, client, op);

            let jobs = h.place.jobs_for_market(&h.market).unwrap();
            let market = h.place.market(&h.market).unwrap();

            // escrow conservation
            prop_assert_eq!(h.vault().unwrap(), open_escrow(&jobs));
            h.place.check_invariants(&h.market).unwrap();

            // queue exclusivity
            prop_assert_eq!(market.queue_type() == QueueType::Empty, market.queue.is_empty());

            // no value is created or destroyed
            let nodes_paid: Amount = (0..6).map(|n| h.place.balance(&node_id(n))).sum();
            let held = h.place.balance(&client).checked_add(h.vault().unwrap()).unwrap();
            prop_assert_eq!(held.checked_add(nodes_paid).unwrap(), supply);

            for job in jobs {
                // at-most-one assignment
                if let Some(node) = job.node {
                    let first = *bound.entry(job.id).or_insert(node);
                    prop_assert_eq!(first, node);
                } else {
                    prop_assert!(!bound.contains_key(&job.id));
                }

                // terminal immutability
                if let Some(frozen) = terminal.get(&job.id) {
                    prop_assert_eq!(frozen, &job);
                } else if job.state.is_terminal() {
                    terminal.insert(job.id, job);
                }
            }
        }
    }

    #[test]
    fn completed_jobs_pay_the_bound_node_only(finishers in prop::collection::vec(0u8..4, 1..10)) {
        let h = Harness::new(MarketParams::new(PRICE, TIMEOUT, 0)).unwrap();
        let client = h.funded_client("client", 3).unwrap();
        let (job, _) = h.submit(client, "contested").unwrap();
        h.place.list_node(h.market, node_id(0), 0).unwrap();

        let mut completions = 0;
        for n in &finishers {
            if h.place.finish_job(job, node_id(*n), content("out")).is_ok() {
                completions += 1;
                prop_assert_eq!(*n, 0);
            }
        }

        prop_assert!(completions <= 1);
        let paid = if completions == 1 { PRICE } else { Amount::ZERO };
        prop_assert_eq!(h.place.balance(&node_id(0)), paid);
        for n in 1..4 {
            prop_assert_eq!(h.place.balance(&node_id(n)), Amount::ZERO);
        }
        prop_assert_eq!(h.place.job(&job).unwrap().state == JobState::Completed, completions == 1);
    }
}
