//! Multi-threaded matching against shared markets.
//!
//! Many clients and nodes hit the same market at once. Whatever the
//! interleaving, no job may be bound twice, no node may be handed two jobs
//! from one listing, and the vault must hold exactly the open escrow.

use std::collections::HashSet;
use std::thread;

use hypernode_core::Amount;
use hypernode_integration_tests::{Harness, content, identity, job_request};
use hypernode_market::{
    EngineConfig, ErrorKind, GpuType, JobAdmission, JobState, MarketParams, NodeAdmission,
};

const PRICE: Amount = Amount::from_hyper(2);
const JOBS: usize = 64;
const NODES: usize = 48;

fn harness() -> Harness {
    Harness::new(MarketParams::new(PRICE, 3600, 0)).unwrap()
}

#[test]
fn concurrent_arrivals_bind_each_job_once() {
    let h = harness();
    let clients: Vec<_> = (0..JOBS)
        .map(|i| h.funded_client(&format!("client-{i}"), 2).unwrap())
        .collect();

    let (job_outcomes, node_outcomes) = thread::scope(|s| {
        let jobs: Vec<_> = clients
            .iter()
            .enumerate()
            .map(|(i, client)| {
                let h = &h;
                s.spawn(move || {
                    let request = job_request(&format!("job-{i}"), 0, GpuType::Any);
                    let id = request.id;
                    (id, h.place.create_job(h.market, *client, request).unwrap())
                })
            })
            .collect();
        let nodes: Vec<_> = (0..NODES)
            .map(|i| {
                let h = &h;
                s.spawn(move || {
                    let node = identity(&format!("node-{i}"));
                    (node, h.place.list_node(h.market, node, 0).unwrap())
                })
            })
            .collect();
        (
            jobs.into_iter().map(|t| t.join().unwrap()).collect::<Vec<_>>(),
            nodes.into_iter().map(|t| t.join().unwrap()).collect::<Vec<_>>(),
        )
    });

    // Every pairing is reported exactly once, from whichever side arrived second.
    let mut pairs = HashSet::new();
    for (job, admission) in &job_outcomes {
        if let JobAdmission::Matched { node } = admission {
            assert!(pairs.insert((*job, *node)));
        }
    }
    for (node, admission) in &node_outcomes {
        if let NodeAdmission::Matched { job } = admission {
            assert!(pairs.insert((*job, *node)));
        }
    }
    assert_eq!(pairs.len(), NODES);

    let bound_jobs: HashSet<_> = pairs.iter().map(|(job, _)| *job).collect();
    let bound_nodes: HashSet<_> = pairs.iter().map(|(_, node)| *node).collect();
    assert_eq!(bound_jobs.len(), NODES);
    assert_eq!(bound_nodes.len(), NODES);

    let jobs = h.place.jobs_for_market(&h.market).unwrap();
    let running: Vec<_> = jobs.iter().filter(|j| j.state == JobState::Running).collect();
    assert_eq!(running.len(), NODES);
    for job in running {
        assert!(pairs.contains(&(job.id, job.node.unwrap())));
    }

    let market = h.place.market(&h.market).unwrap();
    assert_eq!(market.queue.len(), JOBS - NODES);
    assert_eq!(market.total_jobs, JOBS as u64);
    assert_eq!(market.total_nodes, NODES as u64);
    h.place.check_invariants(&h.market).unwrap();
}

#[test]
fn racing_finish_and_timeout_settle_once() {
    let h = harness();
    let client = h.funded_client("client", 2).unwrap();
    let node = identity("node");
    let (job, _) = h.submit(client, "race").unwrap();
    h.place.list_node(h.market, node, 0).unwrap();
    h.clock.advance(3600);

    let (finished, timed_out) = thread::scope(|s| {
        let finish = s.spawn(|| h.place.finish_job(job, node, content("result")));
        let timeout = s.spawn(|| h.place.timeout_job(job));
        (finish.join().unwrap(), timeout.join().unwrap())
    });

    // At the deadline itself the job is still live, so only finish can win.
    assert!(finished.is_ok());
    let err = timed_out.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidJobState);
    assert_eq!(h.place.balance(&node), PRICE);
    assert_eq!(h.place.balance(&client), Amount::ZERO);
    assert_eq!(h.vault().unwrap(), Amount::ZERO);
}

#[test]
fn racing_finish_and_timeout_past_deadline_settle_once() {
    let config = EngineConfig::new().with_deadline_on_finish(false);
    for round in 0..32 {
        let h = Harness::with_config(MarketParams::new(PRICE, 3600, 0), config.clone()).unwrap();
        let client = h.funded_client("client", 2).unwrap();
        let node = identity("node");
        let (job, _) = h.submit(client, &format!("race-{round}")).unwrap();
        h.place.list_node(h.market, node, 0).unwrap();
        h.clock.advance(3601);

        let (finished, timed_out) = thread::scope(|s| {
            let finish = s.spawn(|| h.place.finish_job(job, node, content("result")));
            let timeout = s.spawn(|| h.place.timeout_job(job));
            (finish.join().unwrap(), timeout.join().unwrap())
        });

        // Both transitions are eligible; exactly one commits.
        assert_ne!(finished.is_ok(), timed_out.is_ok());
        let loser = match (&finished, &timed_out) {
            (Err(err), Ok(_)) | (Ok(_), Err(err)) => err,
            _ => unreachable!(),
        };
        assert_eq!(loser.kind(), ErrorKind::InvalidJobState);

        let record = h.place.job(&job).unwrap();
        if finished.is_ok() {
            assert_eq!(record.state, JobState::Completed);
            assert_eq!(h.place.balance(&node), PRICE);
            assert_eq!(h.place.balance(&client), Amount::ZERO);
        } else {
            assert_eq!(record.state, JobState::TimedOut);
            assert_eq!(h.place.balance(&node), Amount::ZERO);
            assert_eq!(h.place.balance(&client), PRICE);
        }
        assert_eq!(h.vault().unwrap(), Amount::ZERO);
        h.place.check_invariants(&h.market).unwrap();
    }
}

#[test]
fn concurrent_timeouts_refund_once() {
    let h = harness();
    let client = h.funded_client("client", 2).unwrap();
    let (job, _) = h.submit(client, "expiring").unwrap();
    h.clock.advance(3601);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| h.place.timeout_job(job))).collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::InvalidJobState);
    }
    assert_eq!(h.place.balance(&client), Amount::from_hyper(2));
    assert_eq!(h.vault().unwrap(), Amount::ZERO);
}

#[test]
fn independent_markets_progress_in_parallel() {
    let h = harness();
    let markets: Vec<_> = (0..4u64)
        .map(|i| {
            h.place
                .create_market(identity(&format!("authority-{i}")), MarketParams::new(PRICE, 60, 0))
                .unwrap()
        })
        .collect();

    thread::scope(|s| {
        for (m, market) in markets.iter().enumerate() {
            let h = &h;
            s.spawn(move || {
                for i in 0..16 {
                    let client = h.funded_client(&format!("client-{m}-{i}"), 2).unwrap();
                    let node = identity(&format!("node-{m}-{i}"));
                    let request = job_request(&format!("job-{m}-{i}"), 0, GpuType::Any);
                    let job = request.id;
                    h.place.create_job(*market, client, request).unwrap();
                    h.place.list_node(*market, node, 0).unwrap();
                    h.place.finish_job(job, node, content("done")).unwrap();
                }
            });
        }
    });

    for market in &markets {
        assert_eq!(h.place.vault_balance(market).unwrap(), Amount::ZERO);
        let jobs = h.place.jobs_for_market(market).unwrap();
        assert_eq!(jobs.len(), 16);
        assert!(jobs.iter().all(|j| j.state == JobState::Completed));
        h.place.check_invariants(market).unwrap();
    }
}
