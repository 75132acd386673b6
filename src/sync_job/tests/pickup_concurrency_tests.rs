//! Property: concurrent pickers never lease the same job twice.

use crate::binding::domain::OrgId;
use crate::sync_job::{
    adapters::memory::InMemorySyncJobStore,
    domain::{NewSyncJob, SyncJob, SyncJobType},
    ports::SyncJobStore,
};
use crate::test_support::SimulatedClock;
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

async fn drain(store: Arc<InMemorySyncJobStore>, clock: Arc<SimulatedClock>) -> Vec<SyncJob> {
    let mut leased = Vec::new();
    while let Some(job) = store
        .pickup_next(SyncJobType::RepoSync, clock.now())
        .await
        .expect("pickup")
    {
        leased.push(job);
        tokio::task::yield_now().await;
    }
    leased
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_pickers_receive_distinct_jobs(jobs in 0_usize..40, pickers in 1_usize..8) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .expect("runtime");

        let leased = runtime.block_on(async {
            let store = Arc::new(InMemorySyncJobStore::new());
            let clock = Arc::new(SimulatedClock::deterministic());
            let org = OrgId::new();
            for _ in 0..jobs {
                let job = SyncJob::new(NewSyncJob::new(org, SyncJobType::RepoSync, json!({})), &*clock);
                store.enqueue(&job).await.expect("enqueue");
            }

            let handles: Vec<_> = (0..pickers)
                .map(|_| tokio::spawn(drain(Arc::clone(&store), Arc::clone(&clock))))
                .collect();
            let mut all = Vec::new();
            for handle in handles {
                all.extend(handle.await.expect("picker task"));
            }
            all
        });

        let distinct: HashSet<_> = leased.iter().map(SyncJob::id).collect();
        prop_assert_eq!(leased.len(), jobs);
        prop_assert_eq!(distinct.len(), jobs);
    }
}
