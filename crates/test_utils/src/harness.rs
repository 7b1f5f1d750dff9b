//! Pre-wired services over the in-memory store

use std::sync::Arc;

use domain_billing::{BillLedger, PaymentRecorder, Propagator, StatisticsAggregator};

use crate::memory::MemoryStore;

/// The full service stack over one shared in-memory store
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub ledger: BillLedger,
    pub recorder: PaymentRecorder,
    pub stats: StatisticsAggregator,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let bills: Arc<MemoryStore> = Arc::clone(&store);
        let payments: Arc<MemoryStore> = Arc::clone(&store);
        let links: Arc<MemoryStore> = Arc::clone(&store);

        let propagator = Propagator::new(links);
        let ledger = BillLedger::new(bills.clone(), payments.clone(), propagator);
        let recorder = PaymentRecorder::new(bills.clone(), payments.clone());
        let stats = StatisticsAggregator::new(bills, payments);

        Self {
            store,
            ledger,
            recorder,
            stats,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
