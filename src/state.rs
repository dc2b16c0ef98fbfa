use std::sync::Arc;

use crate::facade::{CounterEngine, QueryFacade, RetryPolicy};
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub queries: QueryFacade,
    pub counters: CounterEngine,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, retry: RetryPolicy) -> Self {
        Self {
            queries: QueryFacade::new(store.clone()),
            counters: CounterEngine::new(store, retry),
        }
    }
}
