//! Ticket number allocation
//!
//! Tickets come from a single counter document. Every allocation is one
//! atomic increment-and-fetch in the store; nothing is cached in process, so
//! several server instances can share one store. A ticket handed out for a
//! note that then fails to persist is simply skipped.

use crate::core::config::CounterConfig;
use crate::core::error::Result;
use crate::core::types::Counter;
use crate::storage::SharedStore;

/// Allocates ticket numbers from the configured counter
#[derive(Clone)]
pub struct TicketAllocator {
    store: SharedStore,
    counter_id: String,
    start_seq: u64,
}

impl TicketAllocator {
    /// Create an allocator over `store`
    pub fn new(store: SharedStore, config: &CounterConfig) -> Self {
        Self {
            store,
            counter_id: config.id.clone(),
            start_seq: config.start_seq,
        }
    }

    /// Seed the counter if it does not exist yet. Returns whether it was created.
    pub async fn initialize(&self) -> Result<bool> {
        let created = self
            .store
            .insert_counter_if_absent(Counter {
                id: self.counter_id.clone(),
                seq: self.start_seq,
            })
            .await?;

        if created {
            tracing::info!(counter = %self.counter_id, seq = self.start_seq, "Counter initialized");
        } else {
            tracing::debug!(counter = %self.counter_id, "Counter already present");
        }
        Ok(created)
    }

    /// Atomically take the next ticket number
    pub async fn allocate_next_ticket(&self) -> Result<u64> {
        let ticket = self
            .store
            .increment_counter(&self.counter_id, self.start_seq)
            .await?;
        crate::system::metrics::Metrics::global().tickets_allocated.inc();
        tracing::debug!(ticket, "Ticket allocated");
        Ok(ticket)
    }

    /// Current counter value, if the counter exists
    pub async fn current(&self) -> Result<Option<u64>> {
        Ok(self
            .store
            .find_counter(&self.counter_id)
            .await?
            .map(|counter| counter.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStore;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn allocator(start_seq: u64) -> TicketAllocator {
        let config = CounterConfig {
            id: "ticketId".into(),
            start_seq,
        };
        TicketAllocator::new(Arc::new(MemStore::new()), &config)
    }

    #[tokio::test]
    async fn test_first_ticket_is_seed_plus_one() {
        let tickets = allocator(499);
        assert!(tickets.initialize().await.unwrap());
        assert_eq!(tickets.current().await.unwrap(), Some(499));
        assert_eq!(tickets.allocate_next_ticket().await.unwrap(), 500);
        assert_eq!(tickets.allocate_next_ticket().await.unwrap(), 501);
    }

    #[tokio::test]
    async fn test_allocation_without_initialize_upserts() {
        let tickets = allocator(499);
        assert_eq!(tickets.current().await.unwrap(), None);
        assert_eq!(tickets.allocate_next_ticket().await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_initialize_never_resets() {
        let tickets = allocator(499);
        tickets.initialize().await.unwrap();
        tickets.allocate_next_ticket().await.unwrap();

        assert!(!tickets.initialize().await.unwrap());
        assert_eq!(tickets.allocate_next_ticket().await.unwrap(), 501);
    }

    #[tokio::test]
    async fn test_exhausted_counter_fails_allocation() {
        let tickets = allocator(u64::MAX - 1);
        assert_eq!(tickets.allocate_next_ticket().await.unwrap(), u64::MAX);

        let err = tickets.allocate_next_ticket().await.unwrap_err();
        assert!(err.is_server_error());
        assert_eq!(tickets.current().await.unwrap(), Some(u64::MAX));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_allocations_are_distinct() {
        let tickets = allocator(499);
        let handles: Vec<_> = (0..500)
            .map(|_| {
                let tickets = tickets.clone();
                tokio::spawn(async move { tickets.allocate_next_ticket().await.unwrap() })
            })
            .collect();

        let mut issued = HashSet::new();
        for handle in handles {
            issued.insert(handle.await.unwrap());
        }

        assert_eq!(issued.len(), 500);
        assert_eq!(issued.iter().min(), Some(&500));
        assert_eq!(issued.iter().max(), Some(&999));
    }
}
