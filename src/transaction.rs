/*!
Correlates asynchronous replies with the requests that caused them

Each outstanding request is stored under its transaction id together with
whatever the issuer needs once the reply arrives.
*/

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One outstanding request
#[derive(Debug)]
pub struct Transaction<T> {
    pub transaction_id: u32,
    /// The request tag, for diagnostics
    pub message_type: u16,
    pub issued_at: Instant,
    pub pending: T,
}

#[derive(Debug)]
pub struct TransactionTable<T> {
    next_id: u32,
    outstanding: HashMap<u32, Transaction<T>>,
}

impl<T> TransactionTable<T> {
    /// Constructs an empty table whose ids start at a random value
    pub fn new() -> TransactionTable<T> {
        let first: u32 = rand::random();
        trace!("Transaction ids start at {:#x}", first);
        TransactionTable::with_first_id(first)
    }

    pub fn with_first_id(first: u32) -> TransactionTable<T> {
        TransactionTable {
            next_id: first,
            outstanding: HashMap::new(),
        }
    }

    /// Hands out the next id. Ids wrap at 2^32.
    pub fn next_transaction_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Records an outstanding request.
    /// Panics if `transaction_id` is already outstanding.
    pub fn register(&mut self, transaction_id: u32, message_type: u16, pending: T) {
        assert!(
            !self.outstanding.contains_key(&transaction_id),
            "transaction {:#x} is already outstanding",
            transaction_id
        );
        debug!(
            "Registered transaction {:#x} for message type {:#06x}",
            transaction_id, message_type
        );
        self.outstanding.insert(
            transaction_id,
            Transaction {
                transaction_id,
                message_type,
                issued_at: Instant::now(),
                pending,
            },
        );
    }

    /// Looks up and removes the record of a reply's request.
    /// Unknown ids are logged and yield `None`.
    pub fn resolve_and_remove(&mut self, transaction_id: u32) -> Option<Transaction<T>> {
        let transaction = self.outstanding.remove(&transaction_id);
        if transaction.is_none() {
            warn!("No outstanding transaction {:#x}", transaction_id);
        }
        transaction
    }

    /// Looks at a record without resolving it
    pub fn get(&self, transaction_id: u32) -> Option<&Transaction<T>> {
        self.outstanding.get(&transaction_id)
    }

    /// Removes a record without it being an error if there is none
    pub fn remove(&mut self, transaction_id: u32) -> Option<Transaction<T>> {
        self.outstanding.remove(&transaction_id)
    }

    pub fn contains(&self, transaction_id: u32) -> bool {
        self.outstanding.contains_key(&transaction_id)
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Logs every transaction that is outstanding for more than `max_age`.
    /// The records stay in place, their ids are returned.
    pub fn sweep_stale(&self, now: Instant, max_age: Duration) -> Vec<u32> {
        let mut stale: Vec<u32> = self
            .outstanding
            .values()
            .filter(|t| now.saturating_duration_since(t.issued_at) > max_age)
            .map(|t| {
                warn!(
                    "Transaction {:#x} (message type {:#06x}) is outstanding for {:?}",
                    t.transaction_id,
                    t.message_type,
                    now.saturating_duration_since(t.issued_at)
                );
                t.transaction_id
            })
            .collect();
        stale.sort();
        stale
    }

    /// Drops all records, e.g. on teardown. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        for t in self.outstanding.values() {
            info!(
                "Dropping unanswered transaction {:#x} (message type {:#06x})",
                t.transaction_id, t.message_type
            );
        }
        let dropped = self.outstanding.len();
        self.outstanding.clear();
        dropped
    }
}

impl<T> Default for TransactionTable<T> {
    fn default() -> Self {
        TransactionTable::new()
    }
}
