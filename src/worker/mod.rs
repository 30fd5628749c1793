//! Workers
//!
//! A worker is one registry plus the router that serves it. Workers share
//! nothing but the handler table: a client only ever reaches clients
//! assigned to the same worker. The client listener spreads accepted
//! connections over the pool round-robin; the backend bridge feeds every
//! worker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::handler::HandlerRegistry;
use crate::registry::Registry;
use crate::router::{Message, Origin, Router};

pub struct Worker {
    pub index: usize,
    router: Router,
}

impl Worker {
    pub fn new(index: usize, handlers: Arc<HandlerRegistry>) -> Self {
        let registry = Arc::new(Mutex::new(Registry::new()));
        Self {
            index,
            router: Router::new(registry, handlers),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn connection_count(&self) -> usize {
        self.router.lock_registry().len()
    }
}

pub struct WorkerPool {
    workers: Vec<Worker>,
    next: AtomicUsize,
}

impl WorkerPool {
    /// Build `count` workers. A pool always has at least one.
    pub fn new(count: usize, handlers: Arc<HandlerRegistry>) -> Self {
        let workers = (0..count.max(1))
            .map(|index| Worker::new(index, handlers.clone()))
            .collect();
        Self {
            workers,
            next: AtomicUsize::new(0),
        }
    }

    /// Pick the worker for a newly accepted connection.
    pub fn assign(&self) -> &Worker {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        &self.workers[slot]
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn connection_count(&self) -> usize {
        self.workers.iter().map(Worker::connection_count).sum()
    }

    /// Hand a backend message to every worker. Returns the total number of
    /// frames queued.
    pub fn route_backend(&self, message: &Message) -> usize {
        self.workers
            .iter()
            .map(|worker| worker.router().route(&Origin::Backend, message.clone()))
            .sum()
    }
}
