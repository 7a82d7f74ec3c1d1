//! The live index, swapped atomically between build generations.
//!
//! Readers take an `Arc<IndexSnapshot>` and keep using it for as long as they
//! need; a concurrent publish never changes what they see. Every build draws
//! a ticket with a monotonically increasing generation before it starts, and
//! a finished build is only installed if nothing newer has been published in
//! the meantime.

use crate::retrieval::corpus_loader::{BuildReport, LoadOutcome};
use crate::retrieval::vector_index::VectorIndex;
use arc_swap::ArcSwap;
use serde::Serialize;
use sift_embed::ModelIdentity;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An immutable, published index together with the report of the build that
/// produced it.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub generation: u64,
    pub index: VectorIndex,
    pub report: BuildReport,
}

impl IndexSnapshot {
    /// Generation 0: an empty index that answers every query with nothing.
    pub fn initial(model: ModelIdentity) -> Self {
        Self {
            generation: 0,
            index: VectorIndex::empty(model),
            report: BuildReport::initial(),
        }
    }
}

impl From<LoadOutcome> for IndexSnapshot {
    fn from(outcome: LoadOutcome) -> Self {
        Self {
            generation: outcome.report.generation,
            index: outcome.index,
            report: outcome.report,
        }
    }
}

/// Permission to build one generation.
#[derive(Debug)]
pub struct BuildTicket {
    generation: u64,
}

impl BuildTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published { generation: u64 },
    /// A newer generation was already live; the snapshot was dropped
    Superseded { generation: u64, current: u64 },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

pub struct IndexHandle {
    current: ArcSwap<IndexSnapshot>,
    last_ticket: AtomicU64,
}

impl IndexHandle {
    pub fn new(initial: IndexSnapshot) -> Self {
        let last_ticket = AtomicU64::new(initial.generation);
        Self {
            current: ArcSwap::from_pointee(initial),
            last_ticket,
        }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn begin_build(&self) -> BuildTicket {
        let generation = self.last_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Issued build ticket for generation {}", generation);
        BuildTicket { generation }
    }

    /// Install `snapshot` unless a newer generation is already live.
    pub fn publish(&self, snapshot: IndexSnapshot) -> PublishOutcome {
        let generation = snapshot.generation;
        let candidate = Arc::new(snapshot);

        let previous = self.current.rcu(|current| {
            if candidate.generation > current.generation {
                Arc::clone(&candidate)
            } else {
                Arc::clone(current)
            }
        });

        if previous.generation < generation {
            tracing::info!(
                "Published generation {} ({} chunks), replacing generation {}",
                generation,
                candidate.index.len(),
                previous.generation
            );
            PublishOutcome::Published { generation }
        } else {
            tracing::warn!(
                "Discarding generation {}: generation {} is already live",
                generation,
                previous.generation
            );
            PublishOutcome::Superseded {
                generation,
                current: previous.generation,
            }
        }
    }
}
