//! Debounced change pipeline.
//!
//! Every mutation calls [`ChangePipeline::schedule`]. A pending flush is
//! never queued twice: scheduling while one is pending pushes its deadline
//! out and the flush, when it runs, serializes whatever the document holds
//! at that moment. Time is passed in explicitly so hosts drive the clock
//! from their own event loop.

use crate::media::{EmbeddedMediaInfo, MediaAccountant, ValidationReport};
use crate::model::Document;
use crate::registry::{NodeRegistry, RegistryError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    PendingFlush {
        due: Instant,
        /// Mutations folded into this flush.
        mutations: u64,
    },
}

/// Output of one flush.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    pub serialized: String,
    pub media: Vec<EmbeddedMediaInfo>,
    pub validation: ValidationReport,
    pub mutations: u64,
}

#[derive(Debug, Clone)]
pub struct ChangePipeline {
    debounce: Duration,
    state: PipelineState,
    flushes: u64,
}

impl ChangePipeline {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: PipelineState::Idle,
            flushes: 0,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, PipelineState::PendingFlush { .. })
    }

    /// When the pending flush becomes due, if any.
    pub fn due_at(&self) -> Option<Instant> {
        match self.state {
            PipelineState::PendingFlush { due, .. } => Some(due),
            PipelineState::Idle => None,
        }
    }

    /// Number of flushes handed out so far.
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// Records a mutation at `now`. A pending flush is superseded: its timer
    /// restarts from `now`.
    pub fn schedule(&mut self, now: Instant) {
        let due = now + self.debounce;
        self.state = match self.state {
            PipelineState::Idle => PipelineState::PendingFlush { due, mutations: 1 },
            PipelineState::PendingFlush { mutations, .. } => {
                tracing::trace!(mutations, "pending flush superseded");
                PipelineState::PendingFlush {
                    due,
                    mutations: mutations + 1,
                }
            }
        };
    }

    /// Returns to `Idle` and reports how many mutations the flush covers
    /// when the debounce window has elapsed at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        match self.state {
            PipelineState::PendingFlush { due, .. } if now >= due => self.take(),
            _ => None,
        }
    }

    /// Takes the pending flush regardless of its deadline.
    pub fn take(&mut self) -> Option<u64> {
        let PipelineState::PendingFlush { mutations, .. } = self.state else {
            return None;
        };
        self.state = PipelineState::Idle;
        self.flushes += 1;
        Some(mutations)
    }

    /// Serializes `doc` and re-runs the accountant over the serialized tree.
    pub fn run_flush(
        doc: &Document,
        registry: &NodeRegistry,
        accountant: &mut MediaAccountant,
        mutations: u64,
    ) -> Result<FlushReport, RegistryError> {
        let value = registry.serialize_document(doc)?;
        let serialized = serde_json::to_string(&value)?;
        let media = accountant.recompute_from_json(&value).to_vec();
        tracing::debug!(
            bytes = serialized.len(),
            media = media.len(),
            mutations,
            "change flushed"
        );
        Ok(FlushReport {
            serialized,
            media,
            validation: accountant.validation(),
            mutations,
        })
    }
}
