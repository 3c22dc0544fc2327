//! The job descriptor for one parallel dispatch.
//!
//! Workers atomically claim the next unclaimed chunk and mark each chunk
//! complete when done. Every dispatch owns a fresh `WorkItem`; nothing about a
//! dispatch lives in shared or static state.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::runtime::chunk_count;

/// One claimed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub len: usize,
}

#[derive(Debug)]
pub struct WorkItem {
    total: usize,
    chunk_size: usize,
    chunk_count: usize,
    next_chunk: AtomicUsize,
    completed: AtomicUsize,
}

impl WorkItem {
    pub fn new(total: usize, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            total,
            chunk_size,
            chunk_count: chunk_count(total, chunk_size),
            next_chunk: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Claims the next chunk, or `None` once every chunk has been handed out.
    pub fn claim_next(&self) -> Option<Chunk> {
        let index = self.next_chunk.fetch_add(1, Ordering::Relaxed);
        if index >= self.chunk_count {
            return None;
        }
        let start = index * self.chunk_size;
        let len = self.chunk_size.min(self.total - start.min(self.total));
        Some(Chunk { index, start, len })
    }

    /// Marks one claimed chunk as finished.
    pub fn complete(&self) {
        self.completed.fetch_add(1, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.completed.load(Ordering::Acquire) == self.chunk_count
    }
}
