//! Kernel arena
//!
//! The engine owns a growable buffer that kernels are placed into. Callers
//! grow it to cover `offset + size` and then place a record at `offset`; the
//! arena owns every placed record and destroys them in reverse placement
//! order.

use super::ExprKernel;
use crate::error::{Error, Result};
use std::fmt;

/// Capacity of a fresh arena in bytes
const INITIAL_CAPACITY: usize = 128;

struct Placed {
    offset: usize,
    size: usize,
    kernel: Box<dyn ExprKernel>,
}

/// Caller-owned arena holding instantiated kernels at byte offsets
pub struct KernelBuilder {
    capacity: usize,
    limit: Option<usize>,
    records: Vec<Placed>,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            capacity: INITIAL_CAPACITY,
            limit: None,
            records: Vec::new(),
        }
    }

    /// Arena that refuses to grow past `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        Self {
            capacity: INITIAL_CAPACITY.min(limit),
            limit: Some(limit),
            records: Vec::new(),
        }
    }

    /// Current capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grow the arena to hold at least `requested` bytes
    ///
    /// Capacity at least doubles on each growth.
    pub fn ensure_capacity(&mut self, requested: usize) -> Result<()> {
        if requested <= self.capacity {
            return Ok(());
        }
        if self.limit.is_some_and(|limit| requested > limit) {
            return Err(Error::AllocationFailure { requested });
        }
        let mut grown = self.capacity.saturating_mul(2).max(requested);
        if let Some(limit) = self.limit {
            grown = grown.min(limit);
        }
        tracing::trace!(from = self.capacity, to = grown, "kernel arena grown");
        self.capacity = grown;
        Ok(())
    }

    /// Place `kernel` at `offset`, returning the offset just past it
    ///
    /// The range must lie within the current capacity and must not overlap a
    /// record placed earlier.
    pub fn place<K: ExprKernel + 'static>(&mut self, offset: usize, kernel: K) -> Result<usize> {
        let size = std::mem::size_of::<K>().max(1);
        let end = offset
            .checked_add(size)
            .ok_or_else(|| Error::Internal(format!("kernel offset {offset} overflows")))?;
        if end > self.capacity {
            return Err(Error::Internal(format!(
                "kernel at {offset}..{end} exceeds arena capacity {}",
                self.capacity
            )));
        }
        if let Some(other) = self
            .records
            .iter()
            .find(|r| r.offset < end && offset < r.offset + r.size)
        {
            return Err(Error::Internal(format!(
                "kernel at {offset}..{end} overlaps kernel at {}..{}",
                other.offset,
                other.offset + other.size
            )));
        }
        self.records
            .try_reserve(1)
            .map_err(|_| Error::AllocationFailure { requested: end })?;
        self.records.push(Placed {
            offset,
            size,
            kernel: Box::new(kernel),
        });
        tracing::trace!(offset, end, "kernel placed");
        Ok(end)
    }

    /// Kernel placed at exactly `offset`
    pub fn get(&self, offset: usize) -> Option<&dyn ExprKernel> {
        self.records
            .iter()
            .find(|r| r.offset == offset)
            .map(|r| r.kernel.as_ref())
    }

    /// Number of placed kernels
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Destroy every placed kernel, newest first; capacity is kept
    pub fn reset(&mut self) {
        while let Some(record) = self.records.pop() {
            drop(record);
        }
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KernelBuilder {
    fn drop(&mut self) {
        self.reset();
    }
}

impl fmt::Debug for KernelBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelBuilder")
            .field("capacity", &self.capacity)
            .field("limit", &self.limit)
            .field(
                "records",
                &self
                    .records
                    .iter()
                    .map(|r| r.offset..r.offset + r.size)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
