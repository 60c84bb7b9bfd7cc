//! Single-producer single-consumer byte ring with framed records.
//!
//! Records are `[u32 length][bytes]`, length-aligned to four bytes. A record
//! never wraps: when the tail would split a record across the end of the
//! buffer, the producer publishes a zero-length padding record and restarts
//! at offset zero. One side produces, one side consumes; positions are
//! monotonic and the masked offset selects the slot.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use thiserror::Error;

const HEADER_LEN: usize = 4;
const RECORD_ALIGN: usize = 4;

#[derive(Debug, Error)]
pub enum RingError {
    #[error("ring capacity must be a power of two, got {got}")]
    CapacityNotPowerOfTwo { got: usize },
    #[error("record of {got} bytes exceeds ring capacity {capacity}")]
    RecordTooLarge { got: usize, capacity: usize },
    #[error("ring full: {needed} bytes needed, {free} free")]
    Full { needed: usize, free: usize },
}

pub struct RingBuffer {
    data: Box<[AtomicU8]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

impl RingBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Arc<Self>, RingError> {
        if !capacity.is_power_of_two() || capacity < HEADER_LEN * 2 {
            return Err(RingError::CapacityNotPowerOfTwo { got: capacity });
        }
        let data = (0..capacity).map(|_| AtomicU8::new(0)).collect();
        Ok(Arc::new(Self {
            data,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }))
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Publish one record assembled from `parts`. Producer side only.
    pub fn push(&self, parts: &[&[u8]]) -> Result<(), RingError> {
        let capacity = self.capacity();
        let record_len: usize = parts.iter().map(|p| p.len()).sum();
        let framed = HEADER_LEN + align(record_len);
        if framed > capacity {
            return Err(RingError::RecordTooLarge {
                got: record_len,
                capacity,
            });
        }

        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        let free = capacity - (tail - head);
        let offset = tail & self.mask;
        let contiguous = capacity - offset;

        let (write_at, advance) = if framed <= contiguous {
            (offset, framed)
        } else {
            // Padding record: skip to the start of the buffer.
            if free < contiguous + framed {
                return Err(RingError::Full {
                    needed: contiguous + framed,
                    free,
                });
            }
            self.store_bytes(offset, &0u32.to_le_bytes());
            (0, contiguous + framed)
        };
        if free < advance {
            return Err(RingError::Full {
                needed: advance,
                free,
            });
        }

        self.store_bytes(write_at, &(record_len as u32).to_le_bytes());
        let mut at = write_at + HEADER_LEN;
        for part in parts {
            self.store_bytes(at, part);
            at += part.len();
        }
        self.tail.store(tail + advance, Ordering::Release);
        Ok(())
    }

    /// Copy the next record into `out`, returning false when the ring is
    /// empty. Consumer side only.
    pub fn pop(&self, out: &mut Vec<u8>) -> bool {
        loop {
            let head = self.head.load(Ordering::Relaxed);
            let tail = self.tail.load(Ordering::Acquire);
            if head == tail {
                return false;
            }
            let offset = head & self.mask;
            let record_len = self.load_u32(offset) as usize;
            if record_len == 0 {
                // Padding record: the producer restarted at offset zero.
                self.head
                    .store(head + (self.capacity() - offset), Ordering::Release);
                continue;
            }
            out.clear();
            out.reserve(record_len);
            for i in 0..record_len {
                out.push(self.data[offset + HEADER_LEN + i].load(Ordering::Relaxed));
            }
            self.head
                .store(head + HEADER_LEN + align(record_len), Ordering::Release);
            return true;
        }
    }

    fn store_bytes(&self, at: usize, src: &[u8]) {
        for (i, byte) in src.iter().enumerate() {
            self.data[at + i].store(*byte, Ordering::Relaxed);
        }
    }

    fn load_u32(&self, at: usize) -> u32 {
        let mut raw = [0u8; 4];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = self.data[at + i].load(Ordering::Relaxed);
        }
        u32::from_le_bytes(raw)
    }
}

fn align(len: usize) -> usize {
    (len + RECORD_ALIGN - 1) & !(RECORD_ALIGN - 1)
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .finish()
    }
}
