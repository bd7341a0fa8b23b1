//! `UUID_SHORT()` generation.

use parking_lot::Mutex;

/// Generates 64-bit ids unique for one server lifetime.
///
/// The counter starts at `(server_id & 255) << 56 | start_time << 24` and
/// is incremented under a mutex per call. Ids stay unique across restarts
/// as long as fewer than 2^24 ids are drawn per second of uptime on average.
pub struct UuidShortGenerator {
    next: Mutex<u64>,
}

impl UuidShortGenerator {
    pub fn new(server_id: u32, start_time: u64) -> Self {
        let base = ((server_id as u64 & 0xFF) << 56)
            .wrapping_add((start_time & 0xFFFF_FFFF) << 24);
        Self {
            next: Mutex::new(base),
        }
    }

    pub fn next(&self) -> u64 {
        let mut next = self.next.lock();
        let id = *next;
        *next = next.wrapping_add(1);
        id
    }

    /// The id the next call will return.
    pub fn peek(&self) -> u64 {
        *self.next.lock()
    }
}
