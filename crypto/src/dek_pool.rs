//! Bounded pool of pre-zeroed DEK-sized buffers, keyed by key type.
//! Bounds the pool at a fixed size per key type and zeroizes every
//! buffer on release.

use std::collections::HashMap;
use std::sync::Mutex;

use zeroize::Zeroizing;

/// Buffers held per key type. 64 is arbitrary but bounds worst-case
/// resident memory to 64 * 32B = 2KiB per key type, negligible next to a
/// connection pool.
const BUFFERS_PER_KEY_TYPE: usize = 64;
const DEK_LEN: usize = 32;

pub struct DekBufferPool {
    free: Mutex<HashMap<String, Vec<Zeroizing<[u8; DEK_LEN]>>>>,
}

impl DekBufferPool {
    pub fn new() -> Self {
        Self { free: Mutex::new(HashMap::new()) }
    }

    /// Returns a zeroed buffer for `key_type`, reused from the pool if one
    /// is free. Never blocks: under contention it falls back to a fresh
    /// allocation rather than making a caller wait for a DEK buffer.
    pub fn acquire(&self, key_type: &str) -> Zeroizing<[u8; DEK_LEN]> {
        let mut free = match self.free.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Zeroizing::new([0u8; DEK_LEN]),
        };
        free.entry(key_type.to_string())
            .or_insert_with(|| Vec::with_capacity(BUFFERS_PER_KEY_TYPE))
            .pop()
            .unwrap_or_else(|| Zeroizing::new([0u8; DEK_LEN]))
    }

    /// Returns `buffer` to the pool for `key_type` after zeroizing it
    /// (`Zeroizing` already did this on drop of the caller's copy, this
    /// zeroizes the instance we're retaining). Buffers beyond
    /// `BUFFERS_PER_KEY_TYPE` are dropped instead of retained.
    pub fn release(&self, key_type: &str, mut buffer: Zeroizing<[u8; DEK_LEN]>) {
        use zeroize::Zeroize;
        buffer.zeroize();

        let mut free = match self.free.try_lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let bucket = free.entry(key_type.to_string()).or_insert_with(Vec::new);
        if bucket.len() < BUFFERS_PER_KEY_TYPE {
            bucket.push(buffer);
        }
    }
}

impl Default for DekBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_returns_zeroed_buffer() {
        let pool = DekBufferPool::new();
        let buf = pool.acquire("AES_256");
        assert_eq!(&*buf, &[0u8; DEK_LEN]);
    }

    #[test]
    fn released_buffer_is_zeroized_and_reused() {
        let pool = DekBufferPool::new();
        let mut buf = pool.acquire("AES_256");
        buf[0] = 0xFF;
        pool.release("AES_256", buf);

        let reused = pool.acquire("AES_256");
        assert_eq!(&*reused, &[0u8; DEK_LEN]);
    }

    #[test]
    fn pool_does_not_grow_past_capacity() {
        let pool = DekBufferPool::new();
        for _ in 0..BUFFERS_PER_KEY_TYPE + 10 {
            pool.release("AES_256", Zeroizing::new([0u8; DEK_LEN]));
        }
        let free = pool.free.lock().unwrap();
        assert_eq!(free.get("AES_256").unwrap().len(), BUFFERS_PER_KEY_TYPE);
    }
}
