use std::sync::Arc;

/// Hash function used to place keys and virtual nodes on the ring.
///
/// Every node in a cluster must use the same function, otherwise they will
/// disagree on key ownership.
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// CRC-32 (IEEE) checksum, the default ring hash.
pub fn crc32_hash(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

pub fn default_hash_fn() -> HashFn {
    Arc::new(crc32_hash)
}
