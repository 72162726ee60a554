use crate::ShardId;
use std::num::NonZeroU32;

/// Shard count of the reference deployment. Changing it for a live deployment
/// reassigns every page.
pub const DEFAULT_NUM_SHARDS: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| (hash ^ *b as u32).wrapping_mul(FNV_PRIME))
}

/// Map a page URL onto one of `num_shards` shards.
pub fn shard_id(url: &str, num_shards: NonZeroU32) -> ShardId {
    fnv1a(url.as_bytes()) % num_shards.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shards(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0x811c_9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn deterministic_and_in_range() {
        for url in ["https://example.com", "http://a.b/c?d=e", ""] {
            for n in [1, 2, 10, 97] {
                let first = shard_id(url, shards(n));
                assert_eq!(first, shard_id(url, shards(n)));
                assert!(first < n);
            }
        }
    }

    #[test]
    fn shard_count_argument_is_honoured() {
        // The modulus must follow the argument, never the deployment default.
        let url = "https://example.com/some/page";
        let hash = fnv1a(url.as_bytes());
        assert_eq!(shard_id(url, shards(3)), hash % 3);
        assert_eq!(shard_id(url, shards(1000)), hash % 1000);
        assert_eq!(shard_id(url, DEFAULT_NUM_SHARDS), hash % 10);
    }
}
