//! Property-based test generators using proptest.

use caskdb_codec::Entry;
use proptest::prelude::*;

/// Strategy for keys within the default key size limit.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=64)
}

/// Strategy for values well within the default value size limit.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for entries, some with an expiry.
pub fn entry_strategy() -> impl Strategy<Value = Entry> {
    (
        key_strategy(),
        value_strategy(),
        prop::option::of(1u64..=u64::from(u32::MAX)),
    )
        .prop_map(|(key, value, expiry)| match expiry {
            Some(expiry) => Entry::with_expiry(key, value, expiry),
            None => Entry::new(key, value),
        })
}

/// Strategy for a non-empty list of entries.
pub fn entries_strategy(max: usize) -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec(entry_strategy(), 1..=max.max(1))
}
