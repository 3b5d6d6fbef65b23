pub use std::collections::BTreeSet;
pub use std::collections::btree_set;

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;

pub mod hash_map {
    pub use std::collections::hash_map::Entry;
}
