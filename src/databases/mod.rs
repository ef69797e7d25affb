pub mod memory_store;

#[cfg(feature = "sled")]
pub mod sled_store;

#[cfg(feature = "redb")]
pub mod redb_store;
