//! A minimal single-threaded relational storage engine: slotted disk
//! pages over emulated block storage, a pinning buffer cache with
//! pluggable eviction, and a catalog layer for table creation and full
//! scans.

pub mod access;
pub mod cache;
pub mod ops;
pub mod record;
pub mod storage;
