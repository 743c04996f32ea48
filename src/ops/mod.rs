//! Contracts for the pluggable bulk operators: external sort, hash
//! partitioning and inner join.
//!
//! The engine only defines and calls these interfaces. Implementations are
//! injected through the factory fields of [`Operations`]; the defaults
//! panic when invoked.

use crate::access::{AccessMethodManager, AccessResult};
use crate::cache::BufferCache;
use crate::record::Value;

/// Extracts a sort, grouping or join key from raw record bytes. [`Value`]
/// carries a total order and a consistent hash, so one key type serves all
/// three operators.
pub type KeyFn<'a> = &'a dyn Fn(&[u8]) -> Value;

/// Sorts a table by a key extracted from its records. The output is a new
/// table owned by the caller.
pub trait MultiwayMergeSort {
    fn sort(&mut self, table_name: &str, key: KeyFn) -> AccessResult<String>;
}

/// Metadata of one hash bucket: its 0-based number, the temporary table
/// holding its records and that table's page count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub num: u32,
    pub table_name: String,
    pub page_count: usize,
}

/// Partitions a table into `bucket_count` buckets by record key.
pub trait Hashtable {
    /// Returns the created buckets in ascending bucket number order.
    fn hash(&mut self, table_name: &str, bucket_count: u32, key: KeyFn)
    -> AccessResult<Vec<Bucket>>;
}

/// One side of a join: a table plus its key extractor.
pub struct JoinOperand<'a> {
    pub table_name: &'a str,
    pub key: KeyFn<'a>,
}

/// Lazy sequence of matched raw record pairs, left side first.
pub type JoinOutput = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinAlgorithm {
    NestedLoops,
    Hash,
    Merge,
}

pub trait InnerJoin {
    fn join(&mut self, left: JoinOperand, right: JoinOperand) -> AccessResult<JoinOutput>;
}

pub type SortFactory = Box<dyn Fn(AccessMethodManager, BufferCache) -> Box<dyn MultiwayMergeSort>>;
pub type HashFactory = Box<dyn Fn(AccessMethodManager, BufferCache) -> Box<dyn Hashtable>>;
pub type JoinFactory =
    Box<dyn Fn(AccessMethodManager, BufferCache, JoinAlgorithm) -> Box<dyn InnerJoin>>;

/// Registry of operator factories. Replace a field to plug in a real
/// implementation.
pub struct Operations {
    pub sort_factory: SortFactory,
    pub hash_factory: HashFactory,
    pub join_factory: JoinFactory,
}

impl Default for Operations {
    fn default() -> Self {
        Self {
            sort_factory: Box::new(|_, _| Box::new(UnimplementedSort)),
            hash_factory: Box::new(|_, _| Box::new(UnimplementedHashtable)),
            join_factory: Box::new(|_, _, _| Box::new(UnimplementedJoin)),
        }
    }
}

struct UnimplementedSort;

impl MultiwayMergeSort for UnimplementedSort {
    fn sort(&mut self, _table_name: &str, _key: KeyFn) -> AccessResult<String> {
        unimplemented!("no sort implementation is plugged in")
    }
}

struct UnimplementedHashtable;

impl Hashtable for UnimplementedHashtable {
    fn hash(
        &mut self,
        _table_name: &str,
        _bucket_count: u32,
        _key: KeyFn,
    ) -> AccessResult<Vec<Bucket>> {
        unimplemented!("no hash implementation is plugged in")
    }
}

struct UnimplementedJoin;

impl InnerJoin for UnimplementedJoin {
    fn join(&mut self, _left: JoinOperand, _right: JoinOperand) -> AccessResult<JoinOutput> {
        unimplemented!("no join implementation is plugged in")
    }
}

#[cfg(test)]
mod tests {
    use std::hash::BuildHasher;

    use super::*;
    use crate::cache::PageCache;
    use crate::record::{DataType, Record};
    use crate::storage::DiskEmulator;

    fn engine() -> (AccessMethodManager, BufferCache) {
        let cache = BufferCache::new(DiskEmulator::new_shared(), None);
        (AccessMethodManager::new(cache.clone()), cache)
    }

    fn int_record(value: i32) -> Vec<u8> {
        Record::new(vec![Value::Int(value)]).unwrap().to_bytes()
    }

    fn int_key(bytes: &[u8]) -> Value {
        Record::from_bytes(&[DataType::Int], bytes).unwrap().values()[0].clone()
    }

    fn fill_table(catalog: &AccessMethodManager, cache: &BufferCache, name: &str, values: &[i32]) {
        let oid = catalog.create_table(name).unwrap();
        let page_id = catalog.add_page(oid).unwrap();
        let page = cache.get(page_id);
        for value in values {
            page.put_record(&int_record(*value), None).unwrap();
        }
    }

    /// Materializing single-page sort, enough to exercise the contract.
    struct CopyingSort {
        catalog: AccessMethodManager,
        cache: BufferCache,
    }

    impl MultiwayMergeSort for CopyingSort {
        fn sort(&mut self, table_name: &str, key: KeyFn) -> AccessResult<String> {
            let scan = self
                .catalog
                .create_full_scan(table_name, |bytes: &[u8]| bytes.to_vec())?;
            let mut rows: Vec<Vec<u8>> = scan.iter().collect();
            rows.sort_by_key(|bytes| key(bytes));
            let out_name = format!("{table_name}-sorted");
            let oid = self.catalog.create_table(&out_name)?;
            let page = self.cache.get_and_pin(self.catalog.add_page(oid)?);
            for row in &rows {
                page.put_record(row, None)?;
            }
            Ok(out_name)
        }
    }

    struct NestedLoopsJoin {
        catalog: AccessMethodManager,
    }

    impl InnerJoin for NestedLoopsJoin {
        fn join(&mut self, left: JoinOperand, right: JoinOperand) -> AccessResult<JoinOutput> {
            let left_rows: Vec<Vec<u8>> = self
                .catalog
                .create_full_scan(left.table_name, |bytes: &[u8]| bytes.to_vec())?
                .iter()
                .collect();
            let right_rows: Vec<Vec<u8>> = self
                .catalog
                .create_full_scan(right.table_name, |bytes: &[u8]| bytes.to_vec())?
                .iter()
                .collect();
            let mut matched = Vec::new();
            for left_row in &left_rows {
                let left_key = (left.key)(left_row);
                for right_row in &right_rows {
                    if left_key == (right.key)(right_row) {
                        matched.push((left_row.clone(), right_row.clone()));
                    }
                }
            }
            Ok(Box::new(matched.into_iter()))
        }
    }

    struct PartitioningHashtable {
        catalog: AccessMethodManager,
        cache: BufferCache,
    }

    impl Hashtable for PartitioningHashtable {
        fn hash(
            &mut self,
            table_name: &str,
            bucket_count: u32,
            key: KeyFn,
        ) -> AccessResult<Vec<Bucket>> {
            let hasher = ahash::RandomState::with_seeds(1, 2, 3, 4);
            let mut partitions: Vec<Vec<Vec<u8>>> = vec![Vec::new(); bucket_count as usize];
            let scan = self
                .catalog
                .create_full_scan(table_name, |bytes: &[u8]| bytes.to_vec())?;
            for row in scan.iter() {
                let slot = hasher.hash_one(&key(&row)) % u64::from(bucket_count);
                partitions[slot as usize].push(row);
            }
            let mut buckets = Vec::new();
            for (num, rows) in partitions.into_iter().enumerate() {
                let bucket_table = format!("{table_name}-bucket-{num}");
                let oid = self.catalog.create_table(&bucket_table)?;
                let page = self.cache.get_and_pin(self.catalog.add_page(oid)?);
                for row in &rows {
                    page.put_record(row, None)?;
                }
                let page_count = self.catalog.page_count(&bucket_table)?;
                buckets.push(Bucket {
                    num: num as u32,
                    table_name: bucket_table,
                    page_count,
                });
            }
            Ok(buckets)
        }
    }

    #[test]
    fn test_sort_factory_is_replaceable() {
        let (catalog, cache) = engine();
        fill_table(&catalog, &cache, "numbers", &[3, 1, 2]);
        let operations = Operations {
            sort_factory: Box::new(|catalog, cache| Box::new(CopyingSort { catalog, cache })),
            ..Operations::default()
        };

        let mut sort = (operations.sort_factory)(catalog.clone(), cache);
        let sorted_name = sort.sort("numbers", &int_key).unwrap();
        let scan = catalog
            .create_full_scan(&sorted_name, |bytes: &[u8]| int_key(bytes))
            .unwrap();
        assert_eq!(
            scan.iter().collect::<Vec<_>>(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn test_join_factory_matches_keys() {
        let (catalog, cache) = engine();
        fill_table(&catalog, &cache, "left", &[1, 2, 3]);
        fill_table(&catalog, &cache, "right", &[2, 3, 4]);
        let operations = Operations {
            join_factory: Box::new(|catalog, _, _| Box::new(NestedLoopsJoin { catalog })),
            ..Operations::default()
        };

        let mut join = (operations.join_factory)(catalog, cache, JoinAlgorithm::NestedLoops);
        let matched: Vec<(Value, Value)> = join
            .join(
                JoinOperand {
                    table_name: "left",
                    key: &int_key,
                },
                JoinOperand {
                    table_name: "right",
                    key: &int_key,
                },
            )
            .unwrap()
            .map(|(left, right)| (int_key(&left), int_key(&right)))
            .collect();
        assert_eq!(
            matched,
            vec![
                (Value::Int(2), Value::Int(2)),
                (Value::Int(3), Value::Int(3)),
            ]
        );
    }

    #[test]
    fn test_hash_factory_partitions_all_records() {
        let (catalog, cache) = engine();
        fill_table(&catalog, &cache, "numbers", &[1, 2, 3, 4, 5, 6, 7, 8]);
        let operations = Operations {
            hash_factory: Box::new(|catalog, cache| {
                Box::new(PartitioningHashtable { catalog, cache })
            }),
            ..Operations::default()
        };

        let mut hashtable = (operations.hash_factory)(catalog.clone(), cache);
        let buckets = hashtable.hash("numbers", 3, &int_key).unwrap();
        assert_eq!(buckets.len(), 3);
        let mut all_values = Vec::new();
        for (num, bucket) in buckets.iter().enumerate() {
            assert_eq!(bucket.num, num as u32);
            assert_eq!(bucket.page_count, 1);
            let scan = catalog
                .create_full_scan(&bucket.table_name, |bytes: &[u8]| int_key(bytes))
                .unwrap();
            all_values.extend(scan.iter());
        }
        all_values.sort();
        assert_eq!(all_values, (1..=8).map(Value::Int).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic(expected = "no sort implementation")]
    fn test_default_sort_is_unimplemented() {
        let (catalog, cache) = engine();
        let operations = Operations::default();
        (operations.sort_factory)(catalog, cache)
            .sort("numbers", &int_key)
            .unwrap();
    }
}
