use paged_kv::{
    BTree, BTreeConfig, Config, Location, PageId, PageManager, RecordHeap, Result, StorageError,
    Store, PAGE_SIZE,
};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn value_for(key: u32) -> Vec<u8> {
    format!("value-{}", key).into_bytes()
}

#[test]
fn test_values_survive_reopen() -> Result<()> {
    let dir = tempdir().unwrap();
    let base = dir.path().join("mydb");

    let mut keys: Vec<u32> = (0..500).map(|k| k * 3 + 1).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(7));

    {
        let store = Store::open(Config::new(&base))?;
        for &key in &keys {
            store.put(key, &value_for(key))?;
        }
        store.close()?;
    }

    let store = Store::open(Config::new(&base))?;
    store.verify()?;
    for &key in &keys {
        assert_eq!(store.get(key)?, Some(value_for(key)), "key {}", key);
    }
    assert_eq!(store.get(0)?, None);

    let stats = store.stats()?;
    assert_eq!(stats.key_count, keys.len());
    assert_eq!(stats.live_records, keys.len());
    assert!(stats.tree_height >= 2);

    // Writes after a reopen land after the existing records
    store.put(0, b"zero")?;
    assert_eq!(store.get(0)?, Some(b"zero".to_vec()));
    assert_eq!(store.get(keys[0])?, Some(value_for(keys[0])));

    Ok(())
}

#[test]
fn test_deletes_survive_reopen() -> Result<()> {
    let dir = tempdir().unwrap();
    let base = dir.path().join("mydb");

    {
        let store = Store::open(Config::new(&base))?;
        for key in 1..=50u32 {
            store.put(key, &value_for(key))?;
        }
        for key in (2..=50u32).step_by(2) {
            assert!(store.delete(key)?);
        }
        store.close()?;
    }

    let store = Store::open(Config::new(&base))?;
    for key in 1..=50u32 {
        let expected = if key % 2 == 1 { Some(value_for(key)) } else { None };
        assert_eq!(store.get(key)?, expected, "key {}", key);
    }

    let stats = store.stats()?;
    assert_eq!(stats.key_count, 25);
    assert_eq!(stats.live_records, 25);
    assert_eq!(stats.deleted_records, 25);

    // A deleted key can be stored again
    store.put(2, b"again")?;
    assert_eq!(store.get(2)?, Some(b"again".to_vec()));

    Ok(())
}

#[test]
fn test_first_split_layout() -> Result<()> {
    let dir = tempdir().unwrap();
    let store = Store::open(Config::new(dir.path().join("mydb")))?;

    for key in 1..=32u32 {
        store.put(key, &value_for(key))?;
    }

    let tree = store.export_tree()?;
    assert!(!tree.is_leaf);
    assert_eq!(tree.page_id, 2);
    assert_eq!(tree.keys, vec![16]);
    assert_eq!(tree.children.len(), 2);
    assert_eq!(tree.children[0].page_id, 0);
    assert_eq!(tree.children[0].keys, (1..=15).collect::<Vec<_>>());
    assert_eq!(tree.children[1].page_id, 1);
    assert_eq!(tree.children[1].keys, (16..=32).collect::<Vec<_>>());

    let mut out = Vec::new();
    store.print_tree(&mut out)?;
    let printed = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "B-Tree Structure:");
    assert!(lines[1].starts_with("Internal[2]: 16"));
    assert!(lines[2].starts_with("  Leaf[0]: 1"));
    assert!(lines[3].starts_with("  Leaf[1]: 16"));

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["pageId"], 2);
    assert_eq!(json["isLeaf"], false);

    Ok(())
}

#[test]
fn test_heap_record_layout() -> Result<()> {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mydb.dat");

    let mut heap = RecordHeap::create(PageManager::open(&path, 10, false)?);
    let first = heap.write(b"hello")?;
    assert_eq!(first, Location::new(PageId::new(0), 0));
    let second = heap.write(b"world!")?;
    assert_eq!(second, Location::new(PageId::new(0), 9));
    heap.delete(first)?;
    heap.close()?;

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(raw.len(), PAGE_SIZE);
    assert_eq!(&raw[0..4], &(5u32 | 0x8000_0000).to_be_bytes());
    assert_eq!(&raw[4..9], b"hello");
    assert_eq!(&raw[9..13], &6u32.to_be_bytes());
    assert_eq!(&raw[13..19], b"world!");
    assert!(raw[19..].iter().all(|&b| b == 0));

    Ok(())
}

#[test]
fn test_location_is_packed_page_and_offset() -> Result<()> {
    let dir = tempdir().unwrap();
    let base = dir.path().join("mydb");
    let config = Config::new(&base);

    {
        let store = Store::open(config.clone())?;
        store.put(1, &vec![b'a'; 3000])?;
        store.put(2, &vec![b'b'; 3000])?;
        store.close()?;
    }

    let mut index = BTree::open(
        PageManager::open(&config.index_path(), 10, false)?,
        BTreeConfig::default(),
    )?;
    assert_eq!(index.find(1)?, 0);
    // The second record does not fit behind the first and rolls over
    assert_eq!(index.find(2)?, 1u64 << 32);
    assert_eq!(Location::from_u64(index.find(2)?), Location::new(PageId::new(1), 0));

    Ok(())
}

#[test]
fn test_unclamped_tree_config_keeps_pages_readable() -> Result<()> {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path().join("mydb")).btree_config(BTreeConfig {
        max_leaf_cells: 40,
        max_internal_keys: 30,
    });

    {
        let store = Store::open(config.clone())?;
        for key in 1..=40u32 {
            store.put(key, &value_for(key))?;
        }
        store.close()?;
    }

    let store = Store::open(config)?;
    store.verify()?;
    assert_eq!(store.stats()?.tree_height, 2);
    for key in 1..=40u32 {
        assert_eq!(store.get(key)?, Some(value_for(key)));
    }

    Ok(())
}

#[test]
fn test_cache_exhaustion_is_recoverable() -> Result<()> {
    let dir = tempdir().unwrap();
    let store = Store::open(Config::new(dir.path().join("mydb")).cache_pages(2))?;

    for key in 1..=31u32 {
        store.put(key, &value_for(key))?;
    }

    // Splitting the full root leaf needs two more index pages
    assert!(matches!(
        store.put(32, &value_for(32)),
        Err(StorageError::PageCacheExhausted { capacity: 2 })
    ));

    assert_eq!(store.get(32)?, None);
    for key in 1..=31u32 {
        assert_eq!(store.get(key)?, Some(value_for(key)));
    }
    store.verify()?;

    // The heap record written before the index failed stays behind, unreachable
    let stats = store.stats()?;
    assert_eq!(stats.key_count, 31);
    assert_eq!(stats.live_records, 32);

    Ok(())
}

#[test]
fn test_oversized_and_empty_values() -> Result<()> {
    let dir = tempdir().unwrap();
    let store = Store::open(Config::new(dir.path().join("mydb")))?;

    assert!(matches!(
        store.put(1, &vec![0u8; PAGE_SIZE]),
        Err(StorageError::RecordTooLarge { .. })
    ));
    assert!(matches!(
        store.put(1, b""),
        Err(StorageError::InvalidOperation(_))
    ));
    assert!(!store.contains(1)?);

    store.put(1, &vec![7u8; PAGE_SIZE - 4])?;
    assert_eq!(store.get(1)?.map(|v| v.len()), Some(PAGE_SIZE - 4));

    Ok(())
}

#[test]
fn test_misaligned_file_is_corrupt() -> Result<()> {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path().join("mydb"));
    std::fs::write(config.index_path(), vec![0u8; 100]).unwrap();

    assert!(matches!(
        Store::open(config),
        Err(StorageError::CorruptFile(_))
    ));

    Ok(())
}

#[test]
fn test_zeroed_index_page_is_rejected() -> Result<()> {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path().join("mydb"));
    std::fs::write(config.index_path(), vec![0u8; PAGE_SIZE]).unwrap();

    assert!(matches!(
        Store::open(config),
        Err(StorageError::InvalidPage(_))
    ));

    Ok(())
}

#[test]
fn test_concurrent_writers_are_serialized() -> Result<()> {
    let dir = tempdir().unwrap();
    let store = Arc::new(Store::open(Config::new(dir.path().join("mydb")).cache_pages(200))?);

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || -> Result<()> {
                for i in 0..100u32 {
                    let key = i * 4 + t;
                    store.put(key, &value_for(key))?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap()?;
    }

    store.verify()?;
    let all = store.iter()?;
    assert_eq!(all.len(), 400);
    for (i, (key, value)) in all.into_iter().enumerate() {
        assert_eq!(key, i as u32);
        assert_eq!(value, value_for(key));
    }

    Ok(())
}
