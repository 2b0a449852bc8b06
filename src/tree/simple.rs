//! The single-value tree: one key maps to one fixed-width value stored
//! inline in the leaf record.

use std::fs::File;

use log::info;

use crate::config::{Config, Kind, META_SIZE};
use crate::error::{TreeError, TreeResult};
use crate::key::Key;
use crate::storage::node::{LeafRecords, SimpleRecord};
use crate::storage::pager::Pager;
use crate::tree::{descend, leftmost_leaf, load_leaf, split_leaf, write_leaf, Meta};

pub struct SimpleTree {
    pager: Pager,
    cfg: Config,
    meta: Meta,
}

impl SimpleTree {
    /// Open (or initialize) a simple tree backed by `file`. If the file is
    /// fresh, writes the Start page and meta block; otherwise validates that
    /// the stored meta agrees with `cfg`.
    pub fn open(file: File, cfg: Config) -> TreeResult<Self> {
        cfg.validate()?;
        if cfg.kind != Kind::Simple {
            return Err(TreeError::ConfigurationError);
        }
        let mut pager = Pager::open(file, cfg.resolved_page_size(), META_SIZE)?;

        let meta = if pager.page_count() == 0 {
            let start = crate::storage::node::Node::Start(crate::storage::node::LeafNode {
                next: -1,
                records: LeafRecords::Simple(Vec::new()),
            });
            let encoded = crate::storage::node::encode(&start, &cfg)?;
            let root = pager.append(&encoded)?;
            let meta = Meta {
                kind: Kind::Simple,
                root,
                free_head: -1,
                order: cfg.order,
                ref_order: cfg.ref_order,
                value_size: cfg.value_size,
                item_size: cfg.item_size,
                item_order: cfg.item_order,
            };
            pager.write_meta(&meta.encode(META_SIZE))?;
            info!("simple: initialized fresh tree at root page {root}");
            meta
        } else {
            let raw = pager.read_meta()?;
            let meta = Meta::decode(&raw)?;
            if meta.kind != Kind::Simple || meta.order != cfg.order || meta.ref_order != cfg.ref_order
                || meta.value_size != cfg.value_size
            {
                return Err(TreeError::ConfigurationError);
            }
            meta
        };

        Ok(SimpleTree { pager, cfg, meta })
    }

    fn save_meta(&mut self) -> TreeResult<()> {
        self.pager.write_meta(&self.meta.encode(META_SIZE))
    }

    pub fn flush(&mut self) -> TreeResult<()> {
        self.save_meta()?;
        self.pager.flush()
    }

    pub fn insert(&mut self, key: Key, value: Vec<u8>) -> TreeResult<()> {
        if value.len() > self.cfg.value_size as usize {
            return Err(TreeError::ValueSizeError { expected: self.cfg.value_size as usize, actual: value.len() });
        }
        let (leaf_page, parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (mut leaf, is_start) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        if leaf.records.contains_key(key) {
            return Err(TreeError::RecordExists);
        }
        leaf.records.insert_simple(SimpleRecord { page: -1, key, value });

        if leaf.records.len() as u32 <= self.cfg.order {
            write_leaf(&mut self.pager, &self.cfg, leaf_page, leaf, is_start)?;
        } else {
            split_leaf(&mut self.pager, &self.cfg, &mut self.meta, leaf_page, leaf, is_start, parents)?;
        }
        self.save_meta()
    }

    pub fn update(&mut self, key: Key, value: Vec<u8>) -> TreeResult<()> {
        if value.len() > self.cfg.value_size as usize {
            return Err(TreeError::ValueSizeError { expected: self.cfg.value_size as usize, actual: value.len() });
        }
        let (leaf_page, _parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (mut leaf, is_start) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        let record = match &mut leaf.records {
            LeafRecords::Simple(rows) => rows.iter_mut().find(|r| r.key == key),
            LeafRecords::Multi(_) => unreachable!("simple tree never holds multi records"),
        };
        match record {
            Some(r) => r.value = value,
            None => return Err(TreeError::EntryNotFound),
        }
        write_leaf(&mut self.pager, &self.cfg, leaf_page, leaf, is_start)
    }

    pub fn get(&mut self, key: Key) -> TreeResult<Vec<u8>> {
        let (leaf_page, _parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (leaf, _) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        leaf.records.get_simple(key).map(|r| r.value.clone()).ok_or(TreeError::EntryNotFound)
    }

    pub fn delete(&mut self, key: Key) -> TreeResult<()> {
        let (leaf_page, _parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (mut leaf, is_start) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        if !leaf.records.remove_key(key) {
            return Err(TreeError::EntryNotFound);
        }
        write_leaf(&mut self.pager, &self.cfg, leaf_page, leaf, is_start)
    }

    /// Ascending `(key, value)` pairs with `start <= key < stop`. A missing
    /// bound on either side is unbounded in that direction.
    pub fn range(&mut self, start: Option<Key>, stop: Option<Key>) -> TreeResult<SimpleRangeIter<'_>> {
        if let (Some(s), Some(e)) = (start, stop) {
            if s > e {
                return Err(TreeError::IterBackwardError);
            }
        }
        let leaf_page = match start {
            Some(key) => descend(&mut self.pager, &self.cfg, self.meta.root, key)?.0,
            None => leftmost_leaf(&mut self.pager, &self.cfg, self.meta.root)?,
        };
        Ok(SimpleRangeIter {
            pager: &mut self.pager,
            cfg: self.cfg,
            next_page: leaf_page,
            buffer: Vec::new().into_iter(),
            start,
            stop,
            started: false,
        })
    }
}

/// Lazily walks leaf pages via their `next` links, yielding entries within
/// `[start, stop)`.
pub struct SimpleRangeIter<'a> {
    pager: &'a mut Pager,
    cfg: Config,
    next_page: i32,
    buffer: std::vec::IntoIter<SimpleRecord>,
    start: Option<Key>,
    stop: Option<Key>,
    started: bool,
}

impl<'a> Iterator for SimpleRangeIter<'a> {
    type Item = TreeResult<(Key, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                if let Some(stop) = self.stop {
                    if record.key >= stop {
                        self.next_page = -1;
                        self.buffer = Vec::new().into_iter();
                        return None;
                    }
                }
                if let Some(start) = self.start {
                    if record.key < start {
                        continue;
                    }
                }
                return Some(Ok((record.key, record.value)));
            }
            if self.next_page == -1 && self.started {
                return None;
            }
            let raw = match self.pager.read(self.next_page) {
                Ok(raw) => raw,
                Err(e) => return Some(Err(e)),
            };
            self.started = true;
            let node = match crate::storage::node::decode(&raw, &self.cfg, None) {
                Ok(n) => n,
                Err(e) => return Some(Err(e)),
            };
            let leaf = match node.as_leaf() {
                Some(leaf) => leaf.clone(),
                None => return Some(Err(TreeError::WrongNodeKind { expected: Some("Start or Leaf"), found: node.kind().tag() })),
            };
            self.next_page = leaf.next;
            self.buffer = match leaf.records {
                LeafRecords::Simple(rows) => rows.into_iter(),
                LeafRecords::Multi(_) => unreachable!("simple tree never holds multi records"),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    fn cfg() -> Config {
        Config { kind: Kind::Simple, order: 4, ref_order: 4, value_size: 8, item_size: 4, item_order: 4, page_size: None }
    }

    fn open_tree(cfg: Config) -> (SimpleTree, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        let tree = SimpleTree::open(file, cfg).unwrap();
        (tree, tmp)
    }

    fn key_from_u128(n: u128) -> Key {
        Key::from_uuid(Uuid::from_u128(n))
    }

    #[test]
    fn insert_then_get_round_trips() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, vec![0, 0, 0, 1, 0, 0, 0, 0]).unwrap();
        assert_eq!(tree.get(key).unwrap(), vec![0, 0, 0, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn duplicate_insert_rejected() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, vec![0; 8]).unwrap();
        let err = tree.insert(key, vec![1; 8]).unwrap_err();
        assert!(matches!(err, TreeError::RecordExists));
    }

    #[test]
    fn insert_beyond_order_triggers_split() {
        let (mut tree, _tmp) = open_tree(cfg());
        for i in 0..6u128 {
            tree.insert(key_from_u128(i), i.to_be_bytes()[8..].to_vec()).unwrap();
        }
        for i in 0..6u128 {
            assert_eq!(tree.get(key_from_u128(i)).unwrap(), i.to_be_bytes()[8..].to_vec());
        }
    }

    #[test]
    fn delete_then_get_not_found() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, vec![0; 8]).unwrap();
        tree.delete(key).unwrap();
        assert!(matches!(tree.get(key).unwrap_err(), TreeError::EntryNotFound));
    }

    #[test]
    fn range_yields_ascending_keys_in_bounds() {
        let (mut tree, _tmp) = open_tree(cfg());
        for i in 0..10u128 {
            tree.insert(key_from_u128(i), vec![0; 8]).unwrap();
        }
        let start = key_from_u128(2);
        let stop = key_from_u128(7);
        let keys: Vec<Key> = tree.range(Some(start), Some(stop)).unwrap().map(|r| r.unwrap().0).collect();
        let expected: Vec<Key> = (2..7u128).map(key_from_u128).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn update_replaces_existing_value() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, vec![0; 8]).unwrap();
        tree.update(key, vec![9; 8]).unwrap();
        assert_eq!(tree.get(key).unwrap(), vec![9; 8]);
    }
}
