//! The collection-value tree: one key maps to an ordered collection of
//! fixed-width items, stored out-of-line as an items-chain.

use std::fs::File;

use log::info;

use crate::config::{Config, Kind, META_SIZE};
use crate::error::{TreeError, TreeResult};
use crate::key::Key;
use crate::storage::items::{self, ItemsCursor};
use crate::storage::node::{LeafRecords, MultiRecord};
use crate::storage::page::NONE_PAGE;
use crate::storage::pager::Pager;
use crate::tree::{descend, load_leaf, split_leaf, write_leaf, Meta};

pub struct MultiTree {
    pager: Pager,
    cfg: Config,
    meta: Meta,
}

impl MultiTree {
    pub fn open(file: File, cfg: Config) -> TreeResult<Self> {
        cfg.validate()?;
        if cfg.kind != Kind::Multi {
            return Err(TreeError::ConfigurationError);
        }
        let mut pager = Pager::open(file, cfg.resolved_page_size(), META_SIZE)?;

        let meta = if pager.page_count() == 0 {
            let start = crate::storage::node::Node::Start(crate::storage::node::LeafNode {
                next: -1,
                records: LeafRecords::Multi(Vec::new()),
            });
            let encoded = crate::storage::node::encode(&start, &cfg)?;
            let root = pager.append(&encoded)?;
            let meta = Meta {
                kind: Kind::Multi,
                root,
                free_head: -1,
                order: cfg.order,
                ref_order: cfg.ref_order,
                value_size: cfg.value_size,
                item_size: cfg.item_size,
                item_order: cfg.item_order,
            };
            pager.write_meta(&meta.encode(META_SIZE))?;
            info!("multi: initialized fresh tree at root page {root}");
            meta
        } else {
            let raw = pager.read_meta()?;
            let meta = Meta::decode(&raw)?;
            if meta.kind != Kind::Multi
                || meta.order != cfg.order
                || meta.ref_order != cfg.ref_order
                || meta.value_size != cfg.value_size
                || meta.item_size != cfg.item_size
                || meta.item_order != cfg.item_order
            {
                return Err(TreeError::ConfigurationError);
            }
            meta
        };

        Ok(MultiTree { pager, cfg, meta })
    }

    fn save_meta(&mut self) -> TreeResult<()> {
        self.pager.write_meta(&self.meta.encode(META_SIZE))
    }

    pub fn flush(&mut self) -> TreeResult<()> {
        self.save_meta()?;
        self.pager.flush()
    }

    pub fn insert(&mut self, key: Key, items: Vec<Vec<u8>>) -> TreeResult<()> {
        for item in &items {
            if item.len() != self.cfg.item_size as usize {
                return Err(TreeError::ItemWrongSize { expected: self.cfg.item_size as usize, actual: item.len() });
            }
        }
        let (leaf_page, parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (mut leaf, is_start) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        if leaf.records.contains_key(key) {
            return Err(TreeError::RecordExists);
        }

        let mut free_head = self.meta.free_head;
        let head = items::create_chain(&mut self.pager, &self.cfg, &items, &mut free_head)?;
        self.meta.free_head = free_head;

        leaf.records.insert_multi(MultiRecord { page: head, key, count: items.len() as u32 });

        if leaf.records.len() as u32 <= self.cfg.order {
            write_leaf(&mut self.pager, &self.cfg, leaf_page, leaf, is_start)?;
        } else {
            split_leaf(&mut self.pager, &self.cfg, &mut self.meta, leaf_page, leaf, is_start, parents)?;
        }
        self.save_meta()
    }

    /// Filter `deletions` out of the existing collection (by byte-equality)
    /// and append `insertions`, in that order.
    pub fn update(&mut self, key: Key, insertions: Vec<Vec<u8>>, deletions: Vec<Vec<u8>>) -> TreeResult<()> {
        for item in &insertions {
            if item.len() != self.cfg.item_size as usize {
                return Err(TreeError::ItemWrongSize { expected: self.cfg.item_size as usize, actual: item.len() });
            }
        }
        let (leaf_page, _parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (mut leaf, is_start) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        let (head, count) = {
            let record = leaf.records.get_multi(key).ok_or(TreeError::EntryNotFound)?;
            (record.page, record.count)
        };

        let mut free_head = self.meta.free_head;
        let (new_head, new_count) =
            items::update_chain(&mut self.pager, &self.cfg, head, count, &insertions, &deletions, &mut free_head)?;
        self.meta.free_head = free_head;

        let record = leaf.records.get_multi_mut(key).expect("checked present above");
        record.page = new_head;
        record.count = new_count;

        write_leaf(&mut self.pager, &self.cfg, leaf_page, leaf, is_start)?;
        self.save_meta()
    }

    pub fn get(&mut self, key: Key) -> TreeResult<Vec<Vec<u8>>> {
        let (leaf_page, _parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (leaf, _) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        let record = leaf.records.get_multi(key).ok_or(TreeError::EntryNotFound)?;
        items::read_all(&mut self.pager, &self.cfg, record.page, record.count)
    }

    /// Returns the collection's length and a lazy cursor over its items,
    /// without materializing the whole chain up front.
    pub fn traverse(&mut self, key: Key) -> TreeResult<(u32, ItemsCursor<'_>)> {
        let (leaf_page, _parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (leaf, _) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        let record = leaf.records.get_multi(key).ok_or(TreeError::EntryNotFound)?;
        let (head, count) = (record.page, record.count);
        Ok((count, ItemsCursor::new(&mut self.pager, self.cfg, head, count)))
    }

    /// Recycle the collection's chain but keep the key, left pointing at an
    /// empty collection.
    pub fn clear(&mut self, key: Key) -> TreeResult<()> {
        let (leaf_page, _parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (mut leaf, is_start) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        let (head, _count) = {
            let record = leaf.records.get_multi(key).ok_or(TreeError::EntryNotFound)?;
            (record.page, record.count)
        };

        let mut free_head = self.meta.free_head;
        items::recycle_chain(&mut self.pager, &self.cfg, head, &mut free_head)?;
        self.meta.free_head = free_head;

        let record = leaf.records.get_multi_mut(key).expect("checked present above");
        record.page = NONE_PAGE;
        record.count = 0;

        write_leaf(&mut self.pager, &self.cfg, leaf_page, leaf, is_start)?;
        self.save_meta()
    }

    /// Remove the key and recycle its collection's chain entirely.
    pub fn delete(&mut self, key: Key) -> TreeResult<()> {
        let (leaf_page, _parents) = descend(&mut self.pager, &self.cfg, self.meta.root, key)?;
        let (mut leaf, is_start) = load_leaf(&mut self.pager, &self.cfg, leaf_page)?;
        let head = leaf.records.get_multi(key).ok_or(TreeError::EntryNotFound)?.page;

        let mut free_head = self.meta.free_head;
        items::recycle_chain(&mut self.pager, &self.cfg, head, &mut free_head)?;
        self.meta.free_head = free_head;

        leaf.records.remove_key(key);
        write_leaf(&mut self.pager, &self.cfg, leaf_page, leaf, is_start)?;
        self.save_meta()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    fn cfg() -> Config {
        Config { kind: Kind::Multi, order: 4, ref_order: 4, value_size: 4, item_size: 4, item_order: 4, page_size: None }
    }

    fn open_tree(cfg: Config) -> (MultiTree, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        let tree = MultiTree::open(file, cfg).unwrap();
        (tree, tmp)
    }

    fn key_from_u128(n: u128) -> Key {
        Key::from_uuid(Uuid::from_u128(n))
    }

    fn items(n: u32) -> Vec<Vec<u8>> {
        (0..n).map(|i| i.to_be_bytes().to_vec()).collect()
    }

    #[test]
    fn insert_then_get_round_trips_across_chain_pages() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, items(6)).unwrap();
        assert_eq!(tree.get(key).unwrap(), items(6));
    }

    #[test]
    fn update_filters_and_appends() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, (1..=5u32).map(|i| i.to_be_bytes().to_vec()).collect()).unwrap();
        tree.update(key, vec![6u32.to_be_bytes().to_vec()], vec![3u32.to_be_bytes().to_vec()]).unwrap();
        let result = tree.get(key).unwrap();
        let expected: Vec<Vec<u8>> = [1u32, 2, 4, 5, 6].iter().map(|i| i.to_be_bytes().to_vec()).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn clear_keeps_key_with_empty_collection() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, items(3)).unwrap();
        tree.clear(key).unwrap();
        assert_eq!(tree.get(key).unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn delete_removes_key() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, items(3)).unwrap();
        tree.delete(key).unwrap();
        assert!(matches!(tree.get(key).unwrap_err(), TreeError::EntryNotFound));
    }

    #[test]
    fn traverse_yields_same_items_as_get() {
        let (mut tree, _tmp) = open_tree(cfg());
        let key = key_from_u128(1);
        tree.insert(key, items(7)).unwrap();
        let (len, cursor) = tree.traverse(key).unwrap();
        assert_eq!(len, 7);
        let collected: Vec<Vec<u8>> = cursor.map(|r| r.unwrap()).collect();
        assert_eq!(collected, items(7));
    }
}
