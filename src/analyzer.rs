//! Two read-side passes over a tree file that don't go through the normal
//! descent API: a `stats` pass that classifies every page by kind, and a
//! `rescue` pass that walks the physical page order and reinserts every
//! record into a fresh file, skipping anything the fresh tree rejects as a
//! duplicate.

use log::warn;

use crate::config::Config;
use crate::error::TreeResult;
use crate::storage::items;
use crate::storage::node::{decode, LeafRecords, Node};
use crate::storage::pager::Pager;
use crate::tree::multi::MultiTree;
use crate::tree::simple::SimpleTree;
use crate::tree::Meta;

/// Page-kind tally plus record/reference counts for a tree file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub page_count: u32,
    pub start_pages: u32,
    pub leaf_pages: u32,
    pub structure_pages: u32,
    pub root_pages: u32,
    pub data_pages: u32,
    pub items_pages: u32,
    pub empty_pages: u32,
    pub record_count: u64,
    pub reference_count: u64,
    pub root_page: i32,
    pub free_head: i32,
}

/// Walk every page and classify it, without trusting the descent structure
/// to be intact — this is meant to work even on a file `rescue` would need
/// to repair.
pub fn stats(pager: &mut Pager, cfg: &Config, meta: &Meta) -> TreeResult<Stats> {
    let mut out = Stats { root_page: meta.root, free_head: meta.free_head, ..Default::default() };
    out.page_count = pager.page_count();

    for entry in pager.iter() {
        let (_index, raw) = entry?;
        let node = decode(&raw, cfg, None)?;
        match node {
            Node::Start(leaf) => {
                out.start_pages += 1;
                out.record_count += leaf.records.len() as u64;
            }
            Node::Leaf(leaf) => {
                out.leaf_pages += 1;
                out.record_count += leaf.records.len() as u64;
            }
            Node::Structure(refs) => {
                out.structure_pages += 1;
                out.reference_count += refs.refs.len() as u64;
            }
            Node::Root(refs) => {
                out.root_pages += 1;
                out.reference_count += refs.refs.len() as u64;
            }
            Node::Data(_) => out.data_pages += 1,
            Node::Items(_) => out.items_pages += 1,
            Node::Empty(_) => out.empty_pages += 1,
        }
    }
    Ok(out)
}

/// How many records a rescue pass found, successfully reinserted, and
/// skipped as duplicates.
#[derive(Debug, Default, Clone, Copy)]
pub struct RescueReport {
    pub records_seen: u64,
    pub records_inserted: u64,
    pub duplicates_skipped: u64,
}

impl RescueReport {
    fn record(&mut self, result: TreeResult<()>) -> TreeResult<()> {
        self.records_seen += 1;
        match result {
            Ok(()) => {
                self.records_inserted += 1;
                Ok(())
            }
            Err(crate::error::TreeError::RecordExists) => {
                self.duplicates_skipped += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Reinsert every simple-tree record found in `src`'s physical page order
/// into `dst`. Corrupt pages abort the whole rescue; duplicate keys are
/// logged and skipped rather than treated as failure, since a rescue's whole
/// point is to recover as much as survives.
pub fn rescue_simple(src: &mut Pager, src_cfg: &Config, dst: &mut SimpleTree) -> TreeResult<RescueReport> {
    let mut report = RescueReport::default();
    for entry in src.iter() {
        let (index, raw) = entry?;
        let node = decode(&raw, src_cfg, None)?;
        let leaf = match node {
            Node::Start(leaf) | Node::Leaf(leaf) => leaf,
            _ => continue,
        };
        let rows = match leaf.records {
            LeafRecords::Simple(rows) => rows,
            LeafRecords::Multi(_) => continue,
        };
        for row in rows {
            let result = dst.insert(row.key, row.value.clone());
            if let Err(crate::error::TreeError::RecordExists) = &result {
                warn!("rescue: duplicate key {} on page {index}, skipping", row.key);
            }
            report.record(result)?;
        }
    }
    Ok(report)
}

/// As [`rescue_simple`], but for a multi tree: each surviving record's full
/// item chain is re-read from `src` and reinserted as a fresh chain in `dst`.
pub fn rescue_multi(src: &mut Pager, src_cfg: &Config, dst: &mut MultiTree) -> TreeResult<RescueReport> {
    let mut report = RescueReport::default();
    for entry in src.iter() {
        let (index, raw) = entry?;
        let node = decode(&raw, src_cfg, None)?;
        let leaf = match node {
            Node::Start(leaf) | Node::Leaf(leaf) => leaf,
            _ => continue,
        };
        let rows = match leaf.records {
            LeafRecords::Multi(rows) => rows,
            LeafRecords::Simple(_) => continue,
        };
        for row in rows {
            let chain_result = items::read_all(src, src_cfg, row.page, row.count);
            let chain = match chain_result {
                Ok(chain) => chain,
                Err(e) => {
                    warn!("rescue: could not read item chain for key {} on page {index}: {e}", row.key);
                    return Err(e);
                }
            };
            let result = dst.insert(row.key, chain);
            if let Err(crate::error::TreeError::RecordExists) = &result {
                warn!("rescue: duplicate key {} on page {index}, skipping", row.key);
            }
            report.record(result)?;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Kind, META_SIZE};
    use crate::key::Key;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    fn simple_cfg() -> Config {
        Config { kind: Kind::Simple, order: 4, ref_order: 4, value_size: 8, item_size: 4, item_order: 4, page_size: None }
    }

    fn key_from_u128(n: u128) -> Key {
        Key::from_uuid(Uuid::from_u128(n))
    }

    #[test]
    fn stats_counts_records_and_root() {
        let cfg = simple_cfg();
        let tmp = NamedTempFile::new().unwrap();
        let mut tree = SimpleTree::open(tmp.reopen().unwrap(), cfg).unwrap();
        for i in 0..6u128 {
            tree.insert(key_from_u128(i), vec![0; 8]).unwrap();
        }
        tree.flush().unwrap();

        let mut pager = Pager::open(tmp.reopen().unwrap(), cfg.resolved_page_size(), META_SIZE).unwrap();
        let meta = Meta::decode(&pager.read_meta().unwrap()).unwrap();
        let s = stats(&mut pager, &cfg, &meta).unwrap();
        assert_eq!(s.record_count, 6);
        assert!(s.leaf_pages + s.start_pages >= 1);
    }

    #[test]
    fn rescue_reinserts_every_record_into_fresh_file() {
        let cfg = simple_cfg();
        let src_tmp = NamedTempFile::new().unwrap();
        let mut src_tree = SimpleTree::open(src_tmp.reopen().unwrap(), cfg).unwrap();
        for i in 0..6u128 {
            src_tree.insert(key_from_u128(i), vec![0; 8]).unwrap();
        }
        src_tree.flush().unwrap();

        let mut src_pager = Pager::open(src_tmp.reopen().unwrap(), cfg.resolved_page_size(), META_SIZE).unwrap();

        let dst_tmp = NamedTempFile::new().unwrap();
        let mut dst_tree = SimpleTree::open(dst_tmp.reopen().unwrap(), cfg).unwrap();

        let report = rescue_simple(&mut src_pager, &cfg, &mut dst_tree).unwrap();
        assert_eq!(report.records_seen, 6);
        assert_eq!(report.records_inserted, 6);
        assert_eq!(report.duplicates_skipped, 0);

        for i in 0..6u128 {
            assert_eq!(dst_tree.get(key_from_u128(i)).unwrap(), vec![0; 8]);
        }
    }
}
