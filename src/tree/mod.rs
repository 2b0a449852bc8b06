//! Shared B+Tree machinery: the meta block, descent, leaf split, and parent
//! split up to root promotion. Both [`simple::SimpleTree`] and
//! [`multi::MultiTree`] are thin public-API wrappers around these free
//! functions — everything here is agnostic to whether a leaf's
//! [`crate::storage::node::LeafRecords`] holds `Simple` or `Multi` records,
//! since the split/promotion algorithm only ever looks at key order and
//! record *counts*, never their payload.

pub mod multi;
pub mod simple;

use log::debug;

use crate::config::{Config, Kind, META_PAYLOAD_SIZE};
use crate::error::{TreeError, TreeResult};
use crate::key::Key;
use crate::storage::freelist;
use crate::storage::node::{decode, encode, LeafNode, Node, RefEntry, RefsNode};
use crate::storage::page::NONE_PAGE;
use crate::storage::pager::Pager;

/// The fixed meta block: tree kind, root/free-head pointers, and the
/// configuration the file was created with. `item_size`/`item_order` live in
/// the padding past the spec's 21-byte core fields (offsets 21..29) — they
/// govern how a multi-tree's item chains decode and so must round-trip
/// through reopen just as faithfully as `value_size` does for the simple
/// tree, even though §6's wire-format table only pins down the first 21
/// bytes.
#[derive(Debug, Clone, Copy)]
pub struct Meta {
    pub kind: Kind,
    pub root: i32,
    pub free_head: i32,
    pub order: u32,
    pub ref_order: u32,
    pub value_size: u32,
    pub item_size: u32,
    pub item_order: u32,
}

impl Meta {
    pub fn encode(&self, meta_size: usize) -> Vec<u8> {
        let mut buf = vec![0u8; meta_size];
        buf[0] = self.kind.tag();
        buf[1..5].copy_from_slice(&self.root.to_be_bytes());
        buf[5..9].copy_from_slice(&self.free_head.to_be_bytes());
        buf[9..13].copy_from_slice(&self.order.to_be_bytes());
        buf[13..17].copy_from_slice(&self.ref_order.to_be_bytes());
        buf[17..21].copy_from_slice(&self.value_size.to_be_bytes());
        buf[21..25].copy_from_slice(&self.item_size.to_be_bytes());
        buf[25..29].copy_from_slice(&self.item_order.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> TreeResult<Self> {
        if buf.len() < META_PAYLOAD_SIZE {
            return Err(TreeError::MetaSizeInvalid { expected: META_PAYLOAD_SIZE, actual: buf.len() });
        }
        let kind = Kind::from_tag(buf[0])?;
        let root = i32::from_be_bytes(buf[1..5].try_into().unwrap());
        let free_head = i32::from_be_bytes(buf[5..9].try_into().unwrap());
        let order = u32::from_be_bytes(buf[9..13].try_into().unwrap());
        let ref_order = u32::from_be_bytes(buf[13..17].try_into().unwrap());
        let value_size = u32::from_be_bytes(buf[17..21].try_into().unwrap());
        let item_size = u32::from_be_bytes(buf[21..25].try_into().unwrap());
        let item_order = u32::from_be_bytes(buf[25..29].try_into().unwrap());
        Ok(Meta { kind, root, free_head, order, ref_order, value_size, item_size, item_order })
    }
}

pub fn save_meta(pager: &mut Pager, meta: &Meta, meta_size: usize) -> TreeResult<()> {
    pager.write_meta(&meta.encode(meta_size))
}

/// Descend from the root to the record-bearing node holding `key`'s leaf,
/// returning that page and the stack of interior pages visited (root first,
/// immediate parent last — empty if the root itself is record-bearing).
pub fn descend(pager: &mut Pager, cfg: &Config, root: i32, key: Key) -> TreeResult<(i32, Vec<i32>)> {
    let mut current = root;
    let mut parents = Vec::new();
    loop {
        let raw = pager.read(current)?;
        let node = decode(&raw, cfg, None)?;
        match node {
            Node::Start(_) | Node::Leaf(_) => return Ok((current, parents)),
            Node::Structure(refs) | Node::Root(refs) => {
                let next = choose_child(&refs.refs, key)?;
                parents.push(current);
                current = next;
            }
            _ => return Err(TreeError::SearchError),
        }
    }
}

/// The left-most record-bearing page, used when a range has no start bound.
pub fn leftmost_leaf(pager: &mut Pager, cfg: &Config, root: i32) -> TreeResult<i32> {
    let mut current = root;
    loop {
        let raw = pager.read(current)?;
        let node = decode(&raw, cfg, None)?;
        match node {
            Node::Start(_) | Node::Leaf(_) => return Ok(current),
            Node::Structure(refs) | Node::Root(refs) => {
                current = refs.refs.first().ok_or(TreeError::SearchError)?.before;
            }
            _ => return Err(TreeError::SearchError),
        }
    }
}

fn choose_child(refs: &[RefEntry], key: Key) -> TreeResult<i32> {
    let smallest = refs.first().ok_or(TreeError::SearchError)?;
    if key < smallest.key {
        return Ok(smallest.before);
    }
    let largest = refs.last().unwrap();
    if key >= largest.key {
        return Ok(largest.after);
    }
    for pair in refs.windows(2) {
        if pair[0].key <= key && key < pair[1].key {
            return Ok(pair[0].after);
        }
    }
    Err(TreeError::SearchError)
}

/// Load a record-bearing node, reporting whether it was the `Start` variant
/// (the single-node root) as opposed to a non-root `Leaf`.
pub fn load_leaf(pager: &mut Pager, cfg: &Config, page: i32) -> TreeResult<(LeafNode, bool)> {
    let raw = pager.read(page)?;
    match decode(&raw, cfg, None)? {
        Node::Start(leaf) => Ok((leaf, true)),
        Node::Leaf(leaf) => Ok((leaf, false)),
        other => Err(TreeError::WrongNodeKind { expected: Some("Start or Leaf"), found: other.kind().tag() }),
    }
}

pub fn write_leaf(pager: &mut Pager, cfg: &Config, page: i32, leaf: LeafNode, is_start: bool) -> TreeResult<()> {
    let node = if is_start { Node::Start(leaf) } else { Node::Leaf(leaf) };
    let encoded = encode(&node, cfg)?;
    pager.write(&encoded, page)
}

/// Insert `new_ref` into its adjacency-correct slot, wiring up the
/// neighboring references the way the source's leaf-split fixup does.
pub fn insert_ref_sorted(refs: &mut Vec<RefEntry>, new_ref: RefEntry) {
    let idx = refs.partition_point(|r| r.key < new_ref.key);
    refs.insert(idx, new_ref);
    if idx > 0 {
        refs[idx - 1].after = refs[idx].before;
    }
    if idx + 1 < refs.len() {
        refs[idx + 1].before = refs[idx].after;
    }
}

/// After a leaf or interior split, either splice the promotion reference into
/// an existing parent (splitting it too, recursively, if it overflows) or —
/// if there was no parent — promote straight to a new root.
pub fn insert_reference(
    pager: &mut Pager,
    cfg: &Config,
    meta: &mut Meta,
    mut parents: Vec<i32>,
    new_ref: RefEntry,
) -> TreeResult<()> {
    match parents.pop() {
        None => create_new_root(pager, cfg, meta, new_ref),
        Some(parent_page) => {
            let raw = pager.read(parent_page)?;
            let node = decode(&raw, cfg, None)?;
            let was_root = matches!(node, Node::Root(_));
            let mut refs_node = match node {
                Node::Structure(r) | Node::Root(r) => r,
                other => {
                    return Err(TreeError::WrongNodeKind {
                        expected: Some("Structure or Root"),
                        found: other.kind().tag(),
                    })
                }
            };
            insert_ref_sorted(&mut refs_node.refs, new_ref);

            if refs_node.refs.len() as u32 <= cfg.ref_order {
                let node = if was_root { Node::Root(refs_node) } else { Node::Structure(refs_node) };
                let encoded = encode(&node, cfg)?;
                pager.write(&encoded, parent_page)?;
                Ok(())
            } else {
                split_structure(pager, cfg, meta, parents, parent_page, refs_node, was_root)
            }
        }
    }
}

fn split_structure(
    pager: &mut Pager,
    cfg: &Config,
    meta: &mut Meta,
    parents: Vec<i32>,
    parent_page: i32,
    mut refs_node: RefsNode,
    was_root: bool,
) -> TreeResult<()> {
    let mid = refs_node.refs.len() / 2;
    let mut upper = refs_node.refs.split_off(mid);
    let promoted = upper.remove(0);

    let (new_page, new_free_head) = freelist::allocate(pager, cfg, meta.free_head)?;
    meta.free_head = new_free_head;

    let promo_ref = RefEntry { before: parent_page, after: new_page, key: promoted.key };

    let lower_node = Node::Structure(RefsNode { refs: refs_node.refs });
    let upper_node = Node::Structure(RefsNode { refs: upper });
    let lower_encoded = encode(&lower_node, cfg)?;
    let upper_encoded = encode(&upper_node, cfg)?;
    pager.write(&lower_encoded, parent_page)?;
    pager.write(&upper_encoded, new_page)?;
    debug!("tree: split structure page {parent_page} -> {parent_page}, {new_page}");

    if was_root {
        create_new_root(pager, cfg, meta, promo_ref)
    } else {
        insert_reference(pager, cfg, meta, parents, promo_ref)
    }
}

fn create_new_root(pager: &mut Pager, cfg: &Config, meta: &mut Meta, ref_entry: RefEntry) -> TreeResult<()> {
    let (new_page, new_free_head) = freelist::allocate(pager, cfg, meta.free_head)?;
    meta.free_head = new_free_head;
    let node = Node::Root(RefsNode { refs: vec![ref_entry] });
    let encoded = encode(&node, cfg)?;
    pager.write(&encoded, new_page)?;
    meta.root = new_page;
    debug!("tree: promoted new root at page {new_page}");
    Ok(())
}

/// Split an overflowing leaf (`> order` entries after insertion), linking the
/// new leaf into the `next` chain and promoting a reference for it.
pub fn split_leaf(
    pager: &mut Pager,
    cfg: &Config,
    meta: &mut Meta,
    leaf_page: i32,
    mut leaf: LeafNode,
    is_start: bool,
    parents: Vec<i32>,
) -> TreeResult<()> {
    if leaf.records.len() <= 4 {
        return Err(TreeError::NodeSplitError);
    }
    let mid = leaf.records.len() / 2;
    let upper_records = leaf.records.split_off(mid);
    let upper_key = upper_records.smallest_key().ok_or(TreeError::NodeSplitError)?;

    let (new_page, new_free_head) = freelist::allocate(pager, cfg, meta.free_head)?;
    meta.free_head = new_free_head;

    let old_next = leaf.next;
    leaf.next = new_page;
    let new_leaf = LeafNode { next: old_next, records: upper_records };

    // A split leaf is never the Start node afterward; both halves are plain
    // non-root Leaf pages once there's a reference node above them.
    write_leaf(pager, cfg, leaf_page, leaf, false)?;
    write_leaf(pager, cfg, new_page, new_leaf, false)?;
    debug!("tree: split leaf page {leaf_page} -> {leaf_page}, {new_page}");

    let promo_ref = RefEntry { before: leaf_page, after: new_page, key: upper_key };
    if is_start {
        create_new_root(pager, cfg, meta, promo_ref)
    } else {
        insert_reference(pager, cfg, meta, parents, promo_ref)
    }
}

pub const fn none_page() -> i32 {
    NONE_PAGE
}
