//! The overflow / item-chain engine used by the multi-tree: a singly-linked
//! chain of `Items` pages holding a multi-tree record's collection.

use log::debug;

use crate::config::Config;
use crate::error::{TreeError, TreeResult};
use crate::storage::freelist;
use crate::storage::node::{decode, encode, ItemsNode, Node, NodeKind};
use crate::storage::page::NONE_PAGE;
use crate::storage::pager::Pager;

/// Build a fresh chain holding `items`, `item_order` per page. Returns the
/// head page, or `-1` if `items` is empty. Threads `free_head` through every
/// allocation it performs.
pub fn create_chain(
    pager: &mut Pager,
    cfg: &Config,
    items: &[Vec<u8>],
    free_head: &mut i32,
) -> TreeResult<i32> {
    if items.is_empty() {
        return Ok(NONE_PAGE);
    }
    let item_order = cfg.item_order as usize;
    let chunks: Vec<&[Vec<u8>]> = items.chunks(item_order).collect();

    let mut pages = Vec::with_capacity(chunks.len());
    for _ in &chunks {
        let (page, new_head) = freelist::allocate(pager, cfg, *free_head)?;
        *free_head = new_head;
        pages.push(page);
    }

    for (i, chunk) in chunks.iter().enumerate() {
        let next = pages.get(i + 1).copied().unwrap_or(NONE_PAGE);
        let node = Node::Items(ItemsNode { next, items: chunk.to_vec() });
        let encoded = encode(&node, cfg)?;
        pager.write(&encoded, pages[i])?;
    }
    debug!("items: built {}-page chain starting at {}", pages.len(), pages[0]);
    Ok(pages[0])
}

/// Read-only traversal: follow `next` from `head`, collecting every item.
/// Fails with `PageIterError` if the total produced doesn't match `expected_count`.
pub fn read_all(pager: &mut Pager, cfg: &Config, head: i32, expected_count: u32) -> TreeResult<Vec<Vec<u8>>> {
    let mut items = Vec::with_capacity(expected_count as usize);
    let mut cur = head;
    while cur != NONE_PAGE {
        let raw = pager.read(cur)?;
        let node = decode(&raw, cfg, Some(NodeKind::Items))?;
        let (next, mut page_items) = match node {
            Node::Items(n) => (n.next, n.items),
            _ => unreachable!("decode asserted NodeKind::Items"),
        };
        items.append(&mut page_items);
        cur = next;
    }
    if items.len() as u32 != expected_count {
        return Err(TreeError::PageIterError { expected: expected_count, actual: items.len() as u32 });
    }
    Ok(items)
}

/// Recycle every page of the chain rooted at `head`, without returning its
/// contents. Used by `clear` and `delete`.
pub fn recycle_chain(pager: &mut Pager, cfg: &Config, head: i32, free_head: &mut i32) -> TreeResult<()> {
    let mut cur = head;
    while cur != NONE_PAGE {
        let raw = pager.read(cur)?;
        let node = decode(&raw, cfg, Some(NodeKind::Items))?;
        let next = match node {
            Node::Items(n) => n.next,
            _ => unreachable!("decode asserted NodeKind::Items"),
        };
        *free_head = freelist::recycle(pager, cfg, cur, *free_head)?;
        cur = next;
    }
    Ok(())
}

/// Rebuild the chain rooted at `head`: keep every existing item not present
/// in `deletions` (by byte-equality), append `insertions` after them, recycle
/// every old chain page as it is consumed, and write a fresh chain for the
/// result. Returns `(new_head, new_count)`.
pub fn update_chain(
    pager: &mut Pager,
    cfg: &Config,
    head: i32,
    expected_count: u32,
    insertions: &[Vec<u8>],
    deletions: &[Vec<u8>],
    free_head: &mut i32,
) -> TreeResult<(i32, u32)> {
    let mut kept = Vec::with_capacity(expected_count as usize);
    let mut cur = head;
    let mut seen = 0u32;
    while cur != NONE_PAGE {
        let raw = pager.read(cur)?;
        let node = decode(&raw, cfg, Some(NodeKind::Items))?;
        let (next, page_items) = match node {
            Node::Items(n) => (n.next, n.items),
            _ => unreachable!("decode asserted NodeKind::Items"),
        };
        seen += page_items.len() as u32;
        for item in page_items {
            if !deletions.iter().any(|d| *d == item) {
                kept.push(item);
            }
        }
        *free_head = freelist::recycle(pager, cfg, cur, *free_head)?;
        cur = next;
    }
    if seen != expected_count {
        return Err(TreeError::PageIterError { expected: expected_count, actual: seen });
    }
    kept.extend(insertions.iter().cloned());
    let new_count = kept.len() as u32;
    let new_head = create_chain(pager, cfg, &kept, free_head)?;
    Ok((new_head, new_count))
}

/// A lazy cursor over a chain's items, with a known total length up front.
/// Pulls one page at a time from the pager rather than materializing the
/// whole collection.
pub struct ItemsCursor<'a> {
    pager: &'a mut Pager,
    cfg: Config,
    len: u32,
    next_page: i32,
    buffer: std::vec::IntoIter<Vec<u8>>,
}

impl<'a> ItemsCursor<'a> {
    pub fn new(pager: &'a mut Pager, cfg: Config, head: i32, len: u32) -> Self {
        ItemsCursor { pager, cfg, len, next_page: head, buffer: Vec::new().into_iter() }
    }

    pub fn len(&self) -> u32 {
        self.len
    }
}

impl<'a> Iterator for ItemsCursor<'a> {
    type Item = TreeResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            if self.next_page == NONE_PAGE {
                return None;
            }
            let raw = match self.pager.read(self.next_page) {
                Ok(raw) => raw,
                Err(e) => return Some(Err(e)),
            };
            let node = match decode(&raw, &self.cfg, Some(NodeKind::Items)) {
                Ok(node) => node,
                Err(e) => return Some(Err(e)),
            };
            match node {
                Node::Items(n) => {
                    self.next_page = n.next;
                    self.buffer = n.items.into_iter();
                }
                _ => unreachable!("decode asserted NodeKind::Items"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Kind;
    use tempfile::NamedTempFile;

    fn cfg() -> Config {
        Config { kind: Kind::Multi, order: 4, ref_order: 4, value_size: 4, item_size: 4, item_order: 4, page_size: None }
    }

    fn open_pager(cfg: &Config) -> (Pager, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        let file = tmp.reopen().unwrap();
        let pager = Pager::open(file, cfg.resolved_page_size(), crate::config::META_SIZE).unwrap();
        (pager, tmp)
    }

    #[test]
    fn chain_spans_multiple_pages_when_over_item_order() {
        let cfg = cfg();
        let (mut pager, _tmp) = open_pager(&cfg);
        let mut free_head = NONE_PAGE;
        let items: Vec<Vec<u8>> = (0..5u32).map(|i| i.to_be_bytes().to_vec()).collect();
        let head = create_chain(&mut pager, &cfg, &items, &mut free_head).unwrap();
        assert_ne!(head, NONE_PAGE);
        let read_back = read_all(&mut pager, &cfg, head, 5).unwrap();
        assert_eq!(read_back, items);
    }

    #[test]
    fn update_filters_deletions_and_appends_insertions() {
        let cfg = cfg();
        let (mut pager, _tmp) = open_pager(&cfg);
        let mut free_head = NONE_PAGE;
        let items: Vec<Vec<u8>> = (1..=5u32).map(|i| i.to_be_bytes().to_vec()).collect();
        let head = create_chain(&mut pager, &cfg, &items, &mut free_head).unwrap();

        let insertions = vec![6u32.to_be_bytes().to_vec()];
        let deletions = vec![3u32.to_be_bytes().to_vec()];
        let (new_head, new_count) =
            update_chain(&mut pager, &cfg, head, 5, &insertions, &deletions, &mut free_head).unwrap();
        assert_eq!(new_count, 5);
        let result = read_all(&mut pager, &cfg, new_head, new_count).unwrap();
        let expected: Vec<Vec<u8>> = [1u32, 2, 4, 5, 6].iter().map(|i| i.to_be_bytes().to_vec()).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn cursor_yields_same_items_lazily() {
        let cfg = cfg();
        let (mut pager, _tmp) = open_pager(&cfg);
        let mut free_head = NONE_PAGE;
        let items: Vec<Vec<u8>> = (0..6u32).map(|i| i.to_be_bytes().to_vec()).collect();
        let head = create_chain(&mut pager, &cfg, &items, &mut free_head).unwrap();
        let cursor = ItemsCursor::new(&mut pager, cfg, head, 6);
        assert_eq!(cursor.len(), 6);
        let collected: Vec<Vec<u8>> = cursor.map(|r| r.unwrap()).collect();
        assert_eq!(collected, items);
    }
}
