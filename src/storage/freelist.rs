//! The free-page stack: a singly-linked LIFO of recycled `Empty` pages,
//! rooted at the meta block's free-head. Allocation pops the head before
//! ever appending a fresh page; recycling pushes.

use log::debug;

use crate::config::Config;
use crate::error::TreeResult;
use crate::storage::node::{encode, EmptyNode, Node, NodeKind};
use crate::storage::page::NONE_PAGE;
use crate::storage::pager::Pager;

/// Pop the free-head if one exists, else append a fresh zero page.
/// Returns the allocated page index; does not touch meta — the caller
/// (the tree) owns meta and must persist the new free-head itself.
pub fn allocate(pager: &mut Pager, cfg: &Config, free_head: i32) -> TreeResult<(i32, i32)> {
    if free_head == NONE_PAGE {
        let blank = vec![0u8; cfg.resolved_page_size()];
        let page = pager.append(&blank)?;
        debug!("freelist: stack empty, appended fresh page {page}");
        Ok((page, NONE_PAGE))
    } else {
        let raw = pager.read(free_head)?;
        let node = crate::storage::node::decode(&raw, cfg, Some(NodeKind::Empty))?;
        let next = match node {
            Node::Empty(e) => e.next,
            _ => unreachable!("decode asserted NodeKind::Empty"),
        };
        debug!("freelist: popped page {free_head}, new head {next}");
        Ok((free_head, next))
    }
}

/// Push `page` onto the free stack ahead of `free_head`. Returns the new
/// free-head (`page` itself) for the caller to persist in meta.
pub fn recycle(pager: &mut Pager, cfg: &Config, page: i32, free_head: i32) -> TreeResult<i32> {
    let node = Node::Empty(EmptyNode { next: free_head });
    let encoded = encode(&node, cfg)?;
    pager.write(&encoded, page)?;
    debug!("freelist: recycled page {page}, new head {page} -> {free_head}");
    Ok(page)
}
