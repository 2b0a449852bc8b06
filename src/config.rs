//! Configuration accepted by [`crate::tree::simple::SimpleTree::open`] and
//! [`crate::tree::multi::MultiTree::open`], validated the way the teacher's
//! catalog validates column definitions before committing them.

use crate::error::{TreeError, TreeResult};
use crate::storage::page::{HEADER_SIZE, REF_ENTRY_SIZE};

/// Which of the two tree variants a file holds. Stored as the single tag byte
/// at the front of the meta block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Simple,
    Multi,
}

impl Kind {
    pub const fn tag(self) -> u8 {
        match self {
            Kind::Simple => b'S',
            Kind::Multi => b'M',
        }
    }

    pub fn from_tag(tag: u8) -> TreeResult<Self> {
        match tag {
            b'S' => Ok(Kind::Simple),
            b'M' => Ok(Kind::Multi),
            other => Err(TreeError::WrongNodeKind { expected: Some("'S' or 'M'"), found: other }),
        }
    }
}

/// Meta-block size in bytes. `29` bytes of real fields (kind, root, free_head,
/// order, ref_order, value_size, item_size, item_order), padded generously so
/// a future field can still be added without an on-disk format bump.
pub const META_SIZE: usize = 64;
pub const META_PAYLOAD_SIZE: usize = 1 + 4 + 4 + 4 + 4 + 4 + 4 + 4;

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub kind: Kind,
    /// Max records per leaf.
    pub order: u32,
    /// Max references per interior node.
    pub ref_order: u32,
    /// Fixed value width for the simple tree; ignored by the multi tree.
    pub value_size: u32,
    /// Fixed item width for the multi tree's item chains; ignored by the simple tree.
    pub item_size: u32,
    /// Max items per items-chain page.
    pub item_order: u32,
    /// Explicit page size override, validated against the computed minimum.
    pub page_size: Option<usize>,
}

impl Config {
    pub fn validate(&self) -> TreeResult<()> {
        if self.order < 4 {
            return Err(TreeError::ConfigOrderError);
        }
        if self.ref_order < 4 {
            return Err(TreeError::ConfigOrderError);
        }
        let minimum = self.minimum_page_size();
        if let Some(requested) = self.page_size {
            if requested < minimum {
                return Err(TreeError::ConfigSizeError { minimum });
            }
        }
        Ok(())
    }

    /// Largest per-kind payload, across leaf records, interior references, and
    /// (for the multi tree) items-chain pages, plus the node header.
    pub fn minimum_page_size(&self) -> usize {
        let record_size = match self.kind {
            Kind::Simple => crate::storage::node::simple_record_size(self.value_size as usize),
            Kind::Multi => crate::storage::node::multi_record_size(),
        };
        let leaf_payload = self.order as usize * record_size;
        let interior_payload = self.ref_order as usize * REF_ENTRY_SIZE;
        let items_payload = 4 + self.item_order as usize * self.item_size as usize;
        let max_payload = leaf_payload.max(interior_payload).max(items_payload);
        HEADER_SIZE + max_payload
    }

    pub fn resolved_page_size(&self) -> usize {
        self.page_size.unwrap_or_else(|| self.minimum_page_size())
    }
}
