//! Raw page header layout, shared by every node kind.
//!
//! ```text
//! ┌────────┬────────┬─────────────────────────────────────────┐
//! │ Offset │ Length │ Description                              │
//! ├────────┼────────┼──────────────────────────────────────────┤
//! │   0    │   1    │ KIND        tag byte, see NodeKind        │
//! │   1    │   4    │ NEXT        i32 BE, -1 means "none"       │
//! │   5    │   4    │ COUNT       u32 BE, entries/items on page │
//! ├────────┼────────┼──────────────────────────────────────────┤
//! │   9    │ rest   │ payload, meaning depends on KIND          │
//! └────────┴────────┴──────────────────────────────────────────┘
//! ```
//!
//! Page size is a per-tree configuration value (see [`crate::config::Config`]),
//! not a compile-time constant, so this module operates on `&[u8]` slices of
//! whatever length the pager hands it rather than a fixed-size array.

pub const KIND_OFFSET: usize = 0;
pub const NEXT_OFFSET: usize = 1;
pub const COUNT_OFFSET: usize = 5;
pub const HEADER_SIZE: usize = 9;

pub const REF_ENTRY_SIZE: usize = 4 + 4 + 16; // before, after, key

pub const NONE_PAGE: i32 = -1;

pub fn get_kind_tag(page: &[u8]) -> u8 {
    page[KIND_OFFSET]
}

pub fn set_kind_tag(page: &mut [u8], tag: u8) {
    page[KIND_OFFSET] = tag;
}

pub fn get_next(page: &[u8]) -> i32 {
    i32::from_be_bytes(page[NEXT_OFFSET..NEXT_OFFSET + 4].try_into().unwrap())
}

pub fn set_next(page: &mut [u8], next: i32) {
    page[NEXT_OFFSET..NEXT_OFFSET + 4].copy_from_slice(&next.to_be_bytes());
}

pub fn get_count(page: &[u8]) -> u32 {
    u32::from_be_bytes(page[COUNT_OFFSET..COUNT_OFFSET + 4].try_into().unwrap())
}

pub fn set_count(page: &mut [u8], count: u32) {
    page[COUNT_OFFSET..COUNT_OFFSET + 4].copy_from_slice(&count.to_be_bytes());
}
