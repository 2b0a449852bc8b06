use thiserror::Error;
use std::io;

/// Every way the engine can fail, split the way the source splits it: page-level
/// corruption, pager-level I/O, and tree-level algorithm/config problems share one
/// enum because callers generally just want to know whether to invoke rescue.
#[derive(Debug, Error)]
pub enum TreeError {
    // --- structural / node codec errors ---
    #[error("page length {actual} does not match configured page size {expected}")]
    PageLengthInvalid { expected: usize, actual: usize },
    #[error("wrong node kind: expected {expected:?}, found byte {found:#04x}")]
    WrongNodeKind { expected: Option<&'static str>, found: u8 },
    #[error("checksum mismatch for record")]
    ChecksumError,
    #[error("entry count {count} exceeds order {order}")]
    EntryCountError { count: u32, order: u32 },
    #[error("item count {count} exceeds item order {item_order}")]
    ItemCountError { count: u32, item_order: u32 },
    #[error("item size {actual} does not match configured item size {expected}")]
    ItemWrongSize { expected: usize, actual: usize },
    #[error("items page's own count prefix {prefix} does not match its header count {header}")]
    ItemsPrefixMismatch { prefix: u32, header: u32 },
    #[error("blob size {size} invalid for page")]
    BlobSizeInvalid { size: u32 },
    #[error("encoded payload of {size} bytes does not fit in a {page_size}-byte page")]
    DataTooLarge { size: usize, page_size: usize },
    #[error("node has no backing page")]
    PageNotSet,

    // --- pager errors ---
    #[error("file length is not meta_size + n * page_size")]
    UnevenLength,
    #[error("meta block write of {actual} bytes does not match meta_size {expected}")]
    MetaSizeInvalid { expected: usize, actual: usize },
    #[error("page index {index} is out of bounds (page count {count})")]
    OutOfBounds { index: i32, count: u32 },
    #[error("page buffer of {actual} bytes does not match page_size {expected}")]
    PageSizeInvalid { expected: usize, actual: usize },
    #[error("seek landed at {actual}, expected {expected}")]
    SeekOffsetError { expected: u64, actual: u64 },
    #[error("short write: wrote {actual} of {expected} bytes")]
    WriteFailed { expected: usize, actual: usize },

    // --- tree-level errors ---
    #[error("stored meta does not match requested configuration")]
    ConfigurationError,
    #[error("configured page_size is smaller than the minimum required {minimum}")]
    ConfigSizeError { minimum: usize },
    #[error("order must be at least 4")]
    ConfigOrderError,
    #[error("descent could not find an adjacent reference for the search key")]
    SearchError,
    #[error("range iteration only supports a step of one")]
    IterCustomError,
    #[error("range start must not be greater than stop")]
    IterBackwardError,
    #[error("leaf must hold more than 4 entries to split")]
    NodeSplitError,
    #[error("value is {actual} bytes, exceeds configured value_size {expected}")]
    ValueSizeError { expected: usize, actual: usize },
    #[error("item chain produced {actual} items, record declares {expected}")]
    PageIterError { expected: u32, actual: u32 },

    // --- lookup outcomes, modeled as error variants so call sites use `?` uniformly ---
    #[error("no entry for key")]
    EntryNotFound,
    #[error("a record already exists for this key")]
    RecordExists,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type TreeResult<T> = Result<T, TreeError>;
