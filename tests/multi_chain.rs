//! End-to-end scenario 4: a five-item collection on an `item_order = 4` tree
//! spans two item-chain pages and reads back exactly.

use aerotree::config::Kind;
use aerotree::{Config, Key, MultiTree};
use tempfile::NamedTempFile;
use uuid::Uuid;

fn cfg() -> Config {
    Config { kind: Kind::Multi, order: 4, ref_order: 4, value_size: 4, item_size: 4, item_order: 4, page_size: None }
}

#[test]
fn five_items_span_two_chain_pages() {
    let tmp = NamedTempFile::new().unwrap();
    let mut tree = MultiTree::open(tmp.reopen().unwrap(), cfg()).unwrap();

    let key = Key::from_uuid(Uuid::from_u128(1));
    let items: Vec<Vec<u8>> = (1..=5u32).map(|i| i.to_be_bytes().to_vec()).collect();
    tree.insert(key, items.clone()).unwrap();

    assert_eq!(tree.get(key).unwrap(), items);

    let (len, cursor) = tree.traverse(key).unwrap();
    assert_eq!(len, 5);
    let collected: Vec<Vec<u8>> = cursor.map(|r| r.unwrap()).collect();
    assert_eq!(collected, items);
}
