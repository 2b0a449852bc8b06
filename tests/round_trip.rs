//! End-to-end scenario 1: insert a single record, close, reopen, and confirm
//! it comes back exactly as written.

use aerotree::config::Kind;
use aerotree::{Config, Key, SimpleTree};
use tempfile::NamedTempFile;
use uuid::Uuid;

fn cfg() -> Config {
    Config { kind: Kind::Simple, order: 4, ref_order: 4, value_size: 8, item_size: 4, item_order: 4, page_size: None }
}

#[test]
fn round_trip_survives_close_and_reopen() {
    let tmp = NamedTempFile::new().unwrap();
    let key = Key::from_uuid(Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap());

    {
        let mut tree = SimpleTree::open(tmp.reopen().unwrap(), cfg()).unwrap();
        tree.insert(key, vec![0, 0, 0, 1, 0, 0, 0, 0]).unwrap();
        tree.flush().unwrap();
    }

    let mut reopened = SimpleTree::open(tmp.reopen().unwrap(), cfg()).unwrap();
    assert_eq!(reopened.get(key).unwrap(), vec![0, 0, 0, 1, 0, 0, 0, 0]);
}
