//! 128-bit identifier keys, ordered by big-endian byte comparison.

use uuid::Uuid;

pub const KEY_SIZE: usize = 16;

/// A tree key. Wraps a UUID but orders strictly by the big-endian byte
/// representation, matching the wire format's `key(16)` field exactly —
/// `Uuid`'s own `Ord` impl already compares this way, but we re-derive it
/// from bytes so the in-memory ordering can never drift from the on-disk one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(pub [u8; KEY_SIZE]);

impl Key {
    pub fn from_uuid(id: Uuid) -> Self {
        Key(*id.as_bytes())
    }

    pub fn to_uuid(self) -> Uuid {
        Uuid::from_bytes(self.0)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Key(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl From<Uuid> for Key {
    fn from(id: Uuid) -> Self {
        Key::from_uuid(id)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_uuid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_byte_order() {
        let a = Key([0u8; 16]);
        let mut hi = [0u8; 16];
        hi[0] = 1;
        let b = Key(hi);
        assert!(a < b);
    }

    #[test]
    fn roundtrips_through_uuid() {
        let id = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let key = Key::from_uuid(id);
        assert_eq!(key.to_uuid(), id);
    }
}
