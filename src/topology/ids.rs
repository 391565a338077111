//! UID and SID generation for TS6-style identifiers.
//!
//! Two independent counters over the alphabet `[0-9A-Z]`, big-endian, fixed
//! width. UIDs are per-local-server and never collision-checked; SIDs are
//! per-network and checked against the live server tree.

use parking_lot::Mutex;

use super::ServerTree;

const UID_SUFFIX_LEN: usize = 6;
const SID_LEN: usize = 3;

/// Generates user identifiers: the local numeric prefix followed by six
/// mutable characters, seeded `AAAAAA` on first use.
///
/// Uniqueness holds only because the counter is monotonic within one
/// process lifetime; a restart reseeds from `AAAAAA`, so identifiers can
/// recur across restarts.
pub struct UidAllocator {
    prefix: String,
    cursor: Mutex<Option<[u8; UID_SUFFIX_LEN]>>,
}

impl UidAllocator {
    /// Create an allocator for the given server numeric.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            cursor: Mutex::new(None),
        }
    }

    /// Generate the next UID.
    pub fn next(&self) -> String {
        let mut guard = self.cursor.lock();
        let buf = guard.get_or_insert([b'A'; UID_SUFFIX_LEN]);
        uid_increment(buf, UID_SUFFIX_LEN - 1);
        format!(
            "{}{}",
            self.prefix,
            std::str::from_utf8(&buf[..]).expect("uid buffer is always ASCII")
        )
    }
}

/// Increment rule, applied least-significant slot first: `9` wraps to `A`
/// in place, `Z` wraps to `0` and carries into the next more-significant
/// slot. At the most-significant slot a `Z` does not carry out; it resets
/// the three least-significant slots to `A` instead (a short wrap, not a
/// uniform carry chain).
fn uid_increment(buf: &mut [u8; UID_SUFFIX_LEN], slot: usize) {
    if slot == 0 {
        if buf[0] == b'Z' {
            for b in &mut buf[UID_SUFFIX_LEN - 3..] {
                *b = b'A';
            }
        } else if buf[0] == b'9' {
            buf[0] = b'A';
        } else {
            buf[0] += 1;
        }
    } else if buf[slot] == b'Z' {
        buf[slot] = b'0';
        uid_increment(buf, slot - 1);
    } else if buf[slot] == b'9' {
        buf[slot] = b'A';
    } else {
        buf[slot] += 1;
    }
}

/// Generates server numerics: exactly three characters, a digit followed by
/// two characters from `[A-Z0-9]`, seeded from the local numeric.
///
/// Every candidate is checked against the live tree; allocation loops until
/// a free numeric is found, so the result is unique only among currently
/// linked servers.
pub struct SidAllocator {
    seed: String,
    cursor: Mutex<Option<[u8; SID_LEN]>>,
}

impl SidAllocator {
    /// Create an allocator seeded with the local server numeric.
    pub fn new(seed: &str) -> Self {
        debug_assert_eq!(seed.len(), SID_LEN);
        Self {
            seed: seed.to_string(),
            cursor: Mutex::new(None),
        }
    }

    /// Generate the next numeric not currently present in `tree`.
    pub fn next(&self, tree: &ServerTree) -> String {
        let mut guard = self.cursor.lock();
        let buf = guard.get_or_insert_with(|| {
            let mut seed = [0u8; SID_LEN];
            seed.copy_from_slice(self.seed.as_bytes());
            seed
        });
        loop {
            let candidate = std::str::from_utf8(&buf[..]).expect("sid buffer is always ASCII");
            if tree.find(candidate).is_none() {
                return candidate.to_string();
            }
            sid_increment(buf, SID_LEN - 1);
        }
    }
}

/// Same wrap rules as the UID counter at the inner slots; the leftmost slot
/// only ever holds a digit, and reaching `9` there resets the whole buffer
/// to the minimal numeric `0AA` rather than carrying out of range.
fn sid_increment(buf: &mut [u8; SID_LEN], slot: usize) {
    if slot == 0 {
        if buf[0] == b'9' {
            buf.copy_from_slice(b"0AA");
        } else {
            buf[0] += 1;
        }
    } else if buf[slot] == b'Z' {
        buf[slot] = b'0';
        sid_increment(buf, slot - 1);
    } else if buf[slot] == b'9' {
        buf[slot] = b'A';
    } else {
        buf[slot] += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_uid_follows_the_seed() {
        let alloc = UidAllocator::new("0SL");
        assert_eq!(alloc.next(), "0SLAAAAAB");
        assert_eq!(alloc.next(), "0SLAAAAAC");
    }

    #[test]
    fn digit_wraps_to_letter_in_place() {
        let mut buf = *b"AAAAA9";
        uid_increment(&mut buf, UID_SUFFIX_LEN - 1);
        assert_eq!(&buf, b"AAAAAA");
    }

    #[test]
    fn letter_z_wraps_to_zero_and_carries() {
        let mut buf = *b"AAAAAZ";
        uid_increment(&mut buf, UID_SUFFIX_LEN - 1);
        assert_eq!(&buf, b"AAAAB0");
    }

    #[test]
    fn carry_chains_through_consecutive_z() {
        let mut buf = *b"AAAZZZ";
        uid_increment(&mut buf, UID_SUFFIX_LEN - 1);
        assert_eq!(&buf, b"AAB000");
    }

    #[test]
    fn most_significant_z_short_wraps() {
        // A full buffer of Z carries up to the most-significant slot, which
        // resets the three least-significant slots instead of carrying out.
        let mut buf = *b"ZZZZZZ";
        uid_increment(&mut buf, UID_SUFFIX_LEN - 1);
        assert_eq!(&buf, b"Z00AAA");
    }

    #[test]
    fn sid_allocation_skips_live_collisions() {
        let mut tree = ServerTree::new("services.straylight.net", "services", "9ZZ");
        tree.introduce(None, "a.net", 1, "a", "1AA", false).unwrap();
        tree.introduce(Some("a.net"), "b.net", 2, "b", "1AB", false)
            .unwrap();

        let alloc = SidAllocator::new("1AA");
        assert_eq!(alloc.next(&tree), "1AC");
    }

    #[test]
    fn sid_seed_is_returned_when_free() {
        let tree = ServerTree::new("services.straylight.net", "services", "0SL");
        let alloc = SidAllocator::new("1AA");
        assert_eq!(alloc.next(&tree), "1AA");
    }

    #[test]
    fn sid_leftmost_digit_exhaustion_resets_buffer() {
        let mut buf = *b"9ZZ";
        sid_increment(&mut buf, SID_LEN - 1);
        assert_eq!(&buf, b"0AA");
    }

    #[test]
    fn sid_inner_slot_wraps() {
        let mut buf = *b"1AZ";
        sid_increment(&mut buf, SID_LEN - 1);
        assert_eq!(&buf, b"1B0");

        let mut buf = *b"1A9";
        sid_increment(&mut buf, SID_LEN - 1);
        assert_eq!(&buf, b"1AA");
    }
}
