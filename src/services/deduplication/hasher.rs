//! Path hashing and normalization utilities for deduplication.
//!
//! Paths are case-folded before they become cache keys, so
//! `C:\Tools\App.exe` and `c:\tools\app.exe` hit the same entry. Copies are
//! bounded by a maximum length and use fallible allocation so an oversized or
//! unallocatable path is rejected instead of aborting the process.

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Path hasher for the dedup cache.
///
/// # Example
///
/// ```rust
/// use fwnotify::services::deduplication::PathHasher;
///
/// let key = PathHasher::normalize(r"C:\Tools\App.exe", 260).unwrap();
/// assert_eq!(key, r"c:\tools\app.exe");
/// assert_eq!(PathHasher::hash(&key), PathHasher::hash(r"c:\tools\app.exe"));
/// ```
pub struct PathHasher;

impl PathHasher {
    /// Computes the FNV-1a hash of a path.
    ///
    /// Hashes the path's UTF-8 bytes. The empty string hashes to the offset
    /// basis.
    #[must_use]
    pub fn hash(path: &str) -> u64 {
        path.bytes().fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        })
    }

    /// Returns a lowercase copy of the path.
    #[must_use]
    pub fn fold_case(path: &str) -> String {
        path.chars().flat_map(char::to_lowercase).collect()
    }

    /// Returns true if the path is empty or longer than `max_len` characters.
    #[must_use]
    pub fn is_out_of_bounds(path: &str, max_len: usize) -> bool {
        path.is_empty() || path.chars().nth(max_len).is_some()
    }

    /// Copies a path if it is non-empty and at most `max_len` characters.
    ///
    /// Returns `None` for empty or oversized paths, or when the copy cannot
    /// be allocated.
    #[must_use]
    pub fn bounded_copy(path: &str, max_len: usize) -> Option<String> {
        if Self::is_out_of_bounds(path, max_len) {
            return None;
        }

        let mut copy = String::new();
        copy.try_reserve_exact(path.len()).ok()?;
        copy.push_str(path);
        Some(copy)
    }

    /// Produces the cache key for a path: a bounded, case-folded copy.
    ///
    /// The bound applies to the folded key, since folding can lengthen a
    /// path (`İ` folds to two characters). Returns `None` under the same
    /// conditions as [`Self::bounded_copy`].
    #[must_use]
    pub fn normalize(path: &str, max_len: usize) -> Option<String> {
        if path.is_empty() {
            return None;
        }

        let mut key = String::new();
        key.try_reserve_exact(path.len()).ok()?;
        for (count, c) in path.chars().flat_map(char::to_lowercase).enumerate() {
            if count == max_len {
                return None;
            }
            key.try_reserve(c.len_utf8()).ok()?;
            key.push(c);
        }
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_fnv_vectors() {
        assert_eq!(PathHasher::hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(PathHasher::hash("a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(PathHasher::hash("foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_same_path_same_hash() {
        let a = PathHasher::hash(r"c:\windows\system32\svchost.exe");
        let b = PathHasher::hash(r"c:\windows\system32\svchost.exe");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_paths_different_hash() {
        assert_ne!(
            PathHasher::hash(r"c:\tools\app1.exe"),
            PathHasher::hash(r"c:\tools\app2.exe")
        );
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(PathHasher::fold_case(r"C:\Program Files\App.EXE"), r"c:\program files\app.exe");
        assert_eq!(PathHasher::fold_case("ÄPFEL"), "äpfel");
    }

    #[test]
    fn test_bounded_copy_rejects_empty() {
        assert!(PathHasher::bounded_copy("", 10).is_none());
    }

    #[test]
    fn test_bounded_copy_length_limit() {
        assert_eq!(PathHasher::bounded_copy("abcd", 4).as_deref(), Some("abcd"));
        assert!(PathHasher::bounded_copy("abcde", 4).is_none());
    }

    #[test]
    fn test_bounded_copy_counts_characters() {
        // Four characters, eight bytes.
        assert_eq!(PathHasher::bounded_copy("ääää", 4).as_deref(), Some("ääää"));
    }

    #[test]
    fn test_normalize_folds_and_bounds() {
        assert_eq!(
            PathHasher::normalize(r"D:\Games\Launcher.exe", 64).as_deref(),
            Some(r"d:\games\launcher.exe")
        );
        assert!(PathHasher::normalize(r"D:\Games\Launcher.exe", 5).is_none());
        assert!(PathHasher::normalize("", 5).is_none());
    }

    #[test]
    fn test_normalize_bounds_folded_length() {
        // U+0130 folds to "i" plus a combining dot.
        assert_eq!(PathHasher::fold_case("\u{130}").chars().count(), 2);
        assert!(PathHasher::normalize("\u{130}abc", 4).is_none());

        let key = PathHasher::normalize("\u{130}abc", 5).unwrap();
        assert_eq!(key.chars().count(), 5);
        assert!(!PathHasher::is_out_of_bounds(&key, 5));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = PathHasher::normalize(r"C:\Mixed\Case.Exe", 64).unwrap();
        let twice = PathHasher::normalize(&once, 64).unwrap();
        assert_eq!(once, twice);
    }
}
