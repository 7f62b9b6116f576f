//! Duplicate key resolution
//!
//! A taken key gets the first free letter suffix from the sequence
//! `b, c, ..., z, aa, ab, ..., zz, aaa, ...`.

/// Letter suffix for position `n` of the sequence, where `n = 0` is `b`.
pub fn suffix(n: usize) -> String {
    // Bijective base 26 with a = 1, starting at 2 ("b").
    let mut value = n + 2;
    let mut letters = Vec::new();
    while value > 0 {
        let digit = (value - 1) % 26;
        letters.push(b'a' + digit as u8);
        value = (value - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Return `base` if it is free, else `base` plus the earliest free suffix.
pub fn uniquify_key(base: &str, exists: impl Fn(&str) -> bool) -> String {
    if !exists(base) {
        return base.to_string();
    }
    (0..)
        .map(|n| format!("{}{}", base, suffix(n)))
        .find(|candidate| !exists(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_suffix_sequence() {
        assert_eq!(suffix(0), "b");
        assert_eq!(suffix(24), "z");
        assert_eq!(suffix(25), "aa");
        assert_eq!(suffix(26), "ab");
        assert_eq!(suffix(25 + 26 * 26 - 1), "zz");
        assert_eq!(suffix(25 + 26 * 26), "aaa");
    }

    #[test]
    fn test_free_key_unchanged() {
        assert_eq!(uniquify_key("smith2020", |_| false), "smith2020");
    }

    #[test]
    fn test_consecutive_letters() {
        let mut taken: HashSet<String> = HashSet::new();
        taken.insert("smith2020".to_string());
        let second = uniquify_key("smith2020", |k| taken.contains(k));
        assert_eq!(second, "smith2020b");
        taken.insert(second);
        assert_eq!(uniquify_key("smith2020", |k| taken.contains(k)), "smith2020c");
    }

    #[test]
    fn test_fills_gaps() {
        let taken: HashSet<&str> = ["k", "kb", "kd"].into_iter().collect();
        assert_eq!(uniquify_key("k", |k| taken.contains(k)), "kc");
    }

    #[test]
    fn test_past_z() {
        let mut taken: HashSet<String> = (0..25).map(|n| format!("k{}", suffix(n))).collect();
        taken.insert("k".to_string());
        assert_eq!(uniquify_key("k", |k| taken.contains(k)), "kaa");
    }

    proptest! {
        #[test]
        fn prop_result_is_free_and_stable(
            base in "[a-z]{1,6}[0-9]{0,4}",
            used in proptest::collection::vec(0usize..40, 0..20),
        ) {
            let mut taken: HashSet<String> = used.iter().map(|n| format!("{}{}", base, suffix(*n))).collect();
            taken.insert(base.clone());
            let first = uniquify_key(&base, |k| taken.contains(k));
            let again = uniquify_key(&base, |k| taken.contains(k));
            prop_assert!(!taken.contains(&first));
            prop_assert_eq!(&first, &again);
            prop_assert!(first.starts_with(&base));
        }
    }
}
