//! `fnmatch`-style `*`/`?` glob matching over cache keys, used for
//! pattern-scoped invalidation (`cache.py::_matches_pattern`).

/// Whether `key` matches a shell-style glob `pattern` (`*` = any run of
/// characters, `?` = exactly one).
pub fn glob_matches(pattern: &str, key: &str) -> bool {
    fn matches(p: &[u8], s: &[u8]) -> bool {
        match (p.first(), s.first()) {
            (None, None) => true,
            (Some(b'*'), _) => matches(&p[1..], s) || (!s.is_empty() && matches(p, &s[1..])),
            (Some(b'?'), Some(_)) => matches(&p[1..], &s[1..]),
            (Some(pc), Some(sc)) if pc == sc => matches(&p[1..], &s[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), key.as_bytes())
}
