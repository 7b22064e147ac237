use globset::GlobBuilder;
use tracing::debug;

/// Joins `prefix` and `name` into a forward-slash relative path.
///
/// An empty prefix yields `name` unchanged, so root-level entries are
/// matched by their bare names.
pub fn normalize(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn matches_glob(pattern: &str, path: &str) -> bool {
    let glob = match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => glob,
        Err(err) => {
            debug!("skipping invalid exclude glob '{}': {}", pattern, err);
            return false;
        }
    };
    glob.compile_matcher().is_match(path)
}

/// Returns true when any exclude glob matches `path`.
///
/// Patterns use doublestar semantics: `*` does not cross `/`, `**` spans
/// zero or more path segments. A trailing `/**` therefore also matches the
/// directory itself. Invalid patterns never match.
pub fn should_exclude(path: &str, excludes: &[String]) -> bool {
    if excludes.is_empty() {
        return false;
    }
    for pattern in excludes {
        if matches_glob(pattern, path) {
            return true;
        }
        // `dir/**` excludes `dir` as well, matching the zero-segment case.
        if let Some(base) = pattern.strip_suffix("/**") {
            if matches_glob(base, path) {
                return true;
            }
        }
    }
    false
}

/// Unordered multiset equality over exclude-glob strings.
pub fn same_glob_set(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut counts = std::collections::HashMap::new();
    for glob in a {
        *counts.entry(glob.as_str()).or_insert(0i64) += 1;
    }
    for glob in b {
        match counts.get_mut(glob.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => return false,
        }
    }
    true
}
