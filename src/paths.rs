use crate::error::{Error, Result};

/// Normalize a store path: strip leading/trailing slashes, reject `.`/`..`
/// segments, and collapse repeated slashes.
///
/// An empty input returns an empty string (root).
///
/// # Arguments
/// * `path` - The raw path string to normalize.
///
/// # Errors
/// Returns [`Error::InvalidPath`] if the path contains `.` or `..` segments.
pub fn normalize_path(path: &str) -> Result<String> {
    if path.is_empty() {
        return Ok(String::new());
    }

    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() {
            // skip empty segments (from leading/trailing/double slashes)
            continue;
        }
        if seg == ".." {
            return Err(Error::invalid_path(format!(
                "path segment '{}' is not allowed",
                seg,
            )));
        }
        if seg == "." {
            continue; // collapse current-directory markers
        }
        segments.push(seg);
    }

    if segments.is_empty() {
        // Only-slash paths like "///" mean root (empty string).
        // Paths with actual content that collapsed away (e.g. ".") are errors.
        if path.bytes().all(|b| b == b'/') {
            return Ok(String::new());
        }
        return Err(Error::invalid_path("path must not be empty"));
    }

    Ok(segments.join("/"))
}

/// Validate a git reference name.
///
/// Rejects colons (conflict with vost's `ref:path` syntax), spaces,
/// tabs, control characters, `..`, `@{`, trailing `.`, and `.lock` suffix
/// per git's `check-ref-format` rules.
///
/// # Arguments
/// * `name` - Reference name to validate (without `refs/heads/` prefix).
///
/// # Errors
/// Returns [`Error::InvalidRefName`] if the name violates any rule.
pub fn validate_ref_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_ref_name("ref name must not be empty"));
    }

    for ch in name.chars() {
        match ch {
            ':' | ' ' | '\t' | '\n' | '\r' | '\\' | '^' | '~' | '?' | '*' | '[' => {
                return Err(Error::invalid_ref_name(format!(
                    "ref name contains invalid character: {:?}",
                    ch,
                )));
            }
            _ => {}
        }
    }

    if name.contains("..") {
        return Err(Error::invalid_ref_name(
            "ref name must not contain '..'",
        ));
    }

    if name.contains("@{") {
        return Err(Error::invalid_ref_name(
            "ref name must not contain '@{'",
        ));
    }

    if name.ends_with('.') {
        return Err(Error::invalid_ref_name(
            "ref name must not end with '.'",
        ));
    }

    if name.ends_with(".lock") {
        return Err(Error::invalid_ref_name(
            "ref name must not end with '.lock'",
        ));
    }

    Ok(())
}

/// Returns `true` when the path refers to the root of the tree
/// (empty string or only slashes).
pub fn is_root_path(path: &str) -> bool {
    path.is_empty() || path.chars().all(|c| c == '/')
}

/// Parsed form of a copy/sync source specifier: `/./` pivot splitting and
/// trailing-slash "contents mode" (spec §4.2, §4.8 steps 1-2).
///
/// Same convention `Fs::copy_from_ref` uses for repo-to-repo sources: a bare
/// source contributes its own basename as a destination prefix; a trailing
/// `/` drops that prefix ("contents mode" — the source's own name is not
/// carried to the destination, only its children are); an interior `/./`
/// overrides the prefix with whatever follows it instead of the basename.
/// A pure leading `./` is not a pivot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// Path to open, on disk or in the tree, with the pivot marker removed.
    pub locator: String,
    /// Prefix to prepend to the source's relative paths at the destination.
    /// Empty in contents mode.
    pub dest_prefix: String,
    /// Whether a trailing `/` requested contents mode.
    pub contents_mode: bool,
}

/// Parse a copy/sync source specifier. See [`SourceSpec`].
pub fn parse_source_spec(source: &str) -> SourceSpec {
    let contents_mode = source.len() > 1 && source.ends_with('/');
    let stripped = if contents_mode {
        source[..source.len() - 1].trim_end_matches('/')
    } else {
        source
    };

    match stripped.find("/./") {
        Some(idx) => {
            let base = &stripped[..idx];
            let rest = &stripped[idx + 3..];
            SourceSpec {
                locator: format!("{}/{}", base, rest),
                dest_prefix: rest.to_string(),
                contents_mode,
            }
        }
        None => SourceSpec {
            locator: stripped.to_string(),
            dest_prefix: if contents_mode {
                String::new()
            } else {
                stripped.rsplit('/').next().unwrap_or(stripped).to_string()
            },
            contents_mode,
        },
    }
}

/// Join a destination prefix (e.g. the caller's `dest` argument) with a
/// source-derived prefix ([`SourceSpec::dest_prefix`]), treating either side
/// being empty as a no-op.
pub fn join_prefix(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => String::new(),
        (true, false) => b.to_string(),
        (false, true) => a.to_string(),
        (false, false) => format!("{}/{}", a, b),
    }
}

/// Format a commit message from an operation and optional user message.
///
/// If `message` is `Some`, it is used directly; otherwise `operation` becomes
/// the message.
pub fn format_commit_message(operation: &str, message: Option<&str>) -> String {
    match message {
        Some(msg) => msg.to_string(),
        None => operation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_empty() {
        assert_eq!(normalize_path("").unwrap(), "");
    }

    #[test]
    fn normalize_strips_slashes() {
        assert_eq!(normalize_path("/a/b/c/").unwrap(), "a/b/c");
    }

    #[test]
    fn normalize_collapses_double_slashes() {
        assert_eq!(normalize_path("a//b///c").unwrap(), "a/b/c");
    }

    #[test]
    fn normalize_collapses_dot() {
        assert_eq!(normalize_path("a/./b").unwrap(), "a/b");
        assert_eq!(normalize_path("./a/b").unwrap(), "a/b");
        assert_eq!(normalize_path("a/b/.").unwrap(), "a/b");
        assert_eq!(normalize_path("./a/./b/.").unwrap(), "a/b");
    }

    #[test]
    fn normalize_only_dots_is_error() {
        assert!(normalize_path(".").is_err());
        assert!(normalize_path("./.").is_err());
    }

    #[test]
    fn normalize_rejects_dotdot() {
        assert!(normalize_path("a/../b").is_err());
    }

    #[test]
    fn validate_ref_ok() {
        assert!(validate_ref_name("refs/heads/main").is_ok());
    }

    #[test]
    fn validate_ref_rejects_space() {
        assert!(validate_ref_name("refs/heads/my branch").is_err());
    }

    #[test]
    fn validate_ref_rejects_colon() {
        assert!(validate_ref_name("refs:heads").is_err());
    }

    #[test]
    fn validate_ref_rejects_dotdot() {
        assert!(validate_ref_name("refs/heads/a..b").is_err());
    }

    #[test]
    fn validate_ref_rejects_at_brace() {
        assert!(validate_ref_name("refs/heads/a@{0}").is_err());
    }

    #[test]
    fn validate_ref_rejects_trailing_dot() {
        assert!(validate_ref_name("refs/heads/a.").is_err());
    }

    #[test]
    fn validate_ref_rejects_dot_lock() {
        assert!(validate_ref_name("refs/heads/a.lock").is_err());
    }

    #[test]
    fn validate_ref_rejects_empty() {
        assert!(validate_ref_name("").is_err());
    }

    #[test]
    fn is_root_empty() {
        assert!(is_root_path(""));
    }

    #[test]
    fn is_root_slashes() {
        assert!(is_root_path("///"));
    }

    #[test]
    fn is_root_non_root() {
        assert!(!is_root_path("a"));
    }

    #[test]
    fn source_spec_plain_dir_adds_basename() {
        let spec = parse_source_spec("/src/lib");
        assert_eq!(spec.locator, "/src/lib");
        assert_eq!(spec.dest_prefix, "lib");
        assert!(!spec.contents_mode);
    }

    #[test]
    fn source_spec_trailing_slash_is_contents_mode() {
        let spec = parse_source_spec("/src/lib/");
        assert_eq!(spec.locator, "/src/lib");
        assert_eq!(spec.dest_prefix, "");
        assert!(spec.contents_mode);
    }

    #[test]
    fn source_spec_pivot_preserves_rest() {
        let spec = parse_source_spec("/src/./lib/u.py");
        assert_eq!(spec.locator, "/src/lib/u.py");
        assert_eq!(spec.dest_prefix, "lib/u.py");
        assert!(!spec.contents_mode);
    }

    #[test]
    fn source_spec_pivot_with_trailing_slash_is_contents_mode() {
        let spec = parse_source_spec("/src/./lib/u.py/");
        assert_eq!(spec.locator, "/src/lib/u.py");
        assert_eq!(spec.dest_prefix, "lib/u.py");
        assert!(spec.contents_mode);
    }

    #[test]
    fn source_spec_leading_dot_is_not_a_pivot() {
        let spec = parse_source_spec("./foo/bar");
        assert_eq!(spec.locator, "./foo/bar");
        assert_eq!(spec.dest_prefix, "bar");
        assert!(!spec.contents_mode);
    }

    #[test]
    fn join_prefix_handles_empty_sides() {
        assert_eq!(join_prefix("", ""), "");
        assert_eq!(join_prefix("dst", ""), "dst");
        assert_eq!(join_prefix("", "lib"), "lib");
        assert_eq!(join_prefix("dst", "lib"), "dst/lib");
    }
}
