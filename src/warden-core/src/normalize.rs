//! Lexical path normalization shared by the path validators.
//!
//! Nothing here touches the filesystem. Untrusted input is percent-decoded
//! repeatedly until it stops changing, so `%252e%252e` can not survive as a
//! disguised `..`, and traversal checks look at both the raw and the decoded
//! text.
//!
//! # Examples
//!
//! ```rust,ignore
//! use warden_core::normalize::{has_traversal, normalize};
//!
//! assert_eq!(normalize("/a/b/../c//d"), "/a/c/d");
//! assert!(has_traversal("/static/%2e%2e/secret"));
//! ```

use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Characters that have no business in a file name we hand to the OS.
pub const FORBIDDEN_CHARS: &[char] = &['<', '>', '"', '\'', '|', '?', '*'];

/// Encoded spellings of `..` that do not decode to valid UTF-8 or that
/// attackers commonly layer.
const ENCODED_TRAVERSALS: &[&str] = &["%2e%2e", "%c0%ae", "%e0%80%ae", "%252e", "%5c%2e%2e"];

/// Result of decoding a value until it reaches a fixed point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPath {
    pub value: String,
    /// Number of decode passes that changed the value.
    pub rounds: u32,
    /// A pass produced invalid UTF-8; `value` holds the last good text.
    pub failed: bool,
}

/// Percent-decode until the value stops changing or a pass fails.
///
/// Every pass that changes the text makes it strictly shorter, so the loop is
/// bounded by the input length.
pub fn decode_fully(input: &str) -> DecodedPath {
    let mut value = input.to_string();
    let mut rounds = 0;
    let mut failed = false;

    while value.contains('%') {
        match urlencoding::decode(&value) {
            Ok(decoded) if decoded == value => break,
            Ok(decoded) => {
                value = decoded.into_owned();
                rounds += 1;
            }
            Err(_) => {
                failed = true;
                break;
            }
        }
    }

    if rounds > 1 {
        debug!(rounds, "Path needed multiple decode passes");
    }

    DecodedPath {
        value,
        rounds,
        failed,
    }
}

/// Normalize an untrusted path string.
///
/// Decodes fully, turns `\` into `/`, collapses repeated separators and
/// resolves `.` and `..`. A `..` that would climb above the root of an
/// absolute path is dropped; leading `..` of a relative path are kept so
/// callers can still see the escape. Idempotent.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let decoded = decode_fully(path).value.replace('\\', "/");
    resolve_segments(&decoded, decoded.starts_with('/'), false)
}

/// Check for `..` segments in the raw text, in the fully decoded text and in
/// the common encoded spellings.
pub fn has_traversal(path: &str) -> bool {
    if has_parent_segment(path) {
        return true;
    }

    let decoded = decode_fully(path);
    if has_parent_segment(&decoded.value) {
        return true;
    }

    let lower = path.to_ascii_lowercase();
    ENCODED_TRAVERSALS.iter().any(|needle| lower.contains(needle))
}

/// Traversal that only appears once the text is decoded.
pub fn has_encoded_traversal(path: &str) -> bool {
    if !path.contains('%') {
        return false;
    }
    let decoded = decode_fully(path);
    if decoded.rounds > 0 && has_parent_segment(&decoded.value) {
        return true;
    }
    let lower = path.to_ascii_lowercase();
    ENCODED_TRAVERSALS.iter().any(|needle| lower.contains(needle))
}

/// Whether `value` holds at least one `%XX` escape.
pub fn has_percent_encoding(value: &str) -> bool {
    value
        .as_bytes()
        .windows(3)
        .any(|w| w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit())
}

fn has_parent_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

/// First NUL byte or [`FORBIDDEN_CHARS`] member in `value`.
pub fn forbidden_char(value: &str) -> Option<char> {
    value
        .chars()
        .find(|c| *c == '\0' || FORBIDDEN_CHARS.contains(c))
}

/// Forbidden characters, doubled separators or runs of three or more dots.
pub fn has_suspicious_sequences(value: &str) -> bool {
    forbidden_char(value).is_some() || value.contains("//") || value.contains("...")
}

/// Turn an untrusted URL path into a rooted path that can not climb out of
/// the serving root.
pub fn sanitize_static_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let decoded = decode_fully(path).value.replace('\\', "/");
    let resolved = resolve_segments(&decoded, true, true);
    if resolved.starts_with('/') {
        resolved
    } else {
        format!("/{resolved}")
    }
}

/// Map an untrusted temp path into `temp_root`.
///
/// `./tmp/x` and `tmp/x` land under `temp_root`; anything else is resolved
/// against the current directory and normalized lexically.
pub fn sanitize_temp_path(path: &str, temp_root: &Path) -> PathBuf {
    if path.is_empty() {
        return PathBuf::new();
    }

    let decoded = decode_fully(path).value.replace('\\', "/");
    let relative = decoded
        .strip_prefix("./tmp/")
        .or_else(|| decoded.strip_prefix("tmp/"));

    match relative {
        Some(rest) => {
            let inside = resolve_segments(rest, true, true);
            temp_root.join(inside.trim_start_matches('/'))
        }
        None => absolutize(Path::new(&decoded)),
    }
}

/// Component-wise containment. `/tmpfoo` is not inside `/tmp`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(root))
}

/// Resolve `.` and `..` on a filesystem path without touching the disk.
///
/// `..` never climbs above the root of an absolute path.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                } else if !path.has_root() {
                    normalized.push("..");
                }
            }
            Component::CurDir => {}
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            other => normalized.push(other),
        }
    }

    normalized
}

/// Make `path` absolute against the current directory, then normalize it.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize_path(path);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize_path(&cwd.join(path)),
        Err(_) => normalize_path(&Path::new("/").join(path)),
    }
}

/// Shared segment resolver. `clamp_relative` also drops leading `..` of a
/// relative path.
fn resolve_segments(path: &str, absolute: bool, clamp_relative: bool) -> String {
    let mut stack: Vec<&str> = Vec::new();
    let mut escapes = 0usize;

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() && !absolute && !clamp_relative {
                    escapes += 1;
                }
            }
            other => stack.push(other),
        }
    }

    let mut parts: Vec<&str> = std::iter::repeat_n("..", escapes).collect();
    parts.extend(stack);
    let joined = parts.join("/");

    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fully_layers() {
        let decoded = decode_fully("%252e%252e%252f");
        assert_eq!(decoded.value, "../");
        assert_eq!(decoded.rounds, 2);
        assert!(!decoded.failed);
    }

    #[test]
    fn test_decode_fully_stops_on_invalid_utf8() {
        let decoded = decode_fully("%c0%ae%c0%ae/");
        assert!(decoded.failed);
        assert_eq!(decoded.value, "%c0%ae%c0%ae/");
    }

    #[test]
    fn test_decode_fully_plain_text() {
        let decoded = decode_fully("/public/app.js");
        assert_eq!(decoded.rounds, 0);
        assert_eq!(decoded.value, "/public/app.js");
    }

    #[test]
    fn test_normalize_resolves_dots() {
        assert_eq!(normalize("/a/b/../c/./d"), "/a/c/d");
        assert_eq!(normalize("/a//b///c/"), "/a/b/c");
        assert_eq!(normalize("a\\b\\..\\c"), "a/c");
    }

    #[test]
    fn test_normalize_clamps_absolute_root() {
        assert_eq!(normalize("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize("/.."), "/");
    }

    #[test]
    fn test_normalize_keeps_relative_escape() {
        assert_eq!(normalize("../x"), "../x");
        assert_eq!(normalize("a/../../x"), "../x");
        assert_eq!(normalize("./"), ".");
    }

    #[test]
    fn test_normalize_decodes_before_resolving() {
        assert_eq!(normalize("/tmp/%2e%2e/etc"), "/etc");
        assert_eq!(normalize("/tmp/%252e%252e/etc"), "/etc");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "",
            ".",
            "/",
            "../../a",
            "/a/b/../../..",
            "a//b\\c/./d/..",
            "%2e%2e/%2e%2e/x",
            "%25252e",
            "x%/41",
            "%c0%ae/../a",
            "/tmp/ space /./x",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_has_traversal_variants() {
        assert!(has_traversal("../etc/passwd"));
        assert!(has_traversal("a\\..\\b"));
        assert!(has_traversal("/static/%2e%2e/secret"));
        assert!(has_traversal("/static/%2E%2E%2Fsecret"));
        assert!(has_traversal("%252e%252e/x"));
        assert!(has_traversal("%c0%ae%c0%ae/x"));
        assert!(!has_traversal("/public/app.min.js"));
        assert!(!has_traversal("/a..b/c"));
    }

    #[test]
    fn test_encoded_traversal_only() {
        assert!(has_encoded_traversal("/tmp/%2e%2e/etc"));
        assert!(has_encoded_traversal("/tmp/%252e%252e/etc"));
        assert!(!has_encoded_traversal("/tmp/../tmp/x"));
        assert!(!has_encoded_traversal("/tmp/a%20b"));
    }

    #[test]
    fn test_percent_encoding_detection() {
        assert!(has_percent_encoding("/a%2ejs"));
        assert!(!has_percent_encoding("/100%"));
        assert!(!has_percent_encoding("/a%zz"));
    }

    #[test]
    fn test_forbidden_char() {
        assert_eq!(forbidden_char("/tmp/a<b"), Some('<'));
        assert_eq!(forbidden_char("/tmp/a\0b"), Some('\0'));
        assert_eq!(forbidden_char("/tmp/plain.txt"), None);
    }

    #[test]
    fn test_suspicious_sequences() {
        assert!(has_suspicious_sequences("/tmp//x"));
        assert!(has_suspicious_sequences("/tmp/.../x"));
        assert!(has_suspicious_sequences("/tmp/x|y"));
        assert!(!has_suspicious_sequences("/tmp/x.y"));
    }

    #[test]
    fn test_sanitize_static_path() {
        assert_eq!(sanitize_static_path("/public/assets/../styles/main.css"), "/public/styles/main.css");
        assert_eq!(sanitize_static_path("/public/assets/./app.js"), "/public/assets/app.js");
        assert_eq!(sanitize_static_path("/public/assets/app%2ejs"), "/public/assets/app.js");
        assert_eq!(sanitize_static_path("/public/images/logo%20icon.png"), "/public/images/logo icon.png");
        assert_eq!(sanitize_static_path("../../../etc/passwd"), "/etc/passwd");
        assert_eq!(sanitize_static_path("..\\..\\windows\\system32"), "/windows/system32");
    }

    #[test]
    fn test_sanitize_temp_path() {
        let root = Path::new("/tmp");
        assert_eq!(sanitize_temp_path("./tmp/file.txt", root), PathBuf::from("/tmp/file.txt"));
        assert_eq!(sanitize_temp_path("tmp/../../x", root), PathBuf::from("/tmp/x"));
        assert_eq!(sanitize_temp_path("/tmp/../tmp/safe.txt", root), PathBuf::from("/tmp/safe.txt"));
    }

    #[test]
    fn test_is_within_is_component_wise() {
        assert!(is_within(Path::new("/tmp/a/b"), Path::new("/tmp")));
        assert!(is_within(Path::new("/tmp"), Path::new("/tmp")));
        assert!(!is_within(Path::new("/tmpfoo/a"), Path::new("/tmp")));
        assert!(!is_within(Path::new("/tmp/../etc"), Path::new("/tmp")));
    }

    #[test]
    fn test_normalize_path_clamps_at_root() {
        assert_eq!(normalize_path(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_path(Path::new("../../x/..")), PathBuf::from("../.."));
    }
}
