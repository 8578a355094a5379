use std::path::{Component, Path};

/// Lexically normalise a directive path: `\` becomes `/`, `.` segments are
/// dropped, `..` pops the previous segment and surrounding slashes are
/// trimmed. The filesystem is never consulted.
///
/// `config/../asm/rock_neo/nonmatchings/cd` normalises to
/// `asm/rock_neo/nonmatchings/cd`.
#[must_use]
pub fn normalize_directive_path(raw: &str) -> String {
    let value = raw.trim().replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in value.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// True when two directive paths name the same location after
/// normalisation.
#[must_use]
pub fn directive_paths_match(left: &str, right: &str) -> bool {
    normalize_directive_path(left) == normalize_directive_path(right)
}

/// `path` relative to `root`, spelled with `/` separators. Falls back to the
/// full path when `path` is outside `root`.
#[must_use]
pub fn slash_relative(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut out = String::new();
    for component in relative.components() {
        if let Component::Normal(name) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&name.to_string_lossy());
        }
    }
    out
}

/// Last `/`-separated segment of a directive path.
#[must_use]
pub fn last_segment(raw: &str) -> Option<&str> {
    raw.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
}
