//! Path sanitization, ported from oxidicom's `sanitize.rs`.
//!
//! Applied to the project name before it becomes a directory component
//! under `base_dir`, since the project name arrives as a CLI argument.

use regex::Regex;
use std::sync::LazyLock;

/// Replace disallowed characters with "_".
pub fn sanitize_path<S: AsRef<str>>(s: S) -> String {
    let s_nonull = s.as_ref().replace('\0', "");
    VALID_CHARS_RE.replace_all(&s_nonull, "_").to_string()
}

static VALID_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^A-Za-z0-9\.\-]+"#).unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_path_separators() {
        assert_eq!(sanitize_path("../etc/passwd"), ".._etc_passwd");
    }

    #[test]
    fn strips_nul_bytes() {
        assert_eq!(sanitize_path("study\01"), "study1");
    }

    #[test]
    fn leaves_safe_names_untouched() {
        assert_eq!(sanitize_path("my-project.v2"), "my-project.v2");
    }
}
