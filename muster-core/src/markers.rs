//! Ticket-description marker extraction: the `Repo:` URL and the optional
//! `REQUIRED FEATURES:` / `ACCEPTANCE CRITERIA:` bullet block.
//!
//! The bullet-block scan is hand-parsed line-by-line rather than reaching
//! for a parsing crate. The repo-URL marker is the one place a regex earns
//! its keep — it needs to be a process-wide swappable constant, which is
//! the standard `once_cell::Lazy` + `regex::Regex` idiom.

use std::sync::RwLock;

use once_cell::sync::Lazy;
use regex::Regex;

fn default_repo_regex() -> Regex {
    Regex::new(r"(?i)repo:\s*(\S+)").expect("static repo regex is valid")
}

static REPO_REGEX: Lazy<RwLock<Regex>> = Lazy::new(|| RwLock::new(default_repo_regex()));

/// Swap the process-wide repo-extraction regex. Returns a guard that
/// restores the previous regex when dropped — tests that need a different
/// marker shape must hold the guard for the duration of the test.
pub struct RegexGuard {
    previous: Option<Regex>,
}

impl Drop for RegexGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.previous.take() {
            *REPO_REGEX.write().expect("repo regex lock poisoned") = prev;
        }
    }
}

pub fn swap_repo_regex(new_regex: Regex) -> RegexGuard {
    let mut guard = REPO_REGEX.write().expect("repo regex lock poisoned");
    let previous = std::mem::replace(&mut *guard, new_regex);
    RegexGuard {
        previous: Some(previous),
    }
}

/// Extract the repository URL from a ticket description, stripping a
/// trailing `.git`. Returns `""` when no `Repo:` marker is present.
pub fn extract_repo_url(description: &str) -> String {
    let re = REPO_REGEX.read().expect("repo regex lock poisoned");
    match re.captures(description) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim_end_matches(".git").to_string())
            .unwrap_or_default(),
        None => String::new(),
    }
}

const HEADERS: [&str; 2] = ["REQUIRED FEATURES:", "ACCEPTANCE CRITERIA:"];

/// Extract the bullet list following a `REQUIRED FEATURES:` or
/// `ACCEPTANCE CRITERIA:` header, if present. The block ends at the first
/// blank line or a line that looks like a new heading (ends with `:` and
/// has no leading bullet marker).
pub fn extract_feature_bullets(description: &str) -> Vec<String> {
    let lines: Vec<&str> = description.lines().collect();
    let Some(start) = lines.iter().position(|line| {
        let trimmed = line.trim();
        HEADERS.iter().any(|h| trimmed.eq_ignore_ascii_case(h))
    }) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for line in &lines[start + 1..] {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(rest) = trimmed
            .strip_prefix('-')
            .or_else(|| trimmed.strip_prefix('*'))
        {
            out.push(rest.trim().to_string());
        } else {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_extraction_strips_git_suffix() {
        let desc = "Please build.\nRepo: https://example.com/org/repo.git\nThanks.";
        assert_eq!(extract_repo_url(desc), "https://example.com/org/repo");
    }

    #[test]
    fn repo_extraction_missing_marker_returns_empty() {
        assert_eq!(extract_repo_url("no repo"), "");
    }

    #[test]
    fn repo_extraction_case_insensitive_marker() {
        let desc = "repo: https://example.com/org/repo";
        assert_eq!(extract_repo_url(desc), "https://example.com/org/repo");
    }

    #[test]
    fn repo_extraction_without_git_suffix_unchanged() {
        let desc = "Repo: https://example.com/org/repo";
        assert_eq!(extract_repo_url(desc), "https://example.com/org/repo");
    }

    #[test]
    fn feature_bullets_extracted_until_blank_line() {
        let desc = "Intro text.\n\nREQUIRED FEATURES:\n- one\n- two\n\nmore text";
        assert_eq!(extract_feature_bullets(desc), vec!["one", "two"]);
    }

    #[test]
    fn feature_bullets_support_star_marker() {
        let desc = "ACCEPTANCE CRITERIA:\n* a\n* b";
        assert_eq!(extract_feature_bullets(desc), vec!["a", "b"]);
    }

    #[test]
    fn feature_bullets_absent_header_yields_empty() {
        assert!(extract_feature_bullets("just some text").is_empty());
    }

    #[test]
    fn feature_bullets_stop_at_new_heading() {
        let desc = "REQUIRED FEATURES:\n- one\nSOME OTHER HEADING:\n- two";
        assert_eq!(extract_feature_bullets(desc), vec!["one"]);
    }

    #[test]
    fn swap_repo_regex_is_restored_on_drop() {
        let before = extract_repo_url("Repo: https://example.com/a");
        assert_eq!(before, "https://example.com/a");
        {
            let _guard = swap_repo_regex(Regex::new(r"(?i)source:\s*(\S+)").unwrap());
            assert_eq!(extract_repo_url("Repo: https://example.com/a"), "");
            assert_eq!(
                extract_repo_url("Source: https://example.com/b"),
                "https://example.com/b"
            );
        }
        assert_eq!(
            extract_repo_url("Repo: https://example.com/a"),
            "https://example.com/a"
        );
    }
}
