//! Cluster Job name sanitization.
//!
//! Same lowercase-and-collapse idiom as `task/naming.rs`'s `slugify`,
//! retargeted at the cluster spawner's exact rule: collapse every run of
//! non-alphanumeric characters to a single `-`, trim leading/trailing `-`.

pub fn sanitize(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut prev_dash = false;

    for c in lower.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}

/// Synthesize a cluster Job name from a configured prefix and a ticket id.
pub fn job_name(prefix: &str, id: &str) -> String {
    format!("{prefix}-{}", sanitize(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_known_name_shapes() {
        assert_eq!(sanitize("PROJ-123"), "proj-123");
        assert_eq!(sanitize("Test_With_Underscores"), "test-with-underscores");
        assert_eq!(sanitize("Multi---Dash"), "multi-dash");
        assert_eq!(sanitize("-leading-"), "leading");
        assert_eq!(sanitize("$pecial#!"), "pecial");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for s in ["PROJ-123", "Test_With_Underscores", "$pecial#!", ""] {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn job_name_prefixes_sanitized_id() {
        assert_eq!(job_name("recac", "PROJ-123"), "recac-proj-123");
    }
}
