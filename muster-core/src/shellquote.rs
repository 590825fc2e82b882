//! POSIX single-quote shell escaping.
//!
//! Spawners compose shell commands by string concatenation (a container
//! name, an env var, an agent invocation); every value that reaches one
//! must go through `quote` first so a malicious ticket summary or repo URL
//! can't break out of the quoted argument.

/// Wrap `value` in single quotes, escaping any embedded single quote as
/// `'\''` (close quote, escaped literal quote, reopen quote).
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// Render `export NAME=<quoted value>` for one environment variable.
pub fn export_line(name: &str, value: &str) -> String {
    format!("export {}={}", name, quote(value))
}

/// Render one `export` line per entry, in iteration order, newline-joined.
pub fn export_block<'a, I>(vars: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    vars.into_iter()
        .map(|(k, v)| export_line(k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Configure a global git credential helper that reads the tracker token
/// from the environment at clone time, so a private `repoURL` authenticates
/// without the token ever appearing literally in the composed command.
pub fn git_credential_helper_line() -> String {
    format!(
        "git config --global credential.helper '!f() {{ echo username=x-access-token; echo password=${}; }}; f'",
        crate::model::ENV_TRACKER_TOKEN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_plain_value() {
        assert_eq!(quote("hello"), "'hello'");
    }

    #[test]
    fn quote_empty_value() {
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn injection_attempt_is_neutralized() {
        let malicious = "'; rm -rf / '";
        let quoted = quote(malicious);
        assert_eq!(quoted, "''\\''; rm -rf / '\\'''");
        assert!(!quoted.contains("''; rm -rf / ''"));
    }

    #[test]
    fn export_line_escapes_embedded_quote_and_shell_metacharacters() {
        let line = export_line("MAL", "'; echo PWNED; '");
        assert_eq!(line, "export MAL='\\''; echo PWNED; '\\''");
        assert!(!line.contains("MAL=''; echo PWNED; ''"));
    }

    #[test]
    fn export_block_joins_in_order() {
        let block = export_block([("A", "1"), ("B", "2")]);
        assert_eq!(block, "export A='1'\nexport B='2'");
    }

    #[test]
    fn credential_helper_line_reads_token_from_env_not_literal() {
        let line = git_credential_helper_line();
        assert!(line.starts_with("git config --global credential.helper"));
        assert!(line.contains("$RECAC_TRACKER_TOKEN"));
    }

    #[test]
    fn no_unescaped_quote_substring_survives() {
        for raw in ["'", "a'b", "''", "'; echo PWNED; '"] {
            let line = export_line("X", raw);
            let forbidden = format!("X={}", format!("'{}'", raw));
            if raw.contains('\'') {
                assert_ne!(line, format!("export {}", forbidden));
            }
        }
    }
}
