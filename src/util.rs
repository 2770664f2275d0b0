//! Small helpers shared by the driver and providers.

use std::path::PathBuf;

/// Expand `$VAR` and `${VAR}` references using `lookup`.
///
/// Variables `lookup` does not know expand to the empty string.
pub fn expand_env_with<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => {
                    out.push_str(&lookup(&braced[..end]).unwrap_or_default());
                    rest = &braced[end + 1..];
                }
                None => {
                    // unterminated, keep verbatim
                    out.push_str(&rest[pos..]);
                    rest = "";
                }
            }
            continue;
        }

        let len = after
            .find(|c: char| !is_name_char(c))
            .unwrap_or(after.len());
        if len == 0 || !after.starts_with(is_name_start) {
            out.push('$');
            rest = after;
        } else {
            out.push_str(&lookup(&after[..len]).unwrap_or_default());
            rest = &after[len..];
        }
    }

    out.push_str(rest);
    out
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Find `binary` in the directories listed in `PATH`.
pub fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(key: &str) -> Option<String> {
        match key {
            "HOME" => Some("/home/core".to_string()),
            "DATA_DIR" => Some("/srv/data".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_plain_and_braced() {
        assert_eq!(expand_env_with("$HOME/src:/src", lookup), "/home/core/src:/src");
        assert_eq!(expand_env_with("${DATA_DIR}:/data", lookup), "/srv/data:/data");
        assert_eq!(expand_env_with("${HOME}${DATA_DIR}", lookup), "/home/core/srv/data");
    }

    #[test]
    fn test_unset_expands_to_empty() {
        assert_eq!(expand_env_with("$NOPE/x", lookup), "/x");
        assert_eq!(expand_env_with("${NOPE}/x", lookup), "/x");
    }

    #[test]
    fn test_literal_dollars_are_kept() {
        assert_eq!(expand_env_with("cost: $5", lookup), "cost: $5");
        assert_eq!(expand_env_with("trailing $", lookup), "trailing $");
        assert_eq!(expand_env_with("open ${HOME", lookup), "open ${HOME");
        assert_eq!(expand_env_with("no vars", lookup), "no vars");
    }

    #[test]
    fn test_find_in_path_missing_binary() {
        assert!(find_in_path("definitely-not-a-real-binary-name").is_none());
    }
}
