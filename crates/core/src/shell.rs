//! Shell quoting and address validation.
//!
//! Remote commands travel through `ssh` as a single string that the remote
//! login shell parses, so every path or free-text command embedded in one
//! must be quoted with [`shell_escape`].

use crate::error::CoreError;

/// Maximum length of a host address (DNS names are capped at 253).
const MAX_HOST_LEN: usize = 253;

/// Escape a string for safe use in a shell command.
///
/// Values made only of safe characters are returned bare; anything else is
/// wrapped in single quotes with embedded quotes written as `'\''`.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '%' | ':' | '=' | '@')
    }) {
        return s.to_string();
    }
    let escaped = s.replace('\'', "'\\''");
    format!("'{escaped}'")
}

/// Wrap `command` so it runs through `sudo sh -c`, preserving pipes, `&&`
/// and redirections inside the privileged shell.
pub fn privileged(command: &str) -> String {
    format!("sudo sh -c {}", shell_escape(command))
}

/// Validate a host address from configuration.
///
/// Rules:
/// - Must not be empty or exceed `MAX_HOST_LEN` characters.
/// - May contain alphanumerics, `.`, `-`, `_`, `:` (IPv6), and a single
///   `@` separating an optional login user.
pub fn validate_host(host: &str) -> Result<(), CoreError> {
    if host.is_empty() {
        return Err(CoreError::Validation(
            "Host address must not be empty".to_string(),
        ));
    }
    if host.len() > MAX_HOST_LEN {
        return Err(CoreError::Validation(format!(
            "Host address must not exceed {MAX_HOST_LEN} characters"
        )));
    }
    if host.matches('@').count() > 1 {
        return Err(CoreError::Validation(format!(
            "Host address '{host}' contains more than one '@'"
        )));
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '@'))
    {
        return Err(CoreError::Validation(format!(
            "Host address '{host}' contains characters outside [A-Za-z0-9.-_:@]"
        )));
    }
    if host.starts_with('-') {
        return Err(CoreError::Validation(format!(
            "Host address '{host}' must not start with '-'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_values_are_left_bare() {
        assert_eq!(shell_escape("/usr/src/app/api"), "/usr/src/app/api");
        assert_eq!(shell_escape("GOOS=linux"), "GOOS=linux");
    }

    #[test]
    fn unsafe_values_are_quoted() {
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("a b"), "'a b'");
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
        assert_eq!(shell_escape("$(evil)"), "'$(evil)'");
    }

    #[test]
    fn privileged_wraps_whole_command() {
        assert_eq!(
            privileged("cd /tmp/ && docker build -t goapp ."),
            "sudo sh -c 'cd /tmp/ && docker build -t goapp .'"
        );
        assert_eq!(privileged("uptime"), "sudo sh -c uptime");
    }

    #[test]
    fn valid_hosts() {
        assert!(validate_host("35.203.148.19").is_ok());
        assert!(validate_host("web-1.example.com").is_ok());
        assert!(validate_host("deploy@web-1").is_ok());
        assert!(validate_host("::1").is_ok());
    }

    #[test]
    fn invalid_hosts() {
        assert!(validate_host("").is_err());
        assert!(validate_host("host; rm -rf /").is_err());
        assert!(validate_host("a b").is_err());
        assert!(validate_host("-oProxyCommand=x").is_err());
        assert!(validate_host("a@b@c").is_err());
        assert!(validate_host(&"a".repeat(300)).is_err());
    }
}
