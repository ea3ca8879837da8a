//! Credential scrubbing utilities for preventing sensitive data exposure.
//!
//! Commands sent to nodes can carry a personal access token. Anything that
//! ends up in a log line or a status string goes through here first.

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::AGENT_PAT_TOKEN_FLAG;

const REDACTED: &str = "<REDACTED>";

lazy_static! {
    /// Patterns for credentials that can show up in agent output
    static ref CREDENTIAL_PATTERNS: Vec<(Regex, &'static str)> = vec![
        // Token passed on a command line
        (Regex::new(r"(--dremio-pat-token)(\s+|=)(\S+)").unwrap(),
         "$1$2<REDACTED>"),

        // Bearer tokens
        (Regex::new(r"(?i)(bearer|authorization)\s*[:=]\s*(bearer\s+)?([A-Za-z0-9\-._~+/]+=*)").unwrap(),
         "$1=<REDACTED_TOKEN>"),

        // Generic tokens
        (Regex::new(r"(?i)(token|access[_-]?token|auth[_-]?token|pat)\s*[:=]\s*([A-Za-z0-9\-._~+/]{20,})").unwrap(),
         "$1=<REDACTED_TOKEN>"),

        // Generic passwords
        (Regex::new(r"(?i)(password|passwd|pwd)\s*[:=]\s*([^\s]+)").unwrap(),
         "$1=<REDACTED_PASSWORD>"),

        // Basic auth in URLs
        (Regex::new(r"(https?://)([^:/\s]+):([^@\s]+)@").unwrap(),
         "$1<REDACTED_USER>:<REDACTED_PASS>@"),
    ];
}

/// Scrub credentials from free text such as streamed agent output.
///
/// # Example
///
/// ```
/// use ddc::security::credential_scrubber::scrub_credentials;
///
/// let input = "Failed to connect with password=secret123";
/// assert_eq!(scrub_credentials(input), "Failed to connect with password=<REDACTED_PASSWORD>");
/// ```
pub fn scrub_credentials(input: &str) -> String {
    let mut result = input.to_string();
    for (pattern, replacement) in CREDENTIAL_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Scrub `input` and mask every literal occurrence of `secret`.
///
/// Catches a token the agent echoes without its flag, which the patterns
/// alone cannot recognise.
pub fn scrub_secret(input: &str, secret: Option<&str>) -> String {
    let scrubbed = scrub_credentials(input);
    match secret {
        Some(secret) if !secret.is_empty() => scrubbed.replace(secret, REDACTED),
        _ => scrubbed,
    }
}

/// Render an argument list for logging with the token value masked.
pub fn mask_command(args: &[String]) -> String {
    let mut masked = Vec::with_capacity(args.len());
    let mut hide_next = false;

    for arg in args {
        if hide_next {
            masked.push(REDACTED.to_string());
            hide_next = false;
        } else if arg == AGENT_PAT_TOKEN_FLAG {
            masked.push(arg.clone());
            hide_next = true;
        } else if arg.starts_with(&format!("{}=", AGENT_PAT_TOKEN_FLAG)) {
            masked.push(format!("{}={}", AGENT_PAT_TOKEN_FLAG, REDACTED));
        } else {
            masked.push(arg.clone());
        }
    }

    masked.join(" ")
}
