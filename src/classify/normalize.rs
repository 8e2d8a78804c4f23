// src/classify/normalize.rs

use std::sync::LazyLock;

use regex::Regex;

/// CSI / OSC terminal escape sequences emitted by colourful CLIs.
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
        .expect("ANSI escape pattern is valid")
});

/// Turn captured tool output into a one-line status message.
///
/// - terminal escape sequences are removed,
/// - every line loses any number of leading `error:` prefixes
///   (case-insensitive),
/// - blank lines are dropped and the rest are joined with single spaces.
pub fn normalize_message(text: &str) -> String {
    let plain = ANSI_ESCAPE.replace_all(text, "");
    plain
        .lines()
        .map(strip_error_prefix)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_error_prefix(line: &str) -> &str {
    let mut rest = line.trim();
    while let Some(head) = rest.get(..6) {
        if !head.eq_ignore_ascii_case("error:") {
            break;
        }
        rest = rest[6..].trim_start();
    }
    rest
}
