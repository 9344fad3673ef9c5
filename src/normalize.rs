use std::sync::LazyLock;

use regex::Regex;

static TIMING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}:\d{2}:\d{2},\d{3} --> \d{2}:\d{2}:\d{2},\d{3}").unwrap());

static INDEX_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\s*$").unwrap());

/// Flatten raw subtitle text (SRT or one-cue-per-line) into a single line of prose.
///
/// Timing lines and purely numeric sequence lines are removed and whitespace
/// runs collapse to one space. Removing a fragment can splice together text that
/// matches again, so passes repeat until nothing changes; every pass only
/// removes characters, which bounds the loop.
pub fn normalize(raw: &str) -> String {
    let mut current = pass(raw);
    loop {
        let next = pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn pass(text: &str) -> String {
    let text = TIMING.replace_all(text, "");
    let text = INDEX_LINE.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
