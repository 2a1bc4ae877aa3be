//! Text primitives shared by the requirement parsers.

use std::sync::LazyLock;

use regex::Regex;

/// `MATH 1`, `engl-1ah`, `CHEM1A`: two or more letters, an optional
/// hyphen/space joint, then a digit-led alphanumeric suffix.
static COURSE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z]{2,})\s*-?\s*(\d+[A-Za-z-]*)").expect("course token regex")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("number regex"));

static NUMBER_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*-\s*(\d+(?:\.\d+)?)").expect("number range regex")
});

static LEADING_OR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^or\b\s*").expect("leading or regex"));

static GE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(?:,|/| or )\s*").expect("ge separator regex"));

const NUMBER_WORDS: [&str; 10] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

/// Split `text` on the word `keyword` where it appears outside any `[...]`
/// or `(...)` nesting.
///
/// Segments are trimmed and empty ones dropped. Matching is
/// case-insensitive and requires a single space on each side of the word.
pub fn split_top_level(text: &str, keyword: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase().into_bytes();
    let sep = format!(" {} ", keyword.to_ascii_lowercase()).into_bytes();
    let bytes = text.as_bytes();

    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut brackets = 0usize;
    let mut parens = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'[' => brackets += 1,
            b']' => brackets = brackets.saturating_sub(1),
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            _ if brackets == 0 && parens == 0 && lower[i..].starts_with(&sep) => {
                push_trimmed(&mut parts, &text[start..i]);
                i += sep.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    push_trimmed(&mut parts, &text[start..]);
    parts
}

fn push_trimmed(parts: &mut Vec<String>, segment: &str) {
    let segment = segment.trim();
    if !segment.is_empty() {
        parts.push(segment.to_string());
    }
}

/// Remove one `[...]` pair when it encloses the whole string.
///
/// `[A] and [B]` is left alone: the first bracket closes before the end.
pub fn strip_outer_brackets(s: &str) -> &str {
    let s = s.trim();
    if !(s.starts_with('[') && s.ends_with(']')) {
        return s;
    }

    let mut depth = 0i32;
    for (i, ch) in s.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 && i != s.len() - 1 {
                    return s;
                }
            }
            _ => {}
        }
    }
    s[1..s.len() - 1].trim()
}

/// Whether `text` mentions at least one course.
pub fn has_course_token(text: &str) -> bool {
    COURSE_TOKEN.is_match(text)
}

/// Every course mentioned in `text`, normalized to `"DEPT NUM"`.
pub fn course_tokens(text: &str) -> Vec<String> {
    COURSE_TOKEN
        .captures_iter(text)
        .map(|caps| format!("{} {}", caps[1].to_uppercase(), &caps[2]))
        .collect()
}

/// Collapse whitespace runs (including non-breaking spaces) and trim.
pub fn safe_text(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `"3"` or `"three"` to an integer.
pub fn word_or_int(word: &str) -> Option<u32> {
    let word = word.trim().to_lowercase();
    if !word.is_empty() && word.chars().all(|c| c.is_ascii_digit()) {
        return word.parse().ok();
    }
    NUMBER_WORDS
        .iter()
        .position(|w| *w == word)
        .map(|i| i as u32 + 1)
}

/// First decimal number in `text`.
pub fn parse_number(text: &str) -> Option<f64> {
    NUMBER
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// `"20 - 24 units"` => `(20, 24)`, `"18"` => `(18, 18)`.
pub fn parse_units_range(text: &str) -> (Option<f64>, Option<f64>) {
    let text = safe_text(text);
    if let Some(caps) = NUMBER_RANGE.captures(&text) {
        return (caps[1].parse().ok(), caps[2].parse().ok());
    }
    let single = parse_number(&text);
    (single, single)
}

/// Clean the code cell of a course row, dropping a leading `or`.
pub fn normalize_course_code(raw: &str) -> String {
    let text = safe_text(raw);
    safe_text(&LEADING_OR.replace(&text, ""))
}

/// Whether a course row continues the previous choice (`or MATH 2`).
pub fn starts_with_or(raw: &str) -> bool {
    LEADING_OR.is_match(&safe_text(raw))
}

/// `"CSU-GE, IGETC / Local or AA"` => four patterns.
pub fn split_ge_patterns(text: &str) -> Vec<String> {
    GE_SEPARATOR
        .split(text)
        .map(safe_text)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Render a unit count without a trailing `.0`.
pub fn format_units(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
