//! Title normalization shared by the media container and the matcher.
//!
//! Both sides of a lookup must go through the same functions here: the
//! container indexes catalog titles with [`family_key`] and the matcher
//! looks parsed file titles up with it.
//!
//! Levels, in order:
//! 1. Unicode NFKC + case folding
//! 2. Bracketed release-tag stripping (`[Group]`, `{CRC}`, `(1080p)`)
//! 3. Character transliteration
//! 4. Roman numeral conversion
//! 5. Ordinal conversion
//! 6. Season keyword normalization
//! 7. Stop word removal
//! 8. Punctuation erasure
//! 9. Whitespace collapse
//!
//! [`family_key`] additionally drops trailing season/part markers between
//! levels 5 and 6, so every entry of a sequel family shares one key.

use unicode_normalization::UnicodeNormalization;

/// Apply the full normalization pipeline.
pub fn normalize(s: &str) -> String {
    finish(&prepare(s))
}

/// Normalize a title and drop trailing season/part markers.
///
/// `"Show"`, `"Show Part 2"` and `"Show 2nd Season"` all map to `"show"`.
pub fn family_key(s: &str) -> String {
    finish(&strip_sequel_markers(&prepare(s)))
}

/// Levels 1–5.
fn prepare(s: &str) -> String {
    let s = fold(s);
    let s = strip_release_tags(&s);
    let s = transliterate(&s);
    let s = convert_roman_numerals(&s);
    convert_ordinals(&s)
}

/// Levels 6–9.
fn finish(s: &str) -> String {
    let s = normalize_season_keywords(s);
    let s = remove_stop_words(&s);
    let s = erase_punctuation(&s);
    collapse_whitespace(&s)
}

// ── Level 1: Unicode NFKC + case folding ──────────────────────────────

fn fold(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}

// ── Level 2: Release tags ─────────────────────────────────────────────

/// Tags that never belong to a title when found in parentheses.
const RELEASE_TAGS: &[&str] = &[
    "tv", "ova", "ona", "oad", "oav", "special", "specials", "batch", "complete", "uncensored",
    "hevc", "avc", "x264", "x265", "h264", "h265", "h.264", "h.265", "av1", "10bit", "10-bit",
    "8bit", "hi10p", "bd", "bdrip", "bluray", "blu-ray", "web", "web-dl", "webrip", "dual audio",
    "dual-audio", "multi-sub", "multisub", "flac", "aac", "opus", "4k", "uhd", "hdr",
];

/// Remove `[...]` and `{...}` groups, and `(...)` groups holding release tags.
///
/// Meaningful parenthesized text such as `(Director's Cut)` is kept.
fn strip_release_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        let close = match c {
            '[' => ']',
            '{' => '}',
            '(' => ')',
            _ => {
                out.push(c);
                continue;
            }
        };

        let mut content = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == close {
                closed = true;
                break;
            }
            content.push(inner);
        }

        if !closed {
            out.push(c);
            out.push_str(&content);
        } else if c == '(' && !is_release_tag(&content) {
            out.push('(');
            out.push_str(&content);
            out.push(')');
        } else {
            out.push(' ');
        }
    }

    out
}

fn is_release_tag(content: &str) -> bool {
    let content = content.trim();
    if content.is_empty() || RELEASE_TAGS.contains(&content) {
        return true;
    }
    content
        .split([' ', ',', '_'])
        .filter(|part| !part.is_empty())
        .all(|part| RELEASE_TAGS.contains(&part) || is_resolution(part) || is_number(part))
}

fn is_resolution(s: &str) -> bool {
    s.strip_suffix('p').is_some_and(is_number)
        || s.split_once('x')
            .is_some_and(|(w, h)| is_number(w) && is_number(h))
}

// ── Level 3: Character transliteration ────────────────────────────────

fn transliterate(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '@' => out.push('a'),
            // "danganr0npa"
            '0' if i > 0
                && chars[i - 1].is_alphabetic()
                && chars.get(i + 1).is_some_and(|n| n.is_alphabetic()) =>
            {
                out.push('o')
            }
            '\u{00D7}' | '\u{2715}' | '\u{2716}' => out.push('x'),
            '\u{2018}' | '\u{2019}' | '\u{02BC}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00E6}' => out.push_str("ae"),
            '\u{0153}' => out.push_str("oe"),
            '\u{00F0}' => out.push('d'),
            '\u{00FE}' => out.push_str("th"),
            '\u{00DF}' => out.push_str("ss"),
            c => out.push(c),
        }
    }

    out
}

// ── Level 4: Roman numerals ───────────────────────────────────────────

const ROMAN_NUMERALS: &[(&str, u32)] = &[
    ("ii", 2),
    ("iii", 3),
    ("iv", 4),
    ("v", 5),
    ("vi", 6),
    ("vii", 7),
    ("viii", 8),
    ("ix", 9),
    ("x", 10),
    ("xi", 11),
    ("xii", 12),
    ("xiii", 13),
];

/// Convert standalone roman numerals; `"hawaii"` stays intact.
fn convert_roman_numerals(s: &str) -> String {
    map_words(s, |word| {
        let (base, suffix) = split_trailing_punct(word);
        ROMAN_NUMERALS
            .iter()
            .find(|(roman, _)| *roman == base)
            .map(|(_, value)| format!("{value}{suffix}"))
    })
}

fn split_trailing_punct(s: &str) -> (&str, &str) {
    let end = s.trim_end_matches(|c: char| c.is_ascii_punctuation()).len();
    s.split_at(end)
}

// ── Level 5: Ordinals ─────────────────────────────────────────────────

fn convert_ordinals(s: &str) -> String {
    map_words(s, |word| {
        ["st", "nd", "rd", "th"]
            .iter()
            .find_map(|suffix| word.strip_suffix(suffix))
            .filter(|digits| is_number(digits))
            .map(str::to_string)
    })
}

// ── Sequel markers (family key only) ──────────────────────────────────

const MARKER_KEYWORDS: &[&str] = &["season", "part", "cour"];

/// Drop trailing `season N`, `N season`, `part N`, `cour N` and `sN` markers.
fn strip_sequel_markers(s: &str) -> String {
    let mut words: Vec<&str> = s.split_whitespace().collect();

    loop {
        while words.last().is_some_and(|w| bare(w).is_empty()) {
            words.pop();
        }

        let n = words.len();
        let last = words.last().map(|w| bare(w));
        let prev = n.checked_sub(2).map(|i| bare(words[i]));

        let cut = match (prev, last) {
            (Some(p), Some(l)) if MARKER_KEYWORDS.contains(&p) && is_number(l) => 2,
            (Some(p), Some(l)) if is_number(p) && MARKER_KEYWORDS.contains(&l) => 2,
            (_, Some(l)) if is_glued_marker(l) => 1,
            _ => break,
        };

        if !words[..n - cut].iter().any(|w| !bare(w).is_empty()) {
            break;
        }
        words.truncate(n - cut);
    }

    words.join(" ")
}

/// `s2`, `season2`, `part2`.
fn is_glued_marker(word: &str) -> bool {
    ["s", "season", "part", "cour"]
        .iter()
        .any(|prefix| word.strip_prefix(prefix).is_some_and(is_number))
}

// ── Level 6: Season keywords ──────────────────────────────────────────

/// `"season 2"`, `"season2"`, `"cour 2"`, `"s2"` → `"2"`.
fn normalize_season_keywords(s: &str) -> String {
    let words: Vec<&str> = s.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(words.len());
    let mut i = 0;

    while i < words.len() {
        let word = words[i];

        if matches!(word, "season" | "cour" | "series") {
            if let Some(next) = words.get(i + 1).filter(|n| is_number(n)) {
                out.push(next.to_string());
                i += 2;
                continue;
            }
        }

        let glued = ["season", "cour", "series", "s"]
            .iter()
            .find_map(|prefix| word.strip_prefix(prefix).filter(|d| is_number(d)));
        match glued {
            Some(digits) => out.push(digits.to_string()),
            None => out.push(word.to_string()),
        }
        i += 1;
    }

    out.join(" ")
}

// ── Level 7: Stop words ───────────────────────────────────────────────

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "episode", "ep", "ep.", "tv", "ova", "ona", "season", "cour", "part",
];

fn remove_stop_words(s: &str) -> String {
    s.split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .map(|word| match word {
            "&" => "and",
            "oad" | "oav" => "ova",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Level 8: Punctuation ──────────────────────────────────────────────

fn erase_punctuation(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

// ── Level 9: Whitespace ───────────────────────────────────────────────

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Helpers ───────────────────────────────────────────────────────────

fn map_words(s: &str, f: impl Fn(&str) -> Option<String>) -> String {
    s.split_whitespace()
        .map(|word| f(word).unwrap_or_else(|| word.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn bare(word: &str) -> &str {
    word.trim_matches(|c: char| c.is_ascii_punctuation())
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fullwidth_and_case() {
        assert_eq!(normalize("ＦＵＬＬＷＩＤＴＨ"), "fullwidth");
        assert_eq!(normalize("Sousou no FRIEREN"), "sousou no frieren");
    }

    #[test]
    fn strips_bracketed_release_tags() {
        assert_eq!(
            normalize("[SubsPlease] 86 - Eighty Six (1080p) [30072859]"),
            "86 eighty six"
        );
        assert_eq!(normalize("Show {ABCD1234} (BD 1080p HEVC)"), "show");
        assert_eq!(normalize("Show (2024)"), "show");
    }

    #[test]
    fn keeps_meaningful_parens() {
        assert_eq!(normalize("Title (Director's Cut)"), "title directors cut");
    }

    #[test]
    fn unclosed_bracket_is_kept() {
        assert_eq!(normalize("Show [Batch"), "show batch");
    }

    #[test]
    fn transliteration() {
        assert_eq!(normalize("Hunter\u{00D7}Hunter"), "hunterxhunter");
        assert_eq!(normalize("Danganr0npa"), "danganronpa");
        assert_eq!(normalize("Bleach 1000"), "bleach 1000");
    }

    #[test]
    fn roman_numerals_at_word_boundaries() {
        assert_eq!(normalize("Jojo Part III"), "jojo 3");
        assert_eq!(normalize("Hawaii"), "hawaii");
    }

    #[test]
    fn season_keywords_and_ordinals() {
        assert_eq!(normalize("Attack on Titan Season 2"), "attack on titan 2");
        assert_eq!(normalize("My Hero Academia S3"), "my hero academia 3");
        assert_eq!(normalize("Title season4"), "title 4");
        assert_eq!(normalize("The Title: 2nd Season (TV)"), "title 2");
    }

    #[test]
    fn stop_words() {
        assert_eq!(normalize("The Seven Deadly Sins"), "seven deadly sins");
        assert_eq!(normalize("Romeo & Juliet"), "romeo and juliet");
        assert_eq!(normalize("Title OAD"), "title ova");
    }

    #[test]
    fn empty_and_punctuation_only() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("---"), "");
        assert_eq!(family_key(""), "");
    }

    #[test]
    fn family_key_drops_sequel_markers() {
        assert_eq!(family_key("Show"), "show");
        assert_eq!(family_key("Show Part 2"), "show");
        assert_eq!(family_key("Show 2nd Season"), "show");
        assert_eq!(family_key("Show Season 2 Part 2"), "show");
        assert_eq!(family_key("Show: Part II"), "show");
        assert_eq!(family_key("Show S3"), "show");
        assert_eq!(family_key("Show - Part 2"), "show");
    }

    #[test]
    fn family_key_keeps_title_numbers() {
        assert_eq!(family_key("86 - Eighty Six"), "86 eighty six");
        assert_eq!(family_key("Mob Psycho 100"), "mob psycho 100");
        assert_eq!(family_key("Part 2"), "2");
    }
}
