//! XML 1.0 character classes.
//!
//! The tokenizer does not check name syntax or the `Char` production, so the
//! session checks them here. The same ranges back the `\i` and `\c` escapes
//! of schema patterns and the lexical space of the name types.

/// `NameStartChar` without `:`.
pub const NAME_START_RANGES: &[(char, char)] = &[
    ('A', 'Z'),
    ('_', '_'),
    ('a', 'z'),
    ('\u{C0}', '\u{D6}'),
    ('\u{D8}', '\u{F6}'),
    ('\u{F8}', '\u{2FF}'),
    ('\u{370}', '\u{37D}'),
    ('\u{37F}', '\u{1FFF}'),
    ('\u{200C}', '\u{200D}'),
    ('\u{2070}', '\u{218F}'),
    ('\u{2C00}', '\u{2FEF}'),
    ('\u{3001}', '\u{D7FF}'),
    ('\u{F900}', '\u{FDCF}'),
    ('\u{FDF0}', '\u{FFFD}'),
    ('\u{10000}', '\u{EFFFF}'),
];

/// What `NameChar` adds to `NameStartChar`.
pub const NAME_EXTRA_RANGES: &[(char, char)] = &[
    ('-', '.'),
    ('0', '9'),
    ('\u{B7}', '\u{B7}'),
    ('\u{300}', '\u{36F}'),
    ('\u{203F}', '\u{2040}'),
];

fn in_ranges(c: char, ranges: &[(char, char)]) -> bool {
    ranges.iter().any(|(low, high)| (*low..=*high).contains(&c))
}

/// The `Char` production.
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}' | '\u{A}' | '\u{D}' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

pub fn is_name_start_char(c: char) -> bool {
    c == ':' || in_ranges(c, NAME_START_RANGES)
}

pub fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || in_ranges(c, NAME_EXTRA_RANGES)
}

pub fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first != ':' && is_name_start_char(first))
        && chars.all(|c| c != ':' && is_name_char(c))
}

/// `Prefix ':' LocalPart` or an unprefixed name.
pub fn is_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
        None => is_ncname(name),
    }
}

/// First character outside the `Char` production.
pub fn first_illegal_char(text: &str) -> Option<char> {
    text.chars().find(|c| !is_xml_char(*c))
}

/// Ranges as the body of a `regex` character class.
pub fn class_body(ranges: &[(char, char)]) -> String {
    let mut body = String::new();
    for (low, high) in ranges {
        if low == high {
            body.push_str(&format!("\\x{{{:X}}}", *low as u32));
        } else {
            body.push_str(&format!("\\x{{{:X}}}-\\x{{{:X}}}", *low as u32, *high as u32));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(is_qname("Order"));
        assert!(is_qname("tns:Order"));
        assert!(is_qname("été"));
        assert!(is_qname("_x-1.2"));
        assert!(!is_qname("1R"));
        assert!(!is_qname("-x"));
        assert!(!is_qname(":x"));
        assert!(!is_qname("a:b:c"));
        assert!(!is_qname("a:"));
        assert!(!is_qname(""));
        assert!(is_name_char('\u{B7}'));
        assert!(!is_name_start_char('\u{B7}'));
    }

    #[test]
    fn test_chars() {
        assert_eq!(first_illegal_char("tab\tok"), None);
        assert_eq!(first_illegal_char("a\u{0}b"), Some('\u{0}'));
        assert_eq!(first_illegal_char("\u{FFFE}"), Some('\u{FFFE}'));
        assert!(is_xml_char('\u{10000}'));
    }

    #[test]
    fn test_class_body() {
        assert_eq!(class_body(&[('A', 'Z'), ('_', '_')]), r"\x{41}-\x{5A}\x{5F}");
    }
}
