//! Translation of XSD regular expressions into `regex` syntax.
//!
//! XSD has no anchors, so `^` and `$` outside a character class are literals.
//! Character class subtraction (`[a-z-[aeiou]]`) becomes a `regex` class
//! difference. The escapes `\i`, `\c`, `\s`, `\w`, their negations and the
//! Unicode block escapes `\p{IsX}` have no direct `regex` counterpart and are
//! expanded into explicit classes.

use std::iter::Peekable;
use std::str::Chars;

use crate::chars::{NAME_EXTRA_RANGES, NAME_START_RANGES, class_body};

/// A class that matches no character; used for the surrogate blocks.
const NOTHING: &str = r"[^\x{0}-\x{10FFFF}]";

/// Unicode block names known to XML Schema 1.0 and their code point ranges.
const BLOCKS: &[(&str, &[(u32, u32)])] = &[
    ("BasicLatin", &[(0x0000, 0x007F)]),
    ("Latin-1Supplement", &[(0x0080, 0x00FF)]),
    ("LatinExtended-A", &[(0x0100, 0x017F)]),
    ("LatinExtended-B", &[(0x0180, 0x024F)]),
    ("IPAExtensions", &[(0x0250, 0x02AF)]),
    ("SpacingModifierLetters", &[(0x02B0, 0x02FF)]),
    ("CombiningDiacriticalMarks", &[(0x0300, 0x036F)]),
    ("Greek", &[(0x0370, 0x03FF)]),
    ("Cyrillic", &[(0x0400, 0x04FF)]),
    ("Armenian", &[(0x0530, 0x058F)]),
    ("Hebrew", &[(0x0590, 0x05FF)]),
    ("Arabic", &[(0x0600, 0x06FF)]),
    ("Syriac", &[(0x0700, 0x074F)]),
    ("Thaana", &[(0x0780, 0x07BF)]),
    ("Devanagari", &[(0x0900, 0x097F)]),
    ("Bengali", &[(0x0980, 0x09FF)]),
    ("Gurmukhi", &[(0x0A00, 0x0A7F)]),
    ("Gujarati", &[(0x0A80, 0x0AFF)]),
    ("Oriya", &[(0x0B00, 0x0B7F)]),
    ("Tamil", &[(0x0B80, 0x0BFF)]),
    ("Telugu", &[(0x0C00, 0x0C7F)]),
    ("Kannada", &[(0x0C80, 0x0CFF)]),
    ("Malayalam", &[(0x0D00, 0x0D7F)]),
    ("Sinhala", &[(0x0D80, 0x0DFF)]),
    ("Thai", &[(0x0E00, 0x0E7F)]),
    ("Lao", &[(0x0E80, 0x0EFF)]),
    ("Tibetan", &[(0x0F00, 0x0FFF)]),
    ("Myanmar", &[(0x1000, 0x109F)]),
    ("Georgian", &[(0x10A0, 0x10FF)]),
    ("HangulJamo", &[(0x1100, 0x11FF)]),
    ("Ethiopic", &[(0x1200, 0x137F)]),
    ("Cherokee", &[(0x13A0, 0x13FF)]),
    ("UnifiedCanadianAboriginalSyllabics", &[(0x1400, 0x167F)]),
    ("Ogham", &[(0x1680, 0x169F)]),
    ("Runic", &[(0x16A0, 0x16FF)]),
    ("Khmer", &[(0x1780, 0x17FF)]),
    ("Mongolian", &[(0x1800, 0x18AF)]),
    ("LatinExtendedAdditional", &[(0x1E00, 0x1EFF)]),
    ("GreekExtended", &[(0x1F00, 0x1FFF)]),
    ("GeneralPunctuation", &[(0x2000, 0x206F)]),
    ("SuperscriptsandSubscripts", &[(0x2070, 0x209F)]),
    ("CurrencySymbols", &[(0x20A0, 0x20CF)]),
    ("CombiningMarksforSymbols", &[(0x20D0, 0x20FF)]),
    ("LetterlikeSymbols", &[(0x2100, 0x214F)]),
    ("NumberForms", &[(0x2150, 0x218F)]),
    ("Arrows", &[(0x2190, 0x21FF)]),
    ("MathematicalOperators", &[(0x2200, 0x22FF)]),
    ("MiscellaneousTechnical", &[(0x2300, 0x23FF)]),
    ("ControlPictures", &[(0x2400, 0x243F)]),
    ("OpticalCharacterRecognition", &[(0x2440, 0x245F)]),
    ("EnclosedAlphanumerics", &[(0x2460, 0x24FF)]),
    ("BoxDrawing", &[(0x2500, 0x257F)]),
    ("BlockElements", &[(0x2580, 0x259F)]),
    ("GeometricShapes", &[(0x25A0, 0x25FF)]),
    ("MiscellaneousSymbols", &[(0x2600, 0x26FF)]),
    ("Dingbats", &[(0x2700, 0x27BF)]),
    ("BraillePatterns", &[(0x2800, 0x28FF)]),
    ("CJKRadicalsSupplement", &[(0x2E80, 0x2EFF)]),
    ("KangxiRadicals", &[(0x2F00, 0x2FDF)]),
    ("IdeographicDescriptionCharacters", &[(0x2FF0, 0x2FFF)]),
    ("CJKSymbolsandPunctuation", &[(0x3000, 0x303F)]),
    ("Hiragana", &[(0x3040, 0x309F)]),
    ("Katakana", &[(0x30A0, 0x30FF)]),
    ("Bopomofo", &[(0x3100, 0x312F)]),
    ("HangulCompatibilityJamo", &[(0x3130, 0x318F)]),
    ("Kanbun", &[(0x3190, 0x319F)]),
    ("BopomofoExtended", &[(0x31A0, 0x31BF)]),
    ("EnclosedCJKLettersandMonths", &[(0x3200, 0x32FF)]),
    ("CJKCompatibility", &[(0x3300, 0x33FF)]),
    ("CJKUnifiedIdeographsExtensionA", &[(0x3400, 0x4DB5)]),
    ("CJKUnifiedIdeographs", &[(0x4E00, 0x9FFF)]),
    ("YiSyllables", &[(0xA000, 0xA48F)]),
    ("YiRadicals", &[(0xA490, 0xA4CF)]),
    ("HangulSyllables", &[(0xAC00, 0xD7A3)]),
    ("HighSurrogates", &[]),
    ("HighPrivateUseSurrogates", &[]),
    ("LowSurrogates", &[]),
    (
        "PrivateUse",
        &[(0xE000, 0xF8FF), (0xF0000, 0xFFFFD), (0x100000, 0x10FFFD)],
    ),
    ("CJKCompatibilityIdeographs", &[(0xF900, 0xFAFF)]),
    ("AlphabeticPresentationForms", &[(0xFB00, 0xFB4F)]),
    ("ArabicPresentationForms-A", &[(0xFB50, 0xFDFF)]),
    ("CombiningHalfMarks", &[(0xFE20, 0xFE2F)]),
    ("CJKCompatibilityForms", &[(0xFE30, 0xFE4F)]),
    ("SmallFormVariants", &[(0xFE50, 0xFE6F)]),
    ("ArabicPresentationForms-B", &[(0xFE70, 0xFEFE)]),
    ("Specials", &[(0xFEFF, 0xFEFF), (0xFFF0, 0xFFFD)]),
    ("HalfwidthandFullwidthForms", &[(0xFF00, 0xFFEF)]),
    ("OldItalic", &[(0x10300, 0x1032F)]),
    ("Gothic", &[(0x10330, 0x1034F)]),
    ("Deseret", &[(0x10400, 0x1044F)]),
    ("ByzantineMusicalSymbols", &[(0x1D000, 0x1D0FF)]),
    ("MusicalSymbols", &[(0x1D100, 0x1D1FF)]),
    ("MathematicalAlphanumericSymbols", &[(0x1D400, 0x1D7FF)]),
    ("CJKUnifiedIdeographsExtensionB", &[(0x20000, 0x2A6D6)]),
    ("CJKCompatibilityIdeographsSupplement", &[(0x2F800, 0x2FA1F)]),
    ("Tags", &[(0xE0000, 0xE007F)]),
];

fn block_class(name: &str, negated: bool) -> Result<String, String> {
    let (_, ranges) = BLOCKS
        .iter()
        .find(|(block, _)| *block == name)
        .ok_or_else(|| format!("unknown Unicode block 'Is{name}'"))?;
    if ranges.is_empty() {
        return Ok(if negated { r"[\x{0}-\x{10FFFF}]".to_string() } else { NOTHING.to_string() });
    }
    let body: String = ranges
        .iter()
        .map(|(low, high)| format!(r"\x{{{low:X}}}-\x{{{high:X}}}"))
        .collect();
    Ok(format!("[{}{body}]", if negated { "^" } else { "" }))
}

fn name_class(start_only: bool, negated: bool) -> String {
    let mut body = format!(":{}", class_body(NAME_START_RANGES));
    if !start_only {
        body.push_str(&class_body(NAME_EXTRA_RANGES));
    }
    format!("[{}{body}]", if negated { "^" } else { "" })
}

/// Translate the escape following a backslash into a `regex` atom that is
/// valid both inside and outside a character class.
fn escape(chars: &mut Peekable<Chars<'_>>) -> Result<String, String> {
    let next = chars.next().ok_or_else(|| "trailing backslash".to_string())?;
    Ok(match next {
        'i' => name_class(true, false),
        'I' => name_class(true, true),
        'c' => name_class(false, false),
        'C' => name_class(false, true),
        's' => r"[\x{20}\t\n\r]".to_string(),
        'S' => r"[^\x{20}\t\n\r]".to_string(),
        'w' => r"[^\p{P}\p{Z}\p{C}]".to_string(),
        'W' => r"[\p{P}\p{Z}\p{C}]".to_string(),
        'd' => r"\p{Nd}".to_string(),
        'D' => r"\P{Nd}".to_string(),
        'p' | 'P' => {
            if chars.next() != Some('{') {
                return Err(format!("\\{next} must be followed by a braced property name"));
            }
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(ch) => name.push(ch),
                    None => return Err(format!("unterminated \\{next}{{{name}")),
                }
            }
            match name.strip_prefix("Is") {
                Some(block) => block_class(block, next == 'P')?,
                None => format!("\\{next}{{{name}}}"),
            }
        }
        'n' | 'r' | 't' | '\\' | '|' | '.' | '?' | '*' | '+' | '(' | ')' | '{' | '}' | '-'
        | '[' | ']' | '^' | '$' => format!("\\{next}"),
        other => return Err(format!("unknown escape \\{other}")),
    })
}

/// Literal character as it must appear inside a `regex` class.
fn class_literal(c: char) -> String {
    match c {
        '[' | ']' | '\\' | '^' | '-' | '&' | '~' => format!("\\{c}"),
        other => other.to_string(),
    }
}

/// Translate a character class whose opening `[` has been consumed.
fn class(chars: &mut Peekable<Chars<'_>>) -> Result<String, String> {
    let negated = chars.next_if_eq(&'^').is_some();
    let mut body = String::new();
    let mut subtraction = None;
    let mut can_range = false;

    loop {
        let Some(c) = chars.next() else {
            return Err("unterminated character class".to_string());
        };
        match c {
            ']' => break,
            '\\' => {
                let atom = escape(chars)?;
                can_range = atom.len() == 2;
                body.push_str(&atom);
            }
            '-' if chars.peek() == Some(&'[') => {
                chars.next();
                subtraction = Some(class(chars)?);
                if chars.next() != Some(']') {
                    return Err("a subtracted class must end its enclosing class".to_string());
                }
                break;
            }
            '-' if can_range && chars.peek().is_some_and(|next| *next != ']') => {
                body.push('-');
                match chars.next() {
                    Some('\\') => body.push_str(&escape(chars)?),
                    Some(end) => body.push_str(&class_literal(end)),
                    None => return Err("unterminated character class".to_string()),
                }
                can_range = false;
            }
            '[' => return Err("'[' must be escaped inside a character class".to_string()),
            other => {
                body.push_str(&class_literal(other));
                can_range = true;
            }
        }
    }

    if body.is_empty() {
        return Err("empty character class".to_string());
    }
    let base = format!("[{}{body}]", if negated { "^" } else { "" });
    Ok(match subtraction {
        Some(subtracted) => format!("[{base}--{subtracted}]"),
        None => base,
    })
}

/// Translate an XSD pattern into an unanchored `regex` pattern.
pub fn translate(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str(&escape(&mut chars)?),
            '[' => out.push_str(&class(&mut chars)?),
            '.' => out.push_str(r"[^\n\r]"),
            '^' | '$' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn matcher(pattern: &str) -> Regex {
        Regex::new(&format!("^(?:{})$", translate(pattern).unwrap())).unwrap()
    }

    #[test]
    fn test_anchors_are_literals() {
        assert_eq!(translate("a$b").unwrap(), r"a\$b");
        assert_eq!(translate("[^a]").unwrap(), "[^a]");
        assert!(matcher("^x$").is_match("^x$"));
    }

    #[test]
    fn test_class_subtraction() {
        let consonants = matcher("[a-z-[aeiou]]+");
        assert!(consonants.is_match("bcd"));
        assert!(!consonants.is_match("bad"));
        assert!(!consonants.is_match("b-c"));

        let not_lower = matcher("[^a-z-[0-9]]");
        assert!(not_lower.is_match("X"));
        assert!(!not_lower.is_match("q"));
        assert!(!not_lower.is_match("5"));

        let nested = matcher("[a-z-[b-y-[m]]]+");
        assert!(nested.is_match("azm"));
        assert!(!nested.is_match("abz"));
    }

    #[test]
    fn test_literal_hyphen_and_set_operators() {
        let signs = matcher("[+-]");
        assert!(signs.is_match("-"));
        assert!(signs.is_match("+"));
        assert!(!signs.is_match(","));

        let amp = matcher("[a&&b]");
        assert!(amp.is_match("&"));
        assert!(!amp.is_match("&&"));

        let controls = matcher(r"[\t-\r]+");
        assert!(controls.is_match("\t\n\r"));
        assert!(!controls.is_match("-"));
    }

    #[test]
    fn test_name_escapes_cover_unicode() {
        let name = matcher(r"\i\c*");
        assert!(name.is_match("order-1"));
        assert!(name.is_match("été"));
        assert!(name.is_match("名前"));
        assert!(name.is_match("x\u{B7}y"));
        assert!(!name.is_match("1order"));
        assert!(!name.is_match("a b"));
        assert!(matcher(r"\I").is_match("1"));
        assert!(!matcher(r"[\C]").is_match("a"));
    }

    #[test]
    fn test_block_escapes() {
        let latin = matcher(r"\p{IsBasicLatin}+");
        assert!(latin.is_match("Hello, world"));
        assert!(!latin.is_match("héllo"));

        let not_greek = matcher(r"\P{IsGreek}+");
        assert!(not_greek.is_match("abc"));
        assert!(!not_greek.is_match("αβγ"));

        assert!(matcher(r"[\p{IsHiragana}\p{IsKatakana}]+").is_match("ひらカタ"));
        assert!(!matcher(r"\p{IsHighSurrogates}").is_match("a"));
        assert!(translate(r"\p{IsKlingon}").is_err());
    }

    #[test]
    fn test_xsd_space_and_dot() {
        let space = matcher(r"a\sb");
        assert!(space.is_match("a b"));
        assert!(!space.is_match("a\u{A0}b"));
        assert!(!matcher(".").is_match("\r"));
    }

    #[test]
    fn test_malformed_patterns() {
        assert!(translate("[a-").is_err());
        assert!(translate(r"a\").is_err());
        assert!(translate(r"\q").is_err());
        assert!(translate("[a-[b]c]").is_err());
    }
}
