//! Simple types: XSD built-in datatypes, derived restrictions, lists and unions.
//!
//! Values are checked in three steps: whitespace normalization, the lexical
//! space of the primitive (or item/member types), then every facet collected
//! along the restriction chain.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::chars::{NAME_EXTRA_RANGES, NAME_START_RANGES, class_body};
use crate::pattern;

/// XSD 1.0 built-in datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NcName,
    NmToken,
    Id,
    IdRef,
    Entity,
    QName,
    Notation,
    AnyUri,
    Boolean,
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
    Float,
    Double,
    Duration,
    DateTime,
    Date,
    Time,
    GYear,
    GYearMonth,
    GMonth,
    GMonthDay,
    GDay,
    HexBinary,
    Base64Binary,
}

const BUILTIN_NAMES: &[(&str, Builtin)] = &[
    ("anySimpleType", Builtin::AnySimpleType),
    ("string", Builtin::String),
    ("normalizedString", Builtin::NormalizedString),
    ("token", Builtin::Token),
    ("language", Builtin::Language),
    ("Name", Builtin::Name),
    ("NCName", Builtin::NcName),
    ("NMTOKEN", Builtin::NmToken),
    ("ID", Builtin::Id),
    ("IDREF", Builtin::IdRef),
    ("ENTITY", Builtin::Entity),
    ("QName", Builtin::QName),
    ("NOTATION", Builtin::Notation),
    ("anyURI", Builtin::AnyUri),
    ("boolean", Builtin::Boolean),
    ("decimal", Builtin::Decimal),
    ("integer", Builtin::Integer),
    ("nonPositiveInteger", Builtin::NonPositiveInteger),
    ("negativeInteger", Builtin::NegativeInteger),
    ("long", Builtin::Long),
    ("int", Builtin::Int),
    ("short", Builtin::Short),
    ("byte", Builtin::Byte),
    ("nonNegativeInteger", Builtin::NonNegativeInteger),
    ("unsignedLong", Builtin::UnsignedLong),
    ("unsignedInt", Builtin::UnsignedInt),
    ("unsignedShort", Builtin::UnsignedShort),
    ("unsignedByte", Builtin::UnsignedByte),
    ("positiveInteger", Builtin::PositiveInteger),
    ("float", Builtin::Float),
    ("double", Builtin::Double),
    ("duration", Builtin::Duration),
    ("dateTime", Builtin::DateTime),
    ("date", Builtin::Date),
    ("time", Builtin::Time),
    ("gYear", Builtin::GYear),
    ("gYearMonth", Builtin::GYearMonth),
    ("gMonth", Builtin::GMonth),
    ("gMonthDay", Builtin::GMonthDay),
    ("gDay", Builtin::GDay),
    ("hexBinary", Builtin::HexBinary),
    ("base64Binary", Builtin::Base64Binary),
];

/// Built-in list types and the built-in item type they are lists of.
const BUILTIN_LISTS: &[(&str, Builtin)] = &[
    ("NMTOKENS", Builtin::NmToken),
    ("IDREFS", Builtin::IdRef),
    ("ENTITIES", Builtin::Entity),
];

const TZ: &str = r"(Z|[+-](0\d|1[0-4]):[0-5]\d)?";

static LEXICAL_PATTERNS: OnceLock<HashMap<Builtin, Regex>> = OnceLock::new();

fn lexical_patterns() -> &'static HashMap<Builtin, Regex> {
    LEXICAL_PATTERNS.get_or_init(|| {
        let start = class_body(NAME_START_RANGES);
        let extra = class_body(NAME_EXTRA_RANGES);
        let name_start = format!("[:{start}]");
        let name_char = format!("[:{start}{extra}]");
        let ncname = format!("[{start}][{start}{extra}]*");
        let year = r"-?([1-9]\d{4,}|\d{4})";
        let month = r"(0[1-9]|1[0-2])";
        let day = r"(0[1-9]|[12]\d|3[01])";
        let time = r"(([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?|24:00:00(\.0+)?)";

        let sources: Vec<(Builtin, String)> = vec![
            (
                Builtin::Language,
                r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$".to_string(),
            ),
            (Builtin::Name, format!("^{name_start}{name_char}*$")),
            (Builtin::NcName, format!("^{ncname}$")),
            (Builtin::NmToken, format!("^{name_char}+$")),
            (Builtin::QName, format!("^({ncname}:)?{ncname}$")),
            (Builtin::Boolean, r"^(true|false|1|0)$".to_string()),
            (Builtin::Decimal, r"^[+-]?(\d+(\.\d*)?|\.\d+)$".to_string()),
            (Builtin::Integer, r"^[+-]?\d+$".to_string()),
            (
                Builtin::Double,
                r"^([+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?|[+-]?INF|NaN)$".to_string(),
            ),
            (
                Builtin::Duration,
                r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$".to_string(),
            ),
            (
                Builtin::DateTime,
                format!("^{year}-{month}-{day}T{time}{TZ}$"),
            ),
            (Builtin::Date, format!("^{year}-{month}-{day}{TZ}$")),
            (Builtin::Time, format!("^{time}{TZ}$")),
            (Builtin::GYear, format!("^{year}{TZ}$")),
            (Builtin::GYearMonth, format!("^{year}-{month}{TZ}$")),
            (Builtin::GMonth, format!("^--{month}{TZ}$")),
            (Builtin::GMonthDay, format!("^--{month}-{day}{TZ}$")),
            (Builtin::GDay, format!("^---{day}{TZ}$")),
            (Builtin::HexBinary, r"^([0-9a-fA-F]{2})*$".to_string()),
            (
                Builtin::Base64Binary,
                r"^([A-Za-z0-9+/]{4})*([A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$".to_string(),
            ),
        ];

        sources
            .into_iter()
            .map(|(builtin, source)| {
                let regex = Regex::new(&source).expect("Failed to compile built-in lexical regex");
                (builtin, regex)
            })
            .collect()
    })
}

impl Builtin {
    pub fn from_local_name(name: &str) -> Option<Self> {
        BUILTIN_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, builtin)| *builtin)
    }

    /// Item type of a built-in list type (`NMTOKENS`, `IDREFS`, `ENTITIES`).
    pub fn list_item_for(name: &str) -> Option<Self> {
        BUILTIN_LISTS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, item)| *item)
    }

    pub fn name(self) -> &'static str {
        BUILTIN_NAMES
            .iter()
            .find(|(_, builtin)| *builtin == self)
            .map(|(name, _)| *name)
            .unwrap_or("anySimpleType")
    }

    pub fn whitespace(self) -> WhiteSpace {
        match self {
            Builtin::String | Builtin::AnySimpleType => WhiteSpace::Preserve,
            Builtin::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    pub fn is_decimal_family(self) -> bool {
        matches!(
            self,
            Builtin::Decimal
                | Builtin::Integer
                | Builtin::NonPositiveInteger
                | Builtin::NegativeInteger
                | Builtin::Long
                | Builtin::Int
                | Builtin::Short
                | Builtin::Byte
                | Builtin::NonNegativeInteger
                | Builtin::UnsignedLong
                | Builtin::UnsignedInt
                | Builtin::UnsignedShort
                | Builtin::UnsignedByte
                | Builtin::PositiveInteger
        )
    }

    fn is_float_family(self) -> bool {
        matches!(self, Builtin::Float | Builtin::Double)
    }

    fn is_temporal(self) -> bool {
        matches!(
            self,
            Builtin::Duration
                | Builtin::DateTime
                | Builtin::Date
                | Builtin::Time
                | Builtin::GYear
                | Builtin::GYearMonth
                | Builtin::GMonth
                | Builtin::GMonthDay
                | Builtin::GDay
        )
    }

    /// Inclusive value bounds for the bounded integer types.
    fn integer_bounds(self) -> (Option<&'static str>, Option<&'static str>) {
        match self {
            Builtin::NonPositiveInteger => (None, Some("0")),
            Builtin::NegativeInteger => (None, Some("-1")),
            Builtin::Long => (Some("-9223372036854775808"), Some("9223372036854775807")),
            Builtin::Int => (Some("-2147483648"), Some("2147483647")),
            Builtin::Short => (Some("-32768"), Some("32767")),
            Builtin::Byte => (Some("-128"), Some("127")),
            Builtin::NonNegativeInteger => (Some("0"), None),
            Builtin::UnsignedLong => (Some("0"), Some("18446744073709551615")),
            Builtin::UnsignedInt => (Some("0"), Some("4294967295")),
            Builtin::UnsignedShort => (Some("0"), Some("65535")),
            Builtin::UnsignedByte => (Some("0"), Some("255")),
            Builtin::PositiveInteger => (Some("1"), None),
            _ => (None, None),
        }
    }

    /// Check `value` (already whitespace-normalized) against the lexical space.
    pub fn check_lexical(self, value: &str) -> bool {
        let patterns = lexical_patterns();
        let matches = |key: Builtin| patterns.get(&key).is_some_and(|re| re.is_match(value));

        match self {
            Builtin::AnySimpleType
            | Builtin::String
            | Builtin::NormalizedString
            | Builtin::Token
            | Builtin::AnyUri => true,
            Builtin::Id | Builtin::IdRef | Builtin::Entity | Builtin::NcName => {
                matches(Builtin::NcName)
            }
            Builtin::Notation | Builtin::QName => matches(Builtin::QName),
            Builtin::Float | Builtin::Double => matches(Builtin::Double),
            Builtin::Base64Binary => {
                let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
                patterns
                    .get(&Builtin::Base64Binary)
                    .is_some_and(|re| re.is_match(&compact))
            }
            Builtin::Duration => {
                matches(Builtin::Duration) && !value.ends_with('P') && !value.ends_with('T')
            }
            Builtin::Date | Builtin::DateTime => {
                matches(self) && day_exists(value.trim_start_matches('-'))
            }
            b if b.is_decimal_family() && b != Builtin::Decimal => {
                if !matches(Builtin::Integer) {
                    return false;
                }
                let (min, max) = b.integer_bounds();
                let above_min = min.is_none_or(|min| {
                    compare_decimal(value, min).is_some_and(|ord| ord != Ordering::Less)
                });
                let below_max = max.is_none_or(|max| {
                    compare_decimal(value, max).is_some_and(|ord| ord != Ordering::Greater)
                });
                above_min && below_max
            }
            other => matches(other),
        }
    }
}

/// Reject calendar dates such as 2023-02-30. Expects `YYYY-MM-DD...`.
fn day_exists(value: &str) -> bool {
    let mut parts = value.splitn(3, '-');
    let (Some(year), Some(month), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let (Ok(year), Ok(month), Ok(day)) = (
        year.parse::<i64>(),
        month.parse::<u32>(),
        rest.get(..2).unwrap_or("").parse::<u32>(),
    ) else {
        return false;
    };
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let max_day = match month {
        2 if leap => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    };
    day <= max_day
}

/// Whitespace facet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

impl WhiteSpace {
    pub fn from_facet_value(value: &str) -> Option<Self> {
        match value {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    pub fn apply<'a>(self, value: &'a str) -> Cow<'a, str> {
        match self {
            WhiteSpace::Preserve => Cow::Borrowed(value),
            WhiteSpace::Replace => {
                if value.contains(['\t', '\n', '\r']) {
                    Cow::Owned(value.replace(['\t', '\n', '\r'], " "))
                } else {
                    Cow::Borrowed(value)
                }
            }
            WhiteSpace::Collapse => {
                let collapsed = value.split_ascii_whitespace().collect::<Vec<_>>().join(" ");
                if collapsed == value {
                    Cow::Borrowed(value)
                } else {
                    Cow::Owned(collapsed)
                }
            }
        }
    }
}

/// Pattern facet of one derivation step. A value must match at least one of
/// the step's patterns.
#[derive(Debug, Clone)]
pub struct PatternFacet {
    pub sources: Vec<String>,
    regexes: Vec<Regex>,
}

impl PatternFacet {
    /// Compile XSD regular expressions into an anchored pattern facet.
    pub fn compile(sources: Vec<String>) -> Result<Self, (String, String)> {
        let mut regexes = Vec::with_capacity(sources.len());
        for source in &sources {
            let translated = pattern::translate(source)
                .map_err(|details| (source.clone(), details))?;
            let regex = Regex::new(&format!("^(?:{translated})$"))
                .map_err(|e| (source.clone(), e.to_string()))?;
            regexes.push(regex);
        }
        Ok(Self { sources, regexes })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regexes.iter().any(|re| re.is_match(value))
    }
}

/// Constraining facets. Range facets keep their lexical value and compare by
/// value for numeric types.
#[derive(Debug, Clone)]
pub enum Facet {
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    Pattern(PatternFacet),
    Enumeration(Vec<String>),
    MinInclusive(String),
    MaxInclusive(String),
    MinExclusive(String),
    MaxExclusive(String),
    TotalDigits(usize),
    FractionDigits(usize),
}

/// Variety of a simple type
#[derive(Debug, Clone)]
pub enum Variety {
    Atomic(Builtin),
    List(Arc<SimpleType>),
    Union(Vec<Arc<SimpleType>>),
}

/// A fully resolved simple type: the facets of every restriction step of its
/// derivation chain are accumulated in `facets`.
#[derive(Debug, Clone)]
pub struct SimpleType {
    pub name: Option<String>,
    pub variety: Variety,
    pub whitespace: WhiteSpace,
    pub facets: Vec<Facet>,
}

impl SimpleType {
    pub fn builtin(builtin: Builtin) -> Self {
        Self {
            name: Some(builtin.name().to_string()),
            variety: Variety::Atomic(builtin),
            whitespace: builtin.whitespace(),
            facets: Vec::new(),
        }
    }

    pub fn builtin_list(list_name: &str, item: Builtin) -> Self {
        Self {
            name: Some(list_name.to_string()),
            variety: Variety::List(Arc::new(SimpleType::builtin(item))),
            whitespace: WhiteSpace::Collapse,
            facets: vec![Facet::MinLength(1)],
        }
    }

    pub fn list_of(name: Option<String>, item: Arc<SimpleType>) -> Self {
        Self {
            name,
            variety: Variety::List(item),
            whitespace: WhiteSpace::Collapse,
            facets: Vec::new(),
        }
    }

    pub fn union_of(name: Option<String>, members: Vec<Arc<SimpleType>>) -> Self {
        Self {
            name,
            variety: Variety::Union(members),
            whitespace: WhiteSpace::Collapse,
            facets: Vec::new(),
        }
    }

    /// Derive a restriction of `base` named `name` adding `facets`.
    pub fn restrict(
        base: &SimpleType,
        name: Option<String>,
        whitespace: Option<WhiteSpace>,
        facets: Vec<Facet>,
    ) -> Self {
        let mut all = base.facets.clone();
        all.extend(facets);
        Self {
            name,
            variety: base.variety.clone(),
            whitespace: whitespace.unwrap_or(base.whitespace),
            facets: all,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("#AnonType")
    }

    /// The primitive built-in this type ultimately restricts, if atomic.
    pub fn primitive(&self) -> Option<Builtin> {
        match &self.variety {
            Variety::Atomic(builtin) => Some(*builtin),
            _ => None,
        }
    }

    /// Validate a raw value. Returns the normalized value on success and a
    /// diagnostic message on failure.
    pub fn validate(&self, raw: &str) -> Result<String, String> {
        let normalized = self.whitespace.apply(raw).into_owned();

        match &self.variety {
            Variety::Atomic(builtin) => {
                if !builtin.check_lexical(&normalized) {
                    return Err(format!(
                        "cvc-datatype-valid.1.2.1: '{}' is not a valid value for '{}'.",
                        normalized,
                        builtin.name()
                    ));
                }
            }
            Variety::List(item) => {
                for token in normalized.split_ascii_whitespace() {
                    item.validate(token)?;
                }
            }
            Variety::Union(members) => {
                if !members.iter().any(|member| member.validate(&normalized).is_ok()) {
                    return Err(format!(
                        "cvc-datatype-valid.1.2.3: '{}' is not a valid value of union type '{}'.",
                        normalized,
                        self.display_name()
                    ));
                }
            }
        }

        for facet in &self.facets {
            self.check_facet(facet, &normalized)?;
        }
        Ok(normalized)
    }

    fn length_of(&self, value: &str) -> usize {
        match &self.variety {
            Variety::List(_) => value.split_ascii_whitespace().count(),
            Variety::Atomic(Builtin::HexBinary) => value.len() / 2,
            Variety::Atomic(Builtin::Base64Binary) => {
                let compact = value.chars().filter(|c| !c.is_whitespace()).count();
                let padding = value.chars().rev().take_while(|c| *c == '=').count();
                (compact / 4) * 3 - padding.min(2)
            }
            _ => value.chars().count(),
        }
    }

    fn compare(&self, value: &str, bound: &str) -> Option<Ordering> {
        match self.primitive() {
            Some(b) if b.is_decimal_family() => compare_decimal(value, bound),
            Some(b) if b.is_float_family() => {
                let (a, b) = (parse_float(value)?, parse_float(bound)?);
                a.partial_cmp(&b)
            }
            Some(b) if b.is_temporal() => Some(value.cmp(bound)),
            _ => None,
        }
    }

    fn values_equal(&self, value: &str, candidate: &str) -> bool {
        match self.primitive() {
            Some(b) if b.is_decimal_family() || b.is_float_family() => {
                self.compare(value, candidate) == Some(Ordering::Equal)
            }
            _ => value == candidate,
        }
    }

    fn check_facet(&self, facet: &Facet, value: &str) -> Result<(), String> {
        let type_name = self.display_name();
        match facet {
            Facet::Length(expected) => {
                let actual = self.length_of(value);
                if actual != *expected {
                    return Err(format!(
                        "cvc-length-valid: Value '{value}' with length = '{actual}' is not facet-valid with respect to length '{expected}' for type '{type_name}'."
                    ));
                }
            }
            Facet::MinLength(min) => {
                let actual = self.length_of(value);
                if actual < *min {
                    return Err(format!(
                        "cvc-minLength-valid: Value '{value}' with length = '{actual}' is not facet-valid with respect to minLength '{min}' for type '{type_name}'."
                    ));
                }
            }
            Facet::MaxLength(max) => {
                let actual = self.length_of(value);
                if actual > *max {
                    return Err(format!(
                        "cvc-maxLength-valid: Value '{value}' with length = '{actual}' is not facet-valid with respect to maxLength '{max}' for type '{type_name}'."
                    ));
                }
            }
            Facet::Pattern(pattern) => {
                if !pattern.is_match(value) {
                    return Err(format!(
                        "cvc-pattern-valid: Value '{}' is not facet-valid with respect to pattern '{}' for type '{}'.",
                        value,
                        pattern.sources.join("|"),
                        type_name
                    ));
                }
            }
            Facet::Enumeration(values) => {
                if !values.iter().any(|candidate| self.values_equal(value, candidate)) {
                    return Err(format!(
                        "cvc-enumeration-valid: Value '{}' is not facet-valid with respect to enumeration '[{}]'. It must be a value from the enumeration.",
                        value,
                        values.join(", ")
                    ));
                }
            }
            Facet::MinInclusive(bound) => {
                if self.compare(value, bound) == Some(Ordering::Less) {
                    return Err(format!(
                        "cvc-minInclusive-valid: Value '{value}' is not facet-valid with respect to minInclusive '{bound}' for type '{type_name}'."
                    ));
                }
            }
            Facet::MaxInclusive(bound) => {
                if self.compare(value, bound) == Some(Ordering::Greater) {
                    return Err(format!(
                        "cvc-maxInclusive-valid: Value '{value}' is not facet-valid with respect to maxInclusive '{bound}' for type '{type_name}'."
                    ));
                }
            }
            Facet::MinExclusive(bound) => {
                if matches!(
                    self.compare(value, bound),
                    Some(Ordering::Less | Ordering::Equal)
                ) {
                    return Err(format!(
                        "cvc-minExclusive-valid: Value '{value}' is not facet-valid with respect to minExclusive '{bound}' for type '{type_name}'."
                    ));
                }
            }
            Facet::MaxExclusive(bound) => {
                if matches!(
                    self.compare(value, bound),
                    Some(Ordering::Greater | Ordering::Equal)
                ) {
                    return Err(format!(
                        "cvc-maxExclusive-valid: Value '{value}' is not facet-valid with respect to maxExclusive '{bound}' for type '{type_name}'."
                    ));
                }
            }
            Facet::TotalDigits(total) => {
                let (int_digits, frac_digits) = decimal_digits(value);
                if int_digits + frac_digits > *total {
                    return Err(format!(
                        "cvc-totalDigits-valid: Value '{}' has {} total digits, but the number of total digits has been limited to {}.",
                        value,
                        int_digits + frac_digits,
                        total
                    ));
                }
            }
            Facet::FractionDigits(max) => {
                let (_, frac_digits) = decimal_digits(value);
                if frac_digits > *max {
                    return Err(format!(
                        "cvc-fractionDigits-valid: Value '{value}' has {frac_digits} fraction digits, but the number of fraction digits has been limited to {max}."
                    ));
                }
            }
        }
        Ok(())
    }
}

fn parse_float(value: &str) -> Option<f64> {
    match value {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

/// Split a decimal lexical value into sign, significant integer digits and
/// significant fraction digits.
fn decimal_parts(value: &str) -> Option<(bool, &str, &str)> {
    let (negative, unsigned) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let int_part = int_part.trim_start_matches('0');
    let frac_part = frac_part.trim_end_matches('0');
    let is_zero = int_part.is_empty() && frac_part.is_empty();
    Some((negative && !is_zero, int_part, frac_part))
}

fn decimal_digits(value: &str) -> (usize, usize) {
    decimal_parts(value)
        .map(|(_, int_part, frac_part)| (int_part.len().max(1), frac_part.len()))
        .unwrap_or((0, 0))
}

/// Exact comparison of two decimal lexical values.
pub fn compare_decimal(a: &str, b: &str) -> Option<Ordering> {
    let (a_neg, a_int, a_frac) = decimal_parts(a)?;
    let (b_neg, b_int, b_frac) = decimal_parts(b)?;

    let magnitude = a_int
        .len()
        .cmp(&b_int.len())
        .then_with(|| a_int.cmp(b_int))
        .then_with(|| a_frac.cmp(b_frac));

    Some(match (a_neg, b_neg) {
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        (false, false) => magnitude,
        (true, true) => magnitude.reverse(),
    })
}
