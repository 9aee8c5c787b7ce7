//! Address extraction from scraped text
//!
//! Turns a messy text blob ("123 Farm RdBoston MA 1267 Phone Number ...")
//! into [`AddressPieces`]. Every heuristic is a small pure function that
//! returns `Option`, so each can be exercised on its own. A field that cannot
//! be parsed with confidence is left empty rather than guessed.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use super::state::{self, UsState};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static WEBSITE_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bWebsite\s+https?://\S+.*").unwrap());

static PHONE_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPhone\s*Number\s*[\d(][\d\s().-]+").unwrap());

static DESCRIPTION_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bDescription\b.*$").unwrap());

static COUNTRY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bUSA\b").unwrap());

/// Comma runs left behind after removing a token (", ," → ",")
static EMPTY_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,(?:\s*,)+").unwrap());

static CAMEL_JOIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());

static ZIP5_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{5}\b").unwrap());

static ZIP4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}\b").unwrap());

static ZIP_SHAPED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4,5}\b").unwrap());

/// A leading house number followed by a word
static HOUSE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,6})\s+[A-Za-z]").unwrap());

/// Full state names, two-word names accept a space or a hyphen
static STATE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    let names: Vec<String> = state::all()
        .map(|s| s.full_name().replace(' ', "[ -]"))
        .collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", names.join("|"))).unwrap()
});

/// Bare uppercase postal codes; lower-case "me"/"or"/"in" are ordinary words
static STATE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let codes: Vec<&str> = state::all().map(|s| s.code()).collect();
    Regex::new(&format!(r"\b(?:{})\b", codes.join("|"))).unwrap()
});

/// "<city> <state>" per state, anchored on its code or any spelling of its name
static CITY_BEFORE_STATE_RES: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    state::all()
        .map(|s| {
            let name = s.full_name().replace(' ', "[ -]");
            let pattern = format!(r"(?i)([A-Za-z][A-Za-z .'-]+)\s+(?:{}|{})\b", s.code(), name);
            (s.code(), Regex::new(&pattern).unwrap())
        })
        .collect()
});

static CITY_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z][A-Za-z .'-]+),\s*(?:[A-Za-z .'-]+|[A-Z]{2})\b").unwrap()
});

static CITY_AFTER_PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.\s*([A-Za-z][A-Za-z .'-]+),\s*(?:[A-Za-z .'-]+|[A-Z]{2})\b").unwrap()
});

static STREET_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*\d{1,6}\s+[A-Za-z0-9 .,'-]+?\b(?:Rd|Road|St|Street|Ave|Avenue|Blvd|Lane|Ln|Dr|Drive|Way|Route|Rte|Hwy|Highway|Ct|Court|Pl|Place)\b\.?,?",
    )
    .unwrap()
});

static STREET_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{1,6}\s+[A-Za-z0-9 .'-]+").unwrap());

/// Structured pieces recovered from one text blob
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressPieces {
    /// The cleaned text every other field was extracted from
    pub sanitized_text: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<UsState>,
    /// Always exactly five digits
    pub postal_code: Option<String>,
}

/// Extract address pieces from `raw_text`
///
/// `default_state` is used only when no state appears in the text itself.
pub fn extract(raw_text: &str, default_state: Option<UsState>) -> AddressPieces {
    let text = sanitize(raw_text);

    let street = street_with_suffix(&text).or_else(|| street_leading_run(&text));

    // The street words never feed the city, the house number never feeds the postal code
    let rest = match &street {
        Some(found) => &text[found.end..],
        None => text.as_str(),
    };

    let postal_code = postal_code(without_house_number(&text));

    let found_state = state_in_text(&text);
    let state = found_state.as_ref().map(|(s, _)| *s).or(default_state);

    let state_token = found_state.as_ref().map(|(_, token)| token.as_str());
    let city = find_city(rest, state, state_token)
        .or_else(|| if street.is_some() { find_city(&text, state, state_token) } else { None });

    AddressPieces {
        street: street.map(|s| s.text),
        city,
        state,
        postal_code,
        sanitized_text: text,
    }
}

/// Clean a scraped blob before any pattern runs
///
/// Collapses whitespace, drops website/phone/description tails and the
/// country marker, and splits words glued together by the scraper
/// ("StreetBarre" → "Street, Barre").
pub fn sanitize(raw: &str) -> String {
    let text = collapse_whitespace(raw);
    let text = WEBSITE_TAIL_RE.replace(&text, "");
    let text = PHONE_TAIL_RE.replace(&text, "");
    let text = DESCRIPTION_TAIL_RE.replace(&text, "");
    let text = COUNTRY_RE.replace_all(&text, "");
    let text = EMPTY_SEGMENT_RE.replace_all(&text, ",");
    let text = collapse_whitespace(&text);
    let text = text.trim_matches(|c: char| c == ',' || c.is_whitespace());
    CAMEL_JOIN_RE.replace_all(text, "$1, $2").into_owned()
}

/// Trim and collapse every whitespace run to a single space
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// First 5-digit token, or the first 4-digit token with its lost leading zero restored
pub fn postal_code(text: &str) -> Option<String> {
    let token = ZIP5_RE.find(text).or_else(|| ZIP4_RE.find(text))?;
    pad_postal_code(token.as_str())
}

/// "45 Orchard Bend Hadley" → "Orchard Bend Hadley"; other text is returned whole
pub fn without_house_number(text: &str) -> &str {
    match HOUSE_NUMBER_RE.captures(text).and_then(|c| c.get(1)) {
        Some(number) => text[number.end()..].trim_start(),
        None => text,
    }
}

/// "01267" stays, "1267" becomes "01267", anything else is rejected
pub fn pad_postal_code(token: &str) -> Option<String> {
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match token.len() {
        5 => Some(token.to_string()),
        4 => Some(format!("0{}", token)),
        _ => None,
    }
}

/// A state mentioned in the text, together with the exact token that named it
///
/// Full names win over bare codes.
pub fn state_in_text(text: &str) -> Option<(UsState, String)> {
    [&*STATE_NAME_RE, &*STATE_CODE_RE].iter().find_map(|re| {
        let token = re.find(text)?.as_str();
        state::normalize(token).map(|s| (s, token.to_string()))
    })
}

/// "Barre, VT" → "Barre"
pub fn city_before_comma(text: &str) -> Option<String> {
    capture_city(&CITY_COMMA_RE, text)
}

/// "... Rd.Warwick, MA" → "Warwick"
pub fn city_after_period(text: &str) -> Option<String> {
    capture_city(&CITY_AFTER_PERIOD_RE, text)
}

/// "Boston MA" → "Boston", given the state token "MA"
pub fn city_before_state(text: &str, state_token: &str) -> Option<String> {
    let state = state::normalize(state_token)?;
    capture_city(CITY_BEFORE_STATE_RES.get(state.code())?, text)
}

fn find_city(text: &str, state: Option<UsState>, state_token: Option<&str>) -> Option<String> {
    if let Some(city) = city_before_comma(text) {
        return Some(city);
    }
    if let Some(city) = city_after_period(text) {
        return Some(city);
    }
    // A default state has no token in the text; its code is the best anchor
    let token = state_token.or_else(|| state.map(|s| s.code()))?;
    city_before_state(text, token)
}

fn capture_city(re: &Regex, text: &str) -> Option<String> {
    let city = re.captures(text)?.get(1)?.as_str().trim();
    // A captured state name is not a city
    if city.is_empty() || state::normalize(city).is_some() {
        return None;
    }
    Some(city.to_string())
}

/// A street match and where it ends in the sanitized text
#[derive(Debug, Clone, PartialEq)]
pub struct StreetMatch {
    pub text: String,
    pub end: usize,
}

/// "123 Farm Rd Boston" → "123 Farm Rd"
pub fn street_with_suffix(text: &str) -> Option<StreetMatch> {
    let m = STREET_SUFFIX_RE.find(text)?;
    street_match(m.as_str(), m.end())
}

/// "45 Orchard Lane Extension, Hadley" → "45 Orchard Lane Extension"
///
/// Only accepted when the run reaches a comma or the end of the text. A
/// postal-code-shaped token after the house number ends the run.
pub fn street_leading_run(text: &str) -> Option<StreetMatch> {
    let m = STREET_RUN_RE.find(text)?;
    let words_start = text.len() - without_house_number(text).len();
    let end = match ZIP_SHAPED_RE.find(&text[words_start..m.end()]) {
        Some(zip) => words_start + zip.start(),
        None => m.end(),
    };
    let rest = &text[end..];
    if !(rest.is_empty() || rest.starts_with(',')) {
        return None;
    }
    street_match(&text[..end], end)
}

fn street_match(raw: &str, end: usize) -> Option<StreetMatch> {
    let street = raw.trim().trim_end_matches(',').trim_end();
    if street.is_empty() {
        return None;
    }
    Some(StreetMatch {
        text: street.to_string(),
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ma() -> Option<UsState> {
        state::normalize("MA")
    }

    #[test]
    fn test_sanitize_strips_scraper_tails() {
        assert_eq!(
            sanitize("12 Main St  Barre VT Website https://farm.example.com more"),
            "12 Main St Barre VT"
        );
        assert_eq!(
            sanitize("12 Main St Phone Number (802) 555-1212"),
            "12 Main St"
        );
        assert_eq!(
            sanitize("Barre, VT Description Grass-fed jerseys"),
            "Barre, VT"
        );
        assert_eq!(sanitize("Barre, VT, USA"), "Barre, VT");
    }

    #[test]
    fn test_sanitize_splits_glued_words() {
        assert_eq!(sanitize("12 Mill StreetBarre, VT"), "12 Mill Street, Barre, VT");
    }

    #[test]
    fn test_postal_code_lengths() {
        assert_eq!(postal_code("Hadley MA 01035"), Some("01035".to_string()));
        assert_eq!(postal_code("Hadley MA 1035"), Some("01035".to_string()));
        assert_eq!(postal_code("Hadley MA 103"), None);
        assert_eq!(postal_code("Hadley MA 103500"), None);
        assert_eq!(postal_code("Hadley 1035 MA 01035"), Some("01035".to_string()));
    }

    #[test]
    fn test_pad_postal_code() {
        assert_eq!(pad_postal_code("1267"), Some("01267".to_string()));
        assert_eq!(pad_postal_code("01267"), Some("01267".to_string()));
        assert_eq!(pad_postal_code("12a4"), None);
        assert_eq!(pad_postal_code("123"), None);
    }

    #[test]
    fn test_state_prefers_full_name() {
        let (state, token) = state_in_text("Hadley, Massachusetts near NY line").unwrap();
        assert_eq!(state.code(), "MA");
        assert_eq!(token, "Massachusetts");

        let (state, token) = state_in_text("Concord new-hampshire").unwrap();
        assert_eq!(state.code(), "NH");
        assert_eq!(token, "new-hampshire");

        let (state, _) = state_in_text("Charleston West Virginia").unwrap();
        assert_eq!(state.code(), "WV");
    }

    #[test]
    fn test_state_codes_are_case_sensitive() {
        assert!(state_in_text("come in or call me").is_none());
        assert_eq!(state_in_text("Barre VT").map(|(s, _)| s.code()), Some("VT"));
    }

    #[test]
    fn test_city_patterns() {
        assert_eq!(city_before_comma("Barre, VT"), Some("Barre".to_string()));
        assert_eq!(
            city_after_period("12 Old Rd.Warwick, MA"),
            Some("Warwick".to_string())
        );
        assert_eq!(
            city_before_state("Boston MA 01267", "MA"),
            Some("Boston".to_string())
        );
        assert_eq!(
            city_before_state("Greenfield Massachusetts", "Massachusetts"),
            Some("Greenfield".to_string())
        );
        assert_eq!(city_before_state("MA 01267", "MA"), None);
        assert_eq!(
            city_before_state("Concord New Hampshire", "new-hampshire"),
            Some("Concord".to_string())
        );
        assert_eq!(city_before_state("Boston MA", "XX"), None);
    }

    #[test]
    fn test_city_rejects_state_names() {
        assert_eq!(city_before_comma("Vermont, somewhere"), None);
    }

    #[test]
    fn test_street_patterns() {
        let street = street_with_suffix("123 Farm Rd Boston MA").unwrap();
        assert_eq!(street.text, "123 Farm Rd");
        assert_eq!(street.end, "123 Farm Rd".len());

        let street = street_with_suffix("9 Elm St., Barre").unwrap();
        assert_eq!(street.text, "9 Elm St.");

        let street = street_leading_run("45 Orchard Bend, Hadley").unwrap();
        assert_eq!(street.text, "45 Orchard Bend");

        assert!(street_leading_run("45 Orchard Bend #2 Hadley").is_none());
        assert!(street_leading_run("45 Orchard Bend Hadley MA 01035").is_none());
        assert!(street_leading_run("45 Orchard Bend 1035").is_none());

        let street = street_leading_run("45 Route 9, Hadley").unwrap();
        assert_eq!(street.text, "45 Route 9");
        assert!(street_with_suffix("Farm Rd Boston").is_none());
    }

    #[test]
    fn test_extract_full_blob() {
        let pieces = extract("123 Farm Rd Boston MA 01267 Phone Number 555-123-4567", None);
        assert_eq!(pieces.street.as_deref(), Some("123 Farm Rd"));
        assert_eq!(pieces.city.as_deref(), Some("Boston"));
        assert_eq!(pieces.state.map(|s| s.code()), Some("MA"));
        assert_eq!(pieces.postal_code.as_deref(), Some("01267"));
        assert_eq!(pieces.sanitized_text, "123 Farm Rd Boston MA 01267");
    }

    #[test]
    fn test_extract_street_number_is_not_postal() {
        let pieces = extract("1234 Main St, Barre, VT", None);
        assert_eq!(pieces.street.as_deref(), Some("1234 Main St"));
        assert_eq!(pieces.city.as_deref(), Some("Barre"));
        assert_eq!(pieces.postal_code, None);
    }

    #[test]
    fn test_extract_suffixless_street_keeps_trailing_postal_code() {
        let pieces = extract("45 Orchard Bend Hadley MA 01035", None);
        assert_eq!(pieces.postal_code.as_deref(), Some("01035"));
        assert_eq!(pieces.state.map(|s| s.code()), Some("MA"));
        assert_eq!(pieces.street, None);

        let pieces = extract("45 Orchard Bend Hadley 1035", None);
        assert_eq!(pieces.postal_code.as_deref(), Some("01035"));
        assert_eq!(pieces.street, None);

        let pieces = extract("1234 Orchard Bend, Hadley, MA 1035", None);
        assert_eq!(pieces.street.as_deref(), Some("1234 Orchard Bend"));
        assert_eq!(pieces.postal_code.as_deref(), Some("01035"));
    }

    #[test]
    fn test_without_house_number() {
        assert_eq!(without_house_number("45 Orchard Bend Hadley"), "Orchard Bend Hadley");
        assert_eq!(without_house_number("01035"), "01035");
        assert_eq!(without_house_number("Hadley MA 01035"), "Hadley MA 01035");
    }

    #[test]
    fn test_extract_uses_default_state() {
        let pieces = extract("Greenfield 1301", ma());
        assert_eq!(pieces.state, ma());
        assert_eq!(pieces.postal_code.as_deref(), Some("01301"));
        assert_eq!(pieces.city, None);

        let pieces = extract("Greenfield MA", None);
        assert_eq!(pieces.city.as_deref(), Some("Greenfield"));
    }

    #[test]
    fn test_extract_fields_are_independent() {
        let pieces = extract("somewhere out back", None);
        assert_eq!(pieces.street, None);
        assert_eq!(pieces.city, None);
        assert_eq!(pieces.state, None);
        assert_eq!(pieces.postal_code, None);
        assert_eq!(pieces.sanitized_text, "somewhere out back");
    }
}
