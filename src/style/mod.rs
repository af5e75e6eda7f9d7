//! Inline style attribute reading.
//!
//! Hosts hand over authored `style="..."` strings verbatim. This module pulls
//! out the handful of properties the engine reads: pixel lengths, font sizes
//! and the page container's `background-image` locator.

const URL_FUNCTION: &str = "url(";
const PX_UNIT: &str = "px";

/// Parsed `name: value` pairs of one inline style attribute, in authored order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn parse(source: &str) -> Self {
        let declarations = split_declarations(source)
            .into_iter()
            .filter_map(|declaration| {
                let (name, value) = declaration.split_once(':')?;
                let name = name.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, value.trim().to_string()))
            })
            .collect();
        Self { declarations }
    }

    /// Last declaration wins, matching cascade order inside one attribute.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn px(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(parse_px)
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

// Semicolons inside quotes or parentheses (e.g. `url("a;b.png")`) do not end a declaration.
fn split_declarations(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0_u32;
    let mut quote: Option<char> = None;

    for (index, ch) in source.char_indices() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&source[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Reads a pixel length: a leading decimal number with an optional `px` unit.
///
/// Any other unit, trailing garbage, or a non-finite number is not a pixel
/// length and yields `None`.
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number_len = leading_number_len(value);
    if number_len == 0 {
        return None;
    }
    let (number, unit) = value.split_at(number_len);
    let unit = unit.trim();
    if !unit.is_empty() && !unit.eq_ignore_ascii_case(PX_UNIT) {
        return None;
    }
    number.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}

fn leading_number_len(value: &str) -> usize {
    let bytes = value.as_bytes();
    let mut index = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        index += 1;
    }

    let integer_start = index;
    while bytes.get(index).is_some_and(u8::is_ascii_digit) {
        index += 1;
    }
    let mut digits = index - integer_start;

    if bytes.get(index) == Some(&b'.') {
        let fraction_start = index + 1;
        let mut end = fraction_start;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        if end > fraction_start || digits > 0 {
            digits += end - fraction_start;
            index = end;
        }
    }

    if digits == 0 {
        return 0;
    }

    if matches!(bytes.get(index), Some(b'e' | b'E')) {
        let mut end = index + 1;
        if matches!(bytes.get(end), Some(b'+' | b'-')) {
            end += 1;
        }
        let exponent_start = end;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
        if end > exponent_start {
            index = end;
        }
    }

    index
}

/// Extracts the raw locator from a `background-image` value such as `url("a.png")`.
pub fn background_image_url(value: &str) -> Option<&str> {
    let value = value.trim();
    let prefix = value.get(..URL_FUNCTION.len())?;
    if !prefix.eq_ignore_ascii_case(URL_FUNCTION) {
        return None;
    }
    let inner = value[URL_FUNCTION.len()..].strip_suffix(')')?.trim();
    let inner = strip_matching_quotes(inner);
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}

fn strip_matching_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(stripped) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return stripped;
        }
    }
    value
}

/// Percent-decodes a locator, keeping the raw text when it is not valid UTF-8 after decoding.
pub fn decode_locator(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(err) => {
            tracing::warn!(locator = raw, %err, "could not percent-decode locator; using it verbatim");
            raw.to_string()
        }
    }
}
