//! Fixed-width field layout for the RPS signing string.
use crate::error::FormatError;

/// Side on which filler characters are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pad {
    Left,
    Right,
}

/// Target width of a field and how to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Width {
    pub len: usize,
    pub filler: char,
    pub side: Pad,
}

impl Width {
    pub const fn left(len: usize, filler: char) -> Self {
        Self {
            len,
            filler,
            side: Pad::Left,
        }
    }

    pub const fn right(len: usize, filler: char) -> Self {
        Self {
            len,
            filler,
            side: Pad::Right,
        }
    }
}

/// What to do with a value that is already wider than its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Fail with [FormatError::Overflow].
    Reject,
    /// Keep the value as is, producing a field wider than `len`. This is how
    /// the authority's reference implementation behaves.
    Allow,
}

/// Strip everything but ASCII digits.
pub fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Format `value` for the field called `field`.
///
/// With `numeric_only` every non-digit is removed first (tax ids and money
/// arrive with punctuation). With a `width` the value is padded with the
/// filler until it is exactly `width.len` characters long. Values are never
/// truncated: a value longer than the width is an error.
pub fn format(
    field: &'static str,
    value: &str,
    numeric_only: bool,
    width: Option<Width>,
) -> Result<String, FormatError> {
    format_with(field, value, numeric_only, width, Overflow::Reject)
}

/// [format] with a choice of what happens to over-wide values.
pub fn format_with(
    field: &'static str,
    value: &str,
    numeric_only: bool,
    width: Option<Width>,
    overflow: Overflow,
) -> Result<String, FormatError> {
    let value = prepare(value, numeric_only);
    let width = match width {
        Some(width) => width,
        None => return Ok(value),
    };

    let actual = value.chars().count();
    if actual > width.len && overflow == Overflow::Reject {
        return Err(FormatError::Overflow {
            field,
            width: width.len,
            actual,
        });
    }
    Ok(pad(value, width))
}

fn prepare(value: &str, numeric_only: bool) -> String {
    if numeric_only {
        digits(value)
    } else {
        value.to_owned()
    }
}

// Adds exactly as many fillers as are missing, none if the value is already
// at or past the width.
fn pad(value: String, width: Width) -> String {
    let missing = width.len.saturating_sub(value.chars().count());
    if missing == 0 {
        return value;
    }
    let padding: String = std::iter::repeat(width.filler).take(missing).collect();
    match width.side {
        Pad::Left => padding + &value,
        Pad::Right => value + &padding,
    }
}

/// Dates go into the signing string as `YYYYMMDD`.
pub fn date(value: &chrono::NaiveDate) -> String {
    value.format("%Y%m%d").to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numeric_only_strips_punctuation() {
        let formatted = format("cnpj", "12.345.678/0001-99", true, None).unwrap();
        assert_eq!(formatted, "12345678000199");
    }

    #[test]
    fn test_pads_left_with_zeros() {
        let formatted = format("valor", "150.00", true, Some(Width::left(15, '0'))).unwrap();
        assert_eq!(formatted, "000000000015000");
    }

    #[test]
    fn test_pads_right_with_spaces() {
        let formatted = format("serie", "A", false, Some(Width::right(5, ' '))).unwrap();
        assert_eq!(formatted, "A    ");
    }

    #[test]
    fn test_exact_width_is_untouched() {
        let formatted = format(
            "valor",
            "123456789012345",
            true,
            Some(Width::left(15, '0')),
        )
        .unwrap();
        assert_eq!(formatted, "123456789012345");
    }

    #[test]
    fn test_empty_value_is_all_filler() {
        let formatted = format("cpf", "", false, Some(Width::left(14, '0'))).unwrap();
        assert_eq!(formatted, "00000000000000");
    }

    #[test]
    fn test_overflow_is_rejected() {
        let err = format(
            "valor",
            "1.234.567.890.123.456,00",
            true,
            Some(Width::left(15, '0')),
        )
        .unwrap_err();
        assert_eq!(
            err,
            FormatError::Overflow {
                field: "valor",
                width: 15,
                actual: 18
            }
        );
    }

    #[test]
    fn test_allowed_overflow_keeps_value() {
        let formatted = format_with(
            "serie",
            "ABCDEFG",
            false,
            Some(Width::right(5, ' ')),
            Overflow::Allow,
        )
        .unwrap();
        assert_eq!(formatted, "ABCDEFG");
    }

    #[test]
    fn test_width_counts_characters_not_bytes() {
        let formatted = format("serie", "É", false, Some(Width::right(3, ' '))).unwrap();
        assert_eq!(formatted, "É  ");
    }

    #[test]
    fn test_date_is_digits_only() {
        let date = chrono::NaiveDate::from_ymd_opt(2020, 1, 15).unwrap();
        assert_eq!(super::date(&date), "20200115");
    }
}
