//! `%`-style conversion specifiers: `%[flags][width][.precision]type`.
//!
//! Shared by record message interpolation and `%(name)s` templates.

use serde_json::Value;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::FormatError;
use crate::record::display_value;

/// One parsed conversion specifier, everything after the `%` (or after
/// `%(name)` in templates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConversionSpec {
    left_align: bool,
    zero_pad: bool,
    plus_sign: bool,
    space_sign: bool,
    alternate: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: char,
}

impl ConversionSpec {
    /// Read flags, width, precision, an optional length modifier and the
    /// conversion character from `chars`.
    pub(crate) fn parse(chars: &mut Peekable<Chars<'_>>) -> Result<Self, FormatError> {
        let mut spec = ConversionSpec {
            left_align: false,
            zero_pad: false,
            plus_sign: false,
            space_sign: false,
            alternate: false,
            width: None,
            precision: None,
            conversion: 's',
        };

        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left_align = true,
                '0' => spec.zero_pad = true,
                '+' => spec.plus_sign = true,
                ' ' => spec.space_sign = true,
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }

        spec.width = read_number(chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(read_number(chars).unwrap_or(0));
        }
        while matches!(chars.peek(), Some('h' | 'l' | 'L')) {
            chars.next();
        }

        spec.conversion = match chars.next() {
            Some(
                c @ ('s' | 'r' | 'a' | 'd' | 'i' | 'u' | 'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x'
                | 'X' | 'o' | 'c'),
            ) => c,
            Some(other) => return Err(FormatError::UnsupportedPlaceholder(other)),
            None => return Err(FormatError::UnsupportedPlaceholder('%')),
        };
        Ok(spec)
    }

    /// Render `value` according to this specifier.
    ///
    /// A value that does not fit a numeric conversion is rendered as text.
    pub(crate) fn render(&self, value: &Value) -> String {
        match self.conversion {
            's' => self.pad("", self.truncate(display_value(value)), false),
            'r' | 'a' => self.pad("", self.truncate(value.to_string()), false),
            'c' => {
                let text = integer(value)
                    .and_then(|n| u32::try_from(n).ok())
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| display_value(value));
                self.pad("", text, false)
            }
            'd' | 'i' | 'u' | 'x' | 'X' | 'o' => match integer(value) {
                Some(n) => self.render_integer(n),
                None => self.pad("", display_value(value), false),
            },
            _ => match float(value) {
                Some(f) => self.render_float(f),
                None => self.pad("", display_value(value), false),
            },
        }
    }

    fn render_integer(&self, n: i128) -> String {
        let magnitude = n.unsigned_abs();
        let (prefix, mut digits) = match self.conversion {
            'x' => ("0x", format!("{:x}", magnitude)),
            'X' => ("0X", format!("{:X}", magnitude)),
            'o' => ("0o", format!("{:o}", magnitude)),
            _ => ("", magnitude.to_string()),
        };
        if let Some(precision) = self.precision {
            if digits.len() < precision {
                digits = format!("{}{}", "0".repeat(precision - digits.len()), digits);
            }
        }
        let mut sign = self.sign(n < 0).to_string();
        if self.alternate {
            sign.push_str(prefix);
        }
        self.pad(&sign, digits, true)
    }

    fn render_float(&self, f: f64) -> String {
        let upper = self.conversion.is_ascii_uppercase();
        let negative = f.is_sign_negative() && !f.is_nan();
        let magnitude = f.abs();

        let body = if !magnitude.is_finite() {
            let text = if magnitude.is_nan() { "nan" } else { "inf" };
            if upper {
                text.to_ascii_uppercase()
            } else {
                text.to_string()
            }
        } else {
            match self.conversion {
                'e' | 'E' => exponential(magnitude, self.precision.unwrap_or(6), upper),
                'g' | 'G' => general(magnitude, self.precision, upper, self.alternate),
                _ => format!("{:.*}", self.precision.unwrap_or(6), magnitude),
            }
        };
        self.pad(self.sign(negative), body, magnitude.is_finite())
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus_sign {
            "+"
        } else if self.space_sign {
            " "
        } else {
            ""
        }
    }

    fn truncate(&self, text: String) -> String {
        match self.precision {
            Some(precision) => text.chars().take(precision).collect(),
            None => text,
        }
    }

    fn pad(&self, sign: &str, body: String, numeric: bool) -> String {
        let len = sign.chars().count() + body.chars().count();
        let width = self.width.unwrap_or(0);
        if len >= width {
            return format!("{}{}", sign, body);
        }
        let fill = width - len;
        if self.left_align {
            format!("{}{}{}", sign, body, " ".repeat(fill))
        } else if self.zero_pad && numeric {
            format!("{}{}{}", sign, "0".repeat(fill), body)
        } else {
            format!("{}{}{}", " ".repeat(fill), sign, body)
        }
    }
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut number: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        number = Some(number.unwrap_or(0).saturating_mul(10).saturating_add(digit as usize));
        chars.next();
    }
    number
}

fn integer(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .or_else(|| n.as_f64().map(|f| f.trunc() as i128)),
        Value::Bool(b) => Some(i128::from(*b)),
        _ => None,
    }
}

fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// `1.234568e+04`: at least two exponent digits, always signed.
fn exponential(magnitude: f64, precision: usize, upper: bool) -> String {
    let (mantissa, exponent) = split_exponent(magnitude, precision);
    format!(
        "{}{}{}{:02}",
        mantissa,
        if upper { 'E' } else { 'e' },
        if exponent < 0 { '-' } else { '+' },
        exponent.unsigned_abs()
    )
}

fn split_exponent(magnitude: f64, precision: usize) -> (String, i32) {
    let scientific = format!("{:.*e}", precision, magnitude);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa.to_string(), exponent.parse().unwrap_or(0)),
        None => (scientific, 0),
    }
}

/// Fixed or exponential notation, whichever is shorter for `precision`
/// significant digits, with trailing zeros removed unless `alternate`.
fn general(magnitude: f64, precision: Option<usize>, upper: bool, alternate: bool) -> String {
    let significant = precision.unwrap_or(6).max(1);
    let exponent = if magnitude == 0.0 {
        0
    } else {
        split_exponent(magnitude, significant - 1).1
    };

    if exponent >= -4 && exponent < significant as i32 {
        let decimals = (significant as i32 - 1 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", decimals, magnitude);
        if alternate {
            fixed
        } else {
            strip_zeros(&fixed)
        }
    } else {
        let text = exponential(magnitude, significant - 1, upper);
        if alternate {
            return text;
        }
        match text.find(&['e', 'E'][..]) {
            Some(at) => format!("{}{}", strip_zeros(&text[..at]), &text[at..]),
            None => text,
        }
    }
}

fn strip_zeros(number: &str) -> String {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(spec: &str, value: Value) -> String {
        let mut chars = spec.chars().peekable();
        let spec = ConversionSpec::parse(&mut chars).unwrap();
        assert!(chars.next().is_none(), "trailing input after specifier");
        spec.render(&value)
    }

    #[test]
    fn flags_width_and_precision() {
        assert_eq!(render("5s", json!("ab")), "   ab");
        assert_eq!(render("-5s", json!("ab")), "ab   ");
        assert_eq!(render(".2s", json!("abcdef")), "ab");
        assert_eq!(render("05d", json!(-42)), "-0042");
        assert_eq!(render("+d", json!(5)), "+5");
        assert_eq!(render(" d", json!(5)), " 5");
        assert_eq!(render(".3d", json!(7)), "007");
        assert_eq!(render("ld", json!(7)), "7");
    }

    #[test]
    fn integer_bases() {
        assert_eq!(render("x", json!(255)), "ff");
        assert_eq!(render("X", json!(255)), "FF");
        assert_eq!(render("#x", json!(255)), "0xff");
        assert_eq!(render("#06x", json!(255)), "0x00ff");
        assert_eq!(render("o", json!(8)), "10");
        assert_eq!(render("x", json!(-255)), "-ff");
        assert_eq!(render("d", json!(3.9)), "3");
        assert_eq!(render("c", json!(65)), "A");
    }

    #[test]
    fn float_notations() {
        assert_eq!(render(".2f", json!(3.14159)), "3.14");
        assert_eq!(render("f", json!(1.5)), "1.500000");
        assert_eq!(render("8.3f", json!(-1.5)), "  -1.500");
        assert_eq!(render("e", json!(12345.678)), "1.234568e+04");
        assert_eq!(render(".1E", json!(0.00012)), "1.2E-04");
        assert_eq!(render("g", json!(0.0001)), "0.0001");
        assert_eq!(render("g", json!(100.0)), "100");
        assert_eq!(render("g", json!(1234567.0)), "1.23457e+06");
        assert_eq!(render("G", json!(0.00001)), "1E-05");
        assert_eq!(render("g", json!(0.0)), "0");
    }

    #[test]
    fn non_numeric_values_fall_back_to_text() {
        assert_eq!(render("d", json!("seven")), "seven");
        assert_eq!(render("5.1f", json!(null)), " null");
        assert_eq!(render("r", json!("x")), "\"x\"");
    }

    #[test]
    fn unknown_conversion_is_rejected() {
        let mut chars = "5q".chars().peekable();
        assert!(matches!(
            ConversionSpec::parse(&mut chars),
            Err(FormatError::UnsupportedPlaceholder('q'))
        ));

        let mut chars = "-".chars().peekable();
        assert!(matches!(
            ConversionSpec::parse(&mut chars),
            Err(FormatError::UnsupportedPlaceholder('%'))
        ));
    }
}
