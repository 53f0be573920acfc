//! Locale-independent decimal patterns for the `@decfmt` function.
//!
//! Supported syntax: `prefix body suffix[;negative]`, where the body is made of
//! `#`, `0`, `,` and at most one `.`. Quoted text (`'...'`) is literal, `''` is a
//! single quote, and `%` / `‰` in an affix scale the value by 100 / 1000.

/// A malformed `@decfmt` pattern.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid decimal format pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecimalFormat {
    positive_prefix: String,
    positive_suffix: String,
    negative_prefix: String,
    negative_suffix: String,
    min_integer_digits: usize,
    grouping_size: Option<usize>,
    min_fraction_digits: usize,
    max_fraction_digits: usize,
    multiplier: f64,
}

/// One pattern half split into its parts.
struct Subpattern {
    prefix: String,
    body: String,
    suffix: String,
    multiplier: f64,
}

impl DecimalFormat {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let fail = |reason: &str| PatternError {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let (positive, negative) = split_negative(pattern);
        let positive = split_subpattern(positive).map_err(|reason| fail(reason))?;
        let negative = negative
            .map(split_subpattern)
            .transpose()
            .map_err(|reason| fail(reason))?;

        let (integer, fraction) = match positive.body.split_once('.') {
            Some((_, fraction)) if fraction.contains('.') => return Err(fail("multiple decimal separators")),
            Some((integer, fraction)) => (integer, fraction),
            None => (positive.body.as_str(), ""),
        };
        if !positive.body.contains(['#', '0']) {
            return Err(fail("missing digit placeholders"));
        }

        let mut seen_zero = false;
        for c in integer.chars() {
            match c {
                '0' => seen_zero = true,
                '#' if seen_zero => return Err(fail("'#' after '0' in integer part")),
                _ => {}
            }
        }
        let grouping_size = match integer.rfind(',') {
            Some(idx) => {
                let size = integer[idx + 1..].chars().count();
                if size == 0 {
                    return Err(fail("grouping separator at end of integer part"));
                }
                Some(size)
            }
            None => None,
        };

        if fraction.contains(',') {
            return Err(fail("grouping separator in fraction part"));
        }
        let mut seen_hash = false;
        for c in fraction.chars() {
            match c {
                '#' => seen_hash = true,
                '0' if seen_hash => return Err(fail("'0' after '#' in fraction part")),
                _ => {}
            }
        }

        let (negative_prefix, negative_suffix) = match negative {
            Some(negative) => (negative.prefix, negative.suffix),
            None => (format!("-{}", positive.prefix), positive.suffix.clone()),
        };

        Ok(Self {
            min_integer_digits: integer.matches('0').count(),
            grouping_size,
            min_fraction_digits: fraction.matches('0').count(),
            max_fraction_digits: fraction.len(),
            multiplier: positive.multiplier,
            positive_prefix: positive.prefix,
            positive_suffix: positive.suffix,
            negative_prefix,
            negative_suffix,
        })
    }

    pub fn format(&self, value: f64) -> String {
        if value.is_nan() {
            return "NaN".into();
        }
        // Negative zero and values rounding to zero keep their sign: `-0`.
        let negative = value.is_sign_negative();
        let magnitude = value.abs() * self.multiplier;
        let digits = if magnitude.is_infinite() {
            "∞".to_string()
        } else {
            self.format_digits(magnitude)
        };

        let (prefix, suffix) = if negative {
            (&self.negative_prefix, &self.negative_suffix)
        } else {
            (&self.positive_prefix, &self.positive_suffix)
        };
        format!("{prefix}{digits}{suffix}")
    }

    fn format_digits(&self, magnitude: f64) -> String {
        let fixed = format!("{:.*}", self.max_fraction_digits, magnitude);
        let (integer, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

        let mut fraction = fraction.to_string();
        while fraction.len() > self.min_fraction_digits && fraction.ends_with('0') {
            fraction.pop();
        }

        let mut integer = integer.trim_start_matches('0').to_string();
        if integer.len() < self.min_integer_digits {
            integer = format!("{}{integer}", "0".repeat(self.min_integer_digits - integer.len()));
        }
        if integer.is_empty() && fraction.is_empty() {
            integer.push('0');
        }
        if let Some(size) = self.grouping_size {
            integer = group(&integer, size);
        }

        if fraction.is_empty() {
            integer
        } else {
            format!("{integer}.{fraction}")
        }
    }
}

fn group(digits: &str, size: usize) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / size);
    for (idx, c) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % size == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Split at the first unquoted `;`.
fn split_negative(pattern: &str) -> (&str, Option<&str>) {
    let mut quoted = false;
    for (idx, c) in pattern.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            ';' if !quoted => return (&pattern[..idx], Some(&pattern[idx + 1..])),
            _ => {}
        }
    }
    (pattern, None)
}

fn split_subpattern(pattern: &str) -> Result<Subpattern, &'static str> {
    #[derive(PartialEq)]
    enum Phase {
        Prefix,
        Body,
        Suffix,
    }

    let mut sub = Subpattern {
        prefix: String::new(),
        body: String::new(),
        suffix: String::new(),
        multiplier: 1.0,
    };
    let mut phase = Phase::Prefix;
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\'' {
            if phase == Phase::Body {
                phase = Phase::Suffix;
            }
            let affix = if phase == Phase::Prefix { &mut sub.prefix } else { &mut sub.suffix };
            if chars.peek() == Some(&'\'') {
                chars.next();
                affix.push('\'');
                continue;
            }
            loop {
                match chars.next() {
                    Some('\'') if chars.peek() == Some(&'\'') => {
                        chars.next();
                        affix.push('\'');
                    }
                    Some('\'') => break,
                    Some(c) => affix.push(c),
                    None => return Err("unterminated quote"),
                }
            }
            continue;
        }

        let is_body = matches!(c, '#' | '0' | ',' | '.');
        match phase {
            Phase::Prefix | Phase::Body if is_body => {
                phase = Phase::Body;
                sub.body.push(c);
                continue;
            }
            Phase::Suffix if is_body => return Err("digit placeholder in suffix"),
            Phase::Body => phase = Phase::Suffix,
            _ => {}
        }
        if c == 'E' && phase == Phase::Suffix && sub.suffix.is_empty() {
            return Err("exponent notation is not supported");
        }
        match c {
            '%' => sub.multiplier = 100.0,
            '‰' => sub.multiplier = 1000.0,
            _ => {}
        }
        if phase == Phase::Prefix {
            sub.prefix.push(c);
        } else {
            sub.suffix.push(c);
        }
    }
    Ok(sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fmt(pattern: &str, value: f64) -> String {
        DecimalFormat::parse(pattern).unwrap().format(value)
    }

    #[test]
    fn test_fraction_digits() {
        assert_eq!(fmt("0.000", 0.5), "0.500");
        assert_eq!(fmt("0.00", 3.14159), "3.14");
        assert_eq!(fmt("#.##", 0.456), ".46");
        assert_eq!(fmt("#.##", 2.0), "2");
        assert_eq!(fmt("0.0#", 1.5), "1.5");
        assert_eq!(fmt("0.0#", 1.257), "1.26");
    }

    #[test]
    fn test_integer_digits() {
        assert_eq!(fmt("#", 0.0), "0");
        assert_eq!(fmt("000", 7.0), "007");
        assert_eq!(fmt("#", 2.4), "2");
        assert_eq!(fmt("#", 3.6), "4");
    }

    #[test]
    fn test_grouping() {
        assert_eq!(fmt("#,##0.00", 1234567.891), "1,234,567.89");
        assert_eq!(fmt("#,##0", 999.0), "999");
        assert_eq!(fmt("#,####", 123456789.0), "1,2345,6789");
    }

    #[test]
    fn test_negative_values() {
        assert_eq!(fmt("0.0", -1.26), "-1.3");
        assert_eq!(fmt("0.0;(0.0)", -1.5), "(1.5)");
        assert_eq!(fmt("0", -0.2), "-0");
        assert_eq!(fmt("0.0", -0.0), "-0.0");
        assert_eq!(fmt("0;(0)", -0.2), "(0)");
    }

    #[test]
    fn test_affixes() {
        assert_eq!(fmt("0.0%", 0.125), "12.5%");
        assert_eq!(fmt("'#'0", 5.0), "#5");
        assert_eq!(fmt("0 'o''clock'", 5.0), "5 o'clock");
        assert_eq!(fmt("$#,##0.00", 1234.5), "$1,234.50");
    }

    #[test]
    fn test_special_values() {
        assert_eq!(fmt("0.00", f64::NAN), "NaN");
        assert_eq!(fmt("0.00", f64::NEG_INFINITY), "-∞");
    }

    #[test]
    fn test_invalid_patterns() {
        for pattern in ["", "abc", "0.0.0", "0#", "#.0#0", "0.0,0", "#,", "0E0", "'0"] {
            assert!(DecimalFormat::parse(pattern).is_err(), "pattern {pattern:?} should fail");
        }
    }
}
