//! Channel conversion rules
//!
//! MDF stores raw values and a conversion rule per channel. This module
//! holds the rules this crate understands and applies them to decoded raw
//! values. Rules are parsed from CC blocks by the version specific readers.

use crate::types::Value;

/// Physical value conversion attached to a channel
#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// 1:1, the raw value is kept with its integer type
    Identity,
    /// phys = raw * factor + offset
    Linear { offset: f64, factor: f64 },
    /// phys = (p1*x² + p2*x + p3) / (p4*x² + p5*x + p6)
    Rational([f64; 6]),
    /// MDF 3 polynomial: phys = (p2 - p4*(x - p5 - p6)) / (p3*(x - p5 - p6) - p1)
    Polynomial([f64; 6]),
    /// MDF 3 exponential
    Exponential([f64; 7]),
    /// MDF 3 logarithmic
    Logarithmic([f64; 7]),
    /// Value to value table, linear interpolation between keys
    TableInterpolated(Vec<(f64, f64)>),
    /// Value to value table, nearest key
    Table(Vec<(f64, f64)>),
    /// Value to text table
    ValueToText {
        pairs: Vec<(f64, String)>,
        default: Option<String>,
    },
    /// Value range to text table, ranges are (lower, upper, text)
    RangeToText {
        ranges: Vec<(f64, f64, String)>,
        default: Option<String>,
    },
    /// A rule this crate does not evaluate; raw values pass through
    Unsupported(String),
}

impl Default for Conversion {
    fn default() -> Self {
        Conversion::Identity
    }
}

impl Conversion {
    /// Apply the rule to one raw value
    pub fn apply(&self, raw: Value) -> Value {
        let x = match raw.as_f64() {
            Some(x) => x,
            // text, byte arrays and invalid samples are not converted
            None => return raw,
        };

        match self {
            Conversion::Identity | Conversion::Unsupported(_) => raw,
            Conversion::Linear { offset, factor } => {
                if *factor == 1.0 && *offset == 0.0 {
                    raw
                } else {
                    Value::Float(x * factor + offset)
                }
            }
            Conversion::Rational(p) => {
                let denominator = p[3] * x * x + p[4] * x + p[5];
                if denominator == 0.0 {
                    Value::Empty
                } else {
                    Value::Float((p[0] * x * x + p[1] * x + p[2]) / denominator)
                }
            }
            Conversion::Polynomial(p) => {
                let shifted = x - p[4] - p[5];
                let denominator = p[2] * shifted - p[0];
                if denominator == 0.0 {
                    Value::Empty
                } else {
                    Value::Float((p[1] - p[3] * shifted) / denominator)
                }
            }
            Conversion::Exponential(p) => finite_or_empty(exponential(p, x)),
            Conversion::Logarithmic(p) => finite_or_empty(logarithmic(p, x)),
            Conversion::TableInterpolated(pairs) => match interpolate(pairs, x) {
                Some(v) => Value::Float(v),
                None => raw,
            },
            Conversion::Table(pairs) => match nearest(pairs, x) {
                Some(v) => Value::Float(v),
                None => raw,
            },
            Conversion::ValueToText { pairs, default } => pairs
                .iter()
                .find(|(key, _)| *key == x)
                .map(|(_, text)| Value::Text(text.clone()))
                .or_else(|| default.clone().map(Value::Text))
                .unwrap_or(raw),
            Conversion::RangeToText { ranges, default } => {
                let integer = !matches!(raw, Value::Float(_));
                ranges
                    .iter()
                    .find(|(lower, upper, _)| {
                        if integer {
                            x >= *lower && x <= *upper
                        } else {
                            x >= *lower && x < *upper
                        }
                    })
                    .map(|(_, _, text)| Value::Text(text.clone()))
                    .or_else(|| default.clone().map(Value::Text))
                    .unwrap_or(raw)
            }
        }
    }

    /// Short name of the rule for the inspection summary
    pub fn describe(&self) -> String {
        match self {
            Conversion::Identity => "identity".to_string(),
            Conversion::Linear { offset, factor } => format!("linear ({factor} * x + {offset})"),
            Conversion::Rational(_) => "rational".to_string(),
            Conversion::Polynomial(_) => "polynomial".to_string(),
            Conversion::Exponential(_) => "exponential".to_string(),
            Conversion::Logarithmic(_) => "logarithmic".to_string(),
            Conversion::TableInterpolated(pairs) => {
                format!("table with interpolation ({} points)", pairs.len())
            }
            Conversion::Table(pairs) => format!("table ({} points)", pairs.len()),
            Conversion::ValueToText { pairs, .. } => format!("value to text ({} entries)", pairs.len()),
            Conversion::RangeToText { ranges, .. } => {
                format!("range to text ({} ranges)", ranges.len())
            }
            Conversion::Unsupported(name) => format!("{name} (not applied)"),
        }
    }
}

fn finite_or_empty(v: f64) -> Value {
    if v.is_finite() {
        Value::Float(v)
    } else {
        Value::Empty
    }
}

fn exponential(p: &[f64; 7], x: f64) -> f64 {
    let shifted = x - p[6];
    if p[3] == 0.0 {
        (((shifted * p[5]) - p[2]) / p[0]).ln() / p[1]
    } else if p[0] == 0.0 {
        ((p[2] / shifted - p[5]) / p[3]).ln() / p[4]
    } else {
        f64::NAN
    }
}

fn logarithmic(p: &[f64; 7], x: f64) -> f64 {
    let shifted = x - p[6];
    if p[3] == 0.0 {
        (((shifted * p[5]) - p[2]) / p[0]).exp() / p[1]
    } else if p[0] == 0.0 {
        ((p[2] / shifted - p[5]) / p[3]).exp() / p[4]
    } else {
        f64::NAN
    }
}

/// Linear interpolation over sorted (key, value) pairs, clamped at the ends
fn interpolate(pairs: &[(f64, f64)], x: f64) -> Option<f64> {
    let (first, last) = (pairs.first()?, pairs.last()?);
    if x <= first.0 {
        return Some(first.1);
    }
    if x >= last.0 {
        return Some(last.1);
    }
    pairs.windows(2).find_map(|w| {
        let ((k0, v0), (k1, v1)) = (w[0], w[1]);
        if x >= k0 && x <= k1 {
            if k1 == k0 {
                Some(v0)
            } else {
                Some(v0 + (v1 - v0) * (x - k0) / (k1 - k0))
            }
        } else {
            None
        }
    })
}

/// Value of the nearest key; ties go to the lower key
fn nearest(pairs: &[(f64, f64)], x: f64) -> Option<f64> {
    let (first, last) = (pairs.first()?, pairs.last()?);
    if x <= first.0 {
        return Some(first.1);
    }
    if x >= last.0 {
        return Some(last.1);
    }
    pairs.windows(2).find_map(|w| {
        let ((k0, v0), (k1, v1)) = (w[0], w[1]);
        if x >= k0 && x <= k1 {
            if x - k0 <= k1 - x {
                Some(v0)
            } else {
                Some(v1)
            }
        } else {
            None
        }
    })
}
