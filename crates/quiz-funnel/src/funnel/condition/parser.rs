use super::{Clause, Comparison, ParsedCondition};

const CLAUSE_SEPARATOR: &str = " and ";

/// Typed failure for condition text that cannot be turned into clauses.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionParseError {
    #[error("condition text is empty")]
    Empty,
    #[error("unsupported operator in clause '{clause}'")]
    UnsupportedOperator { clause: String },
    #[error("clause '{clause}' has no parameter name")]
    MissingParameter { clause: String },
    #[error("clause '{clause}' has a non-numeric threshold '{raw}'")]
    InvalidThreshold { clause: String, raw: String },
}

pub(crate) fn parse(text: &str) -> Result<ParsedCondition, ConditionParseError> {
    if text.trim().is_empty() {
        return Err(ConditionParseError::Empty);
    }

    let clauses = text
        .split(CLAUSE_SEPARATOR)
        .map(parse_clause)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedCondition { clauses })
}

fn parse_clause(raw: &str) -> Result<Clause, ConditionParseError> {
    let clause = raw.trim();

    // `>` is probed before `<`, so a clause containing both splits on `>`.
    let (comparison, (parameter, rest)) = if let Some(parts) = clause.split_once(" > ") {
        (Comparison::GreaterThan, parts)
    } else if let Some(parts) = clause.split_once(" < ") {
        (Comparison::LessThan, parts)
    } else {
        return Err(ConditionParseError::UnsupportedOperator {
            clause: clause.to_string(),
        });
    };

    let parameter = parameter.trim();
    if parameter.is_empty() {
        return Err(ConditionParseError::MissingParameter {
            clause: clause.to_string(),
        });
    }

    // Only the segment up to a repeated operator is the threshold: `p1 > 1 > 2` compares with 1.
    let segment = rest.split(comparison.separator()).next().unwrap_or(rest);
    let threshold = leading_float(segment).ok_or_else(|| ConditionParseError::InvalidThreshold {
        clause: clause.to_string(),
        raw: segment.trim().to_string(),
    })?;

    Ok(Clause {
        parameter: parameter.to_string(),
        comparison,
        threshold,
    })
}

/// Reads the longest decimal literal at the start of `raw`, ignoring whatever trails it, so
/// `5abc` reads as 5. Returns `None` when no digits lead the text.
fn leading_float(raw: &str) -> Option<f64> {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if text[end..].starts_with("Infinity") {
        let infinity = f64::INFINITY;
        return Some(if bytes[0] == b'-' { -infinity } else { infinity });
    }

    let digits = |from: usize| bytes[from..].iter().take_while(|b| b.is_ascii_digit()).count();

    let integral = digits(end);
    end += integral;
    let mut fractional = 0;
    if bytes.get(end) == Some(&b'.') {
        fractional = digits(end + 1);
        if integral > 0 || fractional > 0 {
            end += 1 + fractional;
        }
    }
    if integral == 0 && fractional == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_digits = digits(exponent);
        if exponent_digits > 0 {
            end = exponent + exponent_digits;
        }
    }

    text[..end].parse::<f64>().ok()
}
