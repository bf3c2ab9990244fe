//! Score extraction from the first line of script output.

use crate::error::FetchError;
use crate::model::OutputFormat;

const SCORE_KEY: &str = "score";

/// Extract the score from one line of script output.
pub fn parse_score(line: &str, format: OutputFormat) -> Result<f64, FetchError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(FetchError::NoOutputProduced);
    }

    match format {
        OutputFormat::Plain => parse_value(trimmed),
        OutputFormat::Record => parse_record(trimmed),
        OutputFormat::Json => match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(v) => parse_json(&v, trimmed),
            Err(e) => Err(FetchError::MalformedOutput(e.to_string())),
        },
        OutputFormat::Auto => {
            let plain = parse_value(trimmed);
            // Without a key separator the line can only be a bare number.
            if plain.is_ok() || !trimmed.contains(':') {
                return plain;
            }
            match serde_json::from_str::<serde_json::Value>(trimmed) {
                Ok(v) if v.is_object() => parse_json(&v, trimmed),
                _ => parse_record(trimmed),
            }
        }
    }
}

fn parse_json(v: &serde_json::Value, line: &str) -> Result<f64, FetchError> {
    let obj = v
        .as_object()
        .ok_or_else(|| FetchError::MalformedOutput(format!("expected a JSON object: {line}")))?;
    let score = obj.get(SCORE_KEY).ok_or_else(|| FetchError::KeyNotFound {
        line: line.to_string(),
    })?;
    match score.as_f64() {
        Some(x) if x.is_finite() => Ok(x),
        _ => Err(FetchError::ValueParseFailure {
            raw: score.to_string(),
        }),
    }
}

/// Parse an informal `{key: number, key: number}` record.
///
/// Keys may be bare or quoted. Only the `score` pair has to be well formed;
/// the value runs from its colon up to the next `,` or `}`.
fn parse_record(line: &str) -> Result<f64, FetchError> {
    let body = line.strip_prefix('{').unwrap_or(line);

    let mut rest = body;
    while !rest.is_empty() {
        let (key, after_key) = match rest.split_once(':') {
            Some(parts) => parts,
            None => break,
        };
        let end = after_key.find([',', '}']).unwrap_or(after_key.len());
        let raw = &after_key[..end];

        if unquote(key) == SCORE_KEY {
            return parse_value(raw.trim());
        }

        rest = after_key.get(end + 1..).unwrap_or("");
    }

    Err(FetchError::KeyNotFound {
        line: line.to_string(),
    })
}

fn unquote(key: &str) -> &str {
    key.trim()
        .trim_start_matches(['{', ','])
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
}

fn parse_value(raw: &str) -> Result<f64, FetchError> {
    match raw.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(FetchError::ValueParseFailure {
            raw: raw.to_string(),
        }),
    }
}
