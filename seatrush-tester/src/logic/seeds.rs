use std::collections::HashSet;

use thiserror::Error;

/// Upper bound on seeds a single range token may expand to.
const MAX_RANGE_SEEDS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    #[error("unrecognized seed token: {0}")]
    Unrecognized(String),
    #[error("seed range '{0}' is empty or larger than {MAX_RANGE_SEEDS} seeds")]
    BadRange(String),
    #[error("no seeds supplied")]
    Empty,
}

/// Resolve CLI seed arguments into a de-duplicated list, keeping first-seen
/// order.
///
/// Accepts decimal integers (negative values use their magnitude), `0x` hex
/// literals and half-open ranges such as `10..20`.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>, SeedError> {
    let mut seen = HashSet::new();
    let mut seeds = Vec::new();
    for token in tokens.iter().map(|token| token.trim()) {
        if token.is_empty() {
            continue;
        }
        for seed in parse_token(token)? {
            if seen.insert(seed) {
                seeds.push(seed);
            }
        }
    }
    if seeds.is_empty() {
        return Err(SeedError::Empty);
    }
    Ok(seeds)
}

fn parse_token(token: &str) -> Result<Vec<u64>, SeedError> {
    if let Some((start, end)) = token.split_once("..") {
        let (Some(start), Some(end)) = (parse_single(start), parse_single(end)) else {
            return Err(SeedError::Unrecognized(token.to_string()));
        };
        if start >= end || end - start > MAX_RANGE_SEEDS {
            return Err(SeedError::BadRange(token.to_string()));
        }
        return Ok((start..end).collect());
    }
    parse_single(token)
        .map(|seed| vec![seed])
        .ok_or_else(|| SeedError::Unrecognized(token.to_string()))
}

fn parse_single(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Some(hex) = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
    {
        return u64::from_str_radix(&hex.replace('_', ""), 16).ok();
    }
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<i64>().ok().map(i64::unsigned_abs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn parses_decimal_hex_and_negative_seeds() {
        let seeds = resolve_seed_inputs(&tokens(&["1337", "0xBEEF", "-4"])).unwrap();
        assert_eq!(seeds, vec![1337, 0xBEEF, 4]);
    }

    #[test]
    fn ranges_expand_and_duplicates_collapse() {
        let seeds = resolve_seed_inputs(&tokens(&["3..6", "4", " ", "0x3"])).unwrap();
        assert_eq!(seeds, vec![3, 4, 5]);
    }

    #[test]
    fn bad_tokens_are_reported() {
        assert_eq!(
            resolve_seed_inputs(&tokens(&["seat"])),
            Err(SeedError::Unrecognized("seat".into()))
        );
        assert_eq!(
            resolve_seed_inputs(&tokens(&["9..2"])),
            Err(SeedError::BadRange("9..2".into()))
        );
        assert_eq!(resolve_seed_inputs(&tokens(&[""])), Err(SeedError::Empty));
    }
}
