use crate::Error;
use std::{fmt, str::FromStr};

/// A seed and a step count that together identify exactly one run.
///
/// Formatted (and parsed) as `<seed>:<steps>`. A negative seed is accepted when parsing and
/// reinterpreted as the `u64` with the same bits, so `-1:20` and `18446744073709551615:20` name
/// the same path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    pub seed: u64,
    pub steps: u64,
}

impl Path {
    pub const fn new(seed: u64, steps: u64) -> Self {
        Self { seed, steps }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seed, self.steps)
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (seed, steps) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidPath(format!("expected <seed>:<steps>, got {s:?}")))?;
        let seed = parse_seed(seed.trim())?;
        let steps = steps
            .trim()
            .parse()
            .map_err(|err| Error::InvalidPath(format!("steps {steps:?}: {err}")))?;
        Ok(Self { seed, steps })
    }
}

fn parse_seed(seed: &str) -> Result<u64, Error> {
    if let Ok(seed) = seed.parse::<u64>() {
        return Ok(seed);
    }
    seed.parse::<i64>()
        .map(|seed| seed as u64)
        .map_err(|err| Error::InvalidPath(format!("seed {seed:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse() {
        let path: Path = "42:20".parse().unwrap();
        assert_eq!(path, Path::new(42, 20));
        assert_eq!(path.to_string(), "42:20");

        let path: Path = "18446744073709551615:0".parse().unwrap();
        assert_eq!(path, Path::new(u64::MAX, 0));
    }

    #[test_case("-42:20", Path::new(-42i64 as u64, 20); "negative seed")]
    #[test_case("-9223372036854775808:1", Path::new(1 << 63, 1); "minimum seed")]
    #[test_case(" 7 : 3 ", Path::new(7, 3); "padded")]
    fn test_parse_accepted(input: &str, expected: Path) {
        assert_eq!(input.parse::<Path>().unwrap(), expected);
    }

    #[test]
    fn test_negative_seed_matches_unsigned() {
        let negative: Path = "-1:20".parse().unwrap();
        let unsigned: Path = "18446744073709551615:20".parse().unwrap();
        assert_eq!(negative, unsigned);
        assert_eq!(negative.to_string().parse::<Path>().unwrap(), negative);
    }

    #[test_case(""; "empty")]
    #[test_case("42"; "missing steps")]
    #[test_case(":20"; "missing seed")]
    #[test_case("42:"; "empty steps")]
    #[test_case("a:20"; "non numeric seed")]
    #[test_case("-:20"; "bare minus seed")]
    #[test_case("-9223372036854775809:20"; "seed below minimum")]
    #[test_case("42:-1"; "negative steps")]
    #[test_case("42:20:1"; "extra field")]
    fn test_parse_invalid(input: &str) {
        assert!(matches!(input.parse::<Path>(), Err(Error::InvalidPath(_))));
    }
}
