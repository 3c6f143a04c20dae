use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Dotted numeric version of arbitrary length (`1`, `1.0`, `1.2.10.4`).
///
/// Missing trailing components compare as zero, so `1.0` and `1.0.0` are
/// equal. Components are kept as digit strings without leading zeros, so
/// their width is unbounded.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("version string is empty")]
    Empty,
    #[error("invalid version component {index} in {input:?}: {value:?}")]
    InvalidComponent {
        input: String,
        index: usize,
        value: String,
    },
}

impl Version {
    #[must_use]
    pub fn new(components: &[u64]) -> Self {
        Self {
            components: components.iter().map(u64::to_string).collect(),
        }
    }

    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Version of the running launcher binary.
    #[must_use]
    pub fn current() -> Self {
        env!("CARGO_PKG_VERSION")
            .parse()
            .unwrap_or_else(|_| Self::new(&[0]))
    }
}

/// Compare two versions component-wise, padding the shorter one with zeros.
#[must_use]
pub fn compare(a: &Version, b: &Version) -> Ordering {
    let len = a.components.len().max(b.components.len());
    (0..len)
        .map(|i| {
            let left = a.components.get(i).map_or("0", String::as_str);
            let right = b.components.get(i).map_or("0", String::as_str);
            left.len().cmp(&right.len()).then_with(|| left.cmp(right))
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.components {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(component)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let components = trimmed
            .split('.')
            .enumerate()
            .map(|(index, part)| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionParseError::InvalidComponent {
                        input: s.to_string(),
                        index,
                        value: part.to_string(),
                    });
                }
                let digits = part.trim_start_matches('0');
                Ok(if digits.is_empty() { "0" } else { digits }.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { components })
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::{Version, VersionParseError, compare};

    fn v(input: &str) -> Version {
        input.parse().expect("test version should parse")
    }

    #[test]
    fn trailing_zero_components_are_ignored() {
        assert_eq!(compare(&v("1.0.0"), &v("1.0")), Ordering::Equal);
        assert_eq!(compare(&v("1"), &v("1.0.0.0")), Ordering::Equal);
        assert_eq!(v("2.0"), v("2.0.0"));
    }

    #[test]
    fn components_compare_numerically() {
        assert_eq!(compare(&v("1.2.0"), &v("1.10.0")), Ordering::Less);
        assert_eq!(compare(&v("1.10.0"), &v("1.9.9")), Ordering::Greater);
        assert_eq!(compare(&v("0.9"), &v("1")), Ordering::Less);
        assert_eq!(compare(&v("1.0.1"), &v("1.0")), Ordering::Greater);
    }

    #[test]
    fn comparison_is_antisymmetric_and_reflexive() {
        let samples = ["0", "1", "1.0", "1.0.1", "1.2", "1.10", "2.0.0.1", "10.0"];
        for a in samples {
            assert_eq!(compare(&v(a), &v(a)), Ordering::Equal, "{a} vs itself");
            for b in samples {
                assert_eq!(
                    compare(&v(a), &v(b)),
                    compare(&v(b), &v(a)).reverse(),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn leading_v_and_whitespace_are_accepted() {
        assert_eq!(v(" v1.4.2 ").components(), &["1", "4", "2"]);
    }

    #[test]
    fn malformed_versions_are_rejected() {
        assert_eq!("".parse::<Version>(), Err(VersionParseError::Empty));
        assert!(matches!(
            "1..0".parse::<Version>(),
            Err(VersionParseError::InvalidComponent { index: 1, .. })
        ));
        assert!(matches!(
            "1.0-beta".parse::<Version>(),
            Err(VersionParseError::InvalidComponent { index: 1, .. })
        ));
        assert!(matches!(
            "1.+2".parse::<Version>(),
            Err(VersionParseError::InvalidComponent { index: 1, .. })
        ));
    }

    #[test]
    fn display_round_trips_components() {
        assert_eq!(v("3.02.1").to_string(), "3.2.1");
        assert_eq!(v("1.000").to_string(), "1.0");
        assert_eq!(Version::new(&[2, 10]).to_string(), "2.10");
    }

    #[test]
    fn components_wider_than_u64_compare_numerically() {
        let huge = "18446744073709551616";
        assert_eq!(compare(&v(huge), &v("18446744073709551615")), Ordering::Greater);
        assert_eq!(compare(&v(&format!("1.{huge}")), &v("1.99")), Ordering::Greater);
        assert_eq!(v(&format!("000{huge}.0")), v(huge));
        assert_eq!(compare(&v("1.007"), &v("1.10")), Ordering::Less);
    }

    #[test]
    fn current_version_matches_package_version() {
        assert_eq!(Version::current(), v(env!("CARGO_PKG_VERSION")));
    }
}
