// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM version string handling.

RPM versions have the form `[epoch:]version[-release]`. Ordering of the
`version` and `release` components is defined by RPM's `rpmvercmp` algorithm,
which is implemented by [rpmvercmp].
*/

use {
    crate::error::{Result, RpmError},
    std::{
        cmp::Ordering,
        fmt::{Display, Formatter},
        hash::{Hash, Hasher},
        str::FromStr,
    },
};

fn is_separator(c: u8) -> bool {
    !c.is_ascii_alphanumeric() && c != b'~' && c != b'^'
}

fn split_while(s: &[u8], f: impl Fn(u8) -> bool) -> (&[u8], &[u8]) {
    let pos = s.iter().position(|c| !f(*c)).unwrap_or(s.len());

    s.split_at(pos)
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let (_, a) = split_while(a, |c| c == b'0');
    let (_, b) = split_while(b, |c| c == b'0');

    // Longest run of digits wins. Otherwise a byte compare works.
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two version or release strings.
///
/// Strings are split into runs of ASCII digits and runs of ASCII letters.
/// Everything else except `~` and `^` separates runs and is otherwise
/// ignored. `~` sorts before anything, including the end of the string.
/// `^` sorts after the end of the string but before anything else. Digit
/// runs compare numerically and sort after letter runs. Letter runs compare
/// by byte value.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    while !one.is_empty() || !two.is_empty() {
        one = split_while(one, is_separator).1;
        two = split_while(two, is_separator).1;

        if one.first() == Some(&b'~') || two.first() == Some(&b'~') {
            if one.first() != Some(&b'~') {
                return Ordering::Greater;
            }
            if two.first() != Some(&b'~') {
                return Ordering::Less;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.first() == Some(&b'^') || two.first() == Some(&b'^') {
            match (one.first(), two.first()) {
                (None, _) => return Ordering::Less,
                (_, None) => return Ordering::Greater,
                (Some(x), _) if *x != b'^' => return Ordering::Greater,
                (_, Some(x)) if *x != b'^' => return Ordering::Less,
                _ => {}
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        // The type of segment is dictated by the left side.
        let numeric = one[0].is_ascii_digit();
        let segment = |c: u8| {
            if numeric {
                c.is_ascii_digit()
            } else {
                c.is_ascii_alphabetic()
            }
        };

        let (seg_one, rest_one) = split_while(one, segment);
        let (seg_two, rest_two) = split_while(two, segment);

        // Segments of different types. Numeric is newer.
        if seg_two.is_empty() {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let res = if numeric {
            compare_numeric(seg_one, seg_two)
        } else {
            seg_one.cmp(seg_two)
        };

        if res != Ordering::Equal {
            return res;
        }

        one = rest_one;
        two = rest_two;
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn valid_component(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '~' | '^'))
}

/// Feed the segments [rpmvercmp] compares into a hasher.
///
/// Strings that compare equal produce the same sequence.
fn hash_segments<H: Hasher>(s: &str, state: &mut H) {
    let mut rest = s.as_bytes();

    loop {
        rest = split_while(rest, is_separator).1;

        let (kind, segment, next) = match rest.first().copied() {
            None => break,
            Some(c @ (b'~' | b'^')) => (c, &rest[0..0], &rest[1..]),
            Some(c) if c.is_ascii_digit() => {
                let (digits, next) = split_while(rest, |c| c.is_ascii_digit());
                (b'0', split_while(digits, |c| c == b'0').1, next)
            }
            Some(_) => {
                let (letters, next) = split_while(rest, |c| c.is_ascii_alphabetic());
                (b'a', letters, next)
            }
        };

        kind.hash(state);
        segment.hash(state);
        rest = next;
    }
}

/// An RPM `epoch:version-release` value.
///
/// Equality, ordering and hashing all follow [rpmvercmp] semantics: a missing
/// epoch equals epoch 0 and `1.05` equals `1.5`.
#[derive(Clone, Debug)]
pub struct RpmVersion {
    epoch: Option<u32>,
    version: String,
    release: Option<String>,
}

impl RpmVersion {
    /// Construct an instance from components.
    ///
    /// Components are validated the same way [Self::parse] validates them.
    pub fn new(epoch: Option<u32>, version: &str, release: Option<&str>) -> Result<Self> {
        if !valid_component(version) {
            return Err(RpmError::VersionParse(format!(
                "illegal version component: {}",
                version
            )));
        }
        if let Some(release) = release {
            if !valid_component(release) {
                return Err(RpmError::VersionParse(format!(
                    "illegal release component: {}",
                    release
                )));
            }
        }

        Ok(Self {
            epoch,
            version: version.to_string(),
            release: release.map(|x| x.to_string()),
        })
    }

    /// Construct an instance by parsing a `[epoch:]version[-release]` string.
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch, remainder) = if let Some(pos) = s.find(':') {
            let epoch = &s[0..pos];
            if epoch.is_empty() || !epoch.chars().all(|c| c.is_ascii_digit()) {
                return Err(RpmError::VersionParse(format!(
                    "epoch is not numeric: {}",
                    s
                )));
            }

            (Some(u32::from_str(epoch)?), &s[pos + 1..])
        } else {
            (None, s)
        };

        let (version, release) = if let Some(pos) = remainder.find('-') {
            (&remainder[0..pos], Some(&remainder[pos + 1..]))
        } else {
            (remainder, None)
        };

        Self::new(epoch, version, release)
    }

    /// The explicit epoch component, if present.
    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    /// The epoch used for comparisons. Absent epochs compare as `0`.
    pub fn epoch_assumed(&self) -> u32 {
        self.epoch.unwrap_or(0)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }
}

impl FromStr for RpmVersion {
    type Err = RpmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for RpmVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }

        write!(f, "{}", self.version)?;

        if let Some(release) = &self.release {
            write!(f, "-{}", release)?;
        }

        Ok(())
    }
}

impl PartialEq for RpmVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RpmVersion {}

impl Hash for RpmVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch_assumed().hash(state);
        hash_segments(&self.version, state);

        match &self.release {
            Some(release) => {
                1u8.hash(state);
                hash_segments(release, state);
            }
            None => 0u8.hash(state),
        }
    }
}

impl PartialOrd<Self> for RpmVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RpmVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch_assumed()
            .cmp(&other.epoch_assumed())
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| match (&self.release, &other.release) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => rpmvercmp(a, b),
            })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::collections::{hash_map::DefaultHasher, BTreeSet, HashSet},
    };

    fn hash_of(v: &RpmVersion) -> u64 {
        let mut hasher = DefaultHasher::new();
        v.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn known_comparisons() {
        assert_eq!(rpmvercmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(rpmvercmp("1.0", "2.0"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0^git1", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("5.5p1", "5.5p10"), Ordering::Less);
        assert_eq!(rpmvercmp("FC5", "fc4"), Ordering::Less);
    }

    #[test]
    fn rpm_test_suite() {
        // A selection of the cases exercised by rpm's own test suite.
        let cases = [
            ("1.0", "1.0a", Ordering::Less),
            ("1.0a", "1.0", Ordering::Greater),
            ("1.0010", "1.9", Ordering::Greater),
            ("1.05", "1.5", Ordering::Equal),
            ("1.0", "1", Ordering::Greater),
            ("2.0", "2_0", Ordering::Equal),
            ("2.0", "2.0.", Ordering::Equal),
            ("2a", "2.0", Ordering::Less),
            ("a+", "a_", Ordering::Equal),
            ("+a", "_a", Ordering::Equal),
            ("+", "_", Ordering::Equal),
            ("1.0~rc1", "1.0~rc1", Ordering::Equal),
            ("1.0~rc1", "1.0~rc2", Ordering::Less),
            ("1.0~rc1~git123", "1.0~rc1", Ordering::Less),
            ("1.0^", "1.0", Ordering::Greater),
            ("1.0^git1", "1.01", Ordering::Less),
            ("1.0^git1", "1.0^git2", Ordering::Less),
            ("1.0^git1", "1.0~rc1", Ordering::Greater),
            ("1.0^git1~pre", "1.0^git1", Ordering::Less),
            ("1.0^", "1.0^", Ordering::Equal),
            ("1.0~^", "1.0~", Ordering::Greater),
            ("xyz.4", "xyz.4", Ordering::Equal),
            ("5.5p2", "5.6p1", Ordering::Less),
            ("10xyz", "10.1xyz", Ordering::Less),
            ("xyz10.1", "xyz10", Ordering::Greater),
            ("20101121", "20101122", Ordering::Less),
            ("1b.fc17", "1.fc17", Ordering::Less),
            ("6.0.rc1", "6.0", Ordering::Greater),
        ];

        for (a, b, expected) in cases {
            assert_eq!(rpmvercmp(a, b), expected, "{} vs {}", a, b);
            assert_eq!(rpmvercmp(b, a), expected.reverse(), "{} vs {}", b, a);
        }
    }

    #[test]
    fn total_order() {
        let mut values = vec![
            "1.0~rc1", "1.0", "1.0^git1", "1.0.1", "1.01a", "2", "2.0~beta", "10", "1a", "1.0a",
        ];
        values.sort_by(|a, b| rpmvercmp(a, b));

        for (i, a) in values.iter().enumerate() {
            assert_eq!(rpmvercmp(a, a), Ordering::Equal);
            for b in &values[i + 1..] {
                assert_ne!(rpmvercmp(a, b), Ordering::Greater, "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn parse() -> Result<()> {
        let v = RpmVersion::parse("2:1.2.3-4.fc35")?;
        assert_eq!(v.epoch(), Some(2));
        assert_eq!(v.version(), "1.2.3");
        assert_eq!(v.release(), Some("4.fc35"));

        let v = RpmVersion::parse("1.0")?;
        assert_eq!(v.epoch(), None);
        assert_eq!(v.epoch_assumed(), 0);
        assert_eq!(v.release(), None);

        assert!(RpmVersion::parse("a:1.0").is_err());
        assert!(RpmVersion::parse(":1.0").is_err());
        assert!(RpmVersion::parse("1.0-").is_err());
        assert!(RpmVersion::parse("1 0").is_err());
        assert!(RpmVersion::parse("1.0-1-2").is_err());
        assert!(RpmVersion::parse("").is_err());

        Ok(())
    }

    #[test]
    fn format() -> Result<()> {
        for s in ["1.0", "0:1.0", "3:1.0~rc1-1^git2", "1.0-1.el9", "1_2+3"] {
            assert_eq!(RpmVersion::parse(s)?.to_string(), s);
        }

        Ok(())
    }

    #[test]
    fn compare_version() -> Result<()> {
        let parse = RpmVersion::parse;

        assert!(parse("1:1.0")? > parse("2.0")?);
        assert_eq!(parse("0:1.0")?, parse("0:1.0")?);
        assert_eq!(parse("0:1.0")?.cmp(&parse("1.0")?), Ordering::Equal);
        assert!(parse("1.0")? < parse("1.0-1")?);
        assert!(parse("1.0-1")? < parse("1.0-2")?);
        assert!(parse("1.0-10")? > parse("1.0-9")?);
        assert!(parse("1.0~rc1-5")? < parse("1.0-1")?);

        Ok(())
    }

    #[test]
    fn equality_matches_ordering() -> Result<()> {
        let parse = RpmVersion::parse;

        for (a, b) in [
            ("0:1.0", "1.0"),
            ("1.05-1", "1.5-1"),
            ("1.0_1", "1.0.1"),
            ("1.0.", "1.0"),
            ("2:1a-01", "2:1.a-1"),
        ] {
            let (a, b) = (parse(a)?, parse(b)?);
            assert_eq!(a.cmp(&b), Ordering::Equal, "{} vs {}", a, b);
            assert_eq!(a, b);
            assert_eq!(hash_of(&a), hash_of(&b), "{} vs {}", a, b);
        }

        for (a, b) in [("1.0", "1.0-0"), ("1.0~rc1", "1.0"), ("1.0^", "1.0"), ("1a", "1.0")] {
            assert_ne!(parse(a)?, parse(b)?);
        }

        let values = ["0:1.0-1", "1.0-1", "1.00-01", "1.0-2"]
            .iter()
            .map(|s| parse(s))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(values.iter().cloned().collect::<BTreeSet<_>>().len(), 2);
        assert_eq!(values.into_iter().collect::<HashSet<_>>().len(), 2);

        Ok(())
    }
}
