// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package relationships.

Each relationship kind is stored in the metadata header as three parallel
arrays: names, versions and flags. Entries are sorted by name, then version,
then flags, so headers don't depend on the order dependencies were declared.
*/

use {
    crate::{
        error::{Result, RpmError},
        header::Header,
        tag::{HeaderTag, RpmTag},
    },
    std::fmt::{Display, Formatter},
};

bitflags::bitflags! {
    /// Sense flags of a dependency (`RPMSENSE_*`).
    #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
    pub struct DependencyFlags: u32 {
        const LESS = 1 << 1;
        const GREATER = 1 << 2;
        const EQUAL = 1 << 3;
        const POSTTRANS = 1 << 5;
        const PREREQ = 1 << 6;
        const PRETRANS = 1 << 7;
        const INTERP = 1 << 8;
        const SCRIPT_PRE = 1 << 9;
        const SCRIPT_POST = 1 << 10;
        const SCRIPT_PREUN = 1 << 11;
        const SCRIPT_POSTUN = 1 << 12;
        const FIND_REQUIRES = 1 << 14;
        const FIND_PROVIDES = 1 << 15;
        const RPMLIB = 1 << 24;
        const CONFIG = 1 << 28;

        const LESS_EQUAL = Self::LESS.bits() | Self::EQUAL.bits();
        const GREATER_EQUAL = Self::GREATER.bits() | Self::EQUAL.bits();
    }
}

impl DependencyFlags {
    /// No version constraint.
    pub const ANY: Self = Self::empty();

    /// The comparison operator expressed by these flags, if any.
    pub fn operator(&self) -> Option<&'static str> {
        let sense = self.intersection(Self::LESS | Self::GREATER | Self::EQUAL);

        if sense == Self::LESS {
            Some("<")
        } else if sense == Self::GREATER {
            Some(">")
        } else if sense == Self::EQUAL {
            Some("=")
        } else if sense == Self::LESS_EQUAL {
            Some("<=")
        } else if sense == Self::GREATER_EQUAL {
            Some(">=")
        } else {
            None
        }
    }
}

/// A single package relationship.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Dependency {
    pub name: String,
    /// Version constraint. Empty when any version satisfies.
    pub version: String,
    pub flags: DependencyFlags,
}

impl Dependency {
    /// Any version of `name`.
    pub fn any(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            version: String::new(),
            flags: DependencyFlags::ANY,
        }
    }

    pub fn new(name: impl ToString, flags: DependencyFlags, version: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            flags,
        }
    }

    pub fn equals(name: impl ToString, version: impl ToString) -> Self {
        Self::new(name, DependencyFlags::EQUAL, version)
    }

    pub fn greater_eq(name: impl ToString, version: impl ToString) -> Self {
        Self::new(name, DependencyFlags::GREATER_EQUAL, version)
    }

    pub fn less_eq(name: impl ToString, version: impl ToString) -> Self {
        Self::new(name, DependencyFlags::LESS_EQUAL, version)
    }

    /// A requirement on a feature of the RPM library reading the package.
    ///
    /// Emitted as `rpmlib(<feature>) <= <version>`.
    pub fn rpmlib(feature: &str, version: impl ToString) -> Self {
        Self::new(
            format!("rpmlib({})", feature),
            DependencyFlags::RPMLIB | DependencyFlags::LESS_EQUAL,
            version,
        )
    }

    fn sort_key(&self) -> (&str, &str, u32) {
        (&self.name, &self.version, self.flags.bits())
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.flags.operator(), self.version.is_empty()) {
            (Some(op), false) => write!(f, "{} {} {}", self.name, op, self.version),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Kinds of package relationships.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DependencyKind {
    Require,
    Provide,
    Conflict,
    Obsolete,
    Recommend,
    Suggest,
    Supplement,
    Enhance,
}

impl DependencyKind {
    /// The name, version and flags tags holding this kind.
    pub fn tags(&self) -> (RpmTag, RpmTag, RpmTag) {
        match self {
            Self::Require => (
                RpmTag::RequireName,
                RpmTag::RequireVersion,
                RpmTag::RequireFlags,
            ),
            Self::Provide => (
                RpmTag::ProvideName,
                RpmTag::ProvideVersion,
                RpmTag::ProvideFlags,
            ),
            Self::Conflict => (
                RpmTag::ConflictName,
                RpmTag::ConflictVersion,
                RpmTag::ConflictFlags,
            ),
            Self::Obsolete => (
                RpmTag::ObsoleteName,
                RpmTag::ObsoleteVersion,
                RpmTag::ObsoleteFlags,
            ),
            Self::Recommend => (
                RpmTag::RecommendName,
                RpmTag::RecommendVersion,
                RpmTag::RecommendFlags,
            ),
            Self::Suggest => (
                RpmTag::SuggestName,
                RpmTag::SuggestVersion,
                RpmTag::SuggestFlags,
            ),
            Self::Supplement => (
                RpmTag::SupplementName,
                RpmTag::SupplementVersion,
                RpmTag::SupplementFlags,
            ),
            Self::Enhance => (
                RpmTag::EnhanceName,
                RpmTag::EnhanceVersion,
                RpmTag::EnhanceFlags,
            ),
        }
    }
}

/// Write dependencies of a kind to a header.
///
/// Dependencies are sorted and duplicates removed. Nothing is written for an
/// empty list.
pub fn write_dependencies(
    header: &mut Header<RpmTag>,
    kind: DependencyKind,
    dependencies: &[Dependency],
) -> Result<()> {
    if dependencies.is_empty() {
        return Ok(());
    }

    let mut sorted = dependencies.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    sorted.dedup();

    let (name_tag, version_tag, flags_tag) = kind.tags();

    header.set(
        name_tag,
        sorted.iter().map(|d| d.name.clone()).collect::<Vec<_>>(),
    )?;
    header.set(
        version_tag,
        sorted.iter().map(|d| d.version.clone()).collect::<Vec<_>>(),
    )?;
    header.set(
        flags_tag,
        sorted.iter().map(|d| d.flags.bits()).collect::<Vec<_>>(),
    )?;

    Ok(())
}

/// Read dependencies of a kind from a header.
pub fn read_dependencies(header: &Header<RpmTag>, kind: DependencyKind) -> Result<Vec<Dependency>> {
    let (name_tag, version_tag, flags_tag) = kind.tags();

    let names = match header.get_string_array(name_tag)? {
        Some(names) => names,
        None => return Ok(vec![]),
    };
    let versions = header
        .get_string_array(version_tag)?
        .ok_or_else(|| RpmError::MissingTag(version_tag.id()))?;
    let flags = header
        .get_u32_array(flags_tag)?
        .ok_or_else(|| RpmError::MissingTag(flags_tag.id()))?;

    if versions.len() != names.len() || flags.len() != names.len() {
        return Err(RpmError::HeaderValueInvalid {
            tag: name_tag.id(),
            reason: "dependency arrays differ in length",
        });
    }

    Ok(names
        .iter()
        .zip(versions)
        .zip(flags)
        .map(|((name, version), flags)| Dependency {
            name: name.clone(),
            version: version.clone(),
            flags: DependencyFlags::from_bits_retain(*flags),
        })
        .collect())
}
