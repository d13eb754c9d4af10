// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Header tags and data types.

Headers are keyed by integer tags. Tags live in one of two namespaces: the
signature header ([SignatureTag]) and the metadata header ([RpmTag]). Every
known tag declares the [HeaderType] its value must have. Tags not known to
this crate are still preserved when parsing, keyed by their raw integer.
*/

use {
    once_cell::sync::Lazy,
    std::{collections::HashMap, fmt::Debug},
    strum::IntoEnumIterator,
    strum_macros::EnumIter,
};

/// Tag of the region entry of the signature header.
pub const HEADER_SIGNATURES: u32 = 62;

/// Tag of the region entry of the metadata header.
pub const HEADER_IMMUTABLE: u32 = 63;

/// Data type of a header entry, as stored in the index.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HeaderType {
    Null,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    String,
    Bin,
    StringArray,
    I18nString,
}

impl HeaderType {
    /// Resolve a type from its numeric id.
    ///
    /// Returns `None` for ids not defined by RPM.
    pub fn from_id(id: u32) -> Option<Self> {
        Some(match id {
            0 => Self::Null,
            1 => Self::Char,
            2 => Self::Int8,
            3 => Self::Int16,
            4 => Self::Int32,
            5 => Self::Int64,
            6 => Self::String,
            7 => Self::Bin,
            8 => Self::StringArray,
            9 => Self::I18nString,
            _ => return None,
        })
    }

    /// The numeric id of this type.
    pub fn id(&self) -> u32 {
        match self {
            Self::Null => 0,
            Self::Char => 1,
            Self::Int8 => 2,
            Self::Int16 => 3,
            Self::Int32 => 4,
            Self::Int64 => 5,
            Self::String => 6,
            Self::Bin => 7,
            Self::StringArray => 8,
            Self::I18nString => 9,
        }
    }

    /// Required alignment of values of this type within the data store.
    pub fn alignment(&self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int32 => 4,
            Self::Int64 => 8,
            _ => 1,
        }
    }

    /// Size in bytes of a single element, for fixed width types.
    pub fn element_size(&self) -> Option<usize> {
        match self {
            Self::Char | Self::Int8 | Self::Bin => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 => Some(4),
            Self::Int64 => Some(8),
            Self::Null | Self::String | Self::StringArray | Self::I18nString => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Char => "CHAR",
            Self::Int8 => "INT8",
            Self::Int16 => "INT16",
            Self::Int32 => "INT32",
            Self::Int64 => "INT64",
            Self::String => "STRING",
            Self::Bin => "BIN",
            Self::StringArray => "STRING_ARRAY",
            Self::I18nString => "I18NSTRING",
        }
    }
}

/// Common behavior of tag namespaces.
pub trait HeaderTag: Copy + Debug + Eq + 'static {
    /// Tag of the region entry synthesized when rendering headers of this namespace.
    const REGION_TAG: u32;

    /// Human readable name of the namespace.
    const NAMESPACE: &'static str;

    /// Numeric value of the tag.
    fn id(&self) -> u32;

    /// Type values of this tag must have.
    fn data_type(&self) -> HeaderType;

    /// Resolve a known tag from its numeric value.
    fn from_id(id: u32) -> Option<Self>;
}

macro_rules! tags {
    (
        $(#[$meta:meta])*
        $name:ident, $region:expr, $namespace:literal, $table:ident {
            $($(#[doc = $doc:literal])* $variant:ident = ($id:expr, $ty:ident),)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, EnumIter, Eq, Hash, PartialEq)]
        pub enum $name {
            $($(#[doc = $doc])* $variant,)*
        }

        static $table: Lazy<HashMap<u32, $name>> =
            Lazy::new(|| $name::iter().map(|tag| (tag.id(), tag)).collect());

        impl HeaderTag for $name {
            const REGION_TAG: u32 = $region;
            const NAMESPACE: &'static str = $namespace;

            fn id(&self) -> u32 {
                match self {
                    $(Self::$variant => $id,)*
                }
            }

            fn data_type(&self) -> HeaderType {
                match self {
                    $(Self::$variant => HeaderType::$ty,)*
                }
            }

            fn from_id(id: u32) -> Option<Self> {
                $table.get(&id).copied()
            }
        }
    };
}

tags! {
    /// Tags of the signature header.
    SignatureTag, HEADER_SIGNATURES, "signature", SIGNATURE_TAGS {
        /// DSA signature over the metadata header.
        DsaHeader = (267, Bin),
        /// RSA signature over the metadata header.
        RsaHeader = (268, Bin),
        /// Hex SHA-1 digest of the metadata header.
        Sha1Header = (269, String),
        /// Size of metadata header plus payload, when too large for [Self::Size].
        LongSize = (270, Int64),
        /// Uncompressed payload size, when too large for [Self::PayloadSize].
        LongArchiveSize = (271, Int64),
        /// Hex SHA-256 digest of the metadata header.
        Sha256Header = (273, String),
        FileSignatures = (274, StringArray),
        FileSignatureLength = (275, Int32),
        /// Size of metadata header plus payload.
        Size = (1000, Int32),
        /// RSA signature over the metadata header and payload.
        Pgp = (1002, Bin),
        /// MD5 digest of the metadata header and payload.
        Md5 = (1004, Bin),
        /// DSA signature over the metadata header and payload.
        Gpg = (1005, Bin),
        /// Uncompressed payload size.
        PayloadSize = (1007, Int32),
        /// Zeroed space reserved for signatures added later.
        ReservedSpace = (1008, Bin),
    }
}

tags! {
    /// Tags of the metadata header.
    RpmTag, HEADER_IMMUTABLE, "metadata", RPM_TAGS {
        HeaderI18nTable = (100, StringArray),
        Name = (1000, String),
        Version = (1001, String),
        Release = (1002, String),
        Epoch = (1003, Int32),
        Summary = (1004, I18nString),
        Description = (1005, I18nString),
        BuildTime = (1006, Int32),
        BuildHost = (1007, String),
        /// Sum of installed file sizes.
        Size = (1009, Int32),
        Distribution = (1010, String),
        Vendor = (1011, String),
        License = (1014, String),
        Packager = (1015, String),
        Group = (1016, I18nString),
        Url = (1020, String),
        Os = (1021, String),
        Arch = (1022, String),
        Prein = (1023, String),
        Postin = (1024, String),
        Preun = (1025, String),
        Postun = (1026, String),
        FileSizes = (1028, Int32),
        FileModes = (1030, Int16),
        FileRdevs = (1033, Int16),
        FileMtimes = (1034, Int32),
        FileDigests = (1035, StringArray),
        FileLinkTos = (1036, StringArray),
        FileFlags = (1037, Int32),
        FileUserName = (1039, StringArray),
        FileGroupName = (1040, StringArray),
        SourceRpm = (1044, String),
        FileVerifyFlags = (1045, Int32),
        ArchiveSize = (1046, Int32),
        ProvideName = (1047, StringArray),
        RequireFlags = (1048, Int32),
        RequireName = (1049, StringArray),
        RequireVersion = (1050, StringArray),
        ConflictFlags = (1053, Int32),
        ConflictName = (1054, StringArray),
        ConflictVersion = (1055, StringArray),
        RpmVersion = (1064, String),
        ChangelogTime = (1080, Int32),
        ChangelogName = (1081, StringArray),
        ChangelogText = (1082, StringArray),
        PreinProg = (1085, String),
        PostinProg = (1086, String),
        PreunProg = (1087, String),
        PostunProg = (1088, String),
        ObsoleteName = (1090, StringArray),
        Cookie = (1094, String),
        FileDevices = (1095, Int32),
        FileInodes = (1096, Int32),
        FileLangs = (1097, StringArray),
        Prefixes = (1098, StringArray),
        ProvideFlags = (1112, Int32),
        ProvideVersion = (1113, StringArray),
        ObsoleteFlags = (1114, Int32),
        ObsoleteVersion = (1115, StringArray),
        DirIndexes = (1116, Int32),
        BaseNames = (1117, StringArray),
        DirNames = (1118, StringArray),
        OptFlags = (1122, String),
        PayloadFormat = (1124, String),
        PayloadCompressor = (1125, String),
        PayloadFlags = (1126, String),
        Platform = (1132, String),
        LongFileSizes = (5008, Int64),
        LongSize = (5009, Int64),
        FileDigestAlgo = (5011, Int32),
        BugUrl = (5012, String),
        PreinFlags = (5020, Int32),
        PostinFlags = (5021, Int32),
        PreunFlags = (5022, Int32),
        PostunFlags = (5023, Int32),
        RecommendName = (5046, StringArray),
        RecommendVersion = (5047, StringArray),
        RecommendFlags = (5048, Int32),
        SuggestName = (5049, StringArray),
        SuggestVersion = (5050, StringArray),
        SuggestFlags = (5051, Int32),
        SupplementName = (5052, StringArray),
        SupplementVersion = (5053, StringArray),
        SupplementFlags = (5054, Int32),
        EnhanceName = (5055, StringArray),
        EnhanceVersion = (5056, StringArray),
        EnhanceFlags = (5057, Int32),
        Encoding = (5062, String),
        /// Hex digests of the compressed payload.
        PayloadDigest = (5092, StringArray),
        PayloadDigestAlgo = (5093, Int32),
        /// Hex digests of the uncompressed payload.
        PayloadDigestAlt = (5097, StringArray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_unique() {
        assert_eq!(SIGNATURE_TAGS.len(), SignatureTag::iter().count());
        assert_eq!(RPM_TAGS.len(), RpmTag::iter().count());
    }

    #[test]
    fn lookup() {
        assert_eq!(SignatureTag::from_id(1004), Some(SignatureTag::Md5));
        assert_eq!(RpmTag::from_id(1004), Some(RpmTag::Summary));
        assert_eq!(RpmTag::from_id(999_999), None);
        assert_eq!(RpmTag::FileModes.data_type(), HeaderType::Int16);
        assert_eq!(SignatureTag::LongSize.data_type().alignment(), 8);
    }

    #[test]
    fn region_tags() {
        assert_eq!(SignatureTag::REGION_TAG, 62);
        assert_eq!(RpmTag::REGION_TAG, 63);

        // Region tags sort ahead of every other tag of their namespace.
        assert!(SignatureTag::iter().all(|t| t.id() > SignatureTag::REGION_TAG));
        assert!(RpmTag::iter().all(|t| t.id() > RpmTag::REGION_TAG));
    }

    #[test]
    fn header_type_ids() {
        for id in 0..10 {
            assert_eq!(HeaderType::from_id(id).map(|t| t.id()), Some(id));
        }
        assert!(HeaderType::from_id(10).is_none());
    }
}
