// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Tag-indexed header sections.

Both the signature section and the metadata section of an RPM file use the
same binary structure:

```text
[3B magic 8E AD E8][1B version=1][4B reserved][4B entry count][4B store size]
[entry count * (4B tag, 4B type, 4B offset, 4B count)]
[data store]
```

All integers are big-endian. `offset` is relative to the start of the data
store. Values are aligned within the store according to their type.

When rendering, a *region* entry is synthesized. Its index record is the
first record and its 16 bytes of data are the last bytes of the store. The
data is itself an index record `{region tag, BIN, -(entry count * 16), 16}`
which readers use to locate the extent of the index.
*/

use {
    crate::{
        error::{Result, RpmError},
        tag::{HeaderTag, HeaderType},
    },
    log::warn,
    std::{io::Read, marker::PhantomData},
};

/// Magic bytes at the start of every header section.
pub const HEADER_MAGIC: [u8; 3] = [0x8e, 0xad, 0xe8];

/// Header section format version.
pub const HEADER_VERSION: u8 = 1;

/// Size of the fixed section prologue.
pub const PROLOGUE_SIZE: usize = 16;

/// Size of a single index record.
pub const INDEX_ENTRY_SIZE: usize = 16;

/// Maximum number of index records accepted when parsing.
pub const MAX_INDEX_ENTRIES: u32 = 0xffff;

/// Maximum data store size accepted when parsing.
pub const MAX_STORE_SIZE: u32 = 256 * 1024 * 1024;

/// A typed header value.
///
/// Numeric and character values are always held as arrays. An array of
/// length 1 is the scalar form: it is written with a count of 1 and a
/// count of 1 decodes back to a single element array.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HeaderValue {
    Null,
    Char(Vec<u8>),
    Int8(Vec<u8>),
    Int16(Vec<u16>),
    Int32(Vec<u32>),
    Int64(Vec<u64>),
    String(String),
    Bin(Vec<u8>),
    StringArray(Vec<String>),
    I18nString(Vec<String>),
    /// A value whose type id isn't known. Preserved as opaque bytes.
    Unknown { type_id: u32, data: Vec<u8> },
}

impl HeaderValue {
    /// The [HeaderType] of this value, if it is a known type.
    pub fn header_type(&self) -> Option<HeaderType> {
        Some(match self {
            Self::Null => HeaderType::Null,
            Self::Char(_) => HeaderType::Char,
            Self::Int8(_) => HeaderType::Int8,
            Self::Int16(_) => HeaderType::Int16,
            Self::Int32(_) => HeaderType::Int32,
            Self::Int64(_) => HeaderType::Int64,
            Self::String(_) => HeaderType::String,
            Self::Bin(_) => HeaderType::Bin,
            Self::StringArray(_) => HeaderType::StringArray,
            Self::I18nString(_) => HeaderType::I18nString,
            Self::Unknown { .. } => return None,
        })
    }

    /// Numeric type id written to the index.
    pub fn type_id(&self) -> u32 {
        match self {
            Self::Unknown { type_id, .. } => *type_id,
            _ => self.header_type().map(|t| t.id()).unwrap_or_default(),
        }
    }

    fn type_name(&self) -> &'static str {
        self.header_type().map(|t| t.name()).unwrap_or("UNKNOWN")
    }

    /// The `count` field written to the index.
    pub fn count(&self) -> usize {
        match self {
            Self::Null | Self::String(_) => 1,
            Self::Char(v) | Self::Int8(v) | Self::Bin(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::StringArray(v) | Self::I18nString(v) => v.len(),
            Self::Unknown { data, .. } => data.len(),
        }
    }

    fn alignment(&self) -> usize {
        self.header_type().map(|t| t.alignment()).unwrap_or(1)
    }

    fn write_data(&self, tag: u32, store: &mut Vec<u8>) -> Result<()> {
        fn push_string(tag: u32, s: &str, store: &mut Vec<u8>) -> Result<()> {
            if s.as_bytes().contains(&0) {
                return Err(RpmError::HeaderValueInvalid {
                    tag,
                    reason: "string contains a NUL byte",
                });
            }
            store.extend_from_slice(s.as_bytes());
            store.push(0);

            Ok(())
        }

        match self {
            Self::Null => {}
            Self::Char(v) | Self::Int8(v) | Self::Bin(v) => store.extend_from_slice(v),
            Self::Int16(v) => v.iter().for_each(|x| store.extend_from_slice(&x.to_be_bytes())),
            Self::Int32(v) => v.iter().for_each(|x| store.extend_from_slice(&x.to_be_bytes())),
            Self::Int64(v) => v.iter().for_each(|x| store.extend_from_slice(&x.to_be_bytes())),
            Self::String(s) => push_string(tag, s, store)?,
            Self::StringArray(v) | Self::I18nString(v) => {
                for s in v {
                    push_string(tag, s, store)?;
                }
            }
            Self::Unknown { data, .. } => store.extend_from_slice(data),
        }

        Ok(())
    }

    /// Decode a value from the data store.
    fn decode(tag: u32, type_id: u32, offset: i32, count: u32, store: &[u8]) -> Result<Self> {
        let out_of_bounds = || RpmError::HeaderEntryOutOfBounds { tag };

        let offset = usize::try_from(offset).map_err(|_| out_of_bounds())?;
        if offset > store.len() {
            return Err(out_of_bounds());
        }
        let data = &store[offset..];
        let count = count as usize;

        let fixed = |element_size: usize| -> Result<&[u8]> {
            let size = count.checked_mul(element_size).ok_or_else(out_of_bounds)?;
            data.get(0..size).ok_or_else(out_of_bounds)
        };

        let strings = |count: usize| -> Result<Vec<String>> {
            let mut res = Vec::with_capacity(count.min(data.len()));
            let mut remaining = data;

            for _ in 0..count {
                let end = remaining
                    .iter()
                    .position(|b| *b == 0)
                    .ok_or(RpmError::HeaderStringMissingNul { tag })?;
                let s = std::str::from_utf8(&remaining[0..end])
                    .map_err(|_| RpmError::HeaderInvalidUtf8 { tag })?;
                res.push(s.to_string());
                remaining = &remaining[end + 1..];
            }

            Ok(res)
        };

        Ok(match HeaderType::from_id(type_id) {
            Some(HeaderType::Null) => Self::Null,
            Some(HeaderType::Char) => Self::Char(fixed(1)?.to_vec()),
            Some(HeaderType::Int8) => Self::Int8(fixed(1)?.to_vec()),
            Some(HeaderType::Int16) => Self::Int16(
                fixed(2)?
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect(),
            ),
            Some(HeaderType::Int32) => Self::Int32(
                fixed(4)?
                    .chunks_exact(4)
                    .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            Some(HeaderType::Int64) => Self::Int64(
                fixed(8)?
                    .chunks_exact(8)
                    .map(|c| u64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
            Some(HeaderType::String) => Self::String(strings(1)?.remove(0)),
            Some(HeaderType::Bin) => Self::Bin(fixed(1)?.to_vec()),
            Some(HeaderType::StringArray) => Self::StringArray(strings(count)?),
            Some(HeaderType::I18nString) => Self::I18nString(strings(count)?),
            None => {
                warn!(
                    "tag {} has unknown type {}; treating as opaque data",
                    tag, type_id
                );
                Self::Unknown {
                    type_id,
                    data: fixed(1)?.to_vec(),
                }
            }
        })
    }

    /// Obtain the scalar value of an `INT16` value.
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::Int16(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Obtain the scalar value of an `INT32` value.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Int32(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// Obtain the scalar value of an `INT64` value.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int64(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    pub fn as_u16_array(&self) -> Option<&[u16]> {
        match self {
            Self::Int16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32_array(&self) -> Option<&[u32]> {
        match self {
            Self::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64_array(&self) -> Option<&[u64]> {
        match self {
            Self::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Obtain a string value.
    ///
    /// For localized strings, the first (default locale) entry is returned.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::I18nString(v) => v.first().map(|s| s.as_str()),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            Self::StringArray(v) | Self::I18nString(v) => Some(v),
            _ => None,
        }
    }

    /// Obtain raw bytes of a `BIN`, `CHAR`, `INT8` or unknown value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bin(v) | Self::Char(v) | Self::Int8(v) => Some(v),
            Self::Unknown { data, .. } => Some(data),
            _ => None,
        }
    }
}

impl From<u16> for HeaderValue {
    fn from(v: u16) -> Self {
        Self::Int16(vec![v])
    }
}

impl From<u32> for HeaderValue {
    fn from(v: u32) -> Self {
        Self::Int32(vec![v])
    }
}

impl From<u64> for HeaderValue {
    fn from(v: u64) -> Self {
        Self::Int64(vec![v])
    }
}

impl From<Vec<u16>> for HeaderValue {
    fn from(v: Vec<u16>) -> Self {
        Self::Int16(v)
    }
}

impl From<Vec<u32>> for HeaderValue {
    fn from(v: Vec<u32>) -> Self {
        Self::Int32(v)
    }
}

impl From<Vec<u64>> for HeaderValue {
    fn from(v: Vec<u64>) -> Self {
        Self::Int64(v)
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringArray(v)
    }
}

/// Render header entries to their binary form.
///
/// `sort_tags` orders index records by ascending tag. Otherwise insertion
/// order is preserved. In both cases the synthesized region record for
/// `region_tag` comes first and its data is the last 16 bytes of the store.
pub fn render_entries(
    entries: &[(u32, HeaderValue)],
    sort_tags: bool,
    region_tag: u32,
) -> Result<Vec<u8>> {
    let mut ordered = entries.iter().collect::<Vec<_>>();
    if sort_tags {
        ordered.sort_by_key(|(tag, _)| *tag);
    }

    let entry_count = ordered.len() + 1;
    let too_large = || RpmError::HeaderTooLarge("too much data to render");

    let mut records = Vec::with_capacity(entry_count);
    let mut store = Vec::new();

    for (tag, value) in ordered {
        if *tag == region_tag {
            return Err(RpmError::HeaderValueInvalid {
                tag: *tag,
                reason: "region tag is synthesized and cannot be set",
            });
        }

        let alignment = value.alignment();
        let pad = (alignment - store.len() % alignment) % alignment;
        store.resize(store.len() + pad, 0);

        let offset = i32::try_from(store.len()).map_err(|_| too_large())?;
        value.write_data(*tag, &mut store)?;

        let count = u32::try_from(value.count()).map_err(|_| too_large())?;
        records.push((*tag, value.type_id(), offset, count));
    }

    let region_offset = i32::try_from(store.len()).map_err(|_| too_large())?;
    let index_size = i32::try_from(entry_count * INDEX_ENTRY_SIZE).map_err(|_| too_large())?;
    store.extend_from_slice(&region_tag.to_be_bytes());
    store.extend_from_slice(&HeaderType::Bin.id().to_be_bytes());
    store.extend_from_slice(&(-index_size).to_be_bytes());
    store.extend_from_slice(&(INDEX_ENTRY_SIZE as u32).to_be_bytes());

    let store_size = u32::try_from(store.len()).map_err(|_| too_large())?;

    let mut data =
        Vec::with_capacity(PROLOGUE_SIZE + entry_count * INDEX_ENTRY_SIZE + store.len());
    data.extend_from_slice(&HEADER_MAGIC);
    data.push(HEADER_VERSION);
    data.extend_from_slice(&[0u8; 4]);
    data.extend_from_slice(&(entry_count as u32).to_be_bytes());
    data.extend_from_slice(&store_size.to_be_bytes());

    for (tag, type_id, offset, count) in std::iter::once((
        region_tag,
        HeaderType::Bin.id(),
        region_offset,
        INDEX_ENTRY_SIZE as u32,
    ))
    .chain(records)
    {
        data.extend_from_slice(&tag.to_be_bytes());
        data.extend_from_slice(&type_id.to_be_bytes());
        data.extend_from_slice(&offset.to_be_bytes());
        data.extend_from_slice(&count.to_be_bytes());
    }

    data.extend_from_slice(&store);

    Ok(data)
}

/// Parsed section prologue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Prologue {
    entry_count: u32,
    store_size: u32,
}

impl Prologue {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PROLOGUE_SIZE {
            return Err(RpmError::HeaderTruncated("section prologue"));
        }
        if data[0..3] != HEADER_MAGIC || data[3] != HEADER_VERSION {
            return Err(RpmError::BadHeaderMagic);
        }

        let entry_count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let store_size = u32::from_be_bytes([data[12], data[13], data[14], data[15]]);

        if entry_count > MAX_INDEX_ENTRIES {
            return Err(RpmError::HeaderTooLarge("index entry count"));
        }
        if store_size > MAX_STORE_SIZE {
            return Err(RpmError::HeaderTooLarge("data store size"));
        }

        Ok(Self {
            entry_count,
            store_size,
        })
    }

    fn section_size(&self) -> usize {
        PROLOGUE_SIZE + self.entry_count as usize * INDEX_ENTRY_SIZE + self.store_size as usize
    }
}

/// Parse header entries from their binary form.
///
/// The synthesized region entry, if present as the first record, is not
/// returned.
pub fn parse_entries(data: &[u8], region_tag: u32) -> Result<Vec<(u32, HeaderValue)>> {
    let prologue = Prologue::parse(data)?;

    if data.len() < prologue.section_size() {
        return Err(RpmError::HeaderTruncated("index or data store"));
    }

    let index_end = PROLOGUE_SIZE + prologue.entry_count as usize * INDEX_ENTRY_SIZE;
    let index = &data[PROLOGUE_SIZE..index_end];
    let store = &data[index_end..index_end + prologue.store_size as usize];

    let mut entries = Vec::with_capacity(prologue.entry_count as usize);

    for (i, record) in index.chunks_exact(INDEX_ENTRY_SIZE).enumerate() {
        let field = |pos: usize| {
            [
                record[pos],
                record[pos + 1],
                record[pos + 2],
                record[pos + 3],
            ]
        };
        let tag = u32::from_be_bytes(field(0));
        let type_id = u32::from_be_bytes(field(4));
        let offset = i32::from_be_bytes(field(8));
        let count = u32::from_be_bytes(field(12));

        if i == 0 && tag == region_tag && type_id == HeaderType::Bin.id() {
            continue;
        }

        entries.push((tag, HeaderValue::decode(tag, type_id, offset, count, store)?));
    }

    Ok(entries)
}

/// An ordered mapping of tags to values.
///
/// `T` is the tag namespace. Values for known tags are validated against the
/// tag's declared type on insertion. Tags unknown to the namespace can be
/// handled through the `_raw` methods and are preserved when parsing.
///
/// Equality compares the tag to value mapping and ignores insertion order.
#[derive(Clone, Debug)]
pub struct Header<T: HeaderTag> {
    entries: Vec<(u32, HeaderValue)>,
    _namespace: PhantomData<T>,
}

impl<T: HeaderTag> PartialEq for Header<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(tag, value)| other.get_raw(*tag) == Some(value))
    }
}

impl<T: HeaderTag> Eq for Header<T> {}

impl<T: HeaderTag> Default for Header<T> {
    fn default() -> Self {
        Self {
            entries: vec![],
            _namespace: PhantomData,
        }
    }
}

impl<T: HeaderTag> Header<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a tag, replacing any existing value.
    ///
    /// Errors if the value type doesn't match the type declared by the tag.
    pub fn set(&mut self, tag: T, value: impl Into<HeaderValue>) -> Result<()> {
        let value = value.into();

        if value.header_type() != Some(tag.data_type()) {
            return Err(RpmError::TagTypeMismatch {
                tag: tag.id(),
                expected: tag.data_type().name(),
                actual: value.type_name(),
            });
        }

        self.set_raw(tag.id(), value);

        Ok(())
    }

    /// Set the value of a tag by numeric id, without type validation.
    pub fn set_raw(&mut self, tag: u32, value: HeaderValue) {
        if let Some(entry) = self.entries.iter_mut().find(|(t, _)| *t == tag) {
            entry.1 = value;
        } else {
            self.entries.push((tag, value));
        }
    }

    pub fn get(&self, tag: T) -> Option<&HeaderValue> {
        self.get_raw(tag.id())
    }

    pub fn get_raw(&self, tag: u32) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find_map(|(t, v)| if *t == tag { Some(v) } else { None })
    }

    pub fn remove(&mut self, tag: T) -> Option<HeaderValue> {
        let pos = self.entries.iter().position(|(t, _)| *t == tag.id())?;

        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, tag: T) -> bool {
        self.get(tag).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(tag, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &HeaderValue)> + '_ {
        self.entries.iter().map(|(t, v)| (*t, v))
    }

    /// Copy all entries of another header into this one, replacing existing values.
    pub fn extend(&mut self, other: &Header<T>) {
        for (tag, value) in other.iter() {
            self.set_raw(tag, value.clone());
        }
    }

    fn typed<'a, V>(
        &'a self,
        tag: T,
        expected: HeaderType,
        f: impl FnOnce(&'a HeaderValue) -> Option<V>,
    ) -> Result<Option<V>> {
        match self.get(tag) {
            None => Ok(None),
            Some(value) => f(value).map(Some).ok_or(RpmError::TagTypeMismatch {
                tag: tag.id(),
                expected: expected.name(),
                actual: value.type_name(),
            }),
        }
    }

    pub fn get_u16(&self, tag: T) -> Result<Option<u16>> {
        self.typed(tag, HeaderType::Int16, |v| v.as_u16())
    }

    pub fn get_u32(&self, tag: T) -> Result<Option<u32>> {
        self.typed(tag, HeaderType::Int32, |v| v.as_u32())
    }

    pub fn get_u64(&self, tag: T) -> Result<Option<u64>> {
        self.typed(tag, HeaderType::Int64, |v| v.as_u64())
    }

    pub fn get_u16_array(&self, tag: T) -> Result<Option<&[u16]>> {
        self.typed(tag, HeaderType::Int16, |v| v.as_u16_array())
    }

    pub fn get_u32_array(&self, tag: T) -> Result<Option<&[u32]>> {
        self.typed(tag, HeaderType::Int32, |v| v.as_u32_array())
    }

    pub fn get_u64_array(&self, tag: T) -> Result<Option<&[u64]>> {
        self.typed(tag, HeaderType::Int64, |v| v.as_u64_array())
    }

    pub fn get_str(&self, tag: T) -> Result<Option<&str>> {
        self.typed(tag, HeaderType::String, |v| v.as_str())
    }

    pub fn get_string_array(&self, tag: T) -> Result<Option<&[String]>> {
        self.typed(tag, HeaderType::StringArray, |v| v.as_string_array())
    }

    pub fn get_bytes(&self, tag: T) -> Result<Option<&[u8]>> {
        self.typed(tag, HeaderType::Bin, |v| v.as_bytes())
    }

    /// Like [Self::get_str] but a missing tag is an error.
    pub fn require_str(&self, tag: T) -> Result<&str> {
        self.get_str(tag)?.ok_or_else(|| RpmError::MissingTag(tag.id()))
    }

    /// Render this header to its binary form.
    ///
    /// See [render_entries].
    pub fn render(&self, sort_tags: bool) -> Result<Vec<u8>> {
        render_entries(&self.entries, sort_tags, T::REGION_TAG)
    }

    /// Parse a header from its binary form.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(Self {
            entries: parse_entries(data, T::REGION_TAG)?,
            _namespace: PhantomData,
        })
    }

    /// Read a header section from a stream.
    ///
    /// Exactly the bytes of the section are consumed. Returns the parsed header
    /// and the raw section bytes.
    pub fn read_from(reader: &mut impl Read) -> Result<(Self, Vec<u8>)> {
        let mut data = vec![0u8; PROLOGUE_SIZE];
        reader.read_exact(&mut data).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => RpmError::HeaderTruncated("section prologue"),
            _ => RpmError::Io(e),
        })?;

        let prologue = Prologue::parse(&data)?;
        data.resize(prologue.section_size(), 0);
        reader
            .read_exact(&mut data[PROLOGUE_SIZE..])
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    RpmError::HeaderTruncated("index or data store")
                }
                _ => RpmError::Io(e),
            })?;

        let header = Self::parse(&data)?;

        Ok((header, data))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::tag::{RpmTag, SignatureTag},
        std::io::Cursor,
    };

    fn be32(data: &[u8], pos: usize) -> u32 {
        u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
    }

    #[test]
    fn empty_header_layout() -> Result<()> {
        let data = Header::<SignatureTag>::new().render(true)?;

        assert_eq!(data.len(), 16 + 16 + 16);
        assert_eq!(&data[0..4], &[0x8e, 0xad, 0xe8, 0x01]);
        assert_eq!(be32(&data, 8), 1);
        assert_eq!(be32(&data, 12), 16);

        // The region record.
        assert_eq!(be32(&data, 16), 62);
        assert_eq!(be32(&data, 20), 7);
        assert_eq!(be32(&data, 24), 0);
        assert_eq!(be32(&data, 28), 16);

        // The region trailer.
        assert_eq!(be32(&data, 32), 62);
        assert_eq!(be32(&data, 36), 7);
        assert_eq!(be32(&data, 40) as i32, -16);
        assert_eq!(be32(&data, 44), 16);

        Ok(())
    }

    #[test]
    fn alignment() -> Result<()> {
        let mut header = Header::<SignatureTag>::new();
        header.set(SignatureTag::Sha1Header, "abc")?;
        header.set(SignatureTag::LongSize, 42u64)?;
        header.set(SignatureTag::Size, 7u32)?;

        let data = header.render(false)?;
        assert_eq!(be32(&data, 8), 4);

        let store = &data[16 + 4 * 16..];

        // Records in insertion order after the region record.
        assert_eq!(be32(&data, 32), 269);
        assert_eq!(be32(&data, 40), 0);
        assert_eq!(be32(&data, 48), 270);
        // "abc\0" is 4 bytes, padded to 8 for the INT64.
        assert_eq!(be32(&data, 56), 8);
        assert_eq!(&store[4..8], &[0, 0, 0, 0]);
        assert_eq!(be32(&data, 64), 1000);
        assert_eq!(be32(&data, 72), 16);

        // Trailer follows the last value.
        assert_eq!(be32(&data, 24), 20);
        assert_eq!(be32(store, 20), 62);
        assert_eq!(be32(store, 28) as i32, -64);

        Ok(())
    }

    #[test]
    fn sorted_rendering() -> Result<()> {
        let mut header = Header::<SignatureTag>::new();
        header.set(SignatureTag::Size, 7u32)?;
        header.set(SignatureTag::Sha256Header, "a")?;
        header.set(SignatureTag::Sha1Header, "b")?;

        let data = header.render(true)?;
        let tags = (0..4).map(|i| be32(&data, 16 + i * 16)).collect::<Vec<_>>();
        assert_eq!(tags, vec![62, 269, 273, 1000]);

        let data = header.render(false)?;
        let tags = (0..4).map(|i| be32(&data, 16 + i * 16)).collect::<Vec<_>>();
        assert_eq!(tags, vec![62, 1000, 273, 269]);

        Ok(())
    }

    #[test]
    fn round_trip_all_types() -> Result<()> {
        let entries = vec![
            (5000, HeaderValue::Null),
            (5001, HeaderValue::Char(vec![b'x'])),
            (5002, HeaderValue::Int8(vec![1, 2, 3])),
            (5003, HeaderValue::Int16(vec![0o644])),
            (5004, HeaderValue::Int16(vec![1, 2, 65535])),
            (5005, HeaderValue::Int32(vec![7])),
            (5006, HeaderValue::Int32(vec![1, u32::MAX])),
            (5007, HeaderValue::Int64(vec![u64::MAX - 1])),
            (5008, HeaderValue::String("hello world".into())),
            (5009, HeaderValue::String("".into())),
            (5010, HeaderValue::Bin(vec![0, 1, 2, 0, 255])),
            (
                5011,
                HeaderValue::StringArray(vec!["a".into(), "".into(), "ccc".into()]),
            ),
            (5012, HeaderValue::I18nString(vec!["summary".into()])),
            (
                5013,
                HeaderValue::Unknown {
                    type_id: 42,
                    data: vec![9, 8, 7],
                },
            ),
        ];

        for sort in [false, true] {
            let data = render_entries(&entries, sort, 63)?;
            assert_eq!(parse_entries(&data, 63)?, entries);
        }

        Ok(())
    }

    #[test]
    fn deterministic() -> Result<()> {
        let mut header = Header::<RpmTag>::new();
        header.set(RpmTag::Name, "foo")?;
        header.set(RpmTag::BaseNames, vec!["a".to_string(), "b".to_string()])?;
        header.set(RpmTag::FileModes, vec![0o100644u16, 0o40755])?;

        assert_eq!(header.render(true)?, header.render(true)?);

        let parsed = Header::<RpmTag>::parse(&header.render(true)?)?;
        assert_eq!(
            parsed.iter().map(|(tag, _)| tag).collect::<Vec<_>>(),
            vec![1000, 1030, 1117]
        );
        assert_eq!(parsed, header);

        let mut other = Header::<RpmTag>::new();
        other.set(RpmTag::Name, "foo")?;
        other.set(RpmTag::BaseNames, vec!["a".to_string()])?;
        other.set(RpmTag::FileModes, vec![0o100644u16, 0o40755])?;
        assert_ne!(parsed, other);
        other.remove(RpmTag::BaseNames);
        assert_ne!(parsed, other);

        Ok(())
    }

    #[test]
    fn empty_arrays_round_trip() -> Result<()> {
        let entries = vec![
            (5000, HeaderValue::StringArray(vec![])),
            (5001, HeaderValue::Int32(vec![])),
            (5002, HeaderValue::Bin(vec![])),
            (5003, HeaderValue::Int16(vec![1])),
        ];

        let data = render_entries(&entries, true, 63)?;
        let parsed = parse_entries(&data, 63)?;
        assert_eq!(parsed, entries);
        assert_eq!(render_entries(&parsed, true, 63)?, data);

        Ok(())
    }

    #[test]
    fn type_mismatch() {
        let mut header = Header::<RpmTag>::new();

        assert!(matches!(
            header.set(RpmTag::Name, 42u32),
            Err(RpmError::TagTypeMismatch { tag: 1000, .. })
        ));
        assert!(header.is_empty());

        header.set_raw(RpmTag::Epoch.id(), HeaderValue::String("1".into()));
        assert!(matches!(
            header.get_u32(RpmTag::Epoch),
            Err(RpmError::TagTypeMismatch { tag: 1003, .. })
        ));
        assert!(matches!(header.get_str(RpmTag::Epoch), Ok(Some("1"))));
        assert!(matches!(header.get_u32(RpmTag::Size), Ok(None)));
    }

    #[test]
    fn missing_nul() -> Result<()> {
        let mut header = Header::<RpmTag>::new();
        header.set(RpmTag::Name, "abc")?;
        let mut data = header.render(true)?;

        // Replace the NUL terminator of "abc" and the trailing region bytes
        // with non-NUL data, shrinking the store so the string runs off the end.
        let store_start = 16 + 2 * 16;
        data[store_start + 3] = b'd';
        data.truncate(store_start + 4);
        data[12..16].copy_from_slice(&4u32.to_be_bytes());

        assert!(matches!(
            Header::<RpmTag>::parse(&data),
            Err(RpmError::HeaderStringMissingNul { tag: 1000 })
        ));

        Ok(())
    }

    #[test]
    fn corrupt_input() -> Result<()> {
        assert!(matches!(
            Header::<RpmTag>::parse(&[0x8e, 0xad]),
            Err(RpmError::HeaderTruncated(_))
        ));
        assert!(matches!(
            Header::<RpmTag>::parse(&[0u8; 16]),
            Err(RpmError::BadHeaderMagic)
        ));

        let mut header = Header::<RpmTag>::new();
        header.set(RpmTag::BuildTime, 1u32)?;
        let data = header.render(true)?;
        assert!(matches!(
            Header::<RpmTag>::parse(&data[0..data.len() - 1]),
            Err(RpmError::HeaderTruncated(_))
        ));

        // Point the INT32 entry past the end of the store.
        let mut bad = data.clone();
        bad[16 + 16 + 8..16 + 16 + 12].copy_from_slice(&1000i32.to_be_bytes());
        assert!(matches!(
            Header::<RpmTag>::parse(&bad),
            Err(RpmError::HeaderEntryOutOfBounds { tag: 1006 })
        ));

        Ok(())
    }

    #[test]
    fn reject_invalid_values() {
        let mut header = Header::<RpmTag>::new();
        header.set_raw(1000, HeaderValue::String("a\0b".into()));
        assert!(matches!(
            header.render(true),
            Err(RpmError::HeaderValueInvalid { tag: 1000, .. })
        ));

        let mut header = Header::<RpmTag>::new();
        header.set_raw(63, HeaderValue::Bin(vec![0; 16]));
        assert!(header.render(true).is_err());
    }

    #[test]
    fn read_from_stream() -> Result<()> {
        let mut header = Header::<RpmTag>::new();
        header.set(RpmTag::Name, "foo")?;
        header.set(RpmTag::Version, "1.0")?;
        let data = header.render(true)?;

        let mut stream = data.clone();
        stream.extend_from_slice(b"trailing payload");
        let mut cursor = Cursor::new(stream);

        let (parsed, raw) = Header::<RpmTag>::read_from(&mut cursor)?;
        assert_eq!(parsed, header);
        assert_eq!(raw, data);
        assert_eq!(cursor.position() as usize, data.len());

        Ok(())
    }

    #[test]
    fn replace_and_remove() -> Result<()> {
        let mut header = Header::<RpmTag>::new();
        header.set(RpmTag::Name, "a")?;
        header.set(RpmTag::Version, "1")?;
        header.set(RpmTag::Name, "b")?;

        assert_eq!(header.len(), 2);
        assert_eq!(header.require_str(RpmTag::Name)?, "b");
        assert_eq!(header.iter().next().map(|(t, _)| t), Some(1000));

        assert_eq!(
            header.remove(RpmTag::Name),
            Some(HeaderValue::String("b".into()))
        );
        assert!(!header.contains(RpmTag::Name));
        assert!(matches!(
            header.require_str(RpmTag::Name),
            Err(RpmError::MissingTag(1000))
        ));

        Ok(())
    }
}
