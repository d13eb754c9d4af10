// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The legacy 96 byte lead at the start of RPM files.

Modern RPM tooling ignores most of the lead. It is still written for
compatibility with tools like `file(1)`.
*/

use {
    crate::error::{Result, RpmError},
    scroll::{IOread, IOwrite, Pread, Pwrite, SizeWith},
    std::io::{Read, Write},
};

/// Magic bytes starting every RPM file.
pub const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];

/// Size of the lead in bytes.
pub const LEAD_SIZE: usize = 96;

/// Operating system code for Linux.
pub const LEAD_OS_LINUX: u16 = 1;

/// Signature type denoting a header-style signature section.
pub const LEAD_SIGNATURE_TYPE_HEADER: u16 = 5;

/// Lead as it appears on disk.
#[derive(Clone, Copy, Debug, IOread, IOwrite, Pread, Pwrite, SizeWith)]
struct RawLead {
    magic: [u8; 4],
    major: u8,
    minor: u8,
    package_type: u16,
    architecture: u16,
    name: [u8; 66],
    os: u16,
    signature_type: u16,
    reserved: [u8; 16],
}

/// Whether a package holds binaries or sources.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PackageType {
    Binary,
    Source,
}

impl PackageType {
    pub fn code(&self) -> u16 {
        match self {
            Self::Binary => 0,
            Self::Source => 1,
        }
    }
}

/// Resolve the lead architecture code of an RPM architecture name.
///
/// `noarch` and names unknown to the table map to `0`.
pub fn lead_architecture_code(arch: &str) -> u16 {
    match arch {
        "i386" | "i486" | "i586" | "i686" | "athlon" | "pentium3" | "pentium4" | "x86_64"
        | "amd64" | "ia32e" => 1,
        "alpha" | "alphaev5" | "alphaev56" | "alphaev6" | "alphaev67" => 2,
        "sparc" | "sparcv8" | "sparcv9" | "sparc64" | "sparc64v" => 3,
        "mips" | "mipsel" | "mipsr6" | "mipsr6el" => 4,
        "ppc" | "ppc8260" | "ppc8560" | "ppc32dy4" | "ppciseries" | "ppcpseries" => 5,
        "m68k" => 6,
        "ia64" => 9,
        "mips64" | "mips64el" | "mips64r6" | "mips64r6el" => 11,
        "armv3l" | "armv4b" | "armv4l" | "armv5tel" | "armv5tejl" | "armv6l" | "armv6hl"
        | "armv7l" | "armv7hl" | "armv7hnl" | "armv8l" | "armv8hl" => 12,
        "s390" => 14,
        "s390x" => 15,
        "ppc64" | "ppc64le" | "ppc64p7" | "ppc64iseries" | "ppc64pseries" => 16,
        "sh" | "sh3" | "sh4" | "sh4a" => 17,
        "aarch64" => 19,
        "riscv64" => 22,
        _ => 0,
    }
}

/// The RPM lead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RpmLead {
    pub major: u8,
    pub minor: u8,
    pub package_type: u16,
    pub architecture: u16,
    /// Package name, typically `name-version-release`.
    ///
    /// Truncated to 65 bytes when written.
    pub name: String,
    pub os: u16,
    pub signature_type: u16,
}

impl RpmLead {
    /// Construct a version 3.0 lead for a Linux package.
    pub fn new(package_type: PackageType, arch: &str, name: impl ToString) -> Self {
        Self {
            major: 3,
            minor: 0,
            package_type: package_type.code(),
            architecture: lead_architecture_code(arch),
            name: name.to_string(),
            os: LEAD_OS_LINUX,
            signature_type: LEAD_SIGNATURE_TYPE_HEADER,
        }
    }

    /// Read a lead from a reader.
    pub fn read_from(reader: &mut impl Read) -> Result<Self> {
        let raw = reader.ioread_with::<RawLead>(scroll::BE).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                RpmError::BadLeadMagic
            } else {
                RpmError::Io(e)
            }
        })?;

        if raw.magic != LEAD_MAGIC {
            return Err(RpmError::BadLeadMagic);
        }
        if raw.major != 3 {
            return Err(RpmError::UnsupportedLeadVersion(raw.major, raw.minor));
        }

        let name_len = raw.name.iter().position(|b| *b == 0).unwrap_or(raw.name.len());

        Ok(Self {
            major: raw.major,
            minor: raw.minor,
            package_type: raw.package_type,
            architecture: raw.architecture,
            name: String::from_utf8_lossy(&raw.name[0..name_len]).to_string(),
            os: raw.os,
            signature_type: raw.signature_type,
        })
    }

    /// Write the lead to a writer.
    ///
    /// Exactly [LEAD_SIZE] bytes are written.
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        let mut name = [0u8; 66];
        let source = self.name.as_bytes();
        let len = source.len().min(name.len() - 1);
        name[0..len].copy_from_slice(&source[0..len]);

        let raw = RawLead {
            magic: LEAD_MAGIC,
            major: self.major,
            minor: self.minor,
            package_type: self.package_type,
            architecture: self.architecture,
            name,
            os: self.os,
            signature_type: self.signature_type,
            reserved: [0u8; 16],
        };

        writer.iowrite_with(raw, scroll::BE)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Cursor};

    #[test]
    fn layout() -> Result<()> {
        let lead = RpmLead::new(PackageType::Binary, "x86_64", "foo-1.0-1");

        let mut data = vec![];
        lead.write(&mut data)?;

        assert_eq!(data.len(), LEAD_SIZE);
        assert_eq!(&data[0..4], &LEAD_MAGIC);
        assert_eq!(&data[4..6], &[3, 0]);
        assert_eq!(&data[6..8], &[0, 0]);
        assert_eq!(&data[8..10], &[0, 1]);
        assert_eq!(&data[10..19], b"foo-1.0-1");
        assert!(data[19..76].iter().all(|b| *b == 0));
        assert_eq!(&data[76..78], &[0, 1]);
        assert_eq!(&data[78..80], &[0, 5]);
        assert!(data[80..96].iter().all(|b| *b == 0));

        assert_eq!(RpmLead::read_from(&mut Cursor::new(data))?, lead);

        Ok(())
    }

    #[test]
    fn long_name_truncated() -> Result<()> {
        let lead = RpmLead::new(PackageType::Source, "noarch", "x".repeat(100));

        let mut data = vec![];
        lead.write(&mut data)?;
        assert_eq!(data.len(), LEAD_SIZE);
        assert_eq!(data[10 + 65], 0);

        let parsed = RpmLead::read_from(&mut Cursor::new(data))?;
        assert_eq!(parsed.name, "x".repeat(65));
        assert_eq!(parsed.package_type, 1);
        assert_eq!(parsed.architecture, 0);

        Ok(())
    }

    #[test]
    fn bad_input() -> Result<()> {
        assert!(matches!(
            RpmLead::read_from(&mut Cursor::new(vec![0u8; 96])),
            Err(RpmError::BadLeadMagic)
        ));
        assert!(matches!(
            RpmLead::read_from(&mut Cursor::new(LEAD_MAGIC.to_vec())),
            Err(RpmError::BadLeadMagic)
        ));

        let mut data = vec![];
        RpmLead::new(PackageType::Binary, "aarch64", "foo").write(&mut data)?;
        data[4] = 4;
        assert!(matches!(
            RpmLead::read_from(&mut Cursor::new(data)),
            Err(RpmError::UnsupportedLeadVersion(4, 0))
        ));

        Ok(())
    }

    #[test]
    fn architecture_codes() {
        assert_eq!(lead_architecture_code("i686"), 1);
        assert_eq!(lead_architecture_code("x86_64"), 1);
        assert_eq!(lead_architecture_code("armv7hl"), 12);
        assert_eq!(lead_architecture_code("aarch64"), 19);
        assert_eq!(lead_architecture_code("ppc64le"), 16);
        assert_eq!(lead_architecture_code("s390x"), 15);
        assert_eq!(lead_architecture_code("noarch"), 0);
        assert_eq!(lead_architecture_code("bogus"), 0);
    }
}
