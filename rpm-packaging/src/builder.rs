// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Create binary RPM packages.

[PackageBuilder] accumulates package metadata, relationships, scripts and
files. [PackageBuilder::build] derives the metadata header from them,
assembles the payload and writes the package.
*/

use {
    crate::{
        dependency::{write_dependencies, Dependency, DependencyFlags, DependencyKind},
        digest::DigestAlgorithm,
        error::{Result, RpmError},
        header::{Header, HeaderValue},
        lead::{PackageType, RpmLead},
        payload::{
            normalize_path, PayloadCoding, PayloadDigestProcessor, PayloadEntry, PayloadFlags,
            PayloadRecorder,
        },
        signature::SignatureProcessor,
        tag::RpmTag,
        version::RpmVersion,
        writer::RpmWriter,
    },
    cpio_archive::{MODE_DIRECTORY, MODE_REGULAR_FILE, MODE_SYMLINK, MODE_TYPE_MASK},
    log::info,
    std::{
        collections::BTreeMap,
        io::Write,
        path::{Path, PathBuf},
        time::SystemTime,
    },
};

/// Interpreter used for scriptlets.
const SCRIPT_INTERPRETER: &str = "/bin/sh";

bitflags::bitflags! {
    /// Attributes of a packaged file (`FILEFLAGS`).
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct FileFlags: u32 {
        const CONFIG = 1 << 0;
        const DOC = 1 << 1;
        const MISSING_OK = 1 << 3;
        const NO_REPLACE = 1 << 4;
        const GHOST = 1 << 6;
        const LICENSE = 1 << 7;
        const README = 1 << 8;
    }
}

/// Ownership and attributes of a packaged file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileOptions {
    pub permissions: u32,
    pub user: String,
    pub group: String,
    pub flags: FileFlags,
    /// Modification time. Defaults to the build time.
    pub mtime: Option<u32>,
}

impl FileOptions {
    /// Options for an entry owned by `root:root`.
    pub fn new(permissions: u32) -> Self {
        Self {
            permissions,
            user: "root".to_string(),
            group: "root".to_string(),
            flags: FileFlags::empty(),
            mtime: None,
        }
    }

    pub fn user(mut self, user: impl ToString) -> Self {
        self.user = user.to_string();
        self
    }

    pub fn group(mut self, group: impl ToString) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn flags(mut self, flags: FileFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn mtime(mut self, mtime: u32) -> Self {
        self.mtime = Some(mtime);
        self
    }
}

/// A scriptlet run by the package manager.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ScriptKind {
    PreInstall,
    PostInstall,
    PreUninstall,
    PostUninstall,
}

impl ScriptKind {
    /// The script, interpreter and flags tags and the requirement flags of
    /// the interpreter dependency.
    fn tags(&self) -> (RpmTag, RpmTag, RpmTag, DependencyFlags) {
        match self {
            Self::PreInstall => (
                RpmTag::Prein,
                RpmTag::PreinProg,
                RpmTag::PreinFlags,
                DependencyFlags::SCRIPT_PRE,
            ),
            Self::PostInstall => (
                RpmTag::Postin,
                RpmTag::PostinProg,
                RpmTag::PostinFlags,
                DependencyFlags::SCRIPT_POST,
            ),
            Self::PreUninstall => (
                RpmTag::Preun,
                RpmTag::PreunProg,
                RpmTag::PreunFlags,
                DependencyFlags::SCRIPT_PREUN,
            ),
            Self::PostUninstall => (
                RpmTag::Postun,
                RpmTag::PostunProg,
                RpmTag::PostunFlags,
                DependencyFlags::SCRIPT_POSTUN,
            ),
        }
    }
}

#[derive(Clone, Debug)]
enum FileSource {
    Data(Vec<u8>),
    Path(PathBuf),
    Directory,
    Symlink(String),
}

#[derive(Clone, Debug)]
struct PackageFile {
    source: FileSource,
    options: FileOptions,
}

#[derive(Clone, Debug)]
struct ChangelogEntry {
    time: u32,
    author: String,
    text: String,
}

/// Per-file metadata arrays of the metadata header.
#[derive(Default)]
struct FileArrays {
    base_names: Vec<String>,
    dir_names: Vec<String>,
    dir_indexes: Vec<u32>,
    sizes: Vec<u64>,
    modes: Vec<u16>,
    mtimes: Vec<u32>,
    digests: Vec<String>,
    link_tos: Vec<String>,
    flags: Vec<u32>,
    users: Vec<String>,
    groups: Vec<String>,
    inodes: Vec<u32>,
}

impl FileArrays {
    fn push(
        &mut self,
        entry: &PayloadEntry,
        type_bits: u32,
        link_to: &str,
        options: &FileOptions,
        mtime: u32,
    ) {
        let (dir, base) = entry.path.rsplit_once('/').unwrap_or(("", entry.path.as_str()));
        let dir = format!("{}/", dir);

        let dir_index = match self.dir_names.iter().position(|d| d == &dir) {
            Some(index) => index,
            None => {
                self.dir_names.push(dir);
                self.dir_names.len() - 1
            }
        };

        self.base_names.push(base.to_string());
        self.dir_indexes.push(dir_index as u32);
        self.sizes.push(entry.size);
        self.modes
            .push(((type_bits | (options.permissions & !MODE_TYPE_MASK)) & 0xffff) as u16);
        self.mtimes.push(mtime);
        self.digests
            .push(entry.digest.as_ref().map(hex::encode).unwrap_or_default());
        self.link_tos.push(link_to.to_string());
        self.flags.push(options.flags.bits());
        self.users.push(options.user.clone());
        self.groups.push(options.group.clone());
        self.inodes.push(entry.inode);
    }

    fn total_size(&self) -> u64 {
        self.sizes.iter().sum()
    }

    fn write(self, header: &mut Header<RpmTag>, file_digest: DigestAlgorithm) -> Result<()> {
        let count = self.base_names.len();
        if count == 0 {
            return Ok(());
        }

        let sizes = self
            .sizes
            .iter()
            .map(|size| u32::try_from(*size))
            .collect::<std::result::Result<Vec<_>, _>>();
        match sizes {
            Ok(sizes) => header.set(RpmTag::FileSizes, sizes)?,
            Err(_) => header.set(RpmTag::LongFileSizes, self.sizes)?,
        }

        header.set(RpmTag::FileModes, self.modes)?;
        header.set(RpmTag::FileRdevs, vec![0u16; count])?;
        header.set(RpmTag::FileMtimes, self.mtimes)?;
        header.set(RpmTag::FileDigests, self.digests)?;
        header.set(RpmTag::FileLinkTos, self.link_tos)?;
        header.set(RpmTag::FileFlags, self.flags)?;
        header.set(RpmTag::FileUserName, self.users)?;
        header.set(RpmTag::FileGroupName, self.groups)?;
        header.set(RpmTag::FileVerifyFlags, vec![u32::MAX; count])?;
        header.set(RpmTag::FileDevices, vec![1u32; count])?;
        header.set(RpmTag::FileInodes, self.inodes)?;
        header.set(RpmTag::FileLangs, vec![String::new(); count])?;
        header.set(RpmTag::FileDigestAlgo, file_digest.id())?;
        header.set(RpmTag::DirIndexes, self.dir_indexes)?;
        header.set(RpmTag::BaseNames, self.base_names)?;
        header.set(RpmTag::DirNames, self.dir_names)?;

        Ok(())
    }
}

/// A builder for a binary RPM package.
pub struct PackageBuilder<'a> {
    name: String,
    version: String,
    release: String,
    epoch: Option<u32>,
    arch: String,
    summary: Option<String>,
    description: Option<String>,
    license: String,
    group: String,
    url: Option<String>,
    vendor: Option<String>,
    packager: Option<String>,
    build_host: String,
    build_time: Option<SystemTime>,
    coding: PayloadCoding,
    payload_flags: Option<PayloadFlags>,
    file_digest: DigestAlgorithm,
    dependencies: Vec<(DependencyKind, Dependency)>,
    scripts: BTreeMap<ScriptKind, String>,
    changelog: Vec<ChangelogEntry>,
    files: BTreeMap<String, PackageFile>,
    signers: Vec<Box<dyn SignatureProcessor + 'a>>,
}

impl<'a> PackageBuilder<'a> {
    /// Construct a new instance for a package name, version, release and architecture.
    pub fn new(
        name: impl ToString,
        version: impl ToString,
        release: impl ToString,
        arch: impl ToString,
    ) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            epoch: None,
            arch: arch.to_string(),
            summary: None,
            description: None,
            license: "Unspecified".to_string(),
            group: "Unspecified".to_string(),
            url: None,
            vendor: None,
            packager: None,
            build_host: "localhost".to_string(),
            build_time: None,
            coding: PayloadCoding::default(),
            payload_flags: None,
            file_digest: DigestAlgorithm::default(),
            dependencies: vec![],
            scripts: BTreeMap::new(),
            changelog: vec![],
            files: BTreeMap::new(),
            signers: vec![],
        }
    }

    pub fn set_epoch(mut self, epoch: u32) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn set_summary(mut self, summary: impl ToString) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn set_description(mut self, description: impl ToString) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn set_license(mut self, license: impl ToString) -> Self {
        self.license = license.to_string();
        self
    }

    pub fn set_group(mut self, group: impl ToString) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn set_url(mut self, url: impl ToString) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn set_vendor(mut self, vendor: impl ToString) -> Self {
        self.vendor = Some(vendor.to_string());
        self
    }

    pub fn set_packager(mut self, packager: impl ToString) -> Self {
        self.packager = Some(packager.to_string());
        self
    }

    pub fn set_build_host(mut self, host: impl ToString) -> Self {
        self.build_host = host.to_string();
        self
    }

    /// Set the build time recorded in the package.
    ///
    /// The build time is also the default modification time of files. If not
    /// called, the current time is used. Setting a fixed time makes the
    /// output deterministic.
    pub fn set_build_time(mut self, time: Option<SystemTime>) -> Self {
        self.build_time = time;
        self
    }

    /// Set the payload compression.
    ///
    /// Codings other than gzip add an `rpmlib()` requirement.
    pub fn set_coding(mut self, coding: PayloadCoding) -> Self {
        self.coding = coding;
        self
    }

    /// Set explicit compression settings. They must match the coding.
    pub fn set_payload_flags(mut self, flags: PayloadFlags) -> Self {
        self.payload_flags = Some(flags);
        self
    }

    /// Set the algorithm of file content digests.
    pub fn set_file_digest(mut self, algorithm: DigestAlgorithm) -> Self {
        self.file_digest = algorithm;
        self
    }

    pub fn add_dependency(mut self, kind: DependencyKind, dependency: Dependency) -> Self {
        self.dependencies.push((kind, dependency));
        self
    }

    pub fn add_require(self, dependency: Dependency) -> Self {
        self.add_dependency(DependencyKind::Require, dependency)
    }

    pub fn add_provide(self, dependency: Dependency) -> Self {
        self.add_dependency(DependencyKind::Provide, dependency)
    }

    pub fn add_conflict(self, dependency: Dependency) -> Self {
        self.add_dependency(DependencyKind::Conflict, dependency)
    }

    pub fn add_obsolete(self, dependency: Dependency) -> Self {
        self.add_dependency(DependencyKind::Obsolete, dependency)
    }

    /// Set a scriptlet, replacing any existing one of the same kind.
    ///
    /// Scriptlets are run by `/bin/sh`.
    pub fn set_script(mut self, kind: ScriptKind, script: impl ToString) -> Self {
        self.scripts.insert(kind, script.to_string());
        self
    }

    /// Add a changelog entry. Entries are recorded in the order added.
    pub fn add_changelog(mut self, time: u32, author: impl ToString, text: impl ToString) -> Self {
        self.changelog.push(ChangelogEntry {
            time,
            author: author.to_string(),
            text: text.to_string(),
        });
        self
    }

    fn add_entry(mut self, path: &str, source: FileSource, options: FileOptions) -> Result<Self> {
        let path = normalize_path(path)?;
        self.files.insert(path, PackageFile { source, options });

        Ok(self)
    }

    /// Register a file to install with content from memory.
    ///
    /// Registering a path again replaces the earlier registration.
    pub fn add_file_data(
        self,
        path: &str,
        data: impl Into<Vec<u8>>,
        options: FileOptions,
    ) -> Result<Self> {
        self.add_entry(path, FileSource::Data(data.into()), options)
    }

    /// Register a file to install with content read from `source` at build time.
    pub fn add_file_path(
        self,
        path: &str,
        source: impl AsRef<Path>,
        options: FileOptions,
    ) -> Result<Self> {
        self.add_entry(path, FileSource::Path(source.as_ref().to_path_buf()), options)
    }

    pub fn add_directory(self, path: &str, options: FileOptions) -> Result<Self> {
        self.add_entry(path, FileSource::Directory, options)
    }

    pub fn add_symlink(self, path: &str, target: &str, options: FileOptions) -> Result<Self> {
        if target.is_empty() || target.contains('\0') {
            return Err(RpmError::InvalidPath(target.to_string()));
        }

        self.add_entry(path, FileSource::Symlink(target.to_string()), options)
    }

    /// Register a signature processor, such as a [crate::signature::pgp::PgpSignatureProcessor].
    pub fn add_signature_processor(mut self, processor: Box<dyn SignatureProcessor + 'a>) -> Self {
        self.signers.push(processor);
        self
    }

    fn build_time(&self) -> Result<u32> {
        let time = self.build_time.unwrap_or_else(SystemTime::now);
        let seconds = time
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|_| RpmError::Unsupported("build times before the UNIX epoch".to_string()))?
            .as_secs();

        u32::try_from(seconds)
            .map_err(|_| RpmError::Unsupported("build times after 2106".to_string()))
    }

    fn full_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }

    /// Requirements every package built by this builder has.
    fn rpmlib_requirements(&self) -> Vec<Dependency> {
        let mut res = vec![
            Dependency::rpmlib("CompressedFileNames", "3.0.4-1"),
            Dependency::rpmlib("PayloadFilesHavePrefix", "4.0-1"),
        ];

        if self.file_digest != DigestAlgorithm::Md5 {
            res.push(Dependency::rpmlib("FileDigests", "4.6.0-1"));
        }
        res.extend(self.coding.rpmlib_dependency());

        res
    }

    fn dependencies_of(&self, kind: DependencyKind) -> Vec<Dependency> {
        self.dependencies
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, d)| d.clone())
            .collect()
    }

    fn metadata_header(
        &self,
        evr: &RpmVersion,
        build_time: u32,
        files: FileArrays,
    ) -> Result<Header<RpmTag>> {
        let mut header = Header::new();

        let summary = self.summary.clone().unwrap_or_else(|| self.name.clone());
        let description = self.description.clone().unwrap_or_else(|| summary.clone());

        header.set(RpmTag::HeaderI18nTable, vec!["C".to_string()])?;
        header.set(RpmTag::Name, self.name.as_str())?;
        header.set(RpmTag::Version, self.version.as_str())?;
        header.set(RpmTag::Release, self.release.as_str())?;
        if let Some(epoch) = self.epoch {
            header.set(RpmTag::Epoch, epoch)?;
        }
        header.set(RpmTag::Summary, HeaderValue::I18nString(vec![summary]))?;
        header.set(RpmTag::Description, HeaderValue::I18nString(vec![description]))?;
        header.set(RpmTag::BuildTime, build_time)?;
        header.set(RpmTag::BuildHost, self.build_host.as_str())?;
        header.set(RpmTag::License, self.license.as_str())?;
        header.set(RpmTag::Group, HeaderValue::I18nString(vec![self.group.clone()]))?;
        if let Some(url) = &self.url {
            header.set(RpmTag::Url, url.as_str())?;
        }
        if let Some(vendor) = &self.vendor {
            header.set(RpmTag::Vendor, vendor.as_str())?;
        }
        if let Some(packager) = &self.packager {
            header.set(RpmTag::Packager, packager.as_str())?;
        }
        header.set(RpmTag::Os, "linux")?;
        header.set(RpmTag::Arch, self.arch.as_str())?;
        header.set(RpmTag::SourceRpm, format!("{}.src.rpm", self.full_name()))?;
        header.set(RpmTag::Encoding, "utf-8")?;

        let total_size = files.total_size();
        match u32::try_from(total_size) {
            Ok(size) => header.set(RpmTag::Size, size)?,
            Err(_) => header.set(RpmTag::LongSize, total_size)?,
        }
        files.write(&mut header, self.file_digest)?;

        let mut requires = self.rpmlib_requirements();
        for (kind, script) in &self.scripts {
            let (script_tag, prog_tag, flags_tag, dependency_flags) = kind.tags();

            header.set(script_tag, script.as_str())?;
            header.set(prog_tag, SCRIPT_INTERPRETER)?;
            header.set(flags_tag, 0u32)?;
            requires.push(Dependency::new(
                SCRIPT_INTERPRETER,
                DependencyFlags::INTERP | dependency_flags,
                "",
            ));
        }

        let mut provides = vec![Dependency::equals(&self.name, evr)];
        requires.extend(self.dependencies_of(DependencyKind::Require));
        provides.extend(self.dependencies_of(DependencyKind::Provide));

        write_dependencies(&mut header, DependencyKind::Require, &requires)?;
        write_dependencies(&mut header, DependencyKind::Provide, &provides)?;
        for kind in [
            DependencyKind::Conflict,
            DependencyKind::Obsolete,
            DependencyKind::Recommend,
            DependencyKind::Suggest,
            DependencyKind::Supplement,
            DependencyKind::Enhance,
        ] {
            write_dependencies(&mut header, kind, &self.dependencies_of(kind))?;
        }

        if !self.changelog.is_empty() {
            header.set(
                RpmTag::ChangelogTime,
                self.changelog.iter().map(|e| e.time).collect::<Vec<_>>(),
            )?;
            header.set(
                RpmTag::ChangelogName,
                self.changelog
                    .iter()
                    .map(|e| e.author.clone())
                    .collect::<Vec<_>>(),
            )?;
            header.set(
                RpmTag::ChangelogText,
                self.changelog
                    .iter()
                    .map(|e| e.text.clone())
                    .collect::<Vec<_>>(),
            )?;
        }

        Ok(header)
    }

    /// Build the package, writing it to `writer`.
    ///
    /// Returns the writer on success.
    pub fn build<W: Write>(mut self, writer: W) -> Result<W> {
        let evr = RpmVersion::new(self.epoch, &self.version, Some(&self.release))?;
        let build_time = self.build_time()?;

        let mut recorder = PayloadRecorder::new(self.coding, self.payload_flags, self.file_digest)?;
        recorder.add_processor(Box::new(PayloadDigestProcessor::default()))?;

        let mut files = FileArrays::default();
        for (path, file) in &self.files {
            let mtime = file.options.mtime.unwrap_or(build_time);
            let permissions = file.options.permissions;

            let (entry, type_bits, link_to) = match &file.source {
                FileSource::Data(data) => (
                    recorder.add_file_data(path, data, permissions, mtime)?,
                    MODE_REGULAR_FILE,
                    "",
                ),
                FileSource::Path(source) => (
                    recorder.add_file_path(path, source, permissions, mtime)?,
                    MODE_REGULAR_FILE,
                    "",
                ),
                FileSource::Directory => (
                    recorder.add_directory(path, permissions, mtime)?,
                    MODE_DIRECTORY,
                    "",
                ),
                FileSource::Symlink(target) => (
                    recorder.add_symlink(path, target, mtime)?,
                    MODE_SYMLINK,
                    target.as_str(),
                ),
            };

            files.push(&entry, type_bits, link_to, &file.options, mtime);
        }

        let payload = recorder.finish()?;
        let header = self.metadata_header(&evr, build_time, files)?;

        let lead = RpmLead::new(PackageType::Binary, &self.arch, self.full_name());
        let mut rpm = RpmWriter::new(writer, lead);
        rpm.set_header(header);
        rpm.set_payload(payload);
        for signer in std::mem::take(&mut self.signers) {
            rpm.add_signature_processor(signer)?;
        }

        let writer = rpm.finish()?;

        info!(
            "built {}.{} with {} files",
            self.full_name(),
            self.arch,
            self.files.len()
        );

        Ok(writer)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            dependency::read_dependencies,
            reader::RpmReader,
            signature::pgp::{tests::signing_key, PgpSignatureProcessor},
            tag::SignatureTag,
        },
        pgp::{composed::StandaloneSignature, crypto::HashAlgorithm, Deserializable, KeyType},
        std::{io::Cursor, time::Duration},
    };

    fn fixed_time() -> Option<SystemTime> {
        Some(std::time::UNIX_EPOCH + Duration::from_secs(1_600_000_000))
    }

    fn demo<'a>() -> Result<PackageBuilder<'a>> {
        PackageBuilder::new("demo", "1.2.3", "1", "x86_64")
            .set_summary("A demonstration")
            .set_license("MPL-2.0")
            .set_build_time(fixed_time())
            .add_require(Dependency::greater_eq("glibc", "2.28"))
            .add_require(Dependency::any("bash"))
            .add_conflict(Dependency::less_eq("demo-legacy", "1.0"))
            .set_script(ScriptKind::PostInstall, "ldconfig")
            .add_changelog(1_600_000_000, "Packager <p@example.com>", "- Initial package")
            .add_directory("/usr/share/demo", FileOptions::new(0o755))?
            .add_file_data(
                "/usr/share/demo/README",
                b"demo readme\n".to_vec(),
                FileOptions::new(0o644).flags(FileFlags::DOC),
            )?
            .add_file_data(
                "/etc/demo.conf",
                b"key = value\n".to_vec(),
                FileOptions::new(0o640)
                    .group("demo")
                    .flags(FileFlags::CONFIG | FileFlags::NO_REPLACE),
            )?
            .add_symlink("/usr/bin/demo", "../share/demo/README", FileOptions::new(0o777))
    }

    #[test]
    fn build_and_read() -> Result<()> {
        let data = demo()?.set_coding(PayloadCoding::Zstd).build(vec![])?;

        let reader = RpmReader::new(Cursor::new(data))?;
        assert_eq!(reader.lead().name, "demo-1.2.3-1");
        assert_eq!(reader.lead().architecture, 1);

        let header = reader.header();
        assert_eq!(header.get_str(RpmTag::Name)?, Some("demo"));
        assert_eq!(header.get_u32(RpmTag::BuildTime)?, Some(1_600_000_000));
        assert_eq!(header.get_str(RpmTag::PayloadCompressor)?, Some("zstd"));
        assert_eq!(header.get_str(RpmTag::SourceRpm)?, Some("demo-1.2.3-1.src.rpm"));
        assert_eq!(header.get_str(RpmTag::Postin)?, Some("ldconfig"));
        assert_eq!(header.get_str(RpmTag::PostinProg)?, Some("/bin/sh"));

        // Files are ordered by path.
        assert_eq!(
            header.get_string_array(RpmTag::BaseNames)?,
            Some(
                &[
                    "demo.conf".to_string(),
                    "demo".to_string(),
                    "demo".to_string(),
                    "README".to_string()
                ][..]
            )
        );
        assert_eq!(
            header.get_string_array(RpmTag::DirNames)?,
            Some(
                &[
                    "/etc/".to_string(),
                    "/usr/bin/".to_string(),
                    "/usr/share/".to_string(),
                    "/usr/share/demo/".to_string()
                ][..]
            )
        );
        assert_eq!(header.get_u32_array(RpmTag::DirIndexes)?, Some(&[0, 1, 2, 3][..]));
        assert_eq!(
            header.get_u16_array(RpmTag::FileModes)?,
            Some(&[0o100640, 0o120777, 0o040755, 0o100644][..])
        );
        assert_eq!(header.get_u32_array(RpmTag::FileSizes)?, Some(&[12, 20, 0, 12][..]));
        assert_eq!(header.get_u32(RpmTag::Size)?, Some(44));
        assert_eq!(
            header.get_string_array(RpmTag::FileGroupName)?.map(|g| g[0].as_str()),
            Some("demo")
        );
        assert_eq!(
            header.get_string_array(RpmTag::FileDigests)?.map(|d| d[0].clone()),
            Some(DigestAlgorithm::Sha256.digest_hex(b"key = value\n"))
        );
        assert_eq!(
            header.get_string_array(RpmTag::FileLinkTos)?.map(|l| l[1].as_str()),
            Some("../share/demo/README")
        );
        assert_eq!(header.get_u32(RpmTag::FileDigestAlgo)?, Some(8));
        assert_eq!(
            header.get_u32_array(RpmTag::FileFlags)?,
            Some(&[0b1_0001, 0, 0, 0b10][..])
        );

        let requires = read_dependencies(header, DependencyKind::Require)?;
        let names = requires.iter().map(|d| d.name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "/bin/sh",
                "bash",
                "glibc",
                "rpmlib(CompressedFileNames)",
                "rpmlib(FileDigests)",
                "rpmlib(PayloadFilesHavePrefix)",
                "rpmlib(PayloadIsZstd)",
            ]
        );

        let provides = read_dependencies(header, DependencyKind::Provide)?;
        assert_eq!(provides, vec![Dependency::equals("demo", "1.2.3-1")]);

        let conflicts = read_dependencies(header, DependencyKind::Conflict)?;
        assert_eq!(conflicts, vec![Dependency::less_eq("demo-legacy", "1.0")]);

        let entries = reader.payload_entries()?;
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].header.name, "./etc/demo.conf");
        assert_eq!(entries[0].data, b"key = value\n");
        assert_eq!(entries[3].header.mtime, 1_600_000_000);

        Ok(())
    }

    #[test]
    fn deterministic_output() -> Result<()> {
        let a = demo()?.build(vec![])?;
        let b = demo()?.build(vec![])?;
        assert_eq!(a, b);

        let verified = RpmReader::new(Cursor::new(a))?.verify_digests()?;
        assert!(verified.payload_digest);
        assert!(verified.signature_tags.contains(&SignatureTag::Md5));

        Ok(())
    }

    #[test]
    fn empty_package() -> Result<()> {
        let data = PackageBuilder::new("empty", "0", "0", "noarch")
            .set_epoch(2)
            .set_coding(PayloadCoding::None)
            .set_build_time(fixed_time())
            .build(vec![])?;

        let reader = RpmReader::new(Cursor::new(data))?;
        assert_eq!(reader.lead().architecture, 0);
        assert!(!reader.header().contains(RpmTag::BaseNames));
        assert_eq!(reader.header().get_u32(RpmTag::Size)?, Some(0));
        assert_eq!(
            read_dependencies(reader.header(), DependencyKind::Provide)?,
            vec![Dependency::equals("empty", "2:0-0")]
        );
        assert!(reader.payload_entries()?.is_empty());

        Ok(())
    }

    #[test]
    fn invalid_input() {
        assert!(matches!(
            PackageBuilder::new("x", "1", "1", "noarch")
                .add_directory("/a/../b", FileOptions::new(0o755)),
            Err(RpmError::InvalidPath(_))
        ));
        assert!(matches!(
            PackageBuilder::new("x", "1-2", "1", "noarch").build(vec![]),
            Err(RpmError::VersionParse(_))
        ));
        assert!(matches!(
            PackageBuilder::new("x", "1", "1", "noarch")
                .set_coding(PayloadCoding::Gzip)
                .set_payload_flags(PayloadCoding::Xz.default_flags())
                .build(vec![]),
            Err(RpmError::InvalidPayloadFlags { .. })
        ));
    }

    #[test]
    fn signed_package() -> Result<()> {
        let (secret, public) = signing_key(KeyType::EdDSA);

        let data = demo()?
            .add_signature_processor(Box::new(PgpSignatureProcessor::new(
                &secret,
                String::new,
                HashAlgorithm::SHA2_256,
                chrono::Utc::now(),
            )?))
            .build(vec![])?;

        let reader = RpmReader::new(Cursor::new(data))?;
        let signature = reader
            .signature()
            .get_bytes(SignatureTag::DsaHeader)?
            .expect("DSAHEADER should be present");
        StandaloneSignature::from_bytes(Cursor::new(signature))?
            .signature
            .verify(&public, Cursor::new(reader.header_data()))?;
        assert!(reader.signature().contains(SignatureTag::Gpg));

        reader.verify_digests()?;

        Ok(())
    }
}
