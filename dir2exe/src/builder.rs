use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::core::{manifest_size, Entry, EntryFlags, Footer, FOOTER_SIZE};
use crate::ext::{copy_buffered, target_path_string, CopyError};
use crate::walker::walk;
use crate::{wrap_io_err, Error, READ_WRITE_BUF_SIZE};

/// What to do with an input file that cannot be read while packing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnUnreadable {
    /// Warn and keep whatever was written for it, a zero-size entry if it
    /// could not be opened at all
    #[default]
    Skip,
    /// Fail the whole build with [`Error::UnreadableInputFile`]
    Abort,
}

#[derive(Clone, Debug)]
pub struct BuildConfig {
    /// Size of the transfer buffer, bounds peak memory use
    pub buffer_size: usize,
    pub on_unreadable: OnUnreadable,
}

impl Default for BuildConfig {
    fn default() -> BuildConfig {
        BuildConfig {
            buffer_size: READ_WRITE_BUF_SIZE,
            on_unreadable: OnUnreadable::default(),
        }
    }
}

struct BuilderEntry {
    /// Target path for archive entry
    target: PathBuf,
    /// `target` as stored in the manifest
    stored: String,
    flags: EntryFlags,

    kind: BuilderEntryKind,
}

impl BuilderEntry {
    // Verify inputs to ensure that incorrect archives are not built by mistake
    fn new(
        target: impl AsRef<Path>,
        flags: EntryFlags,
        kind: BuilderEntryKind,
    ) -> Result<BuilderEntry, Error> {
        let target = target.as_ref().to_path_buf();
        let stored = target_path_string(&target)?;
        // Catches over-long paths and names the loader would refuse
        let valid = Entry::new(0, 0, flags, stored.as_bytes())
            .and_then(|entry| entry.path_components().map(|_| ()));
        if valid.is_err() {
            let component = target
                .components()
                .map(|component| PathBuf::from(component.as_os_str()))
                .find(|component| component.to_string_lossy().contains(':'))
                .unwrap_or_else(|| target.clone());
            return Err(Error::InvalidPath {
                entry: target,
                component,
            });
        }

        Ok(BuilderEntry {
            target,
            stored,
            flags,
            kind,
        })
    }

    fn is_executable(&self) -> bool {
        self.flags.contains(EntryFlags::EXECUTABLE)
    }
}

impl fmt::Debug for BuilderEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BuilderEntry")
            .field("target", &self.target)
            .field("flags", &self.flags)
            .field("kind", &self.kind)
            .finish()
    }
}

enum BuilderEntryKind {
    /// Path to regular file during build
    File(PathBuf),

    Reader(Box<dyn Read>),
}

impl fmt::Debug for BuilderEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuilderEntryKind::File(p) => write!(f, "BuilderEntryKind::File({:?})", p),
            BuilderEntryKind::Reader(_) => write!(f, "BuilderEntryKind::Reader(_)"),
        }
    }
}

/// Builder pattern for constructing self-extracting archives. Holds the
/// loader stub and a list of entries and consumes itself to write the
/// archive.
///
/// Entries are written in the order they were added, except that the main
/// executable always comes last.
///
/// # Example
/// ```
/// use dir2exe::core::ArchiveSrc;
/// use dir2exe::ArchiveBuilder;
///
/// let mut archive: Vec<u8> = Vec::new();
///
/// let mut builder = ArchiveBuilder::new(&b"loader stub"[..]);
/// builder
///     .file_reader(&b"hello"[..], "Content/readme.txt").unwrap()
///     .executable_reader(&b"main program"[..], "Game.exe").unwrap();
/// builder.write_archive(&mut archive).unwrap();
///
/// let entries = archive.read_entries().unwrap();
/// assert_eq!(entries.len(), 2);
/// assert!(entries[1].is_executable());
/// ```
pub struct ArchiveBuilder {
    stub: Vec<u8>,
    config: BuildConfig,

    entries: Vec<BuilderEntry>,
    excluded: Vec<PathBuf>,
}

impl ArchiveBuilder {
    pub fn new(stub: impl Into<Vec<u8>>) -> ArchiveBuilder {
        ArchiveBuilder::with_config(stub, BuildConfig::default())
    }

    pub fn with_config(stub: impl Into<Vec<u8>>, config: BuildConfig) -> ArchiveBuilder {
        ArchiveBuilder {
            stub: stub.into(),
            config,
            entries: Vec::new(),
            excluded: Vec::new(),
        }
    }

    /// Add a regular file to this builder. `source` is the position of the
    /// file on the build system.
    pub fn file(
        &mut self,
        source: impl AsRef<Path>,
        target: impl AsRef<Path>,
    ) -> Result<&mut ArchiveBuilder, Error> {
        self.push(
            target,
            EntryFlags::empty(),
            BuilderEntryKind::File(source.as_ref().to_path_buf()),
        )
    }

    /// Add a file to this builder. `source` is a Reader to read the entry's
    /// data from.
    pub fn file_reader(
        &mut self,
        source: impl Read + 'static,
        target: impl AsRef<Path>,
    ) -> Result<&mut ArchiveBuilder, Error> {
        self.push(
            target,
            EntryFlags::empty(),
            BuilderEntryKind::Reader(Box::new(source)),
        )
    }

    /// Set the main executable. It is stored under its base file name.
    pub fn executable(&mut self, source: impl AsRef<Path>) -> Result<&mut ArchiveBuilder, Error> {
        let source = source.as_ref();
        let target = source.file_name().ok_or_else(|| Error::InvalidPath {
            entry: source.to_path_buf(),
            component: source.to_path_buf(),
        })?;
        self.push(
            Path::new(target),
            EntryFlags::EXECUTABLE,
            BuilderEntryKind::File(source.to_path_buf()),
        )
    }

    /// Set the main executable, reading its data from `source`.
    pub fn executable_reader(
        &mut self,
        source: impl Read + 'static,
        target: impl AsRef<Path>,
    ) -> Result<&mut ArchiveBuilder, Error> {
        self.push(
            target,
            EntryFlags::EXECUTABLE,
            BuilderEntryKind::Reader(Box::new(source)),
        )
    }

    /// Leave `path` out of any directory added later with
    /// [`ArchiveBuilder::dir`]. Paths that do not exist are ignored.
    pub fn exclude(&mut self, path: impl AsRef<Path>) -> &mut ArchiveBuilder {
        if let Ok(canonical) = fs::canonicalize(path.as_ref()) {
            self.excluded.push(canonical);
        }
        self
    }

    /// Walk a directory and replicate its relative structure in this builder
    /// by adding entries for all regular files.
    pub fn dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut ArchiveBuilder, Error> {
        for entry in walk(dir)? {
            if self.is_excluded(&entry.source) {
                info!("Skipping: {}", entry.relative.display());
                continue;
            }
            self.file(entry.source, entry.relative)?;
        }
        Ok(self)
    }

    fn is_excluded(&self, source: &Path) -> bool {
        !self.excluded.is_empty()
            && fs::canonicalize(source).is_ok_and(|canonical| self.excluded.contains(&canonical))
    }

    fn push(
        &mut self,
        target: impl AsRef<Path>,
        flags: EntryFlags,
        kind: BuilderEntryKind,
    ) -> Result<&mut ArchiveBuilder, Error> {
        let entry = BuilderEntry::new(target, flags, kind)?;
        if entry.is_executable() && self.entries.iter().any(BuilderEntry::is_executable) {
            return Err(Error::DuplicateExecutable { path: entry.target });
        }
        self.entries.push(entry);
        Ok(self)
    }

    /// Consume this `ArchiveBuilder`, writing the loader stub, the data of
    /// every entry, the manifest and the footer. Offsets are relative to the
    /// writer's position when this is called, which should be the start of
    /// the output. Returns the total number of bytes written.
    pub fn write_archive<W: Write>(mut self, writer: &mut W) -> Result<u64, Error> {
        if self.stub.is_empty() {
            return Err(Error::MissingLoaderStub { source: None });
        }
        let Some(main) = self.entries.iter().find(|e| e.is_executable()) else {
            return Err(Error::NoExecutableEntry);
        };
        for shadowed in self.entries.iter().filter(|e| !e.is_executable() && e.stored == main.stored) {
            warn!(
                "{} is replaced by the main executable at extraction",
                shadowed.target.display()
            );
        }

        // Stable, so everything else keeps its walk order
        self.entries.sort_by_key(BuilderEntry::is_executable);

        info!("Writing loader stub...");
        writer
            .write_all(&self.stub)
            .map_err(wrap_io_err!("Writing loader stub"))?;
        let mut position = self.stub.len() as u64;

        let mut buf = vec![0; self.config.buffer_size.max(1)];
        let mut entries = Vec::with_capacity(self.entries.len());
        for builder_entry in self.entries.drain(..) {
            if builder_entry.is_executable() {
                info!("Packing main executable: {}", builder_entry.target.display());
            } else {
                info!("Packing: {}", builder_entry.target.display());
            }

            let size = match builder_entry.kind {
                BuilderEntryKind::File(source_path) => match File::open(&source_path) {
                    Ok(source_file) => {
                        copy_entry(source_file, &source_path, writer, &mut buf, self.config.on_unreadable)?
                    }
                    Err(source) => match self.config.on_unreadable {
                        OnUnreadable::Skip => {
                            warn!("Could not open file {}: {}", source_path.display(), source);
                            0
                        }
                        OnUnreadable::Abort => {
                            return Err(Error::UnreadableInputFile {
                                path: source_path,
                                source,
                            });
                        }
                    },
                },
                BuilderEntryKind::Reader(source) => copy_entry(
                    source,
                    &builder_entry.target,
                    writer,
                    &mut buf,
                    self.config.on_unreadable,
                )?,
            };

            let entry = Entry::new(
                position,
                size,
                builder_entry.flags,
                builder_entry.stored.as_bytes(),
            )?;
            debug!("{}", entry);
            entries.push(entry);
            position = position.checked_add(size).ok_or(crate::core::Error::Overflow)?;
        }

        let manifest_offset = position;
        writer
            .write_all(&(entries.len() as u64).to_le_bytes())
            .map_err(wrap_io_err!("Writing manifest"))?;
        for entry in &entries {
            writer
                .write_all(bytemuck::bytes_of(entry))
                .map_err(wrap_io_err!("Writing manifest"))?;
        }
        writer
            .write_all(Footer::new(manifest_offset).as_bytes())
            .map_err(wrap_io_err!("Writing footer"))?;
        writer.flush().map_err(wrap_io_err!("Flushing archive"))?;

        Ok(manifest_offset + manifest_size(entries.len() as u64)? + FOOTER_SIZE as u64)
    }
}

impl fmt::Debug for ArchiveBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ArchiveBuilder")
            .field("stub_len", &self.stub.len())
            .field("config", &self.config)
            .field("entries", &self.entries)
            .finish()
    }
}

/// Stream one entry into the archive, applying the unreadable-input policy
/// to read failures. Returns the number of bytes that ended up in the
/// archive.
fn copy_entry<R: Read, W: Write>(
    source: R,
    source_path: &Path,
    writer: &mut W,
    buf: &mut [u8],
    on_unreadable: OnUnreadable,
) -> Result<u64, Error> {
    match copy_buffered(source, writer, buf) {
        Ok(size) => Ok(size),
        Err(CopyError::Read { copied, source }) => match on_unreadable {
            OnUnreadable::Skip => {
                warn!(
                    "Could not read file {} after {} bytes: {}",
                    source_path.display(),
                    copied,
                    source
                );
                Ok(copied)
            }
            OnUnreadable::Abort => Err(Error::UnreadableInputFile {
                path: source_path.to_path_buf(),
                source,
            }),
        },
        Err(CopyError::Write(source)) => Err(Error::Io {
            source,
            path: None,
            context: "Writing archive",
        }),
    }
}

/// Read the loader stub from `path`, failing with
/// [`Error::MissingLoaderStub`] if it cannot be read or is empty.
pub fn read_loader_stub(path: impl AsRef<Path>) -> Result<Vec<u8>, Error> {
    let stub = fs::read(path.as_ref()).map_err(|source| Error::MissingLoaderStub {
        source: Some(source),
    })?;
    if stub.is_empty() {
        return Err(Error::MissingLoaderStub { source: None });
    }
    Ok(stub)
}

/// Pack `pack_dir` and `main_executable` behind `loader_stub` into a new
/// file at `output`, with the default [`BuildConfig`].
pub fn build(
    pack_dir: impl AsRef<Path>,
    main_executable: impl AsRef<Path>,
    loader_stub: impl Into<Vec<u8>>,
    output: impl AsRef<Path>,
) -> Result<u64, Error> {
    build_with_config(
        pack_dir,
        main_executable,
        loader_stub,
        output,
        &BuildConfig::default(),
    )
}

pub fn build_with_config(
    pack_dir: impl AsRef<Path>,
    main_executable: impl AsRef<Path>,
    loader_stub: impl Into<Vec<u8>>,
    output: impl AsRef<Path>,
    config: &BuildConfig,
) -> Result<u64, Error> {
    let loader_stub = loader_stub.into();
    if loader_stub.is_empty() {
        return Err(Error::MissingLoaderStub { source: None });
    }

    let main_executable = main_executable.as_ref();
    if let Err(source) = fs::metadata(main_executable) {
        return Err(Error::UnreadableInputFile {
            path: main_executable.to_path_buf(),
            source,
        });
    }

    let output = output.as_ref();
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o755);
    let output_file = options
        .open(output)
        .map_err(|source| Error::UnreadableOutputPath {
            path: output.to_path_buf(),
            source,
        })?;

    let mut builder = ArchiveBuilder::with_config(loader_stub, config.clone());
    builder.exclude(output);
    let result = write_output(builder, pack_dir.as_ref(), main_executable, output_file);

    if result.is_err() {
        if let Err(err) = fs::remove_file(output) {
            warn!("Could not remove partial output {}: {}", output.display(), err);
        }
    }
    result
}

fn write_output(
    mut builder: ArchiveBuilder,
    pack_dir: &Path,
    main_executable: &Path,
    output_file: File,
) -> Result<u64, Error> {
    builder.dir(pack_dir)?.executable(main_executable)?;
    let mut writer = BufWriter::new(output_file);
    builder.write_archive(&mut writer)
}
