//! Tar round-trip for whole trees, with gzip autodetected by extension.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};

use fsdiff_common::{normalize, FsdiffError, Result};

use crate::tree::{Entry, FileOptions, Folder, SYMLINK_MODE};

/// Reads a tar stream into a tree. Directories, regular files, and symlinks
/// are honored; hardlink entries are an error; other kinds are skipped.
pub fn read_tar<R: Read>(reader: R) -> Result<Folder> {
    let mut archive = tar::Archive::new(reader);
    let mut root = Folder::new();

    for entry in archive.entries().map_err(wrap)? {
        let mut entry = entry.map_err(wrap)?;
        let raw_path = entry.path().map_err(wrap)?.into_owned();
        let name = raw_path.to_string_lossy().replace('\\', "/");
        let components: Vec<&str> = name
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .collect();
        if components.is_empty() {
            continue;
        }
        let (dirs, base) = components.split_at(components.len() - 1);
        let base = base[0];
        let parent = root.make_dirs(&dirs.join("/"));

        let header = entry.header();
        let mode = header.mode().map_err(wrap)? & 0o7777;
        match header.entry_type() {
            EntryType::Directory => {
                let folder = parent.folder(base);
                if mode != 0 {
                    folder.set_mode(mode);
                }
            }
            EntryType::Symlink => {
                let target = entry
                    .link_name()
                    .map_err(wrap)?
                    .ok_or_else(|| FsdiffError::Archive(format!("symlink {} has no target", name)))?;
                parent.symlink(base, &target.to_string_lossy());
            }
            EntryType::Regular | EntryType::Continuous => {
                let size = header.size().map_err(wrap)?;
                let mtime = header.mtime().map_err(wrap)?;
                let mut content = Vec::with_capacity(size as usize);
                entry.read_to_end(&mut content).map_err(wrap)?;
                parent.file_with(
                    base,
                    FileOptions {
                        content: Some(content),
                        mode: Some(mode),
                        mtime: Some(UNIX_EPOCH + Duration::from_secs(mtime)),
                        size: Some(size),
                    },
                );
            }
            EntryType::Link => {
                return Err(FsdiffError::UnsupportedEntry {
                    path: name,
                    detail: "hard links are not supported in tar archives".to_string(),
                });
            }
            // fifo, char, block, and friends
            _ => continue,
        }
    }
    Ok(root)
}

/// Opens a `.tar`, `.tar.gz`, or `.tgz` file and reads it into a tree.
pub fn read_tar_file(path: &Path) -> Result<Folder> {
    let file = fs::File::open(path)?;
    if is_gzip_tar(path) {
        read_tar(GzDecoder::new(file))
    } else {
        read_tar(file)
    }
}

/// Writes the tree into a tar stream, preserving directory modes, file
/// sizes and mtimes, and symlink targets.
pub fn write_tar<W: Write>(folder: &Folder, writer: W) -> Result<()> {
    let mut builder = Builder::new(writer);
    append_folder(&mut builder, folder, "")?;
    builder.finish().map_err(wrap)?;
    Ok(())
}

/// Writes a `.tar` or `.tar.gz`/`.tgz` file depending on the extension.
pub fn write_tar_file(folder: &Folder, path: &Path) -> Result<()> {
    let file = fs::File::create(path)?;
    if is_gzip_tar(path) {
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);
        append_folder(&mut builder, folder, "")?;
        let encoder = builder.into_inner().map_err(wrap)?;
        encoder.finish().map_err(wrap)?;
    } else {
        write_tar(folder, file)?;
    }
    Ok(())
}

fn append_folder<W: Write>(builder: &mut Builder<W>, folder: &Folder, prefix: &str) -> Result<()> {
    if !prefix.is_empty() {
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Directory);
        header.set_mode(folder.mode());
        header.set_size(0);
        builder
            .append_data(&mut header, format!("{}/", prefix), std::io::empty())
            .map_err(wrap)?;
    }
    for name in folder.sorted_names() {
        let full = normalize(prefix, &name);
        match folder.get(&name) {
            Entry::Folder(sub) => append_folder(builder, sub, &full)?,
            Entry::File(file) => {
                let mut header = Header::new_ustar();
                header.set_entry_type(EntryType::Regular);
                header.set_mode(file.mode());
                header.set_size(file.content().len() as u64);
                header.set_mtime(mtime_secs(file.mtime()));
                builder
                    .append_data(&mut header, &full, file.content())
                    .map_err(wrap)?;
            }
            Entry::Symlink(link) => {
                let mut header = Header::new_ustar();
                header.set_entry_type(EntryType::Symlink);
                header.set_mode(SYMLINK_MODE);
                header.set_size(0);
                builder
                    .append_link(&mut header, &full, link.target())
                    .map_err(wrap)?;
            }
        }
    }
    Ok(())
}

fn mtime_secs(mtime: Option<SystemTime>) -> u64 {
    mtime
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

fn is_gzip_tar(path: &Path) -> bool {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().to_lowercase(),
        None => return false,
    };
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

fn wrap(err: std::io::Error) -> FsdiffError {
    FsdiffError::Archive(err.to_string())
}
