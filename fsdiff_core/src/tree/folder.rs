use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fsdiff_common::{normalize, should_exclude, FsdiffError, Result};

use super::{Checksum, EnsureOptions, Entry, File, FileOptions, Symlink, DEFAULT_FOLDER_MODE};
use crate::hash;
use crate::operation::Operation;

/// A directory. Owns its children exclusively; names are unique and iterate
/// in lexicographic order.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    entries: BTreeMap<String, Entry>,
    mode: u32,
    source_path: Option<PathBuf>,
    checksum: Option<Checksum>,
    exclude_globs: Vec<String>,
}

impl Folder {
    pub fn new() -> Self {
        Folder {
            entries: BTreeMap::new(),
            mode: DEFAULT_FOLDER_MODE,
            source_path: None,
            checksum: None,
            exclude_globs: Vec::new(),
        }
    }

    /// Builds a tree from `path -> content` pairs, creating intermediate
    /// folders as needed.
    pub fn from_strings(files: &[(&str, &str)]) -> Self {
        let mut root = Folder::new();
        for (path, content) in files {
            root.set(path, content);
        }
        root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn set_mode(&mut self, mode: u32) {
        self.mode = mode;
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn set_source_path(&mut self, path: &Path) {
        self.source_path = Some(path.to_path_buf());
    }

    pub fn exclude_globs(&self) -> &[String] {
        &self.exclude_globs
    }

    pub fn set_exclude_globs(&mut self, globs: &[String]) {
        self.exclude_globs = globs.to_vec();
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }

    pub fn set_checksum(&mut self, algorithm: &str, digest: Vec<u8>) {
        self.checksum = Some(Checksum {
            algorithm: algorithm.to_string(),
            digest,
        });
    }

    pub fn clear_checksum(&mut self) {
        self.checksum = None;
    }

    // Builders

    pub fn put(&mut self, name: &str, entry: Entry) {
        self.entries.insert(name.to_string(), entry);
    }

    /// Adds a file with string content under `name`.
    pub fn file(&mut self, name: &str, content: &str) -> &mut File {
        self.file_with(
            name,
            FileOptions {
                content: Some(content.as_bytes().to_vec()),
                ..FileOptions::default()
            },
        )
    }

    pub fn file_with(&mut self, name: &str, options: FileOptions) -> &mut File {
        self.entries
            .insert(name.to_string(), Entry::File(File::new(options)));
        match self.entries.get_mut(name) {
            Some(Entry::File(file)) => file,
            _ => unreachable!(),
        }
    }

    /// Adds (or reuses) a child folder under `name`.
    pub fn folder(&mut self, name: &str) -> &mut Folder {
        if !matches!(self.entries.get(name), Some(Entry::Folder(_))) {
            self.entries
                .insert(name.to_string(), Entry::Folder(Folder::new()));
        }
        match self.entries.get_mut(name) {
            Some(Entry::Folder(folder)) => folder,
            _ => unreachable!(),
        }
    }

    pub fn symlink(&mut self, name: &str, target: &str) {
        self.entries
            .insert(name.to_string(), Entry::Symlink(Symlink::new(target)));
    }

    // Accessors

    /// Child names in lexicographic order.
    pub fn sorted_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Panics when the name is absent; internal callers look names up from
    /// the folder's own listing.
    pub fn get(&self, name: &str) -> &Entry {
        match self.entries.get(name) {
            Some(entry) => entry,
            None => panic!("entry {:?} not found in {:?}", name, self.sorted_names()),
        }
    }

    pub fn try_get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    pub fn try_get_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        if self.entries.remove(name).is_some() {
            Ok(())
        } else {
            Err(FsdiffError::Path(format!(
                "remove: {:?} not found in {:?}",
                name,
                self.sorted_names()
            )))
        }
    }

    // Nested-path helpers

    /// Ensures the nested folder path exists (e.g. "a/b/c") and returns it.
    /// Non-folder entries in the way are replaced.
    pub fn make_dirs(&mut self, path: &str) -> &mut Folder {
        let mut current = self;
        for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
            current = current.folder(part);
        }
        current
    }

    /// Creates or replaces a file at a nested relative path.
    pub fn set(&mut self, path: &str, content: &str) -> &mut File {
        let (dir, base) = split_path(path);
        self.make_dirs(dir).file(base, content)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    pub fn get_path(&self, path: &str) -> Option<&Entry> {
        let mut parts = path
            .split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .peekable();
        let mut current = self;
        while let Some(part) = parts.next() {
            let entry = current.entries.get(part)?;
            if parts.peek().is_none() {
                return Some(entry);
            }
            current = entry.as_folder()?;
        }
        None
    }

    pub fn remove_path(&mut self, path: &str) -> Result<()> {
        let (dir, base) = split_path(path);
        let parent = self
            .navigate_mut(dir)
            .ok_or_else(|| FsdiffError::Path(format!("remove: parent of {:?} not found", path)))?;
        parent.remove(base)
    }

    /// Renames or relocates an entry within this tree.
    pub fn move_entry(&mut self, src: &str, dst: &str) -> Result<()> {
        let (src_dir, src_base) = split_path(src);
        let entry = {
            let parent = self.navigate_mut(src_dir).ok_or_else(|| {
                FsdiffError::Path(format!("move: source parent of {:?} not found", src))
            })?;
            parent
                .entries
                .remove(src_base)
                .ok_or_else(|| FsdiffError::Path(format!("move: source {:?} not found", src)))?
        };
        let (dst_dir, dst_base) = split_path(dst);
        self.make_dirs(dst_dir)
            .entries
            .insert(dst_base.to_string(), entry);
        Ok(())
    }

    fn navigate_mut(&mut self, path: &str) -> Option<&mut Folder> {
        let mut current = self;
        for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
            current = match current.entries.get_mut(part) {
                Some(Entry::Folder(folder)) => folder,
                _ => return None,
            };
        }
        Some(current)
    }

    // Listings

    /// Relative paths of all files and links, depth first.
    pub fn file_paths(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (name, entry) in &self.entries {
            let full = normalize(prefix, name);
            match entry {
                Entry::Folder(folder) => out.extend(folder.file_paths(&full)),
                _ => out.push(full),
            }
        }
        out
    }

    /// Relative paths of everything, folders marked with a trailing slash.
    pub fn paths(&self, prefix: &str) -> Vec<String> {
        let mut out = Vec::new();
        if !prefix.is_empty() {
            out.push(format!("{}/", prefix));
        }
        for (name, entry) in &self.entries {
            let full = normalize(prefix, name);
            match entry {
                Entry::Folder(folder) => out.extend(folder.paths(&full)),
                Entry::Symlink(link) => out.push(format!("{} -> {}", full, link.target())),
                Entry::File(_) => out.push(full),
            }
        }
        out
    }

    // Operations

    pub fn create_operation(&self, relative_path: &str) -> Operation {
        let operations = self
            .entries
            .iter()
            .map(|(name, entry)| entry.create_operation(name))
            .collect();
        Operation::create_dir(relative_path, operations)
    }

    pub fn remove_operation(&self, relative_path: &str) -> Operation {
        let operations = self
            .entries
            .iter()
            .map(|(name, entry)| entry.remove_operation(name))
            .collect();
        Operation::remove_dir(relative_path, operations)
    }

    // Checksums

    /// Folder variant of checksum ensure; computes from children per the
    /// folder commitment when missing.
    pub fn ensure_checksum(&mut self, opts: &EnsureOptions<'_>) -> Option<Checksum> {
        if let Some(checksum) = &self.checksum {
            if opts.persist {
                if let (Some(store), Some(path)) = (opts.store, &self.source_path) {
                    store.save(path, &checksum.digest);
                }
            }
            return Some(checksum.clone());
        }
        if !opts.compute_if_missing || opts.algorithm.is_empty() {
            return None;
        }
        let digest = folder_checksum(self, &opts.algorithm)?;
        if opts.persist {
            if let (Some(store), Some(path)) = (opts.store, &self.source_path) {
                store.save(path, &digest);
            }
        }
        self.set_checksum(&opts.algorithm, digest);
        self.checksum.clone()
    }

    pub fn write_to(&self, location: &Path) -> Result<()> {
        match make_dir(location, self.mode) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err.into()),
        }
        for (name, entry) in &self.entries {
            entry.write_to(&location.join(name))?;
        }
        Ok(())
    }
}

impl Default for Folder {
    fn default() -> Self {
        Folder::new()
    }
}

#[cfg(unix)]
fn make_dir(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().mode(mode).create(path)
}

#[cfg(not(unix))]
fn make_dir(path: &Path, _mode: u32) -> std::io::Result<()> {
    std::fs::create_dir(path)
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Computes the folder commitment: mode plus, for each non-excluded child in
/// sorted order, its kind, name, algorithm and digest (target for links).
pub fn folder_checksum(folder: &Folder, algorithm: &str) -> Option<Vec<u8>> {
    let mut commitment = Vec::new();
    commitment.extend_from_slice(format!("dir|mode:{:o}\n", folder.mode()).as_bytes());
    for name in folder.sorted_names() {
        if should_exclude(&normalize("", &name), folder.exclude_globs()) {
            continue;
        }
        let line = match folder.get(&name) {
            Entry::File(file) => {
                let (label, digest) = match file.checksum() {
                    Some(checksum) => (checksum.algorithm.clone(), checksum.digest.clone()),
                    None => {
                        let digest = hash::compute_from_path_or_bytes(
                            algorithm,
                            file.source_path(),
                            file.content(),
                        )?;
                        (algorithm.to_string(), digest)
                    }
                };
                format!("file|{}|algo:{}|{}\n", name, label, hex::encode(digest))
            }
            Entry::Folder(sub) => {
                let (label, digest) = match sub.checksum() {
                    Some(checksum) => (checksum.algorithm.clone(), checksum.digest.clone()),
                    None => (algorithm.to_string(), folder_checksum(sub, algorithm)?),
                };
                format!("dir|{}|algo:{}|{}\n", name, label, hex::encode(digest))
            }
            Entry::Symlink(link) => format!("link|{}|{}\n", name, link.target()),
        };
        commitment.extend_from_slice(line.as_bytes());
    }
    hash::compute(algorithm, &commitment)
}
