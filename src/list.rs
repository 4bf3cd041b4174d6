use crate::error::Error;
use crate::error::Result;
use crate::format::format_entry;
use std::ffi::CStr;
use std::ffi::CString;
use std::ffi::OsStr;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::ffi::OsStringExt;
use std::path::Path;
use std::path::PathBuf;
use std::ptr::NonNull;
use tracing;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ListOptions {
    pub show_details: bool,
    pub recursive: bool,
    pub show_hidden: bool,
    pub show_inode: bool,
    pub human_readable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryKind {
    File,
    Directory,
    Other,
}

#[derive(Debug)]
pub(crate) struct DirectoryEntry {
    pub name: OsString,
    pub path: PathBuf,
    pub kind: EntryKind,
}

impl DirectoryEntry {
    fn is_hidden(&self) -> bool {
        self.name.as_bytes().first() == Some(&b'.')
    }

    fn is_self_or_parent(&self) -> bool {
        let name = self.name.as_bytes();
        name == b"." || name == b".."
    }
}

/// Joins as `parent + "/" + name`, without normalizing a trailing slash of
/// the parent.
fn child_path(parent: &Path, name: &OsStr) -> PathBuf {
    let mut bytes = parent.as_os_str().as_bytes().to_vec();
    bytes.push(b'/');
    bytes.extend_from_slice(name.as_bytes());
    PathBuf::from(OsString::from_vec(bytes))
}

// ==== DirStream ====

/// Open directory handle. Entries are yielded in the order the OS returns
/// them, including `.` and `..`. The handle is closed on drop.
pub(crate) struct DirStream {
    dir: NonNull<libc::DIR>,
    path: PathBuf,
}

impl DirStream {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let open_error = |err| Error::Open {
            path: path.to_owned(),
            err,
        };
        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|err| open_error(io::Error::new(io::ErrorKind::InvalidInput, err)))?;
        let dir = unsafe { libc::opendir(cpath.as_ptr()) };
        match NonNull::new(dir) {
            Some(dir) => {
                tracing::debug!(?path, "opendir");
                Ok(DirStream {
                    dir,
                    path: path.to_owned(),
                })
            }
            None => Err(open_error(io::Error::last_os_error())),
        }
    }

    fn entry_kind(d_type: u8, path: &Path) -> EntryKind {
        match d_type {
            libc::DT_DIR => EntryKind::Directory,
            libc::DT_REG => EntryKind::File,
            libc::DT_UNKNOWN => match fs::symlink_metadata(path) {
                Ok(meta) if meta.is_dir() => EntryKind::Directory,
                Ok(meta) if meta.is_file() => EntryKind::File,
                _ => EntryKind::Other,
            },
            _ => EntryKind::Other,
        }
    }
}

impl Iterator for DirStream {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let ent = unsafe { libc::readdir(self.dir.as_ptr()) };
        if ent.is_null() {
            return None;
        }
        // The entry stays valid until the next readdir/closedir on this
        // stream, so copy everything out now.
        let (name, d_type) = unsafe {
            let ent = &*ent;
            let name = CStr::from_ptr(ent.d_name.as_ptr());
            (OsStr::from_bytes(name.to_bytes()).to_owned(), ent.d_type)
        };
        let path = child_path(&self.path, &name);
        let kind = Self::entry_kind(d_type, &path);
        tracing::trace!(?name, ?kind, "readdir");
        Some(DirectoryEntry { name, path, kind })
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        tracing::debug!(path = ?self.path, "closedir");
        unsafe {
            libc::closedir(self.dir.as_ptr());
        }
    }
}

// ==== Lister ====

/// Writes listings to `out` and per-entry diagnostics to `err`.
pub(crate) struct Lister<W, E> {
    options: ListOptions,
    out: W,
    err: E,
}

impl<W: Write, E: Write> Lister<W, E> {
    pub(crate) fn new(options: ListOptions, out: W, err: E) -> Self {
        Lister { options, out, err }
    }

    /// Lists `root`. Fails only when `root` itself cannot be opened or the
    /// output cannot be written.
    pub(crate) fn run(&mut self, root: &Path) -> Result<()> {
        if self.options.recursive {
            self.list_recursive(root)?;
        } else {
            self.list_directory(root)?;
        }
        self.out.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> (W, E) {
        (self.out, self.err)
    }

    fn visible(&self, entry: &DirectoryEntry) -> bool {
        self.options.show_hidden || !entry.is_hidden()
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn list_directory(&mut self, dir: &Path) -> Result<()> {
        let stream = DirStream::open(dir)?;
        for entry in stream {
            if !self.visible(&entry) {
                continue;
            }
            if self.options.show_details {
                self.print_details(&entry)?;
            } else {
                self.out.write_all(entry.name.as_bytes())?;
                self.out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn list_recursive(&mut self, dir: &Path) -> Result<()> {
        let stream = DirStream::open(dir)?;
        self.out.write_all(dir.as_os_str().as_bytes())?;
        self.out.write_all(b":\n")?;
        for entry in stream {
            if !self.visible(&entry) {
                continue;
            }
            self.print_details(&entry)?;
            if entry.kind == EntryKind::Directory && !entry.is_self_or_parent() {
                match self.list_recursive(&entry.path) {
                    Err(err @ Error::Open { .. }) => self.report(&err)?,
                    result => result?,
                }
            }
        }
        Ok(())
    }

    fn print_details(&mut self, entry: &DirectoryEntry) -> Result<()> {
        match format_entry(&entry.path, self.options, Some(&entry.name)) {
            Ok(row) => {
                self.out.write_all(&row)?;
                self.out.write_all(b"\n")?;
            }
            Err(err @ Error::Stat { .. }) => self.report(&err)?,
            Err(err) => return Err(err),
        }
        Ok(())
    }

    fn report(&mut self, err: &Error) -> Result<()> {
        tracing::debug!(%err, "skipped");
        // keep stdout ahead of the diagnostic when both go to a terminal
        self.out.flush()?;
        writeln!(self.err, "{}", err)?;
        Ok(())
    }
}
