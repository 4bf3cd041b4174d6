use crate::error::Error;
use crate::error::Result;
use std::ffi::CStr;
use std::fmt;
use std::fs;
use std::mem;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::ptr;
use tracing;

/// Snapshot of the attributes of a single path, taken with a following
/// metadata query (the same as `stat(2)`).
#[derive(Debug)]
pub(crate) struct FileMetadata {
    pub ino: u64,
    pub mode: u32,
    pub nlink: u64,
    pub owner: Owner,
    pub group: Owner,
    pub size: u64,
    pub mtime: i64,
}

impl FileMetadata {
    pub(crate) fn query(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|err| Error::Stat {
            path: path.to_owned(),
            err,
        })?;
        tracing::trace!(?path, ino = meta.ino(), mode = meta.mode(), size = meta.size());
        Ok(FileMetadata {
            ino: meta.ino(),
            mode: meta.mode(),
            nlink: meta.nlink(),
            owner: Owner::user(meta.uid()),
            group: Owner::group(meta.gid()),
            size: meta.size(),
            mtime: meta.mtime(),
        })
    }
}

/// Owning user or group of a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Owner {
    Name(String),
    Id(u32),
}

impl Owner {
    pub(crate) fn user(uid: u32) -> Self {
        match user_name(uid) {
            Some(name) => Owner::Name(name),
            None => Owner::Id(uid),
        }
    }

    pub(crate) fn group(gid: u32) -> Self {
        match group_name(gid) {
            Some(name) => Owner::Name(name),
            None => Owner::Id(gid),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Name(name) => f.write_str(name),
            Owner::Id(id) => write!(f, "{}", id),
        }
    }
}

const INITIAL_BUF_LEN: usize = 1024;
const MAX_BUF_LEN: usize = 1 << 20;

fn user_name(uid: u32) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; INITIAL_BUF_LEN];
    loop {
        let mut pwd: libc::passwd = unsafe { mem::zeroed() };
        let mut result: *mut libc::passwd = ptr::null_mut();
        let rc = unsafe {
            libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUF_LEN {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            tracing::trace!(uid, rc, "user name not resolvable");
            return None;
        }
        // pw_name points into `buf`, which is alive here.
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}

fn group_name(gid: u32) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; INITIAL_BUF_LEN];
    loop {
        let mut grp: libc::group = unsafe { mem::zeroed() };
        let mut result: *mut libc::group = ptr::null_mut();
        let rc = unsafe {
            libc::getgrgid_r(gid, &mut grp, buf.as_mut_ptr(), buf.len(), &mut result)
        };
        if rc == libc::ERANGE && buf.len() < MAX_BUF_LEN {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            tracing::trace!(gid, rc, "group name not resolvable");
            return None;
        }
        let name = unsafe { CStr::from_ptr(grp.gr_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}
