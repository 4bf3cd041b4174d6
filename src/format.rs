use crate::error::Result;
use crate::list::ListOptions;
use crate::meta::FileMetadata;
use bitflags::bitflags;
use chrono::DateTime;
use chrono::Local;
use chrono::TimeZone;
use std::ffi::OsStr;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

bitflags! {
    pub(crate) struct Mode: u32 {
        const USR_READ = 0o400;
        const USR_WRITE = 0o200;
        const USR_EXEC = 0o100;
        const GRP_READ = 0o040;
        const GRP_WRITE = 0o020;
        const GRP_EXEC = 0o010;
        const OTH_READ = 0o004;
        const OTH_WRITE = 0o002;
        const OTH_EXEC = 0o001;
    }
}

const PERMISSION_CHARS: [(Mode, char); 9] = [
    (Mode::USR_READ, 'r'),
    (Mode::USR_WRITE, 'w'),
    (Mode::USR_EXEC, 'x'),
    (Mode::GRP_READ, 'r'),
    (Mode::GRP_WRITE, 'w'),
    (Mode::GRP_EXEC, 'x'),
    (Mode::OTH_READ, 'r'),
    (Mode::OTH_WRITE, 'w'),
    (Mode::OTH_EXEC, 'x'),
];

const SIZE_UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];

const TIME_FORMAT: &str = "%b %d %H:%M";

/// Renders `mode` as the ten character `drwxr-xr-x` form.
///
/// Only the directory flag and the nine rwx bits are considered; setuid,
/// setgid, sticky and the other file types are shown as a plain `-`.
pub(crate) fn format_permissions(mode: u32) -> String {
    let mut s = String::with_capacity(10);
    s.push(if mode & S_IFMT == S_IFDIR { 'd' } else { '-' });
    let bits = Mode::from_bits_truncate(mode);
    for (flag, ch) in PERMISSION_CHARS.iter() {
        s.push(if bits.contains(*flag) { *ch } else { '-' });
    }
    s
}

pub(crate) fn format_size(size: u64, human_readable: bool) -> String {
    if !human_readable {
        return size.to_string();
    }
    let mut value = size as f64;
    let mut unit = 0;
    while value > 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, SIZE_UNITS[unit])
}

/// Formats a modification time (seconds since the epoch) in the local time
/// zone.
pub(crate) fn format_time(mtime: i64) -> String {
    match DateTime::from_timestamp(mtime, 0) {
        Some(utc) => format_timestamp(&utc.with_timezone(&Local)),
        None => mtime.to_string(),
    }
}

fn format_timestamp<Tz>(time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    time.format(TIME_FORMAT).to_string()
}

/// Builds the tab separated detail row for `path`.
///
/// `name` is printed in the last column when given, otherwise the full path
/// is used. The name is copied byte for byte, so the row is not necessarily
/// UTF-8.
pub(crate) fn format_entry(
    path: &Path,
    options: ListOptions,
    name: Option<&OsStr>,
) -> Result<Vec<u8>> {
    let meta = FileMetadata::query(path)?;

    let mut row = String::new();
    if options.show_inode {
        row.push_str(&meta.ino.to_string());
        row.push('\t');
    }
    row.push_str(&format_permissions(meta.mode));
    row.push('\t');
    row.push_str(&meta.nlink.to_string());
    row.push('\t');
    row.push_str(&meta.owner.to_string());
    row.push('\t');
    row.push_str(&meta.group.to_string());
    row.push('\t');
    row.push_str(&format_size(meta.size, options.human_readable));
    row.push('\t');
    row.push_str(&format_time(meta.mtime));
    row.push('\t');

    let mut row = row.into_bytes();
    let name = name.unwrap_or_else(|| path.as_os_str());
    row.extend_from_slice(name.as_bytes());
    Ok(row)
}
