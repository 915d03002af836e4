//! File Listing
//!
//! Filters, orders and pages the file records of one directory. A name
//! containing `%` is matched as a LIKE pattern (`%` any run, `_` one
//! character), anything else must match exactly. A type is either a
//! `.`-prefixed extension or a content type; each also matches records whose
//! other half maps to it through `MIME_TYPES`.

use crate::store::FileRecord;
use std::cmp::Ordering;

/// Extension to content type, as recorded on upload
pub const MIME_TYPES: &[(&str, &str)] = &[
    ("3g2", "video/3gpp2"),
    ("3gp", "video/3gpp"),
    ("7z", "application/x-7z-compressed"),
    ("aac", "audio/aac"),
    ("avi", "video/x-msvideo"),
    ("avif", "image/avif"),
    ("bin", "application/octet-stream"),
    ("bmp", "image/bmp"),
    ("bz2", "application/x-bzip2"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("epub", "application/epub+zip"),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ics", "text/calendar"),
    ("jar", "application/java-archive"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("mjs", "text/javascript"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("oga", "audio/ogg"),
    ("ogv", "video/ogg"),
    ("opus", "audio/opus"),
    ("otf", "font/otf"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("rar", "application/vnd.rar"),
    ("rtf", "application/rtf"),
    ("sh", "application/x-sh"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("ttf", "font/ttf"),
    ("txt", "text/plain"),
    ("wav", "audio/wav"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("xml", "application/xml"),
    ("zip", "application/zip"),
];

/// Content type registered for `extension` (without the dot)
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// Column a listing is ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortColumn {
    #[default]
    Name,
    CreatedAt,
    DeletedAt,
    FileSize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filters and paging for `NamespaceCoordinator::list_directory`
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    pub name: Option<String>,
    pub file_type: Option<String>,
    /// Only public records
    pub public_only: bool,
    /// `Some(true)` keeps encrypted records, `Some(false)` plain ones
    pub encrypted: Option<bool>,
    /// List soft-deleted records instead of live ones
    pub trash: bool,
    pub order_by: SortColumn,
    pub order: SortOrder,
    pub limit: Option<usize>,
    /// 1-based page of `limit` records; ignored without a limit
    pub page: Option<usize>,
}

impl FileQuery {
    pub fn matches(&self, record: &FileRecord) -> bool {
        if record.is_live() == self.trash {
            return false;
        }
        if self.public_only && !record.is_public {
            return false;
        }
        if let Some(encrypted) = self.encrypted {
            if record.is_encrypted != encrypted {
                return false;
            }
        }
        if let Some(name) = &self.name {
            let matched = if name.contains('%') {
                like(name, &record.name)
            } else {
                *name == record.name
            };
            if !matched {
                return false;
            }
        }
        match &self.file_type {
            Some(file_type) => type_matches(file_type, record),
            None => true,
        }
    }

    /// Filter, order and page `records`
    pub fn apply(&self, records: Vec<FileRecord>) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();
        records.sort_by(|a, b| {
            let ordering = self.compare(a, b).then_with(|| a.name.cmp(&b.name));
            match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let Some(limit) = self.limit else {
            return records;
        };
        let page = self.page.unwrap_or(1).max(1);
        records
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect()
    }

    fn compare(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        match self.order_by {
            SortColumn::Name => a.name.cmp(&b.name),
            SortColumn::CreatedAt => a.created_at.cmp(&b.created_at),
            SortColumn::DeletedAt => a.deleted_at.cmp(&b.deleted_at),
            SortColumn::FileSize => a.file_size.cmp(&b.file_size),
        }
    }
}

fn has_extension(name: &str, extension: &str) -> bool {
    name.rsplit_once('.')
        .map_or(false, |(_, ext)| ext.eq_ignore_ascii_case(extension))
}

fn type_matches(file_type: &str, record: &FileRecord) -> bool {
    let recorded = record.file_type.as_deref();
    if let Some(extension) = file_type.strip_prefix('.') {
        return has_extension(&record.name, extension)
            || (recorded.is_some() && recorded == mime_for_extension(extension));
    }
    if recorded == Some(file_type) {
        return true;
    }
    MIME_TYPES
        .iter()
        .filter(|(_, mime)| *mime == file_type)
        .any(|(ext, _)| has_extension(&record.name, ext))
}

/// SQL LIKE matching: `%` matches any run of characters, `_` exactly one
fn like(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    // position of the last `%` and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('_') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, seen)) => {
                    p = star + 1;
                    t = seen + 1;
                    backtrack = Some((star, seen + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}
