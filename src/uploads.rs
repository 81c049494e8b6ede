use thiserror::Error;
use time::OffsetDateTime;

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub(crate) const UPLOADS_DIR: &str = "uploads";
pub(crate) const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileKind {
    Png,
    Jpeg,
    Gif,
    Webp,
    Pdf,
}

/// Which kinds an upload slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Accept {
    Images,
    Documents,
}

impl Accept {
    fn allows(self, kind: FileKind) -> bool {
        match self {
            Accept::Images => kind != FileKind::Pdf,
            Accept::Documents => true,
        }
    }
}

impl FileKind {
    fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/png" => Some(Self::Png),
            "image/jpeg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Pdf => "pdf",
        }
    }

    pub(crate) fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Pdf => "application/pdf",
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid upload path")]
    BadPath,
    #[error("upload not found")]
    NotFound,
    #[error("upload body was empty")]
    EmptyBody,
    #[error("upload is too large")]
    TooLarge,
    #[error("unsupported file type")]
    UnsupportedType,
    #[error("upload io: {0}")]
    Io(#[from] std::io::Error),
}

pub(crate) struct StoredUpload {
    pub(crate) rel_path: String,
    pub(crate) kind: FileKind,
}

impl StoredUpload {
    pub(crate) fn url(&self) -> String {
        format!("/files/{}", self.rel_path)
    }
}

pub(crate) fn store_upload(
    root: &Path,
    bytes: &[u8],
    content_type: Option<&str>,
    filename: Option<&str>,
    accept: Accept,
) -> Result<StoredUpload, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::EmptyBody);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge);
    }

    let kind = detect_file_kind(content_type, filename, bytes)?;
    if !accept.allows(kind) {
        return Err(UploadError::UnsupportedType);
    }
    std::fs::create_dir_all(root).map_err(UploadError::Io)?;
    let now = OffsetDateTime::now_utc();
    let year = now.year();
    let month = u8::from(now.month());
    let day = now.day();
    let hour = now.hour();
    let minute = now.minute();
    let second = now.second();

    let base = sanitize_base_name(filename);
    let dir = format!("{:04}/{:02}", year, month);

    for _ in 0..10 {
        let suffix = random_suffix();
        let file_name = format!(
            "{}-{:04}{:02}{:02}-{:02}{:02}{:02}-{}.{}",
            base,
            year,
            month,
            day,
            hour,
            minute,
            second,
            suffix,
            kind.extension()
        );
        let rel_path = format!("{dir}/{file_name}");
        let rel_path_buf = Path::new(&rel_path);
        ensure_parent_dirs(root, rel_path_buf)?;
        let target = root.join(rel_path_buf);
        if target.exists() {
            continue;
        }
        atomic_write(&target, bytes).map_err(UploadError::Io)?;
        return Ok(StoredUpload { rel_path, kind });
    }

    Err(UploadError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate upload name",
    )))
}

pub(crate) fn remove_upload(root: &Path, rel_path: &str) -> Result<(), UploadError> {
    let resolved = resolve_file_path(root, rel_path)?;
    std::fs::remove_file(&resolved).map_err(|err| match err.kind() {
        ErrorKind::NotFound => UploadError::NotFound,
        _ => UploadError::Io(err),
    })
}

pub(crate) fn resolve_file_path(root: &Path, rel_path: &str) -> Result<PathBuf, UploadError> {
    let safe_path = relative_path_to_path(rel_path).ok_or(UploadError::BadPath)?;
    let root = std::fs::canonicalize(root).map_err(|err| match err.kind() {
        ErrorKind::NotFound => UploadError::NotFound,
        _ => UploadError::Io(err),
    })?;
    let mut current = root.clone();

    for component in safe_path.components() {
        let component = match component {
            Component::Normal(component) => component,
            _ => return Err(UploadError::BadPath),
        };
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(metadata) => {
                if metadata.file_type().is_symlink() {
                    return Err(UploadError::BadPath);
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(UploadError::NotFound),
            Err(err) => return Err(UploadError::Io(err)),
        }
    }

    let resolved = std::fs::canonicalize(&current).map_err(|err| match err.kind() {
        ErrorKind::NotFound => UploadError::NotFound,
        _ => UploadError::Io(err),
    })?;
    if !resolved.starts_with(&root) {
        return Err(UploadError::BadPath);
    }
    let metadata = std::fs::metadata(&resolved).map_err(|err| match err.kind() {
        ErrorKind::NotFound => UploadError::NotFound,
        _ => UploadError::Io(err),
    })?;
    if !metadata.is_file() {
        return Err(UploadError::NotFound);
    }
    Ok(resolved)
}

pub(crate) fn content_type_for_path(rel_path: &str) -> Option<&'static str> {
    let ext = Path::new(rel_path).extension()?.to_str()?;
    FileKind::from_extension(ext).map(FileKind::content_type)
}

fn detect_file_kind(
    content_type: Option<&str>,
    filename: Option<&str>,
    bytes: &[u8],
) -> Result<FileKind, UploadError> {
    let content_type = content_type.filter(|value| *value != "application/octet-stream");
    let sniffed = sniff_file_kind(bytes);
    if let Some(content_type) = content_type {
        let from_header =
            FileKind::from_content_type(content_type).ok_or(UploadError::UnsupportedType)?;
        if Some(from_header) != sniffed {
            return Err(UploadError::UnsupportedType);
        }
        return Ok(from_header);
    }

    if let Some(sniffed) = sniffed {
        return Ok(sniffed);
    }

    if let Some(filename) = filename
        && let Some(ext) = Path::new(filename).extension().and_then(|ext| ext.to_str())
        && let Some(kind) = FileKind::from_extension(ext)
    {
        return Ok(kind);
    }

    Err(UploadError::UnsupportedType)
}

fn sniff_file_kind(bytes: &[u8]) -> Option<FileKind> {
    if bytes.len() >= 8 && bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(FileKind::Png);
    }
    if bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
        return Some(FileKind::Jpeg);
    }
    if bytes.len() >= 6 && (bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")) {
        return Some(FileKind::Gif);
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some(FileKind::Webp);
    }
    if bytes.starts_with(b"%PDF-") {
        return Some(FileKind::Pdf);
    }
    None
}

fn sanitize_base_name(filename: Option<&str>) -> String {
    let base = filename
        .and_then(|name| Path::new(name).file_stem().and_then(|stem| stem.to_str()))
        .unwrap_or("file");
    let mut out = String::with_capacity(base.len());
    let mut last_dash = false;

    for ch in base.chars() {
        if ch.is_ascii_alphanumeric() {
            last_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else if !last_dash && !out.is_empty() {
            last_dash = true;
            out.push('-');
        }
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "file".to_string()
    } else if trimmed.len() > 40 {
        trimmed[..40].trim_end_matches('-').to_string()
    } else {
        trimmed.to_string()
    }
}

fn random_suffix() -> String {
    let value: u16 = rand::random();
    format!("{:04x}", value)
}

fn relative_path_to_path(rel_path: &str) -> Option<PathBuf> {
    if rel_path.is_empty() {
        return None;
    }
    let path = Path::new(rel_path);
    if path.is_absolute() {
        return None;
    }
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => components.push(part),
            _ => return None,
        }
    }
    if components.is_empty() {
        return None;
    }
    Some(components.iter().collect())
}

fn ensure_parent_dirs(root: &Path, rel_path: &Path) -> Result<(), UploadError> {
    let Some(parent) = rel_path.parent() else {
        return Ok(());
    };
    let mut current = root.to_path_buf();
    for component in parent.components() {
        let component = match component {
            Component::Normal(component) => component,
            _ => return Err(UploadError::BadPath),
        };
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(metadata) => {
                if metadata.file_type().is_symlink() || !metadata.is_dir() {
                    return Err(UploadError::BadPath);
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                std::fs::create_dir(&current).map_err(UploadError::Io)?;
            }
            Err(err) => return Err(UploadError::Io(err)),
        }
    }
    Ok(())
}

fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("missing parent directory"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    for attempt in 0..10u32 {
        let temp_name = format!(".{}.tmp-{}-{}-{}", file_name, pid, nanos, attempt);
        let temp_path = parent.join(temp_name);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(mut file) => {
                use std::io::Write as _;
                file.write_all(contents)?;
                file.sync_all()?;
                std::fs::rename(&temp_path, path)?;
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to create temp file",
    ))
}
