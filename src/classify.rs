//! Content classification.
//!
//! [`classify`] is a pure function of the probed [`FileFacts`]; probing is
//! the only part that touches the filesystem or runs `file(1)`.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::tools::Toolbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Svg,
    Generic,
}

/// Category a selection is dispatched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentClass {
    Directory,
    Image(ImageKind),
    Gif,
    Video,
    Audio,
    Font,
    Office,
    Archive,
    Troff,
    Markdown,
    Html,
    Json,
    Pdf,
    Epub,
    VectorImage,
    Djvu,
    Binary,
    Text,
}

impl ContentClass {
    pub const ALL: [ContentClass; 20] = [
        ContentClass::Directory,
        ContentClass::Image(ImageKind::Jpeg),
        ContentClass::Image(ImageKind::Svg),
        ContentClass::Image(ImageKind::Generic),
        ContentClass::Gif,
        ContentClass::Video,
        ContentClass::Audio,
        ContentClass::Font,
        ContentClass::Office,
        ContentClass::Archive,
        ContentClass::Troff,
        ContentClass::Markdown,
        ContentClass::Html,
        ContentClass::Json,
        ContentClass::Pdf,
        ContentClass::Epub,
        ContentClass::VectorImage,
        ContentClass::Djvu,
        ContentClass::Binary,
        ContentClass::Text,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentClass::Directory => "directory",
            ContentClass::Image(ImageKind::Jpeg) => "image-jpeg",
            ContentClass::Image(ImageKind::Svg) => "image-svg",
            ContentClass::Image(ImageKind::Generic) => "image",
            ContentClass::Gif => "gif",
            ContentClass::Video => "video",
            ContentClass::Audio => "audio",
            ContentClass::Font => "font",
            ContentClass::Office => "office",
            ContentClass::Archive => "archive",
            ContentClass::Troff => "troff",
            ContentClass::Markdown => "markdown",
            ContentClass::Html => "html",
            ContentClass::Json => "json",
            ContentClass::Pdf => "pdf",
            ContentClass::Epub => "epub",
            ContentClass::VectorImage => "vector-image",
            ContentClass::Djvu => "djvu",
            ContentClass::Binary => "binary",
            ContentClass::Text => "text",
        }
    }
}

impl fmt::Display for ContentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentClass::ALL
            .iter()
            .copied()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| format!("unknown content class '{}'", s))
    }
}

/// Character encoding family reported by `file --mime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Text,
    Binary,
    Unknown,
}

/// Everything classification looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFacts {
    pub encoding: Encoding,
    pub mime: Option<String>,
    /// Lowercase extension without the dot.
    pub extension: Option<String>,
    pub is_dir: bool,
}

impl FileFacts {
    /// Gather facts for `path`, using `file(1)` when it is installed and a
    /// NUL-byte sniff otherwise.
    pub fn probe(path: &Path, tools: &Toolbox) -> Self {
        let is_dir = path.is_dir();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        if is_dir {
            return Self {
                encoding: Encoding::Unknown,
                mime: Some("inode/directory".to_string()),
                extension,
                is_dir,
            };
        }

        let (mime, encoding) = match probe_with_file(path, tools) {
            Some(found) => found,
            None => (None, sniff_encoding(path)),
        };

        Self {
            encoding,
            mime,
            extension,
            is_dir,
        }
    }
}

fn probe_with_file(path: &Path, tools: &Toolbox) -> Option<(Option<String>, Encoding)> {
    let output = tools
        .command("file")?
        .args(["--brief", "--dereference", "--mime", "--"])
        .arg(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(parse_mime_line(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `file --mime` output such as `text/plain; charset=us-ascii`.
pub fn parse_mime_line(line: &str) -> (Option<String>, Encoding) {
    let mut parts = line.trim().split(';');
    let mime = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| m.contains('/'));
    let encoding = parts
        .filter_map(|p| p.trim().strip_prefix("charset="))
        .map(|charset| {
            if charset.eq_ignore_ascii_case("binary") {
                Encoding::Binary
            } else {
                Encoding::Text
            }
        })
        .next()
        .unwrap_or(Encoding::Unknown);
    (mime, encoding)
}

fn sniff_encoding(path: &Path) -> Encoding {
    let mut buf = [0u8; 1024];
    match std::fs::File::open(path).and_then(|mut f| f.read(&mut buf)) {
        Ok(n) if buf[..n].contains(&0) => Encoding::Binary,
        Ok(_) => Encoding::Text,
        Err(_) => Encoding::Unknown,
    }
}

/// Map facts to a content class.
///
/// Directories come first; then the encoding picks the binary or text
/// tables, which are consulted by MIME type and then by extension.
pub fn classify(facts: &FileFacts) -> ContentClass {
    if facts.is_dir {
        return ContentClass::Directory;
    }
    let mime = facts.mime.as_deref();
    let ext = facts.extension.as_deref();

    match facts.encoding {
        Encoding::Text => mime
            .and_then(text_by_mime)
            .or_else(|| ext.and_then(text_by_extension))
            .unwrap_or(ContentClass::Text),
        Encoding::Binary | Encoding::Unknown => mime
            .and_then(binary_by_mime)
            .or_else(|| ext.and_then(binary_by_extension))
            .or_else(|| mime.filter(|m| is_archive_mime(m)).map(|_| ContentClass::Archive))
            .unwrap_or(ContentClass::Binary),
    }
}

fn text_by_mime(mime: &str) -> Option<ContentClass> {
    Some(match mime {
        "text/troff" => ContentClass::Troff,
        "text/markdown" | "text/x-markdown" => ContentClass::Markdown,
        "text/html" | "application/xhtml+xml" => ContentClass::Html,
        "application/json" => ContentClass::Json,
        "image/svg+xml" => ContentClass::Image(ImageKind::Svg),
        "application/postscript" => ContentClass::VectorImage,
        _ => return None,
    })
}

fn text_by_extension(ext: &str) -> Option<ContentClass> {
    Some(match ext {
        "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9" | "man" | "roff" => {
            ContentClass::Troff
        }
        "md" | "markdown" | "mkd" => ContentClass::Markdown,
        "htm" | "html" | "xhtml" => ContentClass::Html,
        "json" | "geojson" => ContentClass::Json,
        "svg" => ContentClass::Image(ImageKind::Svg),
        "eps" | "ps" => ContentClass::VectorImage,
        _ => return None,
    })
}

fn binary_by_mime(mime: &str) -> Option<ContentClass> {
    let class = match mime {
        "image/gif" => ContentClass::Gif,
        "image/jpeg" => ContentClass::Image(ImageKind::Jpeg),
        "image/svg+xml" => ContentClass::Image(ImageKind::Svg),
        "image/vnd.djvu" | "image/x-djvu" => ContentClass::Djvu,
        "application/pdf" => ContentClass::Pdf,
        "application/epub+zip" => ContentClass::Epub,
        "application/postscript" | "application/illustrator" => ContentClass::VectorImage,
        "application/msword" | "application/vnd.ms-excel" | "application/vnd.ms-powerpoint" => {
            ContentClass::Office
        }
        m if m.starts_with("application/vnd.openxmlformats-officedocument.")
            || m.starts_with("application/vnd.oasis.opendocument.") =>
        {
            ContentClass::Office
        }
        m if m.starts_with("font/")
            || m.starts_with("application/font-")
            || m.starts_with("application/x-font-")
            || m == "application/vnd.ms-opentype" =>
        {
            ContentClass::Font
        }
        m if m.starts_with("image/") => ContentClass::Image(ImageKind::Generic),
        m if m.starts_with("video/") => ContentClass::Video,
        m if m.starts_with("audio/") => ContentClass::Audio,
        _ => return None,
    };
    Some(class)
}

fn binary_by_extension(ext: &str) -> Option<ContentClass> {
    Some(match ext {
        "jpg" | "jpeg" => ContentClass::Image(ImageKind::Jpeg),
        "png" | "webp" | "bmp" | "tif" | "tiff" | "avif" | "heic" | "ico" => {
            ContentClass::Image(ImageKind::Generic)
        }
        "gif" => ContentClass::Gif,
        "mp4" | "mkv" | "webm" | "avi" | "mov" | "wmv" | "flv" | "m4v" => ContentClass::Video,
        "mp3" | "flac" | "ogg" | "opus" | "wav" | "m4a" | "aac" => ContentClass::Audio,
        "ttf" | "otf" | "woff" | "woff2" => ContentClass::Font,
        "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "ods" | "odp" | "rtf" => {
            ContentClass::Office
        }
        "zip" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "zst" | "7z" | "rar" | "jar" | "deb"
        | "rpm" => ContentClass::Archive,
        "pdf" => ContentClass::Pdf,
        "epub" => ContentClass::Epub,
        "eps" | "ai" => ContentClass::VectorImage,
        "djvu" | "djv" => ContentClass::Djvu,
        _ => return None,
    })
}

fn is_archive_mime(mime: &str) -> bool {
    matches!(
        mime,
        "application/zip"
            | "application/x-tar"
            | "application/gzip"
            | "application/x-gzip"
            | "application/x-bzip2"
            | "application/x-xz"
            | "application/zstd"
            | "application/x-7z-compressed"
            | "application/x-rar"
            | "application/vnd.rar"
            | "application/java-archive"
            | "application/x-compressed-tar"
    )
}
