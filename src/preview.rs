// File type helpers.
// Guesses MIME types from names, classifies files for preview, and builds viewer URLs.

/// Coarse file category used for list icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Pdf,
    Document,
    Unknown,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        match extension(name).as_str() {
            "jpg" | "jpeg" | "png" | "gif" => FileKind::Image,
            "mp4" | "mov" | "avi" => FileKind::Video,
            "pdf" => FileKind::Pdf,
            "doc" | "docx" => FileKind::Document,
            _ => FileKind::Unknown,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            FileKind::Image => "🖼",
            FileKind::Video => "🎬",
            FileKind::Pdf => "📕",
            FileKind::Document => "📄",
            FileKind::Unknown => "📦",
        }
    }
}

/// MIME type for an upload, guessed from the file name.
pub fn mime_for_name(name: &str) -> &'static str {
    match extension(name).as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

const MEDIA_TYPES: &[&str] = &["image/", "video/", "audio/"];
const MEDIA_EXTENSIONS: &[&str] = &[
    "svg", "png", "jpg", "jpeg", "gif", "bmp", "webp", "mp4", "mov", "avi", "mkv", "webm", "mp3",
    "wav", "ogg", "m4a",
];

const TEXT_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "application/json",
    "text/html",
    "text/xml",
];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "json", "xml", "html", "css", "js"];

const CSV_TYPES: &[&str] = &["text/csv", "text/comma-separated-values"];
const OFFICE_TYPES: &[&str] = &[
    "msword",
    "wordprocessingml",
    "ms-excel",
    "spreadsheetml",
    "ms-powerpoint",
    "presentationml",
];
const OFFICE_EXTENSIONS: &[&str] = &["doc", "docx", "xls", "xlsx", "ppt", "pptx"];

/// How a file can be previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Media,
    Text,
    Pdf,
    Csv,
    Office,
    Unsupported,
}

impl PreviewKind {
    /// Classify by MIME type or by the extension of `url_or_name`.
    ///
    /// Media wins over everything, then text, then the document viewers.
    pub fn classify(url_or_name: &str, mime_type: &str) -> Self {
        let ext = extension(url_or_name);
        let ext = ext.as_str();
        let mime = mime_type.to_ascii_lowercase();

        if MEDIA_TYPES.iter().any(|t| mime.starts_with(t)) || MEDIA_EXTENSIONS.contains(&ext) {
            PreviewKind::Media
        } else if TEXT_TYPES.iter().any(|t| mime.contains(t)) || TEXT_EXTENSIONS.contains(&ext) {
            PreviewKind::Text
        } else if mime.contains("pdf") || ext == "pdf" {
            PreviewKind::Pdf
        } else if CSV_TYPES.iter().any(|t| mime.contains(t)) || ext == "csv" {
            PreviewKind::Csv
        } else if OFFICE_TYPES.iter().any(|t| mime.contains(t)) || OFFICE_EXTENSIONS.contains(&ext)
        {
            PreviewKind::Office
        } else {
            PreviewKind::Unsupported
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PreviewKind::Media => "media",
            PreviewKind::Text => "text",
            PreviewKind::Pdf => "pdf",
            PreviewKind::Csv => "csv",
            PreviewKind::Office => "office",
            PreviewKind::Unsupported => "unsupported",
        }
    }

    /// URL that renders `url` for this kind, or `None` when nothing can show it.
    pub fn viewer_url(&self, url: &str) -> Option<String> {
        let encoded = urlencoding::encode(url);
        match self {
            PreviewKind::Pdf => Some(format!(
                "https://mozilla.github.io/pdf.js/web/viewer.html?file={encoded}"
            )),
            PreviewKind::Csv => Some(format!(
                "https://docs.google.com/gview?url={encoded}&embedded=true"
            )),
            PreviewKind::Office => Some(format!(
                "https://view.officeapps.live.com/op/embed.aspx?src={encoded}"
            )),
            PreviewKind::Media => Some(url.to_string()),
            PreviewKind::Text => Some(format!(
                "https://docs.google.com/viewer?url={encoded}&embedded=true"
            )),
            PreviewKind::Unsupported => None,
        }
    }
}

/// Lowercased extension of a name or URL, ignoring any query string or fragment.
fn extension(url_or_name: &str) -> String {
    let path = url_or_name
        .split(['?', '#'])
        .next()
        .unwrap_or(url_or_name);
    let last = path.rsplit('/').next().unwrap_or(path);
    last.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
