#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

/// Media kind plus the MIME subtype (`jpeg`, `svg+xml`, `mp4`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    pub kind: MediaKind,
    pub subtype: String,
}

impl MediaType {
    pub fn image(subtype: &str) -> Self {
        Self {
            kind: MediaKind::Image,
            subtype: subtype.to_string(),
        }
    }

    pub fn video(subtype: &str) -> Self {
        Self {
            kind: MediaKind::Video,
            subtype: subtype.to_string(),
        }
    }

    /// Parses `image/*` and `video/*` MIME types; anything else is `None`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        let (top, sub) = mime.split_once('/')?;
        let sub = sub.split(';').next().unwrap_or("").trim();
        if sub.is_empty() {
            return None;
        }
        match top {
            "image" => Some(Self::image(sub)),
            "video" => Some(Self::video(sub)),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::image("jpeg")),
            "png" | "webp" | "gif" | "bmp" | "tiff" | "heic" => {
                Some(Self::image(&ext.to_lowercase()))
            }
            "tif" => Some(Self::image("tiff")),
            "svg" => Some(Self::image("svg+xml")),
            "mp4" | "webm" => Some(Self::video(&ext.to_lowercase())),
            "mov" => Some(Self::video("quicktime")),
            "mkv" => Some(Self::video("x-matroska")),
            "avi" => Some(Self::video("x-msvideo")),
            _ => None,
        }
    }

    /// Guesses the type from the extension of a URI, ignoring query strings.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let path = strip_uri_suffix(uri);
        let name = path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    pub fn is_svg(&self) -> bool {
        self.kind == MediaKind::Image && self.subtype.starts_with("svg")
    }
}

/// One media item in a paged group.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEntry {
    pub id: String,
    pub uri: String,
    /// Low-resolution placeholder shown until the full media decodes.
    pub preview_uri: Option<String>,
    pub group_id: String,
    pub media_type: MediaType,
    /// Height over width; known once the media has decoded at least once.
    pub aspect_ratio: Option<f64>,
    /// Sort key within the group.
    pub index: Option<i64>,
    /// Chronologically reversed feeds insert at the head instead of appending.
    pub is_reversed: bool,
}

impl MediaEntry {
    pub fn new(group_id: &str, uri: &str, media_type: MediaType) -> Self {
        Self {
            id: uri.to_string(),
            uri: uri.to_string(),
            preview_uri: None,
            group_id: group_id.to_string(),
            media_type,
            aspect_ratio: None,
            index: None,
            is_reversed: false,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: f64) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn with_preview(mut self, preview_uri: &str) -> Self {
        self.preview_uri = Some(preview_uri.to_string());
        self
    }

    pub fn reversed(mut self) -> Self {
        self.is_reversed = true;
        self
    }

    pub fn is_video(&self) -> bool {
        self.media_type.is_video()
    }

    pub fn apply(&mut self, patch: &EntryPatch) {
        if let Some(id) = &patch.id {
            self.id = id.clone();
        }
        if let Some(preview_uri) = &patch.preview_uri {
            self.preview_uri = Some(preview_uri.clone());
        }
        if let Some(media_type) = &patch.media_type {
            self.media_type = media_type.clone();
        }
        if let Some(aspect_ratio) = patch.aspect_ratio {
            self.aspect_ratio = Some(aspect_ratio);
        }
        if let Some(index) = patch.index {
            self.index = Some(index);
        }
        if let Some(is_reversed) = patch.is_reversed {
            self.is_reversed = is_reversed;
        }
    }
}

/// Partial update keyed by `uri`; a missing `group_id` matches every group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub uri: String,
    pub group_id: Option<String>,
    pub id: Option<String>,
    pub preview_uri: Option<String>,
    pub media_type: Option<MediaType>,
    pub aspect_ratio: Option<f64>,
    pub index: Option<i64>,
    pub is_reversed: Option<bool>,
}

impl EntryPatch {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            ..Default::default()
        }
    }

    pub fn in_group(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }

    pub fn aspect_ratio(mut self, aspect_ratio: f64) -> Self {
        self.aspect_ratio = Some(aspect_ratio);
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }
}

/// Drops the query string and fragment from a URI.
pub fn strip_uri_suffix(uri: &str) -> &str {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    &uri[..end]
}
