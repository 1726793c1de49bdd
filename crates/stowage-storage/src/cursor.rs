#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixCursor {
    pub prefix: String,
    pub max_keys: i32,
    pub continuation_token: Option<String>,
}

impl PrefixCursor {
    pub fn new(prefix: impl Into<String>, max_keys: i32) -> Self {
        Self {
            prefix: prefix.into(),
            max_keys,
            continuation_token: None,
        }
    }

    pub fn continuation_token(&self) -> String {
        self.continuation_token.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirCursor {
    pub inner: PrefixCursor,
    pub delimiter: String,
}

impl DirCursor {
    pub fn new(prefix: impl Into<String>, max_keys: i32, delimiter: impl Into<String>) -> Self {
        Self {
            inner: PrefixCursor::new(prefix, max_keys),
            delimiter: delimiter.into(),
        }
    }

    pub fn continuation_token(&self) -> String {
        self.inner.continuation_token()
    }
}

/// In-flight multipart uploads under a prefix. Several uploads may share
/// one key, so the position needs both markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCursor {
    pub prefix: String,
    pub max_uploads: i32,
    pub key_marker: Option<String>,
    pub upload_id_marker: Option<String>,
}

impl UploadCursor {
    pub fn new(prefix: impl Into<String>, max_uploads: i32) -> Self {
        Self {
            prefix: prefix.into(),
            max_uploads,
            key_marker: None,
            upload_id_marker: None,
        }
    }

    pub fn continuation_token(&self) -> String {
        let key_marker = self.key_marker.as_deref().unwrap_or_default();
        match self.upload_id_marker.as_deref() {
            Some(upload_id) if !upload_id.is_empty() => format!("{key_marker}/{upload_id}"),
            _ => key_marker.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectCursor {
    Prefix(PrefixCursor),
    Dir(DirCursor),
    Uploads(UploadCursor),
}

impl ObjectCursor {
    pub fn continuation_token(&self) -> String {
        match self {
            Self::Prefix(cursor) => cursor.continuation_token(),
            Self::Dir(cursor) => cursor.continuation_token(),
            Self::Uploads(cursor) => cursor.continuation_token(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartCursor {
    pub key: String,
    pub upload_id: String,
    pub max_parts: i32,
    pub part_number_marker: Option<i32>,
}

impl PartCursor {
    pub fn new(key: impl Into<String>, upload_id: impl Into<String>, max_parts: i32) -> Self {
        Self {
            key: key.into(),
            upload_id: upload_id.into(),
            max_parts,
            part_number_marker: None,
        }
    }

    pub fn continuation_token(&self) -> String {
        self.part_number_marker.unwrap_or(0).to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCursor;
