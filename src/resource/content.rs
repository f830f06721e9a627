use std::{fmt, sync::Arc};

/// Fetched or decoded resource: content type, display name and bytes
///
/// Immutable and cheap to clone. Equality and hashing cover all three
/// fields, including the full payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BinaryContent {
    content_type: String,
    name: String,
    bytes: Arc<[u8]>,
}

impl BinaryContent {
    pub fn new<T, N, B>(content_type: T, name: N, bytes: B) -> Self
    where
        T: Into<String>,
        N: Into<String>,
        B: Into<Vec<u8>>,
    {
        let bytes: Vec<u8> = bytes.into();
        Self {
            content_type: content_type.into(),
            name: name.into(),
            bytes: Arc::from(bytes),
        }
    }

    /// The declared `Content-Type`, parameters included
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The display name, possibly empty
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The display name, or `unknown` when there is none
    pub fn file_name(&self) -> &str {
        if self.name.is_empty() {
            "unknown"
        } else {
            &self.name
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The content as a `data:` URL with a base64 payload
    pub fn to_data_url(&self) -> String {
        use base64::Engine;

        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

impl fmt::Debug for BinaryContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}: {} bytes of {}]",
            self.name,
            self.bytes.len(),
            self.content_type
        )
    }
}

impl fmt::Display for BinaryContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Derives a display name from the path of a URL: the query is dropped, then
/// everything up to the last `/`
pub(crate) fn display_name(path: &str) -> &str {
    let name = match path.find('?') {
        Some(q) if q > 0 => &path[..q],
        _ => path,
    };
    match name.rfind('/') {
        Some(slash) => &name[slash + 1..],
        None => name,
    }
}
