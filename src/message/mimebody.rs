use crate::message::{
    header::{ContentType, Header, HeaderValue, Headers},
    EmailFormat, IntoBody,
};

/// MIME part variants
#[derive(Debug, Clone)]
pub enum Part {
    /// Single part with content
    Single(SinglePart),

    /// Multiple parts of content
    Multi(MultiPart),
}

impl Part {
    pub fn headers(&self) -> &Headers {
        match self {
            Part::Single(part) => part.headers(),
            Part::Multi(part) => part.headers(),
        }
    }

    /// Get message content formatted for sending
    pub fn formatted(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.format(&mut out);
        out
    }
}

impl EmailFormat for Part {
    fn format(&self, out: &mut Vec<u8>) {
        match self {
            Part::Single(part) => part.format(out),
            Part::Multi(part) => part.format(out),
        }
    }
}

impl From<SinglePart> for Part {
    fn from(part: SinglePart) -> Self {
        Part::Single(part)
    }
}

impl From<MultiPart> for Part {
    fn from(part: MultiPart) -> Self {
        Part::Multi(part)
    }
}

/// Creates builder for single part
#[derive(Debug, Clone, Default)]
pub struct SinglePartBuilder {
    headers: Headers,
}

impl SinglePartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header to singlepart
    pub fn header<H: Header>(mut self, header: H) -> Self {
        self.headers.set(header);
        self
    }

    /// Set the Content-Type header of the singlepart
    pub fn content_type(self, content_type: ContentType) -> Self {
        self.header(content_type)
    }

    /// Build singlepart using body
    pub fn body<T: IntoBody>(mut self, body: T) -> SinglePart {
        let body = body.into_body();
        self.headers.set(body.encoding());

        SinglePart {
            headers: self.headers,
            body: body.into_vec(),
        }
    }
}

/// Single part
///
/// # Example
///
/// ```
/// use mailwright::message::{header::ContentType, SinglePart};
///
/// let part = SinglePart::builder()
///     .content_type(ContentType::TEXT_PLAIN)
///     .body(String::from("Текст письма в уникоде"));
/// ```
#[derive(Debug, Clone)]
pub struct SinglePart {
    headers: Headers,
    body: Vec<u8>,
}

impl SinglePart {
    #[inline]
    pub fn builder() -> SinglePartBuilder {
        SinglePartBuilder::new()
    }

    /// A `text/plain; charset=utf-8` part
    pub fn plain(body: String) -> Self {
        Self::builder().content_type(ContentType::TEXT_PLAIN).body(body)
    }

    /// A `text/html; charset=utf-8` part
    pub fn html(body: String) -> Self {
        Self::builder().content_type(ContentType::TEXT_HTML).body(body)
    }

    #[inline]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get the encoded body
    #[inline]
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    /// Get message content formatted for sending
    pub fn formatted(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.format(&mut out);
        out
    }
}

impl EmailFormat for SinglePart {
    fn format(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out.extend_from_slice(b"\r\n");
    }
}

/// The kind of multipart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiPartKind {
    /// Mixed kind to combine unrelated content parts
    ///
    /// For example this kind can be used to mix email message and attachments.
    Mixed,

    /// Alternative kind to join several variants of same email contents.
    ///
    /// That kind is recommended to use for joining plain (text) and rich (HTML) messages into single email message.
    Alternative,

    /// Related kind to mix content and related resources.
    ///
    /// For example, you can include images into HTML content using that.
    Related,
}

impl MultiPartKind {
    fn subtype(self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::Alternative => "alternative",
            Self::Related => "related",
        }
    }
}

/// Create a random MIME boundary.
fn make_boundary() -> String {
    std::iter::repeat_with(fastrand::alphanumeric)
        .take(40)
        .collect()
}

/// Multipart builder
#[derive(Debug, Clone)]
pub struct MultiPartBuilder {
    kind: MultiPartKind,
    boundary: Option<String>,
}

impl MultiPartBuilder {
    pub fn new(kind: MultiPartKind) -> Self {
        Self {
            kind,
            boundary: None,
        }
    }

    /// Set custom boundary
    pub fn boundary<S: Into<String>>(mut self, boundary: S) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Creates multipart without parts
    pub fn build(self) -> MultiPart {
        let boundary = self.boundary.unwrap_or_else(make_boundary);
        let mut headers = Headers::new();
        headers.set_raw(HeaderValue::new(
            ContentType::name(),
            format!("multipart/{}; boundary=\"{}\"", self.kind.subtype(), boundary),
        ));

        MultiPart {
            headers,
            kind: self.kind,
            boundary,
            parts: Vec::new(),
        }
    }

    /// Creates multipart using part
    pub fn part(self, part: Part) -> MultiPart {
        self.build().part(part)
    }

    /// Creates multipart using singlepart
    pub fn singlepart(self, part: SinglePart) -> MultiPart {
        self.build().singlepart(part)
    }

    /// Creates multipart using multipart
    pub fn multipart(self, part: MultiPart) -> MultiPart {
        self.build().multipart(part)
    }
}

/// Multipart variant with parts
#[derive(Debug, Clone)]
pub struct MultiPart {
    headers: Headers,
    kind: MultiPartKind,
    boundary: String,
    parts: Vec<Part>,
}

impl MultiPart {
    pub fn builder(kind: MultiPartKind) -> MultiPartBuilder {
        MultiPartBuilder::new(kind)
    }

    /// Creates mixed multipart builder
    pub fn mixed() -> MultiPartBuilder {
        MultiPart::builder(MultiPartKind::Mixed)
    }

    /// Creates alternative multipart builder
    pub fn alternative() -> MultiPartBuilder {
        MultiPart::builder(MultiPartKind::Alternative)
    }

    /// Creates related multipart builder
    pub fn related() -> MultiPartBuilder {
        MultiPart::builder(MultiPartKind::Related)
    }

    /// Add part to multipart
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Add single part to multipart
    pub fn singlepart(self, part: SinglePart) -> Self {
        self.part(Part::Single(part))
    }

    /// Add multi part to multipart
    pub fn multipart(self, part: MultiPart) -> Self {
        self.part(Part::Multi(part))
    }

    pub fn kind(&self) -> MultiPartKind {
        self.kind
    }

    /// Get the boundary of multipart contents
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Get message content formatted for sending
    pub fn formatted(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.format(&mut out);
        out
    }
}

impl EmailFormat for MultiPart {
    fn format(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        for part in &self.parts {
            out.extend_from_slice(b"--");
            out.extend_from_slice(self.boundary.as_bytes());
            out.extend_from_slice(b"\r\n");
            part.format(out);
        }

        out.extend_from_slice(b"--");
        out.extend_from_slice(self.boundary.as_bytes());
        out.extend_from_slice(b"--\r\n");
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::message::header::{ContentDisposition, ContentId};

    #[test]
    fn single_part_plain() {
        let part = SinglePart::plain(String::from("Текст письма в уникоде"));

        assert_eq!(
            String::from_utf8(part.formatted()).unwrap(),
            concat!(
                "Content-Type: text/plain; charset=utf-8\r\n",
                "Content-Transfer-Encoding: base64\r\n",
                "\r\n",
                "0KLQtdC60YHRgiDQv9C40YHRjNC80LAg0LIg0YPQvdC40LrQvtC00LU=\r\n",
            )
        );
    }

    #[test]
    fn multi_part_related() {
        let part = MultiPart::related()
            .boundary("0oVZ2r6AoLAhLlb0gPNSKy6BEqdS2IfwxrcbUuo1")
            .singlepart(SinglePart::html(String::from(
                "<p><img src=\"cid:part.1@mail\"></p>",
            )))
            .singlepart(
                SinglePart::builder()
                    .content_type(ContentType::parse("image/png").unwrap())
                    .header(ContentDisposition::inline())
                    .header(ContentId::from(String::from("<part.1@mail>")))
                    .body(vec![0x89, b'P', b'N', b'G']),
            );

        assert_eq!(part.kind(), MultiPartKind::Related);
        assert_eq!(part.parts().len(), 2);
        assert_eq!(
            String::from_utf8(part.formatted()).unwrap(),
            concat!(
                "Content-Type: multipart/related;\r\n",
                " boundary=\"0oVZ2r6AoLAhLlb0gPNSKy6BEqdS2IfwxrcbUuo1\"\r\n",
                "\r\n",
                "--0oVZ2r6AoLAhLlb0gPNSKy6BEqdS2IfwxrcbUuo1\r\n",
                "Content-Type: text/html; charset=utf-8\r\n",
                "Content-Transfer-Encoding: 7bit\r\n",
                "\r\n",
                "<p><img src=\"cid:part.1@mail\"></p>\r\n",
                "--0oVZ2r6AoLAhLlb0gPNSKy6BEqdS2IfwxrcbUuo1\r\n",
                "Content-Type: image/png\r\n",
                "Content-Disposition: inline\r\n",
                "Content-ID: <part.1@mail>\r\n",
                "Content-Transfer-Encoding: base64\r\n",
                "\r\n",
                "iVBORw==\r\n",
                "--0oVZ2r6AoLAhLlb0gPNSKy6BEqdS2IfwxrcbUuo1--\r\n",
            )
        );
    }

    #[test]
    fn random_boundaries_differ() {
        let a = MultiPart::mixed().build();
        let b = MultiPart::mixed().build();
        assert_eq!(a.boundary().len(), 40);
        assert_ne!(a.boundary(), b.boundary());
    }
}
