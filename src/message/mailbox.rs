use std::{
    fmt::{Display, Formatter, Result as FmtResult, Write},
    mem,
    slice::Iter,
    str::FromStr,
};

use email_encoding::headers::writer::EmailWriter;

use crate::address::{Address, AddressError};

/// An email address with an optional display name
///
/// This type contains email address and the sender/recipient name (_Some Name \<user@domain.tld\>_ or _withoutname@domain.tld_).
///
/// # Examples
///
/// ```
/// # use mailwright::message::Mailbox;
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let mailbox: Mailbox = "John Smith <example@email.com>".parse()?;
/// assert_eq!(mailbox.name.as_deref(), Some("John Smith"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Mailbox {
    /// The name associated with the address.
    pub name: Option<String>,

    /// The email address itself.
    pub email: Address,
}

impl Mailbox {
    pub fn new(name: Option<String>, email: Address) -> Self {
        Mailbox { name, email }
    }

    fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }

    pub(crate) fn encode(&self, w: &mut EmailWriter<'_>) -> FmtResult {
        if let Some(name) = self.display_name() {
            email_encoding::headers::quoted_string::encode(name, w)?;
            w.space();
            w.write_char('<')?;
        }

        w.write_str(self.email.as_ref())?;

        if self.display_name().is_some() {
            w.write_char('>')?;
        }

        Ok(())
    }
}

impl Display for Mailbox {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if let Some(name) = self.display_name() {
            write_word(f, name)?;
            f.write_str(" <")?;
            self.email.fmt(f)?;
            return f.write_char('>');
        }
        self.email.fmt(f)
    }
}

impl From<Address> for Mailbox {
    fn from(value: Address) -> Self {
        Self::new(None, value)
    }
}

impl FromStr for Mailbox {
    type Err = AddressError;

    fn from_str(src: &str) -> Result<Mailbox, Self::Err> {
        let src = src.trim();
        let Some(rest) = src.strip_suffix('>') else {
            if src.contains(['<', '>']) {
                return Err(AddressError::Unbalanced);
            }
            return Ok(Mailbox::new(None, src.parse()?));
        };

        let (name, address) = rest.rsplit_once('<').ok_or(AddressError::Unbalanced)?;
        let name = unquote(name.trim())?;
        let name = (!name.is_empty()).then_some(name);
        Ok(Mailbox::new(name, address.trim().parse()?))
    }
}

/// A list of [`Mailbox`]es
///
/// Written as _Some Name \<user@domain.tld\>, Another Name \<other@domain.tld\>, withoutname@domain.tld, ..._
#[derive(Debug, Clone, Default, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Mailboxes(Vec<Mailbox>);

impl Mailboxes {
    pub fn new() -> Self {
        Mailboxes(Vec::new())
    }

    /// Adds a mailbox, builder style
    pub fn with(mut self, mbox: Mailbox) -> Self {
        self.0.push(mbox);
        self
    }

    pub fn push(&mut self, mbox: Mailbox) {
        self.0.push(mbox);
    }

    pub fn iter(&self) -> Iter<'_, Mailbox> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn encode(&self, w: &mut EmailWriter<'_>) -> FmtResult {
        let mut first = true;
        for mailbox in self.iter() {
            if !mem::take(&mut first) {
                w.write_char(',')?;
                w.space();
            }

            mailbox.encode(w)?;
        }

        Ok(())
    }
}

impl From<Mailbox> for Mailboxes {
    fn from(mailbox: Mailbox) -> Self {
        Mailboxes(vec![mailbox])
    }
}

impl From<Vec<Mailbox>> for Mailboxes {
    fn from(vec: Vec<Mailbox>) -> Self {
        Mailboxes(vec)
    }
}

impl From<Mailboxes> for Vec<Mailbox> {
    fn from(mailboxes: Mailboxes) -> Vec<Mailbox> {
        mailboxes.0
    }
}

impl Extend<Mailbox> for Mailboxes {
    fn extend<T: IntoIterator<Item = Mailbox>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Mailboxes {
    type Item = Mailbox;
    type IntoIter = std::vec::IntoIter<Mailbox>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for Mailboxes {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut iter = self.iter();

        if let Some(mbox) = iter.next() {
            mbox.fmt(f)?;

            for mbox in iter {
                f.write_str(", ")?;
                mbox.fmt(f)?;
            }
        }

        Ok(())
    }
}

impl FromStr for Mailboxes {
    type Err = AddressError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        split_list(src)?
            .into_iter()
            .filter(|item| !item.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Mailbox>, _>>()
            .map(Mailboxes)
    }
}

/// Splits a comma separated mailbox list, ignoring commas in quotes and angle brackets
fn split_list(src: &str) -> Result<Vec<&str>, AddressError> {
    let mut items = Vec::new();
    let (mut start, mut quoted, mut escaped, mut angle) = (0, false, false, false);

    for (i, c) in src.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '<' if !quoted => angle = true,
            '>' if !quoted => angle = false,
            ',' if !quoted && !angle => {
                items.push(&src[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quoted || angle {
        return Err(AddressError::Unbalanced);
    }

    items.push(&src[start..]);
    Ok(items)
}

fn unquote(name: &str) -> Result<String, AddressError> {
    let Some(inner) = name.strip_prefix('"') else {
        return Ok(name.to_owned());
    };
    let inner = inner.strip_suffix('"').ok_or(AddressError::Unbalanced)?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    Ok(out)
}

// https://datatracker.ietf.org/doc/html/rfc2822#section-3.2.6
fn write_word(f: &mut Formatter<'_>, s: &str) -> FmtResult {
    if s.bytes().all(is_valid_atom_char) {
        f.write_str(s)
    } else {
        // Quoted string: https://datatracker.ietf.org/doc/html/rfc2822#section-3.2.5
        f.write_char('"')?;
        for c in s.chars() {
            match c {
                '\\' | '"' => {
                    f.write_char('\\')?;
                    f.write_char(c)?;
                }
                '\r' | '\n' => f.write_char(' ')?,
                c => f.write_char(c)?,
            }
        }
        f.write_char('"')
    }
}

// https://datatracker.ietf.org/doc/html/rfc2822#section-3.2.4
fn is_valid_atom_char(c: u8) -> bool {
    matches!(c,
        // Not really allowed but can be inserted between atoms.
        b'\t' | b' ' |

        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'/' |
        b'0'..=b'9' | b'=' | b'?' | b'A'..=b'Z' | b'^' | b'_' | b'`' |
        b'a'..=b'z' | b'{' | b'|' | b'}' | b'~' |

        // Encoded when the header is written.
        128..=255)
}
