use super::Address;
use crate::{
    error,
    message::{
        header::{self, Headers},
        Mailboxes,
    },
    Error,
};

/// Sender and recipients of a message, as used for delivery
///
/// Only mailboxes are accepted, source routes are not supported.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Envelope {
    /// The envelope recipients' addresses
    ///
    /// This can not be empty.
    forward_path: Vec<Address>,
    /// The envelope sender address
    reverse_path: Option<Address>,
}

impl Envelope {
    /// Creates a new envelope, which fails if `to` is empty
    pub fn new(from: Option<Address>, to: Vec<Address>) -> Result<Envelope, Error> {
        if to.is_empty() {
            return Err(error::address("missing destination address"));
        }
        Ok(Envelope {
            forward_path: to,
            reverse_path: from,
        })
    }

    /// Derives the envelope of a message from its headers
    ///
    /// The reverse path is `bounce` if given, else the `Sender`, else the
    /// first `From` mailbox. The forward path holds every `To`, `Cc` and
    /// `Bcc` address in that order.
    pub fn from_headers(headers: &Headers, bounce: Option<Address>) -> Result<Envelope, Error> {
        let from = bounce
            .or_else(|| headers.get::<header::Sender>().map(|s| s.0.email))
            .or_else(|| {
                headers
                    .get::<header::From>()
                    .and_then(|f| f.0.into_iter().next())
                    .map(|m| m.email)
            });

        fn add_addresses(to: &mut Vec<Address>, mailboxes: Option<Mailboxes>) {
            if let Some(mailboxes) = mailboxes {
                to.extend(mailboxes.into_iter().map(|m| m.email));
            }
        }
        let mut to = Vec::new();
        add_addresses(&mut to, headers.get::<header::To>().map(|h| h.0));
        add_addresses(&mut to, headers.get::<header::Cc>().map(|h| h.0));
        add_addresses(&mut to, headers.get::<header::Bcc>().map(|h| h.0));

        Self::new(from, to)
    }

    /// Gets the destination addresses of the envelope
    pub fn to(&self) -> &[Address] {
        self.forward_path.as_slice()
    }

    /// Gets the sender of the envelope
    pub fn from(&self) -> Option<&Address> {
        self.reverse_path.as_ref()
    }
}
