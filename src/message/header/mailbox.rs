use email_encoding::headers::writer::EmailWriter;

use super::{Header, HeaderName, HeaderValue};
use crate::{
    message::mailbox::{Mailbox, Mailboxes},
    BoxError,
};

/// Header which can contain multiple mailboxes
pub trait MailboxesHeader {
    fn join_mailboxes(&mut self, other: Self);
}

macro_rules! mailbox_header {
    ($(#[$doc:meta])*($type_name: ident, $header_name: expr)) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $type_name(pub(crate) Mailbox);

        impl Header for $type_name {
            fn name() -> HeaderName {
                HeaderName::new_from_ascii_str($header_name)
            }

            fn parse(s: &str) -> Result<Self, BoxError> {
                let mailbox: Mailbox = s.parse()?;
                Ok(Self(mailbox))
            }

            fn display(&self) -> HeaderValue {
                let mut encoded = String::new();
                let line_len = $header_name.len() + ": ".len();
                {
                    let mut w = EmailWriter::new(&mut encoded, line_len, 0, false);
                    self.0.encode(&mut w).expect("writing `Mailbox` to a `String` never fails");
                }
                HeaderValue::dangerous_new_pre_encoded(Self::name(), self.0.to_string(), encoded)
            }
        }

        impl std::convert::From<Mailbox> for $type_name {
            #[inline]
            fn from(mailbox: Mailbox) -> Self {
                Self(mailbox)
            }
        }

        impl std::convert::From<$type_name> for Mailbox {
            #[inline]
            fn from(this: $type_name) -> Mailbox {
                this.0
            }
        }
    };
}

macro_rules! mailboxes_header {
    ($(#[$doc:meta])*($type_name: ident, $header_name: expr)) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $type_name(pub(crate) Mailboxes);

        impl MailboxesHeader for $type_name {
            fn join_mailboxes(&mut self, other: Self) {
                self.0.extend(other.0);
            }
        }

        impl Header for $type_name {
            fn name() -> HeaderName {
                HeaderName::new_from_ascii_str($header_name)
            }

            fn parse(s: &str) -> Result<Self, BoxError> {
                let mailboxes: Mailboxes = s.parse()?;
                Ok(Self(mailboxes))
            }

            fn display(&self) -> HeaderValue {
                let mut encoded = String::new();
                let line_len = $header_name.len() + ": ".len();
                {
                    let mut w = EmailWriter::new(&mut encoded, line_len, 0, false);
                    self.0.encode(&mut w).expect("writing `Mailboxes` to a `String` never fails");
                }
                HeaderValue::dangerous_new_pre_encoded(Self::name(), self.0.to_string(), encoded)
            }
        }

        impl std::convert::From<Mailboxes> for $type_name {
            #[inline]
            fn from(mailboxes: Mailboxes) -> Self {
                Self(mailboxes)
            }
        }

        impl std::convert::From<$type_name> for Mailboxes {
            #[inline]
            fn from(this: $type_name) -> Mailboxes {
                this.0
            }
        }
    };
}

mailbox_header! {
    /// `Sender` header, the mailbox actually sending the message on behalf of the `From` mailboxes
    (Sender, "Sender")
}

mailboxes_header! {
    /// `From` header
    (From, "From")
}

mailboxes_header! {
    /// `Reply-To` header
    (ReplyTo, "Reply-To")
}

mailboxes_header! {
    /// `To` header
    (To, "To")
}

mailboxes_header! {
    /// `Cc` header
    (Cc, "Cc")
}

mailboxes_header! {
    /// `Bcc` header
    (Bcc, "Bcc")
}
