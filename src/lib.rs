//! Mailwright turns e-mail specifications into MIME messages.
//!
//! A specification is an XML document listing messages: their addressing,
//! subject, plain and HTML bodies, and attachments. Composing it takes two
//! steps:
//!
//! * the [`MailParser`] reads each `<email>` into a [`MailMessageAssembly`],
//!   digesting the HTML body on the way: images and stylesheets become
//!   related parts referenced by `cid:`, and links to tracked domains get
//!   the tracking tags in scope appended to their query string
//! * the [`Composer`] shapes an assembly into a [`Message`], fetching the
//!   related parts and attachments, and optionally degrading instead of
//!   failing when some of them cannot be fetched
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mailwright::{dom::Document, Composer, Config, MailParser, Resolver};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let resolver = Resolver::from_config(&config.fetch)?;
//! let parser = MailParser::new(&config, resolver.clone())?;
//!
//! let mut doc = Document::parse(&std::fs::read_to_string("newsletter.xml")?)?;
//! let root = doc.root();
//! let composer = Composer::new(&resolver, true);
//! for assembly in parser.parse_mails(&mut doc, root).await? {
//!     let message = composer.compose(assembly).await?;
//!     std::fs::write("newsletter.eml", message.formatted())?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! * **http** (default): fetches remote resources over HTTP(S) with `reqwest`
//! * **hostname** (default): generated `Message-ID`s name the local host

#![doc(html_root_url = "https://docs.rs/crate/mailwright/0.1.0")]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod address;
mod assembly;
mod compose;
pub mod config;
pub mod digest;
pub mod dom;
pub mod error;
pub mod message;
mod parser;
pub mod resource;
pub mod tag;

pub use crate::{
    address::Address,
    assembly::{MailMessageAssembly, NO_SUBJECT},
    compose::{Composer, FAILED_ATTACHMENT_NAME, PLAIN_CONTENT_TYPE},
    config::Config,
    error::Error,
    message::Message,
    parser::{MailParser, SENT_FORMAT},
    resource::Resolver,
};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
