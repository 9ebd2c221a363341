//! SMTP sending, IMAP mailbox access and message composition.

pub mod compose;
pub mod mailbox;
pub mod smtp;

pub use compose::{Composed, SendRequest, compose};
pub use mailbox::{Connector, ImapConnector, MailboxClient, MailboxSession};
pub use smtp::{SmtpSender, Submit, build_message};
