use imap::{ClientBuilder, ConnectionMode};
use tracing::debug;

use mailroom_content::parse_record;
use mailroom_core::{Account, MailError, MailboxRecord, OperationResult, Payload, Result};

/// The IMAP commands the client needs, one call per protocol command.
pub trait MailboxSession {
    fn select_folder(&mut self, folder: &str) -> Result<()>;
    fn search_ids(&mut self, query: &str) -> Result<Vec<u32>>;
    /// Full RFC 822 payload, `None` when the server sent no body.
    fn fetch_message(&mut self, id: &str) -> Result<Option<Vec<u8>>>;
    fn mark_deleted(&mut self, id: &str) -> Result<()>;
    fn expunge_folder(&mut self) -> Result<()>;
    fn folder_names(&mut self) -> Result<Vec<String>>;
    fn create_folder(&mut self, name: &str) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

impl MailboxSession for imap::Session<imap::Connection> {
    fn select_folder(&mut self, folder: &str) -> Result<()> {
        self.select(folder)
            .map(|_| ())
            .map_err(|e| imap_error(&format!("SELECT {}", folder), e))
    }

    fn search_ids(&mut self, query: &str) -> Result<Vec<u32>> {
        let ids = self
            .search(query)
            .map_err(|e| imap_error(&format!("SEARCH {}", query), e))?;
        Ok(ids.into_iter().collect())
    }

    fn fetch_message(&mut self, id: &str) -> Result<Option<Vec<u8>>> {
        let fetches = self
            .fetch(id, "RFC822")
            .map_err(|e| imap_error(&format!("FETCH {}", id), e))?;
        Ok(fetches.iter().find_map(|f| f.body().map(|b| b.to_vec())))
    }

    fn mark_deleted(&mut self, id: &str) -> Result<()> {
        self.store(id, "+FLAGS.SILENT (\\Deleted)")
            .map(|_| ())
            .map_err(|e| imap_error(&format!("STORE {}", id), e))
    }

    fn expunge_folder(&mut self) -> Result<()> {
        self.expunge()
            .map(|_| ())
            .map_err(|e| imap_error("EXPUNGE", e))
    }

    fn folder_names(&mut self) -> Result<Vec<String>> {
        let list = self
            .list(None, Some("*"))
            .map_err(|e| imap_error("LIST", e))?;
        Ok(list.iter().map(|name| name.name().to_string()).collect())
    }

    fn create_folder(&mut self, name: &str) -> Result<()> {
        self.create(name)
            .map_err(|e| imap_error(&format!("CREATE {}", name), e))
    }

    fn close(&mut self) -> Result<()> {
        self.logout().map_err(|e| imap_error("LOGOUT", e))
    }
}

fn imap_error(command: &str, err: imap::Error) -> MailError {
    MailError::transport(format!("IMAP {} failed: {}", command, err))
}

/// Opens an authenticated session.
pub trait Connector {
    type Session: MailboxSession;

    fn open(&self) -> Result<Self::Session>;
}

pub struct ImapConnector {
    account: Account,
}

impl Connector for ImapConnector {
    type Session = imap::Session<imap::Connection>;

    fn open(&self) -> Result<Self::Session> {
        let account = &self.account;
        debug!(host = %account.imap_host, port = account.imap_port, "imap connect");
        let mode = if account.use_ssl {
            ConnectionMode::Tls
        } else {
            ConnectionMode::Plaintext
        };
        let client = ClientBuilder::new(account.imap_host.as_str(), account.imap_port)
            .tls_kind(imap::TlsKind::Native)
            .mode(mode)
            .danger_skip_tls_verify(account.skip_tls_verify)
            .connect()
            .map_err(|e| {
                MailError::transport(format!(
                    "Cannot connect to {}:{}: {}",
                    account.imap_host, account.imap_port, e
                ))
            })?;
        debug!("imap tcp connected");
        let session = client
            .login(&account.username, &account.password)
            .map_err(|e| MailError::Auth(e.0.to_string()))?;
        debug!("imap login ok");
        Ok(session)
    }
}

/// Runs one logical operation per connection: connect, log in, act, log out.
pub struct MailboxClient<C = ImapConnector> {
    connector: C,
}

impl MailboxClient<ImapConnector> {
    pub fn new(account: &Account) -> Self {
        Self {
            connector: ImapConnector {
                account: account.clone(),
            },
        }
    }
}

impl<C: Connector> MailboxClient<C> {
    pub fn with_connector(connector: C) -> Self {
        Self { connector }
    }

    /// The newest `limit` messages of `folder`, oldest first.
    pub fn list(&self, folder: &str, limit: usize, unread_only: bool) -> OperationResult {
        let query = if unread_only { "UNSEEN" } else { "ALL" };
        let outcome = self
            .fetch_matching(folder, query, limit)
            .map(|(total, emails)| Payload::Listing {
                folder: folder.to_string(),
                query: None,
                total,
                emails,
            });
        OperationResult::settle(outcome, || Payload::empty_listing(folder, None))
    }

    /// Runs a raw IMAP SEARCH expression.
    pub fn search(&self, folder: &str, query: &str, limit: usize) -> OperationResult {
        let outcome = if query.trim().is_empty() {
            Err(MailError::validation("Search query must not be empty"))
        } else {
            self.fetch_matching(folder, query.trim(), limit)
        };
        let outcome = outcome.map(|(total, emails)| Payload::Listing {
            folder: folder.to_string(),
            query: Some(query.to_string()),
            total,
            emails,
        });
        OperationResult::settle(outcome, || Payload::empty_listing(folder, Some(query)))
    }

    pub fn read(&self, folder: &str, id: &str) -> OperationResult {
        let outcome = validate_id(id).and_then(|id| {
            self.with_session(|session| {
                session.select_folder(folder)?;
                match session.fetch_message(id)? {
                    Some(raw) => parse_record(id, &raw),
                    None => Err(MailError::transport(format!(
                        "Message {} not found in {}",
                        id, folder
                    ))),
                }
            })
        });
        let outcome = outcome.map(|record| Payload::Message {
            folder: folder.to_string(),
            email_id: id.to_string(),
            email: Some(record),
        });
        OperationResult::settle(outcome, || Payload::Message {
            folder: folder.to_string(),
            email_id: id.to_string(),
            email: None,
        })
    }

    /// Flags `id` as deleted and expunges the folder.
    pub fn delete(&self, folder: &str, id: &str) -> OperationResult {
        let outcome = validate_id(id).and_then(|id| {
            self.with_session(|session| {
                session.select_folder(folder)?;
                session.mark_deleted(id)?;
                session.expunge_folder()
            })
        });
        let payload = || Payload::Deleted {
            folder: folder.to_string(),
            email_id: id.to_string(),
        };
        OperationResult::settle(outcome.map(|_| payload()), payload)
    }

    pub fn list_folders(&self) -> OperationResult {
        let outcome = self
            .with_session(|session| session.folder_names())
            .map(|folders| Payload::Folders { folders });
        OperationResult::settle(outcome, || Payload::Folders {
            folders: Vec::new(),
        })
    }

    pub fn create_folder(&self, name: &str) -> OperationResult {
        let outcome = if name.trim().is_empty() {
            Err(MailError::validation("Folder name must not be empty"))
        } else {
            self.with_session(|session| session.create_folder(name))
        };
        let payload = || Payload::FolderCreated {
            folder: name.to_string(),
        };
        OperationResult::settle(outcome.map(|_| payload()), payload)
    }

    fn fetch_matching(
        &self,
        folder: &str,
        query: &str,
        limit: usize,
    ) -> Result<(usize, Vec<MailboxRecord>)> {
        self.with_session(|session| {
            session.select_folder(folder)?;
            let mut ids = session.search_ids(query)?;
            ids.sort_unstable();
            let total = ids.len();
            let newest = &ids[total.saturating_sub(limit)..];
            debug!(folder, query, total, fetching = newest.len(), "search done");
            let mut emails = Vec::with_capacity(newest.len());
            for id in newest {
                let id = id.to_string();
                let record = match session.fetch_message(&id)? {
                    Some(raw) => parse_record(&id, &raw)?,
                    None => MailboxRecord::unavailable(&id, "Server returned no message body"),
                };
                emails.push(record);
            }
            Ok((total, emails))
        })
    }

    /// The session is logged out whether or not `op` succeeded.
    fn with_session<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut C::Session) -> Result<T>,
    {
        let mut session = self.connector.open()?;
        let outcome = op(&mut session);
        if let Err(err) = session.close() {
            debug!("imap logout failed: {}", err);
        }
        outcome
    }
}

fn validate_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(id)
    } else {
        Err(MailError::validation(format!(
            "Invalid message id '{}': expected a sequence number",
            id
        )))
    }
}
