use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::invoicing::InvoiceClient;
use crate::mailer::Mailer;

/// Shared state handed to every handler. The mailer and invoicing
/// clients are absent when their env blocks are unset; side-effect
/// chains then no-op.
#[derive(Clone)]
pub struct ApiContext {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub mailer: Option<Arc<Mailer>>,
    pub invoicing: Option<Arc<InvoiceClient>>,
}

/// The authenticated staff user, inserted by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
}
