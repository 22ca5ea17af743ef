//! Lead storage boundary.

use async_trait::async_trait;

use crate::conversation::LeadRecord;
use crate::error::Error;

/// Destination for captured leads.
///
/// The session flushes its lead record here best-effort on teardown; a flush
/// failure is logged, never fatal.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn store(&self, lead: &LeadRecord) -> Result<(), Error>;
}
