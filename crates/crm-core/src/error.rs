//! Fatal errors: the only class that transitions a run to `Failed`.
//!
//! Record-level failures never appear here; they are accumulated into the
//! run's counters and failure list by the migrators.

use thiserror::Error;

use crm_client::ApiFailure;

/// A systemic error that terminates the run.
#[derive(Debug, Error)]
pub enum FatalError {
    /// A schema or record listing could not be fetched at all.
    #[error("failed to fetch {what} from the {account} account: {source}")]
    Fetch {
        account: &'static str,
        what: &'static str,
        source: ApiFailure,
    },

    /// A dependency stage produced zero usable mappings for records that
    /// need them.
    #[error("no usable mapping: {0}")]
    NoUsableMapping(String),

    /// A fatal API failure surfaced mid-migration (authorization).
    #[error(transparent)]
    Api(#[from] ApiFailure),
}

impl FatalError {
    pub(crate) fn fetch(account: &'static str, what: &'static str, source: ApiFailure) -> Self {
        Self::Fetch {
            account,
            what,
            source,
        }
    }
}
