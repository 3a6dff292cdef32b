use tracing::debug;

use super::IngestError;
use crate::db::{Parent, Store};

/// Offset at which a new traversal of `parent`'s children starts.
///
/// Equal to the number of children already committed, so an interrupted run
/// re-fetches at most the uncommitted tail; insert-if-absent absorbs any overlap.
pub async fn resume_offset<S>(store: &S, parent: &Parent) -> Result<u64, IngestError>
where
    S: Store + ?Sized,
{
    let offset = store
        .count_children(parent)
        .await
        .map_err(|source| IngestError::Lookup {
            what: format!("stored children of {parent}"),
            source,
        })?;

    debug!(%parent, offset, "Resuming traversal");
    Ok(offset)
}
