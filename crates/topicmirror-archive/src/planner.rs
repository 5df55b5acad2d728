//! Upload item planning.

use topicmirror_core::{FolderTree, UploadItem};
use topicmirror_topics::TopicLookup;

use crate::error::PlanError;

/// Pair every scanned file with its folder's topic, in scan order.
///
/// Every folder of `tree` must have been ensured beforehand; the first file
/// whose folder has no topic fails the whole plan.
pub fn plan<L>(tree: &FolderTree, topics: &L, as_photo: bool) -> Result<Vec<UploadItem>, PlanError>
where
    L: TopicLookup + ?Sized,
{
    tree.files
        .iter()
        .map(|file| {
            let topic_id = topics
                .topic_id(&file.folder)
                .map_err(|source| PlanError::Unresolved {
                    path: file.path.clone(),
                    source,
                })?;
            Ok(UploadItem::new(file.clone(), topic_id, as_photo))
        })
        .collect()
}
