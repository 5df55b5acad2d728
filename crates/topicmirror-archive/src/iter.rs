//! Pull-based upload element iterator.
//!
//! The iterator is an explicit state machine: a cursor over planned items,
//! the last error and the element produced by the last successful advance.
//! It is driven from a single loop (`advance` then `current`); concurrent
//! transfers happen downstream of that loop.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use topicmirror_core::{TopicId, UploadItem};
use topicmirror_topics::Peer;

use crate::caption::{Caption, file_caption};
use crate::error::ElementError;
use crate::mime;

/// An open file handed to the uploader.
#[derive(Debug)]
pub struct UploadFile {
    file: File,
    path: PathBuf,
    size: u64,
}

impl UploadFile {
    fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
        })
    }

    /// Base name of the file.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path the handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size in bytes of the opened handle.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Mutable access to the handle.
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Take the handle.
    pub fn into_file(self) -> File {
        self.file
    }
}

/// One transfer-ready element. Owns its handles until consumed.
#[derive(Debug)]
pub struct UploadElement {
    pub file: UploadFile,
    pub thumb: Option<UploadFile>,
    pub to: Peer,
    pub caption: Caption,
    pub thread: TopicId,
    pub mime: String,
    pub as_photo: bool,
    pub remove: bool,
}

/// Cursor over planned upload items.
pub struct ElementIterator {
    items: Vec<UploadItem>,
    forum: Peer,
    remove: bool,
    delay: Duration,
    caption_template: String,
    cursor: usize,
    error: Option<ElementError>,
    current: Option<UploadElement>,
}

impl ElementIterator {
    /// Create an iterator posting `items` to `forum`.
    pub fn new(
        items: Vec<UploadItem>,
        forum: Peer,
        remove: bool,
        delay: Duration,
        caption_template: impl Into<String>,
    ) -> Self {
        Self {
            items,
            forum,
            remove,
            delay,
            caption_template: caption_template.into(),
            cursor: 0,
            error: None,
            current: None,
        }
    }

    /// Prepare the next element.
    ///
    /// Returns `false` once the items are exhausted or an error occurred;
    /// [`Self::error`] tells the two apart. Both states are terminal.
    pub async fn advance(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            self.fail(ElementError::Cancelled);
            return false;
        }

        if self.error.is_some() || self.cursor >= self.items.len() {
            return false;
        }

        if !self.delay.is_zero() && self.cursor > 0 {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.fail(ElementError::Cancelled);
                    return false;
                }
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        let item = self.items[self.cursor].clone();
        self.cursor += 1;

        let forum = self.forum;
        let remove = self.remove;
        let template = self.caption_template.clone();
        let result = tokio::task::spawn_blocking(move || open_element(&item, forum, remove, &template))
            .await
            .map_err(|e| ElementError::Task {
                message: e.to_string(),
            })
            .and_then(|r| r);

        match result {
            Ok(element) => {
                self.current = Some(element);
                true
            }
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    /// Take the element prepared by the last successful [`Self::advance`].
    pub fn current(&mut self) -> Option<UploadElement> {
        self.current.take()
    }

    /// Error that stopped the iterator, if any.
    pub fn error(&self) -> Option<&ElementError> {
        self.error.as_ref()
    }

    /// Take the error that stopped the iterator.
    pub fn take_error(&mut self) -> Option<ElementError> {
        self.error.take()
    }

    /// Number of items not yet advanced over.
    pub fn remaining(&self) -> usize {
        self.items.len() - self.cursor
    }

    fn fail(&mut self, err: ElementError) {
        self.current = None;
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn open_element(
    item: &UploadItem,
    forum: Peer,
    remove: bool,
    caption_template: &str,
) -> Result<UploadElement, ElementError> {
    let record = &item.file;

    let mut file = UploadFile::open(&record.path).map_err(|source| ElementError::Open {
        path: record.path.clone(),
        source,
    })?;

    let thumb = record.thumb.as_deref().and_then(open_thumb);

    let mime = match mime::sniff(file.file_mut()) {
        Ok(mime) => mime,
        Err(err) => {
            warn!(path = %record.path.display(), error = %err, "Failed to detect content type");
            mime::OCTET_STREAM.to_string()
        }
    };

    let caption = file_caption(caption_template, &record.stem(), &mime);

    Ok(UploadElement {
        file,
        thumb,
        to: forum,
        caption,
        thread: item.topic_id,
        mime,
        as_photo: item.as_photo,
        remove,
    })
}

/// Open a thumbnail sidecar. Anything but a readable image is dropped.
fn open_thumb(path: &Path) -> Option<UploadFile> {
    let mut thumb = match UploadFile::open(path) {
        Ok(thumb) => thumb,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to open thumbnail");
            return None;
        }
    };

    match mime::sniff(thumb.file_mut()) {
        Ok(mime) if mime::is_image(&mime) => Some(thumb),
        Ok(mime) => {
            debug!(path = %path.display(), mime = %mime, "Thumbnail is not an image");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to detect thumbnail type");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use topicmirror_core::FileRecord;
    use topicmirror_topics::InputChannel;

    fn forum() -> Peer {
        Peer::Channel(InputChannel {
            channel_id: 1,
            access_hash: 0,
        })
    }

    fn item(dir: &Path, name: &str, body: &[u8]) -> UploadItem {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        UploadItem::new(FileRecord::new(path, body.len() as u64), TopicId::new(7), false)
    }

    #[tokio::test]
    async fn test_produces_elements_in_order() {
        let temp = TempDir::new().unwrap();
        let items = vec![item(temp.path(), "a.txt", b"a"), item(temp.path(), "b.txt", b"bb")];
        let mut iter = ElementIterator::new(items, forum(), true, Duration::ZERO, "{name}");
        let cancel = CancellationToken::new();

        assert!(iter.advance(&cancel).await);
        let first = iter.current().unwrap();
        assert_eq!(first.file.name(), "a.txt");
        assert_eq!(first.caption.text, "a");
        assert_eq!(first.thread, TopicId::new(7));
        assert!(first.remove);
        assert!(iter.current().is_none());

        assert!(iter.advance(&cancel).await);
        assert_eq!(iter.current().unwrap().file.size(), 2);

        assert!(!iter.advance(&cancel).await);
        assert!(iter.error().is_none());
        assert_eq!(iter.remaining(), 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_terminal() {
        let temp = TempDir::new().unwrap();
        let missing = UploadItem::new(
            FileRecord::new(temp.path().join("gone.txt"), 1),
            TopicId::new(1),
            false,
        );
        let items = vec![missing, item(temp.path(), "ok.txt", b"ok")];
        let mut iter = ElementIterator::new(items, forum(), false, Duration::ZERO, "{name}");
        let cancel = CancellationToken::new();

        assert!(!iter.advance(&cancel).await);
        assert!(matches!(iter.error(), Some(ElementError::Open { .. })));

        // Remaining items are never produced
        assert!(!iter.advance(&cancel).await);
        assert_eq!(iter.remaining(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_iteration() {
        let temp = TempDir::new().unwrap();
        let items = vec![item(temp.path(), "a.txt", b"a"), item(temp.path(), "b.txt", b"b")];
        let mut iter = ElementIterator::new(items, forum(), false, Duration::ZERO, "{name}");
        let cancel = CancellationToken::new();

        assert!(iter.advance(&cancel).await);
        cancel.cancel();

        assert!(!iter.advance(&cancel).await);
        assert!(matches!(iter.error(), Some(ElementError::Cancelled)));
        assert!(iter.current().is_none());
        assert_eq!(iter.remaining(), 1);
    }

    #[tokio::test]
    async fn test_delay_only_between_items() {
        let temp = TempDir::new().unwrap();
        let items = vec![item(temp.path(), "a.txt", b"a"), item(temp.path(), "b.txt", b"b")];
        let delay = Duration::from_millis(100);
        let mut iter = ElementIterator::new(items, forum(), false, delay, "{name}");
        let cancel = CancellationToken::new();

        let start = std::time::Instant::now();
        assert!(iter.advance(&cancel).await);
        assert!(start.elapsed() < delay);

        assert!(iter.advance(&cancel).await);
        assert!(start.elapsed() >= delay);
    }

    #[test]
    fn test_non_image_thumbnail_dropped() {
        let temp = TempDir::new().unwrap();
        let thumb = temp.path().join("a.thumb");
        fs::write(&thumb, b"plain text, not an image").unwrap();

        assert!(open_thumb(&thumb).is_none());
        assert!(open_thumb(&temp.path().join("missing.thumb")).is_none());
    }

    #[test]
    fn test_image_thumbnail_kept() {
        let temp = TempDir::new().unwrap();
        let thumb = temp.path().join("a.thumb");
        fs::write(&thumb, [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F']).unwrap();

        let opened = open_thumb(&thumb).unwrap();
        assert_eq!(opened.path(), thumb.as_path());
        // Streamed with a declared length, so the size comes from the handle
        assert_eq!(opened.size(), 10);
    }
}
