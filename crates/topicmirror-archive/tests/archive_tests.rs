//! End-to-end archive runs against in-process fakes.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use topicmirror_archive::{
    ArchiveError, Archiver, ElementError, ElementIterator, MediaSender, SendOptions,
    UploadElement, UploadError, Uploader,
};
use topicmirror_core::{ArchiveConfig, FileRecord, TopicId, UploadItem};
use topicmirror_topics::{
    BoxFuture, ClientError, ForumClient, InputChannel, KvStore, MemoryStore, Message, Peer,
    ServiceAction, ServiceMessage, TopicMapping, Update, Updates,
};

fn forum() -> Peer {
    Peer::Channel(InputChannel {
        channel_id: 42,
        access_hash: 1,
    })
}

#[derive(Default)]
struct FakeForum {
    titles: Mutex<Vec<String>>,
    resolved: AtomicUsize,
}

impl ForumClient for FakeForum {
    fn resolve_peer<'a>(&'a self, _ident: &'a str) -> BoxFuture<'a, Result<Peer, ClientError>> {
        Box::pin(async move {
            self.resolved.fetch_add(1, Ordering::SeqCst);
            Ok(forum())
        })
    }

    fn create_forum_topic<'a>(
        &'a self,
        _channel: InputChannel,
        title: &'a str,
        _random_id: i64,
    ) -> BoxFuture<'a, Result<Updates, ClientError>> {
        Box::pin(async move {
            let mut titles = self.titles.lock().unwrap();
            titles.push(title.to_string());
            Ok(Updates::Short(Update::NewChannelMessage(Message::Service(
                ServiceMessage {
                    id: titles.len() as i32,
                    action: ServiceAction::TopicCreate {
                        title: title.to_string(),
                    },
                },
            ))))
        })
    }
}

#[derive(Debug, Clone)]
struct Sent {
    name: String,
    thread: TopicId,
    caption: String,
    has_thumb: bool,
}

/// Records sent elements; optionally fails on one file name.
#[derive(Default)]
struct FakeSender {
    sent: Mutex<Vec<Sent>>,
    attempts: AtomicUsize,
    fail_on: Option<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pause: Duration,
}

impl MediaSender for FakeSender {
    fn send<'a>(
        &'a self,
        element: UploadElement,
        _options: SendOptions,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.pause).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = element.file.name();
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(ClientError::Rpc {
                    code: 400,
                    message: "FILE_PARTS_INVALID".to_string(),
                });
            }

            self.sent.lock().unwrap().push(Sent {
                name,
                thread: element.thread,
                caption: element.caption.text.clone(),
                has_thumb: element.thumb.is_some(),
            });
            Ok(())
        })
    }
}

impl FakeSender {
    fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.sent.lock().unwrap().iter().map(|s| s.name.clone()).collect();
        names.sort();
        names
    }
}

fn write(path: &Path, body: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// `<tmp>/c/docs/{report.pdf,notes.txt}`, `<tmp>/c/img/{cat.jpg,cat.thumb}`, `<tmp>/c/empty/`
fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("c");
    write(&root.join("docs/report.pdf"), b"%PDF-1.4 fake");
    write(&root.join("docs/notes.txt"), b"notes");
    write(&root.join("img/cat.jpg"), &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]);
    write(&root.join("img/cat.thumb"), b"not an image");
    fs::create_dir_all(root.join("empty")).unwrap();
    temp
}

fn archiver(forum: &Arc<FakeForum>, sender: &Arc<FakeSender>, store: &Arc<MemoryStore>) -> Archiver {
    Archiver::new(forum.clone(), sender.clone(), store.clone())
}

#[tokio::test]
async fn test_archive_run() {
    let temp = fixture();
    let forum_client = Arc::new(FakeForum::default());
    let sender = Arc::new(FakeSender::default());
    let store = Arc::new(MemoryStore::new());

    let config = ArchiveConfig::new("@forum", temp.path().join("c"));
    let report = archiver(&forum_client, &sender, &store)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    // Empty folders get no topic
    assert_eq!(*forum_client.titles.lock().unwrap(), vec!["c/docs", "c/img"]);
    assert_eq!(report.folders, 2);
    assert_eq!(report.files, 3);
    assert_eq!(report.topics_created, 2);
    assert_eq!(report.upload.uploaded, 3);
    assert_eq!(report.upload.removed, 0);
    assert!(report.finished_at >= report.started_at);

    assert_eq!(sender.names(), vec!["cat.jpg", "notes.txt", "report.pdf"]);

    let sent = sender.sent.lock().unwrap().clone();
    let report_pdf = sent.iter().find(|s| s.name == "report.pdf").unwrap();
    assert_eq!(report_pdf.thread, TopicId::new(1));
    assert_eq!(report_pdf.caption, "report - application/pdf");

    // The sidecar is not an image, so it is dropped
    let cat = sent.iter().find(|s| s.name == "cat.jpg").unwrap();
    assert_eq!(cat.thread, TopicId::new(2));
    assert!(!cat.has_thumb);

    let mapping = TopicMapping::load(store.as_ref(), "@forum").unwrap();
    assert_eq!(mapping.get("c/docs"), Some(TopicId::new(1)));
}

#[tokio::test]
async fn test_rerun_creates_no_topics() {
    let temp = fixture();
    let store = Arc::new(MemoryStore::new());
    let config = ArchiveConfig::new("@forum", temp.path().join("c"));

    let first = Arc::new(FakeForum::default());
    archiver(&first, &Arc::new(FakeSender::default()), &store)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    let second = Arc::new(FakeForum::default());
    let report = archiver(&second, &Arc::new(FakeSender::default()), &store)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert!(second.titles.lock().unwrap().is_empty());
    assert_eq!(report.topics_created, 0);
    assert_eq!(report.upload.uploaded, 3);
}

#[tokio::test]
async fn test_include_filter_and_remove() {
    let temp = fixture();
    let forum_client = Arc::new(FakeForum::default());
    let sender = Arc::new(FakeSender::default());
    let store = Arc::new(MemoryStore::new());

    let config = ArchiveConfig::builder()
        .chat("@forum")
        .path(temp.path().join("c"))
        .includes(vec!["txt".to_string()])
        .remove(true)
        .build()
        .unwrap();

    let report = archiver(&forum_client, &sender, &store)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(sender.names(), vec!["notes.txt"]);
    assert_eq!(*forum_client.titles.lock().unwrap(), vec!["c/docs"]);
    assert_eq!(report.upload.removed, 1);
    assert!(!temp.path().join("c/docs/notes.txt").exists());
    assert!(temp.path().join("c/docs/report.pdf").exists());
}

#[tokio::test]
async fn test_nothing_to_upload() {
    let temp = fixture();
    let forum_client = Arc::new(FakeForum::default());
    let sender = Arc::new(FakeSender::default());
    let store = Arc::new(MemoryStore::new());

    let config = ArchiveConfig::builder()
        .chat("@forum")
        .path(temp.path().join("c"))
        .includes(vec!["mkv".to_string()])
        .build()
        .unwrap();

    let report = archiver(&forum_client, &sender, &store)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.files, 0);
    assert_eq!(report.upload.uploaded, 0);
    assert!(forum_client.titles.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_scan_error_makes_no_remote_calls() {
    let temp = TempDir::new().unwrap();
    let forum_client = Arc::new(FakeForum::default());
    let store = Arc::new(MemoryStore::new());

    let config = ArchiveConfig::new("@forum", temp.path().join("missing"));
    let err = archiver(&forum_client, &Arc::new(FakeSender::default()), &store)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Scan(_)));
    assert!(err.to_string().starts_with("scan folder tree"));
    assert_eq!(forum_client.resolved.load(Ordering::SeqCst), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_strip_prefix_outside_tree() {
    let temp = fixture();
    let other = TempDir::new().unwrap();
    let forum_client = Arc::new(FakeForum::default());
    let store = Arc::new(MemoryStore::new());

    let config = ArchiveConfig::builder()
        .chat("@forum")
        .path(temp.path().join("c"))
        .strip_prefix(other.path())
        .build()
        .unwrap();

    let err = archiver(&forum_client, &Arc::new(FakeSender::default()), &store)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::Topics(_)));
    assert!(forum_client.titles.lock().unwrap().is_empty());
}

fn items(dir: &Path, names: &[&str]) -> Vec<UploadItem> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            write(&path, name.as_bytes());
            UploadItem::new(
                FileRecord::new(path, name.len() as u64),
                TopicId::new(9),
                false,
            )
        })
        .collect()
}

#[tokio::test]
async fn test_uploader_respects_limit() {
    let temp = TempDir::new().unwrap();
    let names = ["1.txt", "2.txt", "3.txt", "4.txt", "5.txt", "6.txt"];
    let mut iter = ElementIterator::new(
        items(temp.path(), &names),
        forum(),
        false,
        Duration::ZERO,
        "{name}",
    );
    let sender = Arc::new(FakeSender {
        pause: Duration::from_millis(20),
        ..Default::default()
    });

    let report = Uploader::new(sender.clone(), 4, 2)
        .upload(&mut iter, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.uploaded, 6);
    assert_eq!(report.bytes, 30);
    assert!(sender.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert_eq!(sender.names(), names);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_uploader_stops_on_first_failure() {
    // Repeated because the race only shows up across worker threads
    for _ in 0..50 {
        let temp = TempDir::new().unwrap();
        let names = ["1.txt", "2.txt", "3.txt", "4.txt"];
        let mut iter = ElementIterator::new(
            items(temp.path(), &names),
            forum(),
            true,
            Duration::ZERO,
            "{name}",
        );
        let sender = Arc::new(FakeSender {
            fail_on: Some("1.txt".to_string()),
            ..Default::default()
        });

        let err = Uploader::new(sender.clone(), 1, 1)
            .upload(&mut iter, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Send { ref path, .. } if path.ends_with("1.txt")));
        assert_eq!(sender.attempts.load(Ordering::SeqCst), 1);
        assert!(sender.sent.lock().unwrap().is_empty());
        // Nothing after the failed file was sent or removed
        for name in names {
            assert!(temp.path().join(name).exists());
        }
    }
}

#[tokio::test]
async fn test_uploader_reports_cancellation() {
    let temp = TempDir::new().unwrap();
    let mut iter = ElementIterator::new(
        items(temp.path(), &["1.txt", "2.txt"]),
        forum(),
        false,
        Duration::ZERO,
        "{name}",
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Uploader::new(Arc::new(FakeSender::default()), 1, 1)
        .upload(&mut iter, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Element(ElementError::Cancelled)));
}

#[tokio::test]
async fn test_cancelled_run_is_reported_as_cancelled() {
    let temp = fixture();
    let store = Arc::new(MemoryStore::new());
    let sender = Arc::new(FakeSender::default());
    let config = ArchiveConfig::new("@forum", temp.path().join("c"));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = archiver(&Arc::new(FakeForum::default()), &sender, &store)
        .run(&config, &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(sender.attempts.load(Ordering::SeqCst), 0);
    // Topics are ensured before the upload stage starts
    assert_eq!(store.writes(), 2);
}

#[tokio::test]
async fn test_kv_store_is_shared_across_runs() {
    // The mapping written by a run is visible through the trait object
    let temp = fixture();
    let store = Arc::new(MemoryStore::new());
    let config = ArchiveConfig::new("@forum", temp.path().join("c"));

    archiver(&Arc::new(FakeForum::default()), &Arc::new(FakeSender::default()), &store)
        .run(&config, &CancellationToken::new())
        .await
        .unwrap();

    let dyn_store: Arc<dyn KvStore> = store.clone();
    let raw = dyn_store.get("archive:topics:@forum").unwrap();
    assert_eq!(raw, br#"{"c/docs":1,"c/img":2}"#);
    assert_eq!(store.writes(), 2);
}
