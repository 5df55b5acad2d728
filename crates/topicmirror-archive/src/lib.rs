//! Archive pipeline for topicmirror.
//!
//! An archive run scans a folder tree, makes sure each folder has a forum
//! topic, pairs every file with its topic and streams the files through an
//! [`ElementIterator`] into a [`MediaSender`]:
//!
//! ```text
//! root path -> FolderTree -> topics -> UploadItems -> UploadElements -> sender
//! ```
//!
//! [`Archiver`] sequences the stages; each stage is usable on its own.

mod archive;
pub mod caption;
mod error;
mod iter;
pub mod mime;
mod planner;
mod uploader;

pub use archive::{ArchiveReport, Archiver};
pub use caption::{Caption, CaptionError, EntityKind, MessageEntity};
pub use error::{ArchiveError, ElementError, PlanError, UploadError};
pub use iter::{ElementIterator, UploadElement, UploadFile};
pub use planner::plan;
pub use uploader::{MediaSender, SendOptions, UploadReport, Uploader};
