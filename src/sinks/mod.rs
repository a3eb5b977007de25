//! External sink seams: operator notification, attachment fetch, and
//! durable storage. The flow core only sees these traits; concrete adapters
//! live in this module's submodules and are wired up in `main`.

pub mod notify;
pub mod storage;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::flow::event::AttachmentRef;
use crate::flow::submission::Submission;

pub use notify::OperatorNotifier;
pub use storage::{GoogleStorage, LogStorage};

/// Best-effort operator notification. Failures are logged and never block
/// the user's completion.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, submission: &Submission) -> Result<(), SinkError>;
}

/// Resolves an opaque attachment handle to its bytes. Implemented by the
/// messaging transport, which is the only party that can dereference its
/// own file ids.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, handle: &AttachmentRef) -> Result<Vec<u8>, SinkError>;
}

/// Durable storage: a blob store for attachments and an append log for
/// submission rows. A row is only ever appended with an already-resolved
/// attachment reference, never a placeholder.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Store attachment bytes under `label`, returning the resolved
    /// reference (a link) to carry in the row.
    async fn store_attachment(&self, bytes: Vec<u8>, label: &str) -> Result<String, SinkError>;

    /// Append one row of submission fields plus the resolved reference.
    async fn append_row(
        &self,
        fields: &[(String, String)],
        attachment_link: &str,
    ) -> Result<(), SinkError>;
}
