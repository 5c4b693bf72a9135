/// Resource registry: handles, records, deferred release and uploads

mod handle;
mod record;
mod registry;
mod upload;

pub use handle::{ResourceHandle, ViewportId, ResourceProxy};
pub use record::{ResourceKind, ResourceDesc, ResourceRecord, RecordState};
pub use registry::{ResourceRegistry, UNCLAIMED_UPLOAD_FRAMES};
pub use upload::{UploadQueue, UploadTicket};
