mod client;
mod content_type;
mod models;
mod pithos;
mod store;

pub(crate) use client::{build_blocking_client, send_checked, AUTH_TOKEN_HEADER};
pub use content_type::{content_type_for, FALLBACK_CONTENT_TYPE};
pub use models::{sanitize_file_name, timestamp_subpath, AccountInfo, ObjectPath};
pub use pithos::PithosClient;
pub use store::{ObjectStoreClient, TransferStream, UploadBody};
