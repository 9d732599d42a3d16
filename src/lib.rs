//! ~okeanos (Pithos+) FileLink provider.
//!
//! 附件先上传到 Pithos+ 容器并公开，邮件里只插入分享链接。
//! 每个账户同一时刻只有一个上传在进行，其余请求排队依次执行。

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod logging;
pub mod provider;
pub mod settings;
pub mod upload_manager;

pub use error::{ApiError, ProviderError, ProviderResult, RequestStatus};
pub use provider::FileLinkProvider;
pub use upload_manager::{FileHandle, RequestObserver, UploadQueue};
