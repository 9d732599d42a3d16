use std::path::PathBuf;
use thiserror::Error;

use crate::db::StorageError;

/// 观察者收到的终态码，对应宿主 cloud-file 接口里的结果常量。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Ok,
    Offline,
    AuthError,
    ExceedsFileLimit,
    ExceedsQuota,
    UploadError,
    NotFound,
    Canceled,
    /// 请求没能启动（例如工作线程创建失败）。
    Failure,
}

impl RequestStatus {
    pub fn is_success(self) -> bool {
        matches!(self, RequestStatus::Ok)
    }
}

/// 远端对象存储 / 身份服务调用失败的原因。
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("response is missing the {0} header")]
    MissingHeader(&'static str),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("upload stream error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// 服务端明确拒绝（非 2xx/3xx）时返回响应体，用作 last error 文本。
    pub fn response_body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }

    /// 服务端给出了非成功状态码；传输层错误不算。
    pub fn is_rejection(&self) -> bool {
        matches!(self, ApiError::Status { .. })
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("the mail client is offline")]
    Offline,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{} is {size} bytes, above the upload limit of {limit} bytes", .path.display())]
    ExceedsFileLimit { path: PathBuf, size: u64, limit: u64 },

    #[error("uploading {size} bytes would exceed the remaining {available} bytes of quota")]
    ExceedsQuota { size: u64, available: u64 },

    #[error("remote call failed: {0}")]
    Remote(#[from] ApiError),

    #[error("no upload recorded for {}", .0.display())]
    NotFound(PathBuf),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }
}

/// 给只认字符串错误的宿主胶水层用。
impl From<ProviderError> for String {
    fn from(error: ProviderError) -> Self {
        error.to_string()
    }
}
