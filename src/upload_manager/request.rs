use crate::api::content_type_for;
use crate::error::RequestStatus;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// 宿主传进来的观察者：先收到一次 start，再收到恰好一次 stop。
pub trait RequestObserver: Send + Sync {
    fn on_start_request(&self);
    fn on_stop_request(&self, status: RequestStatus);
}

/// 待上传的本地文件。会话内以路径作为文件的身份。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    path: PathBuf,
    size: u64,
}

impl FileHandle {
    /// 读取文件元数据；目录或不存在的路径直接报错。
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        Ok(Self {
            path,
            size: metadata.len(),
        })
    }

    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn leaf_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.path)
    }

    pub(crate) fn open_stream(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Queued,
    Active,
    Completed,
    Canceled,
}

/// 队列中的一个上传请求。id 只用于保证终态通知恰好一次。
pub(crate) struct UploadRequest {
    pub id: String,
    pub file: FileHandle,
    pub observer: Arc<dyn RequestObserver>,
    pub state: RequestState,
}

impl UploadRequest {
    pub fn new(file: FileHandle, observer: Arc<dyn RequestObserver>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file,
            observer,
            state: RequestState::Queued,
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.file.path() == path
    }

    pub fn transition(&mut self, next: RequestState) {
        log::debug!("request {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }
}
