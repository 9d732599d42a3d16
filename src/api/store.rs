use super::models::{AccountInfo, ObjectPath};
use crate::auth::AuthToken;
use crate::error::ApiResult;
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

/// 对象存储的远端操作。每个调用都带上当前令牌；2xx/3xx 为成功，
/// 其余情况返回 `ApiError::Status` 并附带响应体。
pub trait ObjectStoreClient: Send + Sync {
    fn head_account(&self, token: &AuthToken) -> ApiResult<AccountInfo>;
    fn ensure_container(&self, token: &AuthToken, container: &str) -> ApiResult<()>;
    fn put_object(
        &self,
        token: &AuthToken,
        path: &ObjectPath,
        body: UploadBody,
        content_type: &str,
    ) -> ApiResult<()>;
    fn set_public(&self, token: &AuthToken, path: &ObjectPath) -> ApiResult<()>;
    fn get_public_url(&self, token: &AuthToken, path: &ObjectPath) -> ApiResult<String>;
    fn delete_object(&self, token: &AuthToken, path: &ObjectPath) -> ApiResult<()>;
}

enum StreamSlot {
    Pending,
    Open(Box<dyn Read + Send>),
    Closed,
}

/// 上传中的文件流，由队列与流水线共享。
/// 取消时由队列关闭：底层文件句柄立刻释放，后续读取返回 ConnectionAborted，
/// HTTP 请求体随之中断。
#[derive(Clone)]
pub struct TransferStream {
    slot: Arc<Mutex<StreamSlot>>,
}

impl TransferStream {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(StreamSlot::Pending)),
        }
    }

    /// 挂上真正的读取源；流已关闭（上传已被取消）时拒绝。
    pub fn attach(&self, reader: Box<dyn Read + Send>) -> io::Result<()> {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if matches!(*slot, StreamSlot::Closed) {
            return Err(cancelled());
        }
        *slot = StreamSlot::Open(reader);
        Ok(())
    }

    /// 幂等；关闭后再读返回 ConnectionAborted。
    pub fn close(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        *slot = StreamSlot::Closed;
    }

    pub fn is_open(&self) -> bool {
        let slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        matches!(*slot, StreamSlot::Open(_))
    }
}

impl Default for TransferStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for TransferStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        match &mut *slot {
            StreamSlot::Open(reader) => reader.read(buf),
            StreamSlot::Pending => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "upload stream not attached",
            )),
            StreamSlot::Closed => Err(cancelled()),
        }
    }
}

fn cancelled() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "upload cancelled")
}

/// 上传请求体：已知长度的共享文件流。
pub struct UploadBody {
    stream: TransferStream,
    len: u64,
}

impl UploadBody {
    pub fn new(stream: TransferStream, len: u64) -> Self {
        Self {
            stream,
            len,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for UploadBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn body_reads_attached_stream() {
        let stream = TransferStream::new();
        stream.attach(Box::new(Cursor::new(b"hello".to_vec()))).unwrap();
        let mut body = UploadBody::new(stream.clone(), 5);
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
        assert_eq!(body.len(), 5);
        assert!(stream.is_open());
    }

    #[test]
    fn closing_interrupts_reads_and_blocks_reattach() {
        let stream = TransferStream::new();
        stream.attach(Box::new(Cursor::new(vec![0_u8; 64]))).unwrap();
        let mut body = UploadBody::new(stream.clone(), 64);
        stream.close();
        assert!(!stream.is_open());

        let mut buf = [0_u8; 8];
        let err = body.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);

        let again = stream.attach(Box::new(Cursor::new(Vec::new())));
        assert!(again.is_err());
    }
}
