use super::pipeline::Pipeline;
use super::recover_lock;
use super::request::{FileHandle, RequestObserver, RequestState, UploadRequest};
use super::session::Session;
use crate::api::{ObjectPath, ObjectStoreClient, TransferStream};
use crate::auth::AuthSession;
use crate::error::{ProviderError, ProviderResult, RequestStatus};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread;

const UPLOAD_THREAD_NAME: &str = "filelink-upload";
const ACCOUNT_THREAD_NAME: &str = "filelink-account";

/// 单账户的上传队列：同一时刻最多一个上传在进行，其余按 FIFO 排队，
/// 每个请求的观察者恰好收到一次终态通知。
#[derive(Clone)]
pub struct UploadQueue {
    state: Arc<Mutex<QueueState>>,
    session: Arc<Session>,
    auth: Arc<dyn AuthSession>,
    store: Arc<dyn ObjectStoreClient>,
}

#[derive(Default)]
struct QueueState {
    active: Option<ActiveUpload>,
    /// 已取消、但工作线程还没退出的请求 id。它退出前不启动下一个请求，
    /// 保证同一会话最多只有一个远端调用在进行。
    draining: Option<String>,
    pending: VecDeque<UploadRequest>,
}

struct ActiveUpload {
    request: UploadRequest,
    cancel_flag: Arc<AtomicBool>,
    stream: TransferStream,
}

/// 启动一个刚被激活的请求所需的全部信息，在锁外使用。
struct Launch {
    id: String,
    file: FileHandle,
    observer: Arc<dyn RequestObserver>,
    cancel_flag: Arc<AtomicBool>,
    stream: TransferStream,
}

/// 队列的只读视图。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub active: Option<PathBuf>,
    pub draining: bool,
    pub pending: Vec<PathBuf>,
}

impl QueueState {
    /// 把请求设为活动请求；调用方必须确认当前没有活动请求。
    fn activate(&mut self, mut request: UploadRequest) -> Launch {
        request.transition(RequestState::Active);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let stream = TransferStream::new();
        let launch = Launch {
            id: request.id.clone(),
            file: request.file.clone(),
            observer: request.observer.clone(),
            cancel_flag: cancel_flag.clone(),
            stream: stream.clone(),
        };
        self.active = Some(ActiveUpload {
            request,
            cancel_flag,
            stream,
        });
        launch
    }

    fn promote_next(&mut self) -> Option<Launch> {
        if self.active.is_some() || self.draining.is_some() {
            return None;
        }
        let next = self.pending.pop_front()?;
        Some(self.activate(next))
    }
}

impl UploadQueue {
    pub fn new(
        session: Arc<Session>,
        auth: Arc<dyn AuthSession>,
        store: Arc<dyn ObjectStoreClient>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            session,
            auth,
            store,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn enqueue(
        &self,
        file: FileHandle,
        observer: Arc<dyn RequestObserver>,
    ) -> ProviderResult<()> {
        if self.session.is_offline() {
            return Err(ProviderError::Offline);
        }
        let request = UploadRequest::new(file, observer);
        log::info!(
            "enqueue upload {} for {}",
            request.id,
            request.file.path().display()
        );

        let mut state = recover_lock(&self.state);
        state.pending.push_back(request);
        let launch = state.promote_next();
        drop(state);

        if let Some(launch) = launch {
            self.launch(launch);
        }
        Ok(())
    }

    /// 通知观察者开始，然后在独立线程上跑流水线。
    fn launch(&self, launch: Launch) {
        let Launch {
            id,
            file,
            observer,
            cancel_flag,
            stream,
        } = launch;
        observer.on_start_request();

        let queue = self.clone();
        let worker_id = id.clone();
        let spawned = thread::Builder::new()
            .name(UPLOAD_THREAD_NAME.to_string())
            .spawn(move || queue.run_pipeline(worker_id, file, cancel_flag, stream));
        if let Err(err) = spawned {
            log::error!("failed to start upload worker for request {id}: {err}");
            self.session
                .record_error(format!("failed to start upload worker: {err}"));
            self.complete(&id, RequestStatus::Failure);
        }
    }

    fn run_pipeline(
        &self,
        id: String,
        file: FileHandle,
        cancel_flag: Arc<AtomicBool>,
        stream: TransferStream,
    ) {
        let mut pipeline = Pipeline::upload(
            &self.session,
            self.auth.as_ref(),
            self.store.as_ref(),
            &file,
            stream,
            &cancel_flag,
        );
        let status = pipeline.run().unwrap_or(RequestStatus::Canceled);
        self.complete(&id, status);
    }

    /// 终态处理。只有当 `id` 仍是活动请求时才通知观察者；
    /// 已被取消的请求在这里结束排空，队列随后继续。
    pub(crate) fn complete(&self, id: &str, status: RequestStatus) {
        let mut state = recover_lock(&self.state);
        if state.draining.as_deref() == Some(id) {
            state.draining = None;
            let next = state.promote_next();
            drop(state);
            log::debug!("canceled upload {id} has drained ({status:?} dropped)");
            if let Some(next) = next {
                self.launch(next);
            }
            return;
        }

        let is_active = state
            .active
            .as_ref()
            .is_some_and(|active| active.request.id == id);
        if !is_active {
            drop(state);
            log::debug!("ignoring late completion {status:?} for request {id}");
            return;
        }
        let Some(mut finished) = state.active.take() else {
            return;
        };
        finished.request.transition(RequestState::Completed);
        let next = state.promote_next();
        drop(state);

        finished.stream.close();
        log::info!(
            "upload {} of {} finished with {status:?}",
            finished.request.id,
            finished.request.file.path().display()
        );
        finished.request.observer.on_stop_request(status);

        if let Some(next) = next {
            self.launch(next);
        }
    }

    /// 取消指定文件的上传。返回是否找到了匹配的请求。
    pub fn cancel(&self, path: &Path) -> bool {
        let mut state = recover_lock(&self.state);

        let active_matches = state
            .active
            .as_ref()
            .is_some_and(|active| active.request.matches(path));
        if active_matches {
            let Some(mut canceled) = state.active.take() else {
                return false;
            };
            canceled.request.transition(RequestState::Canceled);
            state.draining = Some(canceled.request.id.clone());
            drop(state);

            log::info!(
                "canceling active upload {} of {}",
                canceled.request.id,
                path.display()
            );
            canceled.cancel_flag.store(true, Ordering::SeqCst);
            canceled.stream.close();
            canceled
                .request
                .observer
                .on_stop_request(RequestStatus::Canceled);
            return true;
        }

        let position = state.pending.iter().position(|req| req.matches(path));
        let removed = position.and_then(|pos| state.pending.remove(pos));
        drop(state);

        match removed {
            Some(mut request) => {
                request.transition(RequestState::Canceled);
                log::info!(
                    "canceling queued upload {} of {}",
                    request.id,
                    path.display()
                );
                request.observer.on_stop_request(RequestStatus::Canceled);
                true
            }
            None => {
                log::debug!("cancel requested for {} but nothing matched", path.display());
                false
            }
        }
    }

    pub fn url_for(&self, path: &Path) -> Option<String> {
        self.session.share_url(path)
    }

    /// 删除已上传的对象。前置条件不满足时同步返回错误，
    /// 其余结果通过观察者报告；不经过上传队列。
    pub fn delete(&self, path: &Path, observer: Arc<dyn RequestObserver>) -> ProviderResult<()> {
        if self.session.is_offline() {
            return Err(ProviderError::Offline);
        }
        let Some(object_path) = self.session.upload_path(path) else {
            return Err(ProviderError::NotFound(path.to_path_buf()));
        };

        let queue = self.clone();
        let file = path.to_path_buf();
        thread::Builder::new()
            .name(ACCOUNT_THREAD_NAME.to_string())
            .spawn(move || {
                observer.on_start_request();
                let status = queue.delete_remote(&file, &object_path);
                observer.on_stop_request(status);
            })?;
        Ok(())
    }

    fn delete_remote(&self, file: &Path, object_path: &ObjectPath) -> RequestStatus {
        let token = match self.auth.current_token() {
            Some(token) => token,
            None => match self.auth.login(false) {
                Ok(token) => token,
                Err(err) => {
                    log::warn!("delete of {} needs a login: {err}", file.display());
                    self.session.record_error(err.to_string());
                    return RequestStatus::AuthError;
                }
            },
        };

        if let Err(err) = self.store.delete_object(&token, object_path) {
            log::warn!("delete of {} failed: {err}", object_path.key);
            let message = match err.response_body() {
                Some(body) if !body.is_empty() => body.to_string(),
                _ => err.to_string(),
            };
            self.session.record_error(message);
            return RequestStatus::UploadError;
        }

        if let Some(folder) = object_path.parent() {
            if let Err(err) = self.store.delete_object(&token, &folder) {
                log::debug!("leaving folder {} in place: {err}", folder.key);
            }
        }
        self.session.forget_upload(file);
        log::info!("deleted remote copy of {}", file.display());
        RequestStatus::Ok
    }

    /// 刷新账户信息，走与上传相同的登录和重试流程。
    pub fn refresh_account(
        &self,
        with_ui: bool,
        observer: Arc<dyn RequestObserver>,
    ) -> ProviderResult<()> {
        if self.session.is_offline() {
            return Err(ProviderError::Offline);
        }
        let queue = self.clone();
        thread::Builder::new()
            .name(ACCOUNT_THREAD_NAME.to_string())
            .spawn(move || {
                observer.on_start_request();
                let mut pipeline = Pipeline::account_refresh(
                    &queue.session,
                    queue.auth.as_ref(),
                    queue.store.as_ref(),
                    with_ui,
                );
                let status = pipeline.run().unwrap_or(RequestStatus::Canceled);
                observer.on_stop_request(status);
            })?;
        Ok(())
    }

    /// 用已有凭据登录（必要时弹出令牌输入）。
    pub fn login(&self, observer: Arc<dyn RequestObserver>) -> ProviderResult<()> {
        let queue = self.clone();
        thread::Builder::new()
            .name(ACCOUNT_THREAD_NAME.to_string())
            .spawn(move || {
                observer.on_start_request();
                let status = match queue.auth.login(true) {
                    Ok(token) => {
                        log::info!("account ready for user {}", token.user);
                        RequestStatus::Ok
                    }
                    Err(err) => {
                        queue.session.record_error(err.to_string());
                        RequestStatus::AuthError
                    }
                };
                observer.on_stop_request(status);
            })?;
        Ok(())
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = recover_lock(&self.state);
        QueueSnapshot {
            active: state
                .active
                .as_ref()
                .map(|active| active.request.file.path().to_path_buf()),
            draining: state.draining.is_some(),
            pending: state
                .pending
                .iter()
                .map(|request| request.file.path().to_path_buf())
                .collect(),
        }
    }

    pub fn is_idle(&self) -> bool {
        let state = recover_lock(&self.state);
        state.active.is_none() && state.draining.is_none() && state.pending.is_empty()
    }
}
