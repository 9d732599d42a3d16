use super::request::FileHandle;
use super::session::Session;
use crate::api::{ObjectPath, ObjectStoreClient, TransferStream, UploadBody};
use crate::auth::{AuthSession, AuthToken};
use crate::error::{ApiError, ProviderError, RequestStatus};
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};

/// 账户刷新不可取消。
static NOT_CANCELABLE: AtomicBool = AtomicBool::new(false);

/// 流水线所处阶段。每个阶段只做一次远端调用（或一次本地检查），
/// 由 [`Pipeline::step`] 决定下一个阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Authenticating,
    /// `retried` 表示已经因为令牌失效重新登录过一次。
    FetchingAccountInfo { retried: bool },
    CheckingLimits,
    PreparingContainer,
    Transferring,
    Publishing,
    ResolvingUrl,
    Done(RequestStatus),
}

enum Goal<'a> {
    Upload {
        file: &'a FileHandle,
        stream: TransferStream,
    },
    /// 只刷新账户信息（refreshUserInfo）。
    AccountInfo,
}

pub(crate) struct Pipeline<'a> {
    session: &'a Session,
    auth: &'a dyn AuthSession,
    store: &'a dyn ObjectStoreClient,
    goal: Goal<'a>,
    canceled: &'a AtomicBool,
    with_ui: bool,
    token: Option<AuthToken>,
    object_path: Option<ObjectPath>,
}

impl<'a> Pipeline<'a> {
    pub fn upload(
        session: &'a Session,
        auth: &'a dyn AuthSession,
        store: &'a dyn ObjectStoreClient,
        file: &'a FileHandle,
        stream: TransferStream,
        canceled: &'a AtomicBool,
    ) -> Self {
        Self {
            session,
            auth,
            store,
            goal: Goal::Upload { file, stream },
            canceled,
            with_ui: true,
            token: None,
            object_path: None,
        }
    }

    pub fn account_refresh(
        session: &'a Session,
        auth: &'a dyn AuthSession,
        store: &'a dyn ObjectStoreClient,
        with_ui: bool,
    ) -> Self {
        Self {
            session,
            auth,
            store,
            goal: Goal::AccountInfo,
            canceled: &NOT_CANCELABLE,
            with_ui,
            token: None,
            object_path: None,
        }
    }

    /// 一直推进到终态；取消标志置位后在阶段边界停下并返回 None，
    /// 此时取消方已经负责通知观察者。
    pub fn run(&mut self) -> Option<RequestStatus> {
        let mut phase = Phase::Idle;
        loop {
            if self.is_canceled() {
                log::info!("pipeline stopped before {phase:?}: request was canceled");
                return None;
            }
            phase = self.step(phase);
            if let Phase::Done(status) = phase {
                if self.is_canceled() {
                    log::debug!("dropping {status:?} of a canceled request");
                    return None;
                }
                return Some(status);
            }
        }
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// 状态转移函数。
    pub fn step(&mut self, phase: Phase) -> Phase {
        match phase {
            Phase::Idle => self.start(),
            Phase::Authenticating => self.authenticate(),
            Phase::FetchingAccountInfo { retried } => self.fetch_account_info(retried),
            Phase::CheckingLimits => self.check_limits(),
            Phase::PreparingContainer => self.prepare_container(),
            Phase::Transferring => self.transfer(),
            Phase::Publishing => self.publish(),
            Phase::ResolvingUrl => self.resolve_url(),
            done @ Phase::Done(_) => done,
        }
    }

    fn start(&mut self) -> Phase {
        self.token = self.auth.current_token();
        match (&self.token, &self.goal) {
            (None, _) => Phase::Authenticating,
            (Some(_), Goal::AccountInfo) if !self.session.account_info_stale() => {
                Phase::Done(RequestStatus::Ok)
            }
            (Some(_), _) => Phase::FetchingAccountInfo { retried: false },
        }
    }

    fn authenticate(&mut self) -> Phase {
        match self.auth.login(self.with_ui) {
            Ok(token) => {
                self.token = Some(token);
                Phase::FetchingAccountInfo { retried: false }
            }
            Err(err) => self.fail(RequestStatus::AuthError, &err),
        }
    }

    fn fetch_account_info(&mut self, retried: bool) -> Phase {
        let after = match self.goal {
            Goal::Upload { .. } => Phase::CheckingLimits,
            Goal::AccountInfo => Phase::Done(RequestStatus::Ok),
        };
        if matches!(self.goal, Goal::Upload { .. }) && !self.session.account_info_stale() {
            return after;
        }
        let Some(token) = self.token.clone() else {
            return Phase::Authenticating;
        };

        match self.store.head_account(&token) {
            Ok(info) => {
                log::info!(
                    "available storage for {} = {} bytes",
                    token.user,
                    info.available()
                );
                self.session.record_account_info(info);
                after
            }
            Err(err) if err.is_rejection() && !retried => {
                log::info!("account query rejected ({err}); token has gone stale, logging in again");
                self.auth.invalidate();
                self.token = None;
                match self.auth.login(self.with_ui) {
                    Ok(fresh) => {
                        self.token = Some(fresh);
                        Phase::FetchingAccountInfo { retried: true }
                    }
                    Err(login_err) => self.fail(RequestStatus::AuthError, &login_err),
                }
            }
            Err(err) => self.fail_remote(RequestStatus::AuthError, &err),
        }
    }

    fn check_limits(&mut self) -> Phase {
        let Goal::Upload { file, .. } = &self.goal else {
            return Phase::Done(RequestStatus::Ok);
        };
        let size = file.size();

        if let Some(limit) = self.session.config().max_file_size {
            if size > limit {
                let err = ProviderError::ExceedsFileLimit {
                    path: file.path().to_path_buf(),
                    size,
                    limit,
                };
                return self.fail(RequestStatus::ExceedsFileLimit, &err);
            }
        }
        let available = self.session.quota().available().unwrap_or(0);
        if size > available {
            let err = ProviderError::ExceedsQuota { size, available };
            return self.fail(RequestStatus::ExceedsQuota, &err);
        }

        // 本次上传会改变用量，下一次上传前必须重新查询
        self.session.mark_account_info_stale();
        Phase::PreparingContainer
    }

    fn prepare_container(&mut self) -> Phase {
        let Goal::Upload { file, .. } = &self.goal else {
            return Phase::Done(RequestStatus::Ok);
        };
        let Some(token) = self.token.as_ref() else {
            return Phase::Authenticating;
        };
        let container = &self.session.config().container;

        if let Err(err) = self.store.ensure_container(token, container) {
            log::error!("preparing container {container:?} failed: {err}");
            return self.fail_remote(RequestStatus::UploadError, &err);
        }
        // 已取消的请求不再留下任何记录
        if self.is_canceled() {
            return Phase::Done(RequestStatus::Canceled);
        }

        let object_path =
            ObjectPath::for_upload(container, Local::now().naive_local(), &file.leaf_name());
        self.session.record_upload_path(file.path(), object_path.clone());
        self.object_path = Some(object_path);
        Phase::Transferring
    }

    fn transfer(&mut self) -> Phase {
        let Goal::Upload { file, stream } = &self.goal else {
            return Phase::Done(RequestStatus::Ok);
        };
        let (Some(token), Some(object_path)) = (self.token.as_ref(), self.object_path.as_ref())
        else {
            return Phase::Done(RequestStatus::UploadError);
        };

        let opened = file
            .open_stream()
            .and_then(|handle| stream.attach(Box::new(handle)));
        if let Err(err) = opened {
            stream.close();
            let err = ProviderError::Io(err);
            return self.fail(RequestStatus::UploadError, &err);
        }

        let body = UploadBody::new(stream.clone(), file.size());
        let result = self
            .store
            .put_object(token, object_path, body, file.content_type());
        stream.close();

        match result {
            Ok(()) => Phase::Publishing,
            Err(err) => {
                log::error!("transfer of {} failed: {err}", file.path().display());
                self.fail_remote(RequestStatus::UploadError, &err)
            }
        }
    }

    fn publish(&mut self) -> Phase {
        let (Some(token), Some(object_path)) = (self.token.as_ref(), self.object_path.as_ref())
        else {
            return Phase::Done(RequestStatus::UploadError);
        };
        log::info!("making {} public", object_path.key);
        match self.store.set_public(token, object_path) {
            Ok(()) => Phase::ResolvingUrl,
            Err(err) => self.fail_remote(RequestStatus::UploadError, &err),
        }
    }

    fn resolve_url(&mut self) -> Phase {
        let Goal::Upload { file, .. } = &self.goal else {
            return Phase::Done(RequestStatus::Ok);
        };
        let (Some(token), Some(object_path)) = (self.token.as_ref(), self.object_path.as_ref())
        else {
            return Phase::Done(RequestStatus::UploadError);
        };
        match self.store.get_public_url(token, object_path) {
            Ok(_) if self.is_canceled() => Phase::Done(RequestStatus::Canceled),
            Ok(url) => {
                log::info!("{} is shared at {url}", file.path().display());
                self.session.record_share_url(file.path(), url);
                Phase::Done(RequestStatus::Ok)
            }
            Err(err) => self.fail_remote(RequestStatus::UploadError, &err),
        }
    }

    fn fail(&self, status: RequestStatus, err: &ProviderError) -> Phase {
        log::warn!("request failed with {status:?}: {err}");
        if self.is_canceled() {
            return Phase::Done(RequestStatus::Canceled);
        }
        self.session.record_error(err.to_string());
        Phase::Done(status)
    }

    /// 服务端的拒绝以响应体作为 last error 文本。
    fn fail_remote(&self, status: RequestStatus, err: &ApiError) -> Phase {
        log::warn!("remote call failed with {status:?}: {err}");
        if self.is_canceled() {
            return Phase::Done(RequestStatus::Canceled);
        }
        let message = match err.response_body() {
            Some(body) if !body.is_empty() => body.to_string(),
            _ => err.to_string(),
        };
        self.session.record_error(message);
        Phase::Done(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AccountInfo;
    use crate::error::{ApiResult, ProviderResult};
    use crate::settings::{AccountConfig, AccountType};
    use std::sync::Mutex;

    struct StaticAuth(Mutex<Option<AuthToken>>);

    impl AuthSession for StaticAuth {
        fn login(&self, _with_ui: bool) -> ProviderResult<AuthToken> {
            let token = AuthToken {
                token: "t".into(),
                user: "u".into(),
            };
            *self.0.lock().unwrap() = Some(token.clone());
            Ok(token)
        }

        fn current_token(&self) -> Option<AuthToken> {
            self.0.lock().unwrap().clone()
        }

        fn invalidate(&self) {
            *self.0.lock().unwrap() = None;
        }
    }

    struct QuotaOnly(AccountInfo);

    impl ObjectStoreClient for QuotaOnly {
        fn head_account(&self, _token: &AuthToken) -> ApiResult<AccountInfo> {
            Ok(self.0)
        }
        fn ensure_container(&self, _token: &AuthToken, _container: &str) -> ApiResult<()> {
            Ok(())
        }
        fn put_object(
            &self,
            _token: &AuthToken,
            _path: &ObjectPath,
            _body: UploadBody,
            _content_type: &str,
        ) -> ApiResult<()> {
            Ok(())
        }
        fn set_public(&self, _token: &AuthToken, _path: &ObjectPath) -> ApiResult<()> {
            Ok(())
        }
        fn get_public_url(&self, _token: &AuthToken, path: &ObjectPath) -> ApiResult<String> {
            Ok(format!("https://pithos.test/public/{}", path.file_name()))
        }
        fn delete_object(&self, _token: &AuthToken, _path: &ObjectPath) -> ApiResult<()> {
            Ok(())
        }
    }

    fn session() -> Session {
        Session::new(AccountConfig::new("a", AccountType::Trial))
    }

    #[test]
    fn upload_walks_every_phase_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        std::fs::write(&path, b"twelve bytes").unwrap();
        let file = FileHandle::open(&path).unwrap();

        let session = session();
        let auth = StaticAuth(Mutex::new(None));
        let store = QuotaOnly(AccountInfo {
            bytes_used: 0,
            quota: 100,
        });
        let canceled = AtomicBool::new(false);
        let mut pipeline = Pipeline::upload(
            &session,
            &auth,
            &store,
            &file,
            TransferStream::new(),
            &canceled,
        );

        let mut phase = Phase::Idle;
        let mut seen = vec![phase];
        while !matches!(phase, Phase::Done(_)) {
            phase = pipeline.step(phase);
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                Phase::Idle,
                Phase::Authenticating,
                Phase::FetchingAccountInfo { retried: false },
                Phase::CheckingLimits,
                Phase::PreparingContainer,
                Phase::Transferring,
                Phase::Publishing,
                Phase::ResolvingUrl,
                Phase::Done(RequestStatus::Ok),
            ]
        );
        assert_eq!(
            session.share_url(&path).as_deref(),
            Some("https://pithos.test/public/memo.txt")
        );
        assert!(session.account_info_stale());
    }

    #[test]
    fn quota_check_stops_before_container() {
        let session = session();
        session.record_account_info(AccountInfo {
            bytes_used: 500_000,
            quota: 1_000_000,
        });
        let auth = StaticAuth(Mutex::new(None));
        let store = QuotaOnly(AccountInfo {
            bytes_used: 0,
            quota: 0,
        });
        let file = FileHandle::new("/tmp/video.mp4", 600_000);
        let canceled = AtomicBool::new(false);
        let mut pipeline = Pipeline::upload(
            &session,
            &auth,
            &store,
            &file,
            TransferStream::new(),
            &canceled,
        );

        assert_eq!(
            pipeline.step(Phase::CheckingLimits),
            Phase::Done(RequestStatus::ExceedsQuota)
        );
        assert!(session.last_error().is_some());
    }

    #[test]
    fn account_refresh_with_fresh_info_finishes_immediately() {
        let session = session();
        session.record_account_info(AccountInfo {
            bytes_used: 1,
            quota: 2,
        });
        let auth = StaticAuth(Mutex::new(Some(AuthToken {
            token: "t".into(),
            user: "u".into(),
        })));
        let store = QuotaOnly(AccountInfo {
            bytes_used: 0,
            quota: 0,
        });
        let mut pipeline = Pipeline::account_refresh(&session, &auth, &store, false);
        assert_eq!(pipeline.step(Phase::Idle), Phase::Done(RequestStatus::Ok));
    }

    #[test]
    fn canceled_flag_stops_before_the_first_phase() {
        let session = session();
        let auth = StaticAuth(Mutex::new(None));
        let store = QuotaOnly(AccountInfo {
            bytes_used: 0,
            quota: 0,
        });
        let file = FileHandle::new("/tmp/a.txt", 1);
        let canceled = AtomicBool::new(true);
        let mut pipeline = Pipeline::upload(
            &session,
            &auth,
            &store,
            &file,
            TransferStream::new(),
            &canceled,
        );
        assert_eq!(pipeline.run(), None);
        assert!(auth.current_token().is_none());
    }

    #[test]
    fn canceled_request_leaves_no_upload_path_or_share_url() {
        let session = session();
        let auth = StaticAuth(Mutex::new(None));
        let store = QuotaOnly(AccountInfo {
            bytes_used: 0,
            quota: 0,
        });
        let file = FileHandle::new("/tmp/late.txt", 1);
        let canceled = AtomicBool::new(false);
        let mut pipeline = Pipeline::upload(
            &session,
            &auth,
            &store,
            &file,
            TransferStream::new(),
            &canceled,
        );
        assert_eq!(pipeline.step(Phase::Idle), Phase::Authenticating);
        assert_eq!(
            pipeline.step(Phase::Authenticating),
            Phase::FetchingAccountInfo { retried: false }
        );

        // 容器请求返回之前被取消
        canceled.store(true, Ordering::SeqCst);
        assert_eq!(
            pipeline.step(Phase::PreparingContainer),
            Phase::Done(RequestStatus::Canceled)
        );
        assert!(session.upload_path(file.path()).is_none());

        pipeline.object_path = Some(ObjectPath::new("c", "d/late.txt"));
        assert_eq!(
            pipeline.step(Phase::ResolvingUrl),
            Phase::Done(RequestStatus::Canceled)
        );
        assert!(session.share_url(file.path()).is_none());
        assert!(session.last_error().is_none());
    }
}
