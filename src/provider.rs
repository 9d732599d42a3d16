use crate::api::{ObjectStoreClient, PithosClient};
use crate::auth::{AstakosSession, AuthSession, CredentialStore, SqliteCredentialStore, TokenPrompter};
use crate::db::Database;
use crate::error::{ProviderError, ProviderResult};
use crate::settings::AccountConfig;
use crate::upload_manager::{FileHandle, RequestObserver, Session, UploadQueue};
use std::path::Path;
use std::sync::Arc;

/// 宿主看到的 FileLink provider：一个账户一个实例。
pub struct FileLinkProvider {
    queue: UploadQueue,
    session: Arc<Session>,
}

impl FileLinkProvider {
    /// 用任意的认证与存储实现组装，测试里传入假的协作者。
    pub fn new(
        config: AccountConfig,
        auth: Arc<dyn AuthSession>,
        store: Arc<dyn ObjectStoreClient>,
    ) -> Self {
        let session = Arc::new(Session::new(config));
        let queue = UploadQueue::new(session.clone(), auth, store);
        Self { queue, session }
    }

    /// 连到真实的 Astakos / Pithos+ 服务。
    pub fn okeanos(
        config: AccountConfig,
        credentials: Arc<dyn CredentialStore>,
        prompter: Arc<dyn TokenPrompter>,
    ) -> ProviderResult<Self> {
        let auth = AstakosSession::new(&config, credentials, prompter)?;
        let store = PithosClient::new(&config)?;
        Ok(Self::new(config, Arc::new(auth), Arc::new(store)))
    }

    /// 从本地数据库读取账户配置和令牌，对应宿主的 init(accountKey)。
    pub fn init(
        db: &Database,
        account_key: &str,
        prompter: Arc<dyn TokenPrompter>,
    ) -> ProviderResult<Self> {
        db.init()?;
        let config = AccountConfig::load(db, account_key)?;
        log::info!(
            "initialising {} account {account_key}",
            config.account_type.as_str()
        );
        let credentials = Arc::new(SqliteCredentialStore::new(db.clone()));
        Self::okeanos(config, credentials, prompter)
    }

    pub fn account_key(&self) -> &str {
        &self.session.config().account_key
    }

    pub fn upload_file(
        &self,
        path: impl AsRef<Path>,
        observer: Arc<dyn RequestObserver>,
    ) -> ProviderResult<()> {
        if self.session.is_offline() {
            return Err(ProviderError::Offline);
        }
        let file = FileHandle::open(path.as_ref())?;
        self.queue.enqueue(file, observer)
    }

    /// 没有匹配的上传时什么也不做。
    pub fn cancel_file_upload(&self, path: impl AsRef<Path>) -> ProviderResult<()> {
        let path = path.as_ref();
        if !self.queue.cancel(path) {
            log::debug!("nothing to cancel for {}", path.display());
        }
        Ok(())
    }

    pub fn url_for_file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.queue.url_for(path.as_ref())
    }

    pub fn delete_file(
        &self,
        path: impl AsRef<Path>,
        observer: Arc<dyn RequestObserver>,
    ) -> ProviderResult<()> {
        self.queue.delete(path.as_ref(), observer)
    }

    pub fn refresh_user_info(
        &self,
        with_ui: bool,
        observer: Arc<dyn RequestObserver>,
    ) -> ProviderResult<()> {
        self.queue.refresh_account(with_ui, observer)
    }

    pub fn create_existing_account(&self, observer: Arc<dyn RequestObserver>) -> ProviderResult<()> {
        self.queue.login(observer)
    }

    pub fn set_offline(&self, offline: bool) {
        log::info!("account {} offline = {offline}", self.account_key());
        self.session.set_offline(offline);
    }

    pub fn is_offline(&self) -> bool {
        self.session.is_offline()
    }

    pub fn file_upload_size_limit(&self) -> Option<u64> {
        self.session.config().max_file_size
    }

    /// 第一次查询账户信息之前未知。
    pub fn remaining_file_space(&self) -> Option<u64> {
        self.session.quota().available()
    }

    pub fn file_space_used(&self) -> Option<u64> {
        self.session.quota().used()
    }

    pub fn last_error(&self) -> Option<String> {
        self.session.last_error()
    }

    pub fn dashboard_url(&self) -> String {
        self.session.config().dashboard_url()
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }
}
