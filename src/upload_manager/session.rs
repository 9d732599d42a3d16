use crate::api::{AccountInfo, ObjectPath};
use crate::settings::AccountConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::recover_lock;

/// 最近一次账户查询的结果；`fresh` 为 false 时下一次上传前必须重新查询。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub info: Option<AccountInfo>,
    pub fresh: bool,
}

impl QuotaSnapshot {
    pub fn used(&self) -> Option<u64> {
        self.info.map(|info| info.bytes_used)
    }

    pub fn available(&self) -> Option<u64> {
        self.info.map(|info| info.available())
    }
}

/// 单个账户的运行期状态，在 provider 初始化时创建，仅保存在内存中。
pub struct Session {
    config: AccountConfig,
    offline: AtomicBool,
    quota: Mutex<QuotaSnapshot>,
    share_urls: Mutex<HashMap<PathBuf, String>>,
    upload_paths: Mutex<HashMap<PathBuf, ObjectPath>>,
    last_error: Mutex<Option<String>>,
}

impl Session {
    pub fn new(config: AccountConfig) -> Self {
        Self {
            config,
            offline: AtomicBool::new(false),
            quota: Mutex::new(QuotaSnapshot::default()),
            share_urls: Mutex::new(HashMap::new()),
            upload_paths: Mutex::new(HashMap::new()),
            last_error: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn quota(&self) -> QuotaSnapshot {
        *recover_lock(&self.quota)
    }

    pub fn account_info_stale(&self) -> bool {
        !recover_lock(&self.quota).fresh
    }

    pub fn record_account_info(&self, info: AccountInfo) {
        *recover_lock(&self.quota) = QuotaSnapshot {
            info: Some(info),
            fresh: true,
        };
    }

    /// 保留旧数值用于展示，但强制下一次上传前重新查询。
    pub fn mark_account_info_stale(&self) {
        recover_lock(&self.quota).fresh = false;
    }

    pub fn share_url(&self, path: &Path) -> Option<String> {
        recover_lock(&self.share_urls).get(path).cloned()
    }

    pub fn record_share_url(&self, path: &Path, url: String) {
        recover_lock(&self.share_urls).insert(path.to_path_buf(), url);
    }

    pub fn upload_path(&self, path: &Path) -> Option<ObjectPath> {
        recover_lock(&self.upload_paths).get(path).cloned()
    }

    pub fn record_upload_path(&self, path: &Path, object: ObjectPath) {
        recover_lock(&self.upload_paths).insert(path.to_path_buf(), object);
    }

    /// 远端对象删除后清掉对应记录。
    pub fn forget_upload(&self, path: &Path) {
        recover_lock(&self.upload_paths).remove(path);
        recover_lock(&self.share_urls).remove(path);
    }

    pub fn last_error(&self) -> Option<String> {
        recover_lock(&self.last_error).clone()
    }

    pub fn record_error(&self, message: impl Into<String>) {
        *recover_lock(&self.last_error) = Some(message.into());
    }
}
