use crate::db::{build_credential_record, Database, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// 令牌在密钥库里的 realm。
pub const TOKEN_REALM: &str = "token";

/// 按账户保存令牌的能力，注入给 AuthSession，方便替换存储实现或编写单测。
pub trait CredentialStore: Send + Sync {
    fn get(&self, account_key: &str) -> StorageResult<Option<String>>;
    fn set(&self, account_key: &str, secret: &str) -> StorageResult<()>;
    fn clear(&self, account_key: &str) -> StorageResult<()>;
}

/// 默认的 SQLite 实现。
pub struct SqliteCredentialStore {
    db: Database,
}

impl SqliteCredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, account_key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .db
            .load_credential(account_key, TOKEN_REALM)?
            .map(|record| record.secret)
            .filter(|secret| !secret.is_empty()))
    }

    fn set(&self, account_key: &str, secret: &str) -> StorageResult<()> {
        if secret.is_empty() {
            return self.clear(account_key);
        }
        self.db
            .upsert_credential(&build_credential_record(account_key, TOKEN_REALM, secret))
    }

    fn clear(&self, account_key: &str) -> StorageResult<()> {
        self.db.clear_credential(account_key, TOKEN_REALM)
    }
}

/// 仅存在内存中的实现，进程退出即丢失。
#[derive(Default)]
pub struct MemoryCredentialStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(account_key: &str, token: &str) -> Self {
        let store = Self::new();
        store
            .secrets
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(account_key.to_string(), token.to_string());
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, account_key: &str) -> StorageResult<Option<String>> {
        let secrets = self.secrets.lock().unwrap_or_else(|p| p.into_inner());
        Ok(secrets
            .get(account_key)
            .filter(|secret| !secret.is_empty())
            .cloned())
    }

    fn set(&self, account_key: &str, secret: &str) -> StorageResult<()> {
        let mut secrets = self.secrets.lock().unwrap_or_else(|p| p.into_inner());
        secrets.insert(account_key.to_string(), secret.to_string());
        Ok(())
    }

    fn clear(&self, account_key: &str) -> StorageResult<()> {
        let mut secrets = self.secrets.lock().unwrap_or_else(|p| p.into_inner());
        secrets.remove(account_key);
        Ok(())
    }
}
