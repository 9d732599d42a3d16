use rusqlite::{params, OptionalExtension};

use super::{current_timestamp_millis, Database, StorageError, StorageResult};

/// 账户密钥表：按 (account_key, realm) 保存一条秘密值，目前只有 token 一种 realm。
pub(crate) const CREDENTIALS_TABLE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS credentials (
    account_key TEXT NOT NULL,
    realm TEXT NOT NULL,
    secret TEXT NOT NULL,
    updated_at_millis INTEGER NOT NULL,
    PRIMARY KEY (account_key, realm)
);";

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub account_key: String,
    pub realm: String,
    pub secret: String,
    pub updated_at_millis: i64,
}

impl Database {
    pub fn upsert_credential(&self, record: &CredentialRecord) -> StorageResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO credentials (account_key, realm, secret, updated_at_millis)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(account_key, realm) DO UPDATE SET
                    secret = excluded.secret,
                    updated_at_millis = excluded.updated_at_millis",
                params![
                    record.account_key,
                    record.realm,
                    record.secret,
                    record.updated_at_millis,
                ],
            )
            .map_err(|e| StorageError::sqlite("failed to upsert credential", e))?;
            Ok(())
        })
    }

    pub fn load_credential(
        &self,
        account_key: &str,
        realm: &str,
    ) -> StorageResult<Option<CredentialRecord>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT account_key, realm, secret, updated_at_millis
                FROM credentials
                WHERE account_key = ? AND realm = ?",
                params![account_key, realm],
                |row| {
                    Ok(CredentialRecord {
                        account_key: row.get(0)?,
                        realm: row.get(1)?,
                        secret: row.get(2)?,
                        updated_at_millis: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| {
                StorageError::sqlite(format!("failed to read credential for {account_key}"), e)
            })
        })
    }

    pub fn clear_credential(&self, account_key: &str, realm: &str) -> StorageResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "DELETE FROM credentials WHERE account_key = ? AND realm = ?",
                params![account_key, realm],
            )
            .map_err(|e| {
                StorageError::sqlite(format!("failed to clear credential for {account_key}"), e)
            })?;
            Ok(())
        })
    }
}

pub fn build_credential_record(account_key: &str, realm: &str, secret: &str) -> CredentialRecord {
    CredentialRecord {
        account_key: account_key.to_string(),
        realm: realm.to_string(),
        secret: secret.to_string(),
        updated_at_millis: current_timestamp_millis(),
    }
}
