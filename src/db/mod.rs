use directories::ProjectDirs;
use rusqlite::Connection;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

mod credentials;
mod settings;

pub use credentials::{build_credential_record, CredentialRecord};

const QUALIFIER: &str = "gr";
const ORGANIZATION: &str = "GRNET";
const APPLICATION: &str = "Okeanos FileLink";
const DB_FILE_NAME: &str = "filelink.db";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to resolve application data directory")]
    NoDataDir,

    #[error("failed to create database directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{context}: {source}")]
    Sqlite {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl StorageError {
    pub(crate) fn sqlite(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Sqlite {
            context: context.into(),
            source,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// 账户凭据与设置所在的 SQLite 文件。
/// 每次操作单独打开连接，调用方不需要管理连接生命周期。
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 平台数据目录下的默认数据库。
    pub fn default_location() -> StorageResult<Self> {
        let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .ok_or(StorageError::NoDataDir)?;
        Ok(Self::at(dirs.data_dir().join(DB_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn init(&self) -> StorageResult<()> {
        self.with_connection(|_| Ok(()))
    }

    pub(crate) fn with_connection<T, F>(&self, operation: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let conn = self.open_connection()?;
        operation(&conn)
    }

    fn open_connection(&self) -> StorageResult<Connection> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(&self.path)
            .map_err(|e| StorageError::sqlite("failed to open SQLite database", e))?;
        apply_migrations(&conn)?;
        Ok(conn)
    }
}

fn apply_migrations(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(credentials::CREDENTIALS_TABLE_SCHEMA)
        .map_err(|e| StorageError::sqlite("failed to initialize credentials schema", e))?;
    conn.execute_batch(settings::SETTINGS_TABLE_SCHEMA)
        .map_err(|e| StorageError::sqlite("failed to initialize settings schema", e))?;
    Ok(())
}

pub(crate) fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
