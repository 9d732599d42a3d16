use crate::db::{Database, StorageResult};
use std::time::Duration;

/// 附件统一放在这个容器下，按上传时间再分子目录。
pub const DEFAULT_CONTAINER: &str = "ThunderBird FileLink";

const OFFICIAL_DOMAIN: &str = "okeanos.grnet.gr";
const TRIAL_DOMAIN: &str = "okeanos.io";
const PITHOS_API: &str = "v1";
const ASTAKOS_AUTHENTICATE: &str = "im/authenticate";

const ACCOUNT_TYPE_KEY: &str = "accountType";
const MAX_FILE_SIZE_KEY: &str = "maxFileSize";
const CONTAINER_KEY: &str = "container";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// ~okeanos 部署类型：正式服务或试用服务，两者域名不同。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountType {
    Official,
    #[default]
    Trial,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Official => "official",
            AccountType::Trial => "trial",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "official" => Some(AccountType::Official),
            "trial" => Some(AccountType::Trial),
            _ => None,
        }
    }

    fn domain(self) -> &'static str {
        match self {
            AccountType::Official => OFFICIAL_DOMAIN,
            AccountType::Trial => TRIAL_DOMAIN,
        }
    }

    pub fn pithos_url(self) -> String {
        format!("https://pithos.{}", self.domain())
    }

    pub fn astakos_url(self) -> String {
        format!("https://accounts.{}", self.domain())
    }

    /// 账户面板地址，设置页里的 dashboard 链接。
    pub fn dashboard_url(self) -> String {
        format!("{}/im/profile", self.astakos_url())
    }
}

/// 单个账户的全部配置；在 provider 初始化时构造并传给各组件，不存在进程级全局。
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub account_key: String,
    pub account_type: AccountType,
    pub pithos_url: String,
    pub astakos_url: String,
    pub container: String,
    /// None 表示服务端没有单文件大小限制。
    pub max_file_size: Option<u64>,
    pub request_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl AccountConfig {
    pub fn new(account_key: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            account_key: account_key.into(),
            account_type,
            pithos_url: account_type.pithos_url(),
            astakos_url: account_type.astakos_url(),
            container: DEFAULT_CONTAINER.to_string(),
            max_file_size: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    /// 替换身份服务与存储服务的根地址，测试时指向本地桩服务。
    pub fn override_urls(&mut self, astakos_url: impl Into<String>, pithos_url: impl Into<String>) {
        self.astakos_url = astakos_url.into();
        self.pithos_url = pithos_url.into();
    }

    /// `https://pithos.<domain>/v1`
    pub fn pithos_api_base(&self) -> String {
        format!("{}/{PITHOS_API}", self.pithos_url.trim_end_matches('/'))
    }

    pub fn authenticate_url(&self) -> String {
        format!(
            "{}/{ASTAKOS_AUTHENTICATE}",
            self.astakos_url.trim_end_matches('/')
        )
    }

    pub fn dashboard_url(&self) -> String {
        self.account_type.dashboard_url()
    }

    /// 从设置表读取账户配置；缺失项使用默认值。
    pub fn load(db: &Database, account_key: &str) -> StorageResult<Self> {
        let account_type = db
            .get_setting(&setting_key(account_key, ACCOUNT_TYPE_KEY))?
            .and_then(|value| AccountType::parse(&value))
            .unwrap_or_default();
        let mut config = Self::new(account_key, account_type);
        if let Some(raw) = db.get_setting(&setting_key(account_key, MAX_FILE_SIZE_KEY))? {
            match raw.parse::<u64>() {
                Ok(limit) if limit > 0 => config.max_file_size = Some(limit),
                Ok(_) => {}
                Err(err) => log::warn!(
                    "ignoring invalid max file size {raw:?} for account {account_key}: {err}"
                ),
            }
        }
        if let Some(container) = db.get_setting(&setting_key(account_key, CONTAINER_KEY))? {
            if !container.trim().is_empty() {
                config.container = container;
            }
        }
        Ok(config)
    }

    pub fn save(&self, db: &Database) -> StorageResult<()> {
        db.set_setting(
            &setting_key(&self.account_key, ACCOUNT_TYPE_KEY),
            self.account_type.as_str(),
        )?;
        let size_key = setting_key(&self.account_key, MAX_FILE_SIZE_KEY);
        match self.max_file_size {
            Some(limit) => db.set_setting(&size_key, &limit.to_string())?,
            None => db.remove_setting(&size_key)?,
        }
        db.set_setting(
            &setting_key(&self.account_key, CONTAINER_KEY),
            &self.container,
        )
    }
}

fn setting_key(account_key: &str, name: &str) -> String {
    format!("mail.cloud_files.accounts.{account_key}.{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_selects_service_domains() {
        let official = AccountConfig::new("a1", AccountType::Official);
        assert_eq!(official.pithos_api_base(), "https://pithos.okeanos.grnet.gr/v1");
        assert_eq!(
            official.authenticate_url(),
            "https://accounts.okeanos.grnet.gr/im/authenticate"
        );
        assert_eq!(
            official.dashboard_url(),
            "https://accounts.okeanos.grnet.gr/im/profile"
        );

        let trial = AccountConfig::new("a2", AccountType::Trial);
        assert_eq!(trial.pithos_api_base(), "https://pithos.okeanos.io/v1");
        assert_eq!(trial.dashboard_url(), "https://accounts.okeanos.io/im/profile");
    }

    #[test]
    fn override_urls_tolerates_trailing_slash() {
        let mut config = AccountConfig::new("a1", AccountType::Trial);
        config.override_urls("http://127.0.0.1:9000/", "http://127.0.0.1:9001/");
        assert_eq!(config.pithos_api_base(), "http://127.0.0.1:9001/v1");
        assert_eq!(
            config.authenticate_url(),
            "http://127.0.0.1:9000/im/authenticate"
        );
    }

    #[test]
    fn config_round_trips_through_settings_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::at(dir.path().join("filelink.db"));

        let missing = AccountConfig::load(&db, "fresh").unwrap();
        assert_eq!(missing.account_type, AccountType::Trial);
        assert_eq!(missing.max_file_size, None);
        assert_eq!(missing.container, DEFAULT_CONTAINER);

        let mut config = AccountConfig::new("acct", AccountType::Official);
        config.max_file_size = Some(157_286_400);
        config.save(&db).unwrap();

        let loaded = AccountConfig::load(&db, "acct").unwrap();
        assert_eq!(loaded.account_type, AccountType::Official);
        assert_eq!(loaded.max_file_size, Some(157_286_400));

        config.max_file_size = None;
        config.save(&db).unwrap();
        assert_eq!(AccountConfig::load(&db, "acct").unwrap().max_file_size, None);
    }

    #[test]
    fn unknown_account_type_falls_back_to_trial() {
        assert_eq!(AccountType::parse("official"), Some(AccountType::Official));
        assert_eq!(AccountType::parse(" trial "), Some(AccountType::Trial));
        assert_eq!(AccountType::parse("enterprise"), None);
    }
}
