use super::credentials::CredentialStore;
use crate::api::{build_blocking_client, send_checked, AUTH_TOKEN_HEADER};
use crate::error::{ApiError, ApiResult, ProviderError, ProviderResult};
use crate::settings::{AccountConfig, AccountType};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex};

/// 登录成功后得到的凭据：令牌本身，加上存储路径里使用的用户标识（uuid）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub user: String,
}

/// 按需提供有效令牌；令牌过期时可以强制重新认证。
pub trait AuthSession: Send + Sync {
    /// `with_ui` 为 false 时，缺少令牌就直接失败，不弹出输入框。
    fn login(&self, with_ui: bool) -> ProviderResult<AuthToken>;
    fn current_token(&self) -> Option<AuthToken>;
    /// 丢弃缓存的令牌（包括密钥库里的副本），下一次调用必须重新登录。
    fn invalidate(&self);
}

/// 向用户索取令牌的能力，界面由宿主实现。
pub trait TokenPrompter: Send + Sync {
    fn prompt_token(&self, account_key: &str, account_type: AccountType) -> Option<String>;
}

/// 不弹任何界面。
pub struct NoPrompt;

impl TokenPrompter for NoPrompt {
    fn prompt_token(&self, _account_key: &str, _account_type: AccountType) -> Option<String> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct AuthenticateResponse {
    uuid: Option<String>,
    /// 旧版正式服务只返回 `uniq`。
    uniq: Option<String>,
}

/// 基于 Astakos `/im/authenticate` 的登录实现。
pub struct AstakosSession {
    account_key: String,
    account_type: AccountType,
    authenticate_url: String,
    credentials: Arc<dyn CredentialStore>,
    prompter: Arc<dyn TokenPrompter>,
    client: Client,
    current: Mutex<Option<AuthToken>>,
}

impl AstakosSession {
    pub fn new(
        config: &AccountConfig,
        credentials: Arc<dyn CredentialStore>,
        prompter: Arc<dyn TokenPrompter>,
    ) -> ApiResult<Self> {
        Ok(Self {
            account_key: config.account_key.clone(),
            account_type: config.account_type,
            authenticate_url: config.authenticate_url(),
            credentials,
            prompter,
            client: build_blocking_client(config.request_timeout)?,
            current: Mutex::new(None),
        })
    }

    /// 先用密钥库里的令牌，没有时（且允许界面）再向用户索取。
    fn resolve_token(&self, with_ui: bool) -> ProviderResult<String> {
        if let Some(token) = self.credentials.get(&self.account_key)? {
            return Ok(token);
        }
        if !with_ui {
            log::info!(
                "no stored token for account {}; prompt suppressed",
                self.account_key
            );
            return Err(ProviderError::auth("no token stored for this account"));
        }
        let token = self
            .prompter
            .prompt_token(&self.account_key, self.account_type)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::auth("no token was provided"))?;
        self.credentials.set(&self.account_key, &token)?;
        Ok(token)
    }

    fn authenticate(&self, token: &str) -> ApiResult<String> {
        let response = send_checked(
            self.client
                .get(&self.authenticate_url)
                .header(AUTH_TOKEN_HEADER, token)
                .header("Content-Type", "application/json"),
            &self.authenticate_url,
        )?;
        let raw = response
            .text()
            .map_err(|e| ApiError::Parse(format!("failed to read authenticate response: {e}")))?;
        let payload: AuthenticateResponse = serde_json::from_str(&raw)
            .map_err(|e| ApiError::Parse(format!("failed to parse authenticate response: {e}")))?;
        payload
            .uuid
            .or(payload.uniq)
            .filter(|user| !user.is_empty())
            .ok_or_else(|| {
                ApiError::Parse(format!("authenticate response carries no user id: {raw}"))
            })
    }

    fn forget(&self) {
        *self.current.lock().unwrap_or_else(|p| p.into_inner()) = None;
        if let Err(err) = self.credentials.clear(&self.account_key) {
            log::warn!(
                "failed to clear stored token for account {}: {err}",
                self.account_key
            );
        }
    }
}

impl AuthSession for AstakosSession {
    fn login(&self, with_ui: bool) -> ProviderResult<AuthToken> {
        log::info!(
            "logging in account {}, with_ui = {with_ui}",
            self.account_key
        );
        let token = self.resolve_token(with_ui)?;

        match self.authenticate(&token) {
            Ok(user) => {
                log::info!("account {} authenticated as {user}", self.account_key);
                let auth = AuthToken { token, user };
                *self.current.lock().unwrap_or_else(|p| p.into_inner()) = Some(auth.clone());
                Ok(auth)
            }
            Err(err) => {
                log::warn!("login failed for account {}: {err}", self.account_key);
                self.forget();
                let message = match err.response_body() {
                    Some(body) if !body.is_empty() => body.to_string(),
                    _ => err.to_string(),
                };
                Err(ProviderError::Auth(message))
            }
        }
    }

    fn current_token(&self) -> Option<AuthToken> {
        self.current
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn invalidate(&self) {
        log::info!("dropping stale token for account {}", self.account_key);
        self.forget();
    }
}
