mod account;
mod delete;
mod share;
mod upload;

use super::client::build_blocking_client;
use super::models::{AccountInfo, ObjectPath};
use super::store::{ObjectStoreClient, UploadBody};
use crate::auth::AuthToken;
use crate::error::{ApiError, ApiResult};
use crate::settings::AccountConfig;
use reqwest::blocking::Client;
use url::Url;

/// Pithos+ 存储 API 的阻塞式客户端。
/// 普通请求与文件传输分别使用不同超时的 HTTP 客户端。
pub struct PithosClient {
    api_base: String,
    pithos_url: String,
    client: Client,
    transfer_client: Client,
}

impl PithosClient {
    pub fn new(config: &AccountConfig) -> ApiResult<Self> {
        Ok(Self {
            api_base: config.pithos_api_base(),
            pithos_url: config.pithos_url.trim_end_matches('/').to_string(),
            client: build_blocking_client(config.request_timeout)?,
            transfer_client: build_blocking_client(config.transfer_timeout)?,
        })
    }

    fn account_url(&self, token: &AuthToken) -> ApiResult<Url> {
        parse_url(format!("{}/{}", self.api_base, token.user))
    }

    fn container_url(&self, token: &AuthToken, container: &str) -> ApiResult<Url> {
        parse_url(format!(
            "{}/{}/{}",
            self.api_base,
            token.user,
            container.trim_matches('/')
        ))
    }

    fn object_url(&self, token: &AuthToken, path: &ObjectPath) -> ApiResult<Url> {
        parse_url(path.render(&self.api_base, &token.user))
    }
}

fn parse_url(raw: String) -> ApiResult<Url> {
    Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))
}

impl ObjectStoreClient for PithosClient {
    fn head_account(&self, token: &AuthToken) -> ApiResult<AccountInfo> {
        let url = self.account_url(token)?;
        account::head_account(&self.client, url, token)
    }

    fn ensure_container(&self, token: &AuthToken, container: &str) -> ApiResult<()> {
        let url = self.container_url(token, container)?;
        upload::ensure_container(&self.client, url, token)
    }

    fn put_object(
        &self,
        token: &AuthToken,
        path: &ObjectPath,
        body: UploadBody,
        content_type: &str,
    ) -> ApiResult<()> {
        let url = self.object_url(token, path)?;
        upload::put_object(&self.transfer_client, url, token, body, content_type)
    }

    fn set_public(&self, token: &AuthToken, path: &ObjectPath) -> ApiResult<()> {
        let url = self.object_url(token, path)?;
        share::set_public(&self.client, url, token)
    }

    fn get_public_url(&self, token: &AuthToken, path: &ObjectPath) -> ApiResult<String> {
        let url = self.object_url(token, path)?;
        share::get_public_url(&self.client, url, token, &self.pithos_url)
    }

    fn delete_object(&self, token: &AuthToken, path: &ObjectPath) -> ApiResult<()> {
        let url = self.object_url(token, path)?;
        delete::delete_object(&self.client, url, token)
    }
}
