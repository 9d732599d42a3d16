use crate::api::client::{send_checked, AUTH_TOKEN_HEADER};
use crate::auth::AuthToken;
use crate::error::ApiResult;
use reqwest::blocking::Client;
use url::Url;

/// 删除对象；对"目录"对象而言，服务端只在其为空时真正删除。
pub(super) fn delete_object(client: &Client, url: Url, token: &AuthToken) -> ApiResult<()> {
    let display = url.to_string();
    send_checked(
        client
            .delete(url)
            .header(AUTH_TOKEN_HEADER, &token.token)
            .header("Content-Type", "application/json"),
        &display,
    )?;
    Ok(())
}
