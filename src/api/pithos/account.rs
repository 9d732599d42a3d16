use crate::api::client::{numeric_header, send_checked, AUTH_TOKEN_HEADER};
use crate::api::models::AccountInfo;
use crate::auth::AuthToken;
use crate::error::ApiResult;
use reqwest::blocking::Client;
use url::Url;

const BYTES_USED_HEADER: &str = "X-Account-Bytes-Used";
const QUOTA_HEADER: &str = "X-Account-Policy-Quota";

/// 账户用量：`HEAD /v1/<user>`，结果只在响应头里。
pub(super) fn head_account(client: &Client, url: Url, token: &AuthToken) -> ApiResult<AccountInfo> {
    let display = url.to_string();
    let response = send_checked(
        client
            .head(url)
            .header(AUTH_TOKEN_HEADER, &token.token)
            .header("Content-Type", "application/xml"),
        &display,
    )?;

    let info = AccountInfo {
        bytes_used: numeric_header(&response, BYTES_USED_HEADER)?,
        quota: numeric_header(&response, QUOTA_HEADER)?,
    };
    log::debug!(
        "account {} uses {} of {} bytes",
        token.user,
        info.bytes_used,
        info.quota
    );
    Ok(info)
}
