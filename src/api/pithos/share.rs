use crate::api::client::{send_checked, text_header, AUTH_TOKEN_HEADER};
use crate::auth::AuthToken;
use crate::error::ApiResult;
use reqwest::blocking::Client;
use url::Url;

const PUBLIC_HEADER: &str = "X-Object-Public";
const UPDATE_QUERY: &str = "update&format=json";

/// 把对象标记为公开可读：`POST <object>?update&format=json` 并带上 `X-Object-Public: True`。
pub(super) fn set_public(client: &Client, mut url: Url, token: &AuthToken) -> ApiResult<()> {
    url.set_query(Some(UPDATE_QUERY));
    let display = url.to_string();
    send_checked(
        client
            .post(url)
            .header(AUTH_TOKEN_HEADER, &token.token)
            .header(PUBLIC_HEADER, "True")
            .header("Content-Type", "application/json"),
        &display,
    )?;
    Ok(())
}

/// 读取对象的公开路径并拼成完整分享链接。
pub(super) fn get_public_url(
    client: &Client,
    url: Url,
    token: &AuthToken,
    pithos_url: &str,
) -> ApiResult<String> {
    let display = url.to_string();
    let response = send_checked(
        client
            .head(url)
            .header(AUTH_TOKEN_HEADER, &token.token)
            .header("Content-Type", "application/json"),
        &display,
    )?;

    let public_path = text_header(&response, PUBLIC_HEADER)?;
    Ok(share_link(pithos_url, public_path.trim()))
}

/// 服务端一般只返回 `/public/<id>` 这样的路径；已是完整地址时直接使用。
fn share_link(pithos_url: &str, public_path: &str) -> String {
    if public_path.starts_with("http://") || public_path.starts_with("https://") {
        return public_path.to_string();
    }
    format!(
        "{}/{}",
        pithos_url.trim_end_matches('/'),
        public_path.trim_start_matches('/')
    )
}
