use crate::api::client::{send_checked, AUTH_TOKEN_HEADER};
use crate::api::store::UploadBody;
use crate::auth::AuthToken;
use crate::error::ApiResult;
use reqwest::blocking::{Body, Client};
use url::Url;

/// 创建附件容器；容器已存在时服务端同样返回成功。
pub(super) fn ensure_container(client: &Client, url: Url, token: &AuthToken) -> ApiResult<()> {
    let display = url.to_string();
    send_checked(
        client
            .put(url)
            .header(AUTH_TOKEN_HEADER, &token.token)
            .header("Content-Type", "application/json"),
        &display,
    )?;
    Ok(())
}

/// 以流的方式上传文件内容，请求体长度固定为文件大小。
pub(super) fn put_object(
    client: &Client,
    url: Url,
    token: &AuthToken,
    body: UploadBody,
    content_type: &str,
) -> ApiResult<()> {
    let display = url.to_string();
    let total_len = body.len();
    log::info!("uploading {total_len} bytes to {display}");
    send_checked(
        client
            .put(url)
            .header(AUTH_TOKEN_HEADER, &token.token)
            .header("Content-Type", content_type)
            .body(Body::sized(body, total_len)),
        &display,
    )?;
    Ok(())
}
