use crate::error::{ApiError, ApiResult};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::redirect::Policy;
use std::time::Duration;

/// Pithos / Astakos 都用这个头携带令牌。
pub(crate) const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// 构建一个带有统一超时与重定向策略的阻塞式 HTTP 客户端。
/// 所有远端调用应尽量复用该函数，避免重复配置。
pub(crate) fn build_blocking_client(timeout: Duration) -> ApiResult<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(Policy::limited(10))
        .build()
        .map_err(ApiError::Client)
}

/// 发送请求并按 2xx/3xx 判定成功；失败时把响应体留作诊断文本。
pub(crate) fn send_checked(request: RequestBuilder, url: &str) -> ApiResult<Response> {
    let response = request.send().map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status.is_success() || status.is_redirection() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    log::warn!("{url} returned HTTP {}: {body}", status.as_u16());
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

/// 读取数值型响应头，例如账户用量与配额。
pub(crate) fn numeric_header(response: &Response, name: &'static str) -> ApiResult<u64> {
    let raw = text_header(response, name)?;
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ApiError::Parse(format!("{name}: {raw:?} is not a byte count ({e})")))
}

pub(crate) fn text_header(response: &Response, name: &'static str) -> ApiResult<String> {
    let value = response
        .headers()
        .get(name)
        .ok_or(ApiError::MissingHeader(name))?;
    let text = value
        .to_str()
        .map_err(|e| ApiError::Parse(format!("{name}: {e}")))?;
    if text.trim().is_empty() {
        return Err(ApiError::MissingHeader(name));
    }
    Ok(text.to_string())
}
