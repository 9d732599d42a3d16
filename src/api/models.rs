use chrono::NaiveDateTime;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};

/// 与 encodeURIComponent 保持一致的保留字符集。
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// 拼 URL 时只转义会截断路径的字符；空格等交给 URL 解析器处理。
const PATH_DELIMITERS: &AsciiSet = &CONTROLS.add(b'?').add(b'#');

/// 账户 HEAD 请求返回的用量信息（字节）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub bytes_used: u64,
    pub quota: u64,
}

impl AccountInfo {
    pub fn available(&self) -> u64 {
        self.quota.saturating_sub(self.bytes_used)
    }
}

/// 对象在存储中的位置：容器 + 容器内的 key（`<时间戳>/<文件名>`）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    pub container: String,
    pub key: String,
}

impl ObjectPath {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// 附件对象路径：容器 / 上传时间 / 处理过的文件名。
    pub fn for_upload(container: &str, uploaded_at: NaiveDateTime, file_name: &str) -> Self {
        Self::new(
            container.trim_matches('/'),
            format!(
                "{}/{}",
                timestamp_subpath(uploaded_at),
                sanitize_file_name(file_name)
            ),
        )
    }

    /// 上一级"目录"对象；key 已经在容器根下时返回 None。
    pub fn parent(&self) -> Option<ObjectPath> {
        let (dir, _) = self.key.rsplit_once('/')?;
        if dir.is_empty() {
            return None;
        }
        Some(ObjectPath::new(self.container.clone(), dir))
    }

    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// `<api_base>/<user>/<container>/<key>` 形式的地址文本，交给 URL 解析器规范化。
    pub(crate) fn render(&self, api_base: &str, user: &str) -> String {
        let key = self
            .key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_DELIMITERS).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}/{}",
            api_base.trim_end_matches('/'),
            user,
            utf8_percent_encode(&self.container, PATH_DELIMITERS),
            key
        )
    }
}

/// 文件名只含可打印 ASCII（0x20-0x7E）时原样使用，否则整体做 URI 组件编码。
pub fn sanitize_file_name(name: &str) -> String {
    if name.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        name.to_string()
    } else {
        utf8_percent_encode(name, URI_COMPONENT).to_string()
    }
}

/// 形如 `9 Feb 2013  07:05:03` 的子目录名，日期与时间之间两个空格。
pub fn timestamp_subpath(at: NaiveDateTime) -> String {
    at.format("%-d %b %Y  %H:%M:%S").to_string()
}
