use log::LevelFilter;

/// 安装默认日志输出（info 级别），`RUST_LOG` 可以覆盖。
/// 宿主已经装过 logger 时静默跳过。
pub fn init() {
    init_with_level(LevelFilter::Info);
}

pub fn init_with_level(level: LevelFilter) {
    let result = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
    if result.is_ok() {
        log::debug!("logging initialised at {level}");
    }
}
