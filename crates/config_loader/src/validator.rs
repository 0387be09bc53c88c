//! 配置校验模块
//!
//! 校验规则：
//! - 至少启用一个 input
//! - HTTP 端口非 0，路径以 `/` 开头、不含路由参数语法 (`:` / `*`)，且互不冲突
//! - TLS 启用时证书/私钥路径必填
//! - log watcher 启用时至少一个路径
//! - queue capacity > 0，timeout 策略需要 timeout_ms > 0
//! - batch_size 在 1..=MAX_BATCH_SIZE
//! - sink 名称非空且唯一，penguin sink 必须配置 url

use std::collections::HashSet;

use contracts::{
    AdapterSet, ContractError, QueuePolicy, RelayConfig, SinkType, FAVICON_PATH, HEALTH_PATH,
    MAX_BATCH_SIZE,
};

/// 校验 RelayConfig
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    let adapters = AdapterSet::from_inputs(&config.inputs)?;
    if adapters.runs_http() {
        validate_http(config)?;
    }
    if adapters.runs_watcher() {
        validate_log_input(config)?;
    }
    validate_queue(config)?;
    validate_dispatch(config)?;
    validate_sinks(config)?;
    Ok(())
}

/// 校验 HTTP 输入
fn validate_http(config: &RelayConfig) -> Result<(), ContractError> {
    let http = &config.inputs.http;

    if http.port == 0 {
        return Err(ContractError::config_validation(
            "inputs.http.port",
            "port must be > 0",
        ));
    }

    validate_route("inputs.http.path", &http.path)?;
    if RESERVED_PATHS.contains(&http.path.as_str()) {
        return Err(ContractError::config_validation(
            "inputs.http.path",
            format!("'{}' is reserved", http.path),
        ));
    }

    let prometheus = &config.output.prometheus;
    if prometheus.enabled {
        validate_route("output.prometheus.endpoint", &prometheus.endpoint)?;
        if prometheus.endpoint == http.path
            || RESERVED_PATHS.contains(&prometheus.endpoint.as_str())
        {
            return Err(ContractError::config_validation(
                "output.prometheus.endpoint",
                format!(
                    "endpoint '{}' collides with another route",
                    prometheus.endpoint
                ),
            ));
        }
    }

    if http.tls.enabled {
        if http.tls.cert_path.is_empty() {
            return Err(ContractError::config_validation(
                "inputs.http.tls.cert_path",
                "cert_path is required when TLS is enabled",
            ));
        }
        if http.tls.key_path.is_empty() {
            return Err(ContractError::config_validation(
                "inputs.http.tls.key_path",
                "key_path is required when TLS is enabled",
            ));
        }
    }

    Ok(())
}

/// 固定路由，不可被配置占用
const RESERVED_PATHS: [&str; 2] = [HEALTH_PATH, FAVICON_PATH];

fn validate_route(field: &str, route: &str) -> Result<(), ContractError> {
    if !route.starts_with('/') {
        return Err(ContractError::config_validation(
            field,
            format!("path must start with '/', got '{route}'"),
        ));
    }
    // 路由器会把 `:x` / `*x` 当作参数或通配
    if route.contains([':', '*']) {
        return Err(ContractError::config_validation(
            field,
            format!("path must be literal, '{route}' contains ':' or '*'"),
        ));
    }
    Ok(())
}

/// 校验 log watcher
fn validate_log_input(config: &RelayConfig) -> Result<(), ContractError> {
    let log = &config.inputs.log;

    if log.paths.is_empty() {
        return Err(ContractError::config_validation(
            "inputs.log.paths",
            "at least one path is required when the log watcher is enabled",
        ));
    }

    for (idx, path) in log.paths.iter().enumerate() {
        if path.as_os_str().is_empty() {
            return Err(ContractError::config_validation(
                format!("inputs.log.paths[{idx}]"),
                "path cannot be empty",
            ));
        }
    }

    Ok(())
}

/// 校验队列
fn validate_queue(config: &RelayConfig) -> Result<(), ContractError> {
    let queue = &config.queue;

    if queue.capacity == 0 {
        return Err(ContractError::config_validation(
            "queue.capacity",
            "capacity must be > 0",
        ));
    }

    if queue.policy == QueuePolicy::Timeout && queue.timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "queue.timeout_ms",
            "timeout_ms must be > 0 with the timeout policy",
        ));
    }

    Ok(())
}

/// 校验 dispatch 参数
fn validate_dispatch(config: &RelayConfig) -> Result<(), ContractError> {
    let dispatch = &config.dispatch;

    if dispatch.batch_size == 0 || dispatch.batch_size > MAX_BATCH_SIZE {
        return Err(ContractError::config_validation(
            "dispatch.batch_size",
            format!(
                "batch_size must be in 1..={MAX_BATCH_SIZE}, got {}",
                dispatch.batch_size
            ),
        ));
    }

    if dispatch.sink_queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "dispatch.sink_queue_capacity",
            "sink_queue_capacity must be > 0",
        ));
    }

    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(config: &RelayConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();

    for (idx, sink) in config.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }

        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }

        if sink.sink_type == SinkType::Penguin
            && sink.params.get("url").map_or(true, |url| url.is_empty())
        {
            return Err(ContractError::config_validation(
                format!("sinks[{}].params.url", sink.name),
                "penguin sink requires a 'url' parameter",
            ));
        }
    }

    Ok(())
}
