//! Environment variable substitution
//!
//! Supported forms:
//! - `${VAR}` - value of VAR, error when unset
//! - `${VAR:-default}` - value of VAR, `default` when unset or empty
//! - `$$` - literal `$`
//!
//! A `$` not followed by `{` or `$` is kept as-is.

use contracts::ContractError;

/// Expand references using the process environment
pub fn expand_env(content: &str) -> Result<String, ContractError> {
    expand_with(content, |name| std::env::var(name).ok())
}

/// Expand references using a custom lookup
pub fn expand_with<F>(content: &str, lookup: F) -> Result<String, ContractError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or_else(|| {
                ContractError::config_parse("unterminated '${' in config template")
            })?;
            out.push_str(&resolve(&body[..end], &lookup)?);
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }

    out.push_str(rest);
    Ok(out)
}

fn resolve<F>(expr: &str, lookup: &F) -> Result<String, ContractError>
where
    F: Fn(&str) -> Option<String>,
{
    let (name, default) = match expr.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (expr, None),
    };

    if name.is_empty() {
        return Err(ContractError::config_parse("empty variable name in '${}'"));
    }

    match (lookup(name), default) {
        (Some(value), Some(default)) if value.is_empty() => Ok(default.to_string()),
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => Err(ContractError::config_parse(format!(
            "environment variable '{name}' is not set"
        ))),
    }
}
