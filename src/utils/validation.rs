use crate::utils::domain::is_valid_domain_or_ip;
use crate::utils::error::{LookupError, Result};
use url::Url;

/// 企業名稱允許的最大字元數
pub const MAX_ENTITY_NAME_CHARS: usize = 256;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(LookupError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(LookupError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// 驗證查詢用的企業名稱
pub fn validate_entity_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LookupError::validation("entity name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_ENTITY_NAME_CHARS {
        return Err(LookupError::validation(format!(
            "entity name exceeds {} characters",
            MAX_ENTITY_NAME_CHARS
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(LookupError::validation(
            "entity name contains control characters",
        ));
    }
    Ok(())
}

/// 驗證查詢用的域名（允許帶協定或路徑，也允許 IP）
pub fn validate_domain_query(domain: &str) -> Result<()> {
    if domain.trim().is_empty() {
        return Err(LookupError::validation("domain cannot be empty"));
    }
    if !is_valid_domain_or_ip(domain) {
        return Err(LookupError::validation(format!(
            "'{}' is not a domain or IP address",
            domain.trim()
        )));
    }
    Ok(())
}
