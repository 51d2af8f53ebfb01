//! 域名正規化與根域名工具。
//!
//! 根域名（註冊域名）依 Public Suffix List 判斷。

use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;

static DOMAIN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z][a-z0-9-]{0,61}[a-z0-9]$")
        .expect("domain pattern is a valid regex")
});

/// 去掉協定、帳號、路徑、埠號與結尾的點，並轉成小寫
pub fn normalize_domain(raw: &str) -> String {
    let mut host = raw.trim();

    if let Some(index) = host.find("://") {
        let scheme = &host[..index];
        if !scheme.is_empty()
            && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
        {
            host = &host[index + 3..];
        }
    }

    if let Some(index) = host.find(['/', '?', '#']) {
        host = &host[..index];
    }
    if let Some(index) = host.rfind('@') {
        host = &host[index + 1..];
    }

    // IPv6 原樣保留，其餘去掉埠號
    if host.parse::<IpAddr>().is_err() {
        if let Some(bracketed) = host.strip_prefix('[') {
            host = bracketed.split(']').next().unwrap_or_default();
        } else if let Some(index) = host.find(':') {
            host = &host[..index];
        }
    }

    host.trim_end_matches('.').to_lowercase()
}

pub fn is_ip_address(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}

/// 判斷輸入（正規化後）是否像一個合法的域名或 IP
pub fn is_valid_domain_or_ip(raw: &str) -> bool {
    let host = normalize_domain(raw);
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    is_ip_address(&host) || DOMAIN_PATTERN.is_match(&host)
}

pub fn is_gov_domain(domain: &str) -> bool {
    let host = normalize_domain(domain);
    host == "gov.cn" || host.ends_with(".gov.cn")
}

/// 取得註冊域名，例如 `www.example.com.cn` -> `example.com.cn`
///
/// 本身就是公共後綴（如 `com.cn`）時原樣回傳。
pub fn extract_root_domain(domain: &str) -> String {
    let host = normalize_domain(domain);
    if host.is_empty() || is_ip_address(&host) {
        return host;
    }

    match psl::domain_str(&host) {
        Some(root) => root.to_string(),
        None => host,
    }
}

/// 政府域名由具體到一般的層級，非政府域名只回傳自身
///
/// `a.b.gz.gov.cn` -> `[a.b.gz.gov.cn, b.gz.gov.cn, gz.gov.cn]`
pub fn domain_hierarchy(domain: &str) -> Vec<String> {
    let host = normalize_domain(domain);
    if !is_gov_domain(&host) {
        return vec![host];
    }

    let labels: Vec<&str> = host.split('.').collect();
    let mut levels = Vec::new();
    for start in 0..labels.len() {
        let candidate = labels[start..].join(".");
        if candidate == "gov.cn" {
            break;
        }
        levels.push(candidate);
    }
    if levels.is_empty() {
        levels.push(host);
    }
    levels
}

/// 查詢用的域名：一般域名歸一到根域名，政府域名保留完整主機名
pub fn lookup_domain(domain: &str) -> String {
    if is_gov_domain(domain) {
        normalize_domain(domain)
    } else {
        extract_root_domain(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("https://WWW.Baidu.com/path?q=1"), "www.baidu.com");
        assert_eq!(normalize_domain("  baidu.com.  "), "baidu.com");
        assert_eq!(normalize_domain("ftp://user@files.example.org:21/x"), "files.example.org");
        assert_eq!(normalize_domain("example.com:8080"), "example.com");
        assert_eq!(normalize_domain("::1"), "::1");
        assert_eq!(normalize_domain(""), "");
    }

    #[test]
    fn test_extract_root_domain() {
        assert_eq!(extract_root_domain("www.baidu.com"), "baidu.com");
        assert_eq!(extract_root_domain("a.b.c.baidu.com"), "baidu.com");
        assert_eq!(extract_root_domain("baidu.com"), "baidu.com");
        assert_eq!(extract_root_domain("www.example.co.uk"), "example.co.uk");
        assert_eq!(extract_root_domain("news.sina.com.cn"), "sina.com.cn");
        assert_eq!(extract_root_domain("a.b.gz.gov.cn"), "gz.gov.cn");
        assert_eq!(extract_root_domain("8.8.8.8"), "8.8.8.8");
        assert_eq!(extract_root_domain("x.github.io"), "x.github.io");
        assert_eq!(extract_root_domain("www.example.com.ru"), "example.com.ru");
        assert_eq!(extract_root_domain("shop.example.co.jp"), "example.co.jp");
        assert_eq!(extract_root_domain("com.cn"), "com.cn");
    }

    #[test]
    fn test_gov_domain_hierarchy() {
        assert!(is_gov_domain("www.beijing.gov.cn"));
        assert!(!is_gov_domain("gov.cn.example.com"));
        assert_eq!(
            domain_hierarchy("a.b.c.gz.gov.cn"),
            vec!["a.b.c.gz.gov.cn", "b.c.gz.gov.cn", "c.gz.gov.cn", "gz.gov.cn"]
        );
        assert_eq!(domain_hierarchy("www.baidu.com"), vec!["www.baidu.com"]);
    }

    #[test]
    fn test_lookup_domain() {
        assert_eq!(lookup_domain("https://www.baidu.com/"), "baidu.com");
        assert_eq!(lookup_domain("www.gz.gov.cn"), "www.gz.gov.cn");
    }

    #[test]
    fn test_is_valid_domain_or_ip() {
        assert!(is_valid_domain_or_ip("baidu.com"));
        assert!(is_valid_domain_or_ip("http://www.baidu.com/index.html"));
        assert!(is_valid_domain_or_ip("xn--fiqs8s.cn"));
        assert!(is_valid_domain_or_ip("192.168.1.1"));
        assert!(!is_valid_domain_or_ip("北京百度网讯科技有限公司"));
        assert!(!is_valid_domain_or_ip("localhost"));
        assert!(!is_valid_domain_or_ip("bad_domain.com"));
        assert!(!is_valid_domain_or_ip(""));
    }
}
