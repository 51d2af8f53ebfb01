//! 資料來源 JSON 條目的共用解析工具。

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y年%m月%d日", "%Y%m%d"];
const SUPERSEDED_MARKERS: &[&str] = &["注销", "註銷", "历史", "歷史", "撤销", "cancel", "revoked"];

/// 沒有時區的時間一律視為北京時間 (UTC+8)
const CHINA_OFFSET_SECS: i32 = 8 * 3600;

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    // 13 位數視為毫秒
    if value.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

/// 把資料來源的時間欄位轉成 UTC；無法辨識時回傳 `None`
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => number.as_i64().and_then(from_epoch),
        Value::String(text) => parse_timestamp_str(text),
        _ => None,
    }
}

pub fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.len() >= 10 && text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse::<i64>().ok().and_then(from_epoch);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    FixedOffset::east_opt(CHINA_OFFSET_SECS)?
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// 依序取第一個非空的字串欄位
pub fn text_field(item: &Value, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| item.get(*name))
        .find_map(|value| match value {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// 條目本身是否標示為已注銷/歷史備案
pub fn is_superseded(item: &Value) -> bool {
    let flagged = ["isHistory", "IsHistory", "is_historical"]
        .iter()
        .filter_map(|name| item.get(*name))
        .any(|value| match value {
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_i64() == Some(1),
            Value::String(text) => matches!(text.trim(), "1" | "true" | "是"),
            _ => false,
        });
    if flagged {
        return true;
    }

    let status = text_field(item, &["status", "Status", "regStatus"]).to_lowercase();
    !status.is_empty() && SUPERSEDED_MARKERS.iter().any(|marker| status.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_naive_time_as_china_time() {
        let parsed = parse_timestamp(&json!("2023-03-01 08:00:00")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap());

        let date_only = parse_timestamp(&json!("2023/03/01")).unwrap();
        assert_eq!(date_only, Utc.with_ymd_and_hms(2023, 2, 28, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_epoch_and_rfc3339() {
        let millis = parse_timestamp(&json!(1_677_628_800_000i64)).unwrap();
        assert_eq!(millis, Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap());

        let seconds = parse_timestamp(&json!("1677628800")).unwrap();
        assert_eq!(seconds, millis);

        let rfc = parse_timestamp(&json!("2023-03-01T00:00:00Z")).unwrap();
        assert_eq!(rfc, millis);
    }

    #[test]
    fn test_unparseable_time() {
        assert!(parse_timestamp(&json!("")).is_none());
        assert!(parse_timestamp(&json!("yesterday")).is_none());
        assert!(parse_timestamp(&json!(null)).is_none());
    }

    #[test]
    fn test_text_field_fallbacks() {
        let item = json!({"ServiceLicence": "", "SiteLicense": " 京ICP证030173号-1 ", "id": 7});
        assert_eq!(text_field(&item, &["ServiceLicence", "SiteLicense"]), "京ICP证030173号-1");
        assert_eq!(text_field(&item, &["id"]), "7");
        assert_eq!(text_field(&item, &["missing"]), "");
    }

    #[test]
    fn test_is_superseded() {
        assert!(is_superseded(&json!({"isHistory": 1})));
        assert!(is_superseded(&json!({"IsHistory": true})));
        assert!(is_superseded(&json!({"status": "已注销"})));
        assert!(is_superseded(&json!({"Status": "Cancelled"})));
        assert!(!is_superseded(&json!({"status": "正常"})));
        assert!(!is_superseded(&json!({"Domain": "baidu.com"})));
    }
}
