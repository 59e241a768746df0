// ==========================================
// 门店销售分析系统 - 派生字段服务实现
// ==========================================
// 职责: 时区本地化 / 时间派生 / 折扣率 / 订单类型归一 / 毛利
// 口径: 无时区时间戳视为已是门店本地时间, 只打标不平移;
//       带时区时间戳平移换算到门店本地时间(两类来源口径不同, 属预期)
// ==========================================

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use chrono_tz::Tz;

/// 时间戳解析结果: 带偏移 / 无时区
#[derive(Debug, Clone)]
pub enum ParsedTimestamp {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

/// 无时区字符串尝试的格式(按顺序)
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// 仅日期格式(按顺序, 取当日零点)
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// 解析时间戳字符串
///
/// RFC3339(带偏移)优先; 其余按 NAIVE_FORMATS / DATE_FORMATS 依次尝试
pub fn parse_timestamp(raw: &str) -> Option<ParsedTimestamp> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(aware) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ParsedTimestamp::Aware(aware));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(ParsedTimestamp::Naive(naive));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(ParsedTimestamp::Naive(date.and_hms_opt(0, 0, 0)?));
        }
    }

    None
}

/// 本地化到门店时区
///
/// - Naive: 打上门店时区, 墙钟值不变(DST 歧义取较早一侧,
///   DST 空洞按 UTC 同值落位)
/// - Aware: 换算到门店时区, 墙钟值随偏移平移
pub fn localize(parsed: ParsedTimestamp, tz: Tz) -> DateTime<Tz> {
    match parsed {
        ParsedTimestamp::Naive(naive) => match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earlier, _) => earlier,
            LocalResult::None => tz.from_utc_datetime(&naive),
        },
        ParsedTimestamp::Aware(aware) => aware.with_timezone(&tz),
    }
}

// ==========================================
// 时间派生字段
// ==========================================
#[derive(Debug, Clone)]
pub struct TemporalFields {
    pub date: NaiveDate,
    pub hour: u32,
    pub day_of_week: String,
    pub time_bucket_id: String,
}

/// 由门店本地时间派生日期/小时/星期/小时桶
pub fn derive_temporal_fields(local: &DateTime<Tz>) -> TemporalFields {
    TemporalFields {
        date: local.date_naive(),
        hour: local.hour(),
        day_of_week: local.format("%A").to_string(),
        time_bucket_id: local.format("%Y%m%d%H").to_string(),
    }
}

/// 折扣率(%)
///
/// 基数: 显式 subtotal 为正时取之, 否则以 total + discount 重构;
/// 基数 <= 0 时折扣率为 0(不产生除零); 结果夹取到 [-100, 100], 保留两位
pub fn derive_discount_rate(discount: f64, explicit_subtotal: Option<f64>, total: f64) -> f64 {
    let basis = match explicit_subtotal {
        Some(subtotal) if subtotal > 0.0 => subtotal,
        _ => total + discount,
    };

    if basis <= 0.0 {
        return 0.0;
    }

    let rate = discount / basis * 100.0;
    round2(rate.clamp(-100.0, 100.0))
}

/// 订单类型归一
///
/// 小写去空白后, 将已知拼写变体归一为 in_store; 未识别值原样透传
pub fn normalize_order_type(raw: &str) -> String {
    let cleaned = raw.trim().to_lowercase();
    match cleaned.as_str() {
        "in-store" | "instore" | "in store" => "in_store".to_string(),
        _ => cleaned,
    }
}

/// 明细毛利: (单价 - 成本) * 数量; 不夹取, 负毛利是合法信号
pub fn derive_margin(unit_price: f64, unit_cost: f64, quantity: f64) -> f64 {
    (unit_price - unit_cost) * quantity
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    #[test]
    fn test_parse_rfc3339_is_aware() {
        let parsed = parse_timestamp("2025-06-01T14:00:00Z").unwrap();
        assert!(matches!(parsed, ParsedTimestamp::Aware(_)));

        let parsed = parse_timestamp("2025-06-01T14:00:00-04:00").unwrap();
        assert!(matches!(parsed, ParsedTimestamp::Aware(_)));
    }

    #[test]
    fn test_parse_naive_formats() {
        for raw in [
            "2025-06-01T10:30:00",
            "2025-06-01 10:30:00",
            "2025-06-01 10:30",
            "2025/06/01 10:30:00",
            "06/01/2025 10:30:00",
        ] {
            let parsed = parse_timestamp(raw).unwrap();
            assert!(matches!(parsed, ParsedTimestamp::Naive(_)), "raw={raw}");
        }
    }

    #[test]
    fn test_parse_date_only_is_midnight() {
        let parsed = parse_timestamp("2025-06-01").unwrap();
        match parsed {
            ParsedTimestamp::Naive(naive) => {
                assert_eq!(naive.format("%H:%M:%S").to_string(), "00:00:00");
            }
            _ => panic!("expected naive"),
        }
    }

    #[test]
    fn test_localize_naive_keeps_wall_clock() {
        // 无时区: 视为门店本地时间, 墙钟值不变
        let parsed = parse_timestamp("2025-06-01 10:30:00").unwrap();
        let local = localize(parsed, New_York);

        assert_eq!(local.hour(), 10);
        assert_eq!(local.minute(), 30);
    }

    #[test]
    fn test_localize_aware_shifts_wall_clock() {
        // UTC 14:00 = 纽约夏令时 10:00
        let parsed = parse_timestamp("2025-06-01T14:00:00Z").unwrap();
        let local = localize(parsed, New_York);

        assert_eq!(local.hour(), 10);
    }

    #[test]
    fn test_discount_rate_with_explicit_subtotal() {
        assert_eq!(derive_discount_rate(20.0, Some(100.0), 120.0), 20.0);
    }

    #[test]
    fn test_discount_rate_reconstructed_basis() {
        // subtotal=0 非正 → 基数 = total + discount = 100
        assert_eq!(derive_discount_rate(20.0, Some(0.0), 80.0), 20.0);
        assert_eq!(derive_discount_rate(20.0, None, 80.0), 20.0);
    }

    #[test]
    fn test_discount_rate_zero_basis_is_zero() {
        assert_eq!(derive_discount_rate(0.0, Some(0.0), 0.0), 0.0);
        assert_eq!(derive_discount_rate(-5.0, None, 5.0), 0.0);
    }

    #[test]
    fn test_discount_rate_clamped() {
        // 折扣远大于基数时夹取到 100
        assert_eq!(derive_discount_rate(500.0, Some(100.0), 0.0), 100.0);
        assert_eq!(derive_discount_rate(-500.0, Some(100.0), 0.0), -100.0);
    }

    #[test]
    fn test_normalize_order_type_variants() {
        assert_eq!(normalize_order_type("In-Store"), "in_store");
        assert_eq!(normalize_order_type(" instore "), "in_store");
        assert_eq!(normalize_order_type("in store"), "in_store");
        assert_eq!(normalize_order_type("Pickup"), "pickup");
        // 未识别值原样透传(小写)
        assert_eq!(normalize_order_type("kiosk"), "kiosk");
    }

    #[test]
    fn test_margin_allows_negative() {
        assert_eq!(derive_margin(10.0, 4.0, 3.0), 18.0);
        assert_eq!(derive_margin(4.0, 10.0, 2.0), -12.0);
    }

    #[test]
    fn test_temporal_fields() {
        let parsed = parse_timestamp("2025-06-02 09:15:00").unwrap();
        let local = localize(parsed, New_York);
        let fields = derive_temporal_fields(&local);

        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert_eq!(fields.hour, 9);
        assert_eq!(fields.day_of_week, "Monday");
        assert_eq!(fields.time_bucket_id, "2025060209");
    }
}
