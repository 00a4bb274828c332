//! 实足年龄计算与韩文日期格式化
//!
//! 所有函数均为纯函数：无法解析的日期静默回退为“今天”，从不返回错误。

use boneage_core::ChronAge;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

/// 日期缺失或无法解析时的占位符
pub const DATE_PLACEHOLDER: &str = "-";

/// 解析 ISO-8601 日期，支持 `YYYY-MM-DD` 与带时间的时间戳
pub fn parse_calendar_date(value: Option<&str>) -> Option<NaiveDate> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

/// 以当前日期作为缺省值计算实足年龄
pub fn calculate_age(birth_date: Option<&str>, reference_date: Option<&str>) -> ChronAge {
    calculate_age_on(birth_date, reference_date, Utc::now().date_naive())
}

/// 计算实足年龄，`today` 为两侧日期各自的缺省值
///
/// 参考日的日数小于出生日的日数时，本月尚未满，月数减一；
/// 月数为负时向年借位；参考日早于出生日时结果钳制为 0岁0个月。
pub fn calculate_age_on(
    birth_date: Option<&str>,
    reference_date: Option<&str>,
    today: NaiveDate,
) -> ChronAge {
    let birth = parse_calendar_date(birth_date).unwrap_or(today);
    let reference = parse_calendar_date(reference_date).unwrap_or(today);

    let mut years = reference.year() - birth.year();
    let mut months = reference.month() as i32 - birth.month() as i32;

    if reference.day() < birth.day() {
        months -= 1;
    }
    if months < 0 {
        years -= 1;
        months += 12;
    }
    if years < 0 {
        return ChronAge::default();
    }

    ChronAge::new(years as u32, months as u32)
}

/// 韩文日期格式，例如 `2024년 6월 10일`
pub fn format_date_kr(value: Option<&str>) -> String {
    match parse_calendar_date(value) {
        Some(date) => format!("{}년 {}월 {}일", date.year(), date.month(), date.day()),
        None => DATE_PLACEHOLDER.to_string(),
    }
}

/// 韩文年龄格式，例如 `13세 11개월`
pub fn format_age_kr(age: &ChronAge) -> String {
    format!("{}세 {}개월", age.years, age.months)
}
