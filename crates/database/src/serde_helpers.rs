use serde::{Serialize, Serializer};

/// 将u64强制序列化为BSON数值类型（而非NumberLong包装）
pub fn serialize_u64_as_number<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if *value <= i32::MAX as u64 {
        (*value as i32).serialize(serializer)
    } else if *value <= i64::MAX as u64 {
        (*value as i64).serialize(serializer)
    } else {
        value.serialize(serializer)
    }
}

/// 自定义日期时间反序列化器，兼容字符串和MongoDB日期对象格式
///
/// 写入时统一使用 RFC3339 字符串（字典序即时间序，聚合时可直接按前缀分组）。
pub mod flexible_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_sortable_string(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = bson::Bson::deserialize(deserializer)?;
        super::bson_to_datetime(value).map_err(serde::de::Error::custom)
    }
}

/// `Option<DateTime<Utc>>` 版本，`null` 反序列化为 `None`
pub mod flexible_datetime_option {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&super::to_sortable_string(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match bson::Bson::deserialize(deserializer)? {
            bson::Bson::Null | bson::Bson::Undefined => Ok(None),
            other => super::bson_to_datetime(other).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// 固定宽度的毫秒精度 UTC 时间串，例如 `2026-10-19T08:30:00.000Z`
pub fn to_sortable_string(value: &chrono::DateTime<chrono::Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn bson_to_datetime(value: mongodb::bson::Bson) -> Result<chrono::DateTime<chrono::Utc>, String> {
    use mongodb::bson::Bson;

    match value {
        // 处理字符串格式的日期时间
        Bson::String(s) => s
            .parse::<chrono::DateTime<chrono::Utc>>()
            .map_err(|e| format!("Failed to parse datetime string '{}': {}", s, e)),
        // 处理MongoDB BSON日期对象格式
        Bson::DateTime(dt) => chrono::DateTime::<chrono::Utc>::from_timestamp_millis(dt.timestamp_millis())
            .ok_or_else(|| "Invalid timestamp".to_string()),
        other => Err(format!("Expected datetime string or BSON DateTime, found: {:?}", other)),
    }
}
