//! Telemetry - センサー読み取り値とその集計
//!
//! # 設計
//! - 必須フィールド（temp, hum, light, motion, sound）の存在確認はデコード時に一度だけ行う
//! - 値の型・範囲はチェックしない（JSON の値をそのまま保存する）
//! - 追加フィールドは `extra` にそのまま残す

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::errors::GatewayError;
use super::ids::RecordId;

/// Fields every reading must carry.
pub const REQUIRED_FIELDS: [&str; 5] = ["temp", "hum", "light", "motion", "sound"];

/// Keys assigned by the server; a client-supplied value is discarded.
const RESERVED_KEYS: [&str; 3] = ["_id", "timestamp", "device_type"];

/// One validated sensor reading, as posted by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub temp: Value,
    pub hum: Value,
    pub light: Value,
    pub motion: Value,
    pub sound: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TelemetryReading {
    /// JSON から読み取り値を構築する
    ///
    /// オブジェクトでない、または必須フィールドが欠けている場合は
    /// `GatewayError::Validation` を返す。
    pub fn from_json(value: Value) -> Result<Self, GatewayError> {
        let Value::Object(mut map) = value else {
            return Err(GatewayError::Validation(
                "telemetry payload must be a JSON object".to_string(),
            ));
        };

        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| !map.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(GatewayError::Validation(format!(
                "Missing fields: {}",
                missing.join(", ")
            )));
        }

        for key in RESERVED_KEYS {
            map.remove(key);
        }

        let temp = map.remove("temp").unwrap_or(Value::Null);
        let hum = map.remove("hum").unwrap_or(Value::Null);
        let light = map.remove("light").unwrap_or(Value::Null);
        let motion = map.remove("motion").unwrap_or(Value::Null);
        let sound = map.remove("sound").unwrap_or(Value::Null);

        Ok(Self {
            temp,
            hum,
            light,
            motion,
            sound,
            extra: map,
        })
    }
}

/// A persisted reading. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(flatten)]
    pub reading: TelemetryReading,
    pub timestamp: DateTime<Utc>,
    pub device_type: String,
}

/// Display form of a record: string id, ISO-8601 timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub reading: TelemetryReading,
    pub timestamp: String,
    pub device_type: String,
}

impl From<&TelemetryRecord> for RecordView {
    fn from(record: &TelemetryRecord) -> Self {
        Self {
            id: record.id.to_string(),
            reading: record.reading.clone(),
            timestamp: record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            device_type: record.device_type.clone(),
        }
    }
}

/// Whole-collection summary.
///
/// 数値でない値は平均から除外する。数値が一つもないフィールドの平均は `None`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryAggregate {
    pub avg_temp: Option<f64>,
    pub avg_hum: Option<f64>,
    pub avg_light: Option<f64>,
    pub avg_sound: Option<f64>,
    pub motion_count: Number,
}

impl TelemetryAggregate {
    /// 全レコードを集計する。レコードが無ければ `None`。
    pub fn from_records<'a, I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a TelemetryRecord>,
    {
        let mut seen = 0usize;
        let mut temp = Mean::default();
        let mut hum = Mean::default();
        let mut light = Mean::default();
        let mut sound = Mean::default();
        let mut motion = MotionSum::default();

        for record in records {
            seen += 1;
            temp.push(&record.reading.temp);
            hum.push(&record.reading.hum);
            light.push(&record.reading.light);
            sound.push(&record.reading.sound);
            motion.push(&record.reading.motion);
        }

        if seen == 0 {
            return None;
        }

        Some(Self {
            avg_temp: temp.finish(),
            avg_hum: hum.finish(),
            avg_light: light.finish(),
            avg_sound: sound.finish(),
            motion_count: motion.finish(),
        })
    }
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: u64,
}

impl Mean {
    fn push(&mut self, value: &Value) {
        if let Some(v) = value.as_f64() {
            self.sum += v;
            self.count += 1;
        }
    }

    fn finish(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// 整数のみなら整数のまま合計し、小数が混じれば浮動小数点で返す
#[derive(Default)]
struct MotionSum {
    int: i64,
    float: f64,
    saw_float: bool,
}

impl MotionSum {
    fn push(&mut self, value: &Value) {
        match value {
            Value::Bool(flag) => self.int = self.int.saturating_add(i64::from(*flag)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    self.int = self.int.saturating_add(i);
                } else if let Some(f) = n.as_f64() {
                    self.float += f;
                    self.saw_float = true;
                }
            }
            _ => {}
        }
    }

    fn finish(&self) -> Number {
        if self.saw_float {
            Number::from_f64(self.int as f64 + self.float).unwrap_or_else(|| Number::from(0))
        } else {
            Number::from(self.int)
        }
    }
}
