// ==========================================
// 门店销售分析系统 - 管线配置快照
// ==========================================
// 职责: 门店时区表 / 时段表 / 异常阈值 / 模糊匹配参数
// 红线: 配置是不可变快照, 归一化过程中不得写回;
//       未配置门店通过稳定散列派生确定性 ID, 不注册到共享状态
// ==========================================

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use uuid::Uuid;

/// 默认门店时区
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;

// ==========================================
// LocationConfig - 门店配置
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub id: String,       // 门店 ID (如 loc_001)
    pub name: String,     // 门店名称
    pub timezone: Tz,     // 门店本地时区 (IANA 名称)
}

// ==========================================
// DaypartInterval - 时段区间
// ==========================================
// 口径: [start_hour, end_hour) 左闭右开; 表按声明顺序匹配,
//       允许重叠, 首个命中生效
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaypartInterval {
    pub name: String,
    pub start_hour: u32, // 含
    pub end_hour: u32,   // 不含
}

// ==========================================
// ExceptionThresholds - 异常检测阈值
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionThresholds {
    pub negative_total_floor: f64, // 负总额下限(默认略低于 0)
    pub high_discount_rate: f64,   // 高折扣率下限(%)
    pub high_void_rate: f64,       // 高作废率下限(%)
    pub tax_tolerance: f64,        // 税额差绝对容差(吸收舍入)
}

impl Default for ExceptionThresholds {
    fn default() -> Self {
        Self {
            negative_total_floor: -0.01,
            high_discount_rate: 30.0,
            high_void_rate: 5.0,
            tax_tolerance: 0.05,
        }
    }
}

// ==========================================
// FuzzyMatchConfig - 列名模糊匹配参数
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyMatchConfig {
    pub enabled: bool,
    pub similarity_floor: f64, // 0-1 相似度下限
}

impl Default for FuzzyMatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_floor: 0.6,
        }
    }
}

// ==========================================
// ResolvedLocation - 门店解析结果
// ==========================================
// 用途: 归一化层按门店名取 ID 与时区的统一出口
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub location_id: String,
    pub timezone: Tz,
}

// ==========================================
// PipelineConfig - 管线配置快照
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub default_timezone: Tz,
    pub locations: Vec<LocationConfig>,
    pub dayparts: Vec<DaypartInterval>,
    pub thresholds: ExceptionThresholds,
    pub fuzzy: FuzzyMatchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_timezone: DEFAULT_TIMEZONE,
            locations: Vec::new(),
            dayparts: vec![
                DaypartInterval {
                    name: "Morning".to_string(),
                    start_hour: 9,
                    end_hour: 12,
                },
                DaypartInterval {
                    name: "Afternoon".to_string(),
                    start_hour: 12,
                    end_hour: 17,
                },
                DaypartInterval {
                    name: "Evening".to_string(),
                    start_hour: 17,
                    end_hour: 21,
                },
            ],
            thresholds: ExceptionThresholds::default(),
            fuzzy: FuzzyMatchConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// 从 TOML 文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// 按门店名解析 ID 与时区
    ///
    /// 已配置门店返回配置值; 未配置门店返回确定性合成 ID
    /// (门店名的 UUIDv5 前 8 位十六进制) 与默认时区
    pub fn resolve_location(&self, location_name: &str) -> ResolvedLocation {
        if let Some(loc) = self.locations.iter().find(|l| l.name == location_name) {
            return ResolvedLocation {
                location_id: loc.id.clone(),
                timezone: loc.timezone,
            };
        }

        let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, location_name.as_bytes());
        let hex = digest.simple().to_string();
        ResolvedLocation {
            location_id: format!("loc_{}", &hex[..8]),
            timezone: self.default_timezone,
        }
    }

    /// 按本地小时取时段名(首个命中的区间; 无命中为 "Other")
    pub fn daypart_for(&self, hour: u32) -> String {
        for interval in &self.dayparts {
            if hour >= interval.start_hour && hour < interval.end_hour {
                return interval.name.clone();
            }
        }
        "Other".to_string()
    }
}
