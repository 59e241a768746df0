// ==========================================
// 门店销售分析系统 - 配置层
// ==========================================
// 职责: 管线配置快照的定义与加载
// ==========================================

pub mod settings;

pub use settings::{
    DaypartInterval, ExceptionThresholds, FuzzyMatchConfig, LocationConfig, PipelineConfig,
    ResolvedLocation, DEFAULT_TIMEZONE,
};
