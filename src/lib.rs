// ==========================================
// 门店销售分析系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 多来源 POS 导出 → 规范化 → 异常检测 → 星型模型查询
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 存储层 - 星型模型
pub mod store;

// 引擎层 - 检测与汇总规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 管线配置快照
pub mod config;

// 数据库基础设施(连接初始化/PRAGMA 统一)
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    CanonicalLineItem, CanonicalOrder, CanonicalProduct, CanonicalStaffMember, ExceptionRecord,
    ExceptionType, FieldDefectCounts, NormalizedBatch, QualityReport,
};

// 配置
pub use config::{ExceptionThresholds, PipelineConfig};

// 导入
pub use importer::{
    ImportError, IngestOutcome, SalesImporter, SalesImporterImpl, SourceSpec,
};

// 引擎
pub use engine::{build_quality_report, ExceptionDetector};

// 存储
pub use store::{
    DashboardAggregates, LoadSummary, QueryFilters, StarSchemaRepository, StoreError,
};

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
