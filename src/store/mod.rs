// ==========================================
// 门店销售分析系统 - 存储层
// ==========================================
// 职责: 星型模型的持久化与聚合查询
// 红线: Repository 不含业务逻辑; 所有查询使用参数化, 防止 SQL 注入
// ==========================================

pub mod error;
pub mod sql_builder;
pub mod star_schema_repo;

// 重导出核心类型
pub use error::{StoreError, StoreResult};
pub use sql_builder::BoundQueryBuilder;
pub use star_schema_repo::{
    CategoryMixRow, DashboardAggregates, HeadlineKpis, HourlyActivityRow, LoadSummary,
    QueryFilters, StarSchemaRepository, TenderMixRow, TopProductRow,
};
