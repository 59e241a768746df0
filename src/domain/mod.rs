// ==========================================
// 门店销售分析系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod exception;
pub mod quality;
pub mod sales;
pub mod types;

// 重导出核心类型
pub use exception::ExceptionRecord;
pub use quality::{FieldDefectCounts, QualityReport};
pub use sales::{
    CanonicalLineItem, CanonicalOrder, CanonicalProduct, CanonicalStaffMember, NormalizedBatch,
};
pub use types::ExceptionType;
