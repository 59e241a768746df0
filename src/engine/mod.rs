// ==========================================
// 门店销售分析系统 - 引擎层
// ==========================================
// 职责: 实现检测与汇总的业务规则
// 红线: Engine 不拼 SQL, 不修改输入数据
// ==========================================

pub mod exception_detector;
pub mod quality_report;

// 重导出核心引擎
pub use exception_detector::ExceptionDetector;
pub use quality_report::build_quality_report;
