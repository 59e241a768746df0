// ==========================================
// 门店销售分析系统 - 导入层
// ==========================================
// 职责: 外部导出文件导入, 生成内部规范化数据
// 支持: CSV, JSON(含 POS API 响应形态)
// ==========================================

// 模块声明
pub mod column_resolver;
pub mod derivation;
pub mod error;
pub mod file_parser;
pub mod normalizer;
pub mod sales_importer_impl;
pub mod sales_importer_trait;

// 重导出核心类型
pub use column_resolver::{resolve_column, ResolutionTable, CANONICAL_FIELDS};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, JsonParser, RawTable, UniversalFileParser};
pub use normalizer::{NormalizedSource, SchemaNormalizer, StagedOrder};
pub use sales_importer_impl::SalesImporterImpl;

// 重导出 Trait 接口
pub use sales_importer_trait::{
    FileParser, IngestOutcome, SalesImporter, SourceFailure, SourceIngest, SourceSpec, SourceStat,
};
