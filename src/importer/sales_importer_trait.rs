// ==========================================
// 门店销售分析系统 - 销售导入 Trait
// ==========================================
// 职责: 定义销售数据导入接口(不包含实现)
// ==========================================

use crate::domain::quality::FieldDefectCounts;
use crate::domain::sales::NormalizedBatch;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::RawTable;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口(阶段 0)
// 实现者: CsvParser, JsonParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行表(列名 → 字符串值)
    fn parse_to_raw_table(&self, file_path: &Path) -> ImportResult<RawTable>;
}

// ==========================================
// SourceSpec - 来源声明
// ==========================================
// 说明: 多来源按声明顺序依次处理,
//       保证商品/员工 keep-first 去重在重复运行间可复现
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub path: PathBuf,
    pub location_name: String,
}

impl SourceSpec {
    pub fn new<P: Into<PathBuf>>(path: P, location_name: &str) -> Self {
        Self {
            path: path.into(),
            location_name: location_name.to_string(),
        }
    }
}

// ==========================================
// SourceIngest - 单文件导入结果
// ==========================================
#[derive(Debug)]
pub struct SourceIngest {
    pub batch: NormalizedBatch,
    pub defects: FieldDefectCounts,
    pub total_rows: usize,   // 文件内数据行数
    pub skipped_rows: usize, // order_id 为空而跳过的行数
}

// ==========================================
// IngestOutcome - 多来源导入汇总
// ==========================================
// 口径: 单个文件失败不影响其余来源, 失败记录进 failures
#[derive(Debug)]
pub struct IngestOutcome {
    pub batch_id: String, // 批次 ID (UUID)
    pub batch: NormalizedBatch,
    pub defects: FieldDefectCounts,
    pub sources: Vec<SourceStat>,
    pub failures: Vec<SourceFailure>,
}

#[derive(Debug, Clone)]
pub struct SourceStat {
    pub file: String,
    pub location: String,
    pub orders: usize,
    pub line_items: usize,
    pub skipped_rows: usize,
}

#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub file: String,
    pub location: String,
    pub error: String,
}

// ==========================================
// SalesImporter Trait
// ==========================================
// 用途: 销售导入主接口
// 实现者: SalesImporterImpl
#[async_trait]
pub trait SalesImporter: Send + Sync {
    /// 导入单个导出文件
    ///
    /// # 参数
    /// - file_path: 文件路径(.csv / .json)
    /// - location_name: 该文件归属门店名
    ///
    /// # 返回
    /// - Ok(SourceIngest): 规范化批次 + 质量计数
    /// - Err: 文件读取/必需列解析等致命错误(仅影响本文件)
    ///
    /// # 导入流程(4 个阶段)
    /// 1. 文件读取与解析
    /// 2. 列名解析(每来源一次)
    /// 3. 行分组与模式归一化
    /// 4. 时间/财务字段派生
    async fn ingest_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        location_name: &str,
    ) -> ImportResult<SourceIngest>;

    /// 按声明顺序导入多个来源并拼接为单一批次
    ///
    /// 单个文件失败不中止整体流程, 也不影响已拼接数据
    async fn ingest_sources(&self, sources: Vec<SourceSpec>) -> ImportResult<IngestOutcome>;
}
