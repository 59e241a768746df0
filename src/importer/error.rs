// ==========================================
// 门店销售分析系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 口径: 结构性错误(文件/必需列)为致命, 按文件中止;
//       数据质量问题(类型纠偏/引用缺陷)不走错误通道, 计入质量报告
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.json）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("JSON 解析失败: {0}")]
    JsonParseError(String),

    // ===== 列名解析错误 =====
    #[error("无法解析必需字段 {missing:?}，可用源列示例: {available:?}。请确认文件包含交易号与交易时间列")]
    SchemaResolution {
        missing: Vec<String>,
        available: Vec<String>,
    },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::JsonParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
