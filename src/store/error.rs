// ==========================================
// 门店销售分析系统 - 存储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 口径: 装载事务半途失败必须整体回滚, 以 LoadFailure 上报,
//       旧数据集保持完整可查
// ==========================================

use thiserror::Error;

/// 存储层错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    // ===== 数据库错误 =====
    #[error("数据库连接失败: {0}")]
    ConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("装载事务失败(已回滚, 旧数据集未受影响): {0}")]
    LoadFailure(String),

    #[error("数据库查询失败: {0}")]
    QueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    StoreError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    StoreError::ForeignKeyViolation(msg)
                } else {
                    StoreError::QueryError(msg)
                }
            }
            _ => StoreError::QueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type StoreResult<T> = Result<T, StoreError>;
