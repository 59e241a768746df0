// ==========================================
// 门店销售分析系统 - 领域类型定义
// ==========================================
// 职责: 定义全局共享的闭集枚举
// 红线: 枚举序列化格式与数据库/报表口径一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 异常类型 (Exception Type)
// ==========================================
// 闭集: 固定规则集输出,检测器之外不得扩展
// 序列化格式: snake_case (与报表层一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionType {
    NegativeTotal, // 非退款订单总额为负
    HighDiscount,  // 折扣率超过阈值
    TaxMismatch,   // 分项税额与总税额不一致
    HighVoidRate,  // 员工作废率超过阈值
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionType::NegativeTotal => write!(f, "negative_total"),
            ExceptionType::HighDiscount => write!(f, "high_discount"),
            ExceptionType::TaxMismatch => write!(f, "tax_mismatch"),
            ExceptionType::HighVoidRate => write!(f, "high_void_rate"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_type_display() {
        assert_eq!(ExceptionType::NegativeTotal.to_string(), "negative_total");
        assert_eq!(ExceptionType::HighVoidRate.to_string(), "high_void_rate");
    }

    #[test]
    fn test_exception_type_serde_snake_case() {
        let json = serde_json::to_string(&ExceptionType::TaxMismatch).unwrap();
        assert_eq!(json, "\"tax_mismatch\"");

        let parsed: ExceptionType = serde_json::from_str("\"high_discount\"").unwrap();
        assert_eq!(parsed, ExceptionType::HighDiscount);
    }
}
