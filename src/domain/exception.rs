// ==========================================
// 门店销售分析系统 - 异常记录模型
// ==========================================
// 职责: 定义异常检测输出的统一结构
// 说明: 异常记录是"被标记的观察", 每轮检测重新生成, 不持久化为可变状态
// ==========================================

use crate::domain::types::ExceptionType;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// ==========================================
// ExceptionRecord - 异常记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub exception_type: ExceptionType,          // 异常类型(闭集)
    pub order_id: Option<String>,               // 关联订单(员工级规则为 None)
    pub location: String,                       // 门店名称(员工级规则为 "All")
    pub timestamp: Option<DateTime<FixedOffset>>, // 订单本地时间(员工级规则为 None)
    pub value: f64,                             // 规则度量值(金额/比率/差额)
    pub description: String,                    // 人读描述
}

impl ExceptionRecord {
    /// 构造订单级异常
    pub fn for_order(
        exception_type: ExceptionType,
        order_id: &str,
        location: &str,
        timestamp: DateTime<FixedOffset>,
        value: f64,
        description: String,
    ) -> Self {
        Self {
            exception_type,
            order_id: Some(order_id.to_string()),
            location: location.to_string(),
            timestamp: Some(timestamp),
            value,
            description,
        }
    }

    /// 构造员工级聚合异常(无订单/无时间戳)
    pub fn for_staff(exception_type: ExceptionType, value: f64, description: String) -> Self {
        Self {
            exception_type,
            order_id: None,
            location: "All".to_string(),
            timestamp: None,
            value,
            description,
        }
    }
}
