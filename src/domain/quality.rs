// ==========================================
// 门店销售分析系统 - 数据质量报告模型
// ==========================================
// 职责: 定义质量报告结构与字段缺陷计数器
// 说明: 类型纠偏(TypeCoercionDefect)不是致命错误, 以计数形式
//       汇入报告供人工复核; 空数据集下各比率为 0, 不产生除零
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// FieldDefectCounts - 按规范字段的缺失/纠偏计数
// ==========================================
// 口径: 解析到目标类型失败或值缺失而使用默认值时 +1
// 存储: BTreeMap 保证序列化顺序稳定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldDefectCounts {
    counts: BTreeMap<String, u64>,
}

impl FieldDefectCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次字段缺陷
    pub fn record(&mut self, field: &str) {
        *self.counts.entry(field.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, field: &str) -> u64 {
        self.counts.get(field).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// 合并另一来源的计数
    pub fn merge(&mut self, other: &FieldDefectCounts) {
        for (field, count) in &other.counts {
            *self.counts.entry(field.clone()).or_insert(0) += count;
        }
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}

// ==========================================
// QualityReport - 数据质量报告
// ==========================================
// 消费方: 报表/可视化层(只读)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_orders: usize,                     // 订单总数
    pub total_line_items: usize,                 // 明细总数
    pub location_count: usize,                   // 覆盖门店数
    pub date_range: Option<(NaiveDate, NaiveDate)>, // 本地日期范围(含两端), 空批次为 None
    pub void_rate: f64,                          // 作废率(%)
    pub refund_rate: f64,                        // 退款率(%)
    pub avg_discount_rate: f64,                  // 平均折扣率(%)
    pub negative_totals: usize,                  // 总额为负的订单数
    pub orphan_line_items: usize,                // 孤儿明细数(引用缺陷, 显式上报)
    pub missing_values: FieldDefectCounts,       // 按字段的缺失/纠偏计数
}
