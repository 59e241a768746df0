// ==========================================
// 门店销售分析系统 - 数据质量报告生成
// ==========================================
// 职责: 对规范化批次计算汇总统计, 供报表/可视化层只读消费
// 口径: 空批次下各比率为 0, 日期范围为 None, 不产生除零
// ==========================================

use crate::domain::quality::{FieldDefectCounts, QualityReport};
use crate::domain::sales::NormalizedBatch;
use std::collections::HashSet;

/// 生成质量报告
///
/// defects 为导入阶段累计的字段缺失/纠偏计数
pub fn build_quality_report(batch: &NormalizedBatch, defects: &FieldDefectCounts) -> QualityReport {
    let total_orders = batch.orders.len();
    let total_line_items = batch.line_items.len();

    let locations: HashSet<&str> = batch
        .orders
        .iter()
        .map(|o| o.location_name.as_str())
        .collect();

    let date_range = match (
        batch.orders.iter().map(|o| o.date).min(),
        batch.orders.iter().map(|o| o.date).max(),
    ) {
        (Some(min), Some(max)) => Some((min, max)),
        _ => None,
    };

    let (void_rate, refund_rate, avg_discount_rate) = if total_orders > 0 {
        let void_count = batch.orders.iter().filter(|o| o.voided).count();
        let refund_count = batch.orders.iter().filter(|o| o.refunded).count();
        let discount_sum: f64 = batch.orders.iter().map(|o| o.discount_rate).sum();
        (
            void_count as f64 / total_orders as f64 * 100.0,
            refund_count as f64 / total_orders as f64 * 100.0,
            discount_sum / total_orders as f64,
        )
    } else {
        (0.0, 0.0, 0.0)
    };

    let negative_totals = batch.orders.iter().filter(|o| o.total < 0.0).count();

    // 孤儿明细: 引用缺陷, 显式上报而非丢弃
    let order_ids: HashSet<&str> = batch.orders.iter().map(|o| o.order_id.as_str()).collect();
    let orphan_line_items = batch
        .line_items
        .iter()
        .filter(|li| !order_ids.contains(li.order_id.as_str()))
        .count();

    QualityReport {
        total_orders,
        total_line_items,
        location_count: locations.len(),
        date_range,
        void_rate,
        refund_rate,
        avg_discount_rate,
        negative_totals,
        orphan_line_items,
        missing_values: defects.clone(),
    }
}
