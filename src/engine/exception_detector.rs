// ==========================================
// 门店销售分析系统 - 异常检测器实现
// ==========================================
// 职责: 对规范化订单集执行固定规则集, 产出统一异常列表
// 口径: 各规则独立评估, 同一订单可命中多条;
//       输出按规则声明顺序分组, 组内按输入顺序
// 红线: 纯函数, 不修改输入订单
// ==========================================

use crate::config::ExceptionThresholds;
use crate::domain::exception::ExceptionRecord;
use crate::domain::sales::CanonicalOrder;
use crate::domain::types::ExceptionType;
use std::collections::BTreeMap;

// ==========================================
// ExceptionDetector
// ==========================================
pub struct ExceptionDetector {
    thresholds: ExceptionThresholds,
}

impl ExceptionDetector {
    pub fn new(thresholds: ExceptionThresholds) -> Self {
        Self { thresholds }
    }

    /// 执行全部规则
    pub fn detect(&self, orders: &[CanonicalOrder]) -> Vec<ExceptionRecord> {
        let mut exceptions = Vec::new();
        exceptions.extend(self.detect_negative_totals(orders));
        exceptions.extend(self.detect_high_discounts(orders));
        exceptions.extend(self.detect_tax_mismatches(orders));
        exceptions.extend(self.detect_high_void_rates(orders));
        exceptions
    }

    /// 规则 1: 非退款订单总额为负
    ///
    /// 退款单的负总额是预期行为, 不标记
    fn detect_negative_totals(&self, orders: &[CanonicalOrder]) -> Vec<ExceptionRecord> {
        orders
            .iter()
            .filter(|o| o.total < self.thresholds.negative_total_floor && !o.refunded)
            .map(|o| {
                ExceptionRecord::for_order(
                    ExceptionType::NegativeTotal,
                    &o.order_id,
                    &o.location_name,
                    o.timestamp,
                    o.total,
                    format!("Negative total: ${:.2}", o.total),
                )
            })
            .collect()
    }

    /// 规则 2: 折扣率超过阈值
    fn detect_high_discounts(&self, orders: &[CanonicalOrder]) -> Vec<ExceptionRecord> {
        orders
            .iter()
            .filter(|o| o.discount_rate > self.thresholds.high_discount_rate)
            .map(|o| {
                ExceptionRecord::for_order(
                    ExceptionType::HighDiscount,
                    &o.order_id,
                    &o.location_name,
                    o.timestamp,
                    o.discount_rate,
                    format!("High discount rate: {:.1}%", o.discount_rate),
                )
            })
            .collect()
    }

    /// 规则 3: 分项税额之和与总税额偏差超过绝对容差
    ///
    /// 计算税额与税差只在本轮检测内使用, 不写回订单
    fn detect_tax_mismatches(&self, orders: &[CanonicalOrder]) -> Vec<ExceptionRecord> {
        orders
            .iter()
            .filter_map(|o| {
                let calculated_tax = o.excise_tax + o.state_tax + o.local_tax;
                let tax_diff = (o.total_tax - calculated_tax).abs();
                if tax_diff > self.thresholds.tax_tolerance {
                    Some(ExceptionRecord::for_order(
                        ExceptionType::TaxMismatch,
                        &o.order_id,
                        &o.location_name,
                        o.timestamp,
                        tax_diff,
                        format!("Tax mismatch: ${:.2}", tax_diff),
                    ))
                } else {
                    None
                }
            })
            .collect()
    }

    /// 规则 4: 员工作废率超过阈值
    ///
    /// 按员工聚合, 每名超限员工只产出一条记录(order_id 为空);
    /// 员工按 ID 排序遍历, 保证重复运行输出一致
    fn detect_high_void_rates(&self, orders: &[CanonicalOrder]) -> Vec<ExceptionRecord> {
        let mut per_staff: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for order in orders {
            let entry = per_staff.entry(order.staff_id.as_str()).or_insert((0, 0));
            entry.0 += 1;
            if order.voided {
                entry.1 += 1;
            }
        }

        per_staff
            .into_iter()
            .filter_map(|(staff_id, (order_count, void_count))| {
                let void_rate = void_count as f64 / order_count as f64 * 100.0;
                if void_rate > self.thresholds.high_void_rate {
                    Some(ExceptionRecord::for_staff(
                        ExceptionType::HighVoidRate,
                        void_rate,
                        format!("Staff {}: {:.1}% void rate", staff_id, void_rate),
                    ))
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn order(order_id: &str) -> CanonicalOrder {
        let offset = FixedOffset::west_opt(4 * 3600).unwrap();
        CanonicalOrder {
            order_id: order_id.to_string(),
            location_id: "loc_001".to_string(),
            location_name: "Columbus".to_string(),
            staff_id: "staff_001".to_string(),
            timestamp: offset.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
            order_type: "in_store".to_string(),
            is_medical: false,
            tender_type: "cash".to_string(),
            voided: false,
            refunded: false,
            promo_code: None,
            subtotal: 100.0,
            excise_tax: 10.0,
            state_tax: 6.0,
            local_tax: 2.0,
            total_tax: 18.0,
            discount: 0.0,
            total: 118.0,
            discount_rate: 0.0,
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            hour: 10,
            day_of_week: "Sunday".to_string(),
            daypart: "Morning".to_string(),
            time_bucket_id: "2025060110".to_string(),
        }
    }

    fn detector() -> ExceptionDetector {
        ExceptionDetector::new(ExceptionThresholds::default())
    }

    #[test]
    fn test_negative_total_flagged_unless_refunded() {
        let mut bad = order("ord_neg");
        bad.total = -15.0;

        let mut refund = order("ord_refund");
        refund.total = -15.0;
        refund.refunded = true;

        let exceptions = detector().detect(&[bad, refund]);

        let negatives: Vec<_> = exceptions
            .iter()
            .filter(|e| e.exception_type == ExceptionType::NegativeTotal)
            .collect();
        assert_eq!(negatives.len(), 1);
        assert_eq!(negatives[0].order_id.as_deref(), Some("ord_neg"));
        assert_eq!(negatives[0].value, -15.0);
    }

    #[test]
    fn test_high_discount_over_threshold() {
        let mut discounted = order("ord_disc");
        discounted.discount_rate = 35.0;

        let mut normal = order("ord_ok");
        normal.discount_rate = 30.0; // 等于阈值不命中

        let exceptions = detector().detect(&[discounted, normal]);

        let hits: Vec<_> = exceptions
            .iter()
            .filter(|e| e.exception_type == ExceptionType::HighDiscount)
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].order_id.as_deref(), Some("ord_disc"));
    }

    #[test]
    fn test_tax_mismatch_on_component_sum_diff() {
        // excise 5 + state 3 + local 1 = 9, total_tax 10 → 差额 1.00
        let mut mismatched = order("ord_tax");
        mismatched.excise_tax = 5.0;
        mismatched.state_tax = 3.0;
        mismatched.local_tax = 1.0;
        mismatched.total_tax = 10.0;

        let exceptions = detector().detect(&[mismatched]);

        let hits: Vec<_> = exceptions
            .iter()
            .filter(|e| e.exception_type == ExceptionType::TaxMismatch)
            .collect();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tax_rounding_within_tolerance_not_flagged() {
        let mut rounded = order("ord_round");
        rounded.excise_tax = 5.0;
        rounded.state_tax = 3.0;
        rounded.local_tax = 1.0;
        rounded.total_tax = 9.04; // 容差 0.05 以内

        let exceptions = detector().detect(&[rounded]);
        assert!(exceptions
            .iter()
            .all(|e| e.exception_type != ExceptionType::TaxMismatch));
    }

    #[test]
    fn test_high_void_rate_emitted_once_per_staff() {
        // 120 单 8 作废 = 6.67% → 命中; 100 单 4 作废 = 4% → 不命中
        let mut orders = Vec::new();
        for i in 0..120 {
            let mut o = order(&format!("ord_a_{i}"));
            o.staff_id = "staff_busy".to_string();
            o.voided = i < 8;
            orders.push(o);
        }
        for i in 0..100 {
            let mut o = order(&format!("ord_b_{i}"));
            o.staff_id = "staff_ok".to_string();
            o.voided = i < 4;
            orders.push(o);
        }

        let exceptions = detector().detect(&orders);

        let voids: Vec<_> = exceptions
            .iter()
            .filter(|e| e.exception_type == ExceptionType::HighVoidRate)
            .collect();
        assert_eq!(voids.len(), 1);
        assert!(voids[0].order_id.is_none());
        assert_eq!(voids[0].location, "All");
        assert!((voids[0].value - 6.666_666_666_666_667).abs() < 1e-6);
        assert!(voids[0].description.contains("staff_busy"));
    }

    #[test]
    fn test_output_grouped_by_rule_order() {
        let mut negative = order("ord_neg");
        negative.total = -5.0;

        let mut discounted = order("ord_disc");
        discounted.discount_rate = 50.0;

        // 输入顺序与规则顺序相反, 输出仍按规则分组
        let exceptions = detector().detect(&[discounted, negative]);

        assert_eq!(exceptions[0].exception_type, ExceptionType::NegativeTotal);
        assert_eq!(exceptions[1].exception_type, ExceptionType::HighDiscount);
    }

    #[test]
    fn test_single_order_can_trigger_multiple_rules() {
        let mut messy = order("ord_messy");
        messy.total = -20.0;
        messy.discount_rate = 45.0;
        messy.total_tax = 99.0;

        let exceptions = detector().detect(&[messy]);
        assert_eq!(exceptions.len(), 3);
    }
}
