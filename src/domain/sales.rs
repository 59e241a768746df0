// ==========================================
// 门店销售分析系统 - 销售领域模型
// ==========================================
// 职责: 定义规范化后的内部实体(订单/明细/商品/员工)
// 红线: 所有来源归一到同一字段集,不保留来源私有字段
// ==========================================

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ==========================================
// CanonicalOrder - 规范化订单
// ==========================================
// 用途: 导入层写入,异常检测/星型模型只读
// 不变量: order_id 在单次装载内唯一; timestamp 必须带时区;
//         discount_rate 始终落在 [-100, 100]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalOrder {
    // ===== 主键 =====
    pub order_id: String, // 订单唯一标识(交易号)

    // ===== 门店与员工 =====
    pub location_id: String,   // 门店 ID(配置或派生)
    pub location_name: String, // 门店名称
    pub staff_id: String,      // 员工 ID(缺失时为 "unknown")

    // ===== 时间 =====
    pub timestamp: DateTime<FixedOffset>, // 门店本地时间(带偏移)

    // ===== 订单属性 =====
    pub order_type: String,       // 订单类型(归一后: in_store/pickup/delivery, 未知原样保留)
    pub is_medical: bool,         // 是否医用订单
    pub tender_type: String,      // 支付方式(小写)
    pub voided: bool,             // 是否作废
    pub refunded: bool,           // 是否退款
    pub promo_code: Option<String>, // 促销码

    // ===== 金额 =====
    pub subtotal: f64,      // 税前小计
    pub excise_tax: f64,    // 消费税
    pub state_tax: f64,     // 州税
    pub local_tax: f64,     // 地方税
    pub total_tax: f64,     // 总税额
    pub discount: f64,      // 订单折扣额
    pub total: f64,         // 订单总额
    pub discount_rate: f64, // 折扣率(派生, 百分比, 已夹取)

    // ===== 派生时间字段 =====
    pub date: NaiveDate,        // 本地日期
    pub hour: u32,              // 本地小时 (0-23)
    pub day_of_week: String,    // 星期名(英文)
    pub daypart: String,        // 时段名(配置表首个命中, 无命中为 Other)
    pub time_bucket_id: String, // 小时桶 ID(本地时间 %Y%m%d%H)
}

// ==========================================
// CanonicalLineItem - 规范化订单明细
// ==========================================
// 不变量: order_id 必须指向已装载订单, 孤儿明细是数据质量缺陷,
//         由装载层显式上报,不得静默丢弃
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalLineItem {
    pub line_id: String,      // 明细唯一标识
    pub order_id: String,     // 所属订单(多对一)
    pub product_id: String,   // 商品 ID
    pub product_name: String, // 商品名(小写)
    pub category: String,     // 品类(Title Case)
    pub quantity: f64,        // 数量
    pub unit_price: f64,      // 单价
    pub unit_cost: f64,       // 单位成本
    pub discount: f64,        // 明细折扣额
    pub total: f64,           // 明细总额
    pub margin: f64,          // 毛利 = (unit_price - unit_cost) * quantity, 允许为负
}

// ==========================================
// CanonicalProduct - 规范化商品
// ==========================================
// 去重口径: product_id 保留首见定义 (keep-first)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalProduct {
    pub product_id: String,
    pub name: String,        // 小写
    pub category: String,    // Title Case
    pub subcategory: String, // Title Case, 缺失为空串
    pub unit_cost: f64,
    pub unit_price: f64,
}

// ==========================================
// CanonicalStaffMember - 规范化员工
// ==========================================
// 去重口径: staff_id 保留首见定义 (keep-first)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalStaffMember {
    pub staff_id: String,
    pub name: String,
}

// ==========================================
// NormalizedBatch - 单次装载的规范化数据集
// ==========================================
// 用途: 导入层输出, 异常检测/质量报告/星型模型的统一输入
// 说明: 跨来源拼接对最终表内容可交换, 但商品/员工的 keep-first
//       去重要求按来源声明顺序拼接,保证重复运行结果一致
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizedBatch {
    pub orders: Vec<CanonicalOrder>,
    pub line_items: Vec<CanonicalLineItem>,
    pub products: Vec<CanonicalProduct>,
    pub staff: Vec<CanonicalStaffMember>,
}

impl NormalizedBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 拼接另一个批次(商品/员工按 keep-first 去重)
    pub fn concat(&mut self, other: NormalizedBatch) {
        self.orders.extend(other.orders);
        self.line_items.extend(other.line_items);

        let seen_products: HashSet<String> = self
            .products
            .iter()
            .map(|p| p.product_id.clone())
            .collect();
        for product in other.products {
            if !seen_products.contains(&product.product_id) {
                self.products.push(product);
            }
        }

        let seen_staff: HashSet<String> =
            self.staff.iter().map(|s| s.staff_id.clone()).collect();
        for member in other.staff {
            if !seen_staff.contains(&member.staff_id) {
                self.staff.push(member);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.line_items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, name: &str) -> CanonicalProduct {
        CanonicalProduct {
            product_id: id.to_string(),
            name: name.to_string(),
            category: "Flower".to_string(),
            subcategory: String::new(),
            unit_cost: 5.0,
            unit_price: 10.0,
        }
    }

    #[test]
    fn test_concat_keeps_first_product_definition() {
        let mut batch = NormalizedBatch::new();
        batch.products.push(product("prod_1", "first seen"));

        let mut other = NormalizedBatch::new();
        other.products.push(product("prod_1", "later duplicate"));
        other.products.push(product("prod_2", "fresh"));

        batch.concat(other);

        assert_eq!(batch.products.len(), 2);
        assert_eq!(batch.products[0].name, "first seen");
        assert_eq!(batch.products[1].product_id, "prod_2");
    }

    #[test]
    fn test_concat_keeps_first_staff_definition() {
        let mut batch = NormalizedBatch::new();
        batch.staff.push(CanonicalStaffMember {
            staff_id: "staff_001".to_string(),
            name: "Cashier_001".to_string(),
        });

        let mut other = NormalizedBatch::new();
        other.staff.push(CanonicalStaffMember {
            staff_id: "staff_001".to_string(),
            name: "Renamed".to_string(),
        });

        batch.concat(other);

        assert_eq!(batch.staff.len(), 1);
        assert_eq!(batch.staff[0].name, "Cashier_001");
    }
}
