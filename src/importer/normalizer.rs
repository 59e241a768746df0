// ==========================================
// 门店销售分析系统 - 模式归一化器实现
// ==========================================
// 职责: 解析表 + 原始行组 → 规范订单与明细
// 口径: 标量提取统一走三步安全取值:
//       (a) 按解析列取值 (b) 空白/NULL/NaN 视为缺失
//       (c) 目标类型纠偏, 失败回退文档默认值并计数(不报错)
// ==========================================

use crate::config::ResolvedLocation;
use crate::domain::quality::FieldDefectCounts;
use crate::domain::sales::{CanonicalLineItem, CanonicalProduct, CanonicalStaffMember};
use crate::importer::column_resolver::ResolutionTable;
use crate::importer::derivation;
use std::collections::{HashMap, HashSet};

// ==========================================
// StagedOrder - 订单归一化中间结构
// ==========================================
// 生命周期: 仅在导入管线内, 由派生阶段补全为 CanonicalOrder
#[derive(Debug, Clone)]
pub struct StagedOrder {
    pub order_id: String,
    pub location_id: String,
    pub location_name: String,
    pub staff_id: String,
    pub raw_timestamp: Option<String>, // 原文时间戳, 派生阶段解析
    pub order_type: String,
    pub is_medical: bool,
    pub explicit_subtotal: Option<f64>, // 源列缺席/值缺失时为 None
    pub excise_tax: f64,
    pub state_tax: f64,
    pub local_tax: f64,
    pub total_tax: f64,
    pub discount: f64,
    pub total: f64,
    pub tender_type: String,
    pub voided: bool,
    pub refunded: bool,
    pub promo_code: Option<String>,
}

// ==========================================
// NormalizedSource - 单来源归一化输出
// ==========================================
#[derive(Debug, Default)]
pub struct NormalizedSource {
    pub staged_orders: Vec<StagedOrder>,
    pub line_items: Vec<CanonicalLineItem>,
    pub products: Vec<CanonicalProduct>,
    pub staff: Vec<CanonicalStaffMember>,
    pub defects: FieldDefectCounts,
    pub skipped_rows: usize, // order_id 为空而跳过的行数
}

// ==========================================
// SchemaNormalizer
// ==========================================
pub struct SchemaNormalizer<'a> {
    resolution: &'a ResolutionTable,
    headers: &'a [String],
    location: &'a ResolvedLocation,
    location_name: &'a str,
}

impl<'a> SchemaNormalizer<'a> {
    pub fn new(
        resolution: &'a ResolutionTable,
        headers: &'a [String],
        location: &'a ResolvedLocation,
        location_name: &'a str,
    ) -> Self {
        Self {
            resolution,
            headers,
            location,
            location_name,
        }
    }

    /// 归一化一个来源的全部行
    ///
    /// 行按解析后的 order_id 分组(保持首见顺序), 每组产出
    /// 一条 StagedOrder 与 N 条明细; 商品/员工字典按 keep-first 去重
    pub fn normalize(&self, rows: &[HashMap<String, String>]) -> NormalizedSource {
        let mut out = NormalizedSource::default();

        // === 行分组(保持首见顺序) ===
        let mut groups: Vec<(String, Vec<(usize, &HashMap<String, String>)>)> = Vec::new();
        let mut group_index: HashMap<String, usize> = HashMap::new();

        for (row_idx, row) in rows.iter().enumerate() {
            match self.value_of(row, "order_id") {
                Some(order_id) => {
                    let entry = group_index.entry(order_id.to_string());
                    match entry {
                        std::collections::hash_map::Entry::Occupied(slot) => {
                            groups[*slot.get()].1.push((row_idx, row));
                        }
                        std::collections::hash_map::Entry::Vacant(slot) => {
                            slot.insert(groups.len());
                            groups.push((order_id.to_string(), vec![(row_idx, row)]));
                        }
                    }
                }
                None => out.skipped_rows += 1,
            }
        }

        let mut seen_products: HashSet<String> = HashSet::new();
        let mut seen_staff: HashSet<String> = HashSet::new();

        for (order_id, group_rows) in &groups {
            let (_, first_row) = group_rows[0];

            out.staged_orders
                .push(self.build_order(order_id, first_row, &mut out.defects));

            self.collect_staff(first_row, &mut seen_staff, &mut out.staff, &mut out.defects);

            for (row_idx, row) in group_rows {
                self.build_line_item(
                    order_id,
                    *row_idx,
                    row,
                    &mut seen_products,
                    &mut out.products,
                    &mut out.line_items,
                    &mut out.defects,
                );
            }
        }

        out
    }

    // ==========================================
    // 订单构建
    // ==========================================
    fn build_order(
        &self,
        order_id: &str,
        first_row: &HashMap<String, String>,
        defects: &mut FieldDefectCounts,
    ) -> StagedOrder {
        let staff_id = self.coerce_string(first_row, "staff_id", "unknown", defects);

        let raw_timestamp = self.value_of(first_row, "timestamp").map(|s| s.to_string());
        if raw_timestamp.is_none() {
            defects.record("timestamp");
        }

        StagedOrder {
            order_id: order_id.to_string(),
            location_id: self.location.location_id.clone(),
            location_name: self.location_name.to_string(),
            staff_id,
            raw_timestamp,
            order_type: self.coerce_string(first_row, "order_type", "in-store", defects),
            is_medical: self.coerce_bool(first_row, "is_medical", false, defects),
            explicit_subtotal: self.coerce_f64_opt(first_row, "order_subtotal", defects),
            excise_tax: self.coerce_f64(first_row, "excise_tax", 0.0, defects),
            state_tax: self.coerce_f64(first_row, "state_tax", 0.0, defects),
            local_tax: self.coerce_f64(first_row, "local_tax", 0.0, defects),
            total_tax: self.coerce_f64(first_row, "total_tax", 0.0, defects),
            discount: self.coerce_f64(first_row, "order_discount", 0.0, defects),
            total: self.coerce_f64(first_row, "order_total", 0.0, defects),
            tender_type: self.infer_tender_type(first_row, defects),
            voided: self.coerce_bool(first_row, "voided", false, defects),
            refunded: self.coerce_bool(first_row, "refunded", false, defects),
            promo_code: self.value_of(first_row, "promo_code").map(|s| s.to_string()),
        }
    }

    // ==========================================
    // 明细与商品构建
    // ==========================================
    #[allow(clippy::too_many_arguments)]
    fn build_line_item(
        &self,
        order_id: &str,
        row_idx: usize,
        row: &HashMap<String, String>,
        seen_products: &mut HashSet<String>,
        products: &mut Vec<CanonicalProduct>,
        line_items: &mut Vec<CanonicalLineItem>,
        defects: &mut FieldDefectCounts,
    ) {
        // 合成 ID 由行位派生, 重复运行结果一致
        let line_id = self
            .value_of(row, "line_id")
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("line_{}", row_idx + 1));
        let product_id = match self.value_of(row, "product_id") {
            Some(v) => v.to_string(),
            None => {
                defects.record("product_id");
                format!("prod_{}", row_idx + 1)
            }
        };

        let product_name = self
            .coerce_string(row, "product_name", "Unknown Product", defects)
            .to_lowercase();
        let category = title_case(&self.coerce_string(row, "category", "Other", defects));
        let subcategory = self
            .value_of(row, "subcategory")
            .map(|s| title_case(s))
            .unwrap_or_default();

        let quantity = self.coerce_f64(row, "quantity", 1.0, defects);
        let unit_price = self.coerce_f64(row, "unit_price", 0.0, defects);
        let unit_cost = self.coerce_f64(row, "unit_cost", 0.0, defects);

        line_items.push(CanonicalLineItem {
            line_id,
            order_id: order_id.to_string(),
            product_id: product_id.clone(),
            product_name: product_name.clone(),
            category: category.clone(),
            quantity,
            unit_price,
            unit_cost,
            discount: self.coerce_f64(row, "item_discount", 0.0, defects),
            total: self.coerce_f64(row, "item_total", 0.0, defects),
            margin: derivation::derive_margin(unit_price, unit_cost, quantity),
        });

        if seen_products.insert(product_id.clone()) {
            products.push(CanonicalProduct {
                product_id,
                name: product_name,
                category,
                subcategory,
                unit_cost,
                unit_price,
            });
        }
    }

    fn collect_staff(
        &self,
        first_row: &HashMap<String, String>,
        seen_staff: &mut HashSet<String>,
        staff: &mut Vec<CanonicalStaffMember>,
        defects: &mut FieldDefectCounts,
    ) {
        let Some(staff_id) = self.value_of(first_row, "staff_id") else {
            return;
        };
        let staff_id = staff_id.to_string();
        if staff_id == "unknown" || !seen_staff.insert(staff_id.clone()) {
            return;
        }

        let name = self
            .coerce_string(first_row, "staff_name", &format!("Staff_{}", staff_id), defects);
        staff.push(CanonicalStaffMember {
            staff_id,
            name,
        });
    }

    // ==========================================
    // 支付方式推断
    // ==========================================
    // 解析列缺席时的回退: 按源列声明顺序扫描数值列,
    // 列名含 credit/debit/cash 且值为正者首个命中; 再无则默认 cash
    fn infer_tender_type(
        &self,
        first_row: &HashMap<String, String>,
        defects: &mut FieldDefectCounts,
    ) -> String {
        if let Some(value) = self.value_of(first_row, "tender_type") {
            return value.to_lowercase();
        }
        defects.record("tender_type");

        if !self.resolution.is_resolved("tender_type") {
            for header in self.headers {
                let header_lower = header.to_lowercase();
                let Some(raw) = first_row.get(header) else {
                    continue;
                };
                let Ok(amount) = raw.trim().parse::<f64>() else {
                    continue;
                };
                if amount <= 0.0 {
                    continue;
                }
                if header_lower.contains("credit") {
                    return "credit".to_string();
                }
                if header_lower.contains("debit") {
                    return "debit".to_string();
                }
                if header_lower.contains("cash") {
                    return "cash".to_string();
                }
            }
        }

        "cash".to_string()
    }

    // ==========================================
    // 三步安全取值
    // ==========================================

    /// 步骤 (a)+(b): 按解析列取值, 空白/NULL/NaN 视为缺失
    fn value_of<'r>(&self, row: &'r HashMap<String, String>, canonical: &str) -> Option<&'r str> {
        let source = self.resolution.source_column(canonical)?;
        let raw = row.get(source)?;
        normalize_cell(raw)
    }

    fn coerce_string(
        &self,
        row: &HashMap<String, String>,
        canonical: &str,
        default: &str,
        defects: &mut FieldDefectCounts,
    ) -> String {
        match self.value_of(row, canonical) {
            Some(value) => value.to_string(),
            None => {
                defects.record(canonical);
                default.to_string()
            }
        }
    }

    fn coerce_f64(
        &self,
        row: &HashMap<String, String>,
        canonical: &str,
        default: f64,
        defects: &mut FieldDefectCounts,
    ) -> f64 {
        match self.coerce_f64_opt(row, canonical, defects) {
            Some(value) => value,
            None => default,
        }
    }

    /// 数值纠偏的显式口径: 缺失与解析失败都计入缺陷并返回 None
    fn coerce_f64_opt(
        &self,
        row: &HashMap<String, String>,
        canonical: &str,
        defects: &mut FieldDefectCounts,
    ) -> Option<f64> {
        match self.value_of(row, canonical) {
            Some(value) => match value.parse::<f64>() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    defects.record(canonical);
                    None
                }
            },
            None => {
                defects.record(canonical);
                None
            }
        }
    }

    fn coerce_bool(
        &self,
        row: &HashMap<String, String>,
        canonical: &str,
        default: bool,
        defects: &mut FieldDefectCounts,
    ) -> bool {
        match self.value_of(row, canonical) {
            Some(value) => match parse_bool(value) {
                Some(parsed) => parsed,
                None => {
                    defects.record(canonical);
                    default
                }
            },
            None => {
                defects.record(canonical);
                default
            }
        }
    }
}

/// 空白/NULL/NaN 统一视为缺失
fn normalize_cell(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if lower == "null" || lower == "none" || lower == "nan" {
        return None;
    }
    Some(trimmed)
}

/// 布尔纠偏: 1/0, y/n, yes/no, true/false(忽略大小写)
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "y" | "yes" | "true" => Some(true),
        "0" | "n" | "no" | "false" => Some(false),
        _ => None,
    }
}

/// 逐词首字母大写(品类口径)
fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
