// ==========================================
// 门店销售分析系统 - 文件解析器实现
// ==========================================
// 职责: 外部导出文件 → 原始行表(列名 → 字符串值)
// 支持: CSV (.csv) / JSON (.json, 含 POS API 响应形态)
// ==========================================

use crate::importer::error::ImportError;
use crate::importer::sales_importer_trait::FileParser;
use csv::ReaderBuilder;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

// ==========================================
// RawTable - 原始行表
// ==========================================
// 说明: headers 保留源列声明顺序, 供顺序敏感的回退规则
//       (如支付方式按列序推断)使用; 行内值一律为去空白字符串
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_table(&self, file_path: &Path) -> Result<RawTable, ImportError> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(row_map);
        }

        Ok(RawTable { headers, rows })
    }
}

// ==========================================
// JSON Parser 实现
// ==========================================
// 接受三种形态, 统一展平为"每行一条交易明细"的行表:
// 1. 预归一对象: {orders, line_items, products, staff}
// 2. API 响应对象: 订单数组位于 orders/receipts/transactions
//    (顶层或 data 之下), 明细内嵌于 items/line_items
// 3. 裸订单数组
pub struct JsonParser;

/// 展平输出的固定列(顺序即 headers 顺序)
const FLAT_HEADERS: &[&str] = &[
    "order_id",
    "timestamp",
    "staff_id",
    "staff_name",
    "order_type",
    "is_medical",
    "order_subtotal",
    "excise_tax",
    "state_tax",
    "local_tax",
    "total_tax",
    "order_discount",
    "order_total",
    "tender_type",
    "voided",
    "refunded",
    "promo_code",
    "line_id",
    "product_id",
    "product_name",
    "category",
    "subcategory",
    "quantity",
    "unit_price",
    "unit_cost",
    "item_discount",
    "item_total",
];

impl FileParser for JsonParser {
    fn parse_to_raw_table(&self, file_path: &Path) -> Result<RawTable, ImportError> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let content = std::fs::read_to_string(file_path)?;
        let root: Value = serde_json::from_str(&content)?;

        let orders = extract_order_array(&root).ok_or_else(|| {
            ImportError::JsonParseError(format!(
                "未找到订单数组, 顶层键: {:?}",
                top_level_keys(&root)
            ))
        })?;

        // 预归一形态的辅助字典
        let product_subcategories = build_product_subcategory_lookup(&root);
        let staff_names = build_staff_name_lookup(&root);
        let external_items = build_line_item_lookup(&root);

        let mut rows = Vec::new();
        for order in orders {
            let Some(order_obj) = order.as_object() else {
                continue;
            };

            let order_id = pick_string(order_obj, &["id", "order_id", "receipt_id"]);
            let staff_id = pick_string(order_obj, &["staff_id", "employee_id", "cashier_id"]);

            let mut base = HashMap::new();
            put(&mut base, "order_id", order_id.clone());
            put(
                &mut base,
                "timestamp",
                pick_string(order_obj, &["timestamp", "created_at", "sale_time"]),
            );
            put(&mut base, "staff_id", staff_id.clone());
            put(
                &mut base,
                "staff_name",
                pick_string(order_obj, &["staff_name", "employee_name"]).or_else(|| {
                    staff_id
                        .as_ref()
                        .and_then(|id| staff_names.get(id).cloned())
                }),
            );
            put(
                &mut base,
                "order_type",
                pick_string(order_obj, &["order_type", "type"]),
            );
            put(&mut base, "is_medical", pick_string(order_obj, &["is_medical"]));
            put(
                &mut base,
                "order_subtotal",
                pick_string(order_obj, &["subtotal", "order_subtotal"]),
            );
            put(&mut base, "excise_tax", pick_string(order_obj, &["excise_tax"]));
            put(&mut base, "state_tax", pick_string(order_obj, &["state_tax"]));
            put(&mut base, "local_tax", pick_string(order_obj, &["local_tax"]));
            put(
                &mut base,
                "total_tax",
                pick_string(order_obj, &["total_tax", "tax"]),
            );
            put(
                &mut base,
                "order_discount",
                pick_string(order_obj, &["discount", "order_discount"]),
            );
            put(
                &mut base,
                "order_total",
                pick_string(order_obj, &["total", "order_total"]),
            );
            put(
                &mut base,
                "tender_type",
                pick_string(order_obj, &["tender_type", "payment_type"]),
            );
            put(&mut base, "voided", pick_string(order_obj, &["voided"]));
            put(&mut base, "refunded", pick_string(order_obj, &["refunded"]));
            put(&mut base, "promo_code", pick_string(order_obj, &["promo_code"]));

            // 明细: 内嵌数组优先, 否则回退到预归一 line_items 字典
            let inline_items = order_obj
                .get("items")
                .or_else(|| order_obj.get("line_items"))
                .and_then(|v| v.as_array());

            let fallback_items = order_id
                .as_ref()
                .and_then(|id| external_items.get(id))
                .map(|v| v.as_slice());

            let items: &[Value] = match (inline_items, fallback_items) {
                (Some(arr), _) => arr.as_slice(),
                (None, Some(arr)) => arr,
                (None, None) => &[],
            };

            if items.is_empty() {
                // 无明细订单仍需占一行, 否则订单本身丢失
                rows.push(base);
                continue;
            }

            for item in items {
                let Some(item_obj) = item.as_object() else {
                    continue;
                };

                let mut row = base.clone();
                put(&mut row, "line_id", pick_string(item_obj, &["id", "line_id"]));
                let product_id = pick_string(item_obj, &["product_id", "sku", "id"]);
                put(&mut row, "product_id", product_id.clone());
                put(
                    &mut row,
                    "product_name",
                    pick_string(item_obj, &["name", "product_name"]),
                );
                put(&mut row, "category", pick_string(item_obj, &["category"]));
                put(
                    &mut row,
                    "subcategory",
                    pick_string(item_obj, &["subcategory"]).or_else(|| {
                        product_id
                            .as_ref()
                            .and_then(|id| product_subcategories.get(id).cloned())
                    }),
                );
                put(&mut row, "quantity", pick_string(item_obj, &["quantity"]));
                put(
                    &mut row,
                    "unit_price",
                    pick_string(item_obj, &["unit_price", "price"]),
                );
                put(
                    &mut row,
                    "unit_cost",
                    pick_string(item_obj, &["unit_cost", "cost"]),
                );
                put(&mut row, "item_discount", pick_string(item_obj, &["discount"]));
                put(&mut row, "item_total", pick_string(item_obj, &["total"]));
                rows.push(row);
            }
        }

        Ok(RawTable {
            headers: FLAT_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows,
        })
    }
}

/// 定位订单数组(顶层数组 / orders / receipts / transactions / data.*)
fn extract_order_array(root: &Value) -> Option<&Vec<Value>> {
    if let Some(arr) = root.as_array() {
        return Some(arr);
    }

    let obj = root.as_object()?;
    for key in ["orders", "receipts", "transactions"] {
        if let Some(arr) = obj.get(key).and_then(|v| v.as_array()) {
            return Some(arr);
        }
    }
    let data = obj.get("data")?.as_object()?;
    for key in ["orders", "receipts", "transactions"] {
        if let Some(arr) = data.get(key).and_then(|v| v.as_array()) {
            return Some(arr);
        }
    }
    None
}

fn top_level_keys(root: &Value) -> Vec<String> {
    root.as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default()
}

/// products 数组 → product_id → subcategory
fn build_product_subcategory_lookup(root: &Value) -> HashMap<String, String> {
    let mut lookup = HashMap::new();
    let Some(products) = root.get("products").and_then(|v| v.as_array()) else {
        return lookup;
    };
    for product in products {
        let Some(obj) = product.as_object() else {
            continue;
        };
        if let (Some(id), Some(sub)) = (
            pick_string(obj, &["product_id"]),
            pick_string(obj, &["subcategory"]),
        ) {
            lookup.entry(id).or_insert(sub);
        }
    }
    lookup
}

/// staff 数组 → staff_id → name
fn build_staff_name_lookup(root: &Value) -> HashMap<String, String> {
    let mut lookup = HashMap::new();
    let Some(staff) = root.get("staff").and_then(|v| v.as_array()) else {
        return lookup;
    };
    for member in staff {
        let Some(obj) = member.as_object() else {
            continue;
        };
        if let (Some(id), Some(name)) = (
            pick_string(obj, &["staff_id"]),
            pick_string(obj, &["name", "staff_name"]),
        ) {
            lookup.entry(id).or_insert(name);
        }
    }
    lookup
}

/// 预归一 line_items 数组 → order_id → 明细列表
fn build_line_item_lookup(root: &Value) -> HashMap<String, Vec<Value>> {
    let mut lookup: HashMap<String, Vec<Value>> = HashMap::new();
    let Some(items) = root.get("line_items").and_then(|v| v.as_array()) else {
        return lookup;
    };
    for item in items {
        let Some(obj) = item.as_object() else {
            continue;
        };
        if let Some(order_id) = pick_string(obj, &["order_id"]) {
            lookup.entry(order_id).or_default().push(item.clone());
        }
    }
    lookup
}

/// 按候选键顺序取首个非空值(转为字符串)
fn pick_string(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = obj.get(*key) {
            if let Some(s) = json_value_to_string(value) {
                return Some(s);
            }
        }
    }
    None
}

fn json_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn put(row: &mut HashMap<String, String>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        row.insert(key.to_string(), v);
    }
}

// ==========================================
// 通用文件解析器(根据扩展名自动选择)
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> Result<RawTable, ImportError> {
        let path = file_path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse_to_raw_table(path),
            "json" => JsonParser.parse_to_raw_table(path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}
