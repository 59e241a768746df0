// ==========================================
// 门店销售分析系统 - 列名解析器实现
// ==========================================
// 职责: 任意源列名 → 规范字段名
// 口径: 每个来源只解析一次, 产出类型化解析表; 行处理阶段不再解析
// 匹配优先级(确定性): 精确(忽略大小写) → 双向子串包含 → 模糊相似度
// ==========================================

use crate::config::FuzzyMatchConfig;
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashMap;
use strsim::sorensen_dice;

/// 报错时展示的可用源列数量上限
const AVAILABLE_COLUMN_SAMPLE: usize = 10;

// ==========================================
// FieldSpec - 规范字段定义
// ==========================================
// aliases 按优先级排列(最优先在前)
pub struct FieldSpec {
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

/// 规范字段目录(解析按此顺序进行)
pub const CANONICAL_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        canonical: "order_id",
        aliases: &[
            "transaction_id",
            "order_id",
            "transactionid",
            "receipt_id",
            "receiptid",
            "id",
        ],
        required: true,
    },
    FieldSpec {
        canonical: "timestamp",
        aliases: &[
            "transaction_date",
            "timestamp",
            "transactiondate",
            "created_at",
            "date",
            "datetime",
            "sale_time",
        ],
        required: true,
    },
    FieldSpec {
        canonical: "staff_id",
        aliases: &[
            "employee_id",
            "staff_id",
            "employeeid",
            "cashier_id",
            "cashierid",
            "responsible",
            "user_id",
        ],
        required: false,
    },
    FieldSpec {
        canonical: "staff_name",
        aliases: &["employee_name", "staff_name", "employeename", "cashier_name"],
        required: false,
    },
    FieldSpec {
        canonical: "line_id",
        aliases: &["line_id", "lineid", "line_number"],
        required: false,
    },
    FieldSpec {
        canonical: "product_id",
        aliases: &["product_id", "productid", "sku", "item_id"],
        required: false,
    },
    FieldSpec {
        canonical: "product_name",
        aliases: &["product_name", "item_name", "name"],
        required: false,
    },
    FieldSpec {
        canonical: "category",
        aliases: &["category", "product_category", "item_category"],
        required: false,
    },
    FieldSpec {
        canonical: "subcategory",
        aliases: &["subcategory", "sub_category"],
        required: false,
    },
    FieldSpec {
        canonical: "quantity",
        aliases: &["quantity", "qty", "item_quantity"],
        required: false,
    },
    FieldSpec {
        canonical: "unit_price",
        aliases: &["unit_price", "unitprice", "price", "item_price"],
        required: false,
    },
    FieldSpec {
        canonical: "unit_cost",
        aliases: &["unit_cost", "unitcost", "cost", "item_cost"],
        required: false,
    },
    FieldSpec {
        canonical: "item_discount",
        aliases: &["item_discount", "discount", "total_discount", "totaldiscount"],
        required: false,
    },
    FieldSpec {
        canonical: "order_discount",
        aliases: &["order_discount", "total_discount"],
        required: false,
    },
    FieldSpec {
        canonical: "item_total",
        aliases: &["item_total", "total", "amount", "totalprice"],
        required: false,
    },
    FieldSpec {
        canonical: "order_total",
        aliases: &["order_total", "total_amount"],
        required: false,
    },
    FieldSpec {
        canonical: "order_subtotal",
        aliases: &["order_subtotal", "subtotal", "sub_total", "beforetax"],
        required: false,
    },
    FieldSpec {
        canonical: "excise_tax",
        aliases: &["excise_tax", "excisetax"],
        required: false,
    },
    FieldSpec {
        canonical: "state_tax",
        aliases: &["state_tax", "statetax"],
        required: false,
    },
    FieldSpec {
        canonical: "local_tax",
        aliases: &["local_tax", "localtax", "city_tax"],
        required: false,
    },
    FieldSpec {
        canonical: "total_tax",
        aliases: &["tax", "total_tax", "totaltax", "taxes"],
        required: false,
    },
    FieldSpec {
        canonical: "order_type",
        aliases: &["order_type", "ordertype", "type", "channel"],
        required: false,
    },
    FieldSpec {
        canonical: "is_medical",
        aliases: &["is_medical", "ismedical", "medical"],
        required: false,
    },
    FieldSpec {
        canonical: "tender_type",
        aliases: &["tender_type", "tendertype", "payment_type", "payment_method"],
        required: false,
    },
    FieldSpec {
        canonical: "voided",
        aliases: &["voided", "is_void", "isvoid", "void"],
        required: false,
    },
    FieldSpec {
        canonical: "refunded",
        aliases: &["refunded", "is_refund", "isrefund", "refund"],
        required: false,
    },
    FieldSpec {
        canonical: "promo_code",
        aliases: &["promo_code", "promocode", "coupon", "promo"],
        required: false,
    },
];

// ==========================================
// ResolutionTable - 解析表
// ==========================================
// 规范字段 → 实际源列名; 每个来源构建一次
#[derive(Debug, Clone, Default)]
pub struct ResolutionTable {
    map: HashMap<String, String>,
}

impl ResolutionTable {
    /// 按目录对源列集构建解析表
    ///
    /// 必需字段(order_id/timestamp)解析失败时返回 SchemaResolution,
    /// 错误信息携带缺失字段名与可用源列示例
    pub fn build(columns: &[String], fuzzy: &FuzzyMatchConfig) -> ImportResult<Self> {
        let mut map = HashMap::new();
        let mut missing_required = Vec::new();

        for field in CANONICAL_FIELDS {
            match resolve_column(field.aliases, columns, fuzzy) {
                Some(source) => {
                    map.insert(field.canonical.to_string(), source);
                }
                None if field.required => missing_required.push(field.canonical.to_string()),
                None => {}
            }
        }

        if !missing_required.is_empty() {
            return Err(ImportError::SchemaResolution {
                missing: missing_required,
                available: columns
                    .iter()
                    .take(AVAILABLE_COLUMN_SAMPLE)
                    .cloned()
                    .collect(),
            });
        }

        Ok(Self { map })
    }

    /// 规范字段对应的源列名
    pub fn source_column(&self, canonical: &str) -> Option<&str> {
        self.map.get(canonical).map(|s| s.as_str())
    }

    pub fn is_resolved(&self, canonical: &str) -> bool {
        self.map.contains_key(canonical)
    }

    /// 已被解析表占用的源列集合
    pub fn claimed_columns(&self) -> Vec<&str> {
        self.map.values().map(|s| s.as_str()).collect()
    }
}

/// 为一个规范字段解析最佳源列
///
/// 纯函数: 只依赖 (aliases, columns, fuzzy 配置)
/// 1. 精确匹配(忽略大小写), 首个命中任意列的别名生效
/// 2. 双向子串包含(忽略大小写), 别名序优先, 其次列序
/// 3. 模糊匹配(可关闭), 全列最高相似度且不低于下限者生效
pub fn resolve_column(
    aliases: &[&str],
    columns: &[String],
    fuzzy: &FuzzyMatchConfig,
) -> Option<String> {
    let lowered: Vec<String> = columns.iter().map(|c| c.to_lowercase()).collect();

    // 1. 精确匹配
    for alias in aliases {
        let alias_lower = alias.to_lowercase();
        for (idx, col) in lowered.iter().enumerate() {
            if *col == alias_lower {
                return Some(columns[idx].clone());
            }
        }
    }

    // 2. 子串包含(双向)
    for alias in aliases {
        let alias_lower = alias.to_lowercase();
        for (idx, col) in lowered.iter().enumerate() {
            if col.contains(&alias_lower) || alias_lower.contains(col.as_str()) {
                return Some(columns[idx].clone());
            }
        }
    }

    // 3. 模糊匹配
    if fuzzy.enabled {
        for alias in aliases {
            let alias_lower = alias.to_lowercase();
            let mut best: Option<(usize, f64)> = None;
            for (idx, col) in lowered.iter().enumerate() {
                let score = sorensen_dice(&alias_lower, col);
                // 平分时保留先出现的列, 保证确定性
                if score >= fuzzy.similarity_floor
                    && best.map(|(_, s)| score > s).unwrap_or(true)
                {
                    best = Some((idx, score));
                }
            }
            if let Some((idx, _)) = best {
                return Some(columns[idx].clone());
            }
        }
    }

    None
}
