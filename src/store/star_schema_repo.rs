// ==========================================
// 门店销售分析系统 - 星型模型仓储
// ==========================================
// 职责: 维度/事实表的建表、全量装载与参数化聚合查询
// 红线: 装载为单事务原子替换(先删事实再删维度, 先插维度再插事实),
//       读方只能看到旧数据集或新数据集, 不存在中间态
// 红线: 所有过滤值走绑定参数, 不拼接 SQL
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::sales::NormalizedBatch;
use crate::store::error::{StoreError, StoreResult};
use crate::store::sql_builder::BoundQueryBuilder;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

// ==========================================
// QueryFilters - 查询过滤词汇表
// ==========================================
// 口径: 各过滤条件 AND 组合; 日期范围含两端;
//       品类过滤通过明细存在性子查询实现
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub locations: Option<Vec<String>>,
    pub order_type: Option<String>,
    pub daypart: Option<String>,
    pub category: Option<String>,
    pub staff_id: Option<String>,
}

// ==========================================
// 聚合结果结构
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlineKpis {
    pub net_sales: f64,                // 不含作废单
    pub order_count: i64,
    pub avg_order_value: Option<f64>,  // 非作废单均值; 空结果为 None
    pub void_count: i64,
    pub refund_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenderMixRow {
    pub tender_type: String,
    pub sales: f64,
    pub transactions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopProductRow {
    pub product_name: String,
    pub category: String,
    pub units_sold: f64,
    pub net_sales: f64,
    pub total_margin: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMixRow {
    pub category: String,
    pub net_sales: f64,
    pub total_margin: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyActivityRow {
    pub hour: i64,
    pub transactions: i64,
    pub voids: i64,
    pub discounted: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardAggregates {
    pub headline: HeadlineKpis,
    pub tender_mix: Vec<TenderMixRow>,
    pub top_products: Vec<TopProductRow>,
    pub category_mix: Vec<CategoryMixRow>,
    pub hourly: Vec<HourlyActivityRow>,
}

// ==========================================
// LoadSummary - 装载汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSummary {
    pub orders: usize,
    pub line_items: usize,
    pub products: usize,
    pub staff: usize,
    pub locations: usize,
    pub time_buckets: usize,
    pub referential_defects: Vec<String>, // 被拒绝的孤儿明细 line_id
}

// ==========================================
// StarSchemaRepository
// ==========================================
pub struct StarSchemaRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StarSchemaRepository {
    /// 创建仓储并确保表结构存在
    pub fn new(db_path: &str) -> StoreResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.create_schema()?;
        Ok(repo)
    }

    /// 从已有连接创建(再次应用统一 PRAGMA, 幂等)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> StoreResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| StoreError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)
                .map_err(|e| StoreError::ConnectionError(e.to_string()))?;
        }
        let repo = Self { conn };
        repo.create_schema()?;
        Ok(repo)
    }

    fn get_conn(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockError(e.to_string()))
    }

    /// 建表(幂等, 可对已初始化库重复调用)
    pub fn create_schema(&self) -> StoreResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS dim_location (
                location_id TEXT PRIMARY KEY,
                location_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dim_staff (
                staff_id TEXT PRIMARY KEY,
                staff_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dim_product (
                product_id TEXT PRIMARY KEY,
                product_name TEXT NOT NULL,
                category TEXT NOT NULL,
                subcategory TEXT,
                unit_cost REAL NOT NULL DEFAULT 0,
                unit_price REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS dim_time (
                time_bucket_id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                date TEXT NOT NULL,
                hour INTEGER NOT NULL,
                daypart TEXT NOT NULL,
                day_of_week TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fact_sales (
                order_id TEXT PRIMARY KEY,
                location_id TEXT NOT NULL,
                staff_id TEXT NOT NULL,
                time_bucket_id TEXT NOT NULL,
                order_type TEXT NOT NULL,
                is_medical INTEGER NOT NULL DEFAULT 0,
                subtotal REAL NOT NULL DEFAULT 0,
                excise_tax REAL NOT NULL DEFAULT 0,
                state_tax REAL NOT NULL DEFAULT 0,
                local_tax REAL NOT NULL DEFAULT 0,
                total_tax REAL NOT NULL DEFAULT 0,
                discount REAL NOT NULL DEFAULT 0,
                discount_rate REAL NOT NULL DEFAULT 0,
                total REAL NOT NULL DEFAULT 0,
                tender_type TEXT NOT NULL,
                voided INTEGER NOT NULL DEFAULT 0,
                refunded INTEGER NOT NULL DEFAULT 0,
                promo_code TEXT
            );

            CREATE TABLE IF NOT EXISTS fact_line_items (
                line_id TEXT PRIMARY KEY,
                order_id TEXT NOT NULL REFERENCES fact_sales(order_id),
                product_id TEXT NOT NULL,
                quantity REAL NOT NULL DEFAULT 0,
                unit_price REAL NOT NULL DEFAULT 0,
                unit_cost REAL NOT NULL DEFAULT 0,
                discount REAL NOT NULL DEFAULT 0,
                total REAL NOT NULL DEFAULT 0,
                margin REAL NOT NULL DEFAULT 0
            );
            "#,
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    // ==========================================
    // 全量装载(原子替换)
    // ==========================================

    /// 以单事务执行"全删全插":
    /// 删除按事实→维度顺序, 插入按维度→事实顺序(各自 keep-first 去重)
    ///
    /// 任何一步失败整体回滚, 旧数据集保持可查;
    /// 孤儿明细(order_id 无对应订单)被拒绝并记入汇总, 不静默落库
    pub fn load(&self, batch: &NormalizedBatch) -> StoreResult<LoadSummary> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| StoreError::LoadFailure(e.to_string()))?;

        let summary =
            Self::load_tx(&tx, batch).map_err(|e| StoreError::LoadFailure(e.to_string()))?;

        tx.commit()
            .map_err(|e| StoreError::LoadFailure(e.to_string()))?;

        info!(
            orders = summary.orders,
            line_items = summary.line_items,
            referential_defects = summary.referential_defects.len(),
            "星型模型装载完成"
        );
        Ok(summary)
    }

    fn load_tx(tx: &Transaction, batch: &NormalizedBatch) -> rusqlite::Result<LoadSummary> {
        // === 清空: 事实在前, 维度在后(外键方向) ===
        debug!("清空现有星型模型表");
        tx.execute("DELETE FROM fact_line_items", [])?;
        tx.execute("DELETE FROM fact_sales", [])?;
        tx.execute("DELETE FROM dim_time", [])?;
        tx.execute("DELETE FROM dim_product", [])?;
        tx.execute("DELETE FROM dim_staff", [])?;
        tx.execute("DELETE FROM dim_location", [])?;

        // === 维度: dim_product(keep-first) ===
        let mut seen = HashSet::new();
        let mut product_count = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO dim_product (
                    product_id, product_name, category, subcategory, unit_cost, unit_price
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for product in &batch.products {
                if !seen.insert(product.product_id.clone()) {
                    continue;
                }
                stmt.execute(params![
                    product.product_id,
                    product.name,
                    product.category,
                    product.subcategory,
                    product.unit_cost,
                    product.unit_price,
                ])?;
                product_count += 1;
            }
        }

        // === 维度: dim_staff(keep-first) ===
        let mut seen = HashSet::new();
        let mut staff_count = 0usize;
        {
            let mut stmt =
                tx.prepare("INSERT INTO dim_staff (staff_id, staff_name) VALUES (?1, ?2)")?;
            for member in &batch.staff {
                if !seen.insert(member.staff_id.clone()) {
                    continue;
                }
                stmt.execute(params![member.staff_id, member.name])?;
                staff_count += 1;
            }
        }

        // === 维度: dim_location(订单派生, keep-first) ===
        let mut seen = HashSet::new();
        let mut location_count = 0usize;
        {
            let mut stmt = tx
                .prepare("INSERT INTO dim_location (location_id, location_name) VALUES (?1, ?2)")?;
            for order in &batch.orders {
                if !seen.insert(order.location_id.clone()) {
                    continue;
                }
                stmt.execute(params![order.location_id, order.location_name])?;
                location_count += 1;
            }
        }

        // === 维度: dim_time(订单派生, keep-first) ===
        let mut seen = HashSet::new();
        let mut time_count = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO dim_time (
                    time_bucket_id, timestamp, date, hour, daypart, day_of_week
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for order in &batch.orders {
                if !seen.insert(order.time_bucket_id.clone()) {
                    continue;
                }
                stmt.execute(params![
                    order.time_bucket_id,
                    order.timestamp.to_rfc3339(),
                    order.date.to_string(),
                    order.hour,
                    order.daypart,
                    order.day_of_week,
                ])?;
                time_count += 1;
            }
        }

        // === 事实: fact_sales(keep-first) ===
        let mut loaded_orders: HashSet<String> = HashSet::new();
        let mut order_count = 0usize;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO fact_sales (
                    order_id, location_id, staff_id, time_bucket_id, order_type,
                    is_medical, subtotal, excise_tax, state_tax, local_tax,
                    total_tax, discount, discount_rate, total, tender_type,
                    voided, refunded, promo_code
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                    ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18
                )
                "#,
            )?;
            for order in &batch.orders {
                if !loaded_orders.insert(order.order_id.clone()) {
                    continue;
                }
                stmt.execute(params![
                    order.order_id,
                    order.location_id,
                    order.staff_id,
                    order.time_bucket_id,
                    order.order_type,
                    order.is_medical,
                    order.subtotal,
                    order.excise_tax,
                    order.state_tax,
                    order.local_tax,
                    order.total_tax,
                    order.discount,
                    order.discount_rate,
                    order.total,
                    order.tender_type,
                    order.voided,
                    order.refunded,
                    order.promo_code,
                ])?;
                order_count += 1;
            }
        }

        // === 事实: fact_line_items(引用校验 + keep-first) ===
        let mut seen = HashSet::new();
        let mut line_count = 0usize;
        let mut referential_defects = Vec::new();
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO fact_line_items (
                    line_id, order_id, product_id, quantity, unit_price,
                    unit_cost, discount, total, margin
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )?;
            for item in &batch.line_items {
                if !loaded_orders.contains(&item.order_id) {
                    // 引用缺陷: 拒绝并上报, 不静默插入
                    warn!(
                        line_id = %item.line_id,
                        order_id = %item.order_id,
                        "明细引用不存在的订单, 已拒绝"
                    );
                    referential_defects.push(item.line_id.clone());
                    continue;
                }
                if !seen.insert(item.line_id.clone()) {
                    continue;
                }
                stmt.execute(params![
                    item.line_id,
                    item.order_id,
                    item.product_id,
                    item.quantity,
                    item.unit_price,
                    item.unit_cost,
                    item.discount,
                    item.total,
                    item.margin,
                ])?;
                line_count += 1;
            }
        }

        Ok(LoadSummary {
            orders: order_count,
            line_items: line_count,
            products: product_count,
            staff: staff_count,
            locations: location_count,
            time_buckets: time_count,
            referential_defects,
        })
    }

    // ==========================================
    // 参数化聚合查询
    // ==========================================

    /// 按过滤词汇表执行全套聚合
    ///
    /// 零行结果返回零值/None 聚合, 不报错
    pub fn query(&self, filters: &QueryFilters) -> StoreResult<DashboardAggregates> {
        let conn = self.get_conn()?;

        Ok(DashboardAggregates {
            headline: Self::query_headline(&conn, filters)?,
            tender_mix: Self::query_tender_mix(&conn, filters)?,
            top_products: Self::query_top_products(&conn, filters)?,
            category_mix: Self::query_category_mix(&conn, filters)?,
            hourly: Self::query_hourly(&conn, filters)?,
        })
    }

    /// 过滤词汇表 → 绑定条件集(fs = fact_sales, dt = dim_time)
    fn apply_filters(mut builder: BoundQueryBuilder, filters: &QueryFilters) -> BoundQueryBuilder {
        if let Some(start) = filters.start_date {
            builder = builder.where_clause("dt.date >= ?", vec![Value::Text(start.to_string())]);
        }
        if let Some(end) = filters.end_date {
            builder = builder.where_clause("dt.date <= ?", vec![Value::Text(end.to_string())]);
        }
        if let Some(locations) = &filters.locations {
            builder = builder.where_in(
                "fs.location_id",
                locations
                    .iter()
                    .map(|l| Value::Text(l.clone()))
                    .collect(),
            );
        }
        if let Some(order_type) = &filters.order_type {
            builder = builder
                .where_clause("fs.order_type = ?", vec![Value::Text(order_type.clone())]);
        }
        if let Some(daypart) = &filters.daypart {
            builder =
                builder.where_clause("dt.daypart = ?", vec![Value::Text(daypart.clone())]);
        }
        if let Some(category) = &filters.category {
            // 品类过滤: 明细存在性子查询
            builder = builder.where_clause(
                "EXISTS (SELECT 1 FROM fact_line_items fli \
                 JOIN dim_product dp ON fli.product_id = dp.product_id \
                 WHERE fli.order_id = fs.order_id AND dp.category = ?)",
                vec![Value::Text(category.clone())],
            );
        }
        if let Some(staff_id) = &filters.staff_id {
            builder =
                builder.where_clause("fs.staff_id = ?", vec![Value::Text(staff_id.clone())]);
        }
        builder
    }

    fn query_headline(conn: &Connection, filters: &QueryFilters) -> StoreResult<HeadlineKpis> {
        let builder = BoundQueryBuilder::new(
            r#"SELECT
                COALESCE(SUM(CASE WHEN fs.voided = 0 THEN fs.total ELSE 0 END), 0) AS net_sales,
                COUNT(DISTINCT fs.order_id) AS order_count,
                AVG(CASE WHEN fs.voided = 0 THEN fs.total END) AS avg_order_value,
                COALESCE(SUM(CASE WHEN fs.voided = 1 THEN 1 ELSE 0 END), 0) AS void_count,
                COALESCE(SUM(CASE WHEN fs.refunded = 1 THEN 1 ELSE 0 END), 0) AS refund_count
            FROM fact_sales fs
            JOIN dim_time dt ON fs.time_bucket_id = dt.time_bucket_id"#,
        );
        let (sql, params) = Self::apply_filters(builder, filters).build();

        let mut stmt = conn.prepare(&sql)?;
        let kpis = stmt.query_row(params_from_iter(params), |row| {
            Ok(HeadlineKpis {
                net_sales: row.get(0)?,
                order_count: row.get(1)?,
                avg_order_value: row.get(2)?,
                void_count: row.get(3)?,
                refund_count: row.get(4)?,
            })
        })?;
        Ok(kpis)
    }

    fn query_tender_mix(
        conn: &Connection,
        filters: &QueryFilters,
    ) -> StoreResult<Vec<TenderMixRow>> {
        let builder = BoundQueryBuilder::new(
            r#"SELECT
                fs.tender_type,
                COALESCE(SUM(CASE WHEN fs.voided = 0 THEN fs.total ELSE 0 END), 0) AS sales,
                COUNT(*) AS transactions
            FROM fact_sales fs
            JOIN dim_time dt ON fs.time_bucket_id = dt.time_bucket_id"#,
        );
        let (sql, params) = Self::apply_filters(builder, filters)
            .group_by("fs.tender_type")
            .order_by("sales DESC")
            .build();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(TenderMixRow {
                    tender_type: row.get(0)?,
                    sales: row.get(1)?,
                    transactions: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_top_products(
        conn: &Connection,
        filters: &QueryFilters,
    ) -> StoreResult<Vec<TopProductRow>> {
        let builder = BoundQueryBuilder::new(
            r#"SELECT
                dp.product_name,
                dp.category,
                COALESCE(SUM(fli.quantity), 0) AS units_sold,
                COALESCE(SUM(fli.total), 0) AS net_sales,
                COALESCE(SUM(fli.margin), 0) AS total_margin
            FROM fact_line_items fli
            JOIN dim_product dp ON fli.product_id = dp.product_id
            JOIN fact_sales fs ON fli.order_id = fs.order_id
            JOIN dim_time dt ON fs.time_bucket_id = dt.time_bucket_id"#,
        )
        .where_clause("fs.voided = 0", vec![]);
        let (sql, params) = Self::apply_filters(builder, filters)
            .group_by("dp.product_name, dp.category")
            .order_by("net_sales DESC")
            .limit(10)
            .build();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(TopProductRow {
                    product_name: row.get(0)?,
                    category: row.get(1)?,
                    units_sold: row.get(2)?,
                    net_sales: row.get(3)?,
                    total_margin: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_category_mix(
        conn: &Connection,
        filters: &QueryFilters,
    ) -> StoreResult<Vec<CategoryMixRow>> {
        let builder = BoundQueryBuilder::new(
            r#"SELECT
                dp.category,
                COALESCE(SUM(fli.total), 0) AS net_sales,
                COALESCE(SUM(fli.margin), 0) AS total_margin
            FROM fact_line_items fli
            JOIN dim_product dp ON fli.product_id = dp.product_id
            JOIN fact_sales fs ON fli.order_id = fs.order_id
            JOIN dim_time dt ON fs.time_bucket_id = dt.time_bucket_id"#,
        )
        .where_clause("fs.voided = 0", vec![]);
        let (sql, params) = Self::apply_filters(builder, filters)
            .group_by("dp.category")
            .order_by("net_sales DESC")
            .build();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(CategoryMixRow {
                    category: row.get(0)?,
                    net_sales: row.get(1)?,
                    total_margin: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_hourly(
        conn: &Connection,
        filters: &QueryFilters,
    ) -> StoreResult<Vec<HourlyActivityRow>> {
        let builder = BoundQueryBuilder::new(
            r#"SELECT
                dt.hour,
                COUNT(*) AS transactions,
                COALESCE(SUM(CASE WHEN fs.voided = 1 THEN 1 ELSE 0 END), 0) AS voids,
                COALESCE(SUM(CASE WHEN fs.discount > 0 THEN 1 ELSE 0 END), 0) AS discounted
            FROM fact_sales fs
            JOIN dim_time dt ON fs.time_bucket_id = dt.time_bucket_id"#,
        );
        let (sql, params) = Self::apply_filters(builder, filters)
            .group_by("dt.hour")
            .order_by("dt.hour")
            .build();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(HourlyActivityRow {
                    hour: row.get(0)?,
                    transactions: row.get(1)?,
                    voids: row.get(2)?,
                    discounted: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
