// ==========================================
// 门店销售分析系统 - SQL 构建工具模块
// ==========================================
// 职责: 动态 WHERE 子句的统一构建
// 红线: 过滤值一律走绑定参数, 禁止拼接进 SQL 文本
// ==========================================

use rusqlite::types::Value;

/// 带绑定参数的 SQL 查询构建器(流式 API)
///
/// 条件文本只允许包含 `?` 占位符, 对应参数随条件一起登记,
/// build() 产出 (SQL, 参数列表) 供 prepare + query 使用
#[derive(Debug, Clone)]
pub struct BoundQueryBuilder {
    select_clause: String,
    where_clauses: Vec<String>,
    params: Vec<Value>,
    group_by_clause: Option<String>,
    order_by_clause: Option<String>,
    limit_clause: Option<usize>,
}

impl BoundQueryBuilder {
    /// 创建新的查询构建器
    pub fn new(select: &str) -> Self {
        Self {
            select_clause: select.to_string(),
            where_clauses: Vec::new(),
            params: Vec::new(),
            group_by_clause: None,
            order_by_clause: None,
            limit_clause: None,
        }
    }

    /// 添加 WHERE 条件及其绑定参数
    pub fn where_clause(mut self, condition: &str, params: Vec<Value>) -> Self {
        self.where_clauses.push(condition.to_string());
        self.params.extend(params);
        self
    }

    /// 添加 IN 条件(占位符数量按值列表展开)
    pub fn where_in(mut self, column: &str, values: Vec<Value>) -> Self {
        if values.is_empty() {
            // 空集合语义: 不命中任何行
            self.where_clauses.push("1 = 0".to_string());
            return self;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.where_clauses
            .push(format!("{} IN ({})", column, placeholders));
        self.params.extend(values);
        self
    }

    /// 条件添加(None 时跳过)
    pub fn and_if(self, condition: Option<(&str, Vec<Value>)>) -> Self {
        match condition {
            Some((cond, params)) => self.where_clause(cond, params),
            None => self,
        }
    }

    /// 添加 GROUP BY 子句
    pub fn group_by(mut self, group: &str) -> Self {
        self.group_by_clause = Some(group.to_string());
        self
    }

    /// 添加 ORDER BY 子句
    pub fn order_by(mut self, order: &str) -> Self {
        self.order_by_clause = Some(order.to_string());
        self
    }

    /// 添加 LIMIT 子句
    pub fn limit(mut self, n: usize) -> Self {
        self.limit_clause = Some(n);
        self
    }

    /// 构建最终的 (SQL, 绑定参数)
    pub fn build(self) -> (String, Vec<Value>) {
        let mut sql = self.select_clause;

        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }

        if let Some(group) = &self.group_by_clause {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }

        if let Some(order) = &self.order_by_clause {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        if let Some(limit) = self.limit_clause {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        (sql, self.params)
    }
}
