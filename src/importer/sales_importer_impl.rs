// ==========================================
// 门店销售分析系统 - 销售数据导入器实现
// ==========================================
// 职责: 整合导入流程, 从导出文件到规范化批次
// 流程: 解析 → 列名解析 → 分组归一 → 字段派生
// 红线: 管线内严格顺序执行; 配置为不可变快照, 过程中不写回
// ==========================================

use crate::config::PipelineConfig;
use crate::domain::quality::FieldDefectCounts;
use crate::domain::sales::{CanonicalOrder, NormalizedBatch};
use crate::importer::column_resolver::ResolutionTable;
use crate::importer::derivation;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::normalizer::{SchemaNormalizer, StagedOrder};
use crate::importer::sales_importer_trait::{
    IngestOutcome, SalesImporter, SourceFailure, SourceIngest, SourceSpec, SourceStat,
};
use chrono::Utc;
use chrono_tz::Tz;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==========================================
// SalesImporterImpl - 销售数据导入器实现
// ==========================================
pub struct SalesImporterImpl {
    config: PipelineConfig,
    file_parser: UniversalFileParser,
}

impl SalesImporterImpl {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            file_parser: UniversalFileParser,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 派生阶段: StagedOrder → CanonicalOrder
    ///
    /// 时间戳缺失或无法解析时回退"当前门店本地时间"并计入缺陷
    fn finalize_order(
        &self,
        staged: StagedOrder,
        tz: Tz,
        defects: &mut FieldDefectCounts,
    ) -> CanonicalOrder {
        let local = match staged
            .raw_timestamp
            .as_deref()
            .and_then(derivation::parse_timestamp)
        {
            Some(parsed) => derivation::localize(parsed, tz),
            None => {
                if staged.raw_timestamp.is_some() {
                    // 列有值但格式无法识别, 缺失情形已在归一化阶段计数
                    warn!(
                        order_id = %staged.order_id,
                        raw = staged.raw_timestamp.as_deref().unwrap_or(""),
                        "时间戳格式无法识别, 回退当前时间"
                    );
                    defects.record("timestamp");
                }
                Utc::now().with_timezone(&tz)
            }
        };

        let temporal = derivation::derive_temporal_fields(&local);
        let daypart = self.config.daypart_for(temporal.hour);

        let subtotal = staged
            .explicit_subtotal
            .unwrap_or(staged.total - staged.discount);
        let discount_rate = derivation::derive_discount_rate(
            staged.discount,
            staged.explicit_subtotal,
            staged.total,
        );

        CanonicalOrder {
            order_id: staged.order_id,
            location_id: staged.location_id,
            location_name: staged.location_name,
            staff_id: staged.staff_id,
            timestamp: local.fixed_offset(),
            order_type: derivation::normalize_order_type(&staged.order_type),
            is_medical: staged.is_medical,
            tender_type: staged.tender_type,
            voided: staged.voided,
            refunded: staged.refunded,
            promo_code: staged.promo_code,
            subtotal,
            excise_tax: staged.excise_tax,
            state_tax: staged.state_tax,
            local_tax: staged.local_tax,
            total_tax: staged.total_tax,
            discount: staged.discount,
            total: staged.total,
            discount_rate,
            date: temporal.date,
            hour: temporal.hour,
            day_of_week: temporal.day_of_week,
            daypart,
            time_bucket_id: temporal.time_bucket_id,
        }
    }
}

#[async_trait::async_trait]
impl SalesImporter for SalesImporterImpl {
    async fn ingest_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        location_name: &str,
    ) -> ImportResult<SourceIngest> {
        let path = file_path.as_ref();
        info!(file = %path.display(), location = location_name, "开始导入销售数据");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let table = self.file_parser.parse(path)?;
        let total_rows = table.rows.len();
        info!(total_rows, "文件解析完成");

        // === 步骤 2: 列名解析(每来源一次) ===
        debug!("步骤 2: 列名解析");
        let resolution = ResolutionTable::build(&table.headers, &self.config.fuzzy)?;
        debug!(
            claimed = resolution.claimed_columns().len(),
            "列名解析完成"
        );

        // === 步骤 3: 行分组与模式归一化 ===
        debug!("步骤 3: 模式归一化");
        let location = self.config.resolve_location(location_name);
        let normalizer = SchemaNormalizer::new(&resolution, &table.headers, &location, location_name);
        let normalized = normalizer.normalize(&table.rows);
        if normalized.skipped_rows > 0 {
            warn!(
                skipped = normalized.skipped_rows,
                "存在 order_id 为空的行, 已跳过"
            );
        }
        info!(
            orders = normalized.staged_orders.len(),
            line_items = normalized.line_items.len(),
            "模式归一化完成"
        );

        // === 步骤 4: 时间/财务字段派生 ===
        debug!("步骤 4: 字段派生");
        let mut defects = normalized.defects;
        let mut batch = NormalizedBatch::new();
        batch.line_items = normalized.line_items;
        batch.products = normalized.products;
        batch.staff = normalized.staff;
        for staged in normalized.staged_orders {
            batch
                .orders
                .push(self.finalize_order(staged, location.timezone, &mut defects));
        }
        debug!("字段派生完成");

        Ok(SourceIngest {
            batch,
            defects,
            total_rows,
            skipped_rows: normalized.skipped_rows,
        })
    }

    async fn ingest_sources(&self, sources: Vec<SourceSpec>) -> ImportResult<IngestOutcome> {
        let batch_id = Uuid::new_v4().to_string();
        info!(batch_id = %batch_id, source_count = sources.len(), "开始多来源导入");

        let mut outcome = IngestOutcome {
            batch_id,
            batch: NormalizedBatch::new(),
            defects: FieldDefectCounts::new(),
            sources: Vec::new(),
            failures: Vec::new(),
        };

        // 严格按声明顺序处理, 保证 keep-first 去重可复现
        for source in sources {
            let file = source.path.display().to_string();
            match self.ingest_file(&source.path, &source.location_name).await {
                Ok(ingest) => {
                    outcome.sources.push(SourceStat {
                        file,
                        location: source.location_name.clone(),
                        orders: ingest.batch.orders.len(),
                        line_items: ingest.batch.line_items.len(),
                        skipped_rows: ingest.skipped_rows,
                    });
                    outcome.defects.merge(&ingest.defects);
                    outcome.batch.concat(ingest.batch);
                }
                Err(e) => {
                    // 单文件失败不影响其余来源
                    warn!(file = %file, error = %e, "来源导入失败, 跳过该文件");
                    outcome.failures.push(SourceFailure {
                        file,
                        location: source.location_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            orders = outcome.batch.orders.len(),
            line_items = outcome.batch.line_items.len(),
            failures = outcome.failures.len(),
            "多来源导入完成"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn importer() -> SalesImporterImpl {
        SalesImporterImpl::new(PipelineConfig::default())
    }

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[tokio::test]
    async fn test_ingest_file_derives_order_fields() {
        let file = csv_file(
            "transaction_id,transaction_date,order_subtotal,order_discount,order_total\n\
             ord_1,2025-06-01 10:30:00,100.0,20.0,88.0\n",
        );

        let ingest = importer().ingest_file(file.path(), "Columbus").await.unwrap();

        assert_eq!(ingest.batch.orders.len(), 1);
        let order = &ingest.batch.orders[0];
        assert_eq!(order.discount_rate, 20.0);
        assert_eq!(order.hour, 10);
        assert_eq!(order.daypart, "Morning");
        assert_eq!(order.time_bucket_id, "2025060110");
        // 无时区时间戳视为门店本地时间, 墙钟不变
        assert_eq!(order.timestamp.format("%H:%M").to_string(), "10:30");
    }

    #[tokio::test]
    async fn test_ingest_file_missing_required_columns_fails() {
        let file = csv_file("colour,shape\nred,circle\n");

        let result = importer().ingest_file(file.path(), "Columbus").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ingest_sources_one_bad_file_does_not_poison_batch() {
        let good = csv_file(
            "transaction_id,transaction_date,order_total\nord_1,2025-06-01 10:00:00,10.0\n",
        );
        let bad = csv_file("colour,shape\nred,circle\n");

        let outcome = importer()
            .ingest_sources(vec![
                SourceSpec::new(good.path(), "Columbus"),
                SourceSpec::new(bad.path(), "Cincinnati"),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.batch.orders.len(), 1);
        assert_eq!(outcome.sources.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].location, "Cincinnati");
    }

    #[tokio::test]
    async fn test_ingest_sources_declaration_order_keeps_first_product() {
        let first = csv_file(
            "transaction_id,transaction_date,product_id,product_name\n\
             ord_1,2025-06-01 10:00:00,prod_1,First Name\n",
        );
        let second = csv_file(
            "transaction_id,transaction_date,product_id,product_name\n\
             ord_2,2025-06-01 11:00:00,prod_1,Second Name\n",
        );

        let outcome = importer()
            .ingest_sources(vec![
                SourceSpec::new(first.path(), "Columbus"),
                SourceSpec::new(second.path(), "Cincinnati"),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.batch.products.len(), 1);
        assert_eq!(outcome.batch.products[0].name, "first name");
    }
}
