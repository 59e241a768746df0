// ==========================================
// 门店销售分析系统 - 主入口
// ==========================================
// 用法: pos-sales-dss <文件路径>=<门店名> [<文件路径>=<门店名> ...]
// 环境变量:
// - POS_DSS_DB: 数据库路径(缺省为用户数据目录)
// - POS_DSS_CONFIG: 管线配置 TOML 路径(缺省为内置默认值)
// ==========================================

use pos_sales_dss::engine::{build_quality_report, ExceptionDetector};
use pos_sales_dss::importer::{SalesImporter, SalesImporterImpl, SourceSpec};
use pos_sales_dss::store::{QueryFilters, StarSchemaRepository};
use pos_sales_dss::{logging, PipelineConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("门店销售分析系统 - 决策支持系统");
    tracing::info!("系统版本: {}", pos_sales_dss::VERSION);
    tracing::info!("==================================================");

    // 来源声明: <路径>=<门店名>, 按命令行顺序处理
    let sources: Vec<SourceSpec> = std::env::args()
        .skip(1)
        .filter_map(|arg| {
            let (path, location) = arg.split_once('=')?;
            Some(SourceSpec::new(path, location))
        })
        .collect();

    if sources.is_empty() {
        eprintln!("用法: pos-sales-dss <文件路径>=<门店名> [...]");
        std::process::exit(2);
    }

    let config = match std::env::var("POS_DSS_CONFIG") {
        Ok(path) => PipelineConfig::from_toml_file(&path)?,
        Err(_) => PipelineConfig::default(),
    };

    let db_path =
        std::env::var("POS_DSS_DB").unwrap_or_else(|_| pos_sales_dss::db::default_db_path());
    tracing::info!("使用数据库: {}", db_path);
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // === 导入 ===
    let importer = SalesImporterImpl::new(config.clone());
    let outcome = importer.ingest_sources(sources).await?;
    for failure in &outcome.failures {
        tracing::error!(file = %failure.file, error = %failure.error, "来源导入失败");
    }

    // === 异常检测与质量报告 ===
    let detector = ExceptionDetector::new(config.thresholds.clone());
    let exceptions = detector.detect(&outcome.batch.orders);
    let quality = build_quality_report(&outcome.batch, &outcome.defects);

    // === 星型模型装载 ===
    let repo = StarSchemaRepository::new(&db_path)?;
    let summary = repo.load(&outcome.batch)?;

    // === 全量聚合预览 ===
    let aggregates = repo.query(&QueryFilters::default())?;

    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
        "batch_id": outcome.batch_id,
        "load": summary,
        "exceptions": exceptions,
        "quality": quality,
        "headline": aggregates.headline,
    }))?);

    Ok(())
}
