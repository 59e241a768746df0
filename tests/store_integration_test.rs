// ==========================================
// StarSchemaRepository 集成测试
// ==========================================
// 测试目标: 幂等建表 / 原子替换装载 / 参数化聚合查询
// ==========================================

mod test_helpers;

use chrono::NaiveDate;
use pos_sales_dss::domain::NormalizedBatch;
use pos_sales_dss::logging;
use pos_sales_dss::store::QueryFilters;
use test_helpers::{create_test_store, make_line_item, make_order, make_product, make_staff};

fn sample_batch() -> NormalizedBatch {
    let mut batch = NormalizedBatch::new();

    let mut morning = make_order("ord_1", 1, 10);
    morning.tender_type = "debit".to_string();
    batch.orders.push(morning);

    let mut evening = make_order("ord_2", 2, 18);
    evening.total = 59.0;
    evening.discount = 10.0;
    batch.orders.push(evening);

    let mut voided = make_order("ord_3", 2, 18);
    voided.voided = true;
    batch.orders.push(voided);

    batch.line_items.push(make_line_item("ln_1", "ord_1", "prod_1"));
    batch.line_items.push(make_line_item("ln_2", "ord_1", "prod_2"));
    batch.line_items.push(make_line_item("ln_3", "ord_2", "prod_1"));

    batch.products.push(make_product("prod_1", "widget", "Flower"));
    batch.products.push(make_product("prod_2", "gadget", "Edibles"));
    batch.staff.push(make_staff("staff_001", "Cashier_001"));

    batch
}

#[test]
fn test_create_schema_is_idempotent() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();

    // 已初始化库上重复建表应无副作用
    repo.create_schema().unwrap();
    repo.create_schema().unwrap();
}

#[test]
fn test_load_summary_counts() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();

    let summary = repo.load(&sample_batch()).unwrap();

    assert_eq!(summary.orders, 3);
    assert_eq!(summary.line_items, 3);
    assert_eq!(summary.products, 2);
    assert_eq!(summary.staff, 1);
    assert_eq!(summary.locations, 1);
    // ord_2 与 ord_3 共享同一小时桶
    assert_eq!(summary.time_buckets, 2);
    assert!(summary.referential_defects.is_empty());
}

#[test]
fn test_reload_is_idempotent() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();
    let batch = sample_batch();

    let first = repo.load(&batch).unwrap();
    let second = repo.load(&batch).unwrap();

    // 两次装载后状态与一次装载完全一致
    assert_eq!(first.orders, second.orders);
    assert_eq!(first.line_items, second.line_items);

    let aggregates = repo.query(&QueryFilters::default()).unwrap();
    assert_eq!(aggregates.headline.order_count, 3);
    // 非作废: ord_1 118 + ord_2 59
    assert_eq!(aggregates.headline.net_sales, 177.0);
}

#[test]
fn test_load_fully_supersedes_prior_dataset() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();

    repo.load(&sample_batch()).unwrap();

    // 新批次只含一单, 旧数据应整体消失
    let mut fresh = NormalizedBatch::new();
    fresh.orders.push(make_order("ord_new", 5, 12));
    repo.load(&fresh).unwrap();

    let aggregates = repo.query(&QueryFilters::default()).unwrap();
    assert_eq!(aggregates.headline.order_count, 1);
    assert_eq!(aggregates.headline.net_sales, 118.0);
}

#[test]
fn test_orphan_line_item_rejected_and_reported() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();

    let mut batch = sample_batch();
    batch
        .line_items
        .push(make_line_item("ln_orphan", "ord_missing", "prod_1"));

    let summary = repo.load(&batch).unwrap();

    // 孤儿明细被拒绝且被上报, 其余数据正常落库
    assert_eq!(summary.line_items, 3);
    assert_eq!(summary.referential_defects, vec!["ln_orphan".to_string()]);

    let aggregates = repo.query(&QueryFilters::default()).unwrap();
    assert_eq!(aggregates.headline.order_count, 3);
}

#[test]
fn test_headline_kpis() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();
    repo.load(&sample_batch()).unwrap();

    let kpis = repo.query(&QueryFilters::default()).unwrap().headline;

    assert_eq!(kpis.order_count, 3);
    assert_eq!(kpis.net_sales, 177.0);
    assert_eq!(kpis.void_count, 1);
    assert_eq!(kpis.refund_count, 0);
    // 非作废单均值 (118 + 59) / 2
    assert!((kpis.avg_order_value.unwrap() - 88.5).abs() < 1e-9);
}

#[test]
fn test_date_range_filter_inclusive_both_ends() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();
    repo.load(&sample_batch()).unwrap();

    let filters = QueryFilters {
        start_date: Some(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
        end_date: Some(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()),
        ..Default::default()
    };

    let aggregates = repo.query(&filters).unwrap();
    // 6 月 2 日: ord_2 与 ord_3
    assert_eq!(aggregates.headline.order_count, 2);
}

#[test]
fn test_empty_date_range_returns_zero_aggregates() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();
    repo.load(&sample_batch()).unwrap();

    let filters = QueryFilters {
        start_date: Some(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()),
        end_date: Some(NaiveDate::from_ymd_opt(2030, 1, 31).unwrap()),
        ..Default::default()
    };

    let aggregates = repo.query(&filters).unwrap();

    // 零行结果: 零值/None, 不报错
    assert_eq!(aggregates.headline.order_count, 0);
    assert_eq!(aggregates.headline.net_sales, 0.0);
    assert!(aggregates.headline.avg_order_value.is_none());
    assert!(aggregates.tender_mix.is_empty());
    assert!(aggregates.top_products.is_empty());
    assert!(aggregates.hourly.is_empty());
}

#[test]
fn test_daypart_and_tender_filters() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();
    repo.load(&sample_batch()).unwrap();

    let filters = QueryFilters {
        daypart: Some("Evening".to_string()),
        ..Default::default()
    };
    let aggregates = repo.query(&filters).unwrap();
    assert_eq!(aggregates.headline.order_count, 2);

    // tender mix 按销售额降序
    let all = repo.query(&QueryFilters::default()).unwrap();
    assert_eq!(all.tender_mix[0].tender_type, "debit");
    assert_eq!(all.tender_mix[0].sales, 118.0);
}

#[test]
fn test_category_filter_via_line_item_existence() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();
    repo.load(&sample_batch()).unwrap();

    // Edibles 只出现在 ord_1 的明细里
    let filters = QueryFilters {
        category: Some("Edibles".to_string()),
        ..Default::default()
    };
    let aggregates = repo.query(&filters).unwrap();
    assert_eq!(aggregates.headline.order_count, 1);

    let filters = QueryFilters {
        category: Some("Nonexistent".to_string()),
        ..Default::default()
    };
    let aggregates = repo.query(&filters).unwrap();
    assert_eq!(aggregates.headline.order_count, 0);
}

#[test]
fn test_staff_and_location_filters() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();
    repo.load(&sample_batch()).unwrap();

    let filters = QueryFilters {
        staff_id: Some("staff_001".to_string()),
        locations: Some(vec!["loc_001".to_string()]),
        ..Default::default()
    };
    let aggregates = repo.query(&filters).unwrap();
    assert_eq!(aggregates.headline.order_count, 3);

    let filters = QueryFilters {
        locations: Some(vec!["loc_999".to_string()]),
        ..Default::default()
    };
    let aggregates = repo.query(&filters).unwrap();
    assert_eq!(aggregates.headline.order_count, 0);
}

#[test]
fn test_top_products_excludes_voided_orders() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();

    let mut batch = sample_batch();
    // 作废单挂一条大额明细, 不应计入商品榜
    batch
        .line_items
        .push(make_line_item("ln_void", "ord_3", "prod_2"));

    repo.load(&batch).unwrap();
    let aggregates = repo.query(&QueryFilters::default()).unwrap();

    // prod_1 两条非作废明细(50+50), prod_2 一条(50)
    assert_eq!(aggregates.top_products[0].product_name, "widget");
    assert_eq!(aggregates.top_products[0].net_sales, 100.0);
    assert_eq!(aggregates.top_products.len(), 2);
}

#[test]
fn test_failed_load_rolls_back_and_keeps_prior_dataset() {
    logging::init_test();
    let (tmp, repo) = create_test_store().unwrap();
    repo.load(&sample_batch()).unwrap();

    // 借第二连接把目标表改名, 使下一次装载中途失败
    let side = rusqlite::Connection::open(tmp.path()).unwrap();
    side.execute(
        "ALTER TABLE fact_line_items RENAME TO fact_line_items_hidden",
        [],
    )
    .unwrap();

    let mut fresh = NormalizedBatch::new();
    fresh.orders.push(make_order("ord_new", 9, 12));
    let err = repo.load(&fresh).unwrap_err();
    assert!(matches!(
        err,
        pos_sales_dss::store::StoreError::LoadFailure(_)
    ));

    side.execute(
        "ALTER TABLE fact_line_items_hidden RENAME TO fact_line_items",
        [],
    )
    .unwrap();

    // 整体回滚: 旧数据集完整可查, 新批次不可见
    let aggregates = repo.query(&QueryFilters::default()).unwrap();
    assert_eq!(aggregates.headline.order_count, 3);
    assert_eq!(aggregates.headline.net_sales, 177.0);
}

#[test]
fn test_hostile_filter_value_is_bound_not_interpolated() {
    logging::init_test();
    let (_tmp, repo) = create_test_store().unwrap();
    repo.load(&sample_batch()).unwrap();

    let filters = QueryFilters {
        order_type: Some("x'; DROP TABLE fact_sales; --".to_string()),
        ..Default::default()
    };

    // 不报错, 不命中, 表仍在
    let aggregates = repo.query(&filters).unwrap();
    assert_eq!(aggregates.headline.order_count, 0);

    let after = repo.query(&QueryFilters::default()).unwrap();
    assert_eq!(after.headline.order_count, 3);
}
