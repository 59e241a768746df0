// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的临时数据库、实体构造等功能
// ==========================================

use chrono::{FixedOffset, NaiveDate, TimeZone};
use pos_sales_dss::domain::{
    CanonicalLineItem, CanonicalOrder, CanonicalProduct, CanonicalStaffMember,
};
use pos_sales_dss::store::StarSchemaRepository;
use std::error::Error;
use std::io::Write;
use tempfile::NamedTempFile;

/// 创建临时数据库上的星型模型仓储
///
/// # 返回
/// - NamedTempFile: 临时数据库文件(需要保持存活)
/// - StarSchemaRepository: 已建表的仓储
pub fn create_test_store() -> Result<(NamedTempFile, StarSchemaRepository), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();
    let repo = StarSchemaRepository::new(&db_path)?;
    Ok((temp_file, repo))
}

/// 写入带指定后缀的临时文件
pub fn write_temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    write!(file, "{}", content).expect("Failed to write temp file");
    file
}

/// 构造规范化订单(纽约夏令时偏移, 2025-06 某日)
pub fn make_order(order_id: &str, day: u32, hour: u32) -> CanonicalOrder {
    let offset = FixedOffset::west_opt(4 * 3600).unwrap();
    let daypart = if (9..12).contains(&hour) {
        "Morning"
    } else if (12..17).contains(&hour) {
        "Afternoon"
    } else if (17..21).contains(&hour) {
        "Evening"
    } else {
        "Other"
    };

    CanonicalOrder {
        order_id: order_id.to_string(),
        location_id: "loc_001".to_string(),
        location_name: "Columbus".to_string(),
        staff_id: "staff_001".to_string(),
        timestamp: offset.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap(),
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
        date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
        hour,
        day_of_week: NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .format("%A")
            .to_string(),
        daypart: daypart.to_string(),
        time_bucket_id: format!("202506{:02}{:02}", day, hour),
    }
}

/// 构造规范化明细
pub fn make_line_item(line_id: &str, order_id: &str, product_id: &str) -> CanonicalLineItem {
    CanonicalLineItem {
        line_id: line_id.to_string(),
        order_id: order_id.to_string(),
        product_id: product_id.to_string(),
        product_name: "test product".to_string(),
        category: "Flower".to_string(),
        quantity: 2.0,
        unit_price: 25.0,
        unit_cost: 10.0,
        discount: 0.0,
        total: 50.0,
        margin: 30.0,
    }
}

/// 构造规范化商品
pub fn make_product(product_id: &str, name: &str, category: &str) -> CanonicalProduct {
    CanonicalProduct {
        product_id: product_id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        subcategory: String::new(),
        unit_cost: 10.0,
        unit_price: 25.0,
    }
}

/// 构造规范化员工
pub fn make_staff(staff_id: &str, name: &str) -> CanonicalStaffMember {
    CanonicalStaffMember {
        staff_id: staff_id.to_string(),
        name: name.to_string(),
    }
}
