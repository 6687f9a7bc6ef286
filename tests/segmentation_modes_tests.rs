mod common;

use rust_decimal_macros::dec;

use common::*;
use vendor_segments::services::segmentation::{segment_customers, SegmentRules};
use vendor_segments::services::transaction_store::{load_snapshot, AggregationMode};

/// A vendor whose customers hit every rule boundary
async fn seed_mixed_vendor(db: &sea_orm::DatabaseConnection) -> i32 {
    let vendor = create_vendor(db, "Mama Put", "token-a", Some("sk_test_a")).await;

    // Loyal and high value: three recent orders, 900.00 total
    let ada = create_customer(db, vendor.id, "CUS_ada", "ada@example.com", Some("Ada")).await;
    create_transaction(db, &ada, "a1", 30_000, "success", Some(days_ago(5))).await;
    create_transaction(db, &ada, "a2", 30_000, "success", Some(days_ago(20))).await;
    create_transaction(db, &ada, "a3", 30_000, "success", Some(days_ago(89))).await;
    create_transaction(db, &ada, "a4", 99_999, "failed", Some(days_ago(1))).await;

    // Only one order inside the loyalty window
    let kofi = create_customer(db, vendor.id, "CUS_kofi", "kofi.mensah@example.com", None).await;
    create_transaction(db, &kofi, "k1", 10_000, "success", Some(days_ago(120))).await;
    create_transaction(db, &kofi, "k2", 10_000, "success", Some(days_ago(95))).await;
    create_transaction(db, &kofi, "k3", 10_000, "success", Some(days_ago(10))).await;

    // Single old order: at risk and dormant
    let dele = create_customer(db, vendor.id, "CUS_dele", "dele@example.com", None).await;
    create_transaction(db, &dele, "d1", 5_000, "success", Some(days_ago(200))).await;

    // Exactly 30 days idle, plus a successful order with no paid_at
    let esi = create_customer(db, vendor.id, "CUS_esi", "esi@example.com", None).await;
    create_transaction(db, &esi, "e1", 10_000, "success", Some(days_ago(30))).await;
    create_transaction(db, &esi, "e2", 45_001, "success", None).await;

    // Only abandoned payments
    let fola = create_customer(db, vendor.id, "CUS_fola", "fola@example.com", None).await;
    create_transaction(db, &fola, "f1", 70_000, "abandoned", Some(days_ago(2))).await;

    // No transactions at all
    create_customer(db, vendor.id, "CUS_gifty", "gifty@example.com", None).await;

    vendor.id
}

#[tokio::test]
async fn test_in_memory_and_pushdown_agree() {
    let db = setup_test_db().await.unwrap();
    let vendor_id = seed_mixed_vendor(&db).await;
    let rules = SegmentRules::default();
    let now = test_now();

    let in_memory = load_snapshot(&db, vendor_id, AggregationMode::InMemory, rules.recent_since(now))
        .await
        .unwrap();
    let pushdown = load_snapshot(&db, vendor_id, AggregationMode::Pushdown, rules.recent_since(now))
        .await
        .unwrap();

    assert_eq!(in_memory.stats, pushdown.stats);
    assert_eq!(in_memory.totals, pushdown.totals);

    let a = segment_customers(&in_memory.customers, &in_memory.stats, in_memory.totals, now, &rules);
    let b = segment_customers(&pushdown.customers, &pushdown.stats, pushdown.totals, now, &rules);
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_vendor_report_over_store() {
    let db = setup_test_db().await.unwrap();
    let vendor_id = seed_mixed_vendor(&db).await;
    let rules = SegmentRules::default();
    let now = test_now();

    let snapshot = load_snapshot(&db, vendor_id, AggregationMode::Pushdown, rules.recent_since(now))
        .await
        .unwrap();
    let report = segment_customers(&snapshot.customers, &snapshot.stats, snapshot.totals, now, &rules);
    let metrics = &report.metrics;

    assert_eq!(metrics.total_customers, 6);
    // Failed and abandoned payments never count
    assert_eq!(metrics.total_orders, 9);
    assert_eq!(metrics.total_spent, dec!(1800.01));
    assert_eq!(metrics.average_order_value, dec!(200.00));

    let segments = metrics.segments;
    assert_eq!(segments.loyal_customers, 1); // ada
    assert_eq!(segments.high_value_customers, 2); // ada, esi (550.01)
    assert_eq!(segments.at_risk_customers, 2); // dele, esi
    assert_eq!(segments.dormant_customers, 3); // dele, fola, gifty

    let flags_for = |code: &str| {
        let customer = snapshot.customers.iter().find(|c| c.customer_code == code).unwrap();
        report
            .customers
            .iter()
            .find(|c| c.customer_id == customer.id)
            .unwrap()
            .flags
    };

    let kofi = flags_for("CUS_kofi");
    assert!(!kofi.loyal && !kofi.high_value && !kofi.at_risk && !kofi.dormant);

    let dele = flags_for("CUS_dele");
    assert!(dele.dormant && dele.at_risk && !dele.loyal);

    let fola = flags_for("CUS_fola");
    assert!(fola.dormant && !fola.at_risk && !fola.high_value);
}

#[tokio::test]
async fn test_vendors_are_isolated() {
    let db = setup_test_db().await.unwrap();
    let vendor_a = seed_mixed_vendor(&db).await;
    let vendor_b = create_vendor(&db, "Other Shop", "token-b", Some("sk_test_b")).await;
    let bola = create_customer(&db, vendor_b.id, "CUS_ada", "bola@example.com", None).await;
    create_transaction(&db, &bola, "b1", 1_000, "success", Some(days_ago(1))).await;

    for mode in [AggregationMode::InMemory, AggregationMode::Pushdown] {
        let b = load_snapshot(&db, vendor_b.id, mode, days_ago(90)).await.unwrap();
        assert_eq!(b.customers.len(), 1);
        assert_eq!(b.totals.order_count, 1);
        assert_eq!(b.totals.total_minor, 1_000);

        let a = load_snapshot(&db, vendor_a, mode, days_ago(90)).await.unwrap();
        assert_eq!(a.customers.len(), 6);
        assert!(!a.stats.contains_key(&bola.id));
    }
}

#[tokio::test]
async fn test_empty_vendor_has_zero_average() {
    let db = setup_test_db().await.unwrap();
    let vendor = create_vendor(&db, "New Shop", "token-new", Some("sk_test_n")).await;
    let rules = SegmentRules::default();

    for mode in [AggregationMode::InMemory, AggregationMode::Pushdown] {
        let snapshot = load_snapshot(&db, vendor.id, mode, rules.recent_since(test_now()))
            .await
            .unwrap();
        let report = segment_customers(
            &snapshot.customers,
            &snapshot.stats,
            snapshot.totals,
            test_now(),
            &rules,
        );
        assert_eq!(report.metrics.total_orders, 0);
        assert_eq!(report.metrics.average_order_value, dec!(0));
        assert_eq!(report.metrics.total_customers, 0);
    }
}

#[tokio::test]
async fn test_amount_overflow_fails_in_both_modes() {
    let db = setup_test_db().await.unwrap();
    let vendor = create_vendor(&db, "Big Spender", "token-big", Some("sk_test_b")).await;
    let whale = create_customer(&db, vendor.id, "CUS_whale", "whale@example.com", None).await;
    create_transaction(&db, &whale, "w1", i64::MAX, "success", Some(days_ago(1))).await;
    create_transaction(&db, &whale, "w2", 1, "success", Some(days_ago(2))).await;

    for mode in [AggregationMode::InMemory, AggregationMode::Pushdown] {
        let result = load_snapshot(&db, vendor.id, mode, days_ago(90)).await;
        assert!(result.is_err(), "{:?} should refuse the overflowing sum", mode);
    }
}
