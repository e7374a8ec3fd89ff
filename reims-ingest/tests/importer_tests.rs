//! Rent roll import and property recompute against a real database

mod helpers;

use helpers::TestEnv;
use reims_common::config::UnitCountPolicy;
use reims_common::models::UnitRecord;
use reims_common::{Error, UnitStatus};
use reims_ingest::db::{properties, units};
use reims_ingest::services::importer::{import_rent_roll, recompute_all, recompute_property};

fn unit(number: &str, status: UnitStatus) -> UnitRecord {
    UnitRecord {
        unit_number: number.to_string(),
        status,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_property_six_occupancy() {
    let env = TestEnv::new().await;
    env.insert_property(6, "Wendover Commons").await;

    let units = vec![unit("101", UnitStatus::Occupied), unit("102", UnitStatus::Vacant)];
    let outcome = import_rent_roll(&env.db, 6, &units, None, UnitCountPolicy::Reject)
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.total_units, 2);
    assert_eq!(outcome.occupied_units, 1);
    assert_eq!(outcome.occupancy_rate, 50.0);

    let property = properties::get_property(&env.db, 6).await.unwrap().unwrap();
    assert_eq!(property.total_units, 2);
    assert_eq!(property.occupied_units, 1);
    assert_eq!(property.occupancy_rate, 50.0);
}

#[tokio::test]
async fn test_reimport_replaces_units() {
    let env = TestEnv::new().await;
    env.insert_property(1, "Hammond Aire").await;

    let units = vec![
        unit("101", UnitStatus::Occupied),
        unit("102", UnitStatus::Vacant),
        unit("103", UnitStatus::UnderLease),
    ];

    for _ in 0..2 {
        import_rent_roll(&env.db, 1, &units, None, UnitCountPolicy::Reject)
            .await
            .unwrap();
    }

    let stored = units::list_units(&env.db, 1).await.unwrap();
    assert_eq!(stored.len(), 3);

    let property = properties::get_property(&env.db, 1).await.unwrap().unwrap();
    assert_eq!(property.total_units, 3);
    assert_eq!(property.occupied_units, 1);
}

#[tokio::test]
async fn test_duplicate_unit_numbers_skipped() {
    let env = TestEnv::new().await;
    env.insert_property(1, "Hammond Aire").await;

    let units = vec![
        unit("101", UnitStatus::Occupied),
        unit("101", UnitStatus::Vacant),
        unit("102", UnitStatus::Vacant),
    ];
    let outcome = import_rent_roll(&env.db, 1, &units, None, UnitCountPolicy::Reject)
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.warnings.len(), 1);

    let stored = units::list_units(&env.db, 1).await.unwrap();
    assert_eq!(stored[0].record.status, UnitStatus::Occupied);
}

#[tokio::test]
async fn test_count_mismatch_rejects_and_keeps_old_units() {
    let env = TestEnv::new().await;
    env.insert_property(1, "Hammond Aire").await;

    let original = vec![unit("101", UnitStatus::Occupied)];
    import_rent_roll(&env.db, 1, &original, None, UnitCountPolicy::Reject)
        .await
        .unwrap();

    let replacement = vec![unit("201", UnitStatus::Vacant), unit("202", UnitStatus::Vacant)];
    let result = import_rent_roll(&env.db, 1, &replacement, Some(5), UnitCountPolicy::Reject).await;

    assert!(matches!(result, Err(Error::Validation(_))));
    let stored = units::list_units(&env.db, 1).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].record.unit_number, "101");
}

#[tokio::test]
async fn test_count_mismatch_warns_under_warn_policy() {
    let env = TestEnv::new().await;
    env.insert_property(1, "Hammond Aire").await;

    let units = vec![unit("201", UnitStatus::Vacant), unit("202", UnitStatus::Occupied)];
    let outcome = import_rent_roll(&env.db, 1, &units, Some(5), UnitCountPolicy::Warn)
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.warnings.len(), 1);
}

#[tokio::test]
async fn test_unknown_property_not_found() {
    let env = TestEnv::new().await;

    let result = import_rent_roll(
        &env.db,
        99,
        &[unit("101", UnitStatus::Occupied)],
        None,
        UnitCountPolicy::Reject,
    )
    .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_recompute_sums_rent_and_area() {
    let env = TestEnv::new().await;
    env.insert_property(1, "Eastern Shore Plaza").await;

    let units = vec![
        UnitRecord {
            unit_number: "A".into(),
            status: UnitStatus::Occupied,
            sqft: Some(1000.0),
            monthly_rent: Some(2500.0),
            ..Default::default()
        },
        UnitRecord {
            unit_number: "B".into(),
            status: UnitStatus::Maintenance,
            sqft: Some(500.0),
            ..Default::default()
        },
    ];
    import_rent_roll(&env.db, 1, &units, None, UnitCountPolicy::Reject)
        .await
        .unwrap();

    let property = properties::get_property(&env.db, 1).await.unwrap().unwrap();
    assert_eq!(property.monthly_rent, 2500.0);
    assert_eq!(property.total_sqft, 1500.0);
    assert_eq!(property.occupied_units, 1);
}

#[tokio::test]
async fn test_recompute_all_repairs_drift() {
    let env = TestEnv::new().await;
    env.insert_property(1, "Hammond Aire").await;
    env.insert_property(2, "Wendover Commons").await;

    import_rent_roll(
        &env.db,
        1,
        &[unit("101", UnitStatus::Occupied), unit("102", UnitStatus::Occupied)],
        None,
        UnitCountPolicy::Reject,
    )
    .await
    .unwrap();

    sqlx::query("UPDATE properties SET total_units = 40, occupied_units = 39, occupancy_rate = 97.5")
        .execute(&env.db)
        .await
        .unwrap();

    let updated = recompute_all(&env.db).await.unwrap();
    assert_eq!(updated, 2);

    let first = properties::get_property(&env.db, 1).await.unwrap().unwrap();
    assert_eq!((first.total_units, first.occupied_units), (2, 2));
    assert_eq!(first.occupancy_rate, 100.0);

    let second = properties::get_property(&env.db, 2).await.unwrap().unwrap();
    assert_eq!((second.total_units, second.occupied_units), (0, 0));
    assert_eq!(second.occupancy_rate, 0.0);
}

#[tokio::test]
async fn test_recompute_property_on_connection() {
    let env = TestEnv::new().await;
    env.insert_property(3, "The Crossings of Spring Hill").await;

    let mut conn = env.db.acquire().await.unwrap();
    let aggregates = recompute_property(&mut conn, 3).await.unwrap();

    assert_eq!(aggregates.total_units, 0);
    assert_eq!(aggregates.total_sqft, None);
}
