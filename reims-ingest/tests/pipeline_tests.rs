//! Ingest → process → reconcile, end to end without HTTP

mod helpers;

use helpers::{wait_for_terminal, TestEnv, HAMMOND_RENT_ROLL_CSV};
use reims_common::config::UnitCountPolicy;
use reims_common::{DocumentStatus, DocumentType, Error};
use reims_ingest::db::{documents, extracted, properties, units};
use reims_ingest::services::extractor::Extraction;
use reims_ingest::services::worker::{recover_pending, spawn_worker};
use std::collections::BTreeMap;

#[tokio::test]
async fn test_ingest_names_and_records_document() {
    let env = TestEnv::new().await;

    let doc = env
        .ingestor()
        .ingest(
            "Hammond Rent Roll April 2025.csv",
            HAMMOND_RENT_ROLL_CSV.as_bytes(),
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(doc.document_type, DocumentType::RentRoll);
    assert_eq!(doc.document_year, 2025);
    assert_eq!(doc.period.as_deref(), Some("2025-04"));
    assert_eq!(doc.property_name.as_deref(), Some("Hammond Aire"));
    assert_eq!(doc.status, DocumentStatus::Queued);
    assert_eq!(doc.content_type, "text/csv");
    assert_eq!(doc.sha256.len(), 64);
    assert_eq!(
        doc.object_key,
        "Hammond Aire/2025/rent_roll/Hammond Rent Roll April 2025.csv"
    );

    assert!(env.store.exists(&doc.object_key).await.unwrap());

    let stored = documents::get_document(&env.db, doc.id).await.unwrap().unwrap();
    assert_eq!(stored.id, doc.id);
    assert_eq!(stored.object_key, doc.object_key);
    assert_eq!(stored.period, doc.period);

    let property = properties::find_property_by_name(&env.db, "Hammond Aire")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.property_id, Some(property.id));
    assert_eq!(
        documents::count_financial_documents(&env.db, property.id)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_unmatched_filename_is_unassigned_other() {
    let env = TestEnv::new().await;

    let doc = env
        .ingestor()
        .ingest("scan_0001.csv", b"a,b\n1,2\n", None, None)
        .await
        .unwrap();

    assert_eq!(doc.document_type, DocumentType::Other);
    assert!(doc.property_id.is_none());
    assert!(doc.object_key.starts_with("Unassigned/"));
}

#[tokio::test]
async fn test_property_override_resolves_alias() {
    let env = TestEnv::new().await;

    let doc = env
        .ingestor()
        .ingest("Balance Sheet 2024.csv", b"Account,Amount\nCash,10\n", None, Some("ESP"))
        .await
        .unwrap();

    assert_eq!(doc.property_name.as_deref(), Some("Eastern Shore Plaza"));
    assert_eq!(doc.object_key, "Eastern Shore Plaza/2024/balance_sheet/Balance Sheet 2024.csv");
}

#[tokio::test]
async fn test_empty_upload_rejected() {
    let env = TestEnv::new().await;
    let result = env.ingestor().ingest("Rent Roll.csv", b"", None, None).await;
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_rent_roll_processing_imports_units() {
    let env = TestEnv::new().await;
    let doc = env
        .ingestor()
        .ingest(
            "Hammond Rent Roll April 2025.csv",
            HAMMOND_RENT_ROLL_CSV.as_bytes(),
            None,
            None,
        )
        .await
        .unwrap();

    let outcome = env.processor().process(doc.id).await.unwrap().unwrap();

    assert_eq!(outcome.extraction_kind, "tabular");
    let import = outcome.rent_roll.unwrap();
    assert_eq!(import.inserted, 3);

    let doc = documents::get_document(&env.db, doc.id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Completed);
    assert!(doc.error_message.is_none());

    let property_id = doc.property_id.unwrap();
    let stored = units::list_units(&env.db, property_id).await.unwrap();
    assert_eq!(stored.len(), 3);

    let property = properties::get_property(&env.db, property_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(property.total_units, 3);
    assert_eq!(property.occupied_units, 2);
    assert_eq!(property.monthly_rent, 5400.0);
    assert_eq!(property.total_sqft, 3600.0);
}

#[tokio::test]
async fn test_declared_count_mismatch_fails_document() {
    let env = TestEnv::with_policy(UnitCountPolicy::Reject).await;
    let csv = "Unit,Tenant\n101,Acme\nTotal Units: 9,\n";

    let doc = env
        .ingestor()
        .ingest("HMND rent roll.csv", csv.as_bytes(), None, None)
        .await
        .unwrap();

    let result = env.processor().process(doc.id).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let doc = documents::get_document(&env.db, doc.id).await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Failed);
    assert!(doc.error_message.unwrap().contains("declares 9 units"));
}

#[tokio::test]
async fn test_bad_pdf_fails_then_reprocess_is_idempotent() {
    let env = TestEnv::new().await;
    let doc = env
        .ingestor()
        .ingest("Wendover Income Statement 2024.pdf", b"not really a pdf", None, None)
        .await
        .unwrap();

    assert!(env.processor().process(doc.id).await.is_err());
    let failed = documents::get_document(&env.db, doc.id).await.unwrap().unwrap();
    assert_eq!(failed.status, DocumentStatus::Failed);
    assert!(failed.error_message.is_some());

    // Terminal documents are skipped until requeued
    assert!(env.processor().process(doc.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_reprocessing_replaces_metrics() {
    let env = TestEnv::new().await;
    let doc = env
        .ingestor()
        .ingest("Wendover Income Statement 2024.pdf", b"%PDF-1.4 placeholder", None, None)
        .await
        .unwrap();

    let first = Extraction::PdfText {
        text: "Net Operating Income 100,000\nTotal Revenue 400,000".to_string(),
        metrics: BTreeMap::from([
            ("net_operating_income".to_string(), 100_000.0),
            ("total_revenue".to_string(), 400_000.0),
        ]),
    };
    let second = Extraction::PdfText {
        text: "Net Operating Income 120,000".to_string(),
        metrics: BTreeMap::from([("net_operating_income".to_string(), 120_000.0)]),
    };

    extracted::save_extraction(&env.db, doc.id, &first).await.unwrap();
    extracted::save_extraction(&env.db, doc.id, &second).await.unwrap();

    let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM extracted_data WHERE document_id = ?")
        .bind(doc.id.to_string())
        .fetch_one(&env.db)
        .await
        .unwrap();
    assert_eq!(runs, 2);

    let metrics = extracted::list_metrics(&env.db, doc.id).await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].metric_name, "net_operating_income");
    assert_eq!(metrics[0].metric_value, 120_000.0);

    let latest = extracted::latest_extraction(&env.db, doc.id).await.unwrap().unwrap();
    assert_eq!(latest, second);
}

#[tokio::test]
async fn test_same_name_upload_keeps_earlier_object() {
    let env = TestEnv::new().await;
    let ingestor = env.ingestor();
    let name = "Hammond Rent Roll April 2025.csv";

    let first = ingestor
        .ingest(name, HAMMOND_RENT_ROLL_CSV.as_bytes(), None, None)
        .await
        .unwrap();
    let revised = ingestor
        .ingest(name, b"Unit,Status\n999,vacant\n", None, None)
        .await
        .unwrap();
    let repeat = ingestor
        .ingest(name, HAMMOND_RENT_ROLL_CSV.as_bytes(), None, None)
        .await
        .unwrap();

    assert_eq!(
        revised.object_key,
        "Hammond Aire/2025/rent_roll/Hammond Rent Roll April 2025 (2).csv"
    );
    assert_eq!(revised.original_filename, name);
    assert_eq!(repeat.object_key, first.object_key);

    let stored = env.store.get(&first.object_key).await.unwrap();
    assert_eq!(stored, HAMMOND_RENT_ROLL_CSV.as_bytes());
    let stored = env.store.get(&revised.object_key).await.unwrap();
    assert_eq!(stored, b"Unit,Status\n999,vacant\n");
}

#[tokio::test]
async fn test_path_like_property_override_rejected() {
    let env = TestEnv::new().await;

    let result = env
        .ingestor()
        .ingest("Balance Sheet 2024.csv", b"Account,Amount\n", None, Some(".."))
        .await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(properties::find_property_by_name(&env.db, "..")
        .await
        .unwrap()
        .is_none());
    assert!(env.store.list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_worker_recovers_unfinished_documents() {
    let env = TestEnv::new().await;
    let ingestor = env.ingestor();

    let queued = ingestor
        .ingest("Hammond Rent Roll April 2025.csv", HAMMOND_RENT_ROLL_CSV.as_bytes(), None, None)
        .await
        .unwrap();
    let stuck = ingestor
        .ingest("notes.csv", b"a,b\n1,2\n", None, None)
        .await
        .unwrap();
    documents::update_status(&env.db, stuck.id, DocumentStatus::Processing, None)
        .await
        .unwrap();

    let (queue, handle) = spawn_worker(env.processor(), 4);
    let recovered = recover_pending(&env.db, &queue).await.unwrap();
    assert_eq!(recovered, 2);

    for id in [queued.id, stuck.id] {
        let doc = wait_for_terminal(&env.db, id).await;
        assert_eq!(doc.status, DocumentStatus::Completed);
    }

    drop(queue);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_reconcile_reports_orphans_missing_and_drift() {
    let env = TestEnv::new().await;

    let doc = env
        .ingestor()
        .ingest("Hammond Rent Roll April 2025.csv", HAMMOND_RENT_ROLL_CSV.as_bytes(), None, None)
        .await
        .unwrap();
    env.processor().process(doc.id).await.unwrap();

    let clean = reims_ingest::services::reconciler::reconcile(&env.db, env.store.as_ref())
        .await
        .unwrap();
    assert!(clean.is_clean(), "unexpected findings: {:?}", clean);

    env.store
        .put("properties/7/0b7e0f3c-8d7b-4c43-9a8e-3a1f1d2b9c10_old.pdf", b"%PDF")
        .await
        .unwrap();
    env.store.delete(&doc.object_key).await.unwrap();
    sqlx::query("UPDATE properties SET occupied_units = 0")
        .execute(&env.db)
        .await
        .unwrap();

    let report = reims_ingest::services::reconciler::reconcile(&env.db, env.store.as_ref())
        .await
        .unwrap();

    assert_eq!(report.orphan_objects.len(), 1);
    assert_eq!(report.orphan_objects[0].layout, "legacy");
    assert_eq!(report.missing_objects.len(), 1);
    assert_eq!(report.missing_objects[0].document_id, doc.id);
    assert_eq!(report.aggregate_drift.len(), 1);
    assert_eq!(report.aggregate_drift[0].actual_occupied_units, 2);
}
