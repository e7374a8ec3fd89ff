//! Shared integration test fixtures
//!
//! Each [`TestEnv`] owns a temporary root folder with its own database file
//! and local object store.

#![allow(dead_code)]

use reims_common::config::{TomlConfig, UnitCountPolicy};
use reims_ingest::services::filename_parser::PropertyAliases;
use reims_ingest::services::storage::{LocalObjectStore, ObjectStore};
use reims_ingest::services::worker::{spawn_worker, JobQueue};
use reims_ingest::services::{Ingestor, Processor};
use reims_ingest::AppState;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub struct TestEnv {
    /// Must outlive the pool and the store
    pub dir: TempDir,
    pub db: SqlitePool,
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<TomlConfig>,
    pub aliases: Arc<PropertyAliases>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_config(TomlConfig::default()).await
    }

    pub async fn with_policy(policy: UnitCountPolicy) -> Self {
        let mut config = TomlConfig::default();
        config.rent_roll.unit_count_policy = policy;
        Self::with_config(config).await
    }

    pub async fn with_config(config: TomlConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let db = reims_ingest::db::init_database_pool(&dir.path().join("reims.db"))
            .await
            .unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(
            LocalObjectStore::new(&dir.path().join("storage"), &config.storage.bucket).unwrap(),
        );
        let aliases = Arc::new(PropertyAliases::new(&config.aliases).unwrap());

        Self {
            dir,
            db,
            store,
            config: Arc::new(config),
            aliases,
        }
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.db.clone(), self.store.clone(), self.aliases.clone())
    }

    pub fn processor(&self) -> Processor {
        Processor::new(
            self.db.clone(),
            self.store.clone(),
            self.config.rent_roll.unit_count_policy,
        )
    }

    /// App state backed by a running worker
    pub fn app_state(&self) -> (AppState, JoinHandle<()>) {
        let (queue, handle) = spawn_worker(self.processor(), 16);
        (self.state_with_queue(queue), handle)
    }

    pub fn state_with_queue(&self, queue: JobQueue) -> AppState {
        AppState::new(
            self.db.clone(),
            self.store.clone(),
            queue,
            self.config.clone(),
            self.aliases.clone(),
        )
    }

    /// Insert a property with a fixed id
    pub async fn insert_property(&self, id: i64, name: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO properties (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(&now)
            .bind(&now)
            .execute(&self.db)
            .await
            .unwrap();
    }
}

/// Poll until the document leaves `queued`/`processing`
pub async fn wait_for_terminal(db: &SqlitePool, id: uuid::Uuid) -> reims_common::models::Document {
    for _ in 0..200 {
        let doc = reims_ingest::db::documents::get_document(db, id)
            .await
            .unwrap()
            .unwrap();
        if doc.status.is_terminal() {
            return doc;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    panic!("document {} did not finish processing", id);
}

pub const HAMMOND_RENT_ROLL_CSV: &str = "\
Unit,Tenant,Status,Sq Ft,Monthly Rent,Lease Start,Lease End
101,Acme Dental,Occupied,1200,\"$2,400.00\",01/01/2024,12/31/2028
102,,Vacant,900,,,
103,Shoe Outlet,Leased,1500,\"3,000\",2023-06-01,2026-05-31
Total Units: 3,,,3600,5400,,
";
