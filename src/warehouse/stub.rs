//! In-memory [`Warehouse`] for unit tests

use super::types::{CompletedJob, JobError, LoadJob, RowError, TableInfo, TableRef};
use super::Warehouse;
use crate::error::{Error, Result};
use crate::policy::LoadConfiguration;
use crate::types::JsonValue;
use async_trait::async_trait;
use std::sync::Mutex;

/// How the stub answers a load
#[derive(Debug, Clone)]
pub(crate) enum LoadBehavior {
    Succeed,
    JobErrors(Vec<String>),
    SubmitFails(String),
    FatalResult(String),
    /// `jobs.get` itself fails (transport or 5xx after retries)
    WaitFails(String),
    /// Clean load, but the row count lookup fails
    TableFails(String),
}

/// How the stub answers an audit insert
#[derive(Debug, Clone)]
pub(crate) enum InsertBehavior {
    Accept,
    RejectRows,
    Fail(String),
}

/// Submitted load: source URI, destination, configuration
pub(crate) type LoadCall = (String, TableRef, LoadConfiguration);

#[derive(Debug)]
pub(crate) struct StubWarehouse {
    pub load: LoadBehavior,
    pub insert: InsertBehavior,
    pub table_rows: Option<u64>,
    pub loads: Mutex<Vec<LoadCall>>,
    pub inserts: Mutex<Vec<(TableRef, Vec<JsonValue>)>>,
}

impl StubWarehouse {
    pub fn new(load: LoadBehavior, insert: InsertBehavior) -> Self {
        Self {
            load,
            insert,
            table_rows: Some(3),
            loads: Mutex::new(Vec::new()),
            inserts: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(LoadBehavior::Succeed, InsertBehavior::Accept)
    }

    pub fn loads(&self) -> Vec<LoadCall> {
        self.loads.lock().unwrap().clone()
    }

    pub fn inserts(&self) -> Vec<(TableRef, Vec<JsonValue>)> {
        self.inserts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for StubWarehouse {
    async fn load_table_from_uri(
        &self,
        source_uri: &str,
        destination: &TableRef,
        config: &LoadConfiguration,
    ) -> Result<LoadJob> {
        self.loads
            .lock()
            .unwrap()
            .push((source_uri.to_string(), destination.clone(), config.clone()));

        if let LoadBehavior::SubmitFails(message) = &self.load {
            return Err(Error::http_status(403, message.clone()));
        }

        Ok(LoadJob {
            project_id: destination.project_id.clone(),
            job_id: "stub_job".to_string(),
            location: None,
        })
    }

    async fn wait_for_job(&self, job: &LoadJob) -> Result<CompletedJob> {
        let errors = match &self.load {
            LoadBehavior::JobErrors(messages) => {
                messages.iter().map(JobError::message).collect()
            }
            LoadBehavior::FatalResult(message) => {
                return Err(Error::load_job(&job.job_id, message.clone()));
            }
            LoadBehavior::WaitFails(message) => {
                return Err(Error::http_status(503, message.clone()));
            }
            _ => Vec::new(),
        };

        Ok(CompletedJob {
            job: job.clone(),
            errors,
            output_rows: self.table_rows,
        })
    }

    async fn get_table(&self, table: &TableRef) -> Result<TableInfo> {
        if let LoadBehavior::TableFails(message) = &self.load {
            return Err(Error::http_status(404, message.clone()));
        }
        Ok(TableInfo {
            table: table.clone(),
            num_rows: self.table_rows,
        })
    }

    async fn insert_rows_json(
        &self,
        table: &TableRef,
        rows: &[JsonValue],
    ) -> Result<Vec<RowError>> {
        self.inserts
            .lock()
            .unwrap()
            .push((table.clone(), rows.to_vec()));

        match &self.insert {
            InsertBehavior::Accept => Ok(Vec::new()),
            InsertBehavior::RejectRows => Ok(vec![RowError {
                index: 0,
                errors: vec![JobError::message("no such field: status")],
            }]),
            InsertBehavior::Fail(message) => Err(Error::http_status(500, message.clone())),
        }
    }
}
