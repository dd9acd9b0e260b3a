//! Record store for deployments without entity records: every statement is a successful no-op.

use crate::error::AppError;
use crate::store::RecordStore;
use crate::tenant::Tenant;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpRecordStore;

#[async_trait]
impl<Tx: Send + 'static> RecordStore<Tx> for NoOpRecordStore {
    async fn remove_key(&self, _: &Tenant, _: &str, _: &str, _: Option<&mut Tx>) -> Result<u64, AppError> {
        Ok(0)
    }

    async fn prune_options(
        &self,
        _: &Tenant,
        _: &str,
        _: &str,
        _: &[String],
        _: bool,
        _: Option<&mut Tx>,
    ) -> Result<u64, AppError> {
        Ok(0)
    }

    async fn count_with_key(&self, _: &Tenant, _: &str, _: &str, _: Option<&mut Tx>) -> Result<u64, AppError> {
        Ok(0)
    }

    async fn count_with_option(
        &self,
        _: &Tenant,
        _: &str,
        _: &str,
        _: &str,
        _: bool,
        _: Option<&mut Tx>,
    ) -> Result<u64, AppError> {
        Ok(0)
    }
}
