//! Compute-job orchestration.
//!
//! Acquires orders for every asset a compute job consumes, algorithm
//! first, then hands the resulting order references to the Provider to
//! start the job.

use crate::acquire::OrderService;
use crate::error::{AcquiredOrders, OrderError, Result};
use chrono::{DateTime, Utc};
use kelp_chain::{TransactionId, Wallet};
use kelp_provider::{AssetRef, ComputeInitializeResult, ComputeJob, ComputeJobRequest, ProviderError};
use tracing::info;

/// Order references for all assets of a prepared compute job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeJobHandles {
    /// Order transaction ids for the datasets, in request order.
    pub dataset_tx_ids: Vec<TransactionId>,
    /// Order transaction id for the algorithm.
    pub algorithm_tx_id: TransactionId,
}

impl OrderService {
    /// Acquire orders for every asset of a compute job.
    ///
    /// All assets are initialized against the Provider in a single
    /// request, then acquired one by one: the algorithm first, then each
    /// dataset in the order given. The algorithm-first ordering keeps an
    /// unusable algorithm from costing anything for the datasets.
    ///
    /// # Errors
    ///
    /// On any per-asset failure, returns [`OrderError::PartialComputeJob`]
    /// carrying the orders acquired before the failure. Those orders are
    /// real and confirmed; the caller can retry the remaining assets or
    /// reuse the acquired ones in a later job.
    pub async fn prepare_compute_job(
        &self,
        datasets: &[AssetRef],
        algorithm: &AssetRef,
        environment_id: &str,
        valid_until: DateTime<Utc>,
        payer: &Wallet,
    ) -> Result<ComputeJobHandles> {
        let init = self
            .provider()
            .initialize_compute(datasets, algorithm, environment_id, valid_until, payer.address())
            .await?;
        let handles = self
            .acquire_job_assets(datasets, algorithm, &init, payer)
            .await?;

        info!(
            environment = environment_id,
            datasets = handles.dataset_tx_ids.len(),
            "compute job assets acquired"
        );
        Ok(handles)
    }

    /// Acquire orders for compute-job assets from an initialization result
    /// already in hand.
    ///
    /// # Errors
    ///
    /// Returns a Provider error when the result does not carry one entry
    /// per dataset, and [`OrderError::PartialComputeJob`] on any per-asset
    /// acquisition failure.
    pub async fn acquire_job_assets(
        &self,
        datasets: &[AssetRef],
        algorithm: &AssetRef,
        init: &ComputeInitializeResult,
        payer: &Wallet,
    ) -> Result<ComputeJobHandles> {
        if init.datasets.len() != datasets.len() {
            return Err(OrderError::Provider(ProviderError::request_failed(format!(
                "initialize returned {} dataset results for {} datasets",
                init.datasets.len(),
                datasets.len()
            ))));
        }

        let algorithm_tx_id = self
            .acquire(algorithm, &init.algorithm, payer)
            .await
            .map_err(|source| partial(algorithm, AcquiredOrders::default(), source))?;

        let mut dataset_tx_ids = Vec::with_capacity(datasets.len());
        for (asset, asset_init) in datasets.iter().zip(&init.datasets) {
            match self.acquire(asset, asset_init, payer).await {
                Ok(tx_id) => dataset_tx_ids.push(tx_id),
                Err(source) => {
                    let acquired = AcquiredOrders {
                        algorithm_tx_id: Some(algorithm_tx_id),
                        dataset_tx_ids,
                    };
                    return Err(partial(asset, acquired, source));
                }
            }
        }

        Ok(ComputeJobHandles {
            dataset_tx_ids,
            algorithm_tx_id,
        })
    }

    /// Prepare and start a compute job in one step.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::prepare_compute_job`], plus Provider
    /// errors from starting the job (unknown environment, job limit).
    pub async fn run_compute_job(
        &self,
        datasets: &[AssetRef],
        algorithm: &AssetRef,
        environment_id: &str,
        valid_until: DateTime<Utc>,
        payer: &Wallet,
    ) -> Result<(ComputeJob, ComputeJobHandles)> {
        let handles = self
            .prepare_compute_job(datasets, algorithm, environment_id, valid_until, payer)
            .await?;
        let request = ComputeJobRequest {
            environment_id: environment_id.to_string(),
            consumer: payer.address().clone(),
            dataset_tx_ids: handles.dataset_tx_ids.clone(),
            algorithm_tx_id: handles.algorithm_tx_id.clone(),
        };
        let job = self.provider().start_compute(&request).await?;
        info!(job = %job.job_id, environment = environment_id, "compute job started");
        Ok((job, handles))
    }
}

fn partial(asset: &AssetRef, acquired: AcquiredOrders, source: OrderError) -> OrderError {
    OrderError::PartialComputeJob {
        asset: asset.to_string(),
        acquired,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use kelp_chain::{Address, Amount, ChainClient};
    use kelp_provider::{ComputeJobStatus, ProviderClient};
    use std::sync::Arc;

    fn addr() -> Address {
        Wallet::generate().expect("wallet").address().clone()
    }

    fn service() -> (Arc<ChainClient>, Arc<ProviderClient>, OrderService) {
        let chain = Arc::new(ChainClient::testnet());
        let provider = Arc::new(ProviderClient::simulated(Arc::clone(&chain)).expect("provider"));
        let service = OrderService::new(Arc::clone(&chain), Arc::clone(&provider));
        (chain, provider, service)
    }

    fn in_an_hour() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(60)
    }

    async fn register_free(chain: &ChainClient, datatoken: &Address) {
        chain
            .register_dispenser(datatoken, Amount::tokens(1.0))
            .await
            .expect("register dispenser");
    }

    #[tokio::test]
    async fn test_run_compute_job_on_free_assets() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let datasets = vec![
            AssetRef::new("did:kelp:data1", "svc-1", 0, addr()),
            AssetRef::new("did:kelp:data2", "svc-1", 0, addr()),
        ];
        let algorithm = AssetRef::new("did:kelp:algo", "svc-1", 0, addr());
        for asset in datasets.iter().chain(std::iter::once(&algorithm)) {
            register_free(&chain, &asset.datatoken).await;
        }

        let (job, handles) = service
            .run_compute_job(&datasets, &algorithm, "free-cpu", in_an_hour(), &payer)
            .await
            .expect("run compute job");

        assert_eq!(handles.dataset_tx_ids.len(), 2);
        assert_eq!(job.status, ComputeJobStatus::Started);
        assert_eq!(job.environment, "free-cpu");
        assert_eq!(job.consumer, *payer.address());
    }

    #[tokio::test]
    async fn test_algorithm_failure_costs_nothing() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let datasets = vec![
            AssetRef::new("did:kelp:data1", "svc-1", 0, addr()),
            AssetRef::new("did:kelp:data2", "svc-1", 0, addr()),
        ];
        for asset in &datasets {
            register_free(&chain, &asset.datatoken).await;
        }
        // The algorithm has no pricing mechanism at all.
        let algorithm = AssetRef::new("did:kelp:algo", "svc-1", 0, addr());

        let err = service
            .prepare_compute_job(&datasets, &algorithm, "free-cpu", in_an_hour(), &payer)
            .await
            .expect_err("algorithm has no pricing");

        let OrderError::PartialComputeJob { asset, acquired, source } = err else {
            unreachable!("expected partial compute job error, got {err}");
        };
        assert_eq!(asset, algorithm.to_string());
        assert!(acquired.is_empty());
        assert!(matches!(
            *source,
            OrderError::NoAcquisitionMechanism { .. }
        ));
        // Not a single transaction was spent on the datasets.
        assert_eq!(chain.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_dataset_failure_reports_acquired_orders() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let good = AssetRef::new("did:kelp:data1", "svc-1", 0, addr());
        let broken = AssetRef::new("did:kelp:data2", "svc-1", 0, addr());
        let algorithm = AssetRef::new("did:kelp:algo", "svc-1", 0, addr());
        register_free(&chain, &good.datatoken).await;
        register_free(&chain, &algorithm.datatoken).await;

        let err = service
            .prepare_compute_job(
                &[good, broken.clone()],
                &algorithm,
                "free-cpu",
                in_an_hour(),
                &payer,
            )
            .await
            .expect_err("second dataset has no pricing");

        let OrderError::PartialComputeJob { asset, acquired, .. } = err else {
            unreachable!("expected partial compute job error, got {err}");
        };
        assert_eq!(asset, broken.to_string());
        assert_eq!(acquired.len(), 2);
        assert!(acquired.algorithm_tx_id.is_some());
        assert_eq!(acquired.dataset_tx_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_short_initialization_is_rejected() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let datasets = vec![
            AssetRef::new("did:kelp:data1", "svc-1", 0, addr()),
            AssetRef::new("did:kelp:data2", "svc-1", 0, addr()),
        ];
        let algorithm = AssetRef::new("did:kelp:algo", "svc-1", 0, addr());
        for asset in datasets.iter().chain(std::iter::once(&algorithm)) {
            register_free(&chain, &asset.datatoken).await;
        }

        // One dataset result missing: the job must fail up front rather
        // than hand back handles with a dataset silently dropped.
        let init = ComputeInitializeResult {
            datasets: vec![kelp_provider::InitializeResult {
                valid_order: None,
                provider_fee: None,
            }],
            algorithm: kelp_provider::InitializeResult {
                valid_order: None,
                provider_fee: None,
            },
        };
        let result = service
            .acquire_job_assets(&datasets, &algorithm, &init, &payer)
            .await;
        assert!(matches!(result, Err(OrderError::Provider(_))));
        assert_eq!(chain.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_environment_fails_before_any_order() {
        let (chain, _, service) = service();
        let payer = Wallet::generate().expect("wallet");
        let datasets = [AssetRef::new("did:kelp:data1", "svc-1", 0, addr())];
        let algorithm = AssetRef::new("did:kelp:algo", "svc-1", 0, addr());

        let result = service
            .prepare_compute_job(&datasets, &algorithm, "no-such-env", in_an_hour(), &payer)
            .await;
        assert!(result.is_err());
        assert_eq!(chain.transaction_count().await, 0);
    }
}
