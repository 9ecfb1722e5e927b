//! Provider service client.
//!
//! The Provider gates delivery of asset data and compute jobs: per asset it
//! reports an existing valid order (if any) and the fee that must accompany
//! the next order. Currently uses a simulated backend that derives
//! `valid_order` from chain order records and signs fees with a provider
//! wallet.

use crate::asset::AssetRef;
use crate::environment::ComputeEnvironment;
use crate::error::{ProviderError, Result};
use crate::init::{ComputeInitializeResult, InitializeResult};
use chrono::{DateTime, Utc};
use kelp_chain::{Address, Amount, ChainClient, FeeSignature, ProviderFee, TransactionId, Wallet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Fee charged by the Provider for each request against an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Token the fee is denominated in.
    pub token: Address,
    /// Fee amount per request.
    pub amount: Amount,
}

/// Status of a compute job on the Provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeJobStatus {
    /// Job accepted and started.
    Started,
    /// Job finished.
    Finished,
}

/// A compute job accepted by the Provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeJob {
    /// Job id assigned by the Provider.
    pub job_id: String,
    /// Environment the job runs in.
    pub environment: String,
    /// Consumer the job belongs to.
    pub consumer: Address,
    /// Current status.
    pub status: ComputeJobStatus,
    /// Acceptance timestamp.
    pub created_at: DateTime<Utc>,
}

/// Request to start a compute job from acquired order transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeJobRequest {
    /// Target environment id.
    pub environment_id: String,
    /// Consumer address.
    pub consumer: Address,
    /// Order transactions for the datasets, in job order.
    pub dataset_tx_ids: Vec<TransactionId>,
    /// Order transaction for the algorithm.
    pub algorithm_tx_id: TransactionId,
}

/// Simulated Provider state.
#[derive(Debug)]
struct ProviderState {
    fee_policies: HashMap<String, FeePolicy>,
    environments: Vec<ComputeEnvironment>,
    jobs: HashMap<String, ComputeJob>,
}

/// Provider service client.
///
/// Exposes the initialize and compute endpoints the order engine consumes.
pub struct ProviderClient {
    chain: Arc<ChainClient>,
    signer: Wallet,
    state: Arc<Mutex<ProviderState>>,
}

impl ProviderClient {
    /// Create a simulated Provider over the given chain.
    ///
    /// Starts with two environments: `free-cpu` (free, 3 jobs, 1 hour) and
    /// `paid-gpu` (paid, 10 jobs, 24 hours).
    ///
    /// # Errors
    ///
    /// Returns error if the provider wallet cannot be generated.
    pub fn simulated(chain: Arc<ChainClient>) -> Result<Self> {
        let signer = Wallet::generate().map_err(ProviderError::Chain)?;
        Ok(Self {
            chain,
            signer,
            state: Arc::new(Mutex::new(ProviderState {
                fee_policies: HashMap::new(),
                environments: vec![
                    ComputeEnvironment::free("free-cpu", 3, 3600),
                    ComputeEnvironment::paid("paid-gpu", 10, 86400),
                ],
                jobs: HashMap::new(),
            })),
        })
    }

    /// Address collecting provider fees.
    #[must_use]
    pub fn provider_address(&self) -> &Address {
        self.signer.address()
    }

    /// Set the per-request fee charged for an asset.
    pub async fn set_fee_policy(&self, document_id: impl Into<String>, token: Address, amount: Amount) {
        let mut state = self.state.lock().await;
        state
            .fee_policies
            .insert(document_id.into(), FeePolicy { token, amount });
    }

    /// Register an additional compute environment.
    pub async fn register_environment(&self, environment: ComputeEnvironment) {
        let mut state = self.state.lock().await;
        state.environments.push(environment);
    }

    /// List the compute environments this Provider offers.
    pub async fn environments(&self) -> Vec<ComputeEnvironment> {
        let state = self.state.lock().await;
        state.environments.clone()
    }

    /// Look up a compute environment by id.
    ///
    /// # Errors
    ///
    /// Returns error if the environment does not exist.
    pub async fn environment(&self, id: &str) -> Result<ComputeEnvironment> {
        let state = self.state.lock().await;
        state
            .environments
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| ProviderError::EnvironmentNotFound { id: id.to_string() })
    }

    /// Initialize a single asset for download.
    ///
    /// Reports an existing valid order for `(asset, consumer)` and, if the
    /// asset carries a fee policy whose last-paid window has lapsed, a
    /// freshly signed provider fee valid until `valid_until`.
    ///
    /// # Errors
    ///
    /// Returns error if the chain lookup fails.
    pub async fn initialize(
        &self,
        asset: &AssetRef,
        consumer: &Address,
        valid_until: DateTime<Utc>,
    ) -> Result<InitializeResult> {
        let policy = {
            let state = self.state.lock().await;
            state.fee_policies.get(&asset.document_id).cloned()
        };
        self.initialize_with_policy(asset, consumer, valid_until, policy.as_ref())
            .await
    }

    async fn initialize_with_policy(
        &self,
        asset: &AssetRef,
        consumer: &Address,
        valid_until: DateTime<Utc>,
        policy: Option<&FeePolicy>,
    ) -> Result<InitializeResult> {
        let order = self
            .chain
            .find_order(&asset.datatoken, consumer, asset.service_index)
            .await;

        let policy = policy.filter(|p| !p.amount.is_zero());
        let result = match (order, policy) {
            (Some(order), None) => InitializeResult {
                valid_order: Some(order.tx_id),
                provider_fee: None,
            },
            (Some(order), Some(policy)) => {
                // The fee paid with the order covers requests until its
                // window lapses; only then must it be re-paid.
                let covered = order
                    .fee_valid_until
                    .is_some_and(|until| until > Utc::now());
                InitializeResult {
                    valid_order: Some(order.tx_id),
                    provider_fee: if covered {
                        None
                    } else {
                        Some(self.sign_fee(asset, policy, valid_until))
                    },
                }
            }
            (None, policy) => InitializeResult {
                valid_order: None,
                provider_fee: policy.map(|p| self.sign_fee(asset, p, valid_until)),
            },
        };

        debug!(
            asset = %asset,
            consumer = %consumer,
            valid_order = result.valid_order.is_some(),
            provider_fee = result.effective_fee().is_some(),
            "initialized"
        );
        Ok(result)
    }

    /// Initialize all assets of a compute job in one request.
    ///
    /// Free environments return no fees for any asset; paid environments
    /// fall back to the per-asset fee policies.
    ///
    /// # Errors
    ///
    /// Returns error if the environment is unknown or the requested
    /// validity exceeds the environment's duration ceiling.
    pub async fn initialize_compute(
        &self,
        datasets: &[AssetRef],
        algorithm: &AssetRef,
        environment_id: &str,
        valid_until: DateTime<Utc>,
        consumer: &Address,
    ) -> Result<ComputeInitializeResult> {
        let environment = self.environment(environment_id).await?;

        let requested_secs = (valid_until - Utc::now()).num_seconds().max(0) as u64;
        if requested_secs > environment.max_duration_secs {
            return Err(ProviderError::DurationExceeded {
                requested_secs,
                max_secs: environment.max_duration_secs,
            });
        }

        let policies: HashMap<String, FeePolicy> = if environment.free {
            HashMap::new()
        } else {
            let state = self.state.lock().await;
            state.fee_policies.clone()
        };

        let mut dataset_results = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            let result = self
                .initialize_with_policy(
                    dataset,
                    consumer,
                    valid_until,
                    policies.get(&dataset.document_id),
                )
                .await?;
            dataset_results.push(result);
        }
        let algorithm_result = self
            .initialize_with_policy(
                algorithm,
                consumer,
                valid_until,
                policies.get(&algorithm.document_id),
            )
            .await?;

        info!(
            environment = environment_id,
            datasets = datasets.len(),
            consumer = %consumer,
            "compute job initialized"
        );
        Ok(ComputeInitializeResult {
            datasets: dataset_results,
            algorithm: algorithm_result,
        })
    }

    /// Start a compute job from acquired order transactions.
    ///
    /// # Errors
    ///
    /// Returns error if the environment is unknown, any transaction has no
    /// matching order, or the consumer's job ceiling is reached.
    pub async fn start_compute(&self, request: &ComputeJobRequest) -> Result<ComputeJob> {
        let environment = self.environment(&request.environment_id).await?;

        for tx_id in request
            .dataset_tx_ids
            .iter()
            .chain(std::iter::once(&request.algorithm_tx_id))
        {
            self.chain
                .get_order(tx_id)
                .await
                .map_err(|_| ProviderError::OrderNotFound {
                    tx_id: tx_id.to_string(),
                })?;
        }

        let mut state = self.state.lock().await;
        let running = state
            .jobs
            .values()
            .filter(|j| {
                j.environment == environment.id
                    && j.consumer == request.consumer
                    && j.status == ComputeJobStatus::Started
            })
            .count();
        if running >= environment.max_jobs as usize {
            return Err(ProviderError::JobLimitReached {
                environment: environment.id,
                max_jobs: environment.max_jobs,
            });
        }

        let job = ComputeJob {
            job_id: Uuid::new_v4().to_string(),
            environment: environment.id,
            consumer: request.consumer.clone(),
            status: ComputeJobStatus::Started,
            created_at: Utc::now(),
        };
        state.jobs.insert(job.job_id.clone(), job.clone());

        info!(job_id = %job.job_id, environment = %job.environment, "compute job started");
        Ok(job)
    }

    /// Get a compute job by id.
    ///
    /// # Errors
    ///
    /// Returns error if the job is unknown.
    pub async fn job(&self, job_id: &str) -> Result<ComputeJob> {
        let state = self.state.lock().await;
        state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| ProviderError::request_failed(format!("unknown job: {job_id}")))
    }

    fn sign_fee(&self, asset: &AssetRef, policy: &FeePolicy, valid_until: DateTime<Utc>) -> ProviderFee {
        let message = format!(
            "{}{}{}{}",
            asset.document_id,
            policy.token,
            policy.amount,
            valid_until.timestamp()
        );
        let signature = self.signer.sign_bytes(message.as_bytes());
        ProviderFee {
            address: self.signer.address().clone(),
            token: policy.token.clone(),
            amount: policy.amount,
            signature: FeeSignature {
                v: 27,
                r: format!("0x{}", hex::encode(&signature[..32])),
                s: format!("0x{}", hex::encode(&signature[32..])),
            },
            valid_until,
            provider_data: format!("0x{}", hex::encode(asset.document_id.as_bytes())),
        }
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("provider_address", self.signer.address())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn datatoken() -> Address {
        Wallet::generate().expect("wallet").address().clone()
    }

    fn setup() -> (Arc<ChainClient>, ProviderClient, Wallet, AssetRef) {
        let chain = Arc::new(ChainClient::testnet());
        let provider = ProviderClient::simulated(Arc::clone(&chain)).expect("provider");
        let consumer = Wallet::generate().expect("wallet");
        let asset = AssetRef::new("did:kelp:data1", "svc-1", 0, datatoken());
        (chain, provider, consumer, asset)
    }

    #[tokio::test]
    async fn test_initialize_no_order_no_fee() {
        let (_, provider, consumer, asset) = setup();
        let init = provider
            .initialize(&asset, consumer.address(), Utc::now() + Duration::minutes(30))
            .await
            .expect("initialize");
        assert!(init.valid_order.is_none());
        assert!(init.provider_fee.is_none());
    }

    #[tokio::test]
    async fn test_initialize_no_order_with_fee_policy() {
        let (_, provider, consumer, asset) = setup();
        let fee_token = datatoken();
        provider
            .set_fee_policy(&asset.document_id, fee_token.clone(), Amount::tokens(2.0))
            .await;

        let init = provider
            .initialize(&asset, consumer.address(), Utc::now() + Duration::minutes(30))
            .await
            .expect("initialize");
        assert!(init.valid_order.is_none());
        let fee = init.effective_fee().expect("fee");
        assert_eq!(fee.token, fee_token);
        assert_eq!(fee.amount, Amount::tokens(2.0));
        assert_eq!(fee.address, *provider.provider_address());
    }

    #[tokio::test]
    async fn test_initialize_existing_order_fee_covered() {
        let (chain, provider, consumer, asset) = setup();
        let fee_token = datatoken();
        provider
            .set_fee_policy(&asset.document_id, fee_token.clone(), Amount::tokens(2.0))
            .await;

        // Place an order whose fee window is still open.
        chain
            .mint(&asset.datatoken, consumer.address(), Amount::tokens(1.0))
            .await
            .expect("mint");
        chain
            .mint(&fee_token, consumer.address(), Amount::tokens(5.0))
            .await
            .expect("mint");
        chain
            .approve(&consumer, &fee_token, &asset.datatoken, Amount::tokens(2.0))
            .await
            .expect("approve");
        let init = provider
            .initialize(&asset, consumer.address(), Utc::now() + Duration::minutes(30))
            .await
            .expect("initialize");
        let fee = init.provider_fee.expect("fee");
        let order_tx = chain
            .start_order(&consumer, &asset.datatoken, consumer.address(), 0, Some(&fee), None)
            .await
            .expect("order");

        let init = provider
            .initialize(&asset, consumer.address(), Utc::now() + Duration::minutes(30))
            .await
            .expect("initialize again");
        assert_eq!(init.valid_order, Some(order_tx.id));
        assert!(init.provider_fee.is_none());
    }

    #[tokio::test]
    async fn test_initialize_existing_order_fee_lapsed() {
        let (chain, provider, consumer, asset) = setup();
        let fee_token = datatoken();
        provider
            .set_fee_policy(&asset.document_id, fee_token, Amount::tokens(2.0))
            .await;

        // Order placed without a fee window (e.g. bought before the policy
        // was in force): a fresh fee is required on the next request.
        chain
            .mint(&asset.datatoken, consumer.address(), Amount::tokens(1.0))
            .await
            .expect("mint");
        let order_tx = chain
            .start_order(&consumer, &asset.datatoken, consumer.address(), 0, None, None)
            .await
            .expect("order");

        let init = provider
            .initialize(&asset, consumer.address(), Utc::now() + Duration::minutes(30))
            .await
            .expect("initialize");
        assert_eq!(init.valid_order, Some(order_tx.id));
        assert!(init.effective_fee().is_some());
    }

    #[tokio::test]
    async fn test_free_environment_suppresses_fees() {
        let (_, provider, consumer, asset) = setup();
        provider
            .set_fee_policy(&asset.document_id, datatoken(), Amount::tokens(2.0))
            .await;
        let algorithm = AssetRef::new("did:kelp:algo", "svc-1", 0, datatoken());

        let init = provider
            .initialize_compute(
                std::slice::from_ref(&asset),
                &algorithm,
                "free-cpu",
                Utc::now() + Duration::minutes(30),
                consumer.address(),
            )
            .await
            .expect("initialize");
        assert!(init.datasets[0].provider_fee.is_none());
        assert!(init.algorithm.provider_fee.is_none());
    }

    #[tokio::test]
    async fn test_unknown_environment() {
        let (_, provider, consumer, asset) = setup();
        let algorithm = AssetRef::new("did:kelp:algo", "svc-1", 0, datatoken());
        let result = provider
            .initialize_compute(
                std::slice::from_ref(&asset),
                &algorithm,
                "nope",
                Utc::now() + Duration::minutes(30),
                consumer.address(),
            )
            .await;
        assert!(matches!(
            result,
            Err(ProviderError::EnvironmentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duration_ceiling() {
        let (_, provider, consumer, asset) = setup();
        let algorithm = AssetRef::new("did:kelp:algo", "svc-1", 0, datatoken());
        let result = provider
            .initialize_compute(
                std::slice::from_ref(&asset),
                &algorithm,
                "free-cpu",
                Utc::now() + Duration::days(7),
                consumer.address(),
            )
            .await;
        assert!(matches!(result, Err(ProviderError::DurationExceeded { .. })));
    }

    #[tokio::test]
    async fn test_start_compute_requires_orders() {
        let (_, provider, consumer, _) = setup();
        let request = ComputeJobRequest {
            environment_id: "free-cpu".to_string(),
            consumer: consumer.address().clone(),
            dataset_tx_ids: vec![],
            algorithm_tx_id: TransactionId::new(),
        };
        let result = provider.start_compute(&request).await;
        assert!(matches!(result, Err(ProviderError::OrderNotFound { .. })));
    }

    #[tokio::test]
    async fn test_start_compute_and_job_limit() {
        let (chain, provider, consumer, asset) = setup();
        provider
            .register_environment(ComputeEnvironment::free("tiny", 1, 3600))
            .await;

        chain
            .mint(&asset.datatoken, consumer.address(), Amount::tokens(2.0))
            .await
            .expect("mint");
        let order = chain
            .start_order(&consumer, &asset.datatoken, consumer.address(), 0, None, None)
            .await
            .expect("order");

        let request = ComputeJobRequest {
            environment_id: "tiny".to_string(),
            consumer: consumer.address().clone(),
            dataset_tx_ids: vec![],
            algorithm_tx_id: order.id,
        };
        let job = provider.start_compute(&request).await.expect("start");
        assert_eq!(job.status, ComputeJobStatus::Started);
        assert_eq!(provider.job(&job.job_id).await.expect("job").job_id, job.job_id);

        let result = provider.start_compute(&request).await;
        assert!(matches!(result, Err(ProviderError::JobLimitReached { .. })));
    }
}
