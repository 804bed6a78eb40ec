use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use cosmwasm_std::Uint128;
use sha2::{Digest, Sha256};
use unite_types::{verify_secret, EscrowParams, EscrowSnapshot, EscrowState, Secret};

use crate::{AdapterError, ChainAdapter, TxResult};

#[derive(Debug, Clone)]
struct MockEscrow {
    params: EscrowParams,
    state: EscrowState,
    funded_amount: Uint128,
    created_at: u64,
}

/// In-process chain adapter for tests and local runs.
///
/// Escrows live in memory. Funding is either automatic on creation or driven
/// by the test through [`MockChainAdapter::fund`]. Failures can be scripted
/// per operation.
#[derive(Debug)]
pub struct MockChainAdapter {
    chain_id: String,
    auto_fund: bool,
    escrows: Mutex<HashMap<String, MockEscrow>>,
    create_failures: Mutex<VecDeque<AdapterError>>,
    withdraw_failures: Mutex<VecDeque<AdapterError>>,
    withdrawals: Mutex<Vec<(String, Secret)>>,
    cancellations: Mutex<Vec<String>>,
    clock: Mutex<Option<u64>>,
    create_calls: AtomicU32,
    tx_counter: AtomicU64,
}

impl MockChainAdapter {
    /// Adapter whose escrows are funded as soon as they are created
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            auto_fund: true,
            escrows: Mutex::new(HashMap::new()),
            create_failures: Mutex::new(VecDeque::new()),
            withdraw_failures: Mutex::new(VecDeque::new()),
            withdrawals: Mutex::new(Vec::new()),
            cancellations: Mutex::new(Vec::new()),
            clock: Mutex::new(None),
            create_calls: AtomicU32::new(0),
            tx_counter: AtomicU64::new(0),
        }
    }

    /// Escrows stay `Created` until [`fund`](Self::fund) is called
    pub fn manual_funding(mut self) -> Self {
        self.auto_fund = false;
        self
    }

    /// Pin the adapter's notion of chain time
    pub fn set_time(&self, now: u64) {
        *self.clock.lock().unwrap() = Some(now);
    }

    /// Fail the next `n` `create_escrow` calls with `error`
    pub fn fail_next_creates(&self, n: usize, error: AdapterError) {
        let mut failures = self.create_failures.lock().unwrap();
        for _ in 0..n {
            failures.push_back(error.clone());
        }
    }

    pub fn fail_next_withdraws(&self, n: usize, error: AdapterError) {
        let mut failures = self.withdraw_failures.lock().unwrap();
        for _ in 0..n {
            failures.push_back(error.clone());
        }
    }

    pub fn fund(&self, escrow_address: &str) -> Result<(), AdapterError> {
        let mut escrows = self.escrows.lock().unwrap();
        let escrow = escrows
            .get_mut(escrow_address)
            .ok_or_else(|| AdapterError::EscrowNotFound(escrow_address.to_string()))?;
        escrow.state = EscrowState::Funded;
        escrow.funded_amount = escrow.params.amount;
        Ok(())
    }

    /// Mark funded with less than the expected amount
    pub fn fund_partial(&self, escrow_address: &str, amount: Uint128) -> Result<(), AdapterError> {
        let mut escrows = self.escrows.lock().unwrap();
        let escrow = escrows
            .get_mut(escrow_address)
            .ok_or_else(|| AdapterError::EscrowNotFound(escrow_address.to_string()))?;
        escrow.state = EscrowState::Funded;
        escrow.funded_amount = amount;
        Ok(())
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn escrow_count(&self) -> usize {
        self.escrows.lock().unwrap().len()
    }

    /// Address of the escrow created for `order_id`, if any
    pub fn escrow_for_order(&self, order_id: &str) -> Option<String> {
        self.escrows
            .lock()
            .unwrap()
            .iter()
            .find(|(_, e)| e.params.order_id == order_id)
            .map(|(addr, _)| addr.clone())
    }

    pub fn escrow_params(&self, escrow_address: &str) -> Option<EscrowParams> {
        self.escrows
            .lock()
            .unwrap()
            .get(escrow_address)
            .map(|e| e.params.clone())
    }

    pub fn withdrawals(&self) -> Vec<(String, Secret)> {
        self.withdrawals.lock().unwrap().clone()
    }

    pub fn cancellations(&self) -> Vec<String> {
        self.cancellations.lock().unwrap().clone()
    }

    fn now(&self) -> u64 {
        self.clock
            .lock()
            .unwrap()
            .unwrap_or_else(|| chrono::Utc::now().timestamp() as u64)
    }

    fn next_tx(&self) -> TxResult {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        TxResult {
            chain_id: self.chain_id.clone(),
            tx_hash: format!("0x{:064x}", n + 1),
        }
    }

    fn escrow_address(&self, params: &EscrowParams, nonce: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.chain_id.as_bytes());
        hasher.update(params.order_id.as_bytes());
        hasher.update(params.role.as_str().as_bytes());
        hasher.update(nonce.to_le_bytes());
        let digest = hasher.finalize();
        format!("0x{}", hex::encode(&digest[..20]))
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    async fn create_escrow(&self, params: &EscrowParams) -> Result<String, AdapterError> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.create_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        if params.chain_id != self.chain_id {
            return Err(AdapterError::UnsupportedChain(params.chain_id.clone()));
        }

        let address = self.escrow_address(params, call);
        let (state, funded_amount) = if self.auto_fund {
            (EscrowState::Funded, params.amount)
        } else {
            (EscrowState::Created, Uint128::zero())
        };

        self.escrows.lock().unwrap().insert(
            address.clone(),
            MockEscrow {
                params: params.clone(),
                state,
                funded_amount,
                created_at: self.now(),
            },
        );

        Ok(address)
    }

    async fn get_escrow_state(&self, escrow_address: &str) -> Result<EscrowSnapshot, AdapterError> {
        self.escrows
            .lock()
            .unwrap()
            .get(escrow_address)
            .map(|e| EscrowSnapshot {
                state: e.state,
                funded_amount: e.funded_amount,
            })
            .ok_or_else(|| AdapterError::EscrowNotFound(escrow_address.to_string()))
    }

    async fn withdraw(
        &self,
        escrow_address: &str,
        secret: &Secret,
    ) -> Result<TxResult, AdapterError> {
        if let Some(err) = self.withdraw_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut escrows = self.escrows.lock().unwrap();
        let escrow = escrows
            .get_mut(escrow_address)
            .ok_or_else(|| AdapterError::EscrowNotFound(escrow_address.to_string()))?;

        match escrow.state {
            EscrowState::Withdrawn => {
                return Err(AdapterError::AlreadyWithdrawn(escrow_address.to_string()))
            }
            EscrowState::Cancelled => {
                return Err(AdapterError::AlreadyCancelled(escrow_address.to_string()))
            }
            EscrowState::Created => {
                return Err(AdapterError::InsufficientFunds(escrow_address.to_string()))
            }
            EscrowState::Funded => {}
        }

        if !verify_secret(secret, &escrow.params.secret_hash) {
            return Err(AdapterError::InvalidSecret(escrow_address.to_string()));
        }

        escrow.state = EscrowState::Withdrawn;
        drop(escrows);

        self.withdrawals
            .lock()
            .unwrap()
            .push((escrow_address.to_string(), secret.clone()));
        Ok(self.next_tx())
    }

    async fn cancel(&self, escrow_address: &str) -> Result<TxResult, AdapterError> {
        let now = self.now();
        let mut escrows = self.escrows.lock().unwrap();
        let escrow = escrows
            .get_mut(escrow_address)
            .ok_or_else(|| AdapterError::EscrowNotFound(escrow_address.to_string()))?;

        match escrow.state {
            EscrowState::Withdrawn => {
                return Err(AdapterError::AlreadyWithdrawn(escrow_address.to_string()))
            }
            EscrowState::Cancelled => {
                return Err(AdapterError::AlreadyCancelled(escrow_address.to_string()))
            }
            EscrowState::Created | EscrowState::Funded => {}
        }

        let available_at = escrow.params.timelocks.cancellation_starts_at(escrow.created_at);
        if now < available_at {
            return Err(AdapterError::TimelockNotElapsed {
                escrow: escrow_address.to_string(),
                available_at,
            });
        }

        escrow.state = EscrowState::Cancelled;
        drop(escrows);

        self.cancellations
            .lock()
            .unwrap()
            .push(escrow_address.to_string());
        Ok(self.next_tx())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unite_types::{EscrowRole, Timelocks};

    fn params(secret: &Secret) -> EscrowParams {
        EscrowParams {
            order_id: "order-1".to_string(),
            role: EscrowRole::Destination,
            chain_id: "aptos-testnet".to_string(),
            asset: "USDC".to_string(),
            amount: Uint128::new(1_000),
            secret_hash: secret.hash(),
            timelocks: Timelocks::new(10, 20, 30),
            maker: "maker".to_string(),
            resolver: "resolver".to_string(),
            safety_deposit: Uint128::new(50),
        }
    }

    #[tokio::test]
    async fn test_auto_funded_escrow_withdraws_with_secret() {
        let adapter = MockChainAdapter::new("aptos-testnet");
        let secret = Secret::generate();
        let addr = adapter.create_escrow(&params(&secret)).await.unwrap();

        let snapshot = adapter.get_escrow_state(&addr).await.unwrap();
        assert_eq!(snapshot.state, EscrowState::Funded);
        assert_eq!(snapshot.funded_amount, Uint128::new(1_000));

        assert_eq!(
            adapter.withdraw(&addr, &Secret::generate()).await,
            Err(AdapterError::InvalidSecret(addr.clone()))
        );
        adapter.withdraw(&addr, &secret).await.unwrap();
        assert_eq!(
            adapter.withdraw(&addr, &secret).await,
            Err(AdapterError::AlreadyWithdrawn(addr.clone()))
        );
        assert_eq!(adapter.withdrawals().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_funding() {
        let adapter = MockChainAdapter::new("aptos-testnet").manual_funding();
        let secret = Secret::generate();
        let addr = adapter.create_escrow(&params(&secret)).await.unwrap();

        assert_eq!(
            adapter.get_escrow_state(&addr).await.unwrap().state,
            EscrowState::Created
        );
        assert!(matches!(
            adapter.withdraw(&addr, &secret).await,
            Err(AdapterError::InsufficientFunds(_))
        ));

        adapter.fund(&addr).unwrap();
        assert_eq!(
            adapter.get_escrow_state(&addr).await.unwrap().state,
            EscrowState::Funded
        );
    }

    #[tokio::test]
    async fn test_scripted_create_failures() {
        let adapter = MockChainAdapter::new("aptos-testnet");
        adapter.fail_next_creates(2, AdapterError::NetworkError("rpc down".into()));
        let secret = Secret::generate();

        assert!(adapter.create_escrow(&params(&secret)).await.is_err());
        assert!(adapter.create_escrow(&params(&secret)).await.is_err());
        assert!(adapter.create_escrow(&params(&secret)).await.is_ok());
        assert_eq!(adapter.create_calls(), 3);
        assert_eq!(adapter.escrow_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_respects_timelock() {
        let adapter = MockChainAdapter::new("aptos-testnet");
        adapter.set_time(100);
        let secret = Secret::generate();
        let addr = adapter.create_escrow(&params(&secret)).await.unwrap();

        assert_eq!(
            adapter.cancel(&addr).await,
            Err(AdapterError::TimelockNotElapsed {
                escrow: addr.clone(),
                available_at: 120
            })
        );

        adapter.set_time(120);
        adapter.cancel(&addr).await.unwrap();
        assert_eq!(
            adapter.get_escrow_state(&addr).await.unwrap().state,
            EscrowState::Cancelled
        );
        assert!(matches!(
            adapter.withdraw(&addr, &secret).await,
            Err(AdapterError::AlreadyCancelled(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_chain_rejected() {
        let adapter = MockChainAdapter::new("sui-testnet");
        let secret = Secret::generate();
        assert!(matches!(
            adapter.create_escrow(&params(&secret)).await,
            Err(AdapterError::UnsupportedChain(_))
        ));
    }
}
