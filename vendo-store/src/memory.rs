use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;
use vendo_core::wallet::{WalletEntryKind, WalletError, WalletLedger, WalletTransaction};
use vendo_core::BoxError;
use vendo_order::models::Order;
use vendo_order::repository::{CartStore, CouponStore, OrderRepoError, OrderRepository};

/// In-memory order store used by tests and development wiring. Enforces the
/// same compare-and-swap discipline as the Postgres repository.
#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), OrderRepoError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(OrderRepoError::Storage(format!(
                "order {} already exists",
                order.id
            )));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderRepoError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Order>, OrderRepoError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn find_by_tracking(&self, key: &str) -> Result<Option<Order>, OrderRepoError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.matches_tracking(key))
            .cloned())
    }

    async fn save(&self, order: &Order) -> Result<u64, OrderRepoError> {
        let mut orders = self.orders.write().await;
        let stored = orders
            .get_mut(&order.id)
            .ok_or_else(|| OrderRepoError::NotFound(order.id.to_string()))?;
        if stored.version != order.version {
            return Err(OrderRepoError::VersionConflict {
                order_id: order.id,
                expected: order.version,
            });
        }
        let mut updated = order.clone();
        updated.version += 1;
        let version = updated.version;
        *stored = updated;
        Ok(version)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Order>, OrderRepoError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[derive(Default)]
struct WalletState {
    balances: HashMap<String, i64>,
    references: HashSet<String>,
    transactions: Vec<WalletTransaction>,
}

/// In-memory wallet ledger. The single mutex makes every balance mutation a
/// serialized check-then-apply, and the reference set enforces the
/// uniqueness constraint that backstops financial idempotency.
#[derive(Default)]
pub struct MemoryWalletLedger {
    state: Mutex<WalletState>,
}

impl MemoryWalletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_balance(&self, user_id: &str, amount: i64) {
        self.state
            .lock()
            .await
            .balances
            .insert(user_id.to_string(), amount);
    }

    pub async fn transactions_for(&self, user_id: &str) -> Vec<WalletTransaction> {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

fn transaction(
    user_id: &str,
    kind: WalletEntryKind,
    amount: i64,
    purpose: &str,
    reference: &str,
    related_order: Option<&str>,
) -> WalletTransaction {
    WalletTransaction {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        kind,
        amount,
        purpose: purpose.to_string(),
        reference: reference.to_string(),
        related_order: related_order.map(|s| s.to_string()),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl WalletLedger for MemoryWalletLedger {
    async fn debit(
        &self,
        user_id: &str,
        amount: i64,
        purpose: &str,
        reference: &str,
        related_order: Option<&str>,
    ) -> Result<WalletTransaction, WalletError> {
        let mut state = self.state.lock().await;
        if state.references.contains(reference) {
            return Err(WalletError::DuplicateReference(reference.to_string()));
        }
        let balance = state.balances.get(user_id).copied().unwrap_or(0);
        if balance < amount {
            return Err(WalletError::InsufficientBalance {
                requested: amount,
                available: balance,
            });
        }
        state.balances.insert(user_id.to_string(), balance - amount);
        state.references.insert(reference.to_string());
        let tx = transaction(
            user_id,
            WalletEntryKind::Debit,
            amount,
            purpose,
            reference,
            related_order,
        );
        state.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn credit(
        &self,
        user_id: &str,
        amount: i64,
        purpose: &str,
        reference: &str,
        related_order: Option<&str>,
    ) -> Result<WalletTransaction, WalletError> {
        let mut state = self.state.lock().await;
        if state.references.contains(reference) {
            return Err(WalletError::DuplicateReference(reference.to_string()));
        }
        let balance = state.balances.get(user_id).copied().unwrap_or(0);
        state.balances.insert(user_id.to_string(), balance + amount);
        state.references.insert(reference.to_string());
        let tx = transaction(
            user_id,
            WalletEntryKind::Credit,
            amount,
            purpose,
            reference,
            related_order,
        );
        state.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn balance(&self, user_id: &str) -> Result<i64, WalletError> {
        Ok(self
            .state
            .lock()
            .await
            .balances
            .get(user_id)
            .copied()
            .unwrap_or(0))
    }
}

/// Coupon usage counters; incremented at durable order creation.
#[derive(Default)]
pub struct MemoryCouponStore {
    usages: Mutex<HashMap<String, u32>>,
}

impl MemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn usage_count(&self, code: &str) -> u32 {
        self.usages.lock().await.get(code).copied().unwrap_or(0)
    }
}

#[async_trait]
impl CouponStore for MemoryCouponStore {
    async fn record_usage(&self, code: &str) -> Result<(), BoxError> {
        *self.usages.lock().await.entry(code.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCartStore {
    cleared: Mutex<Vec<String>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn was_cleared(&self, user_id: &str) -> bool {
        self.cleared.lock().await.iter().any(|u| u == user_id)
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn clear(&self, user_id: &str) -> Result<(), BoxError> {
        self.cleared.lock().await.push(user_id.to_string());
        Ok(())
    }
}
