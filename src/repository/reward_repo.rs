//! Reward Ledger
//!
//! Points balance, lifetime earnings, per-item credit counts and the
//! catalog of rewards points can be spent on. Stored as one document.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::db::SharedConnection;
use super::kv::KvStore;
use super::traits::RewardLedger;
use crate::domain::{DomainError, DomainResult};

const REWARDS_KEY: &str = "rewards.v1";

/// Something points can be spent on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardProduct {
    pub id: String,
    pub title: String,
    pub cost: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub balance: i64,
    pub total_earned: i64,
    /// Credits received per item id
    #[serde(default)]
    pub credits: BTreeMap<String, u32>,
    #[serde(default)]
    pub rewards: Vec<RewardProduct>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            balance: 0,
            total_earned: 0,
            credits: BTreeMap::new(),
            rewards: vec![
                RewardProduct {
                    id: "reward-episode".to_string(),
                    title: "Watch one episode of a series".to_string(),
                    cost: 30,
                },
                RewardProduct {
                    id: "reward-game".to_string(),
                    title: "30 minutes of gaming".to_string(),
                    cost: 50,
                },
            ],
        }
    }
}

pub struct KvRewardLedger {
    kv: KvStore,
}

impl KvRewardLedger {
    pub fn new(conn: SharedConnection) -> Self {
        Self { kv: KvStore::new(conn) }
    }

    pub async fn state(&self) -> DomainResult<LedgerState> {
        Ok(self.kv.get(REWARDS_KEY).await?.unwrap_or_default())
    }

    pub async fn total_earned(&self) -> DomainResult<i64> {
        Ok(self.state().await?.total_earned)
    }

    /// How many times an item has been credited
    pub async fn credits_for(&self, item_id: &str) -> DomainResult<u32> {
        Ok(self.state().await?.credits.get(item_id).copied().unwrap_or(0))
    }

    pub async fn rewards(&self) -> DomainResult<Vec<RewardProduct>> {
        Ok(self.state().await?.rewards)
    }

    /// Add a reward at the top of the catalog; cost is clamped to >= 0
    pub async fn add_reward(&self, title: &str, cost: i64) -> DomainResult<RewardProduct> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::InvalidInput("reward title is empty".to_string()));
        }
        let product = RewardProduct {
            id: format!("reward-{}", Uuid::new_v4().simple()),
            title: title.to_string(),
            cost: cost.max(0),
        };
        let created = product.clone();
        self.kv
            .update(REWARDS_KEY, move |state: &mut LedgerState| {
                state.rewards.insert(0, product);
                Ok(())
            })
            .await?;
        Ok(created)
    }

    pub async fn remove_reward(&self, id: &str) -> DomainResult<()> {
        self.kv
            .update(REWARDS_KEY, |state: &mut LedgerState| {
                state.rewards.retain(|r| r.id != id);
                Ok(())
            })
            .await
    }

    /// Spend points on a reward; returns the remaining balance
    pub async fn redeem(&self, id: &str) -> DomainResult<i64> {
        self.kv
            .update(REWARDS_KEY, |state: &mut LedgerState| {
                let cost = state
                    .rewards
                    .iter()
                    .find(|r| r.id == id)
                    .map(|r| r.cost)
                    .ok_or_else(|| DomainError::NotFound(format!("Reward {} not found", id)))?;
                if state.balance < cost {
                    return Err(DomainError::InsufficientPoints {
                        balance: state.balance,
                        cost,
                    });
                }
                state.balance -= cost;
                Ok(state.balance)
            })
            .await
    }
}

#[async_trait]
impl RewardLedger for KvRewardLedger {
    /// Non-positive amounts are ignored; a credit that would overflow the
    /// totals is rejected and leaves the ledger untouched
    async fn credit(&self, item_id: &str, amount: i64) -> DomainResult<()> {
        if amount <= 0 {
            return Ok(());
        }
        self.kv
            .update(REWARDS_KEY, |state: &mut LedgerState| {
                let overflow = || DomainError::InvalidInput(format!("crediting {} would overflow the ledger", amount));
                let balance = state.balance.checked_add(amount).ok_or_else(overflow)?;
                let total_earned = state.total_earned.checked_add(amount).ok_or_else(overflow)?;
                state.balance = balance;
                state.total_earned = total_earned;
                let count = state.credits.entry(item_id.to_string()).or_insert(0);
                *count = count.saturating_add(1);
                Ok(())
            })
            .await?;
        log::info!("credited {} points for {}", amount, item_id);
        Ok(())
    }

    async fn balance(&self) -> DomainResult<i64> {
        Ok(self.state().await?.balance)
    }
}
