//! In-memory storage implementation for development and testing

use async_trait::async_trait;
use crm_hub_core::{Campaign, Customer, Order};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{CampaignStorage, CustomerStorage, OrderStorage, StorageError};

/// Rows keyed by id, plus insertion order for stable listing
struct Table<T> {
    rows: HashMap<Uuid, T>,
    order: Vec<Uuid>,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn insert(&mut self, id: Uuid, row: T) {
        if self.rows.insert(id, row).is_none() {
            self.order.push(id);
        }
    }

    fn in_order(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }
}

/// In-memory storage for development and testing
pub struct InMemoryStorage {
    customers: RwLock<Table<Customer>>,
    orders: RwLock<Vec<Order>>,
    campaigns: RwLock<Table<Campaign>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            customers: RwLock::new(Table::new()),
            orders: RwLock::new(Vec::new()),
            campaigns: RwLock::new(Table::new()),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerStorage for InMemoryStorage {
    async fn save(&self, customer: Customer) -> Result<Customer, StorageError> {
        let mut customers = self.customers.write();

        if customers.rows.values().any(|c| c.email == customer.email) {
            return Err(StorageError::AlreadyExists(format!(
                "Customer with email {} already exists",
                customer.email
            )));
        }

        customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Customer>, StorageError> {
        let customers = self.customers.read();
        Ok(customers.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StorageError> {
        let customers = self.customers.read();
        Ok(customers.rows.values().find(|c| c.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<Customer>, StorageError> {
        let customers = self.customers.read();
        Ok(customers.in_order().cloned().collect())
    }

    async fn apply_order(&self, order: &Order) -> Result<Customer, StorageError> {
        let mut customers = self.customers.write();
        let customer = customers.rows.get_mut(&order.customer_id).ok_or_else(|| {
            StorageError::NotFound(format!("Customer with id {} not found", order.customer_id))
        })?;
        customer.apply_order(order)?;
        Ok(customer.clone())
    }
}

#[async_trait]
impl OrderStorage for InMemoryStorage {
    async fn save(&self, order: Order) -> Result<Order, StorageError> {
        let mut orders = self.orders.write();
        orders.push(order.clone());
        Ok(order)
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, StorageError> {
        let orders = self.orders.read();
        // Reverse first so equal dates list the latest insert first
        let mut history: Vec<_> = orders
            .iter()
            .rev()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(history)
    }
}

#[async_trait]
impl CampaignStorage for InMemoryStorage {
    async fn save(&self, campaign: Campaign) -> Result<Campaign, StorageError> {
        let mut campaigns = self.campaigns.write();
        campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Campaign>, StorageError> {
        let campaigns = self.campaigns.read();
        Ok(campaigns.rows.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Campaign>, StorageError> {
        let campaigns = self.campaigns.read();
        Ok(campaigns.in_order().rev().cloned().collect())
    }

    async fn update(&self, campaign: Campaign) -> Result<Campaign, StorageError> {
        let mut campaigns = self.campaigns.write();
        if campaigns.rows.contains_key(&campaign.id) {
            campaigns.insert(campaign.id, campaign.clone());
            Ok(campaign)
        } else {
            Err(StorageError::NotFound(format!(
                "Campaign with id {} not found",
                campaign.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use crm_hub_core::{
        CampaignDraft, CampaignStatus, CoreError, CreateCustomerRequest, CreateOrderRequest,
        RuleSet,
    };
    use rust_decimal::Decimal;

    fn customer(email: &str) -> Customer {
        Customer::register(
            CreateCustomerRequest {
                name: "Test".to_string(),
                email: email.to_string(),
                ..Default::default()
            },
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
        .unwrap()
    }

    fn campaign(name: &str) -> Campaign {
        let rules = RuleSet::from_json(&serde_json::json!({ "visits": { "gt": 0 } })).unwrap();
        CampaignDraft::new(name, rules).unwrap().submit(0)
    }

    #[tokio::test]
    async fn test_save_and_get_customer() {
        let storage = InMemoryStorage::new();
        let saved = CustomerStorage::save(&storage, customer("a@example.com")).await.unwrap();

        let retrieved = CustomerStorage::get_by_id(&storage, saved.id).await.unwrap().unwrap();
        assert_eq!(retrieved.email, "a@example.com");

        let by_email = storage.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, saved.id);
        assert!(storage.find_by_email("b@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let storage = InMemoryStorage::new();
        CustomerStorage::save(&storage, customer("a@example.com")).await.unwrap();

        let err = CustomerStorage::save(&storage, customer("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert_eq!(CustomerStorage::list(&storage).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_customers_listed_in_registration_order() {
        let storage = InMemoryStorage::new();
        for email in ["c@example.com", "a@example.com", "b@example.com"] {
            CustomerStorage::save(&storage, customer(email)).await.unwrap();
        }

        let emails: Vec<_> = CustomerStorage::list(&storage)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.email)
            .collect();
        assert_eq!(emails, vec!["c@example.com", "a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn test_apply_order_mutates_customer() {
        let storage = InMemoryStorage::new();
        let mut c = customer("a@example.com");
        c.total_spend = Decimal::from(200);
        c.visits = 2;
        let saved = CustomerStorage::save(&storage, c).await.unwrap();

        let order = Order::place(
            &CreateOrderRequest {
                customer: saved.id,
                amount: Decimal::from(100),
                order_date: None,
            },
            Utc::now(),
        )
        .unwrap();
        let updated = storage.apply_order(&order).await.unwrap();
        assert_eq!(updated.total_spend, Decimal::from(300));
        assert_eq!(updated.visits, 3);

        let reread = CustomerStorage::get_by_id(&storage, saved.id).await.unwrap().unwrap();
        assert_eq!(reread, updated);

        let mut orphan = order.clone();
        orphan.customer_id = Uuid::new_v4();
        assert!(matches!(storage.apply_order(&orphan).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_order_overflow_keeps_stored_customer() {
        let storage = InMemoryStorage::new();
        let mut c = customer("a@example.com");
        c.total_spend = Decimal::MAX;
        let saved = CustomerStorage::save(&storage, c).await.unwrap();

        let order = Order::place(
            &CreateOrderRequest {
                customer: saved.id,
                amount: Decimal::ONE,
                order_date: None,
            },
            Utc::now(),
        )
        .unwrap();
        let err = storage.apply_order(&order).await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected(CoreError::Overflow(_))), "{}", err);

        let reread = CustomerStorage::get_by_id(&storage, saved.id).await.unwrap().unwrap();
        assert_eq!(reread, saved);
    }

    #[tokio::test]
    async fn test_order_history_newest_first() {
        let storage = InMemoryStorage::new();
        let owner = customer("a@example.com");
        let other = customer("b@example.com");
        let now = Utc::now();

        for (who, days_ago) in [(&owner, 3), (&other, 1), (&owner, 0), (&owner, 7)] {
            let order = Order::place(
                &CreateOrderRequest {
                    customer: who.id,
                    amount: Decimal::from(10),
                    order_date: Some(now - Duration::days(days_ago)),
                },
                now,
            )
            .unwrap();
            OrderStorage::save(&storage, order).await.unwrap();
        }

        let history = storage.list_by_customer(owner.id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].order_date >= w[1].order_date));
        assert!(storage.list_by_customer(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_campaigns_newest_first_and_update() {
        let storage = InMemoryStorage::new();
        let first = CampaignStorage::save(&storage, campaign("first")).await.unwrap();
        CampaignStorage::save(&storage, campaign("second")).await.unwrap();
        // Same name is a distinct record
        CampaignStorage::save(&storage, campaign("second")).await.unwrap();

        let names: Vec<_> = CampaignStorage::list(&storage)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["second", "second", "first"]);

        let mut done = first.clone();
        done.transition(CampaignStatus::Completed).unwrap();
        CampaignStorage::update(&storage, done).await.unwrap();

        let reloaded = CampaignStorage::get_by_id(&storage, first.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, CampaignStatus::Completed);
        assert_eq!(CampaignStorage::list(&storage).await.unwrap().len(), 3);
    }
}
