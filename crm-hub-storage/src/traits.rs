//! Storage traits defining the interface for persistence

use async_trait::async_trait;
use crm_hub_core::{Campaign, Customer, Order};
use uuid::Uuid;

use crate::StorageError;

/// Trait for customer storage operations
#[async_trait]
pub trait CustomerStorage: Send + Sync {
    /// Save a new customer; the email must not be taken
    async fn save(&self, customer: Customer) -> Result<Customer, StorageError>;

    /// Get a customer by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Customer>, StorageError>;

    /// Look up a customer by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StorageError>;

    /// List all customers in registration order
    async fn list(&self) -> Result<Vec<Customer>, StorageError>;

    /// Fold an order into its customer's stats and return the updated customer
    async fn apply_order(&self, order: &Order) -> Result<Customer, StorageError>;
}

/// Trait for order storage operations
#[async_trait]
pub trait OrderStorage: Send + Sync {
    /// Save a new order
    async fn save(&self, order: Order) -> Result<Order, StorageError>;

    /// A customer's orders, newest order date first
    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, StorageError>;
}

/// Trait for campaign storage operations
#[async_trait]
pub trait CampaignStorage: Send + Sync {
    /// Save a new campaign
    async fn save(&self, campaign: Campaign) -> Result<Campaign, StorageError>;

    /// Get a campaign by ID
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Campaign>, StorageError>;

    /// List all campaigns, newest first
    async fn list(&self) -> Result<Vec<Campaign>, StorageError>;

    /// Replace an existing campaign
    async fn update(&self, campaign: Campaign) -> Result<Campaign, StorageError>;
}
