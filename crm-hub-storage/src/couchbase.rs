//! Couchbase storage implementation
//!
//! Provides persistent storage for customers, orders and campaigns using Couchbase.

use async_trait::async_trait;
use couchbase::{
    cluster::Cluster,
    collection::Collection,
    options::{
        cluster_options::ClusterOptions,
        diagnostic_options::WaitUntilReadyOptions,
        kv_options::{GetOptions, UpsertOptions},
        query_options::QueryOptions,
    },
};
use tokio_stream::StreamExt;

use couchbase::authenticator::{Authenticator, PasswordAuthenticator};

use crm_hub_core::{Campaign, Customer, Order};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{CampaignStorage, CustomerStorage, OrderStorage, StorageError};

/// Document type markers for N1QL queries
const DOC_TYPE_CUSTOMER: &str = "customer";
const DOC_TYPE_ORDER: &str = "order";
const DOC_TYPE_CAMPAIGN: &str = "campaign";

/// Couchbase storage configuration
#[derive(Debug, Clone)]
pub struct CouchbaseConfig {
    pub connection_string: String,
    pub username: String,
    pub password: String,
    pub bucket_name: String,
}

impl Default for CouchbaseConfig {
    fn default() -> Self {
        Self {
            connection_string: "couchbase://localhost".to_string(),
            username: "admin".to_string(),
            password: "password123".to_string(),
            bucket_name: "crm-hub".to_string(),
        }
    }
}

impl CouchbaseConfig {
    /// Defaults overridden by `COUCHBASE_CONNECTION_STRING`, `COUCHBASE_USERNAME`,
    /// `COUCHBASE_PASSWORD` and `COUCHBASE_BUCKET`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str, fallback: String| std::env::var(key).unwrap_or(fallback);
        Self {
            connection_string: var("COUCHBASE_CONNECTION_STRING", defaults.connection_string),
            username: var("COUCHBASE_USERNAME", defaults.username),
            password: var("COUCHBASE_PASSWORD", defaults.password),
            bucket_name: var("COUCHBASE_BUCKET", defaults.bucket_name),
        }
    }
}

/// Couchbase storage for customers, orders and campaigns
pub struct CouchbaseStorage {
    cluster: Arc<Cluster>,
    collection: Collection,
    bucket_name: String,
}

impl CouchbaseStorage {
    /// Create a new Couchbase storage instance
    pub async fn new(config: CouchbaseConfig) -> Result<Self, StorageError> {
        let authenticator = PasswordAuthenticator::new(&config.username, &config.password);
        let options = ClusterOptions::new(Authenticator::PasswordAuthenticator(authenticator));
        let cluster = Cluster::connect(&config.connection_string, options)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to connect to cluster: {}", e)))?;

        let bucket = cluster.bucket(&config.bucket_name);
        let _: () = bucket
            .wait_until_ready(WaitUntilReadyOptions::default())
            .await
            .map_err(|e: couchbase::error::Error| {
                StorageError::Connection(format!("Failed to connect to bucket: {}", e))
            })?;

        let collection = bucket.default_collection();

        tracing::info!(
            "Connected to Couchbase cluster at {}, bucket: {}",
            config.connection_string,
            config.bucket_name
        );

        Ok(Self {
            cluster: Arc::new(cluster),
            collection,
            bucket_name: config.bucket_name,
        })
    }

    /// Create a new instance from `COUCHBASE_*` environment variables
    pub async fn from_env() -> Result<Self, StorageError> {
        Self::new(CouchbaseConfig::from_env()).await
    }

    /// Execute a N1QL query
    async fn query<T: DeserializeOwned>(&self, statement: &str) -> Result<Vec<T>, StorageError> {
        let mut result = self
            .cluster
            .query(statement, QueryOptions::default())
            .await
            .map_err(|e: couchbase::error::Error| {
                StorageError::Query(e.to_string())
            })?;

        let mut rows = Vec::new();
        let mut row_iter = result.rows::<T>();

        while let Some(row) = row_iter.next().await {
            match row {
                Ok(r) => rows.push(r),
                Err(e) => {
                    tracing::warn!("Failed to deserialize row: {}", e);
                }
            }
        }

        Ok(rows)
    }

    async fn upsert<T: Serialize + Clone>(
        &self,
        doc_type: &str,
        id: Uuid,
        data: &T,
    ) -> Result<(), StorageError> {
        let doc = TypedDocument {
            doc_type: doc_type.to_string(),
            data: data.clone(),
        };
        self.collection
            .upsert(&doc_id(doc_type, id), &doc, UpsertOptions::default())
            .await
            .map_err(|e| StorageError::Internal(format!("Failed to save {}: {}", doc_type, e)))?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        doc_type: &str,
        id: Uuid,
    ) -> Result<Option<T>, StorageError> {
        match self
            .collection
            .get(&doc_id(doc_type, id), GetOptions::default())
            .await
        {
            Ok(result) => {
                let doc: TypedDocument<T> = result.content_as::<TypedDocument<T>>().map_err(|e| {
                    StorageError::Serialization(serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e.to_string(),
                    )))
                })?;
                Ok(Some(doc.data))
            }
            Err(e) => {
                if e.to_string().contains("DocumentNotFound") {
                    Ok(None)
                } else {
                    Err(StorageError::Internal(format!(
                        "Failed to get {}: {}",
                        doc_type, e
                    )))
                }
            }
        }
    }
}

fn doc_id(doc_type: &str, id: Uuid) -> String {
    format!("{}::{}", doc_type, id)
}

/// Quote a value for inline use in a N1QL string literal
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Wrapper for documents with type field
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TypedDocument<T> {
    #[serde(rename = "type")]
    doc_type: String,
    #[serde(flatten)]
    data: T,
}

#[async_trait]
impl CustomerStorage for CouchbaseStorage {
    async fn save(&self, customer: Customer) -> Result<Customer, StorageError> {
        // N1QL is eventually consistent, so this check narrows but does not close the race
        if self.find_by_email(&customer.email).await?.is_some() {
            return Err(StorageError::AlreadyExists(format!(
                "Customer with email {} already exists",
                customer.email
            )));
        }

        self.upsert(DOC_TYPE_CUSTOMER, customer.id, &customer).await?;
        tracing::debug!("Saved customer {}", customer.id);
        Ok(customer)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Customer>, StorageError> {
        self.get(DOC_TYPE_CUSTOMER, id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StorageError> {
        let query = format!(
            r#"
            SELECT c.*
            FROM `{}` c
            WHERE c.type = '{}' AND c.email = {}
            LIMIT 1
            "#,
            self.bucket_name,
            DOC_TYPE_CUSTOMER,
            quote(email)
        );

        let results: Vec<Customer> = self.query(&query).await?;
        Ok(results.into_iter().next())
    }

    async fn list(&self) -> Result<Vec<Customer>, StorageError> {
        let query = format!(
            r#"
            SELECT c.*
            FROM `{}` c
            WHERE c.type = '{}'
            ORDER BY c.createdAt ASC
            "#,
            self.bucket_name, DOC_TYPE_CUSTOMER
        );

        self.query(&query).await
    }

    async fn apply_order(&self, order: &Order) -> Result<Customer, StorageError> {
        // Read-modify-write without CAS; concurrent orders for one customer can race
        let mut customer: Customer = self
            .get(DOC_TYPE_CUSTOMER, order.customer_id)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound(format!("Customer with id {} not found", order.customer_id))
            })?;
        customer.apply_order(order)?;
        self.upsert(DOC_TYPE_CUSTOMER, customer.id, &customer).await?;
        Ok(customer)
    }
}

#[async_trait]
impl OrderStorage for CouchbaseStorage {
    async fn save(&self, order: Order) -> Result<Order, StorageError> {
        self.upsert(DOC_TYPE_ORDER, order.id, &order).await?;
        tracing::debug!("Saved order {} for customer {}", order.id, order.customer_id);
        Ok(order)
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Order>, StorageError> {
        let query = format!(
            r#"
            SELECT o.*
            FROM `{}` o
            WHERE o.type = '{}' AND o.customer = '{}'
            ORDER BY o.orderDate DESC
            "#,
            self.bucket_name, DOC_TYPE_ORDER, customer_id
        );

        self.query(&query).await
    }
}

#[async_trait]
impl CampaignStorage for CouchbaseStorage {
    async fn save(&self, campaign: Campaign) -> Result<Campaign, StorageError> {
        self.upsert(DOC_TYPE_CAMPAIGN, campaign.id, &campaign).await?;
        tracing::debug!("Saved campaign {}", campaign.name);
        Ok(campaign)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Campaign>, StorageError> {
        self.get(DOC_TYPE_CAMPAIGN, id).await
    }

    async fn list(&self) -> Result<Vec<Campaign>, StorageError> {
        let query = format!(
            r#"
            SELECT p.*
            FROM `{}` p
            WHERE p.type = '{}'
            ORDER BY p.createdAt DESC
            "#,
            self.bucket_name, DOC_TYPE_CAMPAIGN
        );

        self.query(&query).await
    }

    async fn update(&self, campaign: Campaign) -> Result<Campaign, StorageError> {
        if CampaignStorage::get_by_id(self, campaign.id).await?.is_none() {
            return Err(StorageError::NotFound(format!(
                "Campaign with id {} not found",
                campaign.id
            )));
        }
        self.upsert(DOC_TYPE_CAMPAIGN, campaign.id, &campaign).await?;
        Ok(campaign)
    }
}
