//! Common test utilities for invoicing-service integration tests.

#![allow(dead_code)]

use invoicing_service::config::{DatabaseConfig, InvoicingConfig};
use invoicing_service::startup::Application;
use reqwest::{Client, Response};
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoicing_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Running application plus an HTTP client acting as one user.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub user_id: String,
    pub client: Client,
}

fn test_config(database: Option<DatabaseConfig>) -> InvoicingConfig {
    InvoicingConfig {
        common: CommonConfig { port: 0 },
        service_name: "invoicing-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database,
    }
}

impl TestApp {
    /// Spawn the application with the in-memory store.
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config(None)).await
    }

    /// Spawn the application against `TEST_DATABASE_URL`, or `None` when it
    /// is not set.
    pub async fn spawn_with_database() -> Option<Self> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let database = DatabaseConfig {
            url: Secret::new(url),
            max_connections: 5,
            min_connections: 1,
            run_migrations: true,
        };
        Some(Self::spawn_with(test_config(Some(database))).await)
    }

    async fn spawn_with(config: InvoicingConfig) -> Self {
        init_tracing();

        let app = Application::build(config)
            .await
            .expect("Failed to build application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let address = format!("http://127.0.0.1:{}", port);
        let client = Client::new();

        // Wait for the server to answer health checks
        let mut attempts = 0;
        loop {
            match client.get(format!("{}/health", address)).send().await {
                Ok(_) => break,
                Err(_) if attempts < 20 => {
                    attempts += 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                }
                Err(e) => panic!("Server did not start after 20 attempts: {}", e),
            }
        }

        Self {
            address,
            port,
            user_id: format!("user-{}", Uuid::new_v4()),
            client,
        }
    }

    /// Same server, different caller.
    pub fn as_user(&self, user_id: &str) -> Self {
        Self {
            address: self.address.clone(),
            port: self.port,
            user_id: user_id.to_string(),
            client: self.client.clone(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .header("X-User-ID", &self.user_id)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .header("X-User-ID", &self.user_id)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .header("X-User-ID", &self.user_id)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Response {
        self.client
            .patch(self.url(path))
            .header("X-User-ID", &self.user_id)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .header("X-User-ID", &self.user_id)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create an invoice and return its JSON body.
    pub async fn create_invoice(&self, body: &Value) -> Value {
        let response = self.post("/invoices", body).await;
        assert_eq!(response.status().as_u16(), 201, "create failed");
        response.json().await.expect("Failed to parse JSON")
    }

    pub async fn pay(&self, invoice_id: &str, body: &Value) -> Response {
        self.post(&format!("/invoices/{}/pay", invoice_id), body).await
    }
}

/// Unique invoice number so tests sharing a database do not collide.
pub fn invoice_number() -> String {
    format!("INV-{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Create request body with the given `(description, quantity, unit_price)` items.
pub fn invoice_body(number: &str, items: &[(&str, i32, &str)]) -> Value {
    json!({
        "invoice_number": number,
        "customer_name": "Acme Corp",
        "customer_email": "billing@acme.test",
        "customer_address": "1 Main St, Springfield",
        "items": items
            .iter()
            .map(|(description, quantity, unit_price)| json!({
                "description": description,
                "quantity": quantity,
                "unit_price": unit_price,
            }))
            .collect::<Vec<_>>(),
    })
}

/// Parse a decimal serialised as a JSON string.
pub fn money(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .expect("decimal serialised as string")
        .parse()
        .expect("valid decimal")
}
