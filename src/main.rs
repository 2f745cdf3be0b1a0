//! OpenSASE Marketplace - carts, checkout, payments and order lifecycle

use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_marketplace::auth::TokenKeys;
use opensase_marketplace::config::Config;
use opensase_marketplace::http::{self, AppState};
use opensase_marketplace::notifications::{LogNotifier, NatsNotifier, Notifier};
use opensase_marketplace::payments::RazorpayGateway;
use opensase_marketplace::services::{AddressService, CartService, CatalogService, OrderService, PaymentService};
use opensase_marketplace::store::{AddressRepository, CartRepository, Catalog, MemoryStore, OrderRepository, PgStore};

struct Stores {
    carts: Arc<dyn CartRepository>,
    orders: Arc<dyn OrderRepository>,
    addresses: Arc<dyn AddressRepository>,
    catalog: Arc<dyn Catalog>,
}

impl Stores {
    fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CartRepository + OrderRepository + AddressRepository + Catalog + 'static,
    {
        Self { carts: backend.clone(), orders: backend.clone(), addresses: backend.clone(), catalog: backend }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let stores = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url, config.max_db_connections).await.context("connecting to postgres")?;
            pg.migrate().await.context("running migrations")?;
            Stores::from_backend(Arc::new(pg))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data will not survive a restart");
            Stores::from_backend(Arc::new(MemoryStore::new()))
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsNotifier::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable; notifications go to the log");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };

    let timeout = config.store_timeout;
    let orders = OrderService::new(stores.orders, stores.carts.clone(), notifier, timeout, config.verify_subtotal);
    let gateway = RazorpayGateway::new(&config.razorpay_api_url, &config.razorpay_key_id, &config.razorpay_key_secret, config.gateway_timeout)
        .context("building the payment gateway client")?;
    let state = AppState {
        keys: Arc::new(TokenKeys::from_secret(config.jwt_secret.as_bytes())),
        cart: CartService::new(stores.carts, stores.catalog.clone(), timeout),
        payments: PaymentService::new(
            Arc::new(gateway), &config.razorpay_key_secret, &config.payment_currency, config.gateway_timeout, orders.clone(),
        ),
        orders,
        addresses: AddressService::new(stores.addresses, timeout),
        catalog: CatalogService::new(stores.catalog, timeout),
    };

    let app = http::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("🚀 OpenSASE Marketplace listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
