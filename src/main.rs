// src/main.rs
use actix_web::{App, HttpServer, middleware::Logger, web};
use scenario_hub::scenario::{ScenarioStore, SharedScenarios};
use scenario_hub::{accounts, cache, config, devices, error, scenarios};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    dotenv::dotenv().ok();
    let config = config::Config::from_env().expect("Failed to load config from environment");

    tracing::info!("Starting scenario hub on {}:{}", config.bind_host, config.bind_port);

    let pool = PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    let caches = web::Data::new(cache::ListCaches::new(
        config.list_cache_capacity,
        config.list_cache_ttl(),
    ));
    let scenario_store: web::Data<SharedScenarios> =
        web::Data::new(RwLock::new(ScenarioStore::new()));

    let bind = (config.bind_host.clone(), config.bind_port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(caches.clone())
            .app_data(scenario_store.clone())
            .app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(error::query_error_handler))
            .wrap(Logger::default())
            .configure(devices::init_routes)
            .configure(accounts::init_routes)
            .configure(scenarios::init_routes)
    })
    .bind(bind)?
    .run()
    .await
}
