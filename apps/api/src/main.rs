use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use scheduling_cell::memory::{InMemorySettingsService, InMemorySlotStore, InMemoryUserDirectory};
use scheduling_cell::{CalendarSync, NullCalendarSync, RestCalendarSync, SchedulingEngine};
use shared_config::AppConfig;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduling API server");

    // Load configuration
    let config = AppConfig::from_env();

    let calendar: Arc<dyn CalendarSync> = if config.is_calendar_sync_configured() {
        Arc::new(RestCalendarSync::new(config.calendar_sync_url.clone()))
    } else {
        Arc::new(NullCalendarSync)
    };

    let engine = Arc::new(
        SchedulingEngine::new(
            Arc::new(InMemorySlotStore::new()),
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(InMemorySettingsService::default()),
            calendar,
        )
        .with_work_hours(config.work_start_hour, config.work_end_hour),
    );

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(engine)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .expect("CLINIC_BIND_ADDR must be host:port");
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
