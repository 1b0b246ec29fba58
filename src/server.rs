//! # Server Configuration
//!
//! Application state, router wiring and server startup for the Formbase API.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, patch, post},
};
use sea_orm::DatabaseConnection;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::engine::PlanCache;
use crate::handlers;
use crate::idgen::IdGenerator;
use crate::tasks::{TaskQueue, run_worker};
use crate::telemetry::{TraceContext, with_trace_context};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    /// Compiled template plans, evicted on template/field mutation
    pub plans: Arc<PlanCache>,
    /// TTL cache: list responses, GPS last points, login codes
    pub cache: Arc<TtlCache>,
    pub idgen: Arc<IdGenerator>,
    pub tasks: TaskQueue,
}

impl AppState {
    /// Build state and spawn the background worker.
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Self {
        let (tasks, rx) = TaskQueue::new(config.task_queue_depth);
        let state = Self {
            db,
            plans: Arc::new(PlanCache::new(config.plan_cache_capacity)),
            cache: Arc::new(TtlCache::new()),
            idgen: Arc::new(IdGenerator::new()),
            config: Arc::new(config),
            tasks,
        };
        tokio::spawn(run_worker(state.clone(), rx));
        state
    }
}

/// Attach a trace context to every request for error correlation.
async fn trace_middleware(request: Request, next: Next) -> Response {
    let trace_id = uuid::Uuid::new_v4().to_string();
    let context = TraceContext {
        trace_id: trace_id.clone(),
    };

    let mut request = request;
    request.extensions_mut().insert(context.clone());

    let mut response = with_trace_context(context, next.run(request)).await;
    if let Ok(header) = trace_id.parse() {
        response.headers_mut().insert("x-trace-id", header);
    }
    response
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        // Templates
        .route(
            "/templates",
            get(handlers::templates::list_templates).post(handlers::templates::create_template),
        )
        .route("/templates/copy", post(handlers::templates::copy_template))
        .route(
            "/templates/{id}",
            get(handlers::templates::get_template)
                .patch(handlers::templates::update_template)
                .delete(handlers::templates::delete_template),
        )
        .route(
            "/templatefields",
            get(handlers::templates::list_fields).post(handlers::templates::create_field),
        )
        .route(
            "/templatefields/{id}",
            patch(handlers::templates::update_field).delete(handlers::templates::delete_field),
        )
        .route(
            "/templateaggrfields",
            get(handlers::templates::list_aggregate_fields)
                .post(handlers::templates::create_aggregate_field),
        )
        .route(
            "/templateaggrfields/{id}",
            delete(handlers::templates::delete_aggregate_field),
        )
        // Generic data
        .route(
            "/data",
            get(handlers::data::list_data).post(handlers::data::create_data),
        )
        .route(
            "/data/{id}",
            get(handlers::data::get_data)
                .put(handlers::data::update_data)
                .patch(handlers::data::patch_data)
                .delete(handlers::data::delete_data),
        )
        .route("/datafind", post(handlers::data::find_data))
        .route("/databulkdelete", post(handlers::data::bulk_delete_data))
        .route("/databulkupdate", post(handlers::data::bulk_update_data))
        .route(
            "/dataaggregate",
            get(handlers::data::aggregate_data).post(handlers::data::aggregate_data_post),
        )
        .route(
            "/datam2m",
            get(handlers::data::list_m2m).post(handlers::data::create_m2m),
        )
        .route("/datam2m/{id}", delete(handlers::data::delete_m2m))
        // Accounts & ledgers
        .route(
            "/accounts",
            get(handlers::accounts::list_accounts).post(handlers::accounts::create_account),
        )
        .route(
            "/accounts/{id}",
            get(handlers::accounts::get_account).delete(handlers::accounts::delete_account),
        )
        .route(
            "/accounts/{id}/statements",
            get(handlers::accounts::list_statements),
        )
        .route(
            "/accountstatements",
            post(handlers::accounts::post_statement),
        )
        // Notices
        .route(
            "/notices",
            get(handlers::notices::list_notices).post(handlers::notices::create_notice),
        )
        .route(
            "/notices/{id}",
            get(handlers::notices::get_notice).delete(handlers::notices::delete_notice),
        )
        .route("/notices/{id}/read", post(handlers::notices::mark_notice_read))
        .route("/notices/{id}/send", post(handlers::notices::send_notice))
        // GPS
        .route(
            "/gpspoints",
            get(handlers::gps::list_points).post(handlers::gps::ingest_point),
        )
        .route("/gpspoints/last", get(handlers::gps::last_point))
        .route("/gpspoints/refresh", post(handlers::gps::refresh_points))
        // Trees
        .route(
            "/trees",
            get(handlers::trees::get_tree).post(handlers::trees::create_node),
        )
        .route("/trees/{id}", delete(handlers::trees::delete_node))
        .route("/trees/{id}/move", post(handlers::trees::move_node))
        .route("/trees/{id}/copy", post(handlers::trees::copy_subtree))
        // Reports
        .route(
            "/reports",
            get(handlers::reports::list_reports).post(handlers::reports::create_report),
        )
        .route("/reports/{id}", delete(handlers::reports::delete_report))
        .route(
            "/reports/{report_id}/run",
            get(handlers::reports::run_report).post(handlers::reports::run_report_post),
        )
        // System log
        .route("/systemlogs", get(handlers::system_logs::list_logs))
        // Users & auth
        .route("/users", post(handlers::users::create_user))
        .route("/auth/login", post(handlers::users::password_login))
        .route("/auth/sms/send", post(handlers::users::send_sms_code))
        .route("/auth/sms/login", post(handlers::users::sms_login))
        .route("/auth/email/send", post(handlers::users::send_email_code))
        .route("/auth/email/login", post(handlers::users::email_login))
        .route("/auth/qr/new", post(handlers::users::qr_new))
        .route("/auth/qr/poll", get(handlers::users::qr_poll))
        .route("/auth/qr/confirm", post(handlers::users::qr_confirm))
        .route("/auth/me", get(handlers::users::me));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::auth_middleware,
        ))
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let state = AppState::new(config, db);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::data::list_data,
        crate::handlers::data::create_data,
        crate::handlers::data::delete_data,
        crate::handlers::templates::create_template,
        crate::handlers::templates::copy_template,
        crate::handlers::accounts::post_statement,
        crate::handlers::trees::move_node,
        crate::handlers::reports::run_report,
        crate::handlers::users::password_login,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::error::GatewayError,
            crate::handlers::templates::CreateTemplateDto,
            crate::handlers::templates::CreateFieldDto,
            crate::handlers::templates::CopyTemplateDto,
            crate::handlers::templates::CreateAggregateDto,
            crate::handlers::accounts::CreateAccountDto,
            crate::handlers::accounts::PostStatementDto,
            crate::handlers::notices::CreateNoticeDto,
            crate::handlers::gps::IngestPointDto,
            crate::handlers::gps::RefreshDto,
            crate::handlers::trees::CreateNodeDto,
            crate::handlers::trees::MoveNodeDto,
            crate::handlers::trees::CopySubtreeDto,
            crate::handlers::reports::CreateReportDto,
            crate::handlers::users::PasswordLoginDto,
            crate::handlers::users::SendCodeDto,
            crate::handlers::users::CodeLoginDto,
            crate::handlers::users::QrConfirmDto,
            crate::handlers::users::CreateUserDto,
        )
    ),
    info(
        title = "Formbase API",
        description = "Multi-tenant form-template business data platform",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
