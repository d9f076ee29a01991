use std::{net::TcpListener, sync::Arc};

use actix_web::{
    App, HttpResponse, HttpServer, dev::Server, error::InternalError, middleware::Compress, web,
};
use actix_web_httpauth::middleware::HttpAuthentication;
use everest_telemetry::metrics::init_metrics_handle;
use tracing::info;
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;

use crate::{
    authentication::{ApiUsers, auth_validator},
    config::ApiConfig,
    k8s::{K8sClient, http::HttpK8sClient},
    monitoring::{
        CreateMonitoringInstanceRequest, MonitoringInstance, MonitoringInstanceManager,
        PmmCredentials, UpdateMonitoringInstanceRequest,
    },
    pmm::{ApiKeyIssuer, HttpPmmClient},
    rbac::{Authorizer, GrantAuthorizer},
    routes::{
        ErrorMessage,
        health_check::health_check,
        metrics::metrics,
        monitoring_instances::{
            create_monitoring_instance, delete_monitoring_instance,
            list_all_monitoring_instances, list_monitoring_instances, read_monitoring_instance,
            update_monitoring_instance,
        },
    },
};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(config: ApiConfig) -> Result<Self, anyhow::Error> {
        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let k8s_client = Arc::new(HttpK8sClient::new().await?) as Arc<dyn K8sClient>;
        let pmm_client =
            Arc::new(HttpPmmClient::new(config.pmm.request_timeout())?) as Arc<dyn ApiKeyIssuer>;
        let authorizer = Arc::new(GrantAuthorizer::new(config.authorization.grants.clone()))
            as Arc<dyn Authorizer>;

        info!(
            host = config.application.host,
            port,
            users = config.users.len(),
            grants = config.authorization.grants.len(),
            "starting everest api"
        );

        let server = run(config, listener, k8s_client, pmm_client, authorizer).await?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Builds the HTTP server on `listener`. The collaborators are injected so tests can
/// run the server against in-memory implementations.
pub async fn run(
    config: ApiConfig,
    listener: TcpListener,
    k8s_client: Arc<dyn K8sClient>,
    api_key_issuer: Arc<dyn ApiKeyIssuer>,
    authorizer: Arc<dyn Authorizer>,
) -> Result<Server, anyhow::Error> {
    let users = web::Data::new(ApiUsers::from_config(&config.users)?);
    let manager = web::Data::new(MonitoringInstanceManager::new(
        k8s_client,
        api_key_issuer,
        authorizer,
        config.authorization.policy,
    ));
    let metrics_handle = init_metrics_handle()?;

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::routes::health_check::health_check,
            crate::routes::metrics::metrics,
            crate::routes::monitoring_instances::create_monitoring_instance,
            crate::routes::monitoring_instances::list_monitoring_instances,
            crate::routes::monitoring_instances::list_all_monitoring_instances,
            crate::routes::monitoring_instances::read_monitoring_instance,
            crate::routes::monitoring_instances::update_monitoring_instance,
            crate::routes::monitoring_instances::delete_monitoring_instance,
        ),
        components(schemas(
            CreateMonitoringInstanceRequest,
            UpdateMonitoringInstanceRequest,
            PmmCredentials,
            MonitoringInstance,
            ErrorMessage,
        ))
    )]
    struct ApiDoc;

    let openapi = ApiDoc::openapi();

    let server = HttpServer::new(move || {
        let authentication = HttpAuthentication::bearer(auth_validator);
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            let response = HttpResponse::BadRequest().json(ErrorMessage {
                error: err.to_string(),
            });
            InternalError::from_response(err, response).into()
        });
        let openapi = openapi.clone();

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .service(health_check)
            .service(metrics)
            .route(
                "/api-docs/openapi.json",
                web::get().to(move || {
                    let openapi = openapi.clone();
                    async move { HttpResponse::Ok().json(openapi) }
                }),
            )
            .service(
                web::scope("v1")
                    .wrap(authentication)
                    .service(create_monitoring_instance)
                    .service(list_monitoring_instances)
                    .service(list_all_monitoring_instances)
                    .service(read_monitoring_instance)
                    .service(update_monitoring_instance)
                    .service(delete_monitoring_instance),
            )
            .app_data(json_config)
            .app_data(users.clone())
            .app_data(manager.clone())
            .app_data(web::ThinData(metrics_handle.clone()))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
