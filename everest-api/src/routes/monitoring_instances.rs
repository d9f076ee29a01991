use actix_web::{
    HttpResponse, Responder, ResponseError, delete, get,
    http::StatusCode,
    patch, post,
    web::{Data, Json, Path, ReqData},
};

use crate::authentication::AuthenticatedUser;
use crate::monitoring::{
    CreateMonitoringInstanceRequest, MonitoringInstance, MonitoringInstanceError,
    MonitoringInstanceManager, UpdateMonitoringInstanceRequest,
};
use crate::routes::ErrorMessage;

impl MonitoringInstanceError {
    fn to_message(&self) -> String {
        match self {
            MonitoringInstanceError::Pmm(_) => "Could not create an API key in PMM".to_string(),
            // Do not expose cluster or policy engine details in error messages
            MonitoringInstanceError::K8s(_) | MonitoringInstanceError::Authorization(_) => {
                "internal server error".to_string()
            }
            e => e.to_string(),
        }
    }
}

impl ResponseError for MonitoringInstanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            MonitoringInstanceError::InvalidInput(_) | MonitoringInstanceError::InUse { .. } => {
                StatusCode::BAD_REQUEST
            }
            MonitoringInstanceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            MonitoringInstanceError::NotFound { .. } => StatusCode::NOT_FOUND,
            MonitoringInstanceError::AlreadyExists { .. } => StatusCode::CONFLICT,
            MonitoringInstanceError::Pmm(_)
            | MonitoringInstanceError::K8s(_)
            | MonitoringInstanceError::Authorization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_message = ErrorMessage {
            error: self.to_message(),
        };
        HttpResponse::build(self.status_code()).json(error_message)
    }
}

#[utoipa::path(
    summary = "Create a monitoring instance",
    description = "Stores the PMM API key in a secret, minting one when a user and password are given, then creates the monitoring config.",
    request_body = CreateMonitoringInstanceRequest,
    params(
        ("namespace" = String, Path, description = "Namespace of the monitoring instance")
    ),
    responses(
        (status = 200, description = "Monitoring instance created", body = MonitoringInstance),
        (status = 400, description = "Bad request", body = ErrorMessage),
        (status = 403, description = "Forbidden", body = ErrorMessage),
        (status = 409, description = "Monitoring instance already exists", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Monitoring instances"
)]
#[post("/namespaces/{namespace}/monitoring-instances")]
pub async fn create_monitoring_instance(
    user: ReqData<AuthenticatedUser>,
    manager: Data<MonitoringInstanceManager>,
    namespace: Path<String>,
    request: Json<CreateMonitoringInstanceRequest>,
) -> Result<impl Responder, MonitoringInstanceError> {
    let namespace = namespace.into_inner();
    let instance = manager.create(&user.name, &namespace, &request).await?;

    Ok(Json(instance))
}

#[utoipa::path(
    summary = "List monitoring instances of a namespace",
    description = "Returns the monitoring instances of the namespace the caller may read.",
    params(
        ("namespace" = String, Path, description = "Namespace of the monitoring instances")
    ),
    responses(
        (status = 200, description = "Monitoring instances listed", body = Vec<MonitoringInstance>),
        (status = 400, description = "Bad request", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Monitoring instances"
)]
#[get("/namespaces/{namespace}/monitoring-instances")]
pub async fn list_monitoring_instances(
    user: ReqData<AuthenticatedUser>,
    manager: Data<MonitoringInstanceManager>,
    namespace: Path<String>,
) -> Result<impl Responder, MonitoringInstanceError> {
    let namespace = namespace.into_inner();
    let instances = manager.list(&user.name, Some(&namespace)).await?;

    Ok(Json(instances))
}

#[utoipa::path(
    summary = "List all monitoring instances",
    description = "Returns the monitoring instances of every namespace the caller may read.",
    responses(
        (status = 200, description = "Monitoring instances listed", body = Vec<MonitoringInstance>),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Monitoring instances"
)]
#[get("/monitoring-instances")]
pub async fn list_all_monitoring_instances(
    user: ReqData<AuthenticatedUser>,
    manager: Data<MonitoringInstanceManager>,
) -> Result<impl Responder, MonitoringInstanceError> {
    let instances = manager.list(&user.name, None).await?;

    Ok(Json(instances))
}

#[utoipa::path(
    summary = "Retrieve a monitoring instance",
    params(
        ("namespace" = String, Path, description = "Namespace of the monitoring instance"),
        ("name" = String, Path, description = "Name of the monitoring instance")
    ),
    responses(
        (status = 200, description = "Monitoring instance retrieved", body = MonitoringInstance),
        (status = 404, description = "Monitoring instance not found", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Monitoring instances"
)]
#[get("/namespaces/{namespace}/monitoring-instances/{name}")]
pub async fn read_monitoring_instance(
    user: ReqData<AuthenticatedUser>,
    manager: Data<MonitoringInstanceManager>,
    path: Path<(String, String)>,
) -> Result<impl Responder, MonitoringInstanceError> {
    let (namespace, name) = path.into_inner();
    let instance = manager.get(&user.name, &namespace, &name).await?;

    Ok(Json(instance))
}

#[utoipa::path(
    summary = "Update a monitoring instance",
    description = "Changes the fields present in the body. New PMM credentials replace the stored API key.",
    request_body = UpdateMonitoringInstanceRequest,
    params(
        ("namespace" = String, Path, description = "Namespace of the monitoring instance"),
        ("name" = String, Path, description = "Name of the monitoring instance")
    ),
    responses(
        (status = 200, description = "Monitoring instance updated", body = MonitoringInstance),
        (status = 400, description = "Bad request", body = ErrorMessage),
        (status = 403, description = "Forbidden", body = ErrorMessage),
        (status = 404, description = "Monitoring instance not found", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Monitoring instances"
)]
#[patch("/namespaces/{namespace}/monitoring-instances/{name}")]
pub async fn update_monitoring_instance(
    user: ReqData<AuthenticatedUser>,
    manager: Data<MonitoringInstanceManager>,
    path: Path<(String, String)>,
    request: Json<UpdateMonitoringInstanceRequest>,
) -> Result<impl Responder, MonitoringInstanceError> {
    let (namespace, name) = path.into_inner();
    let instance = manager
        .update(&user.name, &namespace, &name, &request)
        .await?;

    Ok(Json(instance))
}

#[utoipa::path(
    summary = "Delete a monitoring instance",
    description = "Deletes the monitoring config and its credentials secret unless a database cluster uses the instance.",
    params(
        ("namespace" = String, Path, description = "Namespace of the monitoring instance"),
        ("name" = String, Path, description = "Name of the monitoring instance")
    ),
    responses(
        (status = 204, description = "Monitoring instance deleted"),
        (status = 400, description = "Monitoring instance is in use", body = ErrorMessage),
        (status = 403, description = "Forbidden", body = ErrorMessage),
        (status = 404, description = "Monitoring instance not found", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Monitoring instances"
)]
#[delete("/namespaces/{namespace}/monitoring-instances/{name}")]
pub async fn delete_monitoring_instance(
    user: ReqData<AuthenticatedUser>,
    manager: Data<MonitoringInstanceManager>,
    path: Path<(String, String)>,
) -> Result<impl Responder, MonitoringInstanceError> {
    let (namespace, name) = path.into_inner();
    manager.delete(&user.name, &namespace, &name).await?;

    Ok(HttpResponse::NoContent().finish())
}
