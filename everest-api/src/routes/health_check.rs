use actix_web::{HttpResponse, Responder, get};

#[utoipa::path(
    summary = "API liveness",
    description = "Returns 'ok' while the server accepts requests. Neither the cluster nor any PMM server is contacted.",
    responses(
        (status = 200, description = "Health check passed; returns 'ok'.", body = String),
    ),
    tag = "Health",
)]
#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("ok")
}
