use actix_web::{HttpResponse, Responder, get};

macros_utils::routes! {
    route health_route,
}

/// Liveness probe; the status code is the whole answer.
#[get("/")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}
