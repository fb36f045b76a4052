use actix_web::web::ServiceConfig;

pub mod health;
pub mod monitors;

pub fn routes(cfg: &mut ServiceConfig) {
    health::routes(cfg);
    monitors::routes(cfg);
}
