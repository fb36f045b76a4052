use actix_cors::Cors;

/// CORS policy for browser front ends served from `allowed_origins`.
pub fn cors(allowed_origins: &[String]) -> Cors {
    let base = Cors::default()
        .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allowed_headers(vec!["Accept", "Authorization", "Content-Type", "X-CSRF-Token"])
        .expose_headers(vec!["Link"])
        .supports_credentials()
        .max_age(300);

    allowed_origins.iter().fold(base, |cors, origin| cors.allowed_origin(origin))
}
