//! Small macros shared by the HTTP front ends.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub use actix_web;

/// Generates a `routes` function registering every listed actix service.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     route list_monitors,
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($(route $route:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::actix_web::web::ServiceConfig) {
            $( cfg.service($route); )*
        }
    };
}
