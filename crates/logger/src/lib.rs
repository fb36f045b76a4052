mod tracing;

pub use self::tracing::init_with_directive;
