//! ---
//! addon_section: "03-logging"
//! addon_subsection: "module"
//! addon_type: "source"
//! addon_scope: "code"
//! addon_description: "Structured logging adapters for lifecycle operations."
//! addon_version: "v0.0.0-prealpha"
//! addon_owner: "tbd"
//! ---
/// Emit an informational log enriched with add-on context.
#[macro_export]
macro_rules! addon_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            cluster = ctx.cluster.unwrap_or(""),
            addon = ctx.addon.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::INFO,
            cluster = ctx.cluster.unwrap_or(""),
            addon = ctx.addon.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a debug log enriched with add-on context.
#[macro_export]
macro_rules! addon_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            cluster = ctx.cluster.unwrap_or(""),
            addon = ctx.addon.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::DEBUG,
            cluster = ctx.cluster.unwrap_or(""),
            addon = ctx.addon.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a warning log enriched with add-on context.
#[macro_export]
macro_rules! addon_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            cluster = ctx.cluster.unwrap_or(""),
            addon = ctx.addon.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::WARN,
            cluster = ctx.cluster.unwrap_or(""),
            addon = ctx.addon.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an error log enriched with add-on context.
#[macro_export]
macro_rules! addon_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            cluster = ctx.cluster.unwrap_or(""),
            addon = ctx.addon.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        let ctx = &$crate::LogContext::default();
        tracing::event!(
            tracing::Level::ERROR,
            cluster = ctx.cluster.unwrap_or(""),
            addon = ctx.addon.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            attempt = ctx.attempt.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
}
