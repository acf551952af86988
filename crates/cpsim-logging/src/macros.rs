//! ---
//! cpsim_section: "03-logging"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Structured logging context and lifecycle event helpers."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---

#[doc(hidden)]
#[macro_export]
macro_rules! __sim_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            node = ctx.node.unwrap_or(""),
            process = ctx.process.unwrap_or(""),
            variant = ctx.variant.unwrap_or(""),
            kind = ctx.kind.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with harness context.
#[macro_export]
macro_rules! sim_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sim_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sim_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with harness context.
#[macro_export]
macro_rules! sim_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sim_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sim_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with harness context.
#[macro_export]
macro_rules! sim_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sim_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sim_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with harness context.
#[macro_export]
macro_rules! sim_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__sim_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__sim_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
