use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing::{info, warn, Level};
use tracing_subscriber::{
    field::RecordFields,
    fmt::{self, time::ChronoUtc, FormatFields},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use database_layer::DatabasePool;
use logger_redacted::PiiRedactor;
use pharmacy_server::{
    config::{CliOverrides, LogFormat, LoggingSettings},
    create_app, PharmacyServer, Settings,
};

/// Pharmacy preparation HTTP server
#[derive(Parser, Debug)]
#[command(name = "pharmacy-server")]
#[command(about = "Hospital pharmacy preparation service HTTP API server")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "PHARMACY_CONFIG")]
    config: Option<String>,

    /// Server bind address
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Do not apply pending migrations on startup
    #[arg(long)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let overrides = CliOverrides {
        host: args.host.clone(),
        port: args.port,
        verbose: args.verbose,
    };
    let settings = Settings::load(args.config.as_deref(), &overrides)?;

    PiiRedactor::install(settings.logging.redaction.clone());
    init_tracing(&settings.logging);

    info!("💊 {}", "Starting pharmacy preparation server".bright_cyan());
    info!("📋 Version: {}", env!("CARGO_PKG_VERSION").bright_white());

    let database = DatabasePool::connect(&settings.database)
        .await
        .context("failed to connect to the database")?;

    if args.skip_migrations {
        warn!("Skipping database migrations");
    } else {
        database
            .run_migrations()
            .await
            .context("failed to apply database migrations")?;
        info!("✅ {}", "Database schema up to date".bright_green());
    }

    let bind_address = settings.server.bind_address();
    let server = PharmacyServer::new(settings, database.clone());
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind to {}", bind_address))?;

    info!("🚀 {}", format!("Server running on http://{}", bind_address).bright_green());
    info!("📋 {}", format!("Health check available at: http://{}/health", bind_address).bright_blue());
    info!("📚 {}", format!("API docs available at: http://{}/docs", bind_address).bright_blue());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    database.close().await;
    info!("👋 {}", "Server stopped".bright_yellow());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing(logging: &LoggingSettings) {
    let use_colors = std::env::var("NO_COLOR").is_err() && atty::is(atty::Stream::Stdout);
    let pretty = match logging.format {
        LogFormat::Pretty => true,
        LogFormat::Json => false,
        LogFormat::Auto => use_colors,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "pharmacy_server={level},database_layer={level},tower_http=info,sqlx=warn,hyper=info",
            level = logging.level
        )
        .into()
    });

    if pretty {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_ansi(use_colors)
                    .event_format(ColoredFormatter)
                    .fmt_fields(ColoredFieldFormatter),
            )
            .init();

        print_startup_banner();
    } else {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    }
}

fn print_startup_banner() {
    println!("{}", "╔══════════════════════════════════════════════════════════════╗".bright_cyan());
    println!("{}", "║                    💊 PHARMACY PREPARATION                   ║".bright_cyan());
    println!("{}", "║             Daily agenda, records and registry API           ║".bright_cyan());
    println!("{}", "╚══════════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

// Colored formatter for development
struct ColoredFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ColoredFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();

        write!(writer, "{} ", chrono::Utc::now().format("%H:%M:%S%.3f").to_string().bright_black())?;

        let level_str = match *metadata.level() {
            Level::TRACE => "TRACE".bright_purple(),
            Level::DEBUG => "DEBUG".bright_blue(),
            Level::INFO => " INFO".bright_green(),
            Level::WARN => " WARN".bright_yellow(),
            Level::ERROR => "ERROR".bright_red(),
        };
        write!(writer, "[{}] ", level_str)?;

        if let Some(target) = metadata.target().split("::").last() {
            write!(writer, "{:<15} ", target.bright_cyan())?;
        }

        // Request id from the enclosing request span, when there is one
        if let Some(scope) = ctx.event_scope() {
            if let Some(span) = scope.from_root().find(|span| span.name() == "request") {
                if let Some(fields) = span.extensions().get::<fmt::FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{} ", format!("{{{}}}", fields).bright_magenta())?;
                    }
                }
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;

        if metadata.level() <= &Level::DEBUG {
            if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
                let file_short = file.rsplit('/').next().unwrap_or(file);
                write!(writer, " {}", format!("({}:{})", file_short, line).bright_black())?;
            }
        }

        writeln!(writer)
    }
}

// Field formatter: message in bold, key=value pairs highlighted
struct ColoredFieldFormatter;

impl<'a> tracing_subscriber::fmt::FormatFields<'a> for ColoredFieldFormatter {
    fn format_fields<R: RecordFields>(
        &self,
        writer: tracing_subscriber::fmt::format::Writer<'a>,
        fields: R,
    ) -> std::fmt::Result {
        let mut visitor = ColoredFieldVisitor {
            writer,
            is_first: true,
            result: Ok(()),
        };
        fields.record(&mut visitor);
        visitor.result
    }
}

struct ColoredFieldVisitor<'a> {
    writer: tracing_subscriber::fmt::format::Writer<'a>,
    is_first: bool,
    result: std::fmt::Result,
}

impl ColoredFieldVisitor<'_> {
    fn write_field(&mut self, name: &str, value: &str) {
        if self.result.is_err() {
            return;
        }
        self.result = if name == "message" {
            write!(self.writer, "{}", value.white().bold())
        } else {
            write!(
                self.writer,
                "{}{}={}",
                if self.is_first { "" } else { " " },
                name.bright_yellow(),
                value.bright_white()
            )
        };
        self.is_first = false;
    }
}

impl tracing::field::Visit for ColoredFieldVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.write_field(field.name(), &format!("{:?}", value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.write_field(field.name(), value);
    }
}
