//! Notification service binary.
//!
//! Consumes `auth-events` from Kafka and emails one-time passcodes.

use anyhow::Context;
use notification_service::app::NotificationApp;
use notification_service::config::Config;
use notification_service::server::{AppState, build_router};
use notification_service::shutdown::{ShutdownCoordinator, wait_for_signal};
use notification_service::{ConsumerShutdown, OtpEventHandler};
use notifier_core::OTP_GENERATED_TAG;
use notifier_core::environment::SystemClock;
use notifier_mailer::{Branding, DeliveryBackend, DeliveryService, SmtpBackend, SmtpSettings};
use notifier_redpanda::{KafkaConsumer, KafkaSettings, KafkaTopicAdmin};
use notifier_runtime::{HandlerRegistry, MetricsRecorder};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound for each shutdown step.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Environment validation failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.as_filter())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "Notification service failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        service = %config.server.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting notification service"
    );

    let mut recorder = MetricsRecorder::new();
    recorder.install().context("Failed to install metrics recorder")?;
    let recorder = Arc::new(recorder);

    // SMTP transport
    let smtp = &config.smtp;
    let backend = SmtpBackend::new(&SmtpSettings {
        host: smtp.host.clone(),
        port: smtp.port,
        secure: smtp.secure,
        username: smtp.user.clone(),
        password: smtp.password.clone(),
        from: smtp.from.clone(),
        timeout: smtp.timeout,
    })
    .context("Failed to build SMTP transport")?;
    info!(
        host = %smtp.host,
        port = smtp.port,
        secure = smtp.secure,
        user = %smtp.user,
        password_length = smtp.password.len(),
        "Email transporter initialized"
    );

    match backend.verify().await {
        Ok(()) => info!("SMTP connection verified"),
        Err(e) => warn!(error = %e, "SMTP connection verification failed, continuing"),
    }

    let delivery = Arc::new(DeliveryService::new(
        Arc::new(backend),
        SystemClock,
        Branding {
            brand_name: config.branding.brand_name.clone(),
            support_email: config.branding.support_email.clone(),
        },
    ));
    let registry = HandlerRegistry::new()
        .register(OTP_GENERATED_TAG, Arc::new(OtpEventHandler::new(delivery)));

    // Kafka clients
    let kafka = &config.kafka;
    let settings = KafkaSettings::builder()
        .brokers(&kafka.brokers)
        .group_id(&kafka.group_id)
        .client_id(&kafka.client_id)
        .connection_timeout(kafka.connection_timeout)
        .request_timeout(kafka.request_timeout)
        .session_timeout(kafka.session_timeout)
        .heartbeat_interval(kafka.heartbeat_interval)
        .build()
        .context("Invalid Kafka settings")?;
    info!(
        brokers = %settings.brokers,
        group_id = %settings.group_id,
        client_id = %settings.client_id,
        topic = %kafka.topic,
        "Kafka configuration loaded"
    );

    let app = Arc::new(NotificationApp::new(
        kafka.topic.clone(),
        Arc::new(KafkaConsumer::new(settings.clone())),
        Arc::new(KafkaTopicAdmin::new(settings)),
        registry,
    ));

    let mut coordinator = ShutdownCoordinator::new(SHUTDOWN_TIMEOUT);
    coordinator.register(Arc::new(ConsumerShutdown::new(Arc::clone(&app))));

    // Broker connection happens in the background; HTTP serves right away
    let bootstrap = app.spawn_bootstrap(coordinator.subscribe());

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(address = %address, "Notification service listening");

    let router = build_router(AppState::new(Arc::clone(app.connection()), recorder));
    let mut http_shutdown = coordinator.subscribe();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.recv().await;
            })
            .await
    });

    wait_for_signal().await;
    info!("Shutting down gracefully");

    if let Err(errors) = coordinator.shutdown().await {
        warn!(?errors, "Some components did not shut down cleanly");
    }

    if let Err(e) = bootstrap.await {
        error!(error = %e, "Bootstrap supervisor panicked");
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server error"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
    }

    info!("Notification service stopped");
    Ok(())
}
