//! Warden grant lifecycle worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warden_application::{
    AppealService, AppealServicePorts, GrantService, PolicyRepository, RevocationConfig,
};
use warden_core::{AppError, AppResult};
use warden_domain::{AppealStatus, ListAppealsFilter};
use warden_infrastructure::{GovernanceSeed, TracingAuditLogger, TracingNotifier};

#[derive(Debug, Clone)]
struct WorkerConfig {
    worker_id: String,
    seed_path: Option<PathBuf>,
    poll_interval_ms: u64,
    run_once: bool,
    reminder_days: Vec<i64>,
    revocation: RevocationConfig,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let seed = match config.seed_path.as_deref() {
        Some(path) => GovernanceSeed::load(path).await?,
        None => GovernanceSeed::default(),
    };
    let (grant_service, appeal_service) = build_services(seed, &config).await?;

    info!(
        worker_id = %config.worker_id,
        poll_interval_ms = config.poll_interval_ms,
        run_once = config.run_once,
        batch_size = config.revocation.batch_size,
        max_workers = config.revocation.max_workers,
        "warden-worker started"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                cancel.cancel();
            }
        }
    });

    let mut interval = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        run_jobs(&grant_service, &appeal_service, &config, &cancel).await;

        if config.run_once {
            break;
        }
    }

    info!(worker_id = %config.worker_id, "warden-worker stopped");
    Ok(())
}

async fn build_services(
    seed: GovernanceSeed,
    config: &WorkerConfig,
) -> AppResult<(GrantService, AppealService)> {
    let stores = seed.into_stores().await?;
    let policies = Arc::new(stores.policies);
    info!(
        worker_id = %config.worker_id,
        policies = policies.list().await?.len(),
        "governance seed loaded"
    );

    let grants = Arc::new(stores.grants);
    let provider = Arc::new(stores.provider);
    let notifier = Arc::new(TracingNotifier::new());
    let audit_logger = Arc::new(TracingAuditLogger::new());

    let grant_service = GrantService::new(
        grants.clone(),
        provider.clone(),
        notifier.clone(),
        audit_logger.clone(),
    )
    .with_revocation_config(config.revocation);

    let appeal_service = AppealService::new(
        AppealServicePorts {
            appeals: Arc::new(stores.appeals),
            grants,
            policies,
            resources: Arc::new(stores.resources),
            provider_service: provider,
            notifier,
            audit_logger,
        },
        grant_service.clone(),
    );

    Ok((grant_service, appeal_service))
}

async fn run_jobs(
    grant_service: &GrantService,
    appeal_service: &AppealService,
    config: &WorkerConfig,
    cancel: &CancellationToken,
) {
    match grant_service.revoke_expired_grants(Utc::now(), cancel).await {
        Ok(report) if report.is_empty() => {}
        Ok(report) => info!(
            worker_id = %config.worker_id,
            revoked = report.revoked_ids().len(),
            failed = report.failed_ids().len(),
            cancelled = report.cancelled_ids().len(),
            "expired grants processed"
        ),
        Err(error) => warn!(
            worker_id = %config.worker_id,
            error = %error,
            "failed to revoke expired grants"
        ),
    }

    if cancel.is_cancelled() {
        return;
    }

    match grant_service
        .notify_expiring_grants(Utc::now(), &config.reminder_days)
        .await
    {
        Ok(summary) if summary.grants == 0 => {}
        Ok(summary) => info!(
            worker_id = %config.worker_id,
            grants = summary.grants,
            notifications = summary.notifications,
            failures = summary.failures,
            "expiration reminders sent"
        ),
        Err(error) => warn!(
            worker_id = %config.worker_id,
            error = %error,
            "failed to send expiration reminders"
        ),
    }

    match count_pending_appeals(appeal_service).await {
        Ok(pending) => info!(
            worker_id = %config.worker_id,
            pending_appeals = pending,
            "appeals awaiting approval"
        ),
        Err(error) => warn!(
            worker_id = %config.worker_id,
            error = %error,
            "failed to count pending appeals"
        ),
    }
}

async fn count_pending_appeals(appeal_service: &AppealService) -> AppResult<usize> {
    let pending = appeal_service
        .find(&ListAppealsFilter {
            statuses: vec![AppealStatus::Pending],
            ..ListAppealsFilter::default()
        })
        .await?;

    Ok(pending.len())
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let worker_id = env::var("WORKER_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let seed_path = env::var("WORKER_SEED_PATH")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let poll_interval_ms = parse_env_u64("WORKER_POLL_INTERVAL_MS", 60_000)?;
        let run_once = parse_env_bool("WORKER_RUN_ONCE", false)?;
        let reminder_days = parse_env_days("WORKER_REMINDER_DAYS", &[1, 3, 7])?;

        if poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "WORKER_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        let defaults = RevocationConfig::default();
        let revocation = RevocationConfig::new(
            parse_env_usize("REVOCATION_BATCH_SIZE", defaults.batch_size)?,
            Duration::from_millis(parse_env_u64(
                "REVOCATION_REFILL_INTERVAL_MS",
                u64::try_from(defaults.refill_interval.as_millis()).unwrap_or(u64::MAX),
            )?),
            parse_env_usize("REVOCATION_MAX_WORKERS", defaults.max_workers)?,
        )?;

        Ok(Self {
            worker_id,
            seed_path,
            poll_interval_ms,
            run_once,
            reminder_days,
            revocation,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(AppError::Validation(format!(
                "invalid {name} value '{value}': expected true or false"
            ))),
        },
        Err(_) => Ok(default),
    }
}

fn parse_env_days(name: &str, default: &[i64]) -> AppResult<Vec<i64>> {
    let Ok(value) = env::var(name) else {
        return Ok(default.to_vec());
    };

    value
        .split(',')
        .map(str::trim)
        .filter(|day| !day.is_empty())
        .map(|day| match day.parse::<i64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            Ok(_) => Err(AppError::Validation(format!(
                "invalid {name} value '{value}': days must be positive"
            ))),
            Err(error) => Err(AppError::Validation(format!(
                "invalid {name} value '{value}': {error}"
            ))),
        })
        .collect()
}
