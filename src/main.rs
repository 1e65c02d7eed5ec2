//! `reconcile` - runs the legacy billing migration jobs against Stripe.
//!
//! Local state (users, legacy gift records) is seeded from JSON exports;
//! the subscription cache lives for the duration of the run. Each job
//! prints its `BatchReport` as JSON on stdout. Logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use membership_billing::adapters::{
    InMemoryCustomerDirectory, InMemoryLegacyGiftRepository, InMemorySubscriptionCache,
    StripeBillingAdapter,
};
use membership_billing::application::handlers::gift::{
    GiftCodeIssuer, GiftSettings, RedeemGiftHandler,
};
use membership_billing::application::handlers::migration::{
    BackfillCustomersJob, Job, JobOptions, LegacyProductMap, MigrateGiftCardsJob,
    MigrateLegacyGiftsJob, MigrateLegacySubscriptionsJob,
};
use membership_billing::application::handlers::subscription::SubscriptionMutationEngine;
use membership_billing::config::{AppConfig, ConfigError};
use membership_billing::domain::errors::BillingError;
use membership_billing::domain::foundation::{ProductId, SubscriptionId};
use membership_billing::ports::{BillingProvider, LegacyGift, Member, SubscriptionCache};

const USAGE: &str = "\
Usage: reconcile <job|all> [options]

Jobs: backfill_customers, migrate_legacy_subscriptions, migrate_legacy_gifts,
      migrate_gift_cards

Options:
  --dry-run              read only; report what would change
  --subscription <id>    only this subscription
  --product <id>         only subscriptions billing this product
  --exclude <id>         never touch this subscription (repeatable)
  --batch <n>            stop after n records per job
  --members <file>       JSON array of users to load into the directory
  --legacy-gifts <file>  JSON array of legacy gift records

Environment: MEMBERSHIP_BILLING__* configuration, RUST_LOG, LOG_FORMAT=json";

#[derive(Debug, Error)]
enum ReconcileError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read {path}: {source}")]
    SeedRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    SeedParse {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Failed to render report: {0}")]
    Report(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
struct Args {
    jobs: Vec<Job>,
    options: JobOptions,
    members: Option<String>,
    legacy_gifts: Option<String>,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args, ReconcileError> {
    let mut raw = raw.into_iter();
    let job = raw
        .next()
        .ok_or_else(|| ReconcileError::Usage("missing job name".into()))?;
    let mut args = Args {
        jobs: if job == "all" {
            Job::ALL.to_vec()
        } else {
            let job = Job::parse(&job)
                .ok_or_else(|| ReconcileError::Usage(format!("unknown job '{}'", job)))?;
            vec![job]
        },
        ..Args::default()
    };

    while let Some(flag) = raw.next() {
        let mut value = |name: &str| {
            raw.next()
                .ok_or_else(|| ReconcileError::Usage(format!("{} needs a value", name)))
        };
        match flag.as_str() {
            "--dry-run" => args.options.dry_run = true,
            "--subscription" => {
                args.options.subscription = Some(SubscriptionId::new(value("--subscription")?))
            }
            "--product" => args.options.product = Some(ProductId::new(value("--product")?)),
            "--exclude" => {
                args.options
                    .excluded
                    .insert(SubscriptionId::new(value("--exclude")?));
            }
            "--batch" => {
                let n = value("--batch")?;
                let size = n.parse().map_err(|_| {
                    ReconcileError::Usage(format!("--batch expects a number, got '{}'", n))
                })?;
                args.options.batch_size = Some(size);
            }
            "--members" => args.members = Some(value("--members")?),
            "--legacy-gifts" => args.legacy_gifts = Some(value("--legacy-gifts")?),
            other => return Err(ReconcileError::Usage(format!("unknown option '{}'", other))),
        }
    }
    Ok(args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,membership_billing=debug"));
    let json = std::env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn read_seed<T: DeserializeOwned>(path: Option<&str>) -> Result<Vec<T>, ReconcileError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| ReconcileError::SeedRead {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ReconcileError::SeedParse {
        path: path.to_string(),
        source,
    })
}

/// Runs the requested jobs; `Ok(false)` when any record failed.
async fn run(args: Args) -> Result<bool, ReconcileError> {
    let config = AppConfig::load()?;
    config.validate().map_err(ConfigError::from)?;
    if !config.payment.is_live_mode() {
        tracing::warn!("Running against a Stripe test-mode key");
    }

    let provider: Arc<dyn BillingProvider> =
        Arc::new(StripeBillingAdapter::new(config.payment.stripe_config()));
    let cache: Arc<dyn SubscriptionCache> = Arc::new(InMemorySubscriptionCache::new());
    let directory = Arc::new(InMemoryCustomerDirectory::new());
    for member in read_seed::<Member>(args.members.as_deref())? {
        directory.insert(member).await;
    }
    let gifts = Arc::new(InMemoryLegacyGiftRepository::new(read_seed::<LegacyGift>(
        args.legacy_gifts.as_deref(),
    )?));

    let engine = Arc::new(SubscriptionMutationEngine::new(provider.clone(), cache.clone()));
    let issuer = Arc::new(GiftCodeIssuer::new(
        provider.clone(),
        cache.clone(),
        GiftSettings::from_config(&config.gift, &config.catalog),
    ));

    let mut clean = true;
    for job in args.jobs {
        tracing::info!(job = job.name(), dry_run = args.options.dry_run, "Starting job");
        let report = match job {
            Job::BackfillCustomers => {
                BackfillCustomersJob::new(directory.clone(), provider.clone(), cache.clone())
                    .run(&args.options)
                    .await?
            }
            Job::MigrateLegacySubscriptions => {
                MigrateLegacySubscriptionsJob::new(
                    provider.clone(),
                    cache.clone(),
                    engine.clone(),
                    LegacyProductMap::from_config(&config.catalog),
                )
                .run(&args.options)
                .await?
            }
            Job::MigrateLegacyGifts => {
                let redeem = Arc::new(RedeemGiftHandler::new(
                    provider.clone(),
                    cache.clone(),
                    directory.clone(),
                ));
                MigrateLegacyGiftsJob::new(
                    provider.clone(),
                    cache.clone(),
                    gifts.clone(),
                    issuer.clone(),
                    redeem,
                )
                .run(&args.options)
                .await?
            }
            Job::MigrateGiftCards => {
                MigrateGiftCardsJob::new(
                    provider.clone(),
                    cache.clone(),
                    engine.clone(),
                    issuer.clone(),
                )
                .run(&args.options)
                .await?
            }
        };
        clean &= report.is_clean();
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(clean)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}\n\n{}", err, USAGE);
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::warn!("Some records failed; see the reports above");
            ExitCode::from(1)
        }
        Err(err) => {
            tracing::error!(error = %err, "Reconciliation aborted");
            ExitCode::FAILURE
        }
    }
}
