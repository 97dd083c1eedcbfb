use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use clap::Parser;
use dotenvy::dotenv;

use myturn_notifier::cli::{Cli, Command, PlaceArgs, WatchArgs};
use myturn_notifier::config::Config;
use myturn_notifier::discovery::{
    AppointmentProvider, Coordinates, DiscoveryEngine, MyTurnProvider,
};
use myturn_notifier::error::AppError;
use myturn_notifier::geo::ZipTable;
use myturn_notifier::logging::init_logging;
use myturn_notifier::notifier::message::{format_appointments, format_locations};
use myturn_notifier::notifier::{
    ChannelSink, NotificationRequest, PollingDriver, Supervisor, SupervisorConfig,
};
use myturn_notifier::services::myturn::MyTurnClient;
use myturn_notifier::time::{Clock, SystemClock};

/// How often the watch loop checks whether its request is still alive.
const WATCH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let mut config = Config::from_env()
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });
    config.apply_cli(&cli);

    tracing::info!("Service started with config: {:?}", redacted(&config));

    if let Err(err) = run(cli.command, config).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: Config) -> Result<(), AppError> {
    let place = match &command {
        Command::Locations(place) | Command::Appointments(place) => place,
        Command::Watch(args) => &args.place,
    };
    let coordinates = resolve_place(place, &config)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = MyTurnClient::new(&config.base_url, config.api_key(), config.retry_policy())?;
    // Ineligible here means the questionnaire payload is stale: fail fast.
    let provider = Arc::new(MyTurnProvider::connect(client, clock.clone()).await?);

    match command {
        Command::Locations(_) => {
            let locations = provider
                .get_locations(coordinates.latitude, coordinates.longitude)
                .await?;
            println!("{}", format_locations(&locations));
        }
        Command::Appointments(_) => {
            let engine = DiscoveryEngine::new(provider);
            let start = clock.today();
            let end = start + ChronoDuration::weeks(1);
            let appointments = engine
                .get_appointments(coordinates.latitude, coordinates.longitude, start, end)
                .await?;
            println!("{}", format_appointments(start, end, &appointments));
        }
        Command::Watch(args) => watch(args, coordinates, provider, clock, &config).await?,
    }

    Ok(())
}

async fn watch(
    args: WatchArgs,
    coordinates: Coordinates,
    provider: Arc<MyTurnProvider>,
    clock: Arc<dyn Clock>,
    config: &Config,
) -> Result<(), AppError> {
    let driver = PollingDriver::new(DiscoveryEngine::new(provider), clock, config.poll_interval());
    let (sink, mut deliveries) = ChannelSink::channel();
    let supervisor = Supervisor::new(
        Arc::new(driver),
        Arc::new(sink),
        SupervisorConfig {
            max_restarts: config.max_restarts,
            ..SupervisorConfig::default()
        },
    );

    let request = NotificationRequest {
        user_id: args.user_id,
        channel_id: args.channel_id,
        zip_code: args.place.zip.clone().unwrap_or_default(),
        coordinates,
    };
    supervisor
        .start(request)
        .await
        .map_err(|err| AppError::Validation(err.to_string()))?;

    let mut check = tokio::time::interval(WATCH_CHECK_INTERVAL);
    let outcome = loop {
        tokio::select! {
            delivery = deliveries.recv() => {
                if let Some(delivery) = delivery {
                    println!("{}", delivery.message);
                }
                break Ok(());
            }
            _ = check.tick() => {
                if let Ok(delivery) = deliveries.try_recv() {
                    println!("{}", delivery.message);
                    break Ok(());
                }
                if let Some((_, outcome)) = supervisor.reap().await.into_iter().next() {
                    // A delivery may have landed after the drain above.
                    if let Ok(delivery) = deliveries.try_recv() {
                        println!("{}", delivery.message);
                    }
                    break match outcome.failure_reason() {
                        Some(reason) => Err(AppError::Network(reason.to_string())),
                        None => Ok(()),
                    };
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received. Stopping watch.");
                break Ok(());
            }
        }
    };

    supervisor.shutdown().await;
    outcome
}

fn resolve_place(place: &PlaceArgs, config: &Config) -> Result<Coordinates, AppError> {
    if let (Some(lat), Some(lng)) = (place.lat, place.lng) {
        return Ok(Coordinates::new(lat, lng));
    }

    let zip = place
        .zip
        .as_deref()
        .ok_or_else(|| AppError::Validation("either --zip or --lat/--lng is required".to_string()))?;
    let path = config.zip_table_path.as_deref().ok_or_else(|| {
        AppError::Config("--zip needs a zip table (--zip-table or ZIP_TABLE_PATH)".to_string())
    })?;

    Ok(ZipTable::from_csv(path)?.resolve(zip)?)
}

/// Config as logged: never print the API key.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some("<redacted>".to_string());
    }
    config
}
