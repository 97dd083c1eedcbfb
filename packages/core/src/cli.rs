use clap::{Args, Parser, Subcommand};

/// MyTurn appointment notifier CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "myturn-notifier",
    version,
    about = "Find COVID-19 vaccination appointments in California and get notified when they open up"
)]
pub struct Cli {
    /// MyTurn API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Seconds between polls while watching
    #[arg(long, global = true)]
    pub poll_interval: Option<u64>,

    /// CSV file with zip,latitude,longitude,state_code rows
    #[arg(long, global = true)]
    pub zip_table: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List vaccination locations near a place
    Locations(PlaceArgs),

    /// List how many appointments are available within the next week
    Appointments(PlaceArgs),

    /// Wait until appointments become available within the next week
    Watch(WatchArgs),
}

/// Where to search: a zip code or explicit coordinates.
#[derive(Debug, Clone, Args)]
pub struct PlaceArgs {
    /// California zip code (needs a zip table)
    #[arg(long, conflicts_with_all = ["lat", "lng"], required_unless_present_all = ["lat", "lng"])]
    pub zip: Option<String>,

    /// Latitude
    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub place: PlaceArgs,

    /// Identity to address the notification to
    #[arg(long, default_value_t = 0)]
    pub user_id: u64,

    /// Channel the request came from
    #[arg(long, default_value_t = 0)]
    pub channel_id: u64,
}
