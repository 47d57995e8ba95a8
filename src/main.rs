use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use salat_api::{direction_name, distance, Coordinates, LocationQuery, PrayerClient, KAABA};

#[derive(Parser)]
#[command(name = "salat", version, about = "Prayer times and qibla direction")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prayer times for a day
    Times {
        #[command(flatten)]
        location: LocationArgs,
        /// Calculation method (defaults to the configured one)
        #[arg(long)]
        method: Option<String>,
        /// Date as DD-MM-YYYY (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Qibla bearing
    Qibla {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// List the remote calculation method catalog
    Methods,
    /// Great-circle distance in km, to the Kaaba unless another point is given
    Distance {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true, requires = "to_lon")]
        to_lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "to_lat")]
        to_lon: Option<f64>,
    },
    /// Compass label for a bearing in degrees
    Direction {
        #[arg(allow_hyphen_values = true)]
        degrees: f64,
    },
}

#[derive(Args)]
struct LocationArgs {
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    country: Option<String>,
}

impl From<LocationArgs> for LocationQuery {
    fn from(args: LocationArgs) -> Self {
        LocationQuery {
            latitude: args.lat,
            longitude: args.lon,
            city: args.city,
            country: args.country,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    salat_core::init()?;
    let cli = Cli::parse();

    let (config, _) = salat_core::Config::load_validated()?;
    let client = PrayerClient::builder()
        .base_url(&config.api.base_url)
        .timeout(config.api.timeout())
        .max_redirects(config.api.max_redirects)
        .cache_ttl(config.cache.ttl())
        .build()
        .context("Failed to create prayer times client")?;

    match cli.command {
        Command::Times {
            location,
            method,
            date,
        } => {
            let method = method.unwrap_or(config.defaults.method);
            let times = client
                .get_prayer_times(&location.into(), &method, date.as_deref())
                .await?;
            println!("Fajr     {}", times.fajr);
            println!("Sunrise  {}", times.sunrise);
            println!("Dhuhr    {}", times.dhuhr);
            println!("Asr      {}", times.asr);
            println!("Maghrib  {}", times.maghrib);
            println!("Isha     {}", times.isha);
            println!(
                "\n{} ({}), {:.4}, {:.4}",
                times.meta.timezone,
                times.meta.method,
                times.meta.location.latitude,
                times.meta.location.longitude
            );
        }
        Command::Qibla { location } => {
            let qibla = client.get_qibla_direction(&location.into()).await?;
            let from = Coordinates {
                latitude: qibla.latitude,
                longitude: qibla.longitude,
            };
            println!(
                "{:.2}° {} ({} km to the Kaaba)",
                qibla.direction,
                direction_name(qibla.direction)?,
                distance(from, KAABA)?
            );
        }
        Command::Methods => {
            let methods = client.get_methods().await?;
            println!("{}", serde_json::to_string_pretty(&methods)?);
        }
        Command::Distance {
            lat,
            lon,
            to_lat,
            to_lon,
        } => {
            let from = Coordinates {
                latitude: lat,
                longitude: lon,
            };
            let to = match (to_lat, to_lon) {
                (Some(latitude), Some(longitude)) => Coordinates {
                    latitude,
                    longitude,
                },
                _ => KAABA,
            };
            println!("{} km", distance(from, to)?);
        }
        Command::Direction { degrees } => {
            println!("{}", direction_name(degrees)?);
        }
    }

    tracing::debug!(stats = ?client.get_cache_stats(), "Done");
    Ok(())
}
