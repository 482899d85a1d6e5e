use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::Text;
use weather_core::{
    ClientConfig, FetchOutcome, HttpProxyClient, WeatherStore,
    location::{FixedLocation, LocationProvider, UnavailableLocation},
    model::Coordinates,
    persist::FileStorage,
};

use crate::render;

type Store = WeatherStore<HttpProxyClient, FileStorage>;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    /// Proxy API root, overriding the configured one.
    #[arg(long, global = true)]
    pub proxy_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the proxy address and the fallback city.
    Configure,

    /// Show current weather and the daily forecast for a city.
    ///
    /// Without a city, the last shown city (or the configured default) is used.
    Show {
        city: Option<String>,
    },

    /// Show weather for a position.
    Here {
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
    },

    /// Manage favorite cities.
    Favorites {
        #[command(subcommand)]
        action: FavoritesCommand,
    },

    /// Check whether the proxy knows a city.
    Validate {
        city: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    /// List favorites, newest first.
    List,
    /// Add a city after checking that it exists.
    Add { city: String },
    /// Remove a city.
    Remove { city: String },
    /// Show weather for a favorite and make it the current city.
    Show { city: String },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = ClientConfig::load()?;
        if let Some(url) = self.proxy_url {
            config.proxy_url = url;
        }

        match self.command {
            Command::Configure => configure(config),
            Command::Show { city } => {
                let store = open_store(&config)?;
                let city = city
                    .or_else(|| Some(store.current_city()).filter(|c| !c.is_empty()))
                    .or_else(|| config.default_city.clone())
                    .context("No city given and no default city configured (run `weather configure`)")?;

                let outcome = store.fetch_by_city(&city).await;
                finish(&store, &config, outcome).await
            }
            Command::Here { lat, lon } => {
                let store = open_store(&config)?;
                let location: Box<dyn LocationProvider> = match (lat, lon) {
                    (Some(lat), Some(lon)) => Box::new(FixedLocation(Coordinates { lat, lon })),
                    _ => Box::new(UnavailableLocation {
                        reason: "no --lat/--lon given".to_string(),
                    }),
                };

                let outcome = store.fetch_for_location(location.as_ref()).await;
                finish(&store, &config, outcome).await
            }
            Command::Favorites { action } => {
                let store = open_store(&config)?;
                favorites(&store, &config, action).await
            }
            Command::Validate { city } => {
                let store = open_store(&config)?;
                if store.validate_city(&city).await {
                    println!("{city}: found");
                    Ok(())
                } else {
                    bail!("{city}: not found")
                }
            }
        }
    }
}

fn open_store(config: &ClientConfig) -> Result<Store> {
    let api = HttpProxyClient::new(&config.proxy_url)
        .with_context(|| format!("Invalid proxy URL: {}", config.proxy_url))?;
    let storage = FileStorage::default_location()?;

    tracing::debug!(proxy = %config.proxy_url, state = %storage.path().display(), "opening store");
    Ok(WeatherStore::new(api, storage))
}

fn configure(mut config: ClientConfig) -> Result<()> {
    config.proxy_url = Text::new("Proxy URL:")
        .with_default(&config.proxy_url)
        .prompt()
        .context("Failed to read proxy URL")?;

    let default_city = Text::new("Default city (blank for none):")
        .with_initial_value(config.default_city.as_deref().unwrap_or_default())
        .prompt()
        .context("Failed to read default city")?;
    config.set_default_city(&default_city);

    config.save()?;
    println!("Saved to {}", ClientConfig::config_file_path()?.display());
    Ok(())
}

/// Print the result of a lookup. A failed lookup reports its error, then
/// falls back to the configured default city if there is one.
async fn finish(store: &Store, config: &ClientConfig, outcome: FetchOutcome) -> Result<()> {
    if outcome != FetchOutcome::Committed {
        let state = store.snapshot();
        let message = state.error.unwrap_or_else(|| "Lookup failed.".to_string());

        let Some(default_city) = config.default_city.as_deref() else {
            bail!(message);
        };

        eprintln!("{message}");
        eprintln!("Showing {default_city} instead.");

        store.set_error(None);
        if store.fetch_by_city(default_city).await != FetchOutcome::Committed {
            let message = store.snapshot().error.unwrap_or_else(|| "Lookup failed.".to_string());
            bail!(message);
        }
    }

    let state = store.snapshot();
    if let Some(weather) = &state.weather {
        println!("{}", render::weather(&state.current_city, weather));
    }
    if !state.forecast.is_empty() {
        println!();
        println!("{}", render::forecast(&state.forecast));
    }
    Ok(())
}

fn city_name(input: &str) -> Result<&str> {
    let city = input.trim();
    if city.is_empty() {
        bail!("Please enter a city name.");
    }
    Ok(city)
}

async fn favorites(store: &Store, config: &ClientConfig, action: FavoritesCommand) -> Result<()> {
    match action {
        FavoritesCommand::List => {
            let cities = store.favorite_cities();
            if cities.is_empty() {
                println!("No favorite cities yet.");
            }
            for city in cities {
                println!("{city}");
            }
        }
        FavoritesCommand::Add { city } => {
            let city = city_name(&city)?;
            if !store.validate_city(city).await {
                bail!("City not found. Please try another.");
            }
            store.add_favorite_city(city);
            println!("Added {city}");
        }
        FavoritesCommand::Remove { city } => {
            let city = city_name(&city)?;
            if !store.remove_favorite_city(city) {
                bail!("{city} is not a favorite city.");
            }
            println!("Removed {city}");
        }
        FavoritesCommand::Show { city } => {
            let city = city_name(&city)?;
            if !store.favorite_cities().iter().any(|c| c == city) {
                bail!("{city} is not a favorite city.");
            }
            let outcome = store.set_current_city(city).await;
            finish(store, config, outcome).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_city_is_optional() {
        let cli = Cli::try_parse_from(["weather", "show"]).unwrap();
        assert!(matches!(cli.command, Command::Show { city: None }));

        let cli = Cli::try_parse_from(["weather", "show", "New York"]).unwrap();
        assert!(matches!(cli.command, Command::Show { city: Some(ref c) } if c == "New York"));
    }

    #[test]
    fn here_takes_negative_coordinates() {
        let cli = Cli::try_parse_from(["weather", "here", "--lat", "-33.9", "--lon", "18.4"]).unwrap();
        assert!(matches!(cli.command, Command::Here { lat: Some(lat), lon: Some(_) } if lat < 0.0));
    }

    #[test]
    fn here_needs_both_coordinates_or_neither() {
        assert!(Cli::try_parse_from(["weather", "here", "--lat", "1"]).is_err());
        assert!(Cli::try_parse_from(["weather", "here"]).is_ok());
    }

    #[test]
    fn proxy_url_is_global() {
        let cli =
            Cli::try_parse_from(["weather", "favorites", "list", "--proxy-url", "http://h:1/api"])
                .unwrap();
        assert_eq!(cli.proxy_url.as_deref(), Some("http://h:1/api"));
        assert!(matches!(cli.command, Command::Favorites { action: FavoritesCommand::List }));
    }

    #[test]
    fn city_name_is_trimmed_and_required() {
        assert_eq!(city_name("  Oslo \t").unwrap(), "Oslo");
        assert!(city_name("   ").is_err());
    }

    #[test]
    fn favorites_show_takes_a_city() {
        let cli = Cli::try_parse_from(["weather", "favorites", "show", "Lima"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Favorites { action: FavoritesCommand::Show { ref city } } if city == "Lima"
        ));
    }
}
