use clap::{Arg, Command};
use color_eyre::Result;

use mediashare_autoskip::app::App;
use mediashare_autoskip::config::{Config, DEFAULT_CONFIG_PATHS};
use mediashare_autoskip::{logging, Error};

fn cli() -> Command {
    Command::new("mediashare-autoskip")
        .about("Skips StreamElements mediashare songs through twitch chat and keeps a local player in sync")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Settings file, defaults to config.yml or config.yaml when present"),
        )
        .arg(
            Arg::new("credentials")
                .long("credentials")
                .value_name("PATH")
                .help("File holding the StreamElements JWT and twitch tokens"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    logging::init();

    let matches = cli().get_matches();

    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load(path),
        None => Config::load_with_fallback(DEFAULT_CONFIG_PATHS),
    }
    .map_err(Error::into_report)?;

    let config = match matches.get_one::<String>("credentials") {
        Some(path) => config.with_credentials_path(path),
        None => config,
    };

    App::new(config).run().await.map_err(Error::into_report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn credentials_override() {
        let matches = cli().get_matches_from(["mediashare-autoskip", "--credentials", "tokens.yml"]);
        assert_eq!(matches.get_one::<String>("credentials").map(String::as_str), Some("tokens.yml"));
        assert!(matches.get_one::<String>("config").is_none());
    }
}
