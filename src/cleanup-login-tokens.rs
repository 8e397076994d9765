//! Maintenance tool that deletes old login tokens.
//!
//! Reads the same configuration as the server, so it can be run against the
//! production database with the server's environment.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mongodb::Client;
use rocket::figment::Error as FigmentError;
use thiserror::Error;

use evote_backend::{
    config::{DbConfig, DATABASE_NAME},
    error::Error as LedgerError,
    model::login::{CleanupReport, TokenAuthority, DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS},
};

const PROGRAM_NAME: &str = "cleanup-login-tokens";

const ABOUT_TEXT: &str = "Delete login tokens that have expired or been used.

Only tokens created more than the given number of days ago are removed.

EXIT CODES:
     0: Cleanup succeeded (or nothing to do).
 Other: Error.";

const DAYS: &str = "DAYS";
const DRY_RUN: &str = "DRY_RUN";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DAYS)
                .long("days")
                .help("Only delete tokens created more than this many days ago")
                .value_parser(value_parser!(u32).range(..=MAX_RETENTION_DAYS))
                .default_value("7")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(DRY_RUN)
                .long("dry-run")
                .help("Show what would be deleted without deleting anything")
                .action(ArgAction::SetTrue),
        )
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Options {
    days: i64,
    dry_run: bool,
}

impl Options {
    fn from_matches(args: &ArgMatches) -> Self {
        Self {
            days: args
                .get_one::<u32>(DAYS)
                .copied()
                .map_or(DEFAULT_RETENTION_DAYS, i64::from),
            dry_run: args.get_flag(DRY_RUN),
        }
    }
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] FigmentError),
    #[error("Failed to connect to database: {0}")]
    Db(#[from] mongodb::error::Error),
    #[error("Cleanup failed: {0}")]
    Cleanup(#[from] LedgerError),
}

/// Connect to the database at `db_uri` and sweep its login tokens.
async fn sweep(db_uri: &str, hmac_secret: &str, options: Options) -> Result<CleanupReport, Error> {
    let client = Client::with_uri_str(db_uri).await?;
    let db = client.database(DATABASE_NAME);
    let authority = TokenAuthority::new(&db, hmac_secret.as_bytes());
    Ok(authority.cleanup(options.days, options.dry_run).await?)
}

async fn run(args: &ArgMatches) -> Result<CleanupReport, Error> {
    let options = Options::from_matches(args);
    let figment = rocket::Config::figment();
    let db_config: DbConfig = figment.extract()?;
    let hmac_secret: String = figment.extract_inner("hmac_secret")?;
    sweep(&db_config.db_uri, &hmac_secret, options).await
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    match run(&args).await {
        Ok(report) => print!("{report}"),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1)
        }
    }
}
