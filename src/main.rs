use clap::Parser;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use sqlx::postgres::PgPoolOptions;

mod models;
mod repositories;
pub mod services;
pub mod settings;

#[derive(Parser)]
#[command(name = "linkgold", about = "LinkGold reward platform server")]
struct Args {
    #[arg(long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log_config: String,
}

fn init_logging(path: &str) {
    if log4rs::init_file(path, Default::default()).is_ok() {
        return;
    }

    // No log file config: log to the console.
    let stdout = ConsoleAppender::builder().build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(log::LevelFilter::Info))
        .expect("Could not build fallback logger.");
    log4rs::init_config(config).expect("Could not initialize logger.");
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_config);

    let config = settings::Settings::from_file(&args.config).expect("Could not load config file.");
    let conn = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.postgres.url)
        .await
        .expect("Could not connect to database.");

    println!("[*] Starting services.");
    services::start_services(conn, config)
        .await
        .expect("Could not start services.");
}
