use habit_app::app::{run, AppConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let config = AppConfig::from_env().unwrap_or_default();
    match run(config).await {
        Ok(pending) => println!("{pending}"),
        Err(err) => eprintln!("Failed to sync habit reminders: {err:#}"),
    }
}
