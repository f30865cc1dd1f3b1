use clap::Parser;
use dotenv::dotenv;
use postrelay::run_with_config_path;

/// Postrelay - пересылка постов Reddit в чаты Telegram
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from `.env` file into std::env (optional)
    dotenv().ok();

    let args = Args::parse();

    run_with_config_path(&args.config).await
}
