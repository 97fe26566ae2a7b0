use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "balancer-cli")]
#[command(about = "Management CLI for the balancer admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:9091")]
    url: String,

    /// Bearer token, if the admin API requires one.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check balancer status
    Status,
    /// List backends and their health
    Backends,
    /// Add a backend, e.g. `add localhost:8081`
    Add { address: String },
    /// Remove a backend
    Remove { address: String },
    /// Probe every backend now
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))?,
        );
    }

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Backends => client.get(format!("{}/admin/backends", cli.url)),
        Commands::Add { address } => client
            .post(format!("{}/admin/backends", cli.url))
            .json(&json!({ "address": address })),
        Commands::Remove { address } => {
            client.delete(format!("{}/admin/backends/{}", cli.url, address))
        }
        Commands::Check => client.post(format!("{}/admin/health-check", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    // 404 on remove still carries a JSON outcome worth showing.
    if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
