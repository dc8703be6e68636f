use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use account_service::client::{Client, ClientError, HttpTransport, RpcTransport, Transport};
use account_service::config::{load_config, ServiceConfig};
use account_service::domain::{User, UserService};

#[derive(Parser)]
#[command(name = "account-cli")]
#[command(about = "Client for the account service", long_about = None)]
struct Cli {
    /// Path to a TOML config file; its [client] section supplies defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = TransportKind::Rpc)]
    transport: TransportKind,

    /// HTTP API base URL.
    #[arg(long)]
    http: Option<String>,

    /// RPC API address.
    #[arg(long)]
    rpc: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportKind {
    Http,
    Rpc,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a user by ID and print the username
    Find { user_id: String },
    /// Create a user and print the assigned ID
    Create { username: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(http) = cli.http {
        config.client.http_base_url = http;
    }
    if let Some(rpc) = cli.rpc {
        config.client.rpc_address = rpc;
    }

    let timeout = config.client.timeout();
    let outcome = match cli.transport {
        TransportKind::Http => {
            let transport = HttpTransport::new(config.client.http_base_url.as_str(), timeout)?;
            run(Client::new(transport, &config.circuit_breaker), cli.command).await
        }
        TransportKind::Rpc => {
            let transport = RpcTransport::new(config.client.rpc_address.as_str(), timeout);
            run(Client::new(transport, &config.circuit_breaker), cli.command).await
        }
    };

    match outcome {
        Ok(line) => {
            println!("{line}");
            Ok(())
        }
        Err(ClientError::Service(e)) => {
            eprintln!("Error: {} ({})", e.message(), e.code());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run<T: Transport>(client: Client<T>, command: Commands) -> Result<String, ClientError> {
    match command {
        Commands::Find { user_id } => {
            let user = client.find_user_by_id(&user_id).await?;
            Ok(user.username)
        }
        Commands::Create { username } => {
            let mut user = User::new(username);
            client.create_user(&mut user).await?;
            Ok(user.id)
        }
    }
}
