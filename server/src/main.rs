use std::net::SocketAddr;

use clap::Parser;

use config_engine::resolve_bootstrap_secrets;
use logger_redacted::LoggerConfig;

#[derive(Parser, Debug)]
#[command(name = "polykey-server")]
struct Cli {
    /// Path to the YAML service config.
    #[arg(long, env = "POLYKEY_CONFIG_PATH", default_value = "config/service.yaml")]
    config_path: String,

    /// Path to the YAML client credential file.
    #[arg(long, env = "POLYKEY_CLIENT_CREDENTIALS_PATH", default_value = "config/clients.yaml")]
    client_credentials_path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logger_redacted::init(&LoggerConfig::default())?;

    let cli = Cli::parse();

    let mut config = config_engine::load_and_validate(&cli.config_path)?;
    resolve_bootstrap_secrets(&mut config.bootstrap_secrets)?;

    let master_key_b64 = config
        .bootstrap_secrets
        .master_key_b64
        .clone()
        .ok_or_else(|| anyhow::anyhow!("POLYKEY_MASTER_KEY_B64 was not resolved"))?;
    let jwt_rsa_private_key_pem = config
        .bootstrap_secrets
        .jwt_rsa_private_key_pem
        .clone()
        .ok_or_else(|| anyhow::anyhow!("POLYKEY_JWT_RSA_PRIVATE_KEY_PEM was not resolved"))?;
    let db_url = config
        .bootstrap_secrets
        .db_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("POLYKEY_DB_URL was not resolved"))?;

    let client_credentials_yaml = std::fs::read_to_string(&cli.client_credentials_path)?;

    let composition = server::composition::build(
        &config,
        &master_key_b64,
        &jwt_rsa_private_key_pem,
        &db_url,
        &client_credentials_yaml,
    )
    .await?;

    let addr: SocketAddr = ([0, 0, 0, 0], config.server.port).into();
    server::serve(addr, composition).await
}
