use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tandem_cli::run().await
}
