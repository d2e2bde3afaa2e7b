#[tokio::main]
async fn main() -> anyhow::Result<()> {
    finder_server::start().await
}
