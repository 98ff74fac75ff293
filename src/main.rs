#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glove_lib::run().await
}
