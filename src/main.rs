#[tokio::main]
async fn main() {
    reverie::server::run().await;
}
