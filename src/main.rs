#[tokio::main]
async fn main() {
    if let Err(e) = cropdoc::run().await {
        tracing::error!("{e}");
        eprintln!("cropdoc: {e}");
        std::process::exit(1);
    }
}
