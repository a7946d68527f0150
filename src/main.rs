#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = focusroom::run().await {
        log::error!("focusroom failed: {error}");
        std::process::exit(1);
    }
}
