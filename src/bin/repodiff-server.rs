//! Optional HTTP server binary, built only when the `http` feature is
//! enabled.

#[cfg(feature = "http")]
#[tokio::main]
async fn main() {
    repodiff::cli::init_logging();

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    if let Err(e) = repodiff::http::serve(addr).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "http"))]
fn main() {
    eprintln!("repodiff-server requires the `http` feature: rebuild with --features http");
    std::process::exit(1);
}
