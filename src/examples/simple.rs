//! Simple example of using proxy-pilot.

use proxy_pilot::{ProxyPool, ProxyPoolConfig, ProxyPoolMiddleware, SelectionStrategy};
use reqwest_middleware::ClientBuilder;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Starting proxy pool...");

    let config = ProxyPoolConfig::builder()
        .validation_timeout(Duration::from_secs(5))
        .validation_url("http://httpbin.org/ip")
        .validation_concurrency(20)
        .selection_strategy(SelectionStrategy::Weighted)
        .retry_count(2)
        // rate limit for each proxy, lower performance but avoid banned
        .max_requests_per_second(3.0)
        .build();

    let pool = ProxyPool::builder()
        .config(config)
        // free proxy lists, one `host:port` or `scheme://host:port` per line
        .http_source("https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.txt")
        .http_source("https://cdn.jsdelivr.net/gh/dpangestuw/Free-Proxy@main/socks5_proxies.txt")
        .build()?;
    pool.start().await?;

    let client = ClientBuilder::new(reqwest::Client::new())
        .with(ProxyPoolMiddleware::new(pool.clone()))
        .build();

    println!("Sending request...");
    let response = client.get("https://httpbin.org/ip").send().await?;

    println!("Status: {}", response.status());
    println!("Response: {}", response.text().await?);

    let snapshot = pool.snapshot();
    println!(
        "Pool: {} total, {} available, {} validations ({:.0}% ok)",
        snapshot.total_count,
        snapshot.available_count,
        snapshot.total_validations,
        snapshot.overall_success_rate * 100.0
    );

    pool.stop().await;
    Ok(())
}
