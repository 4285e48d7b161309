use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use tokio_bridge::bridge::{Request, RequestInterface, Response, ResponseInterface, Sanitizer};
use tokio_bridge::config::Config;
use tokio_bridge::server::{Handler, Server};

/// Demo application: `GET /` greets, everything else is a 404.
struct App;

#[async_trait]
impl Handler for App {
    async fn handle(&self, request: Request, response: &mut Response) {
        if request.is_get() && request.get_uri(true) == "/" {
            response.set_content("Hello World");
            return;
        }

        response
            .set_status_code(404, Some("Not Found"))
            .set_content("Not found");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    tokio_bridge::logging::init(&config.logging);

    info!("Starting tokio_bridge {}", tokio_bridge::VERSION);
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::new(config.server, config.upload, App)
        .with_filter(Arc::new(Sanitizer::new()));

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    server.trigger_shutdown();
    if !server.wait_for_drain(server.drain_timeout()).await {
        info!("Exiting with connections still open");
    }

    Ok(())
}
