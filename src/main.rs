mod cli;

#[tokio::main]
async fn main() {
    fleet_push::logging::init_logging();

    let settings = match cli::run() {
        cli::RunOutcome::Serve(settings) => settings,
        cli::RunOutcome::Exit(code) => std::process::exit(code),
    };

    if let Err(err) = fleet_push::serve(settings.addr, settings.config).await {
        tracing::error!(%err, "server stopped");
        std::process::exit(1);
    }
}
