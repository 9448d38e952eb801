use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = portmux::cli::Cli::parse();
    if let Err(e) = portmux::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
