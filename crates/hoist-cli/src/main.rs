//! `hoist` binary entrypoint; all work happens in [`hoist_cli::run`].

#[tokio::main]
async fn main() {
    let code = hoist_cli::run().await;
    std::process::exit(code);
}
