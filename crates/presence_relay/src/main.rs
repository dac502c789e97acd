//! Binary entry point for the presence relay.
//!
//! All real work happens in the library's `init` function so that the
//! startup path stays testable.

#[tokio::main]
async fn main() {
    if let Err(e) = lib_presence_relay::init().await {
        eprintln!("❌ Fatal error: {e}");
        std::process::exit(1);
    }
}
