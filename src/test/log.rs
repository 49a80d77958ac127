use std::env;

use tracing::Level;

use tracing_subscriber::FmtSubscriber;

/// Install a global `tracing` subscriber if `RUST_LOG` holds a valid level
pub fn init_logger() {
    if let Some(level) = env::var("RUST_LOG")
        .ok()
        .and_then(|x| x.parse::<Level>().ok())
    {
        let subscriber =
            FmtSubscriber::builder().with_max_level(level).finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
