use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Compact subscriber on stderr so `--format json|lrc` output stays clean on stdout.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
        // Filter out noisy dependencies (these parse strings are static and known-valid)
        .add_directive("reqwest=warn".parse().expect("valid directive for reqwest"))
        .add_directive("redis=warn".parse().expect("valid directive for redis"))
        .add_directive("html5ever=warn".parse().expect("valid directive for html5ever"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}
