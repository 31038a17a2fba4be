use clap::Parser;

/// Scrape a fantasy league's roster and transfer market into JSON snapshots
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Use pretty formatter (default in debug mode)
    Pretty,
    /// Use JSON formatter (default in release mode)
    Json,
}

const fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::parse_from(["biwenger-scraper", "--tracing", "json", "--headed"]);
        assert_eq!(args.tracing, TracingFormat::Json);
        assert!(args.headed);
    }

    #[test]
    fn headless_by_default() {
        let args = Args::parse_from(["biwenger-scraper"]);
        assert!(!args.headed);
    }
}
