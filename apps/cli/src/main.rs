//! Granule search CLI
//!
//! Runs a granule search (or a hit count) against CMR and prints the result
//! as JSON on stdout.

mod logging;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use granule_search::{search, ParamValue, SearchConfig, SearchParams};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "granule-search", version, about = "Search the CMR granule catalog")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print matching granules as a GeoJSON FeatureCollection
    Search(QueryArgs),
    /// Print the number of matching granules
    Count(QueryArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// Search parameter as name=value; the value is parsed as JSON when possible
    #[arg(short, long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,

    /// JSON object of search parameters, applied before --param
    #[arg(long, value_name = "FILE")]
    params_file: Option<PathBuf>,

    /// Stop after this many results
    #[arg(long)]
    max_results: Option<usize>,

    /// CMR host, e.g. cmr.uat.earthdata.nasa.gov
    #[arg(long)]
    host: Option<String>,

    /// CMR provider
    #[arg(long)]
    provider: Option<String>,

    /// Configuration file (toml, yaml or json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

impl QueryArgs {
    fn load_config(&self) -> anyhow::Result<SearchConfig> {
        let mut config = SearchConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(provider) = &self.provider {
            config.provider = provider.clone();
        }
        Ok(config)
    }

    fn search_params(&self) -> anyhow::Result<SearchParams> {
        let mut params = match &self.params_file {
            Some(path) => read_params_file(path)?,
            None => SearchParams::new(),
        };
        for param in &self.params {
            let (name, value) = parse_param(param)?;
            params.insert(name, value);
        }
        Ok(params)
    }

    fn print(&self, value: &impl serde::Serialize) -> anyhow::Result<()> {
        let output = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{}", output);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level, cli.json_logs)
        .context("Failed to initialize logging")?;

    match cli.command {
        Command::Search(args) => {
            let config = args.load_config()?;
            let query = search(args.search_params()?, &config, args.max_results)
                .context("Invalid search")?;
            tracing::info!(
                subqueries = query.plan().len(),
                url = %config.search_url(),
                "Searching"
            );

            let collection = query.results().collect().await.context("Search failed")?;
            tracing::info!(results = collection.features.len(), "Search complete");
            args.print(&collection)?;
        }
        Command::Count(args) => {
            let config = args.load_config()?;
            let query = search(args.search_params()?, &config, args.max_results)
                .context("Invalid search")?;
            let count = query.count().await.context("Count failed")?;
            args.print(&count)?;
        }
    }

    Ok(())
}

fn read_params_file(path: &Path) -> anyhow::Result<SearchParams> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let json: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    SearchParams::from_json(&json)
        .with_context(|| format!("Invalid parameters in {}", path.display()))
}

/// `name=value`; the value is JSON if it parses, otherwise a plain string.
fn parse_param(param: &str) -> anyhow::Result<(String, ParamValue)> {
    let (name, raw) = param
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", param))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Missing parameter name in '{}'", param));
    }

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(json) => ParamValue::from_json(&json)
            .with_context(|| format!("Invalid value for {}", name))?,
        Err(_) => ParamValue::from(raw),
    };
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use granule_search::Scalar;

    #[test]
    fn test_parse_param_json_and_plain() {
        let (name, value) = parse_param("relativeOrbit=[10,[20,25]]").unwrap();
        assert_eq!(name, "relativeOrbit");
        assert_eq!(
            value,
            ParamValue::List(vec![ParamValue::from(10_i64), ParamValue::range(20_i64, 25_i64)])
        );

        let (_, value) = parse_param("beamMode=IW").unwrap();
        assert_eq!(value, ParamValue::Scalar(Scalar::Text("IW".into())));

        let (_, value) = parse_param("intersectsWith=point:-147.5,64.8").unwrap();
        assert_eq!(value, ParamValue::from("point:-147.5,64.8"));
    }

    #[test]
    fn test_parse_param_rejects_malformed() {
        assert!(parse_param("beamMode").is_err());
        assert!(parse_param("=IW").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "granule-search",
            "search",
            "--param",
            "platform=ALOS",
            "-p",
            "beamMode=FBS",
            "--max-results",
            "10",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.max_results, Some(10));
                let params = args.search_params().unwrap();
                assert_eq!(params.len(), 2);
                assert_eq!(params.get("platform"), Some(&ParamValue::from("ALOS")));
            }
            Command::Count(_) => panic!("expected search"),
        }
    }

    fn count_args(extra: &[&str]) -> QueryArgs {
        let mut argv = vec!["granule-search", "count"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Count(args) => args,
            Command::Search(_) => panic!("expected count"),
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("search.toml");
        std::fs::write(
            &path,
            "host = \"file.example.test\"\nprovider = \"FROM_FILE\"\npage_size = 100\n",
        )
        .unwrap();
        let config_path = path.to_str().unwrap();

        let config = count_args(&["--config", config_path]).load_config().unwrap();
        assert_eq!(config.host, "file.example.test");
        assert_eq!(config.provider, "FROM_FILE");

        let config = count_args(&[
            "--config",
            config_path,
            "--host",
            "cmr.uat.earthdata.nasa.gov",
            "--provider",
            "ASF_UAT",
        ])
        .load_config()
        .unwrap();
        assert_eq!(config.host, "cmr.uat.earthdata.nasa.gov");
        assert_eq!(config.provider, "ASF_UAT");
        assert_eq!(config.page_size, 100);
        assert_eq!(
            config.search_url(),
            "https://cmr.uat.earthdata.nasa.gov/search/granules.umm_json_v1_4"
        );
    }
}
