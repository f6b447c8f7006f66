use anyhow::{Context, Result};
use broker_api::ApiServer;
use broker_store::{FileStore, RecordStore};
use clap::{Args, Parser, Subcommand};
use csi_broker::{load_spec_file, Broker, Catalog, ServicesRegistry};
use csi_plugin::HttpConnector;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Record file kept under the data directory.
const STORE_FILE: &str = "csi-general-services.json";

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let format =
            std::env::var("CSI_BROKER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

        if format.eq_ignore_ascii_case("json") {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter.clone())
                .with_target(true)
                .json()
                .flatten_event(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .compact()
                .init();
        }
    });
}

#[derive(Parser)]
#[command(name = "csibrokerctl")]
#[command(about = "Service broker for CSI volume plugins", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Args)]
struct ServeArgs {
    /// Address the broker API listens on
    #[arg(long, env = "CSI_BROKER_LISTEN_ADDR", default_value = "0.0.0.0:8999")]
    listen_addr: SocketAddr,
    /// Directory holding the record file
    #[arg(long, env = "CSI_BROKER_DATA_DIR")]
    data_dir: PathBuf,
    /// Service specification (JSON, or YAML for .yml/.yaml)
    #[arg(long, env = "CSI_BROKER_SERVICE_SPEC")]
    service_spec: PathBuf,
    /// Per-request timeout for plugin calls
    #[arg(long, env = "CSI_BROKER_PLUGIN_TIMEOUT_SECS", default_value_t = 30)]
    plugin_timeout_secs: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker API
    Serve(ServeArgs),
    /// Validate a service specification and print its catalog
    Catalog {
        #[arg(long, env = "CSI_BROKER_SERVICE_SPEC")]
        service_spec: PathBuf,
    },
    /// List persisted instance and binding ids
    Records {
        #[arg(long, env = "CSI_BROKER_DATA_DIR")]
        data_dir: PathBuf,
    },
}

fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE)
}

fn build_registry(service_spec: &Path, timeout: Duration) -> Result<ServicesRegistry> {
    let connector = HttpConnector::new(timeout);
    ServicesRegistry::from_file(service_spec, &connector)
        .with_context(|| format!("loading service spec {}", service_spec.display()))
}

fn serve(args: ServeArgs) -> Result<()> {
    let registry = build_registry(
        &args.service_spec,
        Duration::from_secs(args.plugin_timeout_secs),
    )?;

    let path = store_path(&args.data_dir);
    info!(path = %path.display(), "opening record store");
    let broker = Broker::new(Box::new(FileStore::new(&path)), Arc::new(registry))
        .with_context(|| format!("restoring records from {}", path.display()))?;

    let server = ApiServer::new(Arc::new(broker), args.listen_addr);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { server.run().await })?;
    Ok(())
}

fn print_catalog(service_spec: &Path) -> Result<()> {
    let specs = load_spec_file(service_spec)?;
    let registry = ServicesRegistry::new(specs, &HttpConnector::default())?;
    let catalog = Catalog {
        services: registry.broker_services(),
    };
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}

fn print_records(data_dir: &Path) -> Result<()> {
    let path = store_path(data_dir);
    let store = FileStore::open(&path)?;

    let instances = store.instance_ids();
    if instances.is_empty() {
        println!("(no instances)");
    } else {
        println!("Instance\tService\tPlan");
        for id in instances {
            match store.retrieve_instance(&id) {
                Ok(record) => println!("{}\t{}\t{}", id, record.service_id, record.plan_id),
                Err(err) => println!("{}\t<error: {}>", id, err),
            }
        }
    }

    let bindings = store.binding_ids();
    if bindings.is_empty() {
        println!("(no bindings)");
    } else {
        println!("Binding\tService\tApp");
        for id in bindings {
            match store.retrieve_binding(&id) {
                Ok(record) => println!("{}\t{}\t{}", id, record.service_id, record.app_guid),
                Err(err) => println!("{}\t<error: {}>", id, err),
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args)?,
        Commands::Catalog { service_spec } => print_catalog(&service_spec)?,
        Commands::Records { data_dir } => print_records(&data_dir)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_flags_parse_with_defaults() {
        let cli = Cli::try_parse_from([
            "csibrokerctl",
            "serve",
            "--data-dir",
            "/var/lib/csibroker",
            "--service-spec",
            "/etc/csibroker/services.yml",
        ])
        .unwrap();

        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.data_dir, PathBuf::from("/var/lib/csibroker"));
        assert_eq!(args.service_spec, PathBuf::from("/etc/csibroker/services.yml"));
        assert_eq!(args.plugin_timeout_secs, 30);
        if std::env::var_os("CSI_BROKER_LISTEN_ADDR").is_none() {
            assert_eq!(args.listen_addr, "0.0.0.0:8999".parse::<SocketAddr>().unwrap());
        }
    }

    #[test]
    fn store_file_lives_in_data_dir() {
        assert_eq!(
            store_path(Path::new("/data")),
            PathBuf::from("/data/csi-general-services.json")
        );
    }

    #[test]
    fn empty_spec_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().join("services.json");
        std::fs::write(&spec, "[]").unwrap();

        let err = build_registry(&spec, Duration::from_secs(1)).err().unwrap();
        assert!(format!("{:#}", err).contains("At least one service"));
    }

    #[test]
    fn records_of_an_empty_data_dir_print() {
        let dir = tempfile::tempdir().unwrap();
        print_records(dir.path()).unwrap();
    }
}
