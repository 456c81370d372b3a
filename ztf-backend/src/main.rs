//! Cross-match a sky position (or look up a ZTF object) from the command
//! line and print the results as JSON.
//!
//! Usage:
//!   ztf-backend --ra 62.1713 --dec 61.3846 --radius 3
//!   ztf-backend --ra 62.1713 --dec 61.3846 --catalog vsx
//!   ztf-backend --oid 695211400003925

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::collections::BTreeMap;

use ztf_backend::config::BackendConfig;
use ztf_backend::logging::init_logging;
use ztf_backend::module::catalog::{Catalog, CatalogRegistry};
use ztf_backend::module::ztf::ZtfApi;
use ztf_common::ConeSearch;

#[derive(Parser, Debug)]
#[command(name = "ztf-backend")]
#[command(about = "Cross-match ZTF positions against variable-star catalogs")]
struct Cli {
    /// Right ascension of the cone center, degrees (ICRS).
    #[arg(long, allow_hyphen_values = true)]
    ra: Option<f64>,
    /// Declination of the cone center, degrees (ICRS).
    #[arg(long, allow_hyphen_values = true)]
    dec: Option<f64>,
    /// Cone radius, arcseconds.
    #[arg(long, default_value_t = 1.0)]
    radius: f64,
    /// Catalog to query: simbad, gcvs, vsx, ogle, or "all".
    #[arg(long, default_value = "all")]
    catalog: String,
    /// Look up one ZTF object by OID instead of cone searching.
    #[arg(long)]
    oid: Option<u64>,
    /// ZTF database API version.
    #[arg(long, default_value = "v1")]
    api_version: String,
    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BackendConfig::from_file(path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => BackendConfig::default(),
    };
    let _logging_guard = init_logging("logs", "ztf-backend", &config.log_level);

    if let Some(oid) = cli.oid {
        let api = ZtfApi::new(&config);
        match api.find_oid(oid, &cli.api_version).await {
            Some(object) => println!("{}", serde_json::to_string_pretty(&object)?),
            None => println!("{}", json!({ "oid": oid, "found": false })),
        }
        return Ok(());
    }

    let (Some(ra), Some(dec)) = (cli.ra, cli.dec) else {
        anyhow::bail!("either --oid or both --ra and --dec are required");
    };
    let query = ConeSearch::new(ra, dec, cli.radius)?;

    let catalogs: Vec<Catalog> = if cli.catalog.eq_ignore_ascii_case("all") {
        Catalog::ALL.to_vec()
    } else {
        // an unknown catalog name is the one hard input error
        vec![cli.catalog.parse()?]
    };

    let registry = CatalogRegistry::new(&config);
    let mut results = BTreeMap::new();
    for catalog in catalogs {
        let records = registry.find(catalog, &query).await;
        results.insert(catalog.name(), records);
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
