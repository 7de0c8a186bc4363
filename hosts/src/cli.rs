//! CLI module for consul-hosts
//!
//! Command-line flags, each with a `CONSUL_HOSTS_*` environment fallback.

use clap::Parser;
use consul_hosts_common::config::HostsConfig;
use consul_hosts_common::error::CommonError;

/// consul-hosts - Serve Consul catalog endpoints as plain text
#[derive(Parser, Debug, Clone)]
#[command(name = "consul-hosts")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file (JSON)
    #[arg(short, long, default_value = "./local.json", env = "CONSUL_HOSTS_CONFIG")]
    pub config: String,

    /// Consul source (host:port)
    #[arg(short = 's', long, env = "CONSUL_HOSTS_CONSUL")]
    pub consul: Option<String>,

    /// Consul uses TLS
    #[arg(short, long, default_value_t = false, env = "CONSUL_HOSTS_TLS")]
    pub tls: bool,

    /// Log level or filter directive
    #[arg(long, default_value = "info", env = "CONSUL_HOSTS_LOG_LEVEL")]
    pub log_level: String,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut HostsConfig) -> Result<(), CommonError> {
        if self.tls {
            config.catalog_tls = true;
        }
        if let Some(source) = &self.consul {
            config.apply_catalog_source(source)?;
        }
        Ok(())
    }
}
