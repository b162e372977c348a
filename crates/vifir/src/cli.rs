//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Forensic collection from a virtualization management endpoint.
#[derive(Debug, Parser)]
#[command(name = "vifir", version, about, max_term_width = 100)]
pub struct Cli {
    /// Config file path (default: the platform config directory).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to use from the config file.
    #[arg(long, short = 'p', global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Endpoint origin, e.g. https://vc.example.org (overrides the profile).
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Username for password authentication (overrides the profile).
    #[arg(long, short = 'u', global = true, value_name = "NAME")]
    pub username: Option<String>,

    /// Accept self-signed certificates.
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// HTTP proxy for every request, downloads included.
    #[arg(long, global = true, value_name = "URL")]
    pub proxy: Option<String>,

    /// Directory collected artifacts are written into.
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in, show the deployment identity, and verify clock sync.
    Check,

    /// List all managed hosts.
    Hosts,

    /// List all datacenters.
    Datacenters,

    /// Collect the audit/event history into a CSV report.
    Events {
        /// Restrict collection to the security/audit-relevant
        /// event-type allow-list.
        #[arg(long)]
        light: bool,

        /// Datacenter id(s) to collect from; repeatable. Without this
        /// the whole inventory is collected in one pass.
        #[arg(long = "datacenter", value_name = "ID")]
        datacenters: Vec<String>,
    },

    /// Generate and download diagnostic bundles.
    Bundle {
        /// Host id(s) to generate bundles for; repeatable. Without
        /// this every discovered host is included. Ignored when the
        /// endpoint is a single managed node.
        #[arg(long = "host", value_name = "ID")]
        hosts: Vec<String>,
    },
}
