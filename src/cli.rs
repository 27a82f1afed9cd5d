//! Command-line argument parsing for text2data.

use std::io::Read;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use crate::config::{Config, RemoteOverrides};
use crate::error::{BridgeError, Result};
use crate::tool::InvocationRequest;

/// Resolve a caller's identity from their own database and ask the
/// conversational-analytics service on their behalf.
#[derive(Parser, Debug)]
#[command(name = "text2data")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Remote service base URL
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Remote service access token
    #[arg(long, global = true, value_name = "TOKEN")]
    pub access_token: Option<String>,

    /// Write logs to a file instead of stderr (default location when no path is given)
    #[arg(long, global = true, value_name = "PATH", num_args = 0..=1)]
    pub log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify the remote access token
    Verify {
        /// Store the token in the OS keyring after a successful check
        #[arg(long)]
        save: bool,
    },

    /// Run one invocation and print its messages as JSON lines
    Invoke(InvokeArgs),

    /// Delete the stored access token for the base URL
    Logout,
}

/// Invocation fields. Flags override fields read from `--input`.
#[derive(Args, Debug, Default)]
pub struct InvokeArgs {
    /// JSON request file, or `-` for stdin
    #[arg(long, short = 'i', value_name = "FILE")]
    pub input: Option<String>,

    /// Assistant (agent) name on the remote service
    #[arg(long, value_name = "NAME")]
    pub assistant_name: Option<String>,

    /// Natural-language query
    #[arg(long, value_name = "TEXT")]
    pub query: Option<String>,

    /// Database engine (mysql, postgres, sqlserver)
    #[arg(long, value_name = "ENGINE")]
    pub db_type: Option<String>,

    #[arg(long, value_name = "HOST")]
    pub db_host: Option<String>,

    #[arg(long, value_name = "PORT")]
    pub db_port: Option<String>,

    #[arg(long, value_name = "USER")]
    pub db_username: Option<String>,

    #[arg(long, value_name = "PASSWORD", env = "TEXT2DATA_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long, value_name = "DATABASE")]
    pub db_name: Option<String>,

    /// Extra connection properties, e.g. `sslmode=require&application_name=bridge`
    #[arg(long, value_name = "PROPS")]
    pub db_properties: Option<String>,

    /// Identity query returning the user's name or email in its first column
    #[arg(long, value_name = "SQL")]
    pub query_sql: Option<String>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path (from CLI or default).
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Remote credentials given as flags.
    pub fn remote_overrides(&self) -> RemoteOverrides {
        RemoteOverrides {
            base_url: self.base_url.clone(),
            access_token: self.access_token.clone(),
        }
    }
}

impl InvokeArgs {
    /// Builds the invocation request from `--input` (if any) overlaid with flags.
    pub fn to_request(&self) -> Result<InvocationRequest> {
        let mut request = match self.input.as_deref() {
            Some(source) => InvocationRequest::from_json(&read_input(source)?)?,
            None => InvocationRequest::default(),
        };
        self.apply_to(&mut request);
        Ok(request)
    }

    fn apply_to(&self, request: &mut InvocationRequest) {
        fn set(target: &mut Option<String>, flag: &Option<String>) {
            if flag.is_some() {
                target.clone_from(flag);
            }
        }

        set(&mut request.assistant_name, &self.assistant_name);
        set(&mut request.query, &self.query);
        set(&mut request.db_type, &self.db_type);
        set(&mut request.db_host, &self.db_host);
        set(&mut request.db_username, &self.db_username);
        set(&mut request.db_password, &self.db_password);
        set(&mut request.db_name, &self.db_name);
        set(&mut request.db_properties, &self.db_properties);
        set(&mut request.query_sql, &self.query_sql);
        if let Some(port) = &self.db_port {
            request.db_port = Some(Value::String(port.clone()));
        }
    }
}

fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| BridgeError::config(format!("Failed to read request from stdin: {e}")))?;
        return Ok(buf);
    }

    std::fs::read_to_string(source)
        .map_err(|e| BridgeError::config(format!("Failed to read request file '{source}': {e}")))
}
