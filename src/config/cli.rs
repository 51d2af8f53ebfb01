use crate::config::toml_config::AppConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "icp-lookup")]
#[command(about = "Cache-first ICP filing lookup service", version)]
pub struct CliArgs {
    #[arg(short, long, help = "Path to the TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Override server.host")]
    pub host: Option<String>,

    #[arg(long, help = "Override server.port")]
    pub port: Option<u16>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliArgs {
    /// 讀取配置檔並套用命令列覆寫，最後驗證
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.verbose {
            config.logging.verbose = true;
        }
    }
}
