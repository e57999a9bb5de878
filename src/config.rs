use crate::{
    executor::ExecutorConfig,
    operation::OperationKind,
    panels::Panel,
    provider::NetworkId,
};
use alloy_primitives::{
    Address,
    address,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

pub const HOLESKY_CHAIN_ID: NetworkId = 17000;
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545/";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const CONFIG_DIR: &str = ".nation-panels";
const CONFIG_FILE: &str = "config.json";

const NATIONS_ADDRESS: Address = address!("0x5434a0106734EACE526432a4Bd71a799d53ad95e");
const BALLS_ADDRESS: Address = address!("0xc0B2E992c8A31455BE8542ED6aB9366217AEF5F3");
const HERO_ADDRESS: Address = address!("0xeD0316730198ECF315C78Ba64A88f95f9e92Cc1f");

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_required_network")]
    pub required_network: NetworkId,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub confirmation_timeout_secs: Option<u64>,
    #[serde(default = "default_panels")]
    pub panels: Vec<PanelConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub name: String,
    pub address: Address,
    /// Falls back to [`AppConfig::required_network`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_network: Option<NetworkId>,
    pub methods: Vec<MethodConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub signature: String,
    pub kind: OperationKind,
    /// Ether amount, e.g. `"0.02"`.
    #[serde(default)]
    pub fee: Option<String>,
}

impl MethodConfig {
    pub fn read(signature: &str) -> Self {
        Self {
            signature: signature.to_owned(),
            kind: OperationKind::Read,
            fee: None,
        }
    }

    pub fn write(signature: &str, fee: Option<&str>) -> Self {
        Self {
            signature: signature.to_owned(),
            kind: OperationKind::Write,
            fee: fee.map(str::to_owned),
        }
    }
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_required_network() -> NetworkId {
    HOLESKY_CHAIN_ID
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_panels() -> Vec<PanelConfig> {
    vec![
        PanelConfig {
            name: "nations".into(),
            address: NATIONS_ADDRESS,
            required_network: None,
            methods: vec![
                MethodConfig::write("createNation(string)", Some("0.02")),
                MethodConfig::write("joinNation(uint256)", Some("0.005")),
                MethodConfig::read(
                    "getNationStats(uint256) returns (string,uint256,uint256,uint256)",
                ),
            ],
        },
        PanelConfig {
            name: "balls".into(),
            address: BALLS_ADDRESS,
            required_network: None,
            methods: vec![
                MethodConfig::write("claimBall(uint256,string)", Some("0.01")),
                MethodConfig::write("providePoints(uint256,uint256)", None),
                MethodConfig::write("attackBall(uint256,uint256)", None),
                MethodConfig::write("transferPoints(address,string,uint256)", None),
                MethodConfig::write("createNation(string)", Some("0.02")),
                MethodConfig::write("joinNation(string)", Some("0.005")),
                MethodConfig::read("balls(uint256) returns (address,uint256,string)"),
                MethodConfig::read("userPoints(address,string) returns (uint256)"),
            ],
        },
        PanelConfig {
            name: "hero".into(),
            address: HERO_ADDRESS,
            required_network: None,
            methods: vec![
                MethodConfig::write("createNation(string)", None),
                MethodConfig::write("joinNation(string)", None),
                MethodConfig::read("getStats(string) returns (uint256,uint256)"),
            ],
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            required_network: default_required_network(),
            poll_interval_ms: default_poll_interval_ms(),
            confirmation_timeout_secs: None,
            panels: default_panels(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to the built-in panels when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(
                "No config at {}; using built-in panels",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(eyre!("poll_interval_ms must be greater than zero"));
        }
        for panel in &self.panels {
            let overridden = panel
                .required_network
                .filter(|network| *network != self.required_network);
            if let Some(network) = overridden {
                tracing::info!(
                    "Panel '{}' overrides the required network with {network}",
                    panel.name
                );
            }
            Panel::from_config(panel, self.required_network)
                .wrap_err_with(|| format!("Invalid panel '{}'", panel.name))?;
        }
        Ok(())
    }

    pub fn panels(&self) -> Result<Vec<Panel>> {
        self.panels
            .iter()
            .map(|p| {
                Panel::from_config(p, self.required_network).map_err(|e| eyre!(e))
            })
            .collect()
    }

    pub fn panel(&self, name: &str) -> Result<Panel> {
        let config = self
            .panels
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| eyre!("No panel named '{name}'"))?;
        Ok(Panel::from_config(config, self.required_network)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            confirmation_timeout: self.confirmation_timeout_secs.map(Duration::from_secs),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(CONFIG_DIR).join(CONFIG_FILE))
}

pub fn resolve_config_path(path: Option<&str>) -> Result<PathBuf> {
    match path {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_config_path(),
    }
}
