//! Loading of configurations split across files.
//!
//! The root file may list other files under `include`, resolved relative to
//! the root file. Included files contribute whole sections, except
//! `networks`, whose entries may be spread over several files as long as
//! each network is defined once. Included files cannot include further.

use crate::{Config, ConfigError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const INCLUDE: &str = "include";
const NETWORKS: &str = "networks";

/// Loads `path` and the files it includes into a validated [`Config`].
pub(crate) async fn load(path: &Path) -> Result<Config, ConfigError> {
	let mut root = read_table(path).await?;
	let includes = take_includes(&mut root)?;
	if includes.is_empty() {
		return serialize(&root)?.parse();
	}

	let root_path = canonical(path)?;
	let base = path.parent().unwrap_or_else(|| Path::new("."));
	let mut sources = HashMap::new();
	for (section, value) in &root {
		for key in section_keys(section, value) {
			sources.insert(key, root_path.clone());
		}
	}

	for include in includes {
		let include_path = base.join(&include);
		let canonical_path = canonical(&include_path)?;
		if canonical_path == root_path {
			return Err(ConfigError::Validation(format!(
				"{} includes itself",
				root_path.display()
			)));
		}

		let table = read_table(&include_path).await?;
		if table.contains_key(INCLUDE) {
			return Err(ConfigError::Validation(format!(
				"{} cannot include further files",
				include_path.display()
			)));
		}
		for (section, value) in table {
			merge_section(&mut root, &mut sources, section, value, &canonical_path)?;
		}
	}

	serialize(&root)?.parse()
}

async fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
	let content = tokio::fs::read_to_string(path).await.map_err(|e| {
		ConfigError::Io(std::io::Error::new(
			e.kind(),
			format!("Cannot read {}: {}", path.display(), e),
		))
	})?;
	Ok(toml::from_str(&content)?)
}

fn canonical(path: &Path) -> Result<PathBuf, ConfigError> {
	path.canonicalize().map_err(|e| {
		ConfigError::Io(std::io::Error::new(
			e.kind(),
			format!("Configuration file not found: {}", path.display()),
		))
	})
}

fn serialize(table: &toml::Table) -> Result<String, ConfigError> {
	toml::to_string(table)
		.map_err(|e| ConfigError::Parse(format!("Failed to serialize combined config: {}", e)))
}

/// Removes the `include` entry, accepting one path or a list of paths.
fn take_includes(root: &mut toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
	match root.remove(INCLUDE) {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(paths)) => paths
			.iter()
			.map(|path| {
				path.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("include must only list file paths".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"include must be a path or a list of paths".into(),
		)),
	}
}

/// Keys a section claims: one per network for `networks`, else its name.
fn section_keys(section: &str, value: &toml::Value) -> Vec<String> {
	match (section, value.as_table()) {
		(NETWORKS, Some(networks)) => networks
			.keys()
			.map(|network| format!("{}.{}", NETWORKS, network))
			.collect(),
		_ => vec![section.to_string()],
	}
}

fn merge_section(
	root: &mut toml::Table,
	sources: &mut HashMap<String, PathBuf>,
	section: String,
	value: toml::Value,
	source: &Path,
) -> Result<(), ConfigError> {
	for key in section_keys(&section, &value) {
		if let Some(existing) = sources.get(&key) {
			return Err(ConfigError::Validation(format!(
				"'{}' is defined in both {} and {}",
				key,
				existing.display(),
				source.display()
			)));
		}
		sources.insert(key, source.to_path_buf());
	}

	match (section.as_str(), value) {
		(NETWORKS, toml::Value::Table(networks)) => {
			let merged = root
				.entry(NETWORKS)
				.or_insert(toml::Value::Table(toml::Table::new()))
				.as_table_mut()
				.ok_or_else(|| ConfigError::Validation("networks must be a table".into()))?;
			for (network, config) in networks {
				merged.insert(network, config);
			}
		},
		(_, value) => {
			root.insert(section, value);
		},
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;
	use wallet_types::NetworkId;

	const WALLET_SECTION: &str = r#"
[wallet]
account = "0x0000000000000000000000000000000000007E57"
pincode_type = "phone-auth"
"#;

	const CELO_NETWORK: &str = r#"
[networks.celo-alfajores]
chain_id = 44787
rpc_url = "https://alfajores-forno.celo-testnet.org"
[[networks.celo-alfajores.tokens]]
symbol = "CELO"
decimals = 18
is_native = true
"#;

	const ARBITRUM_NETWORK: &str = r#"
[networks.arbitrum-sepolia]
chain_id = 421614
rpc_url = "https://sepolia-rollup.arbitrum.io/rpc"
[[networks.arbitrum-sepolia.tokens]]
symbol = "ETH"
decimals = 18
is_native = true
"#;

	const BACKENDS_SECTION: &str = r#"
[storage]
primary = "memory"
[storage.implementations.memory]

[delivery]
[delivery.implementations.evm_alloy]
"#;

	#[tokio::test]
	async fn test_single_file_config() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		fs::write(&path, format!("{}{}{}", WALLET_SECTION, CELO_NETWORK, BACKENDS_SECTION))
			.unwrap();

		let config = load(&path).await.unwrap();

		assert!(config.network(NetworkId::CeloAlfajores).is_some());
		assert_eq!(config.storage.primary, "memory");
	}

	#[tokio::test]
	async fn test_networks_spread_over_files() {
		let dir = TempDir::new().unwrap();
		let root = format!(
			"include = [\"arbitrum.toml\", \"backends.toml\"]\n{}{}",
			WALLET_SECTION, CELO_NETWORK
		);
		fs::write(dir.path().join("main.toml"), root).unwrap();
		fs::write(dir.path().join("arbitrum.toml"), ARBITRUM_NETWORK).unwrap();
		fs::write(dir.path().join("backends.toml"), BACKENDS_SECTION).unwrap();

		let config = load(&dir.path().join("main.toml")).await.unwrap();

		assert_eq!(config.networks.len(), 2);
		assert!(config.network(NetworkId::ArbitrumSepolia).is_some());
		assert_eq!(config.delivery.implementations.len(), 1);
	}

	#[tokio::test]
	async fn test_duplicate_definitions_rejected() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!("include = \"wallet.toml\"\n{}", WALLET_SECTION),
		)
		.unwrap();
		fs::write(dir.path().join("wallet.toml"), WALLET_SECTION).unwrap();

		let err = load(&dir.path().join("main.toml")).await.unwrap_err();
		assert!(err.to_string().contains("'wallet' is defined in both"));

		fs::write(
			dir.path().join("main.toml"),
			format!("include = \"celo.toml\"\n{}{}", WALLET_SECTION, CELO_NETWORK),
		)
		.unwrap();
		fs::write(dir.path().join("celo.toml"), CELO_NETWORK).unwrap();

		let err = load(&dir.path().join("main.toml")).await.unwrap_err();
		assert!(err
			.to_string()
			.contains("'networks.celo-alfajores' is defined in both"));
	}

	#[tokio::test]
	async fn test_nested_and_self_includes_rejected() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("self.toml"),
			format!("include = [\"self.toml\"]\n{}", WALLET_SECTION),
		)
		.unwrap();
		let err = load(&dir.path().join("self.toml")).await.unwrap_err();
		assert!(err.to_string().contains("includes itself"));

		fs::write(
			dir.path().join("main.toml"),
			format!("include = \"middle.toml\"\n{}", WALLET_SECTION),
		)
		.unwrap();
		fs::write(dir.path().join("middle.toml"), "include = \"backends.toml\"\n").unwrap();
		let err = load(&dir.path().join("main.toml")).await.unwrap_err();
		assert!(err.to_string().contains("cannot include further files"));
	}

	#[tokio::test]
	async fn test_missing_include_reported() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!("include = [\"absent.toml\"]\n{}", WALLET_SECTION),
		)
		.unwrap();

		let err = load(&dir.path().join("main.toml")).await.unwrap_err();
		assert!(matches!(err, ConfigError::Io(_)));
	}
}
