//! Per-network environment variable templates.
//!
//! Output shape, one block per network in registry order:
//!
//! ```text
//! # ethereum (chain id 1)
//! ETHEREUM_RPC_URL=""
//! ETHEREUM_OWNER_ADDRESSES=""
//! ```

use std::path::Path;

use feedgen_shared::{NetworkDescriptor, Result};

use crate::writer::{ArtifactMeta, write_atomic};

/// Render the template. Pure; no I/O.
pub fn render_env_template(networks: &[NetworkDescriptor]) -> String {
    networks
        .iter()
        .map(|network| {
            format!(
                "# {} (chain id {})\n{}=\"\"\n{}=\"\"\n",
                network.network_name,
                network.chain_id,
                network.rpc_env_var_name,
                owner_var_name(network)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `<NETWORK_NAME_UPPER_SNAKE>_OWNER_ADDRESSES`, or `CHAIN_<id>_OWNER_ADDRESSES`
/// when the name has no ASCII letters or digits.
pub fn owner_var_name(network: &NetworkDescriptor) -> String {
    let base = upper_snake(&network.network_name);
    if base.is_empty() {
        format!("CHAIN_{}_OWNER_ADDRESSES", network.chain_id)
    } else {
        format!("{base}_OWNER_ADDRESSES")
    }
}

/// `arbitrum-sepolia` / `Arbitrum Sepolia` -> `ARBITRUM_SEPOLIA`.
fn upper_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Write the rendered template to `path`.
pub fn emit_env_template(path: &Path, networks: &[NetworkDescriptor]) -> Result<ArtifactMeta> {
    write_atomic(path, render_env_template(networks).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(name: &str, chain_id: u64, rpc: &str) -> NetworkDescriptor {
        NetworkDescriptor {
            network_name: name.into(),
            chain_id,
            rpc_env_var_name: rpc.into(),
        }
    }

    #[test]
    fn renders_blocks_in_registry_order() {
        let networks = vec![
            network("ethereum", 1, "ETHEREUM_RPC_URL"),
            network("arbitrum-sepolia", 421614, "ARBITRUM_SEPOLIA_RPC_URL"),
        ];

        let expected = "# ethereum (chain id 1)\n\
                        ETHEREUM_RPC_URL=\"\"\n\
                        ETHEREUM_OWNER_ADDRESSES=\"\"\n\
                        \n\
                        # arbitrum-sepolia (chain id 421614)\n\
                        ARBITRUM_SEPOLIA_RPC_URL=\"\"\n\
                        ARBITRUM_SEPOLIA_OWNER_ADDRESSES=\"\"\n";
        assert_eq!(render_env_template(&networks), expected);
    }

    #[test]
    fn empty_registry_renders_nothing() {
        assert_eq!(render_env_template(&[]), "");
    }

    #[test]
    fn upper_snake_normalizes_separators() {
        assert_eq!(upper_snake("base"), "BASE");
        assert_eq!(upper_snake("Arbitrum Sepolia"), "ARBITRUM_SEPOLIA");
        assert_eq!(upper_snake("op--mainnet."), "OP_MAINNET");
        assert_eq!(upper_snake("-zk sync"), "ZK_SYNC");
    }

    #[test]
    fn non_ascii_name_falls_back_to_chain_id() {
        let zeta = network("Ζήτα", 7777, "ZETA_RPC_URL");
        assert_eq!(owner_var_name(&zeta), "CHAIN_7777_OWNER_ADDRESSES");
        assert!(render_env_template(&[zeta]).contains("\nCHAIN_7777_OWNER_ADDRESSES=\"\"\n"));
    }
}
