use std::sync::Arc;

use limes_model::config::ClusterConfig;

use crate::args::ClusterConfigArgs;

/// Loads the static cluster configuration from YAML (§5, §9, §10.3) and
/// wraps it for read-only sharing across every worker task.
pub fn load_cluster_config(args: &ClusterConfigArgs) -> anyhow::Result<Arc<ClusterConfig>> {
    let raw = std::fs::read_to_string(&args.config_path).map_err(|err| {
        anyhow::anyhow!(
            "failed to read cluster config at {}: {err}",
            args.config_path.display()
        )
    })?;
    let config: ClusterConfig = serde_yaml::from_str(&raw)
        .map_err(|err| anyhow::anyhow!("failed to parse cluster config: {err}"))?;
    Ok(Arc::new(config))
}
