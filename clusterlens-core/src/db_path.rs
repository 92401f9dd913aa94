use std::env;
use std::path::PathBuf;

/// Global ClusterLens data directory (~/.clusterlens/data)
fn get_global_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".clusterlens")
        .join("data")
}

/// Get the ClusterLens database path
///
/// Priority:
/// 1. CLUSTERLENS_DATABASE_PATH env var
/// 2. ~/.clusterlens/data/clusterlens.db
pub fn get_database_path() -> PathBuf {
    if let Ok(db_path) = env::var("CLUSTERLENS_DATABASE_PATH") {
        return PathBuf::from(db_path);
    }

    get_global_data_dir().join("clusterlens.db")
}
