use crate::config::Config;
use crate::scoring::params::ParameterStore;
use axum::extract::FromRef;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    /// Active item-parameter snapshot, swapped wholesale by calibration.
    pub params: ParameterStore,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ParameterStore {
    fn from_ref(state: &AppState) -> Self {
        state.params.clone()
    }
}
