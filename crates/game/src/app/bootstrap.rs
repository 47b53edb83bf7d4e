use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sim::{
    BalanceConfig, ConfigError, LevelGridError, LoopConfig, ProgressionError,
    ProgressionSnapshot, Simulation, SimulationConfig,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::dungeon::{self, DungeonParams, BOSS_TYPE};

pub(crate) const ROOT_ENV_VAR: &str = "ROGUE_ROOT";
const SEED_ENV_VAR: &str = "ROGUE_SEED";
const SIM_SECONDS_ENV_VAR: &str = "ROGUE_SIM_SECONDS";
const FRAME_MS_ENV_VAR: &str = "ROGUE_FRAME_MS";
const BALANCE_PATH_ENV_VAR: &str = "ROGUE_BALANCE_PATH";
const SAVE_PATH_ENV_VAR: &str = "ROGUE_SAVE_PATH";

const DEFAULT_SEED: u64 = 0x5eed;
const DEFAULT_SIM_SECONDS: f32 = 180.0;
const DEFAULT_FRAME_MS: u64 = 16;
const BALANCE_RELATIVE_PATH: [&str; 4] = ["crates", "game", "data", "balance"];
const BALANCE_FILE: &str = "enemies.json";
const SAVE_DIR: &str = "saves";
const SAVE_FILE: &str = "progress.json";

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("{var} is set but does not point to a valid project root: {path}")]
    InvalidEnvRoot { var: &'static str, path: PathBuf },
    #[error("failed to load balance data: {0}")]
    Balance(#[from] ConfigError),
    #[error("failed to build dungeon: {0}")]
    Dungeon(#[from] LevelGridError),
}

#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) seed: u64,
    pub(crate) run_duration: Duration,
    pub(crate) frame_dt: Duration,
    pub(crate) save_path: Option<PathBuf>,
}

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) settings: RunSettings,
    pub(crate) simulation: Simulation,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Dungeon Run Startup ===");

    let root = resolve_root()?;
    let seed = parse_env_or(SEED_ENV_VAR, DEFAULT_SEED);
    let sim_seconds = Some(parse_env_or(SIM_SECONDS_ENV_VAR, DEFAULT_SIM_SECONDS))
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .unwrap_or(DEFAULT_SIM_SECONDS);
    let frame_ms = parse_env_or(FRAME_MS_ENV_VAR, DEFAULT_FRAME_MS).max(1);
    let settings = RunSettings {
        seed,
        run_duration: Duration::from_secs_f32(sim_seconds),
        frame_dt: Duration::from_millis(frame_ms),
        save_path: resolve_save_path(root.as_deref()),
    };

    let balance = load_balance(root.as_deref())?;
    let params = DungeonParams::default();
    let grid = dungeon::generate(seed, &params)?;
    let plan = dungeon::plan_spawns(&grid, seed, &params);

    let config = SimulationConfig {
        rng_seed: seed,
        ..SimulationConfig::default()
    };
    let mut simulation = Simulation::new(config, balance, Some(grid));
    simulation.spawn_player(plan.player);
    for (enemy_type, position) in &plan.enemies {
        simulation.spawn_enemy(enemy_type, *position);
    }
    if let Some(position) = plan.boss {
        simulation.spawn_enemy(BOSS_TYPE, position);
    }
    info!(
        seed,
        enemies = plan.enemies.len(),
        boss = plan.boss.is_some(),
        sim_seconds,
        frame_ms,
        "run_prepared"
    );

    if let Some(path) = &settings.save_path {
        restore_progression(&mut simulation, path);
    }

    Ok(AppWiring {
        loop_config: LoopConfig::default(),
        settings,
        simulation,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Parses `var` into `T`, falling back to `default` with a warning when the
/// value is present but malformed.
fn parse_env_or<T>(var: &'static str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Debug,
{
    match env::var(var) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(var, value = %raw, ?default, "invalid_env_value");
                default
            }
        },
        Err(_) => default,
    }
}

/// Project root from the environment, else the first ancestor of the working
/// directory that looks like this workspace. `None` means the binary runs
/// detached from the repository and uses built-in data only.
fn resolve_root() -> Result<Option<PathBuf>, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(Some(normalized))
            } else {
                Err(StartupError::InvalidEnvRoot {
                    var: ROOT_ENV_VAR,
                    path: normalized,
                })
            }
        }
        Err(env::VarError::NotPresent) => {
            let Ok(cwd) = env::current_dir() else {
                warn!("current_dir_unavailable");
                return Ok(None);
            };
            let found = cwd.ancestors().find(|candidate| is_repo_marker(candidate));
            if found.is_none() {
                warn!(start_dir = %cwd.display(), env_var = ROOT_ENV_VAR, "project_root_not_found");
            }
            Ok(found.map(normalize_path))
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && path.join("crates").is_dir()
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn balance_path(root: &Path) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in BALANCE_RELATIVE_PATH {
        path.push(part);
    }
    path.join(BALANCE_FILE)
}

/// An explicit path must load; the repository copy is optional and the
/// built-in table covers a missing file.
fn load_balance(root: Option<&Path>) -> Result<BalanceConfig, StartupError> {
    if let Some(path) = env::var_os(BALANCE_PATH_ENV_VAR) {
        let path = PathBuf::from(path);
        let balance = BalanceConfig::load_from_path(&path)?;
        info!(path = %path.display(), "balance_loaded");
        return Ok(balance);
    }
    match root.map(balance_path).filter(|path| path.is_file()) {
        Some(path) => {
            let balance = BalanceConfig::load_from_path(&path)?;
            info!(path = %path.display(), "balance_loaded");
            Ok(balance)
        }
        None => {
            info!("balance_builtin");
            Ok(BalanceConfig::default())
        }
    }
}

fn resolve_save_path(root: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = env::var_os(SAVE_PATH_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    root.map(|root| root.join(SAVE_DIR).join(SAVE_FILE))
}

fn restore_progression(simulation: &mut Simulation, path: &Path) {
    if !path.is_file() {
        return;
    }
    let result = ProgressionSnapshot::load_from_path(path)
        .and_then(|snapshot| simulation.apply_progression(&snapshot));
    match result {
        Ok(()) => info!(path = %path.display(), "save_loaded"),
        Err(error) => warn_load_failed(path, &error),
    }
}

fn warn_load_failed(path: &Path, error: &ProgressionError) {
    warn!(path = %path.display(), error = %error, "load_failed");
}
