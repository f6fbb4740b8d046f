//! Configuration for world generation, seeding and the HTTP server.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mesh::MeshConfig;

/// Main configuration, usually read from `config/gaea.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaeaConfig {
    #[serde(default)]
    pub world: WorldConfig,
    pub seeding: SeedingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_divisions")]
    pub divisions: u32,
    /// Polygon shrink factor for renderers. Has no effect on the tiles built.
    #[serde(default = "default_tile_size")]
    pub tile_size: f64,
    /// Tiles at or beyond this absolute latitude stay out of the geo index.
    #[serde(default = "default_pole_exclusion_lat")]
    pub pole_exclusion_lat: f64,
    #[serde(default = "default_search_radius_km")]
    pub search_radius_km: f64,
    #[serde(default = "default_elevation_image")]
    pub elevation_image: PathBuf,
    /// Writes per pipelined batch during generation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedingConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_humans_per_player")]
    pub humans_per_player: u32,
    #[serde(default = "default_ships_per_player")]
    pub ships_per_player: u32,
    /// Place units on the nearest tile even when it is water.
    #[serde(default)]
    pub allow_water_start: bool,
    pub roster: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub reset_on_start: bool,
}

fn default_radius() -> f64 {
    6400.0
}

fn default_divisions() -> u32 {
    64
}

fn default_tile_size() -> f64 {
    1.0
}

fn default_pole_exclusion_lat() -> f64 {
    85.0
}

fn default_search_radius_km() -> f64 {
    1000.0
}

fn default_elevation_image() -> PathBuf {
    PathBuf::from("assets/elevation.png")
}

fn default_batch_size() -> usize {
    1024
}

fn default_humans_per_player() -> u32 {
    10
}

fn default_ships_per_player() -> u32 {
    1
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            divisions: default_divisions(),
            tile_size: default_tile_size(),
            pole_exclusion_lat: default_pole_exclusion_lat(),
            search_radius_km: default_search_radius_km(),
            elevation_image: default_elevation_image(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            reset_on_start: false,
        }
    }
}

impl WorldConfig {
    pub fn mesh(&self) -> MeshConfig {
        MeshConfig {
            radius: self.radius,
            divisions: self.divisions,
            tile_size: self.tile_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.mesh().validate()?;
        if !(0.0..=90.0).contains(&self.pole_exclusion_lat) {
            return Err(Error::Config(format!(
                "pole_exclusion_lat must be within 0..=90, got {}",
                self.pole_exclusion_lat
            )));
        }
        if self.search_radius_km.is_nan() || self.search_radius_km <= 0.0 {
            return Err(Error::Config("search_radius_km must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

impl SeedingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.roster.is_empty() {
            return Err(Error::Config("roster must list at least one player".into()));
        }
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for entry in &self.roster {
            if entry.id.trim().is_empty() || entry.name.trim().is_empty() {
                return Err(Error::Config(
                    "roster entries need a non-empty id and name".into(),
                ));
            }
            if !ids.insert(entry.id.as_str()) {
                return Err(Error::Config(format!(
                    "player id '{}' listed more than once",
                    entry.id
                )));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(Error::Config(format!(
                    "player name '{}' listed more than once",
                    entry.name
                )));
            }
            if !(-90.0..=90.0).contains(&entry.lat) || !(-180.0..=180.0).contains(&entry.lon) {
                return Err(Error::Config(format!(
                    "player '{}' has an out-of-range position ({}, {})",
                    entry.id, entry.lat, entry.lon
                )));
            }
        }
        Ok(())
    }
}

impl GaeaConfig {
    pub fn validate(&self) -> Result<()> {
        self.world.validate()?;
        self.seeding.validate()
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let config: GaeaConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// The three-player world the game ships with.
    pub fn starter() -> Self {
        let roster = [
            ("dogPzIz8", "joel", 45.5, -73.5),
            ("hwX6aOr7", "mark", 19.0, -99.1),
            ("a4vhAoFG", "michael", 33.5, -7.5),
        ]
        .into_iter()
        .map(|(id, name, lat, lon)| RosterEntry {
            id: id.to_string(),
            name: name.to_string(),
            lat,
            lon,
        })
        .collect();
        Self {
            world: WorldConfig::default(),
            seeding: SeedingConfig {
                seed: 0,
                humans_per_player: default_humans_per_player(),
                ships_per_player: default_ships_per_player(),
                allow_water_start: false,
                roster,
            },
            server: ServerConfig::default(),
        }
    }
}

/// Loads configuration files relative to a base directory, so relative asset
/// paths inside the file resolve against the same root.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> anyhow::Result<GaeaConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = GaeaConfig::from_yaml_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if config.world.elevation_image.is_relative() {
            config.world.elevation_image = self.base_dir.join(&config.world.elevation_image);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starter_config() {
        let config = GaeaConfig::starter();

        assert_eq!(config.world.radius, 6400.0);
        assert_eq!(config.world.divisions, 64);
        assert_eq!(config.world.pole_exclusion_lat, 85.0);
        assert_eq!(config.world.search_radius_km, 1000.0);
        assert_eq!(config.seeding.roster.len(), 3);
        assert_eq!(config.seeding.humans_per_player, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trip_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let config = GaeaConfig::starter();
        config.to_yaml(dir.path().join("gaea.yaml")).unwrap();

        let loaded = ConfigLoader::new(dir.path()).load("gaea.yaml").unwrap();
        assert_eq!(loaded.seeding.roster, config.seeding.roster);
        assert_eq!(
            loaded.world.elevation_image,
            dir.path().join("assets/elevation.png")
        );
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let text = r#"
seeding:
  roster:
    - id: p1
      name: ada
      lat: 10.0
      lon: 20.0
"#;
        let config = GaeaConfig::from_yaml_str(text).unwrap();
        assert_eq!(config.world.divisions, 64);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.seeding.ships_per_player, 1);
        assert!(!config.seeding.allow_water_start);
    }

    #[test]
    fn test_roster_validation() {
        let mut config = GaeaConfig::starter();
        config.seeding.roster[1].id = config.seeding.roster[0].id.clone();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = GaeaConfig::starter();
        config.seeding.roster[0].lat = 95.0;
        assert!(config.validate().is_err());

        let mut config = GaeaConfig::starter();
        config.seeding.roster.clear();
        assert!(config.validate().is_err());

        let mut config = GaeaConfig::starter();
        config.seeding.roster[2].name = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_world_validation() {
        let mut config = GaeaConfig::starter();
        config.world.divisions = 0;
        assert!(config.validate().is_err());

        let mut config = GaeaConfig::starter();
        config.world.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
