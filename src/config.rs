// src/config.rs

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

// --- RepairConfig ---
// Which fixups to try when a block fails to load

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepairConfig {
  #[serde(default = "yes")]
  pub fix_adp_labels: bool,
  #[serde(default = "yes")]
  pub fix_bond_labels: bool,
  #[serde(default = "yes")]
  pub fix_bond_symmetry: bool,
}

fn yes() -> bool {
  true
}

impl Default for RepairConfig {
  fn default() -> Self {
    Self {
      fix_adp_labels: true,
      fix_bond_labels: true,
      fix_bond_symmetry: true,
    }
  }
}

// --- Main Config Struct ---
// Modifier modes are kept as text and validated when the pipeline is built.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  pub split_su: bool,
  pub hydrogen_mode: String,
  pub disorder_mode: String,
  pub symmetry_mode: String,
  pub bond_mode: String,
  pub bond_tolerance: f64,
  pub label_filter_mode: String,
  pub filtered_labels: Vec<String>,
  pub repair: RepairConfig,
  pub log_level: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      split_su: true,
      hydrogen_mode: "none".to_string(),
      disorder_mode: "all".to_string(),
      symmetry_mode: "bonds-yes-hbonds-no".to_string(),
      bond_mode: "keep".to_string(),
      bond_tolerance: 1.2,
      label_filter_mode: "off".to_string(),
      filtered_labels: Vec::new(),
      repair: RepairConfig::default(),
      log_level: "warn".to_string(),
    }
  }
}

impl Config {
  /// Loads config from standard OS location (e.g., ~/.config/cifvis/settings.json)
  pub fn load() -> (Self, String) {
    let path = Self::get_path();
    if path.exists() {
      Self::load_from(&path)
    } else {
      (
        Self::default(),
        "No config found. Using defaults.".to_string(),
      )
    }
  }

  /// Loads config from an explicit file, falling back to defaults on error
  pub fn load_from(path: &Path) -> (Self, String) {
    match File::open(path) {
      Ok(file) => {
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
          Ok(cfg) => (cfg, format!("Config loaded from {:?}", path)),
          Err(e) => (Self::default(), format!("Error parsing config: {}", e)),
        }
      }
      Err(e) => (Self::default(), format!("Error opening config: {}", e)),
    }
  }

  /// Saves config to standard OS location
  pub fn save(&self) -> String {
    self.save_to(&Self::get_path())
  }

  pub fn save_to(&self, path: &Path) -> String {
    if let Some(parent) = path.parent() {
      let _ = fs::create_dir_all(parent);
    }

    match File::create(path) {
      Ok(file) => {
        let writer = BufWriter::new(file);
        match serde_json::to_writer_pretty(writer, self) {
          Ok(_) => format!("Config saved to {:?}", path),
          Err(e) => format!("Failed to save config: {}", e),
        }
      }
      Err(e) => format!("Could not create config file: {}", e),
    }
  }

  fn get_path() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("org", "cifvis", "cifvis") {
      proj.config_dir().join("settings.json")
    } else {
      PathBuf::from("settings.json")
    }
  }
}
