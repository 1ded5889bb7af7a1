use crate::supply::{Dataset, ErrorMessage::*, SupplyError};
use log::{debug, info};
use std::{
    env,
    error::Error,
    fmt::Display,
    fs::{self, File},
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

pub const DEFAULT_DIR: &str = "data";
pub const DEFAULT_FILE: &str = "_data.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_path: PathBuf,
}

impl Config {
    pub fn new(data_path: Option<PathBuf>) -> Self {
        Config {
            data_path: data_path.unwrap_or_else(default_path),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(None)
    }
}

/// `<cwd>/data/_data.json`, or a relative path if the working directory is gone.
pub fn default_path() -> PathBuf {
    let base = env::current_dir().unwrap_or_default();
    base.join(DEFAULT_DIR).join(DEFAULT_FILE)
}

fn io_failure(path: &Path, e: impl Display) -> Box<dyn Error> {
    SupplyError::boxed(IoFailure, Some(format!("{}: {}", path.display(), e)))
}

/// Whole-file access to the JSON dataset.
pub struct Storage;

impl Storage {
    pub fn exists(path: &Path) -> bool {
        fs::metadata(path).is_ok()
    }

    pub fn load(path: &Path) -> Result<Dataset, Box<dyn Error>> {
        let file = File::open(path).map_err(|e| io_failure(path, e))?;
        let reader = BufReader::new(file);
        match serde_json::from_reader::<BufReader<File>, Dataset>(reader) {
            Ok(dataset) => {
                debug!("Loaded {} supplies from {}", dataset.len(), path.display());
                Ok(dataset)
            }
            Err(e) if e.is_io() => Err(io_failure(path, e)),
            Err(e) => Err(SupplyError::boxed(
                ParseFailure,
                Some(format!("{}: {}", path.display(), e)),
            )),
        }
    }

    /// Overwrites the file with the whole dataset.
    pub fn save(path: &Path, dataset: &Dataset) -> Result<(), Box<dyn Error>> {
        let json = serde_json::to_string(dataset)
            .map_err(|e| SupplyError::boxed(ParseFailure, Some(e.to_string())))?;
        let mut file = File::create(path).map_err(|e| io_failure(path, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| io_failure(path, e))?;
        debug!("Saved {} supplies to {}", dataset.len(), path.display());
        Ok(())
    }

    /// Writes `{}` unless the file is already there.
    pub fn init_empty(path: &Path) -> Result<(), Box<dyn Error>> {
        if Storage::exists(path) {
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_failure(parent, e))?;
        }
        Storage::save(path, &Dataset::new())?;
        info!("Created empty dataset at {}", path.display());
        Ok(())
    }
}
