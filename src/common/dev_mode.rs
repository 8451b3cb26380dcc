use crate::common::error::Result;
use std::fs;
use std::path::PathBuf;

/// Development mode context: test captures and debug images go to a local
/// directory instead of the current working directory.
#[derive(Debug, Clone)]
pub struct DevMode {
    enabled: bool,
    base_dir: PathBuf,
}

impl DevMode {
    pub fn new(enabled: bool) -> Result<Self> {
        let base_dir = PathBuf::from("./dev_data");

        if enabled {
            fs::create_dir_all(base_dir.join("captures"))?;
            fs::create_dir_all(base_dir.join("debug"))?;
            println!(
                "📁 Development mode enabled - data will be saved to: {}",
                base_dir.display()
            );
        }

        Ok(Self { enabled, base_dir })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get_capture_path(&self, prefix: &str) -> PathBuf {
        if self.enabled {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            self.base_dir
                .join("captures")
                .join(format!("{}_{}.jpg", prefix, timestamp))
        } else {
            PathBuf::from(format!("{}.jpg", prefix))
        }
    }

    pub fn get_debug_path(&self, prefix: &str) -> PathBuf {
        if self.enabled {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            self.base_dir
                .join("debug")
                .join(format!("{}_{}.jpg", prefix, timestamp))
        } else {
            PathBuf::from(format!("{}_debug.jpg", prefix))
        }
    }
}
