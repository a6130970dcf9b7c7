// Config: %APPDATA%\promptshelf

use std::env;
use std::path::PathBuf;

use super::APP_DIR_NAME;

pub fn get_config_dir() -> PathBuf {
    let appdata = env::var("APPDATA")
        .or_else(|_| env::var("USERPROFILE").map(|home| format!("{}\\AppData\\Roaming", home)))
        .unwrap_or_else(|_| String::from("C:\\Temp"));
    PathBuf::from(appdata).join(APP_DIR_NAME)
}
