//! Client configuration for endpoint resolution.
//! This module handles the settings file supplying client-context parameter values and
//! built-in values, and the validated [`ClientOptions`] built from it.

mod io;
mod model;

pub use io::{CLIENT_CONFIG_PATH_ENV, default_settings_path, load_settings, load_settings_from_path, save_settings_to_path};
pub use model::{ClientContextValues, ClientOptions, ClientSettings, ConfigError};
