mod config;
mod logging;
mod urls;

pub use config::{
    CONFIG_FILE_NAME, LogSettings, Redirects, Settings, SigningSettings, UrlSettings,
    default_config_path, load_settings_from_file, parse_settings, write_default_config,
};
pub use logging::{LogFormat, init_logging};
pub use urls::resolve_base_url;
