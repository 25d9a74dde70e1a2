//! Configuration loading helpers for the CLI.
//!
//! The logic here filters CLI arguments destined for `ortho-config` so the
//! loader only receives supported flags while the main runtime can operate on
//! the subcommand tokens.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use shotrelay_config::Config;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration for the CLI.
    ///
    /// # Flag Ordering
    ///
    /// Configuration flags (listed in `CONFIG_CLI_FLAGS`) must appear before the
    /// subcommand. Flags after it are parsed as subcommand arguments.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

#[derive(Debug, Clone, Copy)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

impl OrthoConfigLoader {
    fn process_config_flag(argument: &OsStr) -> FlagAction {
        let argument_text = argument.to_string_lossy();
        if !argument_text.starts_with("--") {
            return FlagAction::Skip;
        }

        let (flag, has_inline_value) = match argument_text.split_once('=') {
            Some((flag, _)) => (flag, true),
            None => (&*argument_text, false),
        };

        if super::CONFIG_CLI_FLAGS.contains(&flag) {
            return FlagAction::Include {
                needs_value: !has_inline_value,
            };
        }

        FlagAction::Skip
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    if args.is_empty() {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    }

    let mut filtered: Vec<OsString> = Vec::new();
    filtered.push(args[0].clone());

    let mut command_start = 1usize;
    let mut index = 1usize;
    let mut pending_values = 0usize;

    while index < args.len() {
        let argument = &args[index];
        if pending_values > 0 {
            filtered.push(argument.clone());
            pending_values -= 1;
            index += 1;
            command_start = index;
            continue;
        }

        match OrthoConfigLoader::process_config_flag(argument.as_os_str()) {
            FlagAction::Include { needs_value } => {
                filtered.push(argument.clone());
                index += 1;
                command_start = index;
                if needs_value {
                    pending_values = 1;
                }
            }
            FlagAction::Skip => {
                break;
            }
        }
    }

    ConfigArgumentSplit {
        config_arguments: filtered,
        command_start,
    }
}
