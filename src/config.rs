mod commandline;
mod defaults;
mod file;
pub(crate) mod primitives;

use std::path::Path;

use clap::Parser;
use config::Environment;

use commandline::{Args, Output};
use defaults::Defaults;

pub(crate) use commandline::Operation;
pub(crate) use file::{ConfigFile as Configuration, Repo, Sled, Tracing};
pub(crate) use primitives::{Filesystem, ObjectStorage, Store, ThumbnailBackend};

/// Source for vid-rs' configuration when not using the commandline
#[derive(Clone, Debug)]
pub enum ConfigSource<P, T> {
    /// A configuration file on disk
    File { path: P },

    /// An in-memory value implementing `serde::Serialize`
    Memory { memory: T },

    /// Defaults and environment variables only
    Empty,
}

/// A fully resolved vid-rs configuration, ready to run
#[derive(Clone, Debug)]
pub struct VidRsConfiguration {
    pub(crate) config: Configuration,
    pub(crate) operation: Operation,
}

impl<T> ConfigSource<&'static str, T>
where
    T: serde::Serialize,
{
    pub fn memory(memory: T) -> Self {
        ConfigSource::Memory { memory }
    }
}

impl<P> ConfigSource<P, ()>
where
    P: AsRef<Path>,
{
    pub fn file(path: P) -> Self {
        ConfigSource::File { path }
    }
}

impl ConfigSource<&'static str, ()> {
    pub fn empty() -> Self {
        ConfigSource::Empty
    }
}

fn environment() -> Environment {
    Environment::with_prefix("VID_RS").separator("__")
}

pub(crate) fn configure_without_clap<P, T>(
    source: ConfigSource<P, T>,
) -> color_eyre::Result<VidRsConfiguration>
where
    P: AsRef<Path>,
    T: serde::Serialize,
{
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Defaults::default())?);

    let config = match source {
        ConfigSource::Memory { memory } => {
            config.add_source(config::Config::try_from(&memory)?)
        }
        ConfigSource::File { path } => config.add_source(config::File::from(path.as_ref())),
        ConfigSource::Empty => config,
    };

    let built = config.add_source(environment()).build()?;

    let config: Configuration = built.try_deserialize()?;

    Ok(VidRsConfiguration {
        config,
        operation: Operation::Run,
    })
}

pub(crate) fn configure() -> color_eyre::Result<VidRsConfiguration> {
    let Output {
        config_format,
        operation,
        config_file,
    } = Args::parse().into_output();

    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Defaults::default())?);

    let config = if let Some(config_file) = config_file {
        config.add_source(config::File::from(config_file))
    } else {
        config
    };

    let built = config
        .add_source(environment())
        .add_source(config::Config::try_from(&config_format)?)
        .build()?;

    let config: Configuration = built.try_deserialize()?;

    Ok(VidRsConfiguration { config, operation })
}
