//! Construction of the external systems the pipeline talks to.
//!
//! The orchestrator never names a concrete client. It asks a
//! [`Collaborators`] factory for each one at the stage that needs it, once
//! the configuration that client depends on is known.

use bucko_common::config::Config;
use bucko_common::error::Result;
use bucko_compose::{ComposeReader, HttpComposeReader};
use bucko_koji::{ContainerBuilder, KojiCli, KojiSettings};
use bucko_publish::{Publisher, PushPublisher};
use bucko_registry::{ParentResolver, Registry};

/// Factory for the pipeline's external collaborators.
pub trait Collaborators {
    /// Returns the compose metadata reader.
    fn compose_reader(&self) -> Box<dyn ComposeReader>;

    /// Returns a publisher for the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the publish endpoints are not configured.
    fn publisher(&self, config: &Config) -> Result<Box<dyn Publisher>>;

    /// Returns a parent image resolver for the configured registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is not configured.
    fn parent_resolver(&self, config: &Config) -> Result<Box<dyn ParentResolver>>;

    /// Returns a container builder bound to the given build system.
    ///
    /// # Errors
    ///
    /// Returns an error if the build system client is unavailable.
    fn container_builder(&self, settings: &KojiSettings) -> Result<Box<dyn ContainerBuilder>>;
}

/// Production collaborators: HTTP compose reader, push publisher, v2
/// registry client, and the `koji` CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCollaborators;

impl Collaborators for SystemCollaborators {
    fn compose_reader(&self) -> Box<dyn ComposeReader> {
        Box::new(HttpComposeReader::new())
    }

    fn publisher(&self, config: &Config) -> Result<Box<dyn Publisher>> {
        Ok(Box::new(PushPublisher::from_config(config)?))
    }

    fn parent_resolver(&self, config: &Config) -> Result<Box<dyn ParentResolver>> {
        Ok(Box::new(Registry::from_config(config)?))
    }

    fn container_builder(&self, settings: &KojiSettings) -> Result<Box<dyn ContainerBuilder>> {
        Ok(Box::new(KojiCli::new(settings)?))
    }
}
