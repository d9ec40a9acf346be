//! Host stand-ins for the radio, discovery and update peripherals.
//!
//! A host is already on a network, so [`HostRadio`] only decides whether a
//! stored network counts as reachable. [`LogAdvertiser`] reports the
//! advertised name through tracing. [`DropDirUpdates`] installs an image
//! that an operator drops into a directory.

use std::{
    fs,
    path::{Path, PathBuf},
};

use safelock_core::{
    NetworkCredentials, PlatformError, UpdatePoll,
    platform::{Advertiser, Radio, UpdateChannel},
};
use tracing::{debug, info};

/// Radio that joins only networks listed as reachable.
///
/// An empty list means any stored network is reachable.
#[derive(Debug, Clone)]
pub struct HostRadio {
    chip_id: u32,
    reachable: Vec<NetworkCredentials>,
    associated: bool,
    hosting: Option<String>,
}

impl HostRadio {
    /// Radio with hardware id `chip_id`.
    pub fn new(chip_id: u32, reachable: Vec<NetworkCredentials>) -> Self {
        Self { chip_id, reachable, associated: false, hosting: None }
    }

    /// Name of the standalone network being hosted, if any.
    pub fn hosting(&self) -> Option<&str> {
        self.hosting.as_deref()
    }
}

impl Radio for HostRadio {
    fn chip_id(&self) -> u32 {
        self.chip_id
    }

    fn associate(&mut self, credentials: &NetworkCredentials) -> Result<(), PlatformError> {
        self.hosting = None;
        self.associated = self.reachable.is_empty() || self.reachable.contains(credentials);
        info!(network = %credentials.name, reachable = self.associated, "associating");
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        self.associated
    }

    fn host_standalone(&mut self, name: &str) -> Result<(), PlatformError> {
        info!(network = name, "hosting standalone network");
        self.associated = false;
        self.hosting = Some(name.to_string());
        Ok(())
    }
}

/// Advertiser that records the announced name in the log.
#[derive(Debug, Clone, Default)]
pub struct LogAdvertiser {
    current: Option<String>,
}

impl LogAdvertiser {
    /// Name last advertised.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

impl Advertiser for LogAdvertiser {
    fn advertise(&mut self, name: &str) -> Result<(), PlatformError> {
        info!("advertising {name}.local");
        self.current = Some(name.to_string());
        Ok(())
    }
}

/// File that an operator drops into the update directory.
pub const IMAGE_NAME: &str = "firmware.bin";

/// Where an accepted image is moved.
pub const INSTALLED_NAME: &str = "installed.bin";

/// Update channel watching a directory for a firmware image.
///
/// Without a directory the channel never delivers anything.
#[derive(Debug, Clone, Default)]
pub struct DropDirUpdates {
    dir: Option<PathBuf>,
}

impl DropDirUpdates {
    /// Watch `dir` for [`IMAGE_NAME`].
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    fn install(dir: &Path) -> Result<UpdatePoll, PlatformError> {
        let image = dir.join(IMAGE_NAME);
        if !image.is_file() {
            return Ok(UpdatePoll::Idle);
        }

        fs::rename(&image, dir.join(INSTALLED_NAME))?;
        info!(image = %image.display(), "firmware image installed");
        Ok(UpdatePoll::Installed)
    }
}

impl UpdateChannel for DropDirUpdates {
    fn poll(&mut self, device_name: &str) -> Result<UpdatePoll, PlatformError> {
        let Some(dir) = &self.dir else {
            return Ok(UpdatePoll::Idle);
        };
        debug!(device = device_name, "checking for firmware image");
        Self::install(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> NetworkCredentials {
        NetworkCredentials { name: "home".into(), credential: "pw".into() }
    }

    #[test]
    fn joins_only_reachable_networks() {
        let mut radio = HostRadio::new(7, vec![home()]);

        radio.associate(&home()).unwrap();
        assert!(radio.is_associated());

        let other = NetworkCredentials { name: "home".into(), credential: "wrong".into() };
        radio.associate(&other).unwrap();
        assert!(!radio.is_associated());
    }

    #[test]
    fn empty_list_reaches_anything() {
        let mut radio = HostRadio::new(7, Vec::new());
        radio.associate(&home()).unwrap();
        assert!(radio.is_associated());
        assert_eq!(radio.chip_id(), 7);
    }

    #[test]
    fn hosting_drops_association() {
        let mut radio = HostRadio::new(7, Vec::new());
        radio.associate(&home()).unwrap();
        radio.host_standalone("Safe-000007").unwrap();

        assert!(!radio.is_associated());
        assert_eq!(radio.hosting(), Some("Safe-000007"));
    }

    #[test]
    fn advertiser_remembers_name() {
        let mut advertiser = LogAdvertiser::default();
        advertiser.advertise("vault").unwrap();
        assert_eq!(advertiser.current(), Some("vault"));
    }

    #[test]
    fn dropped_image_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut updates = DropDirUpdates::new(Some(dir.path().to_path_buf()));
        assert_eq!(updates.poll("safe").unwrap(), UpdatePoll::Idle);

        fs::write(dir.path().join(IMAGE_NAME), b"image").unwrap();
        assert_eq!(updates.poll("safe").unwrap(), UpdatePoll::Installed);
        assert_eq!(updates.poll("safe").unwrap(), UpdatePoll::Idle);
        assert!(dir.path().join(INSTALLED_NAME).is_file());
    }

    #[test]
    fn no_directory_never_installs() {
        let mut updates = DropDirUpdates::default();
        assert_eq!(updates.poll("safe").unwrap(), UpdatePoll::Idle);
    }
}
