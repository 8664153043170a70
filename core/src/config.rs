#[cfg(feature = "config")]
use std::{error::Error, path::Path};

use crate::{AdcError, ChannelId, TimerId, NUM_CHANNELS};

/// Boot policy of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChannelProfile {
    pub id: ChannelId,
    /// Samples to take; 0 samples until deactivated.
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub free_running: bool,
    /// Smoothing window as log2, 0 for raw values.
    #[serde(default)]
    pub smoothing: u8,
}

/// Acquisition set up at boot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AcquisitionProfile {
    /// Trigger frequency in Hz, 0 for software stepped.
    #[serde(default)]
    pub clock_hz: u32,
    /// Trigger timer, the hardware default when absent.
    #[serde(default)]
    pub timer: Option<TimerId>,
    #[serde(default)]
    pub channels: heapless::Vec<ChannelProfile, NUM_CHANNELS>,
}

impl AcquisitionProfile {
    pub fn from_json(json: &[u8]) -> Result<Self, AdcError> {
        serde_json_core::from_slice(json)
            .map(|(profile, _)| profile)
            .map_err(|_| AdcError::Profile)
    }

    /// Reads a TOML profile from `path`, or from the first
    /// `acquisition.toml` found in the working directory or its ancestors.
    #[cfg(feature = "config")]
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let paths = match path {
            Some(p) => vec![p.into()],
            None => std::env::current_dir()?
                .ancestors()
                .map(|path| path.join("acquisition.toml"))
                .collect(),
        };

        let mut last_error = None;

        for path in paths {
            match std::fs::read_to_string(path) {
                Ok(profile) => return Ok(toml::from_str(&profile)?),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .map(Into::into)
            .unwrap_or_else(|| "no acquisition profile found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let profile = AcquisitionProfile::from_json(br#"{"channels":[{"id":2}]}"#).unwrap();

        assert_eq!(profile.clock_hz, 0);
        assert_eq!(profile.timer, None);
        assert_eq!(
            profile.channels.as_slice(),
            [ChannelProfile {
                id: ChannelId(2),
                count: 0,
                free_running: false,
                smoothing: 0
            }]
        );
    }

    #[test]
    fn json_full() {
        let profile = AcquisitionProfile::from_json(
            br#"{"clock_hz":4000,"timer":3,"channels":[{"id":0,"count":10,"smoothing":4},{"id":15,"free_running":true}]}"#,
        )
        .unwrap();

        assert_eq!(profile.clock_hz, 4_000);
        assert_eq!(profile.timer, Some(TimerId(3)));
        assert_eq!(profile.channels.len(), 2);
        assert_eq!(profile.channels[0].smoothing, 4);
        assert!(profile.channels[1].free_running);
    }

    #[test]
    fn json_malformed() {
        assert_eq!(
            AcquisitionProfile::from_json(br#"{"clock_hz":"fast"}"#),
            Err(AdcError::Profile)
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn toml_file() {
        let dir = std::env::temp_dir().join(format!("acquisition-profile-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("acquisition.toml");
        std::fs::write(
            &path,
            r#"
            clock_hz = 1000

            [[channels]]
            id = 3
            count = 5

            [[channels]]
            id = 1
            free_running = true
            smoothing = 2
            "#,
        )
        .unwrap();

        let profile = AcquisitionProfile::load(Some(&path)).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(profile.clock_hz, 1_000);
        assert_eq!(profile.channels[0].id, ChannelId(3));
        assert_eq!(profile.channels[1].smoothing, 2);
    }

    #[cfg(feature = "config")]
    #[test]
    fn missing_file() {
        assert!(AcquisitionProfile::load(Some(Path::new("/nonexistent/acquisition.toml"))).is_err());
    }
}
