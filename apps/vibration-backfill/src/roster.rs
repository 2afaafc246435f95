use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// Measured quantities reported by the vibration sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    VRms,
    ARms,
    APeak,
    Temperature,
}

impl SignalKind {
    /// Order in which data points are requested from CoNNXT.
    pub const REQUESTED: [SignalKind; 4] = [
        SignalKind::Temperature,
        SignalKind::VRms,
        SignalKind::ARms,
        SignalKind::APeak,
    ];

    /// Storage name used by CoNNXT for this data point.
    pub fn storage_name(self) -> &'static str {
        match self {
            SignalKind::VRms => "VRms",
            SignalKind::ARms => "ARms",
            SignalKind::APeak => "APeak",
            SignalKind::Temperature => "Temperature",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalStream {
    pub signal: SignalKind,
    pub stream_id: Uuid,
}

/// One physical sensor and the Lizard timeseries each of its signals feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSensorMapping {
    pub device_id: i64,
    pub streams: Vec<SignalStream>,
}

impl DeviceSensorMapping {
    #[cfg(test)]
    pub fn stream_for(&self, signal: SignalKind) -> Option<Uuid> {
        self.streams
            .iter()
            .find(|entry| entry.signal == signal)
            .map(|entry| entry.stream_id)
    }
}

fn mapping(device_id: i64, streams: [(SignalKind, u128); 4]) -> DeviceSensorMapping {
    DeviceSensorMapping {
        device_id,
        streams: streams
            .into_iter()
            .map(|(signal, id)| SignalStream {
                signal,
                stream_id: Uuid::from_u128(id),
            })
            .collect(),
    }
}

/// Sensors deployed at the pumping stations.
pub fn default_roster() -> Vec<DeviceSensorMapping> {
    vec![
        mapping(
            609,
            [
                (SignalKind::VRms, 0xb0e7d746_638c_4d8f_b065_087237f7e132),
                (SignalKind::ARms, 0x278f37a2_bc83_458d_8799_9f14a29bcb03),
                (SignalKind::APeak, 0x91926892_97b6_4e48_9923_421a428b1859),
                (SignalKind::Temperature, 0x59253408_eb82_4c3e_8175_d7c840f45003),
            ],
        ),
        mapping(
            610,
            [
                (SignalKind::VRms, 0x2395a532_d23b_4d5b_b7a6_e0b07e07703c),
                (SignalKind::ARms, 0x234af6e6_441a_4954_8c67_1dd4fbec9b39),
                (SignalKind::APeak, 0xbdbe77bf_d21d_4509_ae80_42bcf9578e44),
                (SignalKind::Temperature, 0x0c72012c_1fa6_4071_8561_5c0e774901ab),
            ],
        ),
    ]
}

pub fn load_roster(path: &Path) -> Result<Vec<DeviceSensorMapping>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster {}", path.display()))?;
    let roster: Vec<DeviceSensorMapping> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse roster {}", path.display()))?;
    validate_roster(&roster)?;
    Ok(roster)
}

pub fn validate_roster(roster: &[DeviceSensorMapping]) -> Result<()> {
    if roster.is_empty() {
        bail!("roster has no devices");
    }
    let mut devices = HashSet::new();
    for device in roster {
        if !devices.insert(device.device_id) {
            bail!("device {} is listed more than once", device.device_id);
        }
        let mut signals = HashSet::new();
        for entry in &device.streams {
            if !signals.insert(entry.signal) {
                bail!(
                    "device {} maps signal {} more than once",
                    device.device_id,
                    entry.signal
                );
            }
        }
    }
    Ok(())
}
