use serde::{Deserialize, Serialize};

/// Data-flow direction of an audio endpoint.
///
/// `Output` endpoints are captured in loopback mode (the mix being played
/// to the device); `Input` endpoints are captured directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFlow {
    Output,
    Input,
}

/// One selectable audio endpoint.
///
/// `H` is the platform backend's device handle type.
#[derive(Debug)]
pub struct DeviceEntry<H> {
    pub handle: H,
    pub flow: DeviceFlow,
    pub is_default: bool,
    /// Human-readable label for device pickers.
    pub name: String,
}

/// Ordered list of capturable endpoints, built by a platform backend and
/// passed into `CaptureSession`.
///
/// Owns its entries for the lifetime of the directory; sessions select one
/// entry by index.
#[derive(Debug)]
pub struct DeviceDirectory<H> {
    entries: Vec<DeviceEntry<H>>,
}

impl<H> DeviceDirectory<H> {
    pub fn new(entries: Vec<DeviceEntry<H>>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DeviceEntry<H>] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&DeviceEntry<H>> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels in entry order, for presenting a device picker.
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> DeviceDirectory<u8> {
        DeviceDirectory::new(vec![
            DeviceEntry {
                handle: 0,
                flow: DeviceFlow::Output,
                is_default: true,
                name: "Default output (System Sound)".into(),
            },
            DeviceEntry {
                handle: 1,
                flow: DeviceFlow::Input,
                is_default: false,
                name: "Input: Headset".into(),
            },
        ])
    }

    #[test]
    fn selects_by_index() {
        let dir = directory();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get(0).unwrap().flow, DeviceFlow::Output);
        assert_eq!(dir.get(1).unwrap().flow, DeviceFlow::Input);
        assert!(dir.get(2).is_none());
    }

    #[test]
    fn labels_follow_entry_order() {
        let labels = directory().labels();
        assert_eq!(
            labels,
            vec!["Default output (System Sound)", "Input: Headset"]
        );
    }
}
