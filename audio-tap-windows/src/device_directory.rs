//! Audio endpoint directory built from the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list render and capture endpoints in a
//! fixed order: default output first, all active outputs, default input
//! (when one exists), all active inputs. Defaults get fixed labels; other
//! endpoints carry their friendly name behind an `Output: `/`Input: `
//! prefix.

use windows::core::*;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::StructuredStorage::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Variant::*;

use audio_tap_core::models::device::{DeviceDirectory, DeviceEntry, DeviceFlow};
use audio_tap_core::models::error::CaptureError;

/// Owned MMDevice endpoint handle stored in directory entries.
pub struct WasapiDevice {
    raw: IMMDevice,
}

impl WasapiDevice {
    pub(crate) fn raw(&self) -> &IMMDevice {
        &self.raw
    }
}

/// Build the endpoint directory.
///
/// Requires COM to be initialized on the calling thread (see
/// [`crate::com::initialize_mta`]). An endpoint whose friendly name cannot
/// be read is skipped and enumeration continues; a failure of the
/// enumeration itself is fatal.
pub fn enumerate_devices() -> Result<DeviceDirectory<WasapiDevice>, CaptureError> {
    unsafe {
        let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| CaptureError::platform("CoCreateInstance(MMDeviceEnumerator)", e))?;

        let mut entries = Vec::new();

        let default_render = enumerator
            .GetDefaultAudioEndpoint(eRender, eConsole)
            .map_err(|_| CaptureError::DeviceNotAvailable)?;
        entries.push(DeviceEntry {
            handle: WasapiDevice { raw: default_render },
            flow: DeviceFlow::Output,
            is_default: true,
            name: "Default output (System Sound)".into(),
        });
        push_endpoints(&enumerator, eRender, DeviceFlow::Output, "Output: ", &mut entries)?;

        // Machines without any input endpoint still capture system sound.
        if let Ok(default_capture) = enumerator.GetDefaultAudioEndpoint(eCapture, eConsole) {
            entries.push(DeviceEntry {
                handle: WasapiDevice {
                    raw: default_capture,
                },
                flow: DeviceFlow::Input,
                is_default: true,
                name: "Default input (Microphone)".into(),
            });
        }
        push_endpoints(&enumerator, eCapture, DeviceFlow::Input, "Input: ", &mut entries)?;

        Ok(DeviceDirectory::new(entries))
    }
}

unsafe fn push_endpoints(
    enumerator: &IMMDeviceEnumerator,
    data_flow: EDataFlow,
    flow: DeviceFlow,
    prefix: &str,
    entries: &mut Vec<DeviceEntry<WasapiDevice>>,
) -> Result<(), CaptureError> {
    let collection = enumerator
        .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
        .map_err(|e| CaptureError::platform("IMMDeviceEnumerator::EnumAudioEndpoints", e))?;

    let count = collection
        .GetCount()
        .map_err(|e| CaptureError::platform("IMMDeviceCollection::GetCount", e))?;

    for i in 0..count {
        let device = match collection.Item(i) {
            Ok(d) => d,
            Err(_) => continue,
        };

        // Best effort: no readable name, no entry.
        let Some(name) = friendly_name(&device) else {
            continue;
        };

        entries.push(DeviceEntry {
            handle: WasapiDevice { raw: device },
            flow,
            is_default: false,
            name: format!("{}{}", prefix, name),
        });
    }

    Ok(())
}

/// Read `PKEY_Device_FriendlyName` from an endpoint's property store.
unsafe fn friendly_name(device: &IMMDevice) -> Option<String> {
    let store = device.OpenPropertyStore(STGM_READ).ok()?;

    let mut prop_variant = std::mem::zeroed::<PROPVARIANT>();
    store
        .GetValue(&PKEY_Device_FriendlyName, &mut prop_variant)
        .ok()?;

    let name = if prop_variant.Anonymous.Anonymous.vt == VT_LPWSTR {
        let pwsz = prop_variant.Anonymous.Anonymous.Anonymous.pwszVal;
        if !pwsz.is_null() {
            let len = (0..).take_while(|&i| *pwsz.offset(i) != 0).count();
            Some(String::from_utf16_lossy(std::slice::from_raw_parts(
                pwsz, len,
            )))
        } else {
            None
        }
    } else {
        None
    };

    PropVariantClear(&mut prop_variant).ok();
    name
}
