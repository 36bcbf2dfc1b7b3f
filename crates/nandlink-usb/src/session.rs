//! USB session management over rusb.
//!
//! A [`UsbSession`] owns the libusb context, the claimed device handle
//! and a hotplug monitor that flags the session as crashed if the
//! adapter drops off the bus mid-operation. It implements the raw
//! [`Transport`] seam; all retry logic lives above it in
//! [`crate::transport`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nandlink_core::{Error, Result};
use rusb::{Context, Device, DeviceHandle, HotplugBuilder, Registration, UsbContext};

use crate::protocol::{
    DeviceModel, DeviceProfile, ATTEMPT_TIMEOUT_MS, BULK_IN_EP, BULK_OUT_EP, NP_USB_VENDOR,
    POWER_CYCLE_DELAY_MS, REQTYPE_CMD_OUT, USB_INTERFACE,
};
use crate::transport::Transport;

/// Map an rusb error to the underlying libusb code.
fn libusb_code(e: rusb::Error) -> i32 {
    match e {
        rusb::Error::Io => -1,
        rusb::Error::InvalidParam => -2,
        rusb::Error::Access => -3,
        rusb::Error::NoDevice => -4,
        rusb::Error::NotFound => -5,
        rusb::Error::Busy => -6,
        rusb::Error::Timeout => -7,
        rusb::Error::Overflow => -8,
        rusb::Error::Pipe => -9,
        rusb::Error::Interrupted => -10,
        rusb::Error::NoMem => -11,
        rusb::Error::NotSupported => -12,
        rusb::Error::BadDescriptor | rusb::Error::Other => -99,
    }
}

fn usb_err(e: rusb::Error) -> Error {
    Error::Usb(libusb_code(e))
}

/// Hotplug callback that records unexpected disconnects.
struct CrashMonitor {
    crashed: Arc<AtomicBool>,
}

impl rusb::Hotplug<Context> for CrashMonitor {
    fn device_arrived(&mut self, _device: Device<Context>) {}

    fn device_left(&mut self, device: Device<Context>) {
        if let Ok(desc) = device.device_descriptor() {
            if desc.vendor_id() == NP_USB_VENDOR {
                log::error!("programmer left the bus mid-session");
                self.crashed.store(true, Ordering::SeqCst);
            }
        }
    }
}

/// An open, claimed programmer session.
pub struct UsbSession {
    context: Context,
    handle: Option<DeviceHandle<Context>>,
    profile: DeviceProfile,
    crashed: Arc<AtomicBool>,
    monitor: Option<Registration<Context>>,
}

impl UsbSession {
    /// Find the first attached programmer, claim its interface and
    /// power the target on.
    pub fn open() -> Result<Self> {
        let context = Context::new().map_err(usb_err)?;
        let crashed = Arc::new(AtomicBool::new(false));

        let monitor = if rusb::has_hotplug() {
            match HotplugBuilder::new()
                .vendor_id(NP_USB_VENDOR)
                .register(
                    context.clone(),
                    Box::new(CrashMonitor {
                        crashed: crashed.clone(),
                    }),
                ) {
                Ok(reg) => Some(reg),
                Err(e) => {
                    log::warn!("hotplug monitor unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        // First contact may find the device mid-protocol from an
        // interrupted run; cycle it once so the session starts clean.
        {
            let (handle, _) = Self::find_device(&context)?;
            drop(handle);
        }
        std::thread::sleep(Duration::from_millis(POWER_CYCLE_DELAY_MS));
        let (handle, profile) = Self::find_device(&context)?;

        Ok(Self {
            context,
            handle: Some(handle),
            profile,
            crashed,
            monitor,
        })
    }

    fn find_device(context: &Context) -> Result<(DeviceHandle<Context>, DeviceProfile)> {
        for device in context.devices().map_err(usb_err)?.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if desc.vendor_id() != NP_USB_VENDOR {
                continue;
            }
            let model = match DeviceModel::from_product_id(desc.product_id()) {
                Some(m) => m,
                None => continue,
            };
            let mut handle = device.open().map_err(usb_err)?;
            let _ = handle.set_auto_detach_kernel_driver(true);
            handle.claim_interface(USB_INTERFACE).map_err(usb_err)?;
            log::info!(
                "opened {} at bus {:03} device {:03}",
                model,
                device.bus_number(),
                device.address()
            );
            return Ok((handle, DeviceProfile::for_model(model)));
        }
        Err(Error::NoDeviceFound)
    }

    fn handle(&self) -> Result<&DeviceHandle<Context>> {
        self.handle.as_ref().ok_or(Error::DeviceNotInitialized)
    }

    fn raw_control(&mut self, request: u8, payload: &[u8; 8]) -> Result<()> {
        let timeout = Duration::from_millis(ATTEMPT_TIMEOUT_MS);
        let written = self
            .handle()?
            .write_control(REQTYPE_CMD_OUT, request, 0, 0, payload, timeout)
            .map_err(usb_err)?;
        if written != payload.len() {
            return Err(Error::Usb(libusb_code(rusb::Error::Io)));
        }
        Ok(())
    }
}

impl Transport for UsbSession {
    fn control_out(&mut self, request: u8, payload: &[u8; 8]) -> Result<()> {
        self.raw_control(request, payload)
    }

    fn bulk_in(&mut self, buf: &mut [u8]) -> Result<usize> {
        let timeout = Duration::from_millis(ATTEMPT_TIMEOUT_MS);
        self.handle()?
            .read_bulk(BULK_IN_EP, buf, timeout)
            .map_err(usb_err)
    }

    fn bulk_out(&mut self, buf: &[u8]) -> Result<usize> {
        let timeout = Duration::from_millis(ATTEMPT_TIMEOUT_MS);
        self.handle()?
            .write_bulk(BULK_OUT_EP, buf, timeout)
            .map_err(usb_err)
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    fn power_cycle(&mut self) -> Result<()> {
        log::debug!("power cycling target");
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.release_interface(USB_INTERFACE) {
                log::warn!("interface release before power cycle failed: {}", e);
            }
            // Closing the handle cuts interface power to the target.
        }
        std::thread::sleep(Duration::from_millis(POWER_CYCLE_DELAY_MS));
        let (handle, profile) = Self::find_device(&self.context)?;
        self.profile = profile;
        self.handle = Some(handle);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        // A released session no longer owns the device; dropping the
        // registration stops crash callbacks for it.
        drop(self.monitor.take());
        let handle = match self.handle.take() {
            Some(h) => h,
            None => return Ok(()),
        };
        if let Err(e) = handle.release_interface(USB_INTERFACE) {
            log::warn!("interface release failed: {}", e);
        }
        // Reset so the next open sees the device in its power-on
        // state rather than mid-protocol.
        if let Err(e) = handle.reset() {
            log::error!("device reset failed: {}", e);
            return Err(Error::ResetFailed);
        }
        Ok(())
    }

    fn profile(&self) -> DeviceProfile {
        self.profile
    }
}

impl Drop for UsbSession {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn libusb_codes_match_the_c_enum() {
        assert_eq!(libusb_code(rusb::Error::Timeout), -7);
        assert_eq!(libusb_code(rusb::Error::NoDevice), -4);
        assert_eq!(libusb_code(rusb::Error::Pipe), -9);
    }
}
