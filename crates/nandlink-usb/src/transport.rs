//! Reliable byte channel over a raw USB link.
//!
//! The raw link ([`Transport`]) does one transfer attempt per call,
//! bounded by the per-attempt timeout. The helpers in this module
//! layer the retry budget on top: a logical read or write keeps
//! re-issuing attempts, accumulating partial progress, until the
//! buffer is satisfied or [`TRANSFER_ATTEMPTS`] attempts have failed.
//! Short transfers and timeouts are ordinary events on this bus, not
//! faults.

use nandlink_core::{Error, Result};

use crate::protocol::{DeviceProfile, Opcode, TRANSFER_ATTEMPTS};

/// libusb error code for a timed-out transfer.
pub(crate) const LIBUSB_ERROR_TIMEOUT: i32 = -7;

/// One-attempt USB operations plus session state.
///
/// `UsbSession` implements this over rusb; tests implement it with a
/// scripted mock. Each bulk/control call is a single transfer attempt
/// with the per-attempt timeout applied by the implementation.
pub trait Transport {
    /// Issue a vendor command with its 8-byte argument stage.
    fn control_out(&mut self, request: u8, payload: &[u8; 8]) -> Result<()>;

    /// One bulk IN attempt. Returns the bytes actually transferred,
    /// which may be fewer than `buf.len()`.
    fn bulk_in(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// One bulk OUT attempt. Returns the bytes actually transferred.
    fn bulk_out(&mut self, buf: &[u8]) -> Result<usize>;

    /// Whether the session currently holds an open device handle.
    fn is_open(&self) -> bool;

    /// Whether the monitor saw the device drop off the bus.
    fn crashed(&self) -> bool;

    /// Cut target power, wait for the device to settle, reopen.
    fn power_cycle(&mut self) -> Result<()>;

    /// Release the device handle. Idempotent.
    fn release(&mut self) -> Result<()>;

    /// Protocol quirks of the attached model.
    fn profile(&self) -> DeviceProfile;
}

/// Send one command as a single control transfer. Commands are not
/// retried: the device may have executed a command whose ack was
/// lost, and re-sending a non-idempotent one (Write, Erase) would
/// desync the payload stream that follows.
pub fn send_control<T: Transport + ?Sized>(
    link: &mut T,
    opcode: Opcode,
    arg_a: u32,
    arg_b: u32,
) -> Result<()> {
    let payload = crate::protocol::command_payload(arg_a, arg_b);
    link.control_out(opcode as u8, &payload).map_err(|e| {
        log::debug!("command {:?} failed: {}", opcode, e);
        e
    })
}

/// Read exactly `buf.len()` bytes, accumulating short transfers.
pub fn read_exact<T: Transport + ?Sized>(link: &mut T, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    let mut attempts = 0;
    let mut last = Error::Usb(LIBUSB_ERROR_TIMEOUT);
    while filled < buf.len() {
        match link.bulk_in(&mut buf[filled..]) {
            Ok(n) => filled += n,
            Err(e) => {
                log::debug!("bulk in stalled at {}/{} bytes: {}", filled, buf.len(), e);
                last = e;
            }
        }
        attempts += 1;
        if attempts >= TRANSFER_ATTEMPTS && filled < buf.len() {
            return Err(last);
        }
    }
    Ok(())
}

/// Write all of `buf`, accumulating short transfers.
pub fn write_all<T: Transport + ?Sized>(link: &mut T, buf: &[u8]) -> Result<()> {
    let mut sent = 0;
    let mut attempts = 0;
    let mut last = Error::Usb(LIBUSB_ERROR_TIMEOUT);
    while sent < buf.len() {
        match link.bulk_out(&buf[sent..]) {
            Ok(n) => sent += n,
            Err(e) => {
                log::debug!("bulk out stalled at {}/{} bytes: {}", sent, buf.len(), e);
                last = e;
            }
        }
        attempts += 1;
        if attempts >= TRANSFER_ATTEMPTS && sent < buf.len() {
            return Err(last);
        }
    }
    Ok(())
}

/// Read one little-endian status word.
pub fn read_u32<T: Transport + ?Sized>(link: &mut T) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(link, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Discard whatever is queued on the bulk IN endpoint. Stops at the
/// first timed-out attempt, which marks the pipe as empty.
pub fn drain<T: Transport + ?Sized>(link: &mut T) -> Result<()> {
    let mut scratch = [0u8; 512];
    loop {
        match link.bulk_in(&mut scratch) {
            Ok(0) => return Ok(()),
            Ok(n) => log::trace!("drained {} stale bytes", n),
            Err(Error::Usb(LIBUSB_ERROR_TIMEOUT)) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DeviceModel, DeviceProfile};
    use std::collections::VecDeque;

    /// One scripted outcome per transfer attempt.
    enum Step {
        In(Vec<u8>),
        InErr(i32),
        OutAccept(usize),
        OutErr(i32),
    }

    struct MockLink {
        steps: VecDeque<Step>,
        commands: Vec<(u8, [u8; 8])>,
        control_failures: u32,
    }

    impl MockLink {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
                commands: Vec::new(),
                control_failures: 0,
            }
        }
    }

    impl Transport for MockLink {
        fn control_out(&mut self, request: u8, payload: &[u8; 8]) -> Result<()> {
            if self.control_failures > 0 {
                self.control_failures -= 1;
                return Err(Error::Usb(LIBUSB_ERROR_TIMEOUT));
            }
            self.commands.push((request, *payload));
            Ok(())
        }

        fn bulk_in(&mut self, buf: &mut [u8]) -> Result<usize> {
            match self.steps.pop_front() {
                Some(Step::In(data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                Some(Step::InErr(code)) => Err(Error::Usb(code)),
                _ => Err(Error::Usb(LIBUSB_ERROR_TIMEOUT)),
            }
        }

        fn bulk_out(&mut self, buf: &[u8]) -> Result<usize> {
            match self.steps.pop_front() {
                Some(Step::OutAccept(n)) => Ok(n.min(buf.len())),
                Some(Step::OutErr(code)) => Err(Error::Usb(code)),
                _ => Err(Error::Usb(LIBUSB_ERROR_TIMEOUT)),
            }
        }

        fn is_open(&self) -> bool {
            true
        }

        fn crashed(&self) -> bool {
            false
        }

        fn power_cycle(&mut self) -> Result<()> {
            Ok(())
        }

        fn release(&mut self) -> Result<()> {
            Ok(())
        }

        fn profile(&self) -> DeviceProfile {
            DeviceProfile::for_model(DeviceModel::Np100)
        }
    }

    #[test]
    fn read_exact_accumulates_short_transfers() {
        let mut link = MockLink::new(vec![
            Step::In(vec![1, 2]),
            Step::InErr(LIBUSB_ERROR_TIMEOUT),
            Step::In(vec![3, 4, 5]),
        ]);
        let mut buf = [0u8; 5];
        read_exact(&mut link, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn read_exact_gives_up_after_the_budget() {
        let steps = (0..TRANSFER_ATTEMPTS).map(|_| Step::InErr(-4)).collect();
        let mut link = MockLink::new(steps);
        let mut buf = [0u8; 4];
        let err = read_exact(&mut link, &mut buf).unwrap_err();
        assert!(matches!(err, Error::Usb(-4)));
    }

    #[test]
    fn write_all_retries_through_partial_acceptance() {
        let mut link = MockLink::new(vec![
            Step::OutAccept(3),
            Step::OutErr(LIBUSB_ERROR_TIMEOUT),
            Step::OutAccept(5),
        ]);
        write_all(&mut link, &[0u8; 8]).unwrap();
    }

    #[test]
    fn send_control_frames_the_arguments() {
        let mut link = MockLink::new(Vec::new());
        send_control(&mut link, Opcode::Erase, 7, 4).unwrap();
        assert_eq!(link.commands.len(), 1);
        assert_eq!(link.commands[0].0, Opcode::Erase as u8);
        assert_eq!(
            link.commands[0].1,
            [7, 0, 0, 0, 4, 0, 0, 0]
        );
    }

    #[test]
    fn send_control_is_a_single_attempt() {
        let mut link = MockLink::new(Vec::new());
        link.control_failures = 1;
        let err = send_control(&mut link, Opcode::Init, 0, 0).unwrap_err();
        assert!(matches!(err, Error::Usb(LIBUSB_ERROR_TIMEOUT)));
        // The lost command must not have been re-sent.
        assert!(link.commands.is_empty());
    }

    #[test]
    fn drain_stops_at_the_first_timeout() {
        let mut link = MockLink::new(vec![
            Step::In(vec![0xAA; 16]),
            Step::In(vec![0xBB; 4]),
            Step::InErr(LIBUSB_ERROR_TIMEOUT),
        ]);
        drain(&mut link).unwrap();
        assert!(link.steps.is_empty());
    }

    #[test]
    fn read_u32_is_little_endian() {
        let mut link = MockLink::new(vec![Step::In(vec![0x00, 0x01, 0x00, 0x00])]);
        assert_eq!(read_u32(&mut link).unwrap(), 0x100);
    }
}
