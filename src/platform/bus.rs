//! The expansion bus.
//!
//! Devices are registered with a [`DeviceKind`] and a base IO port.
//! Signals are routed by kind to the first matching device.

/// Maximum number of devices on a [`DeviceBus`].
pub const MAX_DEVICES: usize = 16;

/// Kinds of devices that can sit on the bus.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum DeviceKind {
    #[allow(missing_docs)]
    Keyboard,
    #[allow(missing_docs)]
    Mouse,
    #[allow(missing_docs)]
    HardDisk,
}
impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Keyboard => f.write_str("keyboard"),
            DeviceKind::Mouse    => f.write_str("mouse"),
            DeviceKind::HardDisk => f.write_str("hard disk"),
        }
    }
}

/// A device registered on the bus.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Device {
    /// What the device is.
    pub kind: DeviceKind,
    /// The first IO port the device answers on.
    pub port_base: u16
}

/// Errors from bus operations.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BusErr {
    /// [`MAX_DEVICES`] devices are already registered.
    Full,
    /// No registered device has the requested kind.
    NoDevice(DeviceKind),
}
impl std::fmt::Display for BusErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusErr::Full => write!(f, "bus already has {MAX_DEVICES} devices"),
            BusErr::NoDevice(k) => write!(f, "no {k} device on the bus"),
        }
    }
}
impl std::error::Error for BusErr {}

/// The device registry.
#[derive(Debug, Default, Clone)]
pub struct DeviceBus {
    devices: Vec<Device>
}
impl DeviceBus {
    /// Creates a bus with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device, returning its ID.
    pub fn register(&mut self, device: Device) -> Result<usize, BusErr> {
        if self.devices.len() >= MAX_DEVICES {
            return Err(BusErr::Full);
        }

        let dev_id = self.devices.len();
        self.devices.push(device);
        log::info!("registered {} device at port 0x{:X}", device.kind, device.port_base);
        Ok(dev_id)
    }

    /// Sends a signal to the first registered device of the given kind,
    /// returning that device.
    pub fn send_signal(&self, kind: DeviceKind, signal: u8) -> Result<&Device, BusErr> {
        let device = self.devices.iter()
            .find(|d| d.kind == kind)
            .ok_or(BusErr::NoDevice(kind))?;

        log::debug!("sent signal 0x{signal:02X} to {kind} device at port 0x{:X}", device.port_base);
        Ok(device)
    }

    /// Gets a device by its ID.
    pub fn get(&self, dev_id: usize) -> Option<&Device> {
        self.devices.get(dev_id)
    }

    /// All registered devices, in registration order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }
}

#[cfg(test)]
mod tests {
    use super::{BusErr, Device, DeviceBus, DeviceKind, MAX_DEVICES};

    #[test]
    fn test_register_and_signal() {
        let mut bus = DeviceBus::new();
        assert_eq!(bus.send_signal(DeviceKind::Keyboard, 1), Err(BusErr::NoDevice(DeviceKind::Keyboard)));

        let kb1 = Device { kind: DeviceKind::Keyboard, port_base: 0x60 };
        let kb2 = Device { kind: DeviceKind::Keyboard, port_base: 0x64 };
        let hd = Device { kind: DeviceKind::HardDisk, port_base: 0x1F0 };
        assert_eq!(bus.register(kb1), Ok(0));
        assert_eq!(bus.register(hd), Ok(1));
        assert_eq!(bus.register(kb2), Ok(2));

        // first match wins
        assert_eq!(bus.send_signal(DeviceKind::Keyboard, 0xAA), Ok(&kb1));
        assert_eq!(bus.send_signal(DeviceKind::HardDisk, 0x20), Ok(&hd));
        assert_eq!(bus.send_signal(DeviceKind::Mouse, 0), Err(BusErr::NoDevice(DeviceKind::Mouse)));
        assert_eq!(bus.get(2), Some(&kb2));
    }

    #[test]
    fn test_full() {
        let mut bus = DeviceBus::new();
        let mouse = Device { kind: DeviceKind::Mouse, port_base: 0x2F8 };
        for _ in 0..MAX_DEVICES {
            bus.register(mouse).unwrap();
        }
        assert_eq!(bus.register(mouse), Err(BusErr::Full));
        assert_eq!(bus.devices().len(), MAX_DEVICES);
    }
}
