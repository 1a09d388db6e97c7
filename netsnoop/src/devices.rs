use std::net::IpAddr;

#[derive(Debug, thiserror::Error)]
#[error("cannot list capture devices: {0}")]
pub struct EnumerationError(String);

/// One capture-capable interface.
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub description: Option<String>,
    pub addresses: Vec<IpAddr>,
}

impl From<pcap::Device> for Interface {
    fn from(device: pcap::Device) -> Self {
        Self {
            name: device.name,
            description: device.desc,
            addresses: device.addresses.into_iter().map(|a| a.addr).collect(),
        }
    }
}

/// Snapshot of the interfaces present at the time of listing.
///
/// Owns a copy of the libpcap device list; the native list is already freed.
#[derive(Debug, Default)]
pub struct InterfaceList {
    interfaces: Vec<Interface>,
}

impl InterfaceList {
    pub fn new(interfaces: Vec<Interface>) -> Self {
        Self { interfaces }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interface> {
        self.interfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }
}

impl<'a> IntoIterator for &'a InterfaceList {
    type Item = &'a Interface;
    type IntoIter = std::slice::Iter<'a, Interface>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// List the interfaces libpcap can capture on.
pub fn list_devices() -> Result<InterfaceList, EnumerationError> {
    let devices = pcap::Device::list().map_err(|e| EnumerationError(e.to_string()))?;
    let list = InterfaceList::new(devices.into_iter().map(Interface::from).collect());
    tracing::debug!("Found {} capture devices", list.len());
    Ok(list)
}
