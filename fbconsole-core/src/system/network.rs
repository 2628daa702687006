//! Interface enumeration via getifaddrs(3).

use std::net::{SocketAddrV4, SocketAddrV6};

use nix::ifaddrs::getifaddrs;
use nix::net::if_::InterfaceFlags;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkInterface {
    pub name: String,
    pub up: bool,
    pub loopback: bool,
    pub mac: Option<String>,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

/// All interfaces in kernel order, one entry per name.
pub fn list_interfaces() -> nix::Result<Vec<NetworkInterface>> {
    let mut interfaces: Vec<NetworkInterface> = Vec::new();

    for entry in getifaddrs()? {
        let idx = match interfaces.iter().position(|i| i.name == entry.interface_name) {
            Some(idx) => idx,
            None => {
                interfaces.push(NetworkInterface {
                    name: entry.interface_name.clone(),
                    up: entry.flags.contains(InterfaceFlags::IFF_UP),
                    loopback: entry.flags.contains(InterfaceFlags::IFF_LOOPBACK),
                    ..Default::default()
                });
                interfaces.len() - 1
            }
        };
        let iface = &mut interfaces[idx];

        let Some(address) = entry.address else {
            continue;
        };
        if let Some(v4) = address.as_sockaddr_in() {
            iface.ipv4.push(SocketAddrV4::from(*v4).ip().to_string());
        } else if let Some(v6) = address.as_sockaddr_in6() {
            iface.ipv6.push(SocketAddrV6::from(*v6).ip().to_string());
        } else if let Some(mac) = address.as_link_addr().and_then(|l| l.addr()) {
            iface.mac = Some(format_mac(&mac));
        }
    }

    Ok(interfaces)
}

pub fn format_mac(octets: &[u8; 6]) -> String {
    octets
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// First IPv4 address of an interface that is up and not loopback.
pub fn primary_ipv4(interfaces: &[NetworkInterface]) -> Option<String> {
    interfaces
        .iter()
        .filter(|i| i.up && !i.loopback)
        .find_map(|i| i.ipv4.first().cloned())
}
