// components/orchestrator/src/nameserver.rs
use crate::error::{DeployError, Result};
use deployment_model::{Deployment, Role};
use remote_exec::{ExecRequest, ExecTarget, Executor, ParamBag};
use std::net::{IpAddr, Ipv4Addr};
use tracing::{info, warn};

const ADDRESS_QUERY: &str = "ip -4 addr show";

/// Address the deployed nameserver will answer on
///
/// Taken from the nameserver's `ip_addr` setting when present, otherwise
/// asked of the nameserver machine itself, otherwise resolved from here.
/// `None` when the deployment does not deploy DNS.
pub async fn nameserver_address(
    deployment: &Deployment,
    executor: &dyn Executor,
) -> Result<Option<String>> {
    if !deployment.deploys_dns() {
        return Ok(None);
    }
    let Some(nameserver) = deployment.hosts_with_role(Role::NameServer).next() else {
        return Ok(None);
    };
    if let Some(ip) = nameserver.attribute("ip_addr") {
        return Ok(Some(ip));
    }

    let target = ExecTarget::new(&nameserver.ssh_host, &nameserver.user);
    let request = ExecRequest::new(ADDRESS_QUERY, ParamBag::default());
    match executor.execute(&target, &request).await {
        Ok(output) if output.success() => {
            if let Some(ip) = pick_address(&output.stdout) {
                info!("Nameserver {} answers on {}", nameserver.host, ip);
                return Ok(Some(ip.to_string()));
            }
            warn!("No usable address reported by {}", nameserver.host);
        }
        Ok(output) => warn!(
            "Address query on {} exited with {}",
            nameserver.host, output.exit_code
        ),
        Err(e) => warn!("Address query on {} failed: {}", nameserver.host, e),
    }

    warn!("Falling back to resolving {} from this machine", nameserver.host);
    let resolved = tokio::net::lookup_host((nameserver.host.as_str(), 22))
        .await
        .ok()
        .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()))
        .map(|a| a.ip());
    match resolved {
        Some(IpAddr::V4(ip)) if usable(&ip) => Ok(Some(ip.to_string())),
        _ => Err(DeployError::NameserverAddress {
            host: nameserver.host.clone(),
        }),
    }
}

/// Loopback, broadcast and netmask-looking addresses are skipped
fn usable(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    !ip.is_loopback() && octets[0] != 255 && octets[2] != 255
}

/// First usable address from `ip -4 addr show` output
pub(crate) fn pick_address(listing: &str) -> Option<Ipv4Addr> {
    listing
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            while let Some(word) = words.next() {
                if word == "inet" {
                    return words.next();
                }
            }
            None
        })
        .filter_map(|cidr| cidr.split('/').next()?.parse::<Ipv4Addr>().ok())
        .find(usable)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN group default qlen 1000
    inet 127.0.0.1/8 scope host lo
       valid_lft forever preferred_lft forever
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc fq_codel state UP group default qlen 1000
    inet 192.168.122.15/24 brd 192.168.122.255 scope global dynamic eth0
       valid_lft 3387sec preferred_lft 3387sec
";

    #[test]
    fn skips_loopback() {
        assert_eq!(pick_address(LISTING), Some(Ipv4Addr::new(192, 168, 122, 15)));
    }

    #[test]
    fn skips_netmask_looking_addresses() {
        let listing = "    inet 10.0.255.3/16 scope global eth1\n    inet 10.1.2.3/16 scope global eth2\n";
        assert_eq!(pick_address(listing), Some(Ipv4Addr::new(10, 1, 2, 3)));
    }

    #[test]
    fn nothing_usable_yields_none() {
        assert_eq!(pick_address("    inet 127.0.0.1/8 scope host lo\n"), None);
        assert_eq!(pick_address(""), None);
    }
}
