//! Formatting helpers
//!
//! Turn resource records into single log lines. Fields are `:`-separated,
//! missing optional values print as an empty field.

use crate::gateway::types::*;

/// `k:v,k:v` in key order, skipping `Name` (shown separately)
pub fn tags_string(tags: &Tags) -> String {
    tags.iter()
        .filter(|(k, _)| k.as_str() != "Name")
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

fn name_of(tags: &Tags) -> &str {
    tags.get("Name").map(String::as_str).unwrap_or("")
}

/// `id:name:type:state:public-ip:[tags]`
pub fn instance_line(i: &Instance) -> String {
    format!(
        "{}:{}:{}:{}:{}:[{}]",
        i.instance_id,
        i.name(),
        i.instance_type,
        i.state,
        i.public_ip_address.as_deref().unwrap_or(""),
        tags_string(&i.tags)
    )
}

pub fn state_change_line(c: &InstanceStateChange) -> String {
    format!(
        "{}: {} -> {}",
        c.instance_id, c.previous_state, c.current_state
    )
}

pub fn vpc_line(v: &Vpc) -> String {
    format!(
        "{}:{}:{}:{}",
        v.vpc_id,
        name_of(&v.tags),
        v.cidr_block,
        if v.is_default { "default" } else { "" }
    )
}

pub fn subnet_line(s: &Subnet) -> String {
    format!(
        "{}:{}:{}:{}:{}:free={}",
        s.subnet_id,
        name_of(&s.tags),
        s.vpc_id,
        s.availability_zone,
        s.cidr_block,
        s.available_ip_address_count
    )
}

pub fn security_group_line(g: &SecurityGroup) -> String {
    format!(
        "{}:{}:{}:{}",
        g.group_id, g.group_name, g.vpc_id, g.description
    )
}

pub fn network_interface_line(n: &NetworkInterface) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}",
        n.network_interface_id,
        n.vpc_id,
        n.subnet_id,
        n.status,
        n.private_ip_address.as_deref().unwrap_or(""),
        n.public_ip_address.as_deref().unwrap_or(""),
        n.instance_id.as_deref().unwrap_or("")
    )
}

pub fn volume_line(v: &Volume) -> String {
    format!(
        "{}:{}:{}GiB:{}:{}:{}:{}",
        v.volume_id,
        name_of(&v.tags),
        v.size,
        v.volume_type,
        v.state,
        v.availability_zone,
        v.instance_id.as_deref().unwrap_or("")
    )
}

pub fn image_line(i: &Image) -> String {
    let created = i
        .creation_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    format!(
        "{}:{}:{}:{}:{}",
        i.image_id, i.name, i.architecture, i.owner_id, created
    )
}
