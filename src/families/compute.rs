//! Compute family (`ec2.*`)
//!
//! Instance lifecycle, volumes, images and read-only network listings.

use super::{non_empty, Op};
use crate::format;
use crate::gateway::{ComputeGateway, ImageQuery, InstanceFilter, InstanceSpec, Tags};
use crate::poller::FulfillmentPoller;
use crate::session::Session;
use anyhow::{anyhow, Result};
use base64::Engine;
use serde::Deserialize;
use std::str::FromStr;

/// Fixed marker tag on every instance this service launches
pub const MARKER_TAG: (&str, &str) = ("cloudbox", "yes");

const DEFAULT_VOLUME_SIZE: i32 = 8;
const DEFAULT_DEVICE: &str = "/dev/sdf";
const DEFAULT_ARCH: &str = "x86_64";
const DEFAULT_DISTRO: &str = "amazon";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Vpcs,
    Subnets,
    SecurityGroups,
    NetworkInterfaces,
    Volumes,
    Images,
    Instances,
    SpotRequest,
    Run,
    Start,
    Stop,
    Terminate,
    Rename,
    CreateVolume,
    DeleteVolume,
    AttachVolume,
    DetachVolume,
    Change,
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "vpcs" => Self::Vpcs,
            "subnets" => Self::Subnets,
            "sgs" => Self::SecurityGroups,
            "nics" => Self::NetworkInterfaces,
            "vols" => Self::Volumes,
            "images" => Self::Images,
            "describe" | "instances" => Self::Instances,
            "spotrequest" => Self::SpotRequest,
            "run" => Self::Run,
            "start" => Self::Start,
            "stop" => Self::Stop,
            "terminate" => Self::Terminate,
            "rename" => Self::Rename,
            "createvolume" => Self::CreateVolume,
            "deletevolume" => Self::DeleteVolume,
            "attachvolume" => Self::AttachVolume,
            "detachvolume" => Self::DetachVolume,
            "change" => Self::Change,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Params {
    #[serde(rename = "instanceid")]
    pub instance_id: Option<String>,
    #[serde(rename = "instanceids")]
    pub instance_ids: Vec<String>,
    #[serde(rename = "vpcid")]
    pub vpc_id: Option<String>,
    #[serde(rename = "subnetid")]
    pub subnet_id: Option<String>,
    #[serde(rename = "associatepublicip")]
    pub associate_public_ip: Option<bool>,
    #[serde(rename = "imageid")]
    pub image_id: Option<String>,
    #[serde(rename = "instancetype")]
    pub instance_type: Option<String>,
    #[serde(rename = "keyname")]
    pub key_name: Option<String>,
    #[serde(rename = "securitygroupids")]
    pub security_group_ids: Vec<String>,
    #[serde(rename = "availabilityzone", alias = "az")]
    pub availability_zone: Option<String>,
    #[serde(rename = "volumeid")]
    pub volume_id: Option<String>,
    pub device: Option<String>,
    #[serde(rename = "userdatafile")]
    pub user_data_file: Option<String>,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub tags: Option<Tags>,
    #[serde(rename = "volumesize")]
    pub volume_size: Option<i32>,
    #[serde(rename = "profilearn")]
    pub profile_arn: Option<String>,
    pub arch: Option<String>,
    pub distro: Option<String>,
    pub count: Option<u32>,
    pub nics: Vec<String>,
    pub force: Option<bool>,
}

impl Params {
    /// `instanceids` plus `instanceid`
    fn all_instance_ids(&self) -> Result<Vec<String>> {
        let mut ids = self.instance_ids.clone();
        if let Some(id) = non_empty(&self.instance_id) {
            ids.push(id.to_string());
        }
        if ids.is_empty() {
            return Err(anyhow!("no instance ids"));
        }
        Ok(ids)
    }
}

pub async fn handle(
    session: &mut Session,
    compute: &dyn ComputeGateway,
    poller: &FulfillmentPoller,
    op: Op<Verb, Params>,
) {
    let p = &op.params;
    match op.verb {
        Verb::Vpcs => {
            let result = compute.describe_vpcs().await;
            log_records(session, "DescribeVpcs", result, format::vpc_line);
        }
        Verb::Subnets => {
            let vpc = vpc_filter(session, p);
            let result = compute.describe_subnets(vpc).await;
            log_records(session, "DescribeSubnets", result, format::subnet_line);
        }
        Verb::SecurityGroups => {
            let vpc = vpc_filter(session, p);
            let result = compute.describe_security_groups(vpc).await;
            log_records(
                session,
                "DescribeSecurityGroups",
                result,
                format::security_group_line,
            );
        }
        Verb::NetworkInterfaces => {
            let vpc = vpc_filter(session, p);
            let result = compute.describe_network_interfaces(vpc, &p.nics).await;
            log_records(
                session,
                "DescribeNetworkInterfaces",
                result,
                format::network_interface_line,
            );
        }
        Verb::Volumes => {
            let result = compute.describe_volumes().await;
            log_records(session, "DescribeVolumes", result, format::volume_line);
        }
        Verb::Images => images(session, compute, p).await,
        Verb::Instances => {
            let filter = InstanceFilter::vpc(vpc_filter(session, p).map(str::to_string));
            let result = compute.describe_instances(&filter).await;
            log_records(session, "Describe", result, format::instance_line);
        }
        Verb::SpotRequest => {
            let spec = match instance_spec(session, p).await {
                Ok(spec) => spec,
                Err(e) => return session.log(format!("newInstanceSpec: {:#}", e)),
            };
            poller
                .fulfill(session, compute, p.count.unwrap_or(1), &spec)
                .await;
        }
        Verb::Run => run_instances(session, compute, p).await,
        Verb::Start | Verb::Stop | Verb::Terminate => {
            change_state(session, compute, op.verb, p).await;
        }
        Verb::Rename => rename(session, compute, p).await,
        Verb::CreateVolume => create_volume(session, compute, p).await,
        Verb::DeleteVolume => {
            let Some(volume_id) = non_empty(&p.volume_id) else {
                return session.log("no volumeid");
            };
            match compute.delete_volume(volume_id).await {
                Ok(()) => session.log(format!("Volume {} has been deleted", volume_id)),
                Err(e) => session.log(format!("DeleteVolume: {:#}", e)),
            }
        }
        Verb::AttachVolume => {
            let Some(volume_id) = non_empty(&p.volume_id) else {
                return session.log("no volumeid");
            };
            let Some(instance_id) = non_empty(&p.instance_id) else {
                return session.log("no instanceid");
            };
            let device = non_empty(&p.device).unwrap_or(DEFAULT_DEVICE);
            match compute.attach_volume(volume_id, instance_id, device).await {
                Ok(()) => session.log(format!(
                    "Volume {} attached to {} as {}",
                    volume_id, instance_id, device
                )),
                Err(e) => session.log(format!("AttachVolume: {:#}", e)),
            }
        }
        Verb::DetachVolume => {
            let Some(volume_id) = non_empty(&p.volume_id) else {
                return session.log("no volumeid");
            };
            match compute.detach_volume(volume_id).await {
                Ok(()) => session.log(format!("Volume {} detached", volume_id)),
                Err(e) => session.log(format!("DetachVolume: {:#}", e)),
            }
        }
        Verb::Change => change(session, compute, op.modifier(), p).await,
    }
}

fn log_records<T>(session: &mut Session, call: &str, result: Result<Vec<T>>, line: fn(&T) -> String) {
    match result {
        Ok(records) => session.log_lines(records.iter().map(line)),
        Err(e) => session.log(format!("{}: {:#}", call, e)),
    }
}

/// Optional VPC filter, logged when present
fn vpc_filter<'p>(session: &mut Session, p: &'p Params) -> Option<&'p str> {
    let vpc = non_empty(&p.vpc_id);
    if let Some(vpc) = vpc {
        session.log(format!("VpcId: {}", vpc));
    }
    vpc
}

/// Image name pattern and owner for a well-known distribution
pub fn distro_image(distro: &str, arch: &str) -> Option<ImageQuery> {
    let (name, owner) = match distro {
        "amazon" => ("al2023-ami-2023.*", "amazon"),
        "ubuntu" => (
            "ubuntu/images/hvm-ssd-gp3/ubuntu-noble-24.04-*-server-*",
            "099720109477",
        ),
        "debian" => ("debian-12-*", "136693071363"),
        _ => return None,
    };
    Some(ImageQuery {
        name: name.to_string(),
        owner: owner.to_string(),
        arch: arch.to_string(),
    })
}

async fn images(session: &mut Session, compute: &dyn ComputeGateway, p: &Params) {
    let arch = non_empty(&p.arch).unwrap_or(DEFAULT_ARCH);
    let query = match (non_empty(&p.name), non_empty(&p.owner)) {
        (Some(name), Some(owner)) => ImageQuery {
            name: name.to_string(),
            owner: owner.to_string(),
            arch: arch.to_string(),
        },
        _ => {
            let distro = non_empty(&p.distro).unwrap_or(DEFAULT_DISTRO);
            let Some(query) = distro_image(distro, arch) else {
                return session.log(format!("unknown distro {}", distro));
            };
            query
        }
    };

    match compute.find_image(&query).await {
        Ok(image) => session.log(format::image_line(&image)),
        Err(e) => session.log(format!("GetImage: {:#}", e)),
    }
}

/// Launch parameters shared by `run` and `spotrequest`
async fn instance_spec(session: &Session, p: &Params) -> Result<InstanceSpec> {
    let image_id = non_empty(&p.image_id).ok_or_else(|| anyhow!("no imageid"))?;
    let name = non_empty(&p.name).ok_or_else(|| anyhow!("no name"))?;

    let user_data = match non_empty(&p.user_data_file) {
        Some(file) => {
            let body = session
                .get_file(file)
                .await
                .map_err(|e| anyhow!("UserDataFile: {:#}", e))?;
            Some(base64::engine::general_purpose::STANDARD.encode(body))
        }
        None => None,
    };

    let mut tags = Tags::new();
    tags.insert(MARKER_TAG.0.to_string(), MARKER_TAG.1.to_string());
    tags.insert("Name".to_string(), name.to_string());
    tags.extend(session.config().tags.clone());
    tags.extend(p.tags.clone().unwrap_or_default());

    Ok(InstanceSpec {
        image_id: image_id.to_string(),
        security_group_ids: p.security_group_ids.clone(),
        instance_type: non_empty(&p.instance_type).map(str::to_string),
        key_name: non_empty(&p.key_name).map(str::to_string),
        user_data,
        subnet_id: non_empty(&p.subnet_id).map(str::to_string),
        associate_public_ip: p.associate_public_ip,
        volume_size: p.volume_size.unwrap_or(DEFAULT_VOLUME_SIZE),
        profile_arn: non_empty(&p.profile_arn).map(str::to_string),
        tags,
    })
}

async fn run_instances(session: &mut Session, compute: &dyn ComputeGateway, p: &Params) {
    let spec = match instance_spec(session, p).await {
        Ok(spec) => spec,
        Err(e) => return session.log(format!("newInstanceSpec: {:#}", e)),
    };

    let instances = match compute.run_instances(p.count.unwrap_or(1), &spec).await {
        Ok(instances) => instances,
        Err(e) => return session.log(format!("RunInstances: {:#}", e)),
    };

    let ids: Vec<String> = instances.iter().map(|i| i.instance_id.clone()).collect();
    if let Err(e) = compute.create_tags(&ids, &spec.tags).await {
        session.log(format!("CreateTags: {:#}", e));
    }
    for mut instance in instances {
        instance.tags.extend(spec.tags.clone());
        session.log(format::instance_line(&instance));
    }
}

async fn change_state(session: &mut Session, compute: &dyn ComputeGateway, verb: Verb, p: &Params) {
    let (label, call) = match verb {
        Verb::Start => ("start", "StartInstances"),
        Verb::Stop => ("stop", "StopInstances"),
        _ => ("terminate", "TerminateInstances"),
    };

    let ids = match p.all_instance_ids() {
        Ok(ids) => ids,
        Err(e) => return session.log(format!("{}: {}", label, e)),
    };

    let result = match verb {
        Verb::Start => compute.start_instances(&ids).await,
        Verb::Stop => compute.stop_instances(&ids, p.force.unwrap_or(false)).await,
        _ => compute.terminate_instances(&ids).await,
    };
    log_records(session, call, result, format::state_change_line);
}

async fn rename(session: &mut Session, compute: &dyn ComputeGateway, p: &Params) {
    let Some(instance_id) = non_empty(&p.instance_id) else {
        return session.log("no instanceid");
    };
    let Some(name) = non_empty(&p.name) else {
        return session.log("no name");
    };

    let filter = InstanceFilter::ids(vec![instance_id.to_string()]);
    let instances = match compute.describe_instances(&filter).await {
        Ok(instances) => instances,
        Err(e) => return session.log(format!("DescribeInstances: {:#}", e)),
    };
    let [instance] = instances.as_slice() else {
        return session.log(format!("expected one instance, found {}", instances.len()));
    };

    let mut tags = Tags::new();
    tags.insert("Name".to_string(), name.to_string());
    if let Err(e) = compute
        .create_tags(std::slice::from_ref(&instance.instance_id), &tags)
        .await
    {
        return session.log(format!("CreateTags: {:#}", e));
    }
    session.log(format!(
        "{}: rename {} to {}",
        instance.instance_id,
        instance.name(),
        name
    ));
}

async fn create_volume(session: &mut Session, compute: &dyn ComputeGateway, p: &Params) {
    let Some(az) = non_empty(&p.availability_zone) else {
        return session.log("no az");
    };
    let Some(size) = p.volume_size else {
        return session.log("no size");
    };

    let volume_id = match compute.create_volume(az, size).await {
        Ok(id) => id,
        Err(e) => return session.log(format!("CreateVolume: {:#}", e)),
    };
    session.log(format!("Volume {} has been created", volume_id));

    if let Some(name) = non_empty(&p.name) {
        let mut tags = Tags::new();
        tags.insert("Name".to_string(), name.to_string());
        if let Err(e) = compute.create_tags(&[volume_id], &tags).await {
            session.log(format!("CreateTags: {:#}", e));
        }
    }
}

async fn change(
    session: &mut Session,
    compute: &dyn ComputeGateway,
    attribute: Option<&str>,
    p: &Params,
) {
    match attribute {
        None => return session.log("need change attributename"),
        Some("type") => {}
        Some(_) => return session.log("support only type"),
    }
    let Some(instance_id) = non_empty(&p.instance_id) else {
        return session.log("no instanceid");
    };
    let Some(instance_type) = non_empty(&p.instance_type) else {
        return session.log("no instancetype");
    };

    match compute.modify_instance_type(instance_id, instance_type).await {
        Ok(()) => session.log("instance type has been modified"),
        Err(e) => session.log(format!("ModifyInstanceAttributeType: {:#}", e)),
    }
}
