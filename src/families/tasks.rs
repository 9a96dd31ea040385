//! Tasks family (`ecs.*`)

use super::{arn_list, non_empty, Op};
use crate::gateway::{RunTaskSpec, Tags, Task, TaskDefinitionSpec, TaskGateway};
use crate::session::Session;
use serde::Deserialize;
use std::str::FromStr;

const MAX_TASK_COUNT: u32 = 10;
const DEFAULT_CONTAINER_NAME: &str = "ubuntu";
const DEFAULT_CONTAINER_IMAGE: &str = "ubuntu:latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Clusters,
    TaskDefinitions,
    TaskDefinition,
    RegisterTaskDefinition,
    DeregisterTaskDefinition,
    Tasks,
    TasksRaw,
    RunTask,
    StopTask,
    Exec,
    Tag,
}

impl FromStr for Verb {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "clusters" => Self::Clusters,
            "taskdefs" => Self::TaskDefinitions,
            "taskdef" => Self::TaskDefinition,
            "regtaskdef" => Self::RegisterTaskDefinition,
            "deregtaskdef" => Self::DeregisterTaskDefinition,
            "tasks" => Self::Tasks,
            "tasksraw" => Self::TasksRaw,
            "runtask" => Self::RunTask,
            "stoptask" => Self::StopTask,
            "exec" => Self::Exec,
            "tag" => Self::Tag,
            _ => return Err(()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Params {
    pub arn: Option<String>,
    pub arns: Vec<String>,
    pub family: Option<String>,
    #[serde(rename = "execrole")]
    pub exec_role: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub cluster: Option<String>,
    pub count: Option<u32>,
    #[serde(rename = "subnetid")]
    pub subnet_id: Option<String>,
    #[serde(rename = "securitygroupids")]
    pub security_group_ids: Option<Vec<String>>,
    #[serde(rename = "execcommand")]
    pub exec_command: Option<Vec<String>>,
    #[serde(rename = "associatepublicip")]
    pub associate_public_ip: Option<bool>,
    pub group: Option<String>,
    #[serde(rename = "taskrole")]
    pub task_role: Option<String>,
    pub tags: Option<Tags>,
}

pub async fn handle(session: &mut Session, tasks: &dyn TaskGateway, op: Op<Verb, Params>) {
    let p = &op.params;
    match op.verb {
        Verb::Clusters => clusters(session, tasks).await,
        Verb::TaskDefinitions => match tasks.list_task_definitions().await {
            Ok(arns) => session.log_lines(arns),
            Err(e) => session.log(format!("ListTaskDefinitions: {:#}", e)),
        },
        Verb::TaskDefinition => describe_task_definition(session, tasks, p).await,
        Verb::RegisterTaskDefinition => register_task_definition(session, tasks, p).await,
        Verb::DeregisterTaskDefinition => {
            let Some(family) = non_empty(&p.family) else {
                return session.log("need family");
            };
            match tasks.deregister_task_definition(family).await {
                Ok(def) => session.log(format!(
                    "{}:{} {}",
                    def.family, def.revision, def.status
                )),
                Err(e) => session.log(format!("DeregisterTaskDefinition: {:#}", e)),
            }
        }
        Verb::Tasks | Verb::TasksRaw => {
            list_tasks(session, tasks, p, op.verb == Verb::TasksRaw).await;
        }
        Verb::RunTask => run_task(session, tasks, op.modifier() == Some("spot"), p).await,
        Verb::StopTask => {
            let Some(cluster) = non_empty(&p.cluster) else {
                return session.log("need cluster");
            };
            let Some(arns) = required_arns(session, p) else {
                return;
            };
            for arn in &arns {
                match tasks.stop_task(cluster, arn).await {
                    Ok(task) => session.log(format!("stopping {}", task.task_arn)),
                    Err(e) => session.log(format!("StopTask: {:#}", e)),
                }
            }
        }
        Verb::Exec => {
            let Some(cluster) = non_empty(&p.cluster) else {
                return session.log("need cluster");
            };
            let Some(argv) = p.exec_command.as_ref() else {
                return session.log("need execcommand");
            };
            let Some(arns) = required_arns(session, p) else {
                return;
            };
            let command = argv.join(" ");
            for arn in &arns {
                session.log(format!("exec {} on {}", command, arn));
                if let Err(e) = tasks.execute_command(cluster, arn, &command).await {
                    session.log(format!("ExecuteCommand: {:#}", e));
                }
            }
        }
        Verb::Tag => {
            let Some(tags) = p.tags.as_ref() else {
                return session.log("need tags");
            };
            let Some(arns) = required_arns(session, p) else {
                return;
            };
            for arn in &arns {
                session.log(format!("tags {} on {}", crate::format::tags_string(tags), arn));
                if let Err(e) = tasks.tag_resource(arn, tags).await {
                    session.log(format!("TagResource: {:#}", e));
                }
            }
        }
    }
}

/// `arns`, or the single `arn`; logs `need arn` when both are absent
fn required_arns(session: &mut Session, p: &Params) -> Option<Vec<String>> {
    let arns = arn_list(&p.arns, &p.arn);
    if arns.is_empty() {
        session.log("need arn");
        return None;
    }
    Some(arns)
}

async fn clusters(session: &mut Session, tasks: &dyn TaskGateway) {
    session.log("list clusters");
    let arns = match tasks.list_clusters().await {
        Ok(arns) => arns,
        Err(e) => return session.log(format!("ListClusters: {:#}", e)),
    };
    session.log_lines(arns.iter().cloned());

    session.log("describe clusters");
    match tasks.describe_clusters(&arns).await {
        Ok(clusters) => session.log_lines(clusters.into_iter().map(|c| c.cluster_name)),
        Err(e) => session.log(format!("DescribeClusters: {:#}", e)),
    }
}

async fn describe_task_definition(session: &mut Session, tasks: &dyn TaskGateway, p: &Params) {
    let family = match (non_empty(&p.family), non_empty(&p.arn)) {
        (Some(family), _) => family,
        (None, Some(arn)) => {
            session.log("please use family");
            arn
        }
        (None, None) => return session.log("need family or arn"),
    };

    let def = match tasks.describe_task_definition(family).await {
        Ok(def) => def,
        Err(e) => return session.log(format!("DescribeTaskDefinition: {:#}", e)),
    };
    session.log(format!("{}:{}", def.family, def.revision));
    match serde_json::to_string(&def) {
        Ok(json) => session.log(format!("taskdef: {}", json)),
        Err(e) => session.log(format!("Marshal: {}", e)),
    }
}

async fn register_task_definition(session: &mut Session, tasks: &dyn TaskGateway, p: &Params) {
    let Some(family) = non_empty(&p.family) else {
        return session.log("need family");
    };
    let Some(exec_role) = non_empty(&p.exec_role) else {
        return session.log("need execrole");
    };
    let Some(cpu) = non_empty(&p.cpu) else {
        return session.log("need cpu");
    };
    let Some(memory) = non_empty(&p.memory) else {
        return session.log("need memory");
    };

    let spec = TaskDefinitionSpec {
        family: family.to_string(),
        cpu: cpu.to_string(),
        memory: memory.to_string(),
        execution_role_arn: exec_role.to_string(),
        container_name: non_empty(&p.name).unwrap_or(DEFAULT_CONTAINER_NAME).to_string(),
        container_image: non_empty(&p.image).unwrap_or(DEFAULT_CONTAINER_IMAGE).to_string(),
    };
    match tasks.register_task_definition(&spec).await {
        Ok(def) => session.log(format!(
            "{}:{} {}",
            def.family, def.revision, def.task_definition_arn
        )),
        Err(e) => session.log(format!("RegisterTaskDefinition: {:#}", e)),
    }
}

fn task_lines(task: &Task) -> Vec<String> {
    let mut lines = vec![
        task.task_arn.clone(),
        format!(" def: {}", task.task_definition_arn),
        format!(" status: {}", task.last_status),
        format!(" group: {}", task.group),
    ];
    for attachment in &task.attachments {
        for detail in &attachment.details {
            lines.push(format!("  {}: {}", detail.name, detail.value));
        }
    }
    lines
}

async fn list_tasks(session: &mut Session, tasks: &dyn TaskGateway, p: &Params, raw: bool) {
    let Some(cluster) = non_empty(&p.cluster) else {
        return session.log("need cluster");
    };

    let arns = match tasks.list_tasks(cluster).await {
        Ok(arns) => arns,
        Err(e) => return session.log(format!("ListTasks: {:#}", e)),
    };
    if arns.is_empty() {
        return session.log("no tasks");
    }

    let described = match tasks.describe_tasks(cluster, &arns).await {
        Ok(described) => described,
        Err(e) => return session.log(format!("DescribeTasks: {:#}", e)),
    };
    for task in &described {
        session.log_lines(task_lines(task));
    }

    if raw {
        match serde_json::to_string(&described) {
            Ok(json) => session.log(format!("raw: {}", json)),
            Err(e) => session.log(format!("Marshal: {}", e)),
        }
    }
}

async fn run_task(session: &mut Session, tasks: &dyn TaskGateway, spot: bool, p: &Params) {
    let count = p.count.unwrap_or(1);
    if count >= MAX_TASK_COUNT {
        return session.log("count too large");
    }
    let Some(arn) = non_empty(&p.arn) else {
        return session.log("need arn");
    };
    let Some(name) = non_empty(&p.name) else {
        return session.log("need name");
    };
    let Some(cluster) = non_empty(&p.cluster) else {
        return session.log("need cluster");
    };
    let Some(subnet_id) = non_empty(&p.subnet_id) else {
        return session.log("need subnetid");
    };
    let Some(security_group_ids) = p.security_group_ids.as_ref() else {
        return session.log("need securitygroupids");
    };
    let Some(command) = p.exec_command.as_ref() else {
        return session.log("need execcommand");
    };

    let def = match tasks.describe_task_definition(arn).await {
        Ok(def) => def,
        Err(e) => return session.log(format!("DescribeTaskDefinition: {:#}", e)),
    };
    let container_name = def
        .container_definitions
        .first()
        .map(|c| c.name.clone())
        .unwrap_or_else(|| DEFAULT_CONTAINER_NAME.to_string());

    let spec = RunTaskSpec {
        task_definition_arn: def.task_definition_arn,
        container_name,
        cluster: cluster.to_string(),
        count,
        spot,
        group: non_empty(&p.group).map(str::to_string),
        task_role_arn: non_empty(&p.task_role).map(str::to_string),
        cpu: non_empty(&p.cpu).map(str::to_string),
        memory: non_empty(&p.memory).map(str::to_string),
        subnet_id: subnet_id.to_string(),
        assign_public_ip: p.associate_public_ip.unwrap_or(true),
        security_group_ids: security_group_ids.clone(),
        command: command.clone(),
    };
    tracing::debug!(name, cluster, count, spot, "running task");

    let started = match tasks.run_task(&spec).await {
        Ok(started) => started,
        Err(e) => return session.log(format!("RunTask: {:#}", e)),
    };

    if let Some(tags) = p.tags.as_ref() {
        session.log(format!("TagResource: {}", crate::format::tags_string(tags)));
        for task in &started {
            if let Err(e) = tasks.tag_resource(&task.task_arn, tags).await {
                session.log(format!("task:{} {:#}", task.task_arn, e));
            }
        }
    }
    for task in &started {
        session.log(format!("starting {}", task.task_arn));
    }
}
