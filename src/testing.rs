//! In-memory collaborators for unit tests
//!
//! Every fake records the name of each method called so tests can assert on
//! exactly which calls happened and in which order.

use crate::config::Config;
use crate::gateway::*;
use crate::session::Session;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Call recorder shared by all fakes
#[derive(Default)]
pub struct Calls {
    names: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl Calls {
    /// Record a call; fails when the method was marked failing
    fn hit(&self, name: &str) -> Result<()> {
        self.names.lock().unwrap().push(name.to_string());
        if self.failing.lock().unwrap().contains(name) {
            return Err(anyhow!("{} failed", name));
        }
        Ok(())
    }

    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn all(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names.lock().unwrap().iter().filter(|n| *n == name).count()
    }
}

// =============================================================================
// Compute
// =============================================================================

#[derive(Default)]
pub struct FakeCompute {
    pub calls: Calls,
    pub instances: Mutex<Vec<Instance>>,
    /// Scripted describe_spot_requests answers; when empty every id is pending
    pub spot_script: Mutex<VecDeque<Result<Vec<SpotRequest>, String>>>,
    pub tagged: Mutex<Vec<(Vec<String>, Tags)>>,
    pub launched: Mutex<Vec<(u32, InstanceSpec)>>,
    pub image_queries: Mutex<Vec<ImageQuery>>,
}

impl FakeCompute {
    pub fn script_spot(&self, answer: Result<Vec<SpotRequest>, &str>) {
        self.spot_script
            .lock()
            .unwrap()
            .push_back(answer.map_err(str::to_string));
    }

    pub fn add_instance(&self, id: &str, name: &str) {
        let mut tags = Tags::new();
        tags.insert("Name".to_string(), name.to_string());
        self.instances.lock().unwrap().push(Instance {
            instance_id: id.to_string(),
            instance_type: "t3.micro".to_string(),
            state: "running".to_string(),
            tags,
            ..Default::default()
        });
    }

    fn state_changes(ids: &[String], to: &str) -> Vec<InstanceStateChange> {
        ids.iter()
            .map(|id| InstanceStateChange {
                instance_id: id.clone(),
                previous_state: "running".to_string(),
                current_state: to.to_string(),
            })
            .collect()
    }
}

pub fn spot(id: &str, instance: Option<&str>) -> SpotRequest {
    SpotRequest {
        spot_instance_request_id: id.to_string(),
        instance_id: instance.map(str::to_string),
        state: if instance.is_some() { "active" } else { "open" }.to_string(),
    }
}

#[async_trait]
impl ComputeGateway for FakeCompute {
    async fn describe_vpcs(&self) -> Result<Vec<Vpc>> {
        self.calls.hit("describe_vpcs")?;
        Ok(vec![Vpc {
            vpc_id: "vpc-1".to_string(),
            cidr_block: "10.0.0.0/16".to_string(),
            is_default: true,
            ..Default::default()
        }])
    }

    async fn describe_subnets(&self, vpc_id: Option<&str>) -> Result<Vec<Subnet>> {
        self.calls.hit("describe_subnets")?;
        Ok(vec![Subnet {
            subnet_id: "subnet-1".to_string(),
            vpc_id: vpc_id.unwrap_or("vpc-1").to_string(),
            ..Default::default()
        }])
    }

    async fn describe_security_groups(&self, _vpc_id: Option<&str>) -> Result<Vec<SecurityGroup>> {
        self.calls.hit("describe_security_groups")?;
        Ok(vec![])
    }

    async fn describe_network_interfaces(
        &self,
        _vpc_id: Option<&str>,
        _ids: &[String],
    ) -> Result<Vec<NetworkInterface>> {
        self.calls.hit("describe_network_interfaces")?;
        Ok(vec![])
    }

    async fn describe_volumes(&self) -> Result<Vec<Volume>> {
        self.calls.hit("describe_volumes")?;
        Ok(vec![])
    }

    async fn find_image(&self, query: &ImageQuery) -> Result<Image> {
        self.calls.hit("find_image")?;
        self.image_queries.lock().unwrap().push(query.clone());
        Ok(Image {
            image_id: "ami-1".to_string(),
            name: query.name.replace('*', "x"),
            architecture: query.arch.clone(),
            owner_id: query.owner.clone(),
            creation_date: None,
        })
    }

    async fn describe_instances(&self, filter: &InstanceFilter) -> Result<Vec<Instance>> {
        self.calls.hit("describe_instances")?;
        let instances = self.instances.lock().unwrap();
        Ok(instances
            .iter()
            .filter(|i| {
                filter.instance_ids.is_empty() || filter.instance_ids.contains(&i.instance_id)
            })
            .cloned()
            .collect())
    }

    async fn run_instances(&self, count: u32, spec: &InstanceSpec) -> Result<Vec<Instance>> {
        self.calls.hit("run_instances")?;
        self.launched.lock().unwrap().push((count, spec.clone()));
        Ok((1..=count)
            .map(|n| Instance {
                instance_id: format!("i-{}", n),
                instance_type: spec.instance_type.clone().unwrap_or_default(),
                state: "pending".to_string(),
                ..Default::default()
            })
            .collect())
    }

    async fn request_spot_instances(
        &self,
        count: u32,
        spec: &InstanceSpec,
    ) -> Result<Vec<SpotRequest>> {
        self.calls.hit("request_spot_instances")?;
        self.launched.lock().unwrap().push((count, spec.clone()));
        Ok((1..=count)
            .map(|n| spot(&format!("sir-{}", n), None))
            .collect())
    }

    async fn describe_spot_requests(&self, ids: &[String]) -> Result<Vec<SpotRequest>> {
        self.calls.hit("describe_spot_requests")?;
        match self.spot_script.lock().unwrap().pop_front() {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(ids.iter().map(|id| spot(id, None)).collect()),
        }
    }

    async fn start_instances(&self, ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        self.calls.hit("start_instances")?;
        Ok(Self::state_changes(ids, "pending"))
    }

    async fn stop_instances(&self, ids: &[String], force: bool) -> Result<Vec<InstanceStateChange>> {
        self.calls
            .hit(if force { "stop_instances_force" } else { "stop_instances" })?;
        Ok(Self::state_changes(ids, "stopping"))
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<Vec<InstanceStateChange>> {
        self.calls.hit("terminate_instances")?;
        Ok(Self::state_changes(ids, "shutting-down"))
    }

    async fn create_tags(&self, resource_ids: &[String], tags: &Tags) -> Result<()> {
        self.calls.hit("create_tags")?;
        self.tagged
            .lock()
            .unwrap()
            .push((resource_ids.to_vec(), tags.clone()));
        Ok(())
    }

    async fn create_volume(&self, _availability_zone: &str, _size: i32) -> Result<String> {
        self.calls.hit("create_volume")?;
        Ok("vol-1".to_string())
    }

    async fn delete_volume(&self, _volume_id: &str) -> Result<()> {
        self.calls.hit("delete_volume")
    }

    async fn attach_volume(&self, _volume_id: &str, _instance_id: &str, device: &str) -> Result<()> {
        self.calls.hit(&format!("attach_volume:{}", device))
    }

    async fn detach_volume(&self, _volume_id: &str) -> Result<()> {
        self.calls.hit("detach_volume")
    }

    async fn modify_instance_type(&self, _instance_id: &str, _instance_type: &str) -> Result<()> {
        self.calls.hit("modify_instance_type")
    }
}

// =============================================================================
// Tasks
// =============================================================================

#[derive(Default)]
pub struct FakeTasks {
    pub calls: Calls,
    pub task_arns: Mutex<Vec<String>>,
    pub run_specs: Mutex<Vec<RunTaskSpec>>,
    pub tagged: Mutex<Vec<(String, Tags)>>,
}

fn task(arn: &str) -> Task {
    Task {
        task_arn: arn.to_string(),
        task_definition_arn: "arn:taskdef/web:1".to_string(),
        last_status: "RUNNING".to_string(),
        group: "service:web".to_string(),
        attachments: vec![Attachment {
            r#type: "ElasticNetworkInterface".to_string(),
            details: vec![AttachmentDetail {
                name: "privateIPv4Address".to_string(),
                value: "10.0.0.5".to_string(),
            }],
        }],
    }
}

fn task_definition(family: &str) -> TaskDefinition {
    TaskDefinition {
        task_definition_arn: format!("arn:taskdef/{}:3", family),
        family: family.to_string(),
        revision: 3,
        status: "ACTIVE".to_string(),
        ..Default::default()
    }
}

#[async_trait]
impl TaskGateway for FakeTasks {
    async fn list_clusters(&self) -> Result<Vec<String>> {
        self.calls.hit("list_clusters")?;
        Ok(vec!["arn:cluster/main".to_string()])
    }

    async fn describe_clusters(&self, arns: &[String]) -> Result<Vec<Cluster>> {
        self.calls.hit("describe_clusters")?;
        Ok(arns
            .iter()
            .map(|arn| Cluster {
                cluster_arn: arn.clone(),
                cluster_name: arn.rsplit('/').next().unwrap_or(arn).to_string(),
                ..Default::default()
            })
            .collect())
    }

    async fn list_task_definitions(&self) -> Result<Vec<String>> {
        self.calls.hit("list_task_definitions")?;
        Ok(vec!["arn:taskdef/web:3".to_string()])
    }

    async fn describe_task_definition(&self, family_or_arn: &str) -> Result<TaskDefinition> {
        self.calls.hit("describe_task_definition")?;
        Ok(task_definition(family_or_arn))
    }

    async fn register_task_definition(&self, spec: &TaskDefinitionSpec) -> Result<TaskDefinition> {
        self.calls.hit("register_task_definition")?;
        Ok(task_definition(&spec.family))
    }

    async fn deregister_task_definition(&self, family_or_arn: &str) -> Result<TaskDefinition> {
        self.calls.hit("deregister_task_definition")?;
        Ok(task_definition(family_or_arn))
    }

    async fn list_tasks(&self, _cluster: &str) -> Result<Vec<String>> {
        self.calls.hit("list_tasks")?;
        Ok(self.task_arns.lock().unwrap().clone())
    }

    async fn describe_tasks(&self, _cluster: &str, arns: &[String]) -> Result<Vec<Task>> {
        self.calls.hit("describe_tasks")?;
        Ok(arns.iter().map(|arn| task(arn)).collect())
    }

    async fn run_task(&self, spec: &RunTaskSpec) -> Result<Vec<Task>> {
        self.calls.hit("run_task")?;
        self.run_specs.lock().unwrap().push(spec.clone());
        Ok((1..=spec.count)
            .map(|n| task(&format!("arn:task/{}", n)))
            .collect())
    }

    async fn stop_task(&self, _cluster: &str, arn: &str) -> Result<Task> {
        self.calls.hit(&format!("stop_task:{}", arn))?;
        Ok(task(arn))
    }

    async fn execute_command(&self, _cluster: &str, arn: &str, _command: &str) -> Result<()> {
        self.calls.hit(&format!("execute_command:{}", arn))
    }

    async fn tag_resource(&self, arn: &str, tags: &Tags) -> Result<()> {
        self.calls.hit("tag_resource")?;
        self.tagged
            .lock()
            .unwrap()
            .push((arn.to_string(), tags.clone()));
        Ok(())
    }
}

// =============================================================================
// Storage, functions, credentials
// =============================================================================

#[derive(Default)]
pub struct FakeStore {
    pub calls: Calls,
    pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl FakeStore {
    pub fn seed(&self, key: &str, body: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), body.to_vec());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.calls.hit("get")?;
        self.object(key)
            .ok_or_else(|| anyhow!("NoSuchKey: {}", key))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.calls.hit("put")?;
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeFunctions {
    pub calls: Calls,
}

#[async_trait]
impl FunctionGateway for FakeFunctions {
    async fn update_function_code(&self, function: &str, _bucket: &str, _key: &str) -> Result<String> {
        self.calls.hit("update_function_code")?;
        Ok(function.to_string())
    }
}

#[derive(Default)]
pub struct FakeCredentials {
    pub calls: Calls,
}

#[async_trait]
impl CredentialGateway for FakeCredentials {
    async fn assume_role(
        &self,
        _role_arn: &str,
        _session_name: &str,
        _duration_secs: u32,
    ) -> Result<Credentials> {
        self.calls.hit("assume_role")?;
        Ok(Credentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "SECRET".to_string(),
            session_token: "TOKEN".to_string(),
            expiration: None,
        })
    }
}

// =============================================================================
// Local
// =============================================================================

#[derive(Default)]
pub struct FakeLocal {
    pub calls: Calls,
    pub files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    pub listing: Mutex<Vec<String>>,
    pub listed_dirs: Mutex<Vec<PathBuf>>,
    pub runs: Mutex<Vec<Vec<String>>>,
}

impl FakeLocal {
    pub fn seed(&self, path: &str, body: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), body.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(Path::new(path)).cloned()
    }
}

#[async_trait]
impl LocalExec for FakeLocal {
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>> {
        self.calls.hit("list_files")?;
        self.listed_dirs.lock().unwrap().push(dir.to_path_buf());
        Ok(self.listing.lock().unwrap().clone())
    }

    async fn run(&self, argv: &[String]) -> Result<Vec<String>> {
        self.calls.hit("run")?;
        self.runs.lock().unwrap().push(argv.to_vec());
        Ok(vec![format!("ran {}", argv.join(" "))])
    }

    async fn unzip(&self, _archive: Vec<u8>, _dir: &Path) -> Result<Vec<String>> {
        self.calls.hit("unzip")?;
        Ok(vec!["a.txt".to_string()])
    }

    async fn concat(&self, dst: &Path, srcs: &[PathBuf]) -> Result<()> {
        self.calls.hit("concat")?;
        let mut files = self.files.lock().unwrap();
        let mut out = Vec::new();
        for src in srcs {
            let body = files
                .get(src)
                .ok_or_else(|| anyhow!("{}: No such file or directory", src.display()))?;
            out.extend_from_slice(body);
        }
        files.insert(dst.to_path_buf(), out);
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.calls.hit("read_file")?;
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("{}: No such file or directory", path.display()))
    }

    async fn write_file(&self, path: &Path, body: &[u8]) -> Result<()> {
        self.calls.hit("write_file")?;
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), body.to_vec());
        Ok(())
    }
}

// =============================================================================
// Bundle
// =============================================================================

#[derive(Default)]
pub struct FakeCloud {
    pub compute: Arc<FakeCompute>,
    pub tasks: Arc<FakeTasks>,
    pub store: Arc<FakeStore>,
    pub functions: Arc<FakeFunctions>,
    pub credentials: Arc<FakeCredentials>,
    pub local: Arc<FakeLocal>,
}

impl FakeCloud {
    pub fn gateways(&self) -> Gateways {
        Gateways {
            compute: self.compute.clone(),
            tasks: self.tasks.clone(),
            functions: self.functions.clone(),
            credentials: self.credentials.clone(),
            local: self.local.clone(),
            storage: Some(self.store.clone()),
        }
    }

    /// Gateways without a bucket
    pub fn gateways_without_bucket(&self) -> Gateways {
        Gateways {
            storage: None,
            ..self.gateways()
        }
    }

    pub fn session(&self, config: Config) -> Session {
        let gateways = self.gateways();
        Session::new(Arc::new(config), gateways.storage, gateways.local)
    }

    /// Total number of collaborator calls across every fake
    pub fn total_calls(&self) -> usize {
        self.compute.calls.all().len()
            + self.tasks.calls.all().len()
            + self.store.calls.all().len()
            + self.functions.calls.all().len()
            + self.credentials.calls.all().len()
            + self.local.calls.all().len()
    }
}

/// Config tuned for tests: no poll delay
pub fn test_config() -> Config {
    Config {
        poll_interval_ms: 0,
        bucket_name: Some("test-bucket".to_string()),
        ..Config::default()
    }
}
