//! Orchestration platform seams
//!
//! The patching strategies talk to the cluster only through these traits,
//! so the interceptor can wrap any creator and tests can substitute
//! in-memory stores.

use crate::error::{PatchError, Result};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use tracing::debug;

/// Capability to submit a new job
#[async_trait]
pub trait JobCreator: Send + Sync {
    async fn create(&self, namespace: &str, job: Job) -> Result<Job>;
}

/// Read and merge-patch access to existing jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Read a job by name; a missing job yields [`PatchError::NotFound`]
    async fn get(&self, namespace: &str, name: &str) -> Result<Job>;

    /// Merge-patch the pod template of an existing job
    async fn patch_template(&self, namespace: &str, name: &str, job: &Job) -> Result<Job>;
}

#[async_trait]
impl<T: JobCreator + ?Sized> JobCreator for std::sync::Arc<T> {
    async fn create(&self, namespace: &str, job: Job) -> Result<Job> {
        (**self).create(namespace, job).await
    }
}

#[async_trait]
impl<T: JobStore + ?Sized> JobStore for std::sync::Arc<T> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Job> {
        (**self).get(namespace, name).await
    }

    async fn patch_template(&self, namespace: &str, name: &str, job: &Job) -> Result<Job> {
        (**self).patch_template(namespace, name, job).await
    }
}

/// Kubernetes-backed job access
#[derive(Clone)]
pub struct KubeJobs {
    client: Client,
    field_manager: String,
}

impl KubeJobs {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: "benchmark-job-patcher".to_string(),
        }
    }

    /// Connect using in-cluster configuration, falling back to kubeconfig
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn api(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl JobCreator for KubeJobs {
    async fn create(&self, namespace: &str, job: Job) -> Result<Job> {
        let name = crate::manifest::job_name(&job).unwrap_or_default().to_string();
        debug!(namespace = %namespace, job = %name, "Creating job");
        let params = PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        self.api(namespace)
            .create(&params, &job)
            .await
            .map_err(|e| PatchError::from_kube(e, namespace, &name))
    }
}

#[async_trait]
impl JobStore for KubeJobs {
    async fn get(&self, namespace: &str, name: &str) -> Result<Job> {
        self.api(namespace)
            .get(name)
            .await
            .map_err(|e| PatchError::from_kube(e, namespace, name))
    }

    async fn patch_template(&self, namespace: &str, name: &str, job: &Job) -> Result<Job> {
        let template = job.spec.as_ref().map(|s| &s.template);
        let patch = json!({ "spec": { "template": template } });
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        debug!(namespace = %namespace, job = %name, "Merge-patching job template");
        self.api(namespace)
            .patch(name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|e| PatchError::from_kube(e, namespace, name))
    }
}
