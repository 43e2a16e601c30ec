//! Wire shapes for the HTTP front-end. Kept separate from the core model
//! so [`crate::model`] stays framework-agnostic; these only exist to
//! (de)serialize JSON bodies and adapt them to façade calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bundler::BuildOptions;
use crate::loader::{Request, Response};
use crate::model::{ConfigFields, ConfigFieldsPatch, FileMap, Slot};

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub id: String,
    #[serde(flatten)]
    pub config: ConfigFields,
}

#[derive(Debug, Deserialize)]
pub struct PatchRequest {
    #[serde(flatten)]
    pub patch: ConfigFieldsPatch,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkerRequest {
    pub id: String,
    #[serde(flatten)]
    pub config: ConfigFields,
    pub files: FileMap,
    #[serde(default)]
    pub hostnames: Vec<String>,
    pub build: Option<BuildOptions>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkerRequest {
    pub config: Option<ConfigFieldsPatch>,
    pub files: Option<FileMap>,
    pub build: Option<BuildOptions>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
    pub entrypoint: Option<String>,
}

impl From<DispatchRequest> for Request {
    fn from(d: DispatchRequest) -> Self {
        Request {
            method: d.method,
            path: d.path,
            headers: d.headers,
            body: d.body.into_bytes(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseDto {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl From<Response> for ResponseDto {
    fn from(r: Response) -> Self {
        ResponseDto {
            status: r.status,
            headers: r.headers,
            body: String::from_utf8_lossy(&r.body).into_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub files: FileMap,
    pub options: Option<BuildOptions>,
    pub tenant_id: Option<String>,
    pub request: DispatchRequest,
}

#[derive(Debug, Serialize)]
pub struct TimingDto {
    pub build_time_ms: u64,
    pub load_time_ms: u64,
    pub run_time_ms: u64,
    pub total_ms: u64,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub response: ResponseDto,
    pub timing: TimingDto,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub files: FileMap,
    pub slots: Vec<Slot>,
    pub defaults: Option<ConfigFields>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub files: Option<FileMap>,
    pub slots: Option<Vec<Slot>>,
    pub defaults: Option<Option<ConfigFields>>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkerFromTemplateRequest {
    pub worker_id: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    pub overrides: Option<ConfigFieldsPatch>,
    pub build: Option<BuildOptions>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl From<ListQuery> for crate::common::ListParams {
    fn from(q: ListQuery) -> Self {
        crate::common::ListParams { prefix: q.prefix, limit: q.limit, cursor: q.cursor }
    }
}

#[derive(Debug, Deserialize)]
pub struct HostnamesRequest {
    pub hostnames: Vec<String>,
}
