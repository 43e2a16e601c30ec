//! Handler functions behind the routes wired in [`super::router`].

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::facade::Platform;

use super::dto::{
    CreateTemplateRequest, CreateTenantRequest, CreateWorkerFromTemplateRequest, CreateWorkerRequest,
    DispatchRequest, GenerateRequest, HostnamesRequest, ListQuery, PatchRequest, ResponseDto, RunRequest,
    RunResponse, TimingDto, UpdateTemplateRequest, UpdateWorkerRequest,
};
use super::error::ApiResult;
use crate::model::{PlatformDefaults, Template, TemplateMetadata, Tenant, Worker};

pub type AppState = Arc<Platform>;

pub async fn get_defaults(State(platform): State<AppState>) -> ApiResult<Json<PlatformDefaults>> {
    Ok(Json(platform.get_defaults().await?))
}

pub async fn update_defaults(
    State(platform): State<AppState>,
    Json(req): Json<PatchRequest>,
) -> ApiResult<Json<PlatformDefaults>> {
    Ok(Json(platform.update_defaults(req.patch).await?))
}

pub async fn list_tenants(
    State(platform): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<crate::common::ListPage<Tenant>>> {
    Ok(Json(platform.list_tenants(q.into()).await?))
}

pub async fn create_tenant(
    State(platform): State<AppState>,
    Json(req): Json<CreateTenantRequest>,
) -> ApiResult<Json<Tenant>> {
    Ok(Json(platform.create_tenant(&req.id, req.config).await?))
}

pub async fn get_tenant(State(platform): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Tenant>> {
    Ok(Json(platform.get_tenant(&id).await?))
}

pub async fn update_tenant(
    State(platform): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PatchRequest>,
) -> ApiResult<Json<Tenant>> {
    Ok(Json(platform.update_tenant(&id, req.patch).await?))
}

pub async fn delete_tenant(State(platform): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<()>> {
    platform.delete_tenant(&id).await?;
    Ok(Json(()))
}

pub async fn list_workers(
    State(platform): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<crate::common::ListPage<Worker>>> {
    Ok(Json(platform.list_workers(&tenant_id, q.into()).await?))
}

pub async fn create_worker(
    State(platform): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(req): Json<CreateWorkerRequest>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(
        platform
            .create_worker(&tenant_id, &req.id, req.config, req.files, req.hostnames, req.build)
            .await?,
    ))
}

pub async fn get_worker(
    State(platform): State<AppState>,
    Path((tenant_id, worker_id)): Path<(String, String)>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(platform.get_worker(&tenant_id, &worker_id).await?))
}

pub async fn update_worker(
    State(platform): State<AppState>,
    Path((tenant_id, worker_id)): Path<(String, String)>,
    Json(req): Json<UpdateWorkerRequest>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(
        platform
            .update_worker(&tenant_id, &worker_id, req.config, req.files, req.build)
            .await?,
    ))
}

pub async fn delete_worker(
    State(platform): State<AppState>,
    Path((tenant_id, worker_id)): Path<(String, String)>,
) -> ApiResult<Json<()>> {
    platform.delete_worker(&tenant_id, &worker_id).await?;
    Ok(Json(()))
}

pub async fn add_hostnames(
    State(platform): State<AppState>,
    Path((tenant_id, worker_id)): Path<(String, String)>,
    Json(req): Json<HostnamesRequest>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(platform.add_hostnames(&tenant_id, &worker_id, req.hostnames).await?))
}

pub async fn remove_hostnames(
    State(platform): State<AppState>,
    Path((tenant_id, worker_id)): Path<(String, String)>,
    Json(req): Json<HostnamesRequest>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(platform.remove_hostnames(&tenant_id, &worker_id, req.hostnames).await?))
}

pub async fn dispatch_fetch(
    State(platform): State<AppState>,
    Path((tenant_id, worker_id)): Path<(String, String)>,
    Json(req): Json<DispatchRequest>,
) -> ApiResult<Json<ResponseDto>> {
    let entrypoint = req.entrypoint.clone();
    let response = platform
        .fetch(&tenant_id, &worker_id, req.into(), entrypoint.as_deref())
        .await?;
    Ok(Json(response.into()))
}

pub async fn run_ephemeral(
    State(platform): State<AppState>,
    Json(req): Json<RunRequest>,
) -> ApiResult<Json<RunResponse>> {
    let started = Instant::now();
    let outcome = platform
        .run_ephemeral(req.tenant_id.as_deref(), req.files, req.request.into(), req.options)
        .await?;
    let total_ms = started.elapsed().as_millis() as u64;

    Ok(Json(RunResponse {
        response: outcome.response.into(),
        timing: TimingDto {
            build_time_ms: 0,
            load_time_ms: 0,
            run_time_ms: 0,
            total_ms,
            cached: outcome.cached,
        },
    }))
}

pub async fn list_templates(
    State(platform): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<crate::common::ListPage<TemplateMetadata>>> {
    Ok(Json(platform.list_templates(q.into()).await?))
}

pub async fn create_template(
    State(platform): State<AppState>,
    Json(req): Json<CreateTemplateRequest>,
) -> ApiResult<Json<Template>> {
    Ok(Json(
        platform
            .register_template(&req.id, req.name, req.description, req.files, req.slots, req.defaults)
            .await?,
    ))
}

pub async fn get_template(State(platform): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Template>> {
    Ok(Json(platform.get_template(&id).await?))
}

pub async fn update_template(
    State(platform): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTemplateRequest>,
) -> ApiResult<Json<Template>> {
    Ok(Json(
        platform
            .update_template(&id, req.name, req.description, req.files, req.slots, req.defaults)
            .await?,
    ))
}

pub async fn delete_template(State(platform): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<()>> {
    platform.delete_template(&id).await?;
    Ok(Json(()))
}

pub async fn generate_template(
    State(platform): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<crate::model::FileMap>> {
    Ok(Json(platform.preview_template_files(&id, req.values).await?))
}

pub async fn create_worker_from_template(
    State(platform): State<AppState>,
    Path((tenant_id, template_id)): Path<(String, String)>,
    Json(req): Json<CreateWorkerFromTemplateRequest>,
) -> ApiResult<Json<Worker>> {
    Ok(Json(
        platform
            .create_worker_from_template(
                &tenant_id,
                &template_id,
                &req.worker_id,
                req.values,
                req.overrides,
                req.build,
            )
            .await?,
    ))
}
