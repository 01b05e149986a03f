//! Caller-layer service over an `EntityStore`.
//!
//! # Responsibility
//! - Decode request bodies and query values into `(collection, entity)` or
//!   `(collection, id)` pairs.
//! - Invoke exactly one store operation per request.
//! - Translate store error kinds into transport status codes.
//!
//! # Invariants
//! - The collection name always comes from the request, never inferred.
//! - Validation failures map to 400, not-found to 404, unreachable engine
//!   to 503, everything else to 500.
//! - Server-side failures return a generic message; details go to the log.

use crate::model::entity::{parse_entity_id, Entity};
use crate::repo::context::OpContext;
use crate::repo::entity_store::EntityStore;
use crate::repo::error::{StoreError, StoreErrorKind};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

/// Transport-level outcome of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Created,
    BadRequest,
    NotFound,
    InternalServerError,
    ServiceUnavailable,
}

impl ResponseStatus {
    /// HTTP status code.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Created)
    }
}

/// Status plus JSON body, ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: ResponseStatus,
    pub body: Value,
}

impl ServiceResponse {
    fn json(status: ResponseStatus, body: Value) -> Self {
        Self { status, body }
    }

    fn message(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "message": message.into() }))
    }

    fn error(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "error": message.into() }))
    }
}

/// Maps a store error kind to the status the caller should see.
pub fn status_for(kind: StoreErrorKind) -> ResponseStatus {
    match kind {
        StoreErrorKind::Validation => ResponseStatus::BadRequest,
        StoreErrorKind::NotFound => ResponseStatus::NotFound,
        StoreErrorKind::EngineUnavailable => ResponseStatus::ServiceUnavailable,
        StoreErrorKind::Conflict
        | StoreErrorKind::Write
        | StoreErrorKind::Cancelled
        | StoreErrorKind::Internal => ResponseStatus::InternalServerError,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityWriteRequest {
    #[serde(default)]
    table_name: String,
    entity: Entity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityIdRequest {
    #[serde(default)]
    table_name: String,
    #[serde(default)]
    id: String,
}

/// Request handlers for the generic entity routes.
pub struct EntityService<S: EntityStore> {
    store: S,
}

impl<S: EntityStore> EntityService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `POST /entities` with body `{tableName, entity}`.
    pub fn create_entity(&self, ctx: &OpContext, body: &str) -> ServiceResponse {
        let request = match decode::<EntityWriteRequest>("service_create", body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        if let Err(response) = require_collection("service_create", &request.table_name) {
            return response;
        }

        match self
            .store
            .create(ctx, &request.table_name, &request.entity)
        {
            Ok(entity) => {
                info!(
                    "event=service_create module=service status=ok collection={} id={}",
                    request.table_name, entity.id
                );
                entity_response(ResponseStatus::Created, &entity)
            }
            Err(err) => failure("service_create", "create", &err),
        }
    }

    /// `GET /entities/:id?type=<collection>`.
    pub fn get_entity(
        &self,
        ctx: &OpContext,
        id: &str,
        collection: Option<&str>,
    ) -> ServiceResponse {
        if id.trim().is_empty() {
            return bad_request("service_get", "entity id is required");
        }
        let collection = match require_query_collection("service_get", collection) {
            Ok(collection) => collection,
            Err(response) => return response,
        };

        match self.store.get_by_id(ctx, collection, id) {
            Ok(entity) => {
                info!(
                    "event=service_get module=service status=ok collection={} id={}",
                    collection, entity.id
                );
                entity_response(ResponseStatus::Ok, &entity)
            }
            Err(err) => failure("service_get", "get", &err),
        }
    }

    /// `PUT /entities/:id` with body `{tableName, entity}`.
    ///
    /// An empty `entity.id` takes the path id; a different non-empty one is
    /// rejected.
    pub fn update_entity(&self, ctx: &OpContext, path_id: &str, body: &str) -> ServiceResponse {
        let mut request = match decode::<EntityWriteRequest>("service_update", body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        if let Err(response) = require_collection("service_update", &request.table_name) {
            return response;
        }

        let path_id = path_id.trim();
        let body_id = request.entity.id.trim().to_string();
        match (path_id.is_empty(), body_id.is_empty()) {
            (true, true) => return bad_request("service_update", "entity id is required"),
            (false, true) => request.entity.id = path_id.to_string(),
            (false, false) => {
                let same = match (parse_entity_id(path_id), parse_entity_id(&body_id)) {
                    (Ok(path), Ok(body)) => path == body,
                    (Err(err), _) | (_, Err(err)) => {
                        return bad_request("service_update", err.to_string());
                    }
                };
                if !same {
                    return bad_request(
                        "service_update",
                        format!("path id `{path_id}` does not match entity id `{body_id}`"),
                    );
                }
            }
            (true, false) => {}
        }

        match self
            .store
            .update(ctx, &request.table_name, &request.entity)
        {
            Ok(entity) => {
                info!(
                    "event=service_update module=service status=ok collection={} id={}",
                    request.table_name, entity.id
                );
                entity_response(ResponseStatus::Ok, &entity)
            }
            Err(err) => failure("service_update", "update", &err),
        }
    }

    /// `DELETE /entities/:id` with body `{tableName, id}`.
    pub fn delete_entity(&self, ctx: &OpContext, body: &str) -> ServiceResponse {
        let request = match decode_id_request("service_delete", body) {
            Ok(request) => request,
            Err(response) => return response,
        };

        match self.store.delete(ctx, &request.table_name, &request.id) {
            Ok(true) => {
                info!(
                    "event=service_delete module=service status=ok collection={} id={}",
                    request.table_name, request.id
                );
                ServiceResponse::message(ResponseStatus::Ok, "entity deleted successfully")
            }
            Ok(false) => not_found("service_delete", &request),
            Err(err) => failure("service_delete", "delete", &err),
        }
    }

    /// `PATCH /entities/:id/archive` with body `{tableName, id}`.
    pub fn archive_entity(&self, ctx: &OpContext, body: &str) -> ServiceResponse {
        let request = match decode_id_request("service_archive", body) {
            Ok(request) => request,
            Err(response) => return response,
        };

        match self.store.archive(ctx, &request.table_name, &request.id) {
            Ok(true) => {
                info!(
                    "event=service_archive module=service status=ok collection={} id={}",
                    request.table_name, request.id
                );
                ServiceResponse::message(ResponseStatus::Ok, "entity archived successfully")
            }
            Ok(false) => not_found("service_archive", &request),
            Err(err) => failure("service_archive", "archive", &err),
        }
    }

    /// `GET /entities?type=<collection>`.
    pub fn list_entities(&self, ctx: &OpContext, collection: Option<&str>) -> ServiceResponse {
        let collection = match require_query_collection("service_list", collection) {
            Ok(collection) => collection,
            Err(response) => return response,
        };

        match self.store.list(ctx, collection) {
            Ok(entities) => {
                info!(
                    "event=service_list module=service status=ok collection={} count={}",
                    collection,
                    entities.len()
                );
                ServiceResponse::json(ResponseStatus::Ok, json!(entities))
            }
            Err(err) => failure("service_list", "list", &err),
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(event: &str, body: &str) -> Result<T, ServiceResponse> {
    serde_json::from_str(body)
        .map_err(|err| bad_request(event, format!("invalid request body: {err}")))
}

fn decode_id_request(event: &str, body: &str) -> Result<EntityIdRequest, ServiceResponse> {
    let request = decode::<EntityIdRequest>(event, body)?;
    require_collection(event, &request.table_name)?;
    if request.id.trim().is_empty() {
        return Err(bad_request(event, "entity id is required"));
    }
    Ok(request)
}

fn require_collection(event: &str, table_name: &str) -> Result<(), ServiceResponse> {
    if table_name.trim().is_empty() {
        return Err(bad_request(event, "tableName is required"));
    }
    Ok(())
}

fn require_query_collection<'a>(
    event: &str,
    collection: Option<&'a str>,
) -> Result<&'a str, ServiceResponse> {
    match collection.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(bad_request(event, "type query parameter is required")),
    }
}

fn entity_response<T: serde::Serialize>(status: ResponseStatus, value: &T) -> ServiceResponse {
    match serde_json::to_value(value) {
        Ok(body) => ServiceResponse::json(status, body),
        Err(err) => {
            error!(
                "event=service_encode module=service status=error error_code=encode_failed error={}",
                err
            );
            ServiceResponse::error(
                ResponseStatus::InternalServerError,
                "failed to encode response",
            )
        }
    }
}

fn bad_request(event: &str, message: impl Into<String>) -> ServiceResponse {
    let message = message.into();
    warn!(
        "event={} module=service status=rejected error_code=bad_request error={}",
        event, message
    );
    ServiceResponse::error(ResponseStatus::BadRequest, message)
}

fn not_found(event: &str, request: &EntityIdRequest) -> ServiceResponse {
    warn!(
        "event={} module=service status=error error_code=not_found collection={} id={}",
        event, request.table_name, request.id
    );
    ServiceResponse::error(ResponseStatus::NotFound, "entity not found")
}

fn failure(event: &str, operation: &str, err: &StoreError) -> ServiceResponse {
    let status = status_for(err.kind());
    match status {
        ResponseStatus::BadRequest | ResponseStatus::NotFound => {
            warn!(
                "event={} module=service status=error error_code={} error={}",
                event,
                err.code(),
                err
            );
            ServiceResponse::error(status, err.to_string())
        }
        _ => {
            error!(
                "event={} module=service status=error error_code={} error={}",
                event,
                err.code(),
                err
            );
            ServiceResponse::error(status, format!("failed to {operation} entity"))
        }
    }
}
