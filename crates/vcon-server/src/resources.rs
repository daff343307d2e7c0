//! `vcon://` resource handling.
//!
//! Resources are read-only browsing views:
//! `vcon://recent`, `vcon://recent/ids`, `vcon://list/ids`,
//! `vcon://uuid/{uuid}` and `vcon://uuid/{uuid}/metadata`.

use rmcp::ErrorData as McpError;
use rmcp::model::{
    Annotated, ListResourceTemplatesResult, ListResourcesResult, RawResource,
    RawResourceTemplate, ReadResourceResult, ResourceContents,
};
use serde::Serialize;
use uuid::Uuid;

use vcon_domain::constants::DEFAULT_SEARCH_LIMIT;
use vcon_domain::error::Error;

use crate::dispatch::error_payload;
use crate::server::VconMcpServer;

fn resource(uri: &str, name: &str, description: &str) -> Annotated<RawResource> {
    Annotated::new(
        RawResource {
            uri: uri.to_owned(),
            name: name.to_owned(),
            title: None,
            description: Some(description.to_owned()),
            mime_type: Some("application/json".to_owned()),
            size: None,
            icons: None,
            meta: None,
        },
        None,
    )
}

/// Static resource catalog.
pub fn list() -> ListResourcesResult {
    ListResourcesResult {
        resources: vec![
            resource(
                "vcon://recent",
                "Recent vCons",
                "Metadata of the most recently updated conversations",
            ),
            resource(
                "vcon://recent/ids",
                "Recent vCon IDs",
                "UUIDs of the most recently updated conversations",
            ),
            resource(
                "vcon://list/ids",
                "All vCon IDs",
                "UUIDs of every visible conversation (capped)",
            ),
        ],
        next_cursor: None,
        meta: None,
    }
}

/// Parameterized resource templates.
pub fn list_templates() -> ListResourceTemplatesResult {
    ListResourceTemplatesResult {
        resource_templates: vec![
            Annotated::new(
                RawResourceTemplate {
                    uri_template: "vcon://uuid/{uuid}".to_owned(),
                    name: "vCon by UUID".to_owned(),
                    title: None,
                    description: Some("Full conversation container".to_owned()),
                    mime_type: Some("application/json".to_owned()),
                    icons: None,
                },
                None,
            ),
            Annotated::new(
                RawResourceTemplate {
                    uri_template: "vcon://uuid/{uuid}/metadata".to_owned(),
                    name: "vCon metadata by UUID".to_owned(),
                    title: None,
                    description: Some(
                        "Subject, timestamps and tenant without the child arrays".to_owned(),
                    ),
                    mime_type: Some("application/json".to_owned()),
                    icons: None,
                },
                None,
            ),
        ],
        next_cursor: None,
        meta: None,
    }
}

/// Route one `vcon://` URI to its view.
pub async fn read(server: &VconMcpServer, uri: &str) -> Result<ReadResourceResult, McpError> {
    let Some(path) = uri.strip_prefix("vcon://") else {
        return Err(McpError::resource_not_found(
            format!("expected a vcon:// URI, got {uri}"),
            None,
        ));
    };

    match path {
        "recent" => {
            let metadata = server
                .context()
                .vcons
                .list_recent(DEFAULT_SEARCH_LIMIT)
                .await;
            respond(uri, metadata)
        }
        "recent/ids" => {
            let ids = server
                .context()
                .vcons
                .list_recent(DEFAULT_SEARCH_LIMIT)
                .await
                .map(|m| m.into_iter().map(|m| m.uuid).collect::<Vec<_>>());
            respond(uri, ids)
        }
        "list/ids" => {
            let ids = server
                .context()
                .vcons
                .list_recent(vcon_domain::constants::MAX_SEARCH_LIMIT)
                .await
                .map(|m| m.into_iter().map(|m| m.uuid).collect::<Vec<_>>());
            respond(uri, ids)
        }
        other => {
            if let Some(rest) = other.strip_prefix("uuid/") {
                let (uuid_part, metadata_only) = match rest.strip_suffix("/metadata") {
                    Some(uuid_part) => (uuid_part, true),
                    None => (rest, false),
                };
                let uuid: Uuid = uuid_part.parse().map_err(|_| {
                    McpError::resource_not_found(
                        format!("'{uuid_part}' is not a valid UUID"),
                        None,
                    )
                })?;

                if metadata_only {
                    let result = server.context().vcons.metadata(&uuid).await.and_then(|m| {
                        m.ok_or_else(|| Error::not_found(format!("vCon {uuid}")))
                    });
                    respond(uri, result)
                } else {
                    let ctx = vcon_domain::value_objects::RequestContext::now();
                    let result = server.context().vcons.get(&uuid, &ctx).await;
                    respond(uri, result)
                }
            } else {
                Err(McpError::resource_not_found(
                    format!("unknown resource: {uri}"),
                    None,
                ))
            }
        }
    }
}

fn respond<T: Serialize>(
    uri: &str,
    result: vcon_domain::error::Result<T>,
) -> Result<ReadResourceResult, McpError> {
    let text = match result {
        Ok(value) => serde_json::to_string_pretty(&value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?,
        Err(error @ Error::NotFound { .. }) => {
            return Err(McpError::resource_not_found(error.to_string(), None));
        }
        Err(error) => error_payload(&error).to_string(),
    };
    Ok(ReadResourceResult {
        contents: vec![ResourceContents::TextResourceContents {
            uri: uri.to_owned(),
            mime_type: Some("application/json".to_owned()),
            text,
            meta: None,
        }],
    })
}
