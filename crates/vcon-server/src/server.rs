//! The MCP server and its tool router.
//!
//! Core tools cover CRUD, the four search modes, the tag subsystem and
//! introspection. Plugin-contributed tools are merged into the listing and
//! dispatched to their owning plugin when the router has no route of that
//! name.

use std::collections::HashMap;
use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::tool::ToolCallContext,
    handler::server::wrapper::Parameters,
    model::{
        CallToolRequestParams, CallToolResult, GetPromptRequestParams, GetPromptResult,
        Implementation, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
        ListToolsResult, PaginatedRequestParams, ReadResourceRequestParams, ReadResourceResult,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext as RmcpContext,
    tool, tool_router,
};
use serde_json::Value;
use uuid::Uuid;

use vcon_application::use_cases::SemanticQuery;
use vcon_domain::constants::EMBEDDING_DIMENSIONS;
use vcon_domain::entities::{Analysis, Vcon};
use vcon_domain::error::Error;
use vcon_domain::tags::stringify_tag_value;
use vcon_domain::validation::{check_analysis_value, check_vcon_value};
use vcon_domain::value_objects::RequestContext as OpContext;
use vcon_domain::value_objects::ResponseFormat;
use vcon_infrastructure::bootstrap::AppContext;

use crate::dispatch::tool_result;
use crate::requests::*;
use crate::resources;
use crate::responses::*;

/// MCP server state: the wired application context plus the tool router.
#[derive(Clone)]
pub struct VconMcpServer {
    context: Arc<AppContext>,
    tool_router: ToolRouter<Self>,
}

impl VconMcpServer {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self {
            context,
            tool_router: Self::tool_router(),
        }
    }

    /// The wired application context (services, plugins, providers).
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Resolve ranked uuids into the caller-chosen response format.
    async fn finalize(
        &self,
        uuids: Vec<Uuid>,
        format: ResponseFormat,
        ctx: &OpContext,
    ) -> vcon_domain::error::Result<(usize, Value)> {
        let payload = self.context.search.finalize(uuids, format, ctx).await?;
        payload_json(&payload)
    }
}

fn dedup_ordered(uuids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    uuids.into_iter().filter(|u| seen.insert(*u)).collect()
}

#[tool_router]
impl VconMcpServer {
    #[tool(
        description = "Store a new vCon conversation container. Takes the complete IETF vCon JSON document; returns the stored uuid, timestamps and derived tenant."
    )]
    async fn create_vcon(
        &self,
        Parameters(req): Parameters<CreateVconRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = async {
            check_vcon_value(&req.vcon)?;
            let vcon: Vcon = serde_json::from_value(req.vcon)
                .map_err(|e| Error::validation("vcon", e.to_string()))?;
            let metadata = self.context.vcons.create(vcon, &ctx).await?;
            Ok(CreateVconOutput {
                uuid: metadata.uuid,
                created_at: metadata.created_at,
                updated_at: metadata.updated_at,
                tenant_id: metadata.tenant_id,
            })
        }
        .await;
        tool_result(result)
    }

    #[tool(description = "Fetch one vCon by uuid, including all child arrays.")]
    async fn get_vcon(
        &self,
        Parameters(req): Parameters<GetVconRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        tool_result(self.context.vcons.get(&req.uuid, &ctx).await)
    }

    #[tool(
        description = "Update a vCon's scalar metadata (subject, extensions, must_support, redacted, appended). Children are appended with the add_* tools."
    )]
    async fn update_vcon(
        &self,
        Parameters(req): Parameters<UpdateVconRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let patch = vcon_domain::value_objects::VconUpdate {
            subject: req.subject,
            extensions: req.extensions,
            must_support: req.must_support,
            redacted: req.redacted,
            appended: req.appended,
            ..vcon_domain::value_objects::VconUpdate::default()
        };
        tool_result(self.context.vcons.update(&req.uuid, patch, &ctx).await)
    }

    #[tool(description = "Delete a vCon and everything it owns. Unknown uuids report not_found.")]
    async fn delete_vcon(
        &self,
        Parameters(req): Parameters<DeleteVconRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = self
            .context
            .vcons
            .delete(&req.uuid, &ctx)
            .await
            .map(|()| DeleteVconOutput {
                uuid: req.uuid,
                deleted: true,
            });
        tool_result(result)
    }

    #[tool(description = "Append one dialog segment to an existing vCon.")]
    async fn add_dialog(
        &self,
        Parameters(req): Parameters<AddDialogRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = self
            .context
            .vcons
            .add_dialog(&req.uuid, req.dialog, &ctx)
            .await
            .map(|vcon| AppendOutput::from_vcon(&vcon));
        tool_result(result)
    }

    #[tool(
        description = "Append one analysis to an existing vCon. Requires a non-empty vendor; the format identifier field is 'schema'."
    )]
    async fn add_analysis(
        &self,
        Parameters(req): Parameters<AddAnalysisRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = async {
            check_analysis_value(&req.analysis)?;
            let analysis: Analysis = serde_json::from_value(req.analysis)
                .map_err(|e| Error::validation("analysis", e.to_string()))?;
            let vcon = self
                .context
                .vcons
                .add_analysis(&req.uuid, analysis, &ctx)
                .await?;
            Ok(AppendOutput::from_vcon(&vcon))
        }
        .await;
        tool_result(result)
    }

    #[tool(description = "Append one attachment to an existing vCon.")]
    async fn add_attachment(
        &self,
        Parameters(req): Parameters<AddAttachmentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = self
            .context
            .vcons
            .add_attachment(&req.uuid, req.attachment, &ctx)
            .await
            .map(|vcon| AppendOutput::from_vcon(&vcon));
        tool_result(result)
    }

    #[tool(
        description = "Search vCons. With a query: keyword search over subjects, parties, dialog and analysis text. Without one: browse by date/tag filters. response_format controls payload size (full, metadata, ids_only)."
    )]
    async fn search_vcons(
        &self,
        Parameters(req): Parameters<SearchVconsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = async {
            let filters = req.filters.into_filters();
            let uuids = match req.query.as_deref().filter(|q| !q.trim().is_empty()) {
                Some(query) => {
                    let hits = self
                        .context
                        .search
                        .keyword(query, filters, &ctx)
                        .await?;
                    dedup_ordered(hits.into_iter().map(|h| h.vcon_uuid))
                }
                None => match &filters.tags {
                    Some(tags) if !tags.is_empty() => {
                        self.context
                            .search
                            .by_tags(tags.clone(), filters.clone(), &ctx)
                            .await?
                    }
                    _ => self
                        .context
                        .vcons
                        .list_recent(filters.effective_limit())
                        .await?
                        .into_iter()
                        .map(|m| m.uuid)
                        .collect(),
                },
            };
            let (total, results) = self.finalize(uuids, req.response_format, &ctx).await?;
            Ok(SearchOutput { total, results })
        }
        .await;
        tool_result(result)
    }

    #[tool(
        description = "Keyword search returning per-document hits with ranks and snippets (which subject, party, dialog or analysis matched and where)."
    )]
    async fn search_vcons_content(
        &self,
        Parameters(req): Parameters<SearchContentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = async {
            let hits = self
                .context
                .search
                .keyword(&req.query, req.filters.into_filters(), &ctx)
                .await?;
            Ok(KeywordSearchOutput {
                total: hits.len(),
                hits,
            })
        }
        .await;
        tool_result(result)
    }

    #[tool(
        description = "Semantic similarity search over stored content vectors. Takes a query string (vectorized locally) or a 384-dimensional query_vector; returns hits at or above the similarity threshold (default 0.7). Recent writes appear once the embedding worker has processed them."
    )]
    async fn search_vcons_semantic(
        &self,
        Parameters(req): Parameters<SemanticSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = async {
            let query = semantic_query(req.query, req.query_vector)?;
            let hits = self
                .context
                .search
                .semantic(query, req.threshold, req.filters.into_filters(), &ctx)
                .await?;
            let uuids = dedup_ordered(hits.iter().map(|h| h.vcon_uuid));
            let (total, results) = self.finalize(uuids, req.response_format, &ctx).await?;
            Ok(SemanticSearchOutput {
                total,
                hits,
                results,
            })
        }
        .await;
        tool_result(result)
    }

    #[tool(
        description = "Hybrid search combining keyword rank and semantic similarity with a configurable semantic_weight (default 0.6). Degrades to the available mode when one input is missing."
    )]
    async fn search_vcons_hybrid(
        &self,
        Parameters(req): Parameters<HybridSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = async {
            if req.query.is_none() && req.query_vector.is_none() {
                return Err(Error::validation(
                    "query",
                    "hybrid search needs a query string or a query vector",
                ));
            }
            if let Some(vector) = &req.query_vector {
                check_vector(vector)?;
            }
            let hits = self
                .context
                .search
                .hybrid(
                    req.query,
                    req.query_vector,
                    req.semantic_weight,
                    req.filters.into_filters(),
                    &ctx,
                )
                .await?;
            let uuids: Vec<Uuid> = hits.iter().map(|h| h.vcon_uuid).collect();
            let (total, results) = self.finalize(uuids, req.response_format, &ctx).await?;
            Ok(HybridSearchOutput {
                total,
                hits,
                results,
            })
        }
        .await;
        tool_result(result)
    }

    #[tool(
        description = "Read, set or remove one tag on a vCon. Tags are key:value pairs with unique keys; set with overwrite=false fails on an existing key."
    )]
    async fn manage_tag(
        &self,
        Parameters(req): Parameters<ManageTagRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = async {
            match req.action {
                TagAction::Get => {
                    let value = self.context.tags.get(&req.uuid, &req.key).await?;
                    serde_json::to_value(TagValueOutput {
                        uuid: req.uuid,
                        key: req.key,
                        value,
                    })
                    .map_err(Error::from)
                }
                TagAction::Set => {
                    let raw = req.value.ok_or_else(|| {
                        Error::validation("value", "required for action \"set\"")
                    })?;
                    let value = stringify_tag_value(&raw)?;
                    let tags = self
                        .context
                        .tags
                        .set(
                            &req.uuid,
                            &req.key,
                            &value,
                            req.overwrite.unwrap_or(true),
                        )
                        .await?;
                    serde_json::to_value(TagsOutput {
                        uuid: req.uuid,
                        tags,
                    })
                    .map_err(Error::from)
                }
                TagAction::Remove => {
                    let tags = self.context.tags.remove(&req.uuid, &req.key).await?;
                    serde_json::to_value(TagsOutput {
                        uuid: req.uuid,
                        tags,
                    })
                    .map_err(Error::from)
                }
            }
        }
        .await;
        tool_result(result)
    }

    #[tool(description = "All tags of one vCon as a key -> value object.")]
    async fn get_tags(
        &self,
        Parameters(req): Parameters<GetTagsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .context
            .tags
            .get_all(&req.uuid)
            .await
            .map(|tags| TagsOutput {
                uuid: req.uuid,
                tags,
            });
        tool_result(result)
    }

    #[tool(description = "Remove every tag from a vCon (drops the tags attachment).")]
    async fn remove_all_tags(
        &self,
        Parameters(req): Parameters<RemoveAllTagsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self
            .context
            .tags
            .remove_all(&req.uuid)
            .await
            .map(|()| TagsOutput {
                uuid: req.uuid,
                tags: std::collections::BTreeMap::new(),
            });
        tool_result(result)
    }

    #[tool(
        description = "Find vCons carrying every supplied tag (AND-semantics, exact key and value matches)."
    )]
    async fn search_by_tags(
        &self,
        Parameters(req): Parameters<SearchByTagsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let ctx = OpContext::now();
        let result = async {
            let filters = vcon_domain::value_objects::SearchFilters {
                limit: req.limit,
                ..vcon_domain::value_objects::SearchFilters::default()
            };
            let uuids = self.context.search.by_tags(req.tags, filters, &ctx).await?;
            let (total, results) = self.finalize(uuids, req.response_format, &ctx).await?;
            Ok(SearchOutput { total, results })
        }
        .await;
        tool_result(result)
    }

    #[tool(
        description = "Distinct tag keys and values across the store, optionally with per-value counts."
    )]
    async fn get_unique_tags(
        &self,
        Parameters(req): Parameters<UniqueTagsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let options = vcon_domain::value_objects::UniqueTagsOptions {
            include_counts: req.include_counts,
            key_filter: req.key_filter,
            min_count: req.min_count,
        };
        tool_result(self.context.search.unique_tags(&options).await)
    }

    #[tool(description = "Table layout and row counts, plus whether row-level security is active.")]
    async fn get_database_shape(&self) -> Result<CallToolResult, McpError> {
        tool_result(self.context.vcons.shape().await)
    }

    #[tool(
        description = "Aggregate store statistics: vCon and child counts, embedding coverage, queue depth."
    )]
    async fn get_database_stats(&self) -> Result<CallToolResult, McpError> {
        tool_result(self.context.vcons.stats().await)
    }
}

fn check_vector(vector: &[f32]) -> vcon_domain::error::Result<()> {
    if vector.len() != EMBEDDING_DIMENSIONS {
        return Err(Error::validation(
            "query_vector",
            format!(
                "expected {EMBEDDING_DIMENSIONS} dimensions, got {}",
                vector.len()
            ),
        ));
    }
    Ok(())
}

fn semantic_query(
    query: Option<String>,
    vector: Option<Vec<f32>>,
) -> vcon_domain::error::Result<SemanticQuery> {
    match (vector, query) {
        (Some(vector), _) => {
            check_vector(&vector)?;
            Ok(SemanticQuery::Vector(vector))
        }
        (None, Some(query)) if !query.trim().is_empty() => Ok(SemanticQuery::Text(query)),
        _ => Err(Error::validation(
            "query",
            "semantic search needs a query string or a query vector",
        )),
    }
}

impl ServerHandler for VconMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            server_info: Implementation {
                name: "vcon-mcp".into(),
                title: Some("vCon Conversation Store".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Stores and retrieves IETF vCon conversation containers.\n\n\
                 CRUD: create_vcon, get_vcon, update_vcon, delete_vcon, plus \
                 add_dialog / add_analysis / add_attachment appenders.\n\
                 Search: search_vcons (keyword or filter browse), \
                 search_vcons_content (per-hit snippets), search_vcons_semantic \
                 (meaning-based), search_vcons_hybrid (weighted combination). All \
                 accept date and tag filters, a limit, and response_format of \
                 full, metadata or ids_only.\n\
                 Tags: manage_tag, get_tags, remove_all_tags, search_by_tags, \
                 get_unique_tags. Tags are exact key:value labels; tag search \
                 AND-combines keys.\n\
                 Introspection: get_database_shape, get_database_stats.\n\
                 Resources: vcon://recent, vcon://recent/ids, vcon://list/ids, \
                 vcon://uuid/{uuid}, vcon://uuid/{uuid}/metadata."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RmcpContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        let mut tools = self.tool_router.list_all();
        for (_owner, plugin_tool) in self.context.plugins.tools() {
            let schema = match plugin_tool.input_schema {
                Value::Object(map) => map,
                _ => serde_json::Map::new(),
            };
            tools.push(Tool::new(
                plugin_tool.name,
                plugin_tool.description,
                Arc::new(schema),
            ));
        }
        Ok(ListToolsResult {
            tools,
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RmcpContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let name = request.name.to_string();
        if self.tool_router.list_all().iter().any(|t| t.name == name) {
            let ctx = ToolCallContext::new(self, request, context);
            return self.tool_router.call(ctx).await;
        }

        // Not a core tool; offer it to the plugins.
        let args = request
            .arguments
            .map(Value::Object)
            .unwrap_or(Value::Null);
        let op_ctx = OpContext::now();
        tool_result(
            self.context
                .plugins
                .handle_tool_call(&name, args, &op_ctx)
                .await,
        )
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RmcpContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(resources::list())
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RmcpContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(resources::list_templates())
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RmcpContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        resources::read(self, &request.uri).await
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RmcpContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult {
            prompts: crate::prompts::catalog(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RmcpContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        let arguments: Option<HashMap<String, String>> = request.arguments.map(|args| {
            args.into_iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_owned())))
                .collect()
        });
        crate::prompts::render(&request.name, arguments).ok_or_else(|| {
            McpError::invalid_params(format!("Unknown prompt: {}", request.name), None)
        })
    }
}
