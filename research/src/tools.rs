use crate::tavily::{DEFAULT_NUM_RESULTS, TavilyClient};
use agent::Result;
use agent::llm::Message;
use agent::tools::{Tool, ToolCall, ToolDefinition};
use async_trait::async_trait;
use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{ArrayValidation, InstanceType, Schema, SchemaObject};
use serde::Deserialize;
use std::sync::Arc;

// A missing list deserializes as empty so the client reports it as a
// ToolInputError; the declarations still mark the lists as required.
#[derive(Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// List of search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Maximum number of results to return (default 6).
    #[serde(default = "default_num_results")]
    #[schemars(range(min = 1, max = 20))]
    pub num_results: i64,
}

fn default_num_results() -> i64 {
    DEFAULT_NUM_RESULTS
}

#[derive(Deserialize, JsonSchema)]
pub struct ExtractArgs {
    /// List of absolute URLs to extract in markdown format.
    #[serde(default)]
    #[schemars(schema_with = "url_list")]
    pub urls: Vec<String>,
}

fn url_list(_: &mut SchemaGenerator) -> Schema {
    let item = SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        format: Some("uri".to_string()),
        ..Default::default()
    };

    SchemaObject {
        instance_type: Some(InstanceType::Array.into()),
        array: Some(Box::new(ArrayValidation {
            items: Some(Schema::Object(item).into()),
            ..Default::default()
        })),
        ..Default::default()
    }
    .into()
}

pub struct SearchTool(Arc<TavilyClient>);

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> Result<ToolDefinition> {
        ToolDefinition::new::<SearchArgs>(
            "search",
            "Use Tavily search to fetch up-to-date web results. Keywords should be a list of related terms. Set num_results between 1 and 20.",
        )
        .map(|def| def.required(&["keywords"]))
    }

    async fn invoke(&self, call: &ToolCall) -> Result<Message> {
        let args: SearchArgs = call.args()?;
        let bundle = self.0.search(&args.keywords, args.num_results).await?;
        Ok(call.result(serde_json::to_string(&bundle)?))
    }
}

pub struct ExtractTool(Arc<TavilyClient>);

#[async_trait]
impl Tool for ExtractTool {
    fn definition(&self) -> Result<ToolDefinition> {
        ToolDefinition::new::<ExtractArgs>(
            "extract",
            "Use Tavily extract to pull cleaned markdown content from URLs returned by search.",
        )
        .map(|def| def.required(&["urls"]))
    }

    async fn invoke(&self, call: &ToolCall) -> Result<Message> {
        let args: ExtractArgs = call.args()?;
        let bundle = self.0.extract(&args.urls).await?;
        Ok(call.result(serde_json::to_string(&bundle)?))
    }
}

/// The tools exposed to the model, all backed by the same client.
pub fn registry(client: Arc<TavilyClient>) -> Vec<Box<dyn Tool + Send + Sync>> {
    vec![
        Box::new(SearchTool(client.clone())),
        Box::new(ExtractTool(client)),
    ]
}
