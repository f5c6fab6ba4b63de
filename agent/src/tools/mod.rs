use crate::llm::Message;
use crate::{Error, Result};
use async_trait::async_trait;
use schemars::{JsonSchema, schema_for};

#[derive(Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub desc: String,
    pub params: serde_json::Value,
}

impl ToolDefinition {
    /// Derives the parameter schema from the type the tool deserializes its
    /// arguments into, so the declaration cannot drift from the parser.
    pub fn new<P: JsonSchema>(name: &str, desc: &str) -> Result<Self> {
        let schema = schema_for!(P);
        let mut params = serde_json::to_value(&schema.schema)?;
        if let Some(obj) = params.as_object_mut() {
            obj.remove("title");
        }
        Ok(Self {
            name: name.to_string(),
            desc: desc.to_string(),
            params,
        })
    }

    /// Marks `fields` as required. Fields that deserialize with a default
    /// lose their `required` entry in the generated schema.
    pub fn required(mut self, fields: &[&str]) -> Self {
        if let Some(obj) = self.params.as_object_mut() {
            if let Some(props) = obj.get_mut("properties").and_then(|p| p.as_object_mut()) {
                for field in fields {
                    if let Some(prop) = props.get_mut(*field).and_then(|p| p.as_object_mut()) {
                        prop.remove("default");
                    }
                }
            }
            obj.insert("required".to_string(), serde_json::json!(fields));
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, std::hash::Hash)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: String,
}

impl ToolCall {
    pub fn args<O: for<'de> serde::Deserialize<'de>>(&self) -> Result<O> {
        let raw = if self.args.trim().is_empty() {
            "{}"
        } else {
            self.args.as_str()
        };

        serde_json::from_str(raw).map_err(|source| Error::ArgumentParseError {
            name: self.name.clone(),
            args: self.args.clone(),
            source,
        })
    }

    pub fn result(&self, result: String) -> Message {
        Message::Tool {
            id: self.id.clone(),
            name: self.name.clone(),
            result,
        }
    }
}

/// A capability the model can invoke. Tools are shared between the
/// concurrently running calls of one round, so invocation takes `&self`.
#[async_trait]
pub trait Tool {
    fn definition(&self) -> Result<ToolDefinition>;

    async fn invoke(&self, call: &ToolCall) -> Result<Message>;
}
