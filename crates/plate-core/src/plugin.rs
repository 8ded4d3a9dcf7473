use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{CoreCommandsPlugin, MarksCommandsPlugin};
use crate::core::{Document, ElementNode, Node};
use crate::editor::Editor;
use crate::mark::MarkSpec;
use crate::normalize::CoreNormalizePlugin;
use crate::ops::Op;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;
pub type QueryHandler =
    Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    /// Left out of command palettes.
    pub hidden: bool,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            hidden: false,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

/// What an element may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    Inline,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub children: ChildConstraint,
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    /// Ops that fix `doc`, all addressed against `doc` as given.
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

/// Runs synchronously after every selection update: each applied
/// transaction, explicit selection change, undo and redo.
pub trait SelectionObserver: Send + Sync {
    fn id(&self) -> &'static str;
    fn selection_changed(&self, editor: &Editor);
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn mark_specs(&self) -> Vec<MarkSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
    fn selection_observers(&self) -> Vec<Box<dyn SelectionObserver>> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    mark_specs: HashMap<String, MarkSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
    selection_observers: Vec<Box<dyn SelectionObserver>>,
}

fn insert_unique<V>(
    map: &mut HashMap<String, V>,
    key: String,
    value: V,
    what: &str,
) -> Result<(), String> {
    match map.entry(key) {
        Entry::Occupied(entry) => Err(format!("Duplicate {what}: {}", entry.key())),
        Entry::Vacant(entry) => {
            entry.insert(value);
            Ok(())
        }
    }
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    /// Paragraph and divider blocks, normalization and text insertion.
    pub fn core() -> Self {
        let mut registry = Self::default();
        registry.register_builtin(Box::new(CoreSchemaPlugin));
        registry.register_builtin(Box::new(CoreNormalizePlugin));
        registry.register_builtin(Box::new(CoreCommandsPlugin));
        registry
    }

    /// [`PluginRegistry::core`] plus the built-in formatting marks.
    pub fn richtext() -> Self {
        let mut registry = Self::core();
        registry.register_builtin(Box::new(MarksCommandsPlugin));
        registry
    }

    fn register_builtin(&mut self, plugin: Box<dyn PlatePlugin>) {
        if let Err(err) = self.register_plugin(plugin) {
            tracing::error!(%err, "built-in plugin rejected");
        }
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), String> {
        let plugin_id = plugin.id();

        for spec in plugin.node_specs() {
            insert_unique(&mut self.node_specs, spec.kind.clone(), spec, "node spec kind")?;
        }
        for spec in plugin.mark_specs() {
            if spec.name.is_empty() {
                return Err(format!("Empty mark name in plugin {plugin_id}"));
            }
            insert_unique(&mut self.mark_specs, spec.name.clone(), spec, "mark spec name")?;
        }
        for command in plugin.commands() {
            insert_unique(&mut self.commands, command.id.clone(), command, "command id")?;
        }
        for query in plugin.queries() {
            insert_unique(&mut self.queries, query.id.clone(), query, "query id")?;
        }
        self.normalize_passes.extend(plugin.normalize_passes());
        self.selection_observers
            .extend(plugin.selection_observers());

        tracing::debug!(plugin = plugin_id, "registered plugin");
        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn mark_specs(&self) -> &HashMap<String, MarkSpec> {
        &self.mark_specs
    }

    pub fn mark_spec(&self, name: &str) -> Option<&MarkSpec> {
        self.mark_specs.get(name)
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn selection_observers(&self) -> &[Box<dyn SelectionObserver>] {
        &self.selection_observers
    }

    /// Elements of unregistered kinds count as inline containers when they
    /// hold text.
    pub fn child_constraint(&self, el: &ElementNode) -> ChildConstraint {
        match self.node_specs.get(&el.kind) {
            Some(spec) => spec.children,
            None if el.children.iter().any(|n| matches!(n, Node::Text(_))) => {
                ChildConstraint::Inline
            }
            None => ChildConstraint::Any,
        }
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        self.normalize_passes
            .iter()
            .flat_map(|pass| pass.run(doc, self))
            .collect()
    }
}

struct CoreSchemaPlugin;

impl PlatePlugin for CoreSchemaPlugin {
    fn id(&self) -> &'static str {
        "core.schema"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![
            NodeSpec {
                kind: "paragraph".to_string(),
                children: ChildConstraint::Inline,
            },
            NodeSpec {
                kind: "divider".to_string(),
                children: ChildConstraint::None,
            },
        ]
    }
}
