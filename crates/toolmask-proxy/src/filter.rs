//! Tool-list filtering of server responses

use std::borrow::Cow;

use serde_json::Value;
use toolmask_policy::{FilterMode, ProxyConfig};
use tracing::{debug, trace};

use crate::error::ProxyError;
use crate::pattern::PatternSet;
use crate::protocol::{tool_name, JsonRpcMessage, ToolDescriptor};

#[derive(Debug, Clone)]
enum Rule {
    PassThrough,
    Include(PatternSet),
    Exclude(PatternSet),
}

/// Decides which tools stay visible
#[derive(Debug, Clone)]
pub struct ToolFilter {
    rule: Rule,
}

impl Default for ToolFilter {
    fn default() -> Self {
        Self::pass_through()
    }
}

impl ToolFilter {
    /// A filter that keeps every tool
    pub fn pass_through() -> Self {
        Self { rule: Rule::PassThrough }
    }

    pub fn from_config(config: &ProxyConfig) -> Result<Self, ProxyError> {
        let rule = match config.filter_mode() {
            FilterMode::PassThrough => Rule::PassThrough,
            FilterMode::Include(patterns) => Rule::Include(PatternSet::new(patterns)?),
            FilterMode::Exclude(patterns) => Rule::Exclude(PatternSet::new(patterns)?),
        };
        Ok(Self { rule })
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self.rule, Rule::PassThrough)
    }

    /// Whether a tool called `name` survives filtering
    pub fn is_visible(&self, name: &str) -> bool {
        match &self.rule {
            Rule::PassThrough => true,
            Rule::Include(patterns) => patterns.matches_any(name),
            Rule::Exclude(patterns) => !patterns.matches_any(name),
        }
    }

    /// Filter raw tool entries in place, returning how many were hidden.
    /// Entries without a string `name` are hidden by an include filter and kept otherwise.
    pub fn apply(&self, tools: &mut Vec<Value>) -> usize {
        let before = tools.len();
        tools.retain(|tool| match tool_name(tool) {
            Some(name) => self.is_visible(name),
            None => !matches!(self.rule, Rule::Include(_)),
        });
        before - tools.len()
    }

    pub fn apply_descriptors(&self, tools: Vec<ToolDescriptor>) -> Vec<ToolDescriptor> {
        tools
            .into_iter()
            .filter(|tool| self.is_visible(&tool.name))
            .collect()
    }
}

/// Rewrites `tools/list` results on their way to the client.
///
/// Every frame that is not a successful tool-list response, including frames
/// that fail to parse, comes back borrowed and byte-identical.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    tools: ToolFilter,
}

impl MessageFilter {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        Ok(Self {
            tools: ToolFilter::from_config(config)?,
        })
    }

    /// Process one frame
    pub fn process<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            trace!("Passing through non-JSON frame");
            return Cow::Borrowed(line);
        };
        let Some(mut message) = JsonRpcMessage::from_value(value) else {
            trace!("Passing through non-JSON-RPC frame");
            return Cow::Borrowed(line);
        };
        let Some(tools) = message.tool_list_mut() else {
            return Cow::Borrowed(line);
        };

        let total = tools.len();
        let hidden = self.tools.apply(tools);
        debug!(
            "Filtered tools/list response: {} of {} tools visible",
            total - hidden,
            total
        );

        match serde_json::to_string(&message.into_value()) {
            Ok(rewritten) => Cow::Owned(rewritten),
            Err(e) => {
                debug!("Failed to re-serialize tool list, forwarding original: {}", e);
                Cow::Borrowed(line)
            }
        }
    }
}

/// One-off form of [`MessageFilter::process`] for callers holding only a config
pub fn process_line(line: &str, config: &ProxyConfig) -> String {
    match MessageFilter::new(config) {
        Ok(filter) => filter.process(line).into_owned(),
        Err(e) => {
            debug!("Invalid tool pattern, forwarding frame unchanged: {}", e);
            line.to_string()
        }
    }
}
