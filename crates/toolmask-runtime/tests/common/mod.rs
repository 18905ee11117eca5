//! Scripted stand-in for an MCP server, driven by `sh`

#![allow(dead_code)]

use std::path::Path;

use toolmask_policy::ProxyConfig;

/// Three tools; `__ID__` is replaced by the request id at reply time
pub const TOOLS_REPLY: &str = r#"{"jsonrpc":"2.0","id":__ID__,"result":{"tools":[{"name":"add","description":"Adds two numbers","inputSchema":{"type":"object"}},{"name":"subtract","inputSchema":{"type":"object"}},{"name":"get-args","description":"Echo args"}]}}"#;

pub const INIT_REPLY: &str = r#"{"jsonrpc":"2.0","id":__ID__,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake","version":"0.0.1"}}}"#;

/// Whitespace and key order a re-serializer would not reproduce
pub const PING_REPLY: &str = r#"{ "result": {}, "jsonrpc": "2.0", "id": __ID__ }"#;

fn quote(json: &str) -> String {
    format!("'{}'", json.replace("__ID__", "'\"$id\"'"))
}

/// Shell snippet printing `json` as one frame
pub fn reply(json: &str) -> String {
    format!("printf '%s\\n' {}", quote(json))
}

/// Shell snippet printing `json` in two writes with a pause in between
pub fn split_reply(json: &str, at: usize) -> String {
    let (head, tail) = json.split_at(at);
    format!(
        "printf '%s' {}; sleep 0.2; printf '%s\\n' {}",
        quote(head),
        quote(tail)
    )
}

pub struct FakeServer {
    preamble: String,
    initialize: String,
    tools_list: String,
    ping: String,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            preamble: String::new(),
            initialize: reply(INIT_REPLY),
            tools_list: reply(TOOLS_REPLY),
            ping: format!("printf '\\n'; {}", reply(PING_REPLY)),
        }
    }
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_initialize(mut self, snippet: impl Into<String>) -> Self {
        self.initialize = snippet.into();
        self
    }

    pub fn on_tools_list(mut self, snippet: impl Into<String>) -> Self {
        self.tools_list = snippet.into();
        self
    }

    /// Write the server's pid to `path` on startup
    pub fn record_pid(mut self, path: &Path) -> Self {
        self.preamble = format!("echo $$ > '{}'", path.display());
        self
    }

    pub fn script(&self) -> String {
        format!(
            r#"{}
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*) {} ;;
    *'"method":"tools/list"'*) {} ;;
    *'"method":"ping"'*) {} ;;
  esac
done
"#,
            self.preamble, self.initialize, self.tools_list, self.ping
        )
    }

    pub fn config(&self) -> ProxyConfig {
        ProxyConfig::new(["sh".to_string(), "-c".to_string(), self.script()])
    }
}
