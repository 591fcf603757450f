use async_trait::async_trait;

use crate::tool::{Tool, ToolError, ToolInput};

type Handler = dyn Fn(&ToolInput) -> Result<String, ToolError> + Send + Sync;

/// A tool backed by a plain closure.  The quickest way to expose an
/// existing function (a lookup table, a calculator, a client call) to the
/// agent.
pub struct FnTool {
    name: String,
    description: String,
    return_direct: bool,
    handler: Box<Handler>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ToolInput) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            return_direct: false,
            handler: Box::new(handler),
        }
    }

    /// Make this tool's output the final answer of the run.
    pub fn with_return_direct(mut self) -> Self {
        self.return_direct = true;
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn return_direct(&self) -> bool {
        self.return_direct
    }

    async fn run(&self, input: &ToolInput) -> Result<String, ToolError> {
        (self.handler)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_receives_input() {
        let t = FnTool::new("upper", "uppercases text", |i| Ok(i.as_text().to_uppercase()));
        assert_eq!(t.run(&ToolInput::from("abc")).await.unwrap(), "ABC");
        assert!(!Tool::return_direct(&t));
    }

    #[tokio::test]
    async fn closure_errors_propagate() {
        let t = FnTool::new("broken", "always fails", |_| {
            Err(ToolError::execution("broken", "backend unavailable"))
        });
        let err = t.run(&ToolInput::from("x")).await.unwrap_err();
        assert_eq!(err.to_string(), "broken failed: backend unavailable");
    }

    #[test]
    fn return_direct_flag_is_set() {
        let t = FnTool::new("answer", "", |_| Ok("42".into())).with_return_direct();
        assert!(Tool::return_direct(&t));
    }
}
