//! Platform call context for one worker invocation.

use serde::{Deserialize, Serialize};

/// What the hosting platform tells a worker about how it was invoked.
///
/// `invoked_function_arn` (or `activity_arn` for activity workers) is used to
/// pick this worker's step out of the execution history when several steps
/// run in parallel branches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoked_function_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function_arn(mut self, arn: impl Into<String>) -> Self {
        self.invoked_function_arn = Some(arn.into());
        self
    }

    pub fn with_activity_arn(mut self, arn: impl Into<String>) -> Self {
        self.activity_arn = Some(arn.into());
        self
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// The resource ARN to look for in scheduled-step history events.
    pub fn resource_arn(&self) -> Option<&str> {
        self.invoked_function_arn
            .as_deref()
            .or(self.activity_arn.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_arn_wins_over_activity_arn() {
        let inv = Invocation::new()
            .with_activity_arn("arn:aws:states:us-east-1:1:activity:a")
            .with_function_arn("arn:aws:lambda:us-east-1:1:function:f");
        assert_eq!(
            inv.resource_arn(),
            Some("arn:aws:lambda:us-east-1:1:function:f")
        );
        assert_eq!(Invocation::new().resource_arn(), None);
    }
}
