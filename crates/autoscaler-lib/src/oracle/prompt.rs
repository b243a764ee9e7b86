use crate::models::{Bounds, Context};

/// Prompt asking for a single JSON decision about `context`
pub fn build_prompt(context: &Context, bounds: Bounds) -> String {
    let context_json =
        serde_json::to_string(context).unwrap_or_else(|_| format!("{:?}", context));

    format!(
        r#"You are a Kubernetes autoscaling assistant. Return ONLY a valid JSON object matching this schema:
{{
  "action": "scale" | "noop" | "restart",
  "replicas": integer | null,
  "reason": string,
  "confidence": number between 0 and 1
}}
Context: {context_json}
Rules:
- If "action" is "scale", "replicas" must be an integer between {min} and {max}.
- If "action" is "noop" or "restart", "replicas" must be null.
- "cpu" is total CPU usage in cores. If "metricsDegraded" is true the cpu value is unknown, not zero.
- If unsure, return {{"action":"noop","replicas":null,"reason":"uncertain","confidence":0}}.
Respond with the JSON object only: no markdown, no explanation."#,
        min = bounds.min(),
        max = bounds.max(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{WorkloadReplicas, WorkloadTarget};
    use chrono::Utc;

    #[test]
    fn test_prompt_embeds_context_and_bounds() {
        let target = WorkloadTarget::new("default", "sample-app");
        let replicas = WorkloadReplicas {
            desired: 2,
            ..Default::default()
        };
        let ctx = Context::new(Utc::now(), &target, replicas, Some(0.85));
        let prompt = build_prompt(&ctx, Bounds::new(2, 8).unwrap());

        assert!(prompt.contains(r#""action": "scale" | "noop" | "restart""#));
        assert!(prompt.contains(r#""deployment":"sample-app""#));
        assert!(prompt.contains(r#""currentReplicas":2"#));
        assert!(prompt.contains(r#""cpu":0.85"#));
        assert!(prompt.contains("between 2 and 8"));
        assert!(prompt.contains("JSON object only"));
    }
}
