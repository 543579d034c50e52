//! Prompt Construction
//!
//! One function per analysis operation. Every prompt is a (system, user)
//! pair; the parameter policy decides how the pair is laid onto the wire
//! for a given model family.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::ai::budget::LedgerEntry;
use crate::types::DiagnosticSnapshot;

/// System/user instruction pair for one model call.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Allowed remediation actions, spelled the way the response schema expects.
const ACTION_LIST: &str =
    "increase_timeout, exclude_paths, reduce_scope, retry_scan, skip_scanner, increase_resources";

pub fn stuck_scan(snapshot: &DiagnosticSnapshot, history: &[LedgerEntry]) -> Prompt {
    let snapshot_json =
        serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());

    let mut user = format!(
        "A security scan appears to be stuck. Diagnose the root cause and suggest remediation.\n\n\
         Diagnostic data:\n{snapshot_json}\n"
    );

    if !history.is_empty() {
        user.push_str("\nPrevious analyses of this repository:\n");
        for entry in history.iter().rev().take(5) {
            user.push_str(&format!(
                "- [{}] {} ({}): {} (confidence {:.2})\n",
                entry.recorded_at.format("%Y-%m-%d %H:%M"),
                entry.scanner,
                entry.analysis.severity,
                entry.analysis.root_cause,
                entry.analysis.confidence,
            ));
        }
    }

    user.push_str(&format!(
        "\nRespond with a JSON object containing:\n\
         1. \"root_cause\": concise diagnosis of why the scan is stuck.\n\
         2. \"severity\": one of info, low, medium, high, critical.\n\
         3. \"confidence\": overall confidence (0.0 - 1.0).\n\
         4. \"explanation\": short explanation for the operator.\n\
         5. \"remediation_suggestions\": array of objects, each with \"action\" \
         (one of: {ACTION_LIST}), \"params\" (action parameters), \"rationale\", \
         \"confidence\" (0.0 - 1.0), \"estimated_impact\", and \"safety_level\" \
         (safe, moderate, or risky).\n"
    ));

    Prompt {
        system: "You are an expert DevSecOps engineer specializing in security scanning \
                 and performance optimization. Provide practical, actionable advice in JSON format."
            .to_string(),
        user,
    }
}

pub fn triage(title: &str, description: &str, severity: &str, scanner: &str) -> Prompt {
    Prompt {
        system: "You are a security analyst. Output valid JSON only.".to_string(),
        user: format!(
            "Triage this security finding.\n\n\
             Title: {title}\n\
             Description: {description}\n\
             Reported Severity: {severity}\n\
             Scanner: {scanner}\n\n\
             Respond with a JSON object containing:\n\
             1. \"priority\": recommended priority (critical, high, medium, low, info).\n\
             2. \"confidence\": confidence score (0.0 - 1.0).\n\
             3. \"false_positive_probability\": estimated probability this is a false positive (0.0 - 1.0).\n\
             4. \"reasoning\": explanation for the priority rating.\n"
        ),
    }
}

pub fn remediation(vuln_type: &str, description: &str, context: &str, language: &str) -> Prompt {
    Prompt {
        system: "You are a security expert providing remediation plans. Output valid JSON only."
            .to_string(),
        user: format!(
            "Provide a remediation plan for this vulnerability.\n\n\
             Vulnerability: {vuln_type}\n\
             Description: {description}\n\
             Language: {language}\n\n\
             Context (code or dependency):\n```\n{context}\n```\n\n\
             Respond with a JSON object containing exactly these fields:\n\
             1. \"remediation\": a detailed explanation of how to fix the issue (Markdown).\n\
             2. \"diff\": a unified diff showing the code changes, or an empty string \
             when no code change applies (e.g. a configuration change).\n"
        ),
    }
}

pub fn architecture(
    repo_name: &str,
    file_structure: &str,
    config_files: &BTreeMap<String, String>,
) -> Prompt {
    let mut configs = String::new();
    for (name, content) in config_files {
        configs.push_str(&format!("\n--- {name} ---\n{content}\n"));
    }

    Prompt {
        system: "You are a Senior Software Architect.".to_string(),
        user: format!(
            "Analyze this repository and provide an end-to-end architecture overview.\n\n\
             Repository: {repo_name}\n\n\
             File Structure:\n{file_structure}\n\n\
             Configuration Files:\n{configs}\n\
             Provide a comprehensive Markdown report covering:\n\
             1. **High-Level Overview**: what does this project do?\n\
             2. **Tech Stack**: languages, frameworks, databases, tools.\n\
             3. **Architecture**: monolith/microservice? layers? patterns?\n\
             4. **Storage**: database schema, file storage, caching (inferred from configs).\n\
             5. **API**: REST/GraphQL? endpoint structure?\n\
             6. **Fault Tolerance**: retries, circuit breakers, logging (inferred).\n\
             7. **Unique Features**: what stands out?\n\n\
             Then include a Python script using the `diagrams` library to visualize the \
             architecture, inside a code block labeled `python`:\n\
             - Instantiate `Diagram` with `show=False` and `filename=\"architecture_diagram\"`.\n\
             - Use `graph_attr={{\"splines\": \"ortho\", \"nodesep\": \"1.0\", \"ranksep\": \"1.0\"}}` \
             for a clean layout and group related components into `Cluster`s.\n\
             - Import from `diagrams.aws`, `diagrams.azure`, `diagrams.gcp`, or `diagrams.onprem` \
             to match the detected provider; use generic nodes when no provider is obvious.\n\
             - Add a `# GAP:` comment for any assumption or missing information.\n\
             - Ensure the code is valid and self-contained.\n\n\
             Format as clean Markdown. Be concise but technical.\n"
        ),
    }
}

pub fn explain_timeout(
    repo_name: &str,
    scanner: &str,
    timeout_secs: u64,
    context: &Value,
) -> Prompt {
    let context_json = serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());

    Prompt {
        system: "You are a helpful DevSecOps assistant.".to_string(),
        user: format!(
            "Explain in 2-3 sentences why this security scan timed out:\n\n\
             Repository: {repo_name}\n\
             Scanner: {scanner}\n\
             Timeout: {timeout_secs} seconds\n\
             Context: {context_json}\n\n\
             Provide a clear, non-technical explanation suitable for developers."
        ),
    }
}

pub fn diagram_repair(source: &str, failure: &str) -> Prompt {
    Prompt {
        system: "You are a Python expert specializing in the `diagrams` library.".to_string(),
        user: format!(
            "The following diagram script failed to execute.\n\n\
             Script:\n```python\n{source}\n```\n\n\
             Failure:\n```\n{failure}\n```\n\n\
             Return a corrected, self-contained version of the script:\n\
             - Keep `show=False` and `filename=\"architecture_diagram\"`.\n\
             - Fix invalid imports by substituting nodes that exist in the `diagrams` library; \
             use generic nodes when unsure.\n\
             - Return ONLY the Python code block.\n"
        ),
    }
}
