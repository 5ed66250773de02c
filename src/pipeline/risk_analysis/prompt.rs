//! Prompt templates for the risk assessment call.

/// System instruction sent with every request.
pub const SYSTEM_PROMPT: &str = "You are an experienced intensive care physician reviewing \
hospitalized patients. Your assessments are clear, objective and evidence-based.";

/// Markers the reply is asked to use. The classifier keys on the same text.
pub const CRITICALITY_MARKER: &str = "CRITICALITY:";
pub const ATTENTION_MARKER: &str = "ATTENTION POINTS:";
pub const RECOMMENDATIONS_MARKER: &str = "RECOMMENDATIONS:";

/// Wrap a case summary in the assessment instructions.
pub fn build_assessment_prompt(case_summary: &str) -> String {
    format!(
        "You are reviewing a patient in an intensive care unit or ward.

<case>
{case}
</case>

Assess the clinical picture and answer with exactly these sections:

{CRITICALITY_MARKER} [CRITICAL / HIGH / MODERATE / LOW]

{ATTENTION_MARKER}
- [List the 2-3 most important findings]

{RECOMMENDATIONS_MARKER}
- [List the 2-3 priority actions]

Be concise and objective. Focus on the most relevant findings.",
        case = case_summary.trim_end(),
    )
}
