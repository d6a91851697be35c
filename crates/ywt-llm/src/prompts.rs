//! Prompt builders
//!
//! Pure functions from workflow data to prompt text, plus the parser for the
//! persona generator's reply.

use std::fmt::Write as _;
use ywt_core::{Entity, EntityPhaseResult, Phase, PhaseResult, PhaseSummary};

/// What each phase asks of a persona
#[must_use]
pub fn phase_instruction(phase: Phase) -> &'static str {
    match phase {
        Phase::Y => "What was done (Y): the concrete actions taken and experiences had so far.",
        Phase::W => "What was learned (W): the insights and lessons drawn from that experience.",
        Phase::T => "What to do next (T): the concrete actions to take from here.",
    }
}

/// System prompt for persona generation
#[must_use]
pub fn persona_system(count: usize) -> String {
    format!(
        "You are an expert at creating personas with diverse backgrounds. \
         Generate {count} personas that differ in age, gender, occupation and experience. \
         Describe each persona in one paragraph and separate personas with a blank line. \
         Do not add any other text."
    )
}

/// User prompt for persona generation
#[must_use]
pub fn persona_user(topic: &str) -> String {
    format!("Generate personas who will analyze the following topic:\n{topic}")
}

/// Split a generator reply into at most `count` personas
///
/// Paragraphs are separated by one or more blank lines. Ids are
/// `persona-1..N` in reply order.
#[must_use]
pub fn parse_personas(reply: &str, count: usize) -> Vec<Entity> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in reply.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }

    blocks
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, background)| Entity::new(format!("persona-{}", i + 1), background))
        .collect()
}

/// System prompt putting the model in a persona's shoes
#[must_use]
pub fn analysis_system(entity: &Entity) -> String {
    format!(
        "You analyze as the following persona:\n{} - {}",
        entity.id, entity.descriptor
    )
}

/// User prompt for one persona's analysis of one phase
#[must_use]
pub fn analysis_user(phase: Phase, topic: &str, priors: &[PhaseResult]) -> String {
    let mut prompt = format!(
        "Analyze the following topic with the YWT framework.\n\nTopic: {topic}\n\n"
    );

    if !priors.is_empty() {
        prompt.push_str("Your earlier answers:\n");
        for prior in priors {
            let _ = writeln!(prompt, "[{}]\n{}\n", prior.phase.label(), prior.payload);
        }
    }

    let _ = write!(
        prompt,
        "From this persona's point of view, answer only this perspective:\n{}",
        phase_instruction(phase)
    );
    prompt
}

/// System prompt for the cross-persona summary
#[must_use]
pub fn summary_system() -> &'static str {
    "You synthesize analyses written by several personas into one concise summary. \
     Highlight agreement, disagreement and the most actionable points."
}

/// User prompt summarizing one phase across all personas
#[must_use]
pub fn summary_user(
    phase: Phase,
    topic: &str,
    results: &[EntityPhaseResult],
    prior_summaries: &[PhaseSummary],
) -> String {
    let mut prompt = format!("Topic: {topic}\n\n");

    for summary in prior_summaries {
        let _ = writeln!(
            prompt,
            "Summary of {}:\n{}\n",
            summary.phase.label(),
            summary.payload
        );
    }

    let _ = writeln!(prompt, "Answers for {}:", phase.label());
    for item in results {
        let _ = writeln!(prompt, "\n=== {} ===\n{}", item.entity.id, item.result.payload);
    }

    let _ = write!(prompt, "\nSummarize {} across all personas.", phase.label());
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_parse_personas_splits_on_blank_lines() {
        let reply = "A nurse, 34.\nWorks nights.\n\n\nA pilot, 51.\n   \nA student, 19.\n";
        let personas = parse_personas(reply, 5);

        assert_eq!(personas.len(), 3);
        assert_eq!(personas[0].id.as_str(), "persona-1");
        assert_eq!(personas[0].descriptor, "A nurse, 34.\nWorks nights.");
        assert_eq!(personas[2].descriptor, "A student, 19.");
    }

    #[test]
    fn test_parse_personas_keeps_first_count() {
        let reply = "one\n\ntwo\n\nthree";
        let ids: Vec<String> = parse_personas(reply, 2)
            .into_iter()
            .map(|e| e.descriptor)
            .collect();
        assert_eq!(ids, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_personas_empty_reply() {
        assert!(parse_personas("  \n\n ", 5).is_empty());
    }

    #[test]
    fn test_persona_system_mentions_count() {
        assert!(persona_system(7).contains("Generate 7 personas"));
    }

    #[test]
    fn test_first_phase_prompt_has_no_priors() {
        let prompt = analysis_user(Phase::Y, "release process", &[]);
        assert!(prompt.contains("Topic: release process"));
        assert!(!prompt.contains("earlier answers"));
        assert!(prompt.ends_with(phase_instruction(Phase::Y)));
    }

    #[test]
    fn test_later_phase_prompt_lists_priors_in_order() {
        let priors = vec![
            PhaseResult::new(Phase::Y, "shipped weekly"),
            PhaseResult::new(Phase::W, "smaller batches help"),
        ];
        let prompt = analysis_user(Phase::T, "release process", &priors);

        let y = prompt.find("shipped weekly").unwrap();
        let w = prompt.find("smaller batches help").unwrap();
        assert!(y < w);
        assert!(prompt.contains(phase_instruction(Phase::T)));
    }

    #[test]
    fn test_summary_prompt_includes_everything() {
        let nurse = Arc::new(Entity::new("persona-1", "nurse"));
        let pilot = Arc::new(Entity::new("persona-2", "pilot"));
        let results = vec![
            EntityPhaseResult {
                entity: nurse,
                result: PhaseResult::new(Phase::W, "handoffs matter"),
            },
            EntityPhaseResult {
                entity: pilot,
                result: PhaseResult::new(Phase::W, "checklists work"),
            },
        ];
        let priors = vec![PhaseSummary::new(Phase::Y, "everyone shipped")];

        let prompt = summary_user(Phase::W, "retro", &results, &priors);
        assert!(prompt.contains("everyone shipped"));
        assert!(prompt.find("=== persona-1 ===").unwrap() < prompt.find("=== persona-2 ===").unwrap());
        assert!(prompt.contains("checklists work"));
    }

    #[test]
    fn test_analysis_system_names_persona() {
        let entity = Entity::new("persona-3", "A retired engineer");
        assert_eq!(
            analysis_system(&entity),
            "You analyze as the following persona:\npersona-3 - A retired engineer"
        );
    }
}
