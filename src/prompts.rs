//! Instruction texts and user-message templates for the generative calls

/// System prompt for a plain draft translation
pub const BASELINE_SYSTEM: &str = "You are a professional Sanskrit-to-English translator.
Your task is to translate the input text accurately into English.

CRITICAL INSTRUCTIONS:
1. Output ONLY the English translation.
2. Do NOT add introductions like \"Here is the translation\".
3. Do NOT add notes or explanations.

HANDLING NAMES:
- Use standard English equivalents for Biblical/Epic names (e.g., \"Abraham\" not \"Ibrāhīma\", \"Jesus\" not \"Yīśu\").
";

/// System prompt for compacting a long dictionary entry
pub const DICT_SUMMARY_SYSTEM: &str = "You are a lexicographer helper.
I will give you a raw dictionary entry (often messy, XML-like, or very long) for a Sanskrit word.
Your task is to extract the most relevant information into a clean, structured summary.

OUTPUT FORMAT:
Return a compact block like this:
Lemma: [The dictionary headword]
Definitions: [Top 2-3 most common English meanings, comma separated]
Context: [Any specific religious/grammatical context if visible, else 'General']

RULES:
1. Ignore obscure, rare, or overly specific botanical/zoological meanings unless they seem primary.
2. If the entry contains HTML/XML tags (like <b>, <L>), ignore them.
3. Keep it concise (under 50 words).
4. If the entry is just a reference (e.g., \"see X\"), output \"Reference to X\".
";

/// System prompt for the evidence-driven revision pass
pub const REVISION_SYSTEM: &str = "You are an expert Sanskrit translator and editor.
I will provide you with:
1. Original Sanskrit text.
2. A Draft Translation.
3. STRUCTURED EVIDENCE (Grammar analysis & Dictionary summaries).

Your task is to REVISE the translation to be accurate.

CRITICAL RULES:
1. Output ONLY the final revised English translation.
2. Do NOT explain your changes or repeat the evidence.
3. TRUST the Dictionary Evidence for word meanings.
4. Use standard English names (Abraham, Jesus, David) if the context suggests a specific domain (Biblical/Epic).
5. If the Draft Translation already matches the Dictionary Evidence perfectly, DO NOT CHANGE IT. Do not make the translation more complex or verbose just to use the evidence. Simplicity is preferred.
";

/// System prompt used instead of [`BASELINE_SYSTEM`] when example pairs are supplied
pub const FEW_SHOT_SYSTEM: &str = "You are a professional Sanskrit-to-English translator.
I will provide you with REFERENCE EXAMPLES (Source -> Target) to show the desired STYLE and VOCABULARY.

CRITICAL RULES:
1. **REFERENCE ONLY**: The examples are for style/tone guidance. DO NOT COPY the example targets as your output.
2. **TRANSLATE NEW INPUT**: You must translate the SPECIFIC Source Text provided in the user prompt.
3. **STYLE ALIGNMENT**: Adopt the phrasing style (e.g., archaic, biblical, or modern) of the examples.
4. Output ONLY the English translation.
";

const EXAMPLES_HEADER: &str = "\n\n=== REFERENCE EXAMPLES (STYLE GUIDE) ===\n";

const GLOSSARY_HEADER: &str = "
### GLOSSARY CONSTRAINTS (MANDATORY) ###
The following terms appear in the input. You MUST use the provided official definitions/translations for them.
Do NOT use synonyms if a specific term is provided below.

";

/// Draft system prompt, with the example block when there is one
pub fn draft_system(examples: Option<&str>) -> String {
    match examples {
        Some(block) => format!("{}{}{}", FEW_SHOT_SYSTEM, EXAMPLES_HEADER, block),
        None => BASELINE_SYSTEM.to_string(),
    }
}

/// Mandatory-terminology block appended to a system prompt
pub fn glossary_addendum(lines: &str) -> String {
    format!("{}{}\n", GLOSSARY_HEADER, lines)
}

pub fn draft_user(source: &str) -> String {
    format!("Translate this Sanskrit text to English:\n{}", source)
}

pub fn summary_user(word: &str, raw_entry: &str) -> String {
    format!("Word: {}\nRaw Entry: {}", word, raw_entry)
}

pub fn revision_user(source: &str, draft: &str, evidence: &str) -> String {
    format!(
        "Original Text: {}\nDraft Translation: {}\n\nSTRUCTURED EVIDENCE:\n{}\n\nTask:\n\
         1) Use the STRUCTURED EVIDENCE to correct the draft.\n\
         2) Output ONLY the REVISED English translation.",
        source, draft, evidence
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_system_switches_on_examples() {
        assert_eq!(draft_system(None), BASELINE_SYSTEM);
        let with = draft_system(Some("Source: a\nTarget: b"));
        assert!(with.starts_with(FEW_SHOT_SYSTEM));
        assert!(with.ends_with("=== REFERENCE EXAMPLES (STYLE GUIDE) ===\nSource: a\nTarget: b"));
    }

    #[test]
    fn test_glossary_addendum_contains_lines() {
        let block = glossary_addendum("- dharma: sacred law");
        assert!(block.contains("(MANDATORY)"));
        assert!(block.contains("- dharma: sacred law"));
    }

    #[test]
    fn test_revision_user_layout() {
        let prompt = revision_user("rājā", "the king", "--- Morphological Analysis ---");
        assert!(prompt.starts_with("Original Text: rājā\nDraft Translation: the king\n\n"));
        assert!(prompt.contains("STRUCTURED EVIDENCE:\n--- Morphological Analysis ---\n\nTask:"));
        assert!(prompt.ends_with("2) Output ONLY the REVISED English translation."));
    }
}
