use crate::llm::Source;

/// Separates an answer from the list of sources appended to it.
pub const SOURCES_HEADING: &str = "\n\n**Sources:**\n";

/// Appends a numbered Markdown list of the usable sources. Sources missing a
/// uri or a title are dropped before numbering.
pub fn with_sources(text: &str, sources: &[Source]) -> String {
    let list = sources
        .iter()
        .filter(|source| source.is_well_formed())
        .enumerate()
        .map(|(index, source)| format!("{}. [{}]({})", index + 1, source.title, source.uri))
        .collect::<Vec<_>>()
        .join("\n");

    if list.is_empty() {
        return text.to_string();
    }
    format!("{text}{SOURCES_HEADING}{list}")
}
